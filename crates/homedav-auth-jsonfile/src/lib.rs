//! [`UserStore`] implementation that keeps its accounts in a JSON file.
//!
//! Passwords are never stored. Each account holds a PBKDF2-HMAC-SHA512 key derived from the
//! password with a per-user random salt. Example file:
//!
//! ```json
//! [
//!   {
//!     "username": "alice",
//!     "pbkdf2_salt": "hpHK9i8EJrCfMDyXN6VAvQ==",
//!     "pbkdf2_key": "<<BASE_64_KDF>>",
//!     "pbkdf2_iter": 100000
//!   }
//! ]
//! ```
//!
//! [`UserStore`]: homedav_core::auth::UserStore

use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use homedav_core::auth::{UserStore, UserStoreError, validate_password, validate_username};
use ring::{
    digest::SHA512_OUTPUT_LEN,
    pbkdf2::{self, PBKDF2_HMAC_SHA512},
    rand::{SecureRandom, SystemRandom},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::{BTreeMap, BTreeSet},
    num::NonZeroU32,
    path::{Path, PathBuf},
    time::Duration,
};
use tokio::{sync::RwLock, time::sleep};

/// Number of PBKDF2 iterations used for new and updated passwords.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// How long a lookup of an unknown user takes, so that it can't be told apart from a wrong
/// password by timing.
pub const DEFAULT_UNKNOWN_USER_DELAY: Duration = Duration::from_millis(1500);

const SALT_LEN: usize = 16;

#[derive(Serialize, Deserialize, Clone, Debug)]
struct Credentials {
    username: String,
    pbkdf2_salt: String,
    pbkdf2_key: String,
    pbkdf2_iter: NonZeroU32,
}

#[derive(Clone, Debug)]
struct Password {
    pbkdf2_salt: String,
    pbkdf2_key: [u8; SHA512_OUTPUT_LEN],
    pbkdf2_iter: NonZeroU32,
}

impl Password {
    fn derive(password: &str, iterations: NonZeroU32) -> Result<Password, UserStoreError> {
        let mut salt = [0u8; SALT_LEN];
        SystemRandom::new()
            .fill(&mut salt)
            .map_err(|_| UserStoreError::ImplPropagated("could not generate salt".to_string(), None))?;
        let pbkdf2_salt = BASE64.encode(salt);
        let mut pbkdf2_key = [0u8; SHA512_OUTPUT_LEN];
        pbkdf2::derive(PBKDF2_HMAC_SHA512, iterations, pbkdf2_salt.as_bytes(), password.as_bytes(), &mut pbkdf2_key);
        Ok(Password {
            pbkdf2_salt,
            pbkdf2_key,
            pbkdf2_iter: iterations,
        })
    }

    fn verify(&self, password: &str) -> bool {
        pbkdf2::verify(
            PBKDF2_HMAC_SHA512,
            self.pbkdf2_iter,
            self.pbkdf2_salt.as_bytes(),
            password.as_bytes(),
            &self.pbkdf2_key,
        )
        .is_ok()
    }

    fn from_credentials(c: Credentials) -> Result<(String, Password), UserStoreError> {
        let key = BASE64
            .decode(&c.pbkdf2_key)
            .map_err(|e| UserStoreError::new(format!("could not base64 decode the key of {}", c.username), e))?;
        let pbkdf2_key: [u8; SHA512_OUTPUT_LEN] = key.try_into().map_err(|_| {
            UserStoreError::ImplPropagated(format!("the key of {} is not {} bytes long", c.username, SHA512_OUTPUT_LEN), None)
        })?;
        Ok((
            c.username,
            Password {
                pbkdf2_salt: c.pbkdf2_salt,
                pbkdf2_key,
                pbkdf2_iter: c.pbkdf2_iter,
            },
        ))
    }

    fn to_credentials(&self, username: &str) -> Credentials {
        Credentials {
            username: username.to_string(),
            pbkdf2_salt: self.pbkdf2_salt.clone(),
            pbkdf2_key: BASE64.encode(self.pbkdf2_key),
            pbkdf2_iter: self.pbkdf2_iter,
        }
    }
}

/// [`UserStore`] implementation backed by a JSON file.
///
/// The whole file is loaded in memory. Every change is written back before the call returns,
/// unless the store was created with [`JsonFileUserStore::from_json`].
#[derive(Debug)]
pub struct JsonFileUserStore {
    path: Option<PathBuf>,
    db: RwLock<BTreeMap<String, Password>>,
    iterations: NonZeroU32,
    unknown_user_delay: Duration,
}

impl JsonFileUserStore {
    /// Initialize a new [`JsonFileUserStore`] from an existing file. Changes are saved to it.
    pub fn from_file<P: AsRef<Path>>(filename: P) -> Result<Self, UserStoreError> {
        let json = std::fs::read_to_string(filename.as_ref())?;
        let mut store = JsonFileUserStore::from_json(json)?;
        store.path = Some(filename.as_ref().to_path_buf());
        Ok(store)
    }

    /// Like [`from_file`](Self::from_file) but starts out empty when the file does not exist
    /// yet. The file is created with the first account.
    pub fn open<P: AsRef<Path>>(filename: P) -> Result<Self, UserStoreError> {
        match std::fs::metadata(filename.as_ref()) {
            Ok(_) => JsonFileUserStore::from_file(filename),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let mut store = JsonFileUserStore::from_json("[]")?;
                store.path = Some(filename.as_ref().to_path_buf());
                Ok(store)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Initialize a new in-memory [`JsonFileUserStore`] from a json string.
    pub fn from_json<T: Into<String>>(json: T) -> Result<Self, UserStoreError> {
        let db: Vec<Credentials> =
            serde_json::from_str::<Vec<Credentials>>(&json.into()).map_err(|e| UserStoreError::new("could not parse the credentials", e))?;
        let salts: BTreeSet<&str> = db.iter().map(|credential| credential.pbkdf2_salt.as_str()).collect();
        if db.len() != salts.len() {
            return Err(UserStoreError::ImplPropagated("salts have to be unique".to_string(), None));
        }
        let db = db.into_iter().map(Password::from_credentials).collect::<Result<BTreeMap<_, _>, _>>()?;
        Ok(JsonFileUserStore {
            path: None,
            db: RwLock::new(db),
            iterations: NonZeroU32::new(DEFAULT_ITERATIONS).unwrap_or(NonZeroU32::MIN),
            unknown_user_delay: DEFAULT_UNKNOWN_USER_DELAY,
        })
    }

    /// Sets the number of PBKDF2 iterations used when hashing new passwords.
    pub fn with_iterations(mut self, iterations: NonZeroU32) -> Self {
        self.iterations = iterations;
        self
    }

    /// Sets how long `check` waits before rejecting an unknown user.
    pub fn with_unknown_user_delay(mut self, delay: Duration) -> Self {
        self.unknown_user_delay = delay;
        self
    }

    /// The file this store persists to, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    async fn save(&self, db: &BTreeMap<String, Password>) -> Result<(), UserStoreError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let credentials: Vec<Credentials> = db.iter().map(|(name, password)| password.to_credentials(name)).collect();
        let json = serde_json::to_vec_pretty(&credentials).map_err(|e| UserStoreError::new("could not serialize the credentials", e))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        // Write next to the target and move it in place, a crash never leaves half a file.
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }
}

#[async_trait]
impl UserStore for JsonFileUserStore {
    #[tracing_attributes::instrument(skip(self, password))]
    async fn check(&self, username: &str, password: &str) -> Result<bool, UserStoreError> {
        let stored = self.db.read().await.get(username).cloned();
        match stored {
            Some(stored) => {
                let password = password.to_string();
                tokio::task::spawn_blocking(move || stored.verify(&password))
                    .await
                    .map_err(|e| UserStoreError::new("password verification failed", e))
            }
            None => {
                sleep(self.unknown_user_delay).await;
                Ok(false)
            }
        }
    }

    async fn exists(&self, username: &str) -> Result<bool, UserStoreError> {
        Ok(self.db.read().await.contains_key(username))
    }

    #[tracing_attributes::instrument(skip(self, password))]
    async fn add(&self, username: &str, password: &str) -> Result<(), UserStoreError> {
        validate_username(username)?;
        validate_password(password)?;
        let mut db = self.db.write().await;
        if db.contains_key(username) {
            return Err(UserStoreError::AlreadyExists(username.to_string()));
        }
        db.insert(username.to_string(), Password::derive(password, self.iterations)?);
        if let Err(err) = self.save(&db).await {
            db.remove(username);
            return Err(err);
        }
        Ok(())
    }

    #[tracing_attributes::instrument(skip(self, password))]
    async fn update(&self, username: &str, password: &str) -> Result<(), UserStoreError> {
        validate_password(password)?;
        let mut db = self.db.write().await;
        let Some(current) = db.get(username).cloned() else {
            return Err(UserStoreError::UnknownUser(username.to_string()));
        };
        db.insert(username.to_string(), Password::derive(password, self.iterations)?);
        if let Err(err) = self.save(&db).await {
            db.insert(username.to_string(), current);
            return Err(err);
        }
        Ok(())
    }

    #[tracing_attributes::instrument(skip(self))]
    async fn delete(&self, username: &str) -> Result<(), UserStoreError> {
        let mut db = self.db.write().await;
        let Some(current) = db.remove(username) else {
            return Err(UserStoreError::UnknownUser(username.to_string()));
        };
        if let Err(err) = self.save(&db).await {
            db.insert(username.to_string(), current);
            return Err(err);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<String>, UserStoreError> {
        Ok(self.db.read().await.keys().cloned().collect())
    }
}
