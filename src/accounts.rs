//! Account management: keeps the user store and the users' home folders in step.
//!
//! Every account owns the physical folder `users/<name>`. It is created together with the
//! account, re-created at start-up if it went missing and removed when the account is deleted.

use homedav_core::{
    auth::{UserStore, UserStoreError, validate_username},
    storage::{self, ErrorKind, Partition, StorageBackend},
};
use thiserror::Error;

/// Error returned by the account operations.
#[derive(Debug, Error)]
pub enum AccountError {
    /// The user store refused or failed.
    #[error(transparent)]
    Store(#[from] UserStoreError),
    /// The home folder could not be created or removed.
    #[error("home folder: {0}")]
    Storage(#[from] storage::Error),
}

/// Creates the account `username` and its home folder. If the folder can't be created the
/// account is removed again.
pub async fn add_user<U, S>(store: &U, storage: &S, username: &str, password: &str) -> Result<(), AccountError>
where
    U: UserStore + ?Sized,
    S: StorageBackend,
{
    store.add(username, password).await?;
    if let Err(err) = storage.create_dir_all(Partition::Users.folder(username)).await {
        store.delete(username).await?;
        return Err(err.into());
    }
    Ok(())
}

/// Sets a new password for `username`.
pub async fn update_password<U>(store: &U, username: &str, password: &str) -> Result<(), AccountError>
where
    U: UserStore + ?Sized,
{
    Ok(store.update(username, password).await?)
}

/// Deletes the account `username` together with everything in its home folder.
pub async fn delete_user<U, S>(store: &U, storage: &S, username: &str) -> Result<(), AccountError>
where
    U: UserStore + ?Sized,
    S: StorageBackend,
{
    store.delete(username).await?;
    match storage.remove_all(Partition::Users.folder(username)).await {
        Err(err) if err.kind() != ErrorKind::NotFound => Err(err.into()),
        _ => Ok(()),
    }
}

/// Prepares the storage root and makes sure every account has a home folder. Returns the
/// number of accounts.
pub async fn ensure_homes<U, S>(store: &U, storage: &S) -> Result<usize, AccountError>
where
    U: UserStore + ?Sized,
    S: StorageBackend,
{
    storage.init().await?;
    let users = store.list().await?;
    for username in &users {
        // Never turn a bad name from a hand-edited store into a path.
        validate_username(username)?;
        storage.create_dir_all(Partition::Users.folder(username)).await?;
    }
    Ok(users.len())
}
