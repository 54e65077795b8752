//! The service provider interface for credential storage.

use crate::BoxError;
use async_trait::async_trait;
use std::fmt::Debug;
use thiserror::Error;

/// Longest user name accepted by [`validate_username`].
pub const MAX_USERNAME_LEN: usize = 32;

/// Shortest password accepted by [`validate_password`].
pub const MIN_PASSWORD_LEN: usize = 5;

/// Names that collide with the fixed parts of the namespace and can therefore not be used as
/// user names.
pub const RESERVED_NAMES: &[&str] = &[".", "..", "shares"];

/// Defines the requirements for credential stores.
///
/// `check` is what the authentication gate calls on every request. The CRUD methods back the
/// account management commands.
#[async_trait]
pub trait UserStore: Send + Sync + Debug {
    /// Tells whether `password` is the password of `username`. Unknown users are not an error,
    /// they simply don't check out. An `Err` means the store itself failed.
    async fn check(&self, username: &str, password: &str) -> Result<bool, UserStoreError>;

    /// Tells whether an account with this name exists.
    async fn exists(&self, username: &str) -> Result<bool, UserStoreError>;

    /// Creates a new account.
    async fn add(&self, username: &str, password: &str) -> Result<(), UserStoreError>;

    /// Replaces the password of an existing account.
    async fn update(&self, username: &str, password: &str) -> Result<(), UserStoreError>;

    /// Removes an account.
    async fn delete(&self, username: &str) -> Result<(), UserStoreError>;

    /// Lists all account names in ascending order.
    async fn list(&self) -> Result<Vec<String>, UserStoreError>;
}

/// The error type returned by [`UserStore`] implementations.
#[derive(Debug, Error)]
pub enum UserStoreError {
    /// An account with this name exists already.
    #[error("user {0:?} already exists")]
    AlreadyExists(String),
    /// No account with this name exists.
    #[error("unknown user {0:?}")]
    UnknownUser(String),
    /// The name can't be used for an account.
    #[error("invalid user name {0:?}")]
    InvalidName(String),
    /// The password does not satisfy the password policy.
    #[error("password must be at least {MIN_PASSWORD_LEN} characters long")]
    WeakPassword,
    /// The underlying storage failed.
    #[error("user store error: {0}")]
    ImplPropagated(String, #[source] Option<BoxError>),
}

impl UserStoreError {
    /// Creates a new storage failure with the given message and cause.
    pub fn new<E>(msg: impl Into<String>, source: E) -> Self
    where
        E: Into<BoxError>,
    {
        UserStoreError::ImplPropagated(msg.into(), Some(source.into()))
    }
}

impl From<std::io::Error> for UserStoreError {
    fn from(err: std::io::Error) -> Self {
        UserStoreError::new("io error", err)
    }
}

/// Checks that `name` can serve as a user name and as a single path segment.
pub fn validate_username(name: &str) -> Result<(), UserStoreError> {
    let invalid = name.is_empty()
        || name.chars().count() > MAX_USERNAME_LEN
        || RESERVED_NAMES.contains(&name)
        || name.chars().any(|c| c == '/' || c == '\\' || c == ':' || c.is_control());
    if invalid {
        return Err(UserStoreError::InvalidName(name.to_string()));
    }
    Ok(())
}

/// Checks `password` against the password policy.
pub fn validate_password(password: &str) -> Result<(), UserStoreError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(UserStoreError::WeakPassword);
    }
    Ok(())
}
