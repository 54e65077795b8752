//! Contains the [`User`] identity and the [`UserStore`] trait used by homedav back-ends.
//!
//! The server only ever talks to credentials through [`UserStore`]. A JSON file implementation
//! lives in the `homedav-auth-jsonfile` crate; you can define your own to integrate with
//! whatever account database you need:
//!
//! ```no_run
//! use async_trait::async_trait;
//! use homedav_core::auth::{UserStore, UserStoreError};
//!
//! #[derive(Debug)]
//! struct SingleUser;
//!
//! #[async_trait]
//! impl UserStore for SingleUser {
//!     async fn check(&self, username: &str, password: &str) -> Result<bool, UserStoreError> {
//!         Ok(username == "alice" && password == "wonderland")
//!     }
//!
//!     async fn exists(&self, username: &str) -> Result<bool, UserStoreError> {
//!         Ok(username == "alice")
//!     }
//!
//!     async fn add(&self, username: &str, _password: &str) -> Result<(), UserStoreError> {
//!         Err(UserStoreError::AlreadyExists(username.to_string()))
//!     }
//!
//!     async fn update(&self, username: &str, _password: &str) -> Result<(), UserStoreError> {
//!         Err(UserStoreError::UnknownUser(username.to_string()))
//!     }
//!
//!     async fn delete(&self, username: &str) -> Result<(), UserStoreError> {
//!         Err(UserStoreError::UnknownUser(username.to_string()))
//!     }
//!
//!     async fn list(&self) -> Result<Vec<String>, UserStoreError> {
//!         Ok(vec!["alice".to_string()])
//!     }
//! }
//! ```

mod user;
pub use user::User;

mod user_store;
pub use user_store::{MAX_USERNAME_LEN, MIN_PASSWORD_LEN, RESERVED_NAMES, UserStore, UserStoreError, validate_password, validate_username};
