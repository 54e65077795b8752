#![forbid(unsafe_code)]
//! homedav serves every user their own home folder over WebDAV.
//!
//! Clients authenticate with HTTP Basic credentials. After that they see a small namespace: `/`
//! lists their own folder and `/shares`, and they can read and write only below their own
//! folder. Other users' folders simply don't exist for them.
//!
//! The protocol itself is handled by [dav-server](https://docs.rs/dav-server). This crate
//! contributes the [resolver](resource) that maps request paths onto the namespace, the
//! [virtual filesystem](vfs) that enforces it on top of a
//! [`StorageBackend`](homedav_core::storage::StorageBackend), the authentication gate and the
//! [`Server`] wiring it all together.
//!
//! # Quick start
//!
//! ```no_run
//! use homedav::ServerBuilder;
//! use homedav_auth_jsonfile::JsonFileUserStore;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! pub async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let users = Arc::new(JsonFileUserStore::open("./data/users.json")?);
//!     let server = ServerBuilder::with_fs("./data", users)?.realm("homedav").build()?;
//!     server.listen("127.0.0.1:8080").await?;
//!     Ok(())
//! }
//! ```

pub mod accounts;
pub mod auth;
pub mod dav;
#[cfg(feature = "prometheus")]
mod metrics;
pub mod resource;
pub(crate) mod server;
pub mod vfs;

pub use crate::server::{ConfigError, Server, ServerBuilder, ServerError, ShutdownError, options};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
