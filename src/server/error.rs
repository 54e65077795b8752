//! Contains the error type used by `Server`

use crate::BoxError;

use std::net::AddrParseError;
use thiserror::Error;

/// Error returned by [`ServerBuilder::build`](crate::ServerBuilder::build) and
/// [`Server::listen`](crate::Server::listen)
#[derive(Error, Debug)]
#[error("server error: {msg}")]
pub struct ServerError {
    msg: String,
    #[source]
    source: BoxError,
}

impl ServerError {
    pub(crate) fn new<E: Into<BoxError>>(msg: impl Into<String>, source: E) -> ServerError {
        ServerError {
            msg: msg.into(),
            source: source.into(),
        }
    }
}

impl From<AddrParseError> for ServerError {
    fn from(e: AddrParseError) -> Self {
        ServerError::new("could not parse address", e)
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::new("io error", e)
    }
}

impl From<super::tls::ConfigError> for ServerError {
    fn from(e: super::tls::ConfigError) -> Self {
        ServerError::new(format!("error with TLS configuration: {e}"), e)
    }
}

impl From<homedav_core::storage::Error> for ServerError {
    fn from(e: homedav_core::storage::Error) -> Self {
        ServerError::new("could not prepare the storage root", e)
    }
}

/// Returned when the server could not shut down cleanly.
#[derive(Error, Debug)]
#[error("shutdown error: {msg}")]
pub struct ShutdownError {
    /// What went wrong.
    pub msg: String,
}

impl From<ShutdownError> for ServerError {
    fn from(e: ShutdownError) -> Self {
        ServerError::new("shutdown error", e)
    }
}
