//! Contains the [`Server`] and its [`ServerBuilder`].

mod davserver;
mod error;
mod listen;
pub mod options;
mod pipeline;
mod shutdown;
mod tls;

pub use davserver::{Server, ServerBuilder};
pub use error::{ServerError, ShutdownError};
pub use tls::ConfigError;
