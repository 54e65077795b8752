//! Core traits and types for homedav back-ends.

pub mod auth;
pub mod storage;

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;
