//! Contains the [`StorageBackend`] trait that physical storage implementations provide to the
//! homedav virtual filesystem.
//!
//! A storage back-end knows nothing about users or permissions. It receives physical paths that
//! were already resolved and authorized, relative to the back-end's own root, and performs the
//! operation. The two top-level partitions of that root are described by [`Partition`].
//!
//! The local-disk implementation lives in the `homedav-sbe-fs` crate.

mod error;
pub use error::{Error, ErrorKind};

mod storage_backend;
pub use storage_backend::{Fileinfo, Metadata, OpenFlags, Partition, Result, StorageBackend};
