//! Defines the service provider interface for storage back-end implementors.

use super::error::Error;
use async_trait::async_trait;
use bitflags::bitflags;
use std::{
    fmt::{self, Debug, Display, Formatter},
    path::{Path, PathBuf},
    result,
    time::SystemTime,
};

/// Result type used by traits in this module
pub type Result<T> = result::Result<T, Error>;

/// The top-level areas of the physical storage root.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Partition {
    /// `users/<name>/...`, one folder per account.
    Users,
    /// `shares/<name>/...`, one folder per shared folder.
    Shares,
}

impl Partition {
    /// Every partition, in the order they are created.
    pub const ALL: [Partition; 2] = [Partition::Users, Partition::Shares];

    /// The directory name of the partition below the storage root.
    pub fn as_str(&self) -> &'static str {
        match self {
            Partition::Users => "users",
            Partition::Shares => "shares",
        }
    }

    /// The physical path of `owner`'s folder in this partition, e.g. `users/alice`.
    pub fn folder(&self, owner: &str) -> PathBuf {
        Path::new(self.as_str()).join(owner)
    }
}

impl Display for Partition {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags! {
    /// How a file should be opened.
    #[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
    pub struct OpenFlags: u32 {
        /// Open for reading.
        const READ = 0b00_0001;
        /// Open for writing.
        const WRITE = 0b00_0010;
        /// Append to the end of the file.
        const APPEND = 0b00_0100;
        /// Truncate the file to zero length.
        const TRUNCATE = 0b00_1000;
        /// Create the file if it does not exist.
        const CREATE = 0b01_0000;
        /// Create the file, failing if it exists.
        const CREATE_NEW = 0b10_0000;
    }
}

impl OpenFlags {
    /// True if opening with these flags can change the file system.
    pub fn is_write(&self) -> bool {
        self.intersects(OpenFlags::WRITE | OpenFlags::APPEND | OpenFlags::TRUNCATE | OpenFlags::CREATE | OpenFlags::CREATE_NEW)
    }
}

/// Represents the metadata of a file or directory
pub trait Metadata {
    /// Returns the length (size) of the file in bytes.
    fn len(&self) -> u64;

    /// Returns `self.len() == 0`.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if the path is a directory.
    fn is_dir(&self) -> bool;

    /// Returns true if the path is a file.
    fn is_file(&self) -> bool;

    /// Returns true if the path is a symbolic link.
    fn is_symlink(&self) -> bool;

    /// Returns the last modified time of the path.
    fn modified(&self) -> Result<SystemTime>;
}

/// Fileinfo contains the path and `Metadata` of a file.
///
/// [`Metadata`]: ./trait.Metadata.html
#[derive(Clone, Debug)]
pub struct Fileinfo<P, M>
where
    P: AsRef<Path>,
    M: Metadata,
{
    /// The path to the file, relative to the listed directory
    pub path: P,
    /// The file's metadata
    pub metadata: M,
}

/// The `StorageBackend` trait is implemented by physical storage. All paths are relative to the
/// back-end's root and have already passed the access checks of the virtual filesystem.
/// Implementations must nevertheless refuse to touch anything outside of their root.
#[async_trait]
pub trait StorageBackend: Send + Sync + Debug {
    /// The concrete type of the _metadata_ used by this storage backend.
    type Metadata: Metadata + Sync + Send + Debug;

    /// The concrete type of an open file.
    type File: tokio::io::AsyncRead + tokio::io::AsyncWrite + tokio::io::AsyncSeek + Send + Sync + Unpin + Debug + 'static;

    /// Implement to set the name of the storage back-end. By default it returns the type signature.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Creates the top-level [`Partition`] folders if they don't exist yet.
    async fn init(&self) -> Result<()> {
        for partition in Partition::ALL {
            self.create_dir_all(partition.as_str()).await?;
        }
        Ok(())
    }

    /// Returns the `Metadata` for the given file.
    async fn metadata<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<Self::Metadata>;

    /// Returns the list of files in the given directory.
    async fn list<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<Vec<Fileinfo<PathBuf, Self::Metadata>>>;

    /// Opens the given file.
    async fn open<P: AsRef<Path> + Send + Debug>(&self, path: P, flags: OpenFlags) -> Result<Self::File>;

    /// Creates the given directory. Its parent must exist.
    async fn create_dir<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<()>;

    /// Creates the given directory and all of its missing parents.
    async fn create_dir_all<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<()>;

    /// Removes a file, or a directory with everything inside it.
    async fn remove_all<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<()>;

    /// Renames a file or directory, replacing `to` if it is a file.
    async fn rename<P: AsRef<Path> + Send + Debug>(&self, from: P, to: P) -> Result<()>;
}
