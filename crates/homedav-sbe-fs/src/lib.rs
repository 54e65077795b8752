//! A homedav [`StorageBackend`] that keeps its files on local disk.
//!
//! All access goes through a [`cap_std::fs::Dir`] handle opened on the storage root, so even a
//! path that slipped through the virtual filesystem with `..` components or an absolute symlink
//! can't reach outside of it.
//!
//! ```no_run
//! use homedav_core::storage::StorageBackend;
//! use homedav_sbe_fs::Filesystem;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let storage = Filesystem::new("/srv/homedav")?;
//! storage.init().await?;
//! # Ok(())
//! # }
//! ```

mod cap_fs;

use async_trait::async_trait;
use futures::{future::TryFutureExt, stream::TryStreamExt};
use homedav_core::storage::{Error, ErrorKind, Fileinfo, Metadata, OpenFlags, Result, StorageBackend};
use lazy_static::lazy_static;
use std::{
    fmt::Debug,
    io,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

/// The Filesystem struct is an implementation of the StorageBackend trait that keeps its files
/// inside a specific root directory on local disk.
#[derive(Debug, Clone)]
pub struct Filesystem {
    // The Arc is necessary so we can pass it to the blocking closures in cap_fs.
    root_fd: Arc<cap_std::fs::Dir>,
    root: PathBuf,
}

/// Metadata for the storage back-end
#[derive(Debug)]
pub struct Meta {
    inner: cap_std::fs::Metadata,
}

/// Strip the "/" prefix, if any, from a path. The virtual filesystem hands out relative paths
/// already, this only guards against callers that don't.
fn strip_prefixes(path: &Path) -> &Path {
    lazy_static! {
        static ref DOT: PathBuf = PathBuf::from(".");
        static ref SLASH: PathBuf = PathBuf::from("/");
        static ref EMPTY: PathBuf = PathBuf::new();
    }
    if path == SLASH.as_path() || path == EMPTY.as_path() {
        DOT.as_path()
    } else {
        path.strip_prefix("/").unwrap_or(path)
    }
}

fn open_options(flags: OpenFlags) -> cap_std::fs::OpenOptions {
    let mut oo = cap_std::fs::OpenOptions::new();
    oo.read(flags.contains(OpenFlags::READ) || !flags.is_write())
        .write(flags.is_write() && !flags.contains(OpenFlags::APPEND))
        .append(flags.contains(OpenFlags::APPEND))
        .truncate(flags.contains(OpenFlags::TRUNCATE))
        .create(flags.contains(OpenFlags::CREATE))
        .create_new(flags.contains(OpenFlags::CREATE_NEW));
    oo
}

impl Filesystem {
    /// Create a new Filesystem backend, with the given root. The root is created if it doesn't
    /// exist yet. No operations can take place outside of the root. For example, when the
    /// `Filesystem` root is set to `/srv/homedav`, and the virtual filesystem asks for
    /// `users/alice/hello.txt`, it gets `/srv/homedav/users/alice/hello.txt`.
    pub fn new<P: Into<PathBuf>>(root: P) -> io::Result<Self> {
        let path = root.into();
        std::fs::create_dir_all(&path)?;
        let aa = cap_std::ambient_authority();
        let root_fd = Arc::new(cap_std::fs::Dir::open_ambient_dir(&path, aa)?);
        Ok(Filesystem { root_fd, root: path })
    }

    /// The directory on local disk this back-end is confined to.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl StorageBackend for Filesystem {
    type Metadata = Meta;
    type File = tokio::fs::File;

    #[tracing_attributes::instrument]
    async fn metadata<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<Self::Metadata> {
        let path = strip_prefixes(path.as_ref());
        let fs_meta = cap_fs::metadata(self.root_fd.clone(), path).await?;
        Ok(Meta { inner: fs_meta })
    }

    #[tracing_attributes::instrument]
    async fn list<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<Vec<Fileinfo<PathBuf, Self::Metadata>>> {
        let path = strip_prefixes(path.as_ref());

        let fis: Vec<Fileinfo<PathBuf, Self::Metadata>> = cap_fs::read_dir(self.root_fd.clone(), path)
            .and_then(|dirent| {
                let entry_path: PathBuf = dirent.file_name().into();
                let fullpath = path.join(&entry_path);
                cap_fs::metadata(self.root_fd.clone(), fullpath).map_ok(move |meta| Fileinfo {
                    path: entry_path,
                    metadata: Meta { inner: meta },
                })
            })
            .try_collect::<Vec<_>>()
            .await?;

        Ok(fis)
    }

    #[tracing_attributes::instrument]
    async fn open<P: AsRef<Path> + Send + Debug>(&self, path: P, flags: OpenFlags) -> Result<Self::File> {
        let path = strip_prefixes(path.as_ref());
        let file = cap_fs::open_with(self.root_fd.clone(), path, open_options(flags)).await?;
        Ok(tokio::fs::File::from_std(file.into_std()))
    }

    #[tracing_attributes::instrument]
    async fn create_dir<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<()> {
        let path = strip_prefixes(path.as_ref());
        cap_fs::create_dir(self.root_fd.clone(), path).await.map_err(|error: io::Error| error.into())
    }

    #[tracing_attributes::instrument]
    async fn create_dir_all<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<()> {
        let path = strip_prefixes(path.as_ref());
        cap_fs::create_dir_all(self.root_fd.clone(), path)
            .await
            .map_err(|error: io::Error| error.into())
    }

    #[tracing_attributes::instrument]
    async fn remove_all<P: AsRef<Path> + Send + Debug>(&self, path: P) -> Result<()> {
        let path = strip_prefixes(path.as_ref());
        if path == Path::new(".") {
            return Err(Error::from(ErrorKind::PermissionDenied));
        }
        // Don't follow a symlink here, removing it must not remove what it points to.
        let meta = cap_fs::symlink_metadata(self.root_fd.clone(), path).await?;
        let result = if meta.is_dir() {
            cap_fs::remove_dir_all(self.root_fd.clone(), path).await
        } else {
            cap_fs::remove_file(self.root_fd.clone(), path).await
        };
        result.map_err(|error: io::Error| error.into())
    }

    #[tracing_attributes::instrument]
    async fn rename<P: AsRef<Path> + Send + Debug>(&self, from: P, to: P) -> Result<()> {
        let from = strip_prefixes(from.as_ref());
        let to = strip_prefixes(to.as_ref());

        let metadata = cap_fs::symlink_metadata(self.root_fd.clone(), from).await?;
        if !(metadata.is_file() || metadata.is_dir()) {
            return Err(Error::from(ErrorKind::NotFound));
        }
        cap_fs::rename(self.root_fd.clone(), from, to)
            .await
            .map_err(|error: io::Error| error.into())
    }
}

impl Metadata for Meta {
    fn len(&self) -> u64 {
        self.inner.len()
    }

    fn is_dir(&self) -> bool {
        self.inner.is_dir()
    }

    fn is_file(&self) -> bool {
        self.inner.is_file()
    }

    fn is_symlink(&self) -> bool {
        self.inner.file_type().is_symlink()
    }

    fn modified(&self) -> Result<SystemTime> {
        self.inner.modified().map(cap_std::time::SystemTime::into_std).map_err(|e| e.into())
    }
}

#[cfg(test)]
mod tests;
