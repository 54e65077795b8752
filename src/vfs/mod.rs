//! The virtual filesystem that sits between the WebDAV engine and a [`StorageBackend`].
//!
//! Every operation takes the authenticated [`User`] explicitly. It resolves the requested path
//! into a [`Resource`], checks the caller's permissions and then either answers from the virtual
//! nodes (`/` and `/shares`) or delegates to storage with the resource's physical path.

mod virtual_node;

pub use virtual_node::{VirtualDir, VirtualEntry};

use crate::resource::{self, NoShares, Resource, SHARES, ShareAccess};
use homedav_core::{
    auth::User,
    storage::{Error, ErrorKind, Fileinfo, Metadata, OpenFlags, Result, StorageBackend},
};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};
use tokio::io::AsyncWriteExt;

/// Metadata of either a virtual node or a physical file.
#[derive(Debug)]
pub enum Entry<M> {
    /// `/` or `/shares`.
    Virtual(VirtualEntry),
    /// Something the storage back-end knows about.
    Physical(M),
}

impl<M: Metadata> Metadata for Entry<M> {
    fn len(&self) -> u64 {
        match self {
            Entry::Virtual(v) => v.len(),
            Entry::Physical(m) => m.len(),
        }
    }

    fn is_dir(&self) -> bool {
        match self {
            Entry::Virtual(v) => v.is_dir(),
            Entry::Physical(m) => m.is_dir(),
        }
    }

    fn is_file(&self) -> bool {
        match self {
            Entry::Virtual(v) => v.is_file(),
            Entry::Physical(m) => m.is_file(),
        }
    }

    fn is_symlink(&self) -> bool {
        match self {
            Entry::Virtual(v) => v.is_symlink(),
            Entry::Physical(m) => m.is_symlink(),
        }
    }

    fn modified(&self) -> Result<SystemTime> {
        match self {
            Entry::Virtual(v) => v.modified(),
            Entry::Physical(m) => m.modified(),
        }
    }
}

/// The result of [`VirtualFs::open_file`].
#[derive(Debug)]
pub enum OpenNode<F> {
    /// `/` or `/shares` was opened.
    Dir(VirtualDir),
    /// A physical file was opened.
    File {
        /// The open file.
        file: F,
        /// Where the file lives, relative to the storage root.
        physical: PathBuf,
    },
}

/// Enforces the per-user namespace on top of a [`StorageBackend`].
#[derive(Debug)]
pub struct VirtualFs<S> {
    storage: Arc<S>,
    shares: Arc<dyn ShareAccess>,
}

impl<S> Clone for VirtualFs<S> {
    fn clone(&self) -> Self {
        VirtualFs {
            storage: Arc::clone(&self.storage),
            shares: Arc::clone(&self.shares),
        }
    }
}

impl<S: StorageBackend> VirtualFs<S> {
    /// Creates a virtual filesystem over `storage` in which nobody can enter shared folders.
    pub fn new(storage: S) -> Self {
        VirtualFs::with_shares(Arc::new(storage), Arc::new(NoShares))
    }

    /// Creates a virtual filesystem that asks `shares` who may enter which shared folder.
    pub fn with_shares(storage: Arc<S>, shares: Arc<dyn ShareAccess>) -> Self {
        VirtualFs { storage, shares }
    }

    /// The storage back-end physical operations are delegated to.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Resolves `path` for `user`.
    pub fn resolve(&self, user: &User, path: &str) -> Resource {
        resource::resolve_with(user, path, self.shares.as_ref())
    }

    /// Whether `user` may modify `path`. Used to refuse whole requests before they start.
    pub fn check_modify(&self, user: &User, path: &str) -> bool {
        self.resolve(user, path).can_modify()
    }

    /// Returns the metadata of `path`.
    #[tracing_attributes::instrument(skip(self))]
    pub async fn stat(&self, user: &User, path: &str) -> Result<Entry<S::Metadata>> {
        match self.resolve(user, path) {
            Resource::Index => Ok(Entry::Virtual(VirtualEntry::new("/"))),
            Resource::SharesRoot => Ok(Entry::Virtual(VirtualEntry::new(SHARES))),
            r if r.can_open() => Ok(Entry::Physical(self.storage.metadata(r.physical_path()).await?)),
            _ => Err(denied(user, path)),
        }
    }

    /// Opens `path`. The virtual directories can always be opened; everything else needs
    /// permission to modify when `flags` can write, and permission to open otherwise.
    #[tracing_attributes::instrument(skip(self))]
    pub async fn open_file(&self, user: &User, path: &str, flags: OpenFlags) -> Result<OpenNode<S::File>> {
        let r = self.resolve(user, path);
        match r {
            Resource::Index => return Ok(OpenNode::Dir(index_dir(user))),
            Resource::SharesRoot => return Ok(OpenNode::Dir(shares_dir())),
            _ => {}
        }
        let allowed = if flags.is_write() { r.can_modify() } else { r.can_open() };
        if !allowed {
            return Err(denied(user, path));
        }
        let physical = r.physical_path();
        let file = self.storage.open(&physical, flags).await?;
        Ok(OpenNode::File { file, physical })
    }

    /// Lists the directory at `path`.
    #[tracing_attributes::instrument(skip(self))]
    pub async fn read_dir(&self, user: &User, path: &str) -> Result<Vec<Fileinfo<PathBuf, Entry<S::Metadata>>>> {
        match self.resolve(user, path) {
            Resource::Index => Ok(virtual_listing(index_dir(user))),
            Resource::SharesRoot => Ok(virtual_listing(shares_dir())),
            r if r.can_open() => {
                let list = self.storage.list(r.physical_path()).await?;
                Ok(list
                    .into_iter()
                    .map(|fi| Fileinfo {
                        path: fi.path,
                        metadata: Entry::Physical(fi.metadata),
                    })
                    .collect())
            }
            _ => Err(denied(user, path)),
        }
    }

    /// Creates the directory `path`. Its parent has to exist.
    #[tracing_attributes::instrument(skip(self))]
    pub async fn mkdir(&self, user: &User, path: &str) -> Result<()> {
        let r = self.modifiable(user, path)?;
        self.storage.create_dir(r.physical_path()).await
    }

    /// Removes `path` and everything below it.
    #[tracing_attributes::instrument(skip(self))]
    pub async fn remove_all(&self, user: &User, path: &str) -> Result<()> {
        let r = self.modifiable(user, path)?;
        self.storage.remove_all(r.physical_path()).await
    }

    /// Moves `from` to `to`. Nothing happens unless both may be modified.
    #[tracing_attributes::instrument(skip(self))]
    pub async fn rename(&self, user: &User, from: &str, to: &str) -> Result<()> {
        let source = self.modifiable(user, from)?;
        let target = self.modifiable(user, to)?;
        self.storage.rename(source.physical_path(), target.physical_path()).await
    }

    /// Copies `from` to `to`, replacing `to` if it is a file. Directories are copied with
    /// everything inside them. The source has to be readable and the target modifiable.
    #[tracing_attributes::instrument(skip(self))]
    pub async fn copy(&self, user: &User, from: &str, to: &str) -> Result<()> {
        let source = self.resolve(user, from);
        if !source.can_open() {
            return Err(denied(user, from));
        }
        let target = self.modifiable(user, to)?;
        let (source, target) = (source.physical_path(), target.physical_path());
        if target.starts_with(&source) {
            return Err(Error::new(ErrorKind::PermissionDenied, format!("cannot copy {from} into itself")));
        }

        let mut pending = vec![(source, target)];
        while let Some((src, dst)) = pending.pop() {
            if self.storage.metadata(&src).await?.is_dir() {
                self.storage.create_dir(&dst).await?;
                for fi in self.storage.list(&src).await? {
                    pending.push((src.join(&fi.path), dst.join(&fi.path)));
                }
            } else {
                self.copy_file(&src, &dst).await?;
            }
        }
        Ok(())
    }

    async fn copy_file(&self, from: &Path, to: &Path) -> Result<()> {
        let mut reader = self.storage.open(from, OpenFlags::READ).await?;
        let mut writer = self
            .storage
            .open(to, OpenFlags::WRITE | OpenFlags::CREATE | OpenFlags::TRUNCATE)
            .await?;
        tokio::io::copy(&mut reader, &mut writer).await?;
        writer.flush().await?;
        Ok(())
    }

    fn modifiable(&self, user: &User, path: &str) -> Result<Resource> {
        let r = self.resolve(user, path);
        if r.can_modify() { Ok(r) } else { Err(denied(user, path)) }
    }
}

fn index_dir(user: &User) -> VirtualDir {
    VirtualDir::new(
        VirtualEntry::new("/"),
        vec![VirtualEntry::new(user.username()), VirtualEntry::new(SHARES)],
    )
}

fn shares_dir() -> VirtualDir {
    VirtualDir::new(VirtualEntry::new(SHARES), vec![])
}

fn virtual_listing<M>(dir: VirtualDir) -> Vec<Fileinfo<PathBuf, Entry<M>>>
where
    M: Metadata,
{
    dir.children()
        .iter()
        .map(|child| Fileinfo {
            path: PathBuf::from(child.name()),
            metadata: Entry::Virtual(child.clone()),
        })
        .collect()
}

fn denied(user: &User, path: &str) -> Error {
    Error::new(ErrorKind::PermissionDenied, format!("{user} may not access {path}"))
}
