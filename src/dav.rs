//! Lets `dav-server` drive the [`VirtualFs`].
//!
//! [`DavFs`] implements [`GuardedFileSystem`] with the authenticated [`User`] as credentials, so
//! the identity travels with every filesystem call the WebDAV engine makes.

use crate::vfs::{Entry, OpenNode, VirtualDir, VirtualFs};
use bytes::{Buf, Bytes};
use dav_server::{
    DavConfig, DavHandler,
    davpath::DavPath,
    fs::{DavDirEntry, DavFile, DavMetaData, FsError, FsFuture, FsResult, FsStream, GuardedFileSystem, OpenOptions, ReadDirMeta},
    memls::MemLs,
};
use futures::{FutureExt, stream};
use homedav_core::{
    auth::User,
    storage::{Error, ErrorKind, Fileinfo, Metadata, OpenFlags, StorageBackend},
};
use std::{
    fmt::{self, Debug, Formatter},
    io::SeekFrom,
    path::PathBuf,
    time::SystemTime,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

/// Builds the WebDAV handler serving `vfs`, with an in-memory lock manager.
pub fn handler<S>(vfs: VirtualFs<S>) -> DavHandler<User>
where
    S: StorageBackend + 'static,
{
    DavConfig::new()
        .filesystem(Box::new(DavFs::new(vfs)))
        .locksystem(MemLs::new())
        .build_handler()
}

/// The [`GuardedFileSystem`] on top of a [`VirtualFs`].
pub struct DavFs<S> {
    vfs: VirtualFs<S>,
}

impl<S: StorageBackend> DavFs<S> {
    /// Wraps `vfs`.
    pub fn new(vfs: VirtualFs<S>) -> Self {
        DavFs { vfs }
    }
}

impl<S> Clone for DavFs<S> {
    fn clone(&self) -> Self {
        DavFs { vfs: self.vfs.clone() }
    }
}

impl<S: StorageBackend> Debug for DavFs<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("DavFs").field("storage", &self.vfs.storage().name()).finish()
    }
}

impl<S> GuardedFileSystem<User> for DavFs<S>
where
    S: StorageBackend + 'static,
{
    fn open<'a>(&'a self, path: &'a DavPath, options: OpenOptions, user: &'a User) -> FsFuture<'a, Box<dyn DavFile>> {
        async move {
            let flags = open_flags(&options);
            match self.vfs.open_file(user, &dav_path(path), flags).await.map_err(fs_error)? {
                OpenNode::Dir(dir) => Ok(Box::new(VirtualFile { dir }) as Box<dyn DavFile>),
                OpenNode::File { file, physical } => Ok(Box::new(PhysicalFile {
                    file,
                    physical,
                    vfs: self.vfs.clone(),
                }) as Box<dyn DavFile>),
            }
        }
        .boxed()
    }

    fn read_dir<'a>(&'a self, path: &'a DavPath, _meta: ReadDirMeta, user: &'a User) -> FsFuture<'a, FsStream<Box<dyn DavDirEntry>>> {
        async move {
            let list = self.vfs.read_dir(user, &dav_path(path)).await.map_err(fs_error)?;
            let entries: Vec<FsResult<Box<dyn DavDirEntry>>> = list
                .into_iter()
                .map(|fi| Ok(Box::new(DirEntry::from(fi)) as Box<dyn DavDirEntry>))
                .collect();
            Ok(Box::pin(stream::iter(entries)) as FsStream<Box<dyn DavDirEntry>>)
        }
        .boxed()
    }

    fn metadata<'a>(&'a self, path: &'a DavPath, user: &'a User) -> FsFuture<'a, Box<dyn DavMetaData>> {
        async move {
            let entry = self.vfs.stat(user, &dav_path(path)).await.map_err(fs_error)?;
            Ok(Box::new(Meta::from_metadata(&entry)) as Box<dyn DavMetaData>)
        }
        .boxed()
    }

    fn create_dir<'a>(&'a self, path: &'a DavPath, user: &'a User) -> FsFuture<'a, ()> {
        async move { self.vfs.mkdir(user, &dav_path(path)).await.map_err(fs_error) }.boxed()
    }

    fn remove_dir<'a>(&'a self, path: &'a DavPath, user: &'a User) -> FsFuture<'a, ()> {
        async move { self.vfs.remove_all(user, &dav_path(path)).await.map_err(fs_error) }.boxed()
    }

    fn remove_file<'a>(&'a self, path: &'a DavPath, user: &'a User) -> FsFuture<'a, ()> {
        async move { self.vfs.remove_all(user, &dav_path(path)).await.map_err(fs_error) }.boxed()
    }

    fn rename<'a>(&'a self, from: &'a DavPath, to: &'a DavPath, user: &'a User) -> FsFuture<'a, ()> {
        async move { self.vfs.rename(user, &dav_path(from), &dav_path(to)).await.map_err(fs_error) }.boxed()
    }

    fn copy<'a>(&'a self, from: &'a DavPath, to: &'a DavPath, user: &'a User) -> FsFuture<'a, ()> {
        async move { self.vfs.copy(user, &dav_path(from), &dav_path(to)).await.map_err(fs_error) }.boxed()
    }
}

// The decoded request path, always starting with a `/`.
fn dav_path(path: &DavPath) -> String {
    path.as_pathbuf().to_string_lossy().into_owned()
}

fn open_flags(options: &OpenOptions) -> OpenFlags {
    let mut flags = OpenFlags::empty();
    flags.set(OpenFlags::READ, options.read);
    flags.set(OpenFlags::WRITE, options.write);
    flags.set(OpenFlags::APPEND, options.append);
    flags.set(OpenFlags::TRUNCATE, options.truncate);
    flags.set(OpenFlags::CREATE, options.create);
    flags.set(OpenFlags::CREATE_NEW, options.create_new);
    flags
}

/// Maps the storage error kinds onto what dav-server turns into status codes.
pub(crate) fn fs_error(err: Error) -> FsError {
    match err.kind() {
        ErrorKind::PermissionDenied | ErrorKind::DirectoryNotEmpty => FsError::Forbidden,
        ErrorKind::NotFound => FsError::NotFound,
        ErrorKind::AlreadyExists => FsError::Exists,
        ErrorKind::Unsupported => FsError::NotImplemented,
        ErrorKind::InsufficientStorage => FsError::InsufficientStorage,
        ErrorKind::LocalError => FsError::GeneralFailure,
    }
}

fn io_error(err: std::io::Error) -> FsError {
    fs_error(Error::from(err))
}

// dav-server needs metadata it can clone, so we keep a snapshot.
#[derive(Clone, Debug)]
struct Meta {
    len: u64,
    modified: Option<SystemTime>,
    is_dir: bool,
}

impl Meta {
    fn from_metadata<M: Metadata>(m: &M) -> Self {
        Meta {
            len: m.len(),
            modified: m.modified().ok(),
            is_dir: m.is_dir(),
        }
    }
}

impl DavMetaData for Meta {
    fn len(&self) -> u64 {
        self.len
    }

    fn modified(&self) -> FsResult<SystemTime> {
        self.modified.ok_or(FsError::GeneralFailure)
    }

    fn is_dir(&self) -> bool {
        self.is_dir
    }
}

struct DirEntry {
    name: Vec<u8>,
    meta: Meta,
}

impl<M: Metadata> From<Fileinfo<PathBuf, Entry<M>>> for DirEntry {
    fn from(fi: Fileinfo<PathBuf, Entry<M>>) -> Self {
        DirEntry {
            name: fi.path.as_os_str().as_encoded_bytes().to_vec(),
            meta: Meta::from_metadata(&fi.metadata),
        }
    }
}

impl DavDirEntry for DirEntry {
    fn name(&self) -> Vec<u8> {
        self.name.clone()
    }

    fn metadata(&self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        let meta = self.meta.clone();
        async move { Ok(Box::new(meta) as Box<dyn DavMetaData>) }.boxed()
    }
}

struct PhysicalFile<S: StorageBackend> {
    file: S::File,
    physical: PathBuf,
    vfs: VirtualFs<S>,
}

impl<S: StorageBackend> Debug for PhysicalFile<S> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhysicalFile").field("physical", &self.physical).finish()
    }
}

impl<S> DavFile for PhysicalFile<S>
where
    S: StorageBackend + 'static,
{
    fn metadata(&mut self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        async move {
            let meta = self.vfs.storage().metadata(&self.physical).await.map_err(fs_error)?;
            Ok(Box::new(Meta::from_metadata(&meta)) as Box<dyn DavMetaData>)
        }
        .boxed()
    }

    fn write_buf(&mut self, mut buf: Box<dyn Buf + Send>) -> FsFuture<'_, ()> {
        async move {
            let bytes = buf.copy_to_bytes(buf.remaining());
            self.file.write_all(&bytes).await.map_err(io_error)
        }
        .boxed()
    }

    fn write_bytes(&mut self, buf: Bytes) -> FsFuture<'_, ()> {
        async move { self.file.write_all(&buf).await.map_err(io_error) }.boxed()
    }

    fn read_bytes(&mut self, count: usize) -> FsFuture<'_, Bytes> {
        async move {
            let mut buf = vec![0u8; count];
            let mut filled = 0;
            while filled < count {
                let n = self.file.read(&mut buf[filled..]).await.map_err(io_error)?;
                if n == 0 {
                    break;
                }
                filled += n;
            }
            buf.truncate(filled);
            Ok(Bytes::from(buf))
        }
        .boxed()
    }

    fn seek(&mut self, pos: SeekFrom) -> FsFuture<'_, u64> {
        async move { self.file.seek(pos).await.map_err(io_error) }.boxed()
    }

    fn flush(&mut self) -> FsFuture<'_, ()> {
        async move { self.file.flush().await.map_err(io_error) }.boxed()
    }
}

#[derive(Debug)]
struct VirtualFile {
    dir: VirtualDir,
}

impl DavFile for VirtualFile {
    fn metadata(&mut self) -> FsFuture<'_, Box<dyn DavMetaData>> {
        let meta = Meta::from_metadata(self.dir.entry());
        async move { Ok(Box::new(meta) as Box<dyn DavMetaData>) }.boxed()
    }

    fn write_buf(&mut self, buf: Box<dyn Buf + Send>) -> FsFuture<'_, ()> {
        let result = self.dir.write(buf.chunk()).map(|_| ()).map_err(fs_error);
        async move { result }.boxed()
    }

    fn write_bytes(&mut self, buf: Bytes) -> FsFuture<'_, ()> {
        let result = self.dir.write(&buf).map(|_| ()).map_err(fs_error);
        async move { result }.boxed()
    }

    fn read_bytes(&mut self, count: usize) -> FsFuture<'_, Bytes> {
        let mut buf = vec![0u8; count];
        let result = self.dir.read(&mut buf).map(|_| Bytes::new()).map_err(fs_error);
        async move { result }.boxed()
    }

    fn seek(&mut self, pos: SeekFrom) -> FsFuture<'_, u64> {
        let result = self.dir.seek(pos).map_err(fs_error);
        async move { result }.boxed()
    }

    fn flush(&mut self) -> FsFuture<'_, ()> {
        async move { Ok(()) }.boxed()
    }
}
