use homedav_core::storage::{Error, ErrorKind, Metadata, Result};
use std::time::SystemTime;

/// A directory entry that only exists in the namespace. It has no size, no content and was last
/// modified at the UNIX epoch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VirtualEntry {
    name: String,
}

impl VirtualEntry {
    pub(crate) fn new<S: Into<String>>(name: S) -> Self {
        VirtualEntry { name: name.into() }
    }

    /// The name the entry is listed under.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Metadata for VirtualEntry {
    fn len(&self) -> u64 {
        0
    }

    fn is_dir(&self) -> bool {
        true
    }

    fn is_file(&self) -> bool {
        false
    }

    fn is_symlink(&self) -> bool {
        false
    }

    fn modified(&self) -> Result<SystemTime> {
        Ok(SystemTime::UNIX_EPOCH)
    }
}

/// An opened virtual directory. It can be listed and stat'ed, but has no bytes to read or write.
#[derive(Clone, Debug)]
pub struct VirtualDir {
    entry: VirtualEntry,
    children: Vec<VirtualEntry>,
}

impl VirtualDir {
    pub(crate) fn new(entry: VirtualEntry, children: Vec<VirtualEntry>) -> Self {
        VirtualDir { entry, children }
    }

    /// The directory's own entry.
    pub fn entry(&self) -> &VirtualEntry {
        &self.entry
    }

    /// The entries listed in this directory.
    pub fn children(&self) -> &[VirtualEntry] {
        &self.children
    }

    /// Always fails, a virtual directory has no content.
    pub fn read(&mut self, _buf: &mut [u8]) -> Result<usize> {
        Err(unsupported("read from"))
    }

    /// Always fails, a virtual directory has no content.
    pub fn write(&mut self, _buf: &[u8]) -> Result<usize> {
        Err(unsupported("write to"))
    }

    /// Always fails, a virtual directory has no content.
    pub fn seek(&mut self, _pos: std::io::SeekFrom) -> Result<u64> {
        Err(unsupported("seek in"))
    }
}

fn unsupported(what: &str) -> Error {
    Error::new(ErrorKind::Unsupported, format!("cannot {what} a virtual directory"))
}
