use crate::BoxError;
use derive_more::Display;
use thiserror::Error;

/// The Error returned by storage back-ends and by the virtual filesystem sitting on top of them.
/// Implementations should pick the [`ErrorKind`] carefully since it determines the status code
/// the WebDAV client gets to see.
#[derive(Debug, Error)]
#[error("storage error: {kind}")]
pub struct Error {
    kind: ErrorKind,
    #[source]
    source: Option<BoxError>,
}

impl Error {
    /// Creates a new storage error
    pub fn new<E>(kind: ErrorKind, error: E) -> Error
    where
        E: Into<Box<dyn std::error::Error + Send + Sync>>,
    {
        Error {
            kind,
            source: Some(error.into()),
        }
    }

    /// Detailed information about what went wrong
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Attempts to get a reference to the inner `std::io::Error` if there is one.
    pub fn get_io_error(&self) -> Option<&std::io::Error> {
        self.source.as_ref()?.downcast_ref::<std::io::Error>()
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Error {
        Error { kind, source: None }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        let kind = match err.kind() {
            std::io::ErrorKind::NotFound => ErrorKind::NotFound,
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied,
            std::io::ErrorKind::AlreadyExists => ErrorKind::AlreadyExists,
            std::io::ErrorKind::DirectoryNotEmpty => ErrorKind::DirectoryNotEmpty,
            std::io::ErrorKind::StorageFull => ErrorKind::InsufficientStorage,
            std::io::ErrorKind::Unsupported => ErrorKind::Unsupported,
            _ => ErrorKind::LocalError,
        };
        Error::new(kind, err)
    }
}

/// The `ErrorKind` variants that can be produced by the [`StorageBackend`] implementations and
/// the virtual filesystem.
///
/// [`StorageBackend`]: trait.StorageBackend.html
#[derive(Copy, Clone, Eq, PartialEq, Debug, Display)]
pub enum ErrorKind {
    /// The caller may not perform the operation on this path. Either the path lies outside the
    /// caller's namespace or the operation would modify a folder that can't be modified.
    /// Never retried; maps to 403.
    #[display("Permission denied")]
    PermissionDenied,
    /// The file or directory does not exist. Maps to 404.
    #[display("File not found")]
    NotFound,
    /// The target of a create operation exists already. Maps to 405 for MKCOL.
    #[display("File exists")]
    AlreadyExists,
    /// A directory could not be removed because it still has entries.
    #[display("The directory is not empty")]
    DirectoryNotEmpty,
    /// The node can't do this. For example reading bytes from a virtual directory.
    #[display("Operation not supported")]
    Unsupported,
    /// No space left on the storage device. Maps to 507.
    #[display("Insufficient storage space")]
    InsufficientStorage,
    /// Any other failure of the storage back-end. Maps to 500.
    #[display("Local error")]
    LocalError,
}
