use nix::errno::Errno;
use std::io;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ShmError {
    #[error("Invalid segment name `{name}`: {reason}")]
    InvalidName { name: String, reason: &'static str },

    #[error("Segment `{0}` already exists")]
    AlreadyExists(String),

    #[error("Segment `{0}` not found")]
    NotFound(String),

    #[error("Invalid size for segment `{name}`: {reason}")]
    InvalidSize { name: String, reason: String },

    #[error("Failed to map segment `{name}`: {source}")]
    Map {
        name: String,
        #[source]
        source: io::Error,
    },

    #[error("Permission denied: {op} on segment `{name}`")]
    PermissionDenied { op: &'static str, name: String },

    #[error("Segment `{0}` is already closed")]
    AlreadyClosed(String),

    #[error("{op} failed for segment `{name}`: {source}")]
    Os {
        op: &'static str,
        name: String,
        #[source]
        source: Errno,
    },

    #[error("IO error during {op} on segment `{name}`: {source}")]
    Io {
        op: &'static str,
        name: String,
        #[source]
        source: io::Error,
    },
}

/// Fieldless classification of [`ShmError`], for callers that branch on the
/// kind of failure (e.g. ignore `AlreadyExists`, abort on `PermissionDenied`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidName,
    AlreadyExists,
    NotFound,
    InvalidSize,
    Map,
    PermissionDenied,
    AlreadyClosed,
    Os,
}

impl ShmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ShmError::InvalidName { .. } => ErrorKind::InvalidName,
            ShmError::AlreadyExists(_) => ErrorKind::AlreadyExists,
            ShmError::NotFound(_) => ErrorKind::NotFound,
            ShmError::InvalidSize { .. } => ErrorKind::InvalidSize,
            ShmError::Map { .. } => ErrorKind::Map,
            ShmError::PermissionDenied { .. } => ErrorKind::PermissionDenied,
            ShmError::AlreadyClosed(_) => ErrorKind::AlreadyClosed,
            ShmError::Os { .. } | ShmError::Io { .. } => ErrorKind::Os,
        }
    }

    pub(crate) fn invalid_size(name: &str, reason: impl Into<String>) -> Self {
        ShmError::InvalidSize {
            name: name.to_string(),
            reason: reason.into(),
        }
    }
}

/// Translate an errno returned by `op` on segment `name` into a typed error.
///
/// The operation matters: `EINVAL` from `shm_open` means a malformed name,
/// from `ftruncate` an unacceptable size, and any non-permission failure of
/// `mmap`/`msync` is a mapping error.
pub fn translate(op: &'static str, name: &str, errno: Errno) -> ShmError {
    let name = name.to_string();
    match (op, errno) {
        (_, Errno::EACCES | Errno::EPERM) => ShmError::PermissionDenied { op, name },
        (_, Errno::ENOENT) => ShmError::NotFound(name),
        (_, Errno::EEXIST) => ShmError::AlreadyExists(name),
        ("shm_open" | "shm_unlink", Errno::EINVAL) => ShmError::InvalidName {
            name,
            reason: "rejected by the operating system",
        },
        ("shm_open" | "shm_unlink", Errno::ENAMETOOLONG) => ShmError::InvalidName {
            name,
            reason: "name too long for the operating system",
        },
        ("ftruncate", Errno::EINVAL | Errno::EFBIG) => ShmError::InvalidSize {
            name,
            reason: format!("backing storage rejected the size ({errno})"),
        },
        ("mmap" | "msync", errno) => ShmError::Map {
            name,
            source: io::Error::from_raw_os_error(errno as i32),
        },
        (op, source) => ShmError::Os { op, name, source },
    }
}

/// Translate a std I/O error (from `File` or `memmap2`) raised by `op`.
///
/// Errors carrying an OS code go through [`translate`]. The rest never came
/// from the kernel, so they are kept as-is (mapping errors stay `Map`).
pub fn from_io(op: &'static str, name: &str, err: io::Error) -> ShmError {
    match err.raw_os_error() {
        Some(code) => translate(op, name, Errno::from_raw(code)),
        None if matches!(op, "mmap" | "msync") => ShmError::Map {
            name: name.to_string(),
            source: err,
        },
        None => ShmError::Io {
            op,
            name: name.to_string(),
            source: err,
        },
    }
}
