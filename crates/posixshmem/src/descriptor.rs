use crate::errors::{self, ShmError};
use crate::name::SegmentName;
use crate::options::{Access, ClosePolicy};
use nix::fcntl::OFlag;
use nix::sys::mman::{shm_open, shm_unlink};
use nix::sys::stat::Mode;
use std::fs::File;
use std::os::fd::{AsRawFd, RawFd};

/// How `shm_open` treats the namespace entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Create a new object; fail with `AlreadyExists` if the name is bound
    CreateExclusive,
    /// Create the object if absent, otherwise open the existing one
    CreateOrOpen,
    /// Open an existing object; fail with `NotFound` if absent
    OpenExisting,
}

/// Bound on create/open flips when another process keeps creating and
/// unlinking the same name under `CreateOrOpen`.
const CREATE_OR_OPEN_ATTEMPTS: u32 = 8;

/// An open shared memory file descriptor, bound to one name.
///
/// The descriptor is owned exclusively and released exactly once, either by
/// [`SegmentDescriptor::close`] or on drop.
#[derive(Debug)]
pub struct SegmentDescriptor {
    file: Option<File>,
    name: SegmentName,
    created: bool,
    resizable: bool,
}

impl SegmentDescriptor {
    /// Open `name` according to `mode`.
    ///
    /// A newly created object is always opened read-write (it has to be
    /// sized); `access` applies when an existing object is opened.
    pub fn open(
        name: &SegmentName,
        mode: OpenMode,
        access: Access,
        permissions: u32,
    ) -> Result<Self, ShmError> {
        match mode {
            OpenMode::CreateExclusive => Self::open_create(name, permissions),
            OpenMode::OpenExisting => Self::open_existing(name, access),
            OpenMode::CreateOrOpen => {
                let mut last_err = None;
                for _ in 0..CREATE_OR_OPEN_ATTEMPTS {
                    match Self::open_create(name, permissions) {
                        Err(ShmError::AlreadyExists(_)) => {}
                        result => return result,
                    }
                    // Unlinked between the two calls: try creating again
                    match Self::open_existing(name, access) {
                        Err(e @ ShmError::NotFound(_)) => last_err = Some(e),
                        result => return result,
                    }
                }
                Err(last_err.unwrap_or_else(|| ShmError::NotFound(name.to_string())))
            }
        }
    }

    /// Exclusively create `name` with the given mode bits (subject to umask).
    pub fn open_create(name: &SegmentName, permissions: u32) -> Result<Self, ShmError> {
        let flags = OFlag::O_CREAT | OFlag::O_EXCL | OFlag::O_RDWR;
        let mode = Mode::from_bits_truncate(permissions as libc::mode_t);

        let fd = shm_open(name.as_str(), flags, mode)
            .map_err(|errno| errors::translate("shm_open", name.as_str(), errno))?;

        tracing::debug!(
            segment = %name,
            permissions = %format!("{permissions:o}"),
            "Created shared memory object"
        );

        Ok(Self {
            file: Some(File::from(fd)),
            name: name.clone(),
            created: true,
            resizable: true,
        })
    }

    /// Open an existing `name`.
    pub fn open_existing(name: &SegmentName, access: Access) -> Result<Self, ShmError> {
        let flags = if access.is_writable() {
            OFlag::O_RDWR
        } else {
            OFlag::O_RDONLY
        };

        let fd = shm_open(name.as_str(), flags, Mode::empty())
            .map_err(|errno| errors::translate("shm_open", name.as_str(), errno))?;

        tracing::debug!(segment = %name, ?access, "Opened shared memory object");

        Ok(Self {
            file: Some(File::from(fd)),
            name: name.clone(),
            created: false,
            resizable: false,
        })
    }

    /// Release the descriptor. Does not touch the namespace.
    ///
    /// On an already closed descriptor this is a no-op under
    /// [`ClosePolicy::Ignore`] and an `AlreadyClosed` error under
    /// [`ClosePolicy::Strict`].
    pub fn close(&mut self, policy: ClosePolicy) -> Result<(), ShmError> {
        match self.file.take() {
            Some(file) => {
                drop(file);
                tracing::debug!(segment = %self.name, "Closed shared memory descriptor");
                Ok(())
            }
            None => match policy {
                ClosePolicy::Ignore => Ok(()),
                ClosePolicy::Strict => Err(ShmError::AlreadyClosed(self.name.to_string())),
            },
        }
    }

    pub fn file(&self) -> Result<&File, ShmError> {
        self.file
            .as_ref()
            .ok_or_else(|| ShmError::AlreadyClosed(self.name.to_string()))
    }

    pub fn raw_fd(&self) -> Result<RawFd, ShmError> {
        Ok(self.file()?.as_raw_fd())
    }

    pub fn name(&self) -> &SegmentName {
        &self.name
    }

    /// Whether this descriptor created the object (as opposed to opening it)
    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_closed(&self) -> bool {
        self.file.is_none()
    }

    /// Whether the backing size may still be set: only a freshly created
    /// object that has not been mapped yet.
    pub(crate) fn is_resizable(&self) -> bool {
        self.resizable && !self.is_closed()
    }

    pub(crate) fn seal_size(&mut self) {
        self.resizable = false;
    }
}

/// Remove `name` from the namespace.
///
/// Existing mappings stay valid; later opens fail with `NotFound`. Unlinking
/// an absent name reports `NotFound` rather than succeeding silently.
pub fn unlink_name(name: &SegmentName) -> Result<(), ShmError> {
    shm_unlink(name.as_str())
        .map_err(|errno| errors::translate("shm_unlink", name.as_str(), errno))?;
    tracing::debug!(segment = %name, "Unlinked shared memory object");
    Ok(())
}
