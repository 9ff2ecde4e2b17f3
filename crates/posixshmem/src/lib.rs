//! Safe access to named POSIX shared memory segments.
//!
//! A segment is created once (`shm_open` + `ftruncate` + `mmap`), attached to
//! by any number of processes, and persists in the host-wide namespace until
//! it is explicitly unlinked.
//!
//! ```no_run
//! use posixshmem::{SharedMemorySegment, unlink};
//!
//! let mut producer = SharedMemorySegment::create("/example", 4096)?;
//! producer.write_at(0, &[1, 2, 3])?;
//!
//! let consumer = SharedMemorySegment::attach("/example")?;
//! assert_eq!(consumer.read_at(0, 3)?, &[1, 2, 3]);
//!
//! unlink("/example")?;
//! # Ok::<(), posixshmem::ShmError>(())
//! ```
//!
//! No locking is provided over the mapped bytes: concurrent writers must
//! bring their own synchronization.

pub mod descriptor;
pub mod errors;
pub mod mapping;
pub mod name;
pub mod options;
pub mod paths;
pub mod retry;
pub mod segment;
pub mod size;

pub use descriptor::{OpenMode, SegmentDescriptor};
pub use errors::{ErrorKind, ShmError};
pub use mapping::MappedRegion;
pub use name::SegmentName;
pub use options::{Access, ClosePolicy, SegmentOptions};
pub use retry::RetryConfig;
pub use segment::{SharedMemorySegment, unlink};

/// Exclusively create `name` with `size` bytes. See [`SharedMemorySegment::create`].
pub fn create(name: &str, size: usize) -> Result<SharedMemorySegment, ShmError> {
    SharedMemorySegment::create(name, size)
}

/// Attach to an existing `name`. See [`SharedMemorySegment::attach`].
pub fn attach(name: &str) -> Result<SharedMemorySegment, ShmError> {
    SharedMemorySegment::attach(name)
}
