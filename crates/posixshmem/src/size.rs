use crate::descriptor::SegmentDescriptor;
use crate::errors::{self, ShmError};

/// Largest length `ftruncate` accepts (`off_t` is signed).
const MAX_SEGMENT_SIZE: u64 = i64::MAX as u64;

/// Set the backing size of a freshly created, not yet mapped segment.
///
/// Rejected for zero sizes, for segments this descriptor only opened, and
/// once a mapping exists: other processes may already map the object and
/// shrinking it under them is undefined.
pub fn set_size(descriptor: &SegmentDescriptor, size: usize) -> Result<(), ShmError> {
    let name = descriptor.name().as_str();
    let file = descriptor.file()?;

    if size == 0 {
        return Err(ShmError::invalid_size(name, "size must be greater than zero"));
    }
    if !descriptor.is_resizable() {
        return Err(ShmError::invalid_size(
            name,
            "only a newly created, unmapped segment can be sized",
        ));
    }
    if size as u64 > MAX_SEGMENT_SIZE {
        return Err(ShmError::invalid_size(
            name,
            format!("{size} bytes exceeds the maximum of {MAX_SEGMENT_SIZE}"),
        ));
    }

    file.set_len(size as u64)
        .map_err(|e| errors::from_io("ftruncate", name, e))?;

    tracing::debug!(segment = %descriptor.name(), size, "Sized shared memory object");
    Ok(())
}

/// Current backing size of the segment, from `fstat`.
pub fn query_size(descriptor: &SegmentDescriptor) -> Result<usize, ShmError> {
    let name = descriptor.name().as_str();
    let len = descriptor
        .file()?
        .metadata()
        .map_err(|e| errors::from_io("fstat", name, e))?
        .len();

    usize::try_from(len).map_err(|_| {
        ShmError::invalid_size(name, format!("{len} bytes cannot be addressed on this platform"))
    })
}
