use crate::descriptor::SegmentDescriptor;
use crate::errors::{self, ShmError};
use crate::name::SegmentName;
use crate::options::Access;
use memmap2::{Mmap, MmapMut, MmapOptions};
use std::fmt;

enum Mapping {
    ReadOnly(Mmap),
    ReadWrite(MmapMut),
}

/// A `MAP_SHARED` view of a segment's bytes.
///
/// Writes land directly in the shared object and are visible to every other
/// mapping of the same name, with no copy-on-write. The region is unmapped
/// when it is dropped or passed to [`MappedRegion::unmap`]; ownership rules
/// out any access afterwards.
pub struct MappedRegion {
    mapping: Mapping,
    name: SegmentName,
}

impl MappedRegion {
    /// Map the first `size` bytes of the segment behind `descriptor`.
    ///
    /// Once mapped, the descriptor can no longer be sized.
    pub fn map(
        descriptor: &mut SegmentDescriptor,
        size: usize,
        access: Access,
    ) -> Result<Self, ShmError> {
        let name = descriptor.name().clone();
        let file = descriptor.file()?;

        if size == 0 {
            return Err(ShmError::invalid_size(
                name.as_str(),
                "cannot map an empty segment",
            ));
        }

        // SAFETY: the mapping is MAP_SHARED over a shm object we hold open.
        // Other processes may write concurrently; callers coordinate access.
        let mapping = match access {
            Access::ReadWrite => unsafe { MmapOptions::new().len(size).map_mut(file) }
                .map(Mapping::ReadWrite),
            Access::ReadOnly => {
                unsafe { MmapOptions::new().len(size).map(file) }.map(Mapping::ReadOnly)
            }
        }
        .map_err(|e| errors::from_io("mmap", name.as_str(), e))?;

        descriptor.seal_size();
        tracing::debug!(segment = %name, size, ?access, "Mapped shared memory segment");

        Ok(Self { mapping, name })
    }

    pub fn len(&self) -> usize {
        self.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn access(&self) -> Access {
        match self.mapping {
            Mapping::ReadOnly(_) => Access::ReadOnly,
            Mapping::ReadWrite(_) => Access::ReadWrite,
        }
    }

    pub fn as_slice(&self) -> &[u8] {
        match &self.mapping {
            Mapping::ReadOnly(mmap) => &mmap[..],
            Mapping::ReadWrite(mmap) => &mmap[..],
        }
    }

    pub fn as_mut_slice(&mut self) -> Result<&mut [u8], ShmError> {
        match &mut self.mapping {
            Mapping::ReadWrite(mmap) => Ok(&mut mmap[..]),
            Mapping::ReadOnly(_) => Err(ShmError::PermissionDenied {
                op: "write",
                name: self.name.to_string(),
            }),
        }
    }

    /// Force pending writes to the backing object (`msync`).
    ///
    /// tmpfs-backed segments have no slower storage behind them, so this
    /// mostly matters for platform parity. No-op on read-only mappings.
    pub fn flush(&self) -> Result<(), ShmError> {
        match &self.mapping {
            Mapping::ReadWrite(mmap) => mmap
                .flush()
                .map_err(|e| errors::from_io("msync", self.name.as_str(), e)),
            Mapping::ReadOnly(_) => Ok(()),
        }
    }

    pub fn unmap(self) {
        tracing::debug!(segment = %self.name, size = self.len(), "Unmapped shared memory segment");
        drop(self);
    }
}

impl fmt::Debug for MappedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MappedRegion")
            .field("name", &self.name)
            .field("len", &self.len())
            .field("access", &self.access())
            .finish()
    }
}
