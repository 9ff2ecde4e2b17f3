use crate::descriptor::{OpenMode, SegmentDescriptor, unlink_name};
use crate::errors::ShmError;
use crate::mapping::MappedRegion;
use crate::name::SegmentName;
use crate::options::{Access, ClosePolicy, SegmentOptions};
use crate::retry::RetryConfig;
use crate::size::{query_size, set_size};
use std::os::fd::RawFd;

#[derive(Debug)]
enum SegmentState {
    // Field order matters: the region is unmapped before the fd closes
    Open {
        region: MappedRegion,
        descriptor: SegmentDescriptor,
    },
    Closed,
}

/// A named POSIX shared memory segment mapped into this process.
///
/// State machine: `Open` (mapped) → `Closed`. Closing unmaps the region and
/// releases the descriptor but leaves the name in the namespace; other
/// processes may still be attached. Only [`SharedMemorySegment::unlink`] or
/// the free function [`unlink`] removes the name.
///
/// After `close`, inspection (`name`, `size`, `is_created`, `is_closed`,
/// `access`) stays valid and every other operation returns
/// `ShmError::AlreadyClosed`. Dropping an open segment closes it; it never
/// unlinks.
///
/// The segment provides no cross-process synchronization. Concurrent
/// writers, in this process or others, must coordinate on their own.
#[derive(Debug)]
pub struct SharedMemorySegment {
    name: SegmentName,
    size: usize,
    created: bool,
    access: Access,
    close_policy: ClosePolicy,
    state: SegmentState,
}

impl SharedMemorySegment {
    /// Exclusively create `name` with `size` bytes and map it read-write.
    ///
    /// Fails with `AlreadyExists` if the name is bound. If sizing or mapping
    /// fails, the descriptor is closed and the name unlinked again, so no
    /// half-built segment is left in the namespace.
    pub fn create(name: &str, size: usize) -> Result<Self, ShmError> {
        Self::create_with(name, size, &SegmentOptions::default())
    }

    pub fn create_with(
        name: &str,
        size: usize,
        options: &SegmentOptions,
    ) -> Result<Self, ShmError> {
        let name = SegmentName::new(name)?;
        ensure_positive(&name, size)?;

        let descriptor = SegmentDescriptor::open(
            &name,
            OpenMode::CreateExclusive,
            Access::ReadWrite,
            options.permissions,
        )?;
        Self::finish_create(name, descriptor, size, options)
    }

    /// Create `name` if absent, otherwise attach to it.
    ///
    /// An existing segment is never resized: if its size differs from
    /// `size` the call fails with `InvalidSize`.
    pub fn create_or_attach(name: &str, size: usize) -> Result<Self, ShmError> {
        Self::create_or_attach_with(name, size, &SegmentOptions::default())
    }

    pub fn create_or_attach_with(
        name: &str,
        size: usize,
        options: &SegmentOptions,
    ) -> Result<Self, ShmError> {
        let name = SegmentName::new(name)?;
        ensure_positive(&name, size)?;

        let descriptor = SegmentDescriptor::open(
            &name,
            OpenMode::CreateOrOpen,
            options.access,
            options.permissions,
        )?;
        if descriptor.is_created() {
            return Self::finish_create(name, descriptor, size, options);
        }

        let existing = query_size(&descriptor)?;
        if existing != size {
            return Err(ShmError::invalid_size(
                name.as_str(),
                format!("existing segment has {existing} bytes, requested {size}"),
            ));
        }
        Self::finish_attach(name, descriptor, existing, options)
    }

    /// Attach to an existing segment, discovering its size with `fstat`.
    ///
    /// Fails with `NotFound` if the name is absent and `InvalidSize` if the
    /// object exists but has not been sized yet. Nothing in the namespace is
    /// rolled back on failure: the segment is not owned by this call.
    pub fn attach(name: &str) -> Result<Self, ShmError> {
        Self::attach_with(name, &SegmentOptions::default())
    }

    pub fn attach_with(name: &str, options: &SegmentOptions) -> Result<Self, ShmError> {
        let name = SegmentName::new(name)?;
        let descriptor = SegmentDescriptor::open(
            &name,
            OpenMode::OpenExisting,
            options.access,
            options.permissions,
        )?;
        let size = query_size(&descriptor)?;
        Self::finish_attach(name, descriptor, size, options)
    }

    /// Attach, retrying with exponential backoff while the segment is absent
    /// or still empty (its creator has not sized it yet).
    ///
    /// Other errors propagate immediately. Returns the last error once
    /// `config.max_attempts` are exhausted.
    pub fn attach_with_retry(
        name: &str,
        options: &SegmentOptions,
        config: &RetryConfig,
    ) -> Result<Self, ShmError> {
        let mut attempt = 0;
        loop {
            match Self::attach_with(name, options) {
                Err(e) if is_not_ready(&e) && attempt + 1 < config.max_attempts => {
                    let delay = config.delay_for_attempt(attempt);
                    tracing::debug!(
                        segment = name,
                        attempt,
                        ?delay,
                        error = %e,
                        "Segment not ready, retrying"
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    /// Async version of `attach_with_retry` using tokio
    ///
    /// Uses `tokio::time::sleep` instead of blocking thread sleep.
    #[cfg(feature = "tokio")]
    pub async fn attach_with_retry_async(
        name: &str,
        options: &SegmentOptions,
        config: &RetryConfig,
    ) -> Result<Self, ShmError> {
        let mut attempt = 0;
        loop {
            match Self::attach_with(name, options) {
                Err(e) if is_not_ready(&e) && attempt + 1 < config.max_attempts => {
                    let delay = config.delay_for_attempt(attempt);
                    tracing::debug!(
                        segment = name,
                        attempt,
                        ?delay,
                        error = %e,
                        "Segment not ready, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn finish_create(
        name: SegmentName,
        mut descriptor: SegmentDescriptor,
        size: usize,
        options: &SegmentOptions,
    ) -> Result<Self, ShmError> {
        let mapped = set_size(&descriptor, size)
            .and_then(|()| MappedRegion::map(&mut descriptor, size, Access::ReadWrite));

        match mapped {
            Ok(region) => {
                tracing::debug!(segment = %name, size, "Created shared memory segment");
                Ok(Self::open_state(name, region, descriptor, size, true, options))
            }
            Err(e) => {
                roll_back_creation(&name, descriptor, &e);
                Err(e)
            }
        }
    }

    fn finish_attach(
        name: SegmentName,
        mut descriptor: SegmentDescriptor,
        size: usize,
        options: &SegmentOptions,
    ) -> Result<Self, ShmError> {
        // On error the descriptor is dropped, which closes it
        let region = MappedRegion::map(&mut descriptor, size, options.access)?;
        tracing::debug!(
            segment = %name,
            size,
            access = ?options.access,
            "Attached to shared memory segment"
        );
        Ok(Self::open_state(name, region, descriptor, size, false, options))
    }

    fn open_state(
        name: SegmentName,
        region: MappedRegion,
        descriptor: SegmentDescriptor,
        size: usize,
        created: bool,
        options: &SegmentOptions,
    ) -> Self {
        Self {
            name,
            size,
            created,
            access: region.access(),
            close_policy: options.close_policy,
            state: SegmentState::Open { region, descriptor },
        }
    }

    /// Unmap the region and close the descriptor. The name stays bound.
    pub fn close(&mut self) -> Result<(), ShmError> {
        match std::mem::replace(&mut self.state, SegmentState::Closed) {
            SegmentState::Open {
                region,
                mut descriptor,
            } => {
                region.unmap();
                descriptor.close(self.close_policy)?;
                tracing::debug!(segment = %self.name, "Closed shared memory segment");
                Ok(())
            }
            SegmentState::Closed => match self.close_policy {
                ClosePolicy::Ignore => Ok(()),
                ClosePolicy::Strict => Err(self.closed_error()),
            },
        }
    }

    /// Remove this segment's name from the namespace.
    ///
    /// The mapping stays usable until `close`; later attaches fail with
    /// `NotFound`. A second unlink of the same name reports `NotFound`.
    pub fn unlink(&self) -> Result<(), ShmError> {
        self.ensure_open()?;
        unlink_name(&self.name)
    }

    pub fn buffer(&self) -> Result<&[u8], ShmError> {
        match &self.state {
            SegmentState::Open { region, .. } => Ok(region.as_slice()),
            SegmentState::Closed => Err(self.closed_error()),
        }
    }

    /// Mutable view of the whole segment; `PermissionDenied` on a read-only
    /// attach.
    pub fn buffer_mut(&mut self) -> Result<&mut [u8], ShmError> {
        match &mut self.state {
            SegmentState::Open { region, .. } => region.as_mut_slice(),
            SegmentState::Closed => Err(ShmError::AlreadyClosed(self.name.to_string())),
        }
    }

    /// Borrow `len` bytes starting at `offset`.
    pub fn read_at(&self, offset: usize, len: usize) -> Result<&[u8], ShmError> {
        let buffer = self.buffer()?;
        let end = self.checked_end(offset, len)?;
        Ok(&buffer[offset..end])
    }

    /// Copy `data` into the segment at `offset`.
    pub fn write_at(&mut self, offset: usize, data: &[u8]) -> Result<(), ShmError> {
        let end = self.checked_end(offset, data.len())?;
        let buffer = self.buffer_mut()?;
        buffer[offset..end].copy_from_slice(data);
        Ok(())
    }

    pub fn flush(&self) -> Result<(), ShmError> {
        match &self.state {
            SegmentState::Open { region, .. } => region.flush(),
            SegmentState::Closed => Err(self.closed_error()),
        }
    }

    /// Raw descriptor, for polling or other OS interop. Remains owned by the
    /// segment: do not close it.
    pub fn fd(&self) -> Result<RawFd, ShmError> {
        match &self.state {
            SegmentState::Open { descriptor, .. } => descriptor.raw_fd(),
            SegmentState::Closed => Err(self.closed_error()),
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn segment_name(&self) -> &SegmentName {
        &self.name
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether this handle created the object rather than attaching to it
    pub fn is_created(&self) -> bool {
        self.created
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, SegmentState::Closed)
    }

    pub fn access(&self) -> Access {
        self.access
    }

    fn ensure_open(&self) -> Result<(), ShmError> {
        if self.is_closed() {
            return Err(self.closed_error());
        }
        Ok(())
    }

    fn checked_end(&self, offset: usize, len: usize) -> Result<usize, ShmError> {
        offset
            .checked_add(len)
            .filter(|&end| end <= self.size)
            .ok_or_else(|| {
                ShmError::invalid_size(
                    self.name.as_str(),
                    format!(
                        "range {offset}+{len} exceeds segment of {} bytes",
                        self.size
                    ),
                )
            })
    }

    fn closed_error(&self) -> ShmError {
        ShmError::AlreadyClosed(self.name.to_string())
    }
}

impl Drop for SharedMemorySegment {
    fn drop(&mut self) {
        if !self.is_closed() {
            let _ = self.close();
        }
    }
}

/// Remove `name` from the namespace without holding a handle.
pub fn unlink(name: &str) -> Result<(), ShmError> {
    let name = SegmentName::new(name)?;
    unlink_name(&name)
}

fn ensure_positive(name: &SegmentName, size: usize) -> Result<(), ShmError> {
    if size == 0 {
        return Err(ShmError::invalid_size(
            name.as_str(),
            "size must be greater than zero",
        ));
    }
    Ok(())
}

fn is_not_ready(err: &ShmError) -> bool {
    matches!(err, ShmError::NotFound(_) | ShmError::InvalidSize { .. })
}

// Unlink before close: the name is released while this call still holds the
// object it created.
fn roll_back_creation(name: &SegmentName, mut descriptor: SegmentDescriptor, cause: &ShmError) {
    let unlinked = unlink_name(name);
    let _ = descriptor.close(ClosePolicy::Ignore);
    match unlinked {
        Ok(()) => {
            tracing::warn!(segment = %name, error = %cause, "Rolled back partially created segment");
        }
        Err(e) => {
            tracing::warn!(
                segment = %name,
                error = %cause,
                unlink_error = %e,
                "Failed to unlink partially created segment"
            );
        }
    }
}
