use crate::paths::DEFAULT_PERMISSIONS;

/// Protection requested for a mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Access {
    #[default]
    ReadWrite,
    ReadOnly,
}

impl Access {
    pub fn is_writable(self) -> bool {
        matches!(self, Access::ReadWrite)
    }
}

/// What `close()` does on a handle that is already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClosePolicy {
    /// Repeated close is a no-op
    #[default]
    Ignore,
    /// Repeated close returns `ShmError::AlreadyClosed`
    Strict,
}

/// Per-handle configuration for create/attach.
///
/// `permissions` only applies when a new object is created. `access` only
/// applies on attach: a creating handle must size the object, so it always
/// maps read-write.
#[derive(Debug, Clone)]
pub struct SegmentOptions {
    pub permissions: u32,
    pub access: Access,
    pub close_policy: ClosePolicy,
}

impl Default for SegmentOptions {
    fn default() -> Self {
        Self {
            permissions: DEFAULT_PERMISSIONS,
            access: Access::ReadWrite,
            close_policy: ClosePolicy::Ignore,
        }
    }
}

impl SegmentOptions {
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_access(mut self, access: Access) -> Self {
        self.access = access;
        self
    }

    pub fn with_close_policy(mut self, close_policy: ClosePolicy) -> Self {
        self.close_policy = close_policy;
        self
    }
}
