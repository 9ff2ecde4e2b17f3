//! Platform constants for the POSIX shared memory namespace
//!
//! Named segments live in a kernel-backed filesystem (tmpfs on Linux) that is
//! shared by every process on the host. The name handed to `shm_open` is not a
//! path: it is a single component prefixed by one separator.

/// Separator every segment name starts with (and may not contain again)
pub const NAME_SEPARATOR: char = '/';

/// Maximum length of a segment name in bytes, leading separator included
pub const NAME_MAX: usize = 255;

/// Directory where Linux exposes shared memory objects as files
pub const SHM_DIR: &str = "/dev/shm";

/// Mode bits applied to newly created segments (owner read/write)
pub const DEFAULT_PERMISSIONS: u32 = 0o600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shm_dir_is_absolute() {
        assert!(SHM_DIR.starts_with(NAME_SEPARATOR));
    }

    #[test]
    fn test_default_permissions_are_owner_only() {
        assert_eq!(DEFAULT_PERMISSIONS & 0o077, 0, "Group/other bits must be clear");
        assert_eq!(DEFAULT_PERMISSIONS & 0o600, 0o600);
    }

    #[test]
    fn test_name_limit_matches_posix_name_max() {
        assert_eq!(NAME_MAX, 255);
    }
}
