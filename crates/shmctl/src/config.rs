use anyhow::Context;
use posixshmem::{Access, SegmentOptions, paths::DEFAULT_PERMISSIONS};
use std::env;

pub use common::Environment;

#[derive(Debug, Clone)]
pub struct ShmctlConfig {
    pub environment: Environment,
    /// Mode bits for segments created by `shmctl create`
    pub permissions: u32,
}

impl ShmctlConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let environment = Environment::from_env();

        let permissions = match env::var("SHMCTL_PERMISSIONS") {
            Ok(value) => crate::cli::parse_octal(&value)
                .map_err(anyhow::Error::msg)
                .context("Invalid SHMCTL_PERMISSIONS")?,
            Err(_) => DEFAULT_PERMISSIONS,
        };

        Ok(Self {
            environment,
            permissions,
        })
    }

    pub fn segment_options(&self, access: Access) -> SegmentOptions {
        SegmentOptions::default()
            .with_permissions(self.permissions)
            .with_access(access)
    }
}
