use crate::errors::ShmError;
use crate::paths::{NAME_MAX, NAME_SEPARATOR};
use std::fmt;

/// A validated shared memory object name, e.g. `/frames`.
///
/// Holds exactly one leading separator, no other separator, no NUL byte, and
/// at most [`NAME_MAX`] bytes in total. Names are case-sensitive.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SegmentName(String);

impl SegmentName {
    /// Validate `name` as-is. Pure: never touches the namespace.
    pub fn new(name: &str) -> Result<Self, ShmError> {
        let reject = |reason| {
            Err(ShmError::InvalidName {
                name: name.to_string(),
                reason,
            })
        };

        if name.is_empty() {
            return reject("name must not be empty");
        }
        let Some(rest) = name.strip_prefix(NAME_SEPARATOR) else {
            return reject("name must start with '/'");
        };
        if rest.is_empty() {
            return reject("name must contain characters after '/'");
        }
        if rest.contains(NAME_SEPARATOR) {
            return reject("name must not contain additional '/' characters");
        }
        if rest.contains('\0') {
            return reject("name must not contain NUL bytes");
        }
        if rest == "." || rest == ".." {
            return reject("name must not be '.' or '..'");
        }
        if name.len() > NAME_MAX {
            return reject("name length must be <= 255 bytes");
        }

        Ok(Self(name.to_string()))
    }

    /// Prepend the leading separator when missing, then validate.
    pub fn normalized(raw: &str) -> Result<Self, ShmError> {
        if raw.starts_with(NAME_SEPARATOR) {
            Self::new(raw)
        } else {
            Self::new(&format!("{NAME_SEPARATOR}{raw}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SegmentName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SegmentName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for SegmentName {
    type Error = ShmError;

    fn try_from(name: &str) -> Result<Self, Self::Error> {
        Self::new(name)
    }
}
