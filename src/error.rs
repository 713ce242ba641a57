//! Error handling stuff
use displaydoc::Display;
use std::io;
use thiserror::Error;

pub type Result<T, E = DiscoveryError> = std::result::Result<T, E>;

/// Error type for [`crate::discovery`] and everything below it
#[derive(Debug, Display, Error)]
pub enum DiscoveryError {
    /// IO Failed
    Io(#[from] io::Error),

    /// Couldn't parse a bus address out of device `{0}`
    Parse(String),

    /// Couldn't read attribute {0}: {1}
    AttributeRead(String, #[source] io::Error),

    /// Class device `{0}` has no underlying device
    NoDevice(String),
}

impl DiscoveryError {
    /// Whether this error is a parse failure.
    ///
    /// A present, but unreadable, adapter name counts as one.
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse(_) | Self::AttributeRead(..))
    }
}

/// Error text.
pub(crate) mod text {
    pub const CAPACITY: &str = "more sensors of one type than the table holds, ignoring feature";

    pub const DUPLICATE: &str = "trying to add duplicate feature to dynamic feature table";

    pub const REGISTRY_FULL: &str = "dynamic chip registry is full, not classifying chip";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_kinds() {
        assert!(DiscoveryError::Parse("foo".into()).is_parse());
        let read = DiscoveryError::AttributeRead(
            "/sys/class/i2c-adapter/i2c-0/device/name".into(),
            io::ErrorKind::PermissionDenied.into(),
        );
        assert!(read.is_parse());
        assert!(!DiscoveryError::NoDevice("hwmon0".into()).is_parse());
        assert!(!DiscoveryError::from(io::Error::from(io::ErrorKind::NotFound)).is_parse());
    }

    #[test]
    fn display() {
        assert_eq!(
            DiscoveryError::Parse("dell_smm-hwmon".into()).to_string(),
            "Couldn't parse a bus address out of device `dell_smm-hwmon`"
        );
        assert_eq!(
            DiscoveryError::NoDevice("hwmon3".into()).to_string(),
            "Class device `hwmon3` has no underlying device"
        );
    }
}
