//! Schema version numbers.
//!
//! Versions at or above 1000 encode `major*1000 + minor*10 + patch`;
//! versions below 1000 are pre-1.0 releases where `943` reads as `0.9.43`.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An integer schema version stamp.
///
/// # Examples
///
/// ```
/// use triplog_core::SchemaVersion;
///
/// let v = SchemaVersion::new(943);
/// assert_eq!(v.padded(), "0943");
/// assert_eq!(v.release_label(), "0.9.43");
/// assert_eq!(SchemaVersion::new(1012).release_label(), "1.1.2");
/// assert_eq!(SchemaVersion::parse_padded("0906"), Some(SchemaVersion::new(906)));
/// ```
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct SchemaVersion(i32);

impl SchemaVersion {
    /// Version number of the full-create script.
    pub const CREATE: SchemaVersion = SchemaVersion(0);

    pub const fn new(version: i32) -> Self {
        Self(version)
    }

    pub const fn get(self) -> i32 {
        self.0
    }

    /// Zero-padded form stored in the application metadata row and used in
    /// script names (at least four digits).
    pub fn padded(self) -> String {
        format!("{:04}", self.0)
    }

    /// Parses the zero-padded metadata form; surrounding whitespace is ignored.
    pub fn parse_padded(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        raw.parse().ok().map(Self)
    }

    /// Human-facing release label.
    pub fn release_label(self) -> String {
        let v = self.0;
        if v >= 1000 {
            format!("{}.{}.{}", v / 1000, (v % 1000) / 10, v % 10)
        } else {
            format!("0.{}.{:02}", v / 100, v % 100)
        }
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for SchemaVersion {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(SchemaVersion::new(901) < SchemaVersion::new(943));
        assert!(SchemaVersion::new(1000) > SchemaVersion::new(999));
    }

    #[test]
    fn test_padded_keeps_wide_versions() {
        assert_eq!(SchemaVersion::new(5).padded(), "0005");
        assert_eq!(SchemaVersion::new(12345).padded(), "12345");
    }

    #[test]
    fn test_release_label_pads_pre_1_0_patch() {
        assert_eq!(SchemaVersion::new(901).release_label(), "0.9.01");
        assert_eq!(SchemaVersion::new(906).release_label(), "0.9.06");
        assert_eq!(SchemaVersion::new(943).release_label(), "0.9.43");
        assert_eq!(SchemaVersion::new(1012).release_label(), "1.1.2");
    }

    #[test]
    fn test_parse_padded_rejects_garbage() {
        assert_eq!(SchemaVersion::parse_padded(" 0901 "), Some(SchemaVersion::new(901)));
        assert_eq!(SchemaVersion::parse_padded(""), None);
        assert_eq!(SchemaVersion::parse_padded("9.1"), None);
        assert_eq!(SchemaVersion::parse_padded("-901"), None);
    }
}
