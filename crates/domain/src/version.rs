//! Protocol versions and the versioned layout table.
//!
//! The cube reports its BLE protocol version as a semantic-version string.
//! Every codec keys its byte layout on a [`FirmwareLayout`], resolved once
//! at connect time from [`LAYOUT_TABLE`]. Supporting a new firmware means
//! adding a row here and one row to each per-domain capability table.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Negotiated BLE protocol version of a cube.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ProtocolVersion(semver::Version);

impl ProtocolVersion {
    /// Oldest protocol version this crate knows how to speak.
    pub const BASELINE: Self = Self::new(2, 0, 0);

    /// Build a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(semver::Version::new(major, minor, patch))
    }

    /// Parse the version string reported by the cube.
    ///
    /// Trailing NUL padding and whitespace are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`semver::Error`] when the trimmed string is not a semantic
    /// version.
    pub fn parse(raw: &str) -> Result<Self, semver::Error> {
        let trimmed = raw.trim_matches(|c: char| c == '\0' || c.is_whitespace());
        semver::Version::parse(trimmed).map(Self)
    }

    /// Layout variant the codecs must use for this version.
    #[must_use]
    pub fn layout(&self) -> FirmwareLayout {
        FirmwareLayout::for_version(self)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ProtocolVersion {
    type Err = semver::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ProtocolVersion {
    type Error = semver::Error;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ProtocolVersion> for String {
    fn from(value: ProtocolVersion) -> Self {
        value.to_string()
    }
}

/// Byte-layout family selected by the negotiated protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FirmwareLayout {
    /// Protocol 2.0.x.
    V2_0,
    /// Protocol 2.1.x: untimed move, target and acceleration moves, shake.
    V2_1,
    /// Protocol 2.2.x: magnet and attitude settings.
    V2_2,
    /// Protocol 2.3.x and later: ID notification settings, magnet force.
    V2_3,
}

/// Minimum version for each layout, newest first.
pub const LAYOUT_TABLE: [(ProtocolVersion, FirmwareLayout); 4] = [
    (ProtocolVersion::new(2, 3, 0), FirmwareLayout::V2_3),
    (ProtocolVersion::new(2, 2, 0), FirmwareLayout::V2_2),
    (ProtocolVersion::new(2, 1, 0), FirmwareLayout::V2_1),
    (ProtocolVersion::new(2, 0, 0), FirmwareLayout::V2_0),
];

impl FirmwareLayout {
    /// Look up the layout for `version` in [`LAYOUT_TABLE`].
    ///
    /// Versions older than every row fall back to the oldest layout.
    #[must_use]
    pub fn for_version(version: &ProtocolVersion) -> Self {
        LAYOUT_TABLE
            .iter()
            .find(|(min, _)| version >= min)
            .map_or(Self::V2_0, |(_, layout)| *layout)
    }
}
