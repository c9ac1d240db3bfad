//! Wire Protocol Versions
//!
//! Nodes in a mixed-version cluster agree on a version identifier per payload.
//! The identifier orders releases monotonically and selects which shape of the
//! model plot wire format is written and read.
//!
//! Three thresholds matter to the model plot, in chronological order:
//! - `5.5.0`: timestamp becomes mandatory, the legacy id field is dropped,
//!   bucket span joins the wire format
//! - `6.0.0-rc1`: actual becomes an optional double
//! - `6.1.0`: detector index joins the wire format

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Build number used for a final release.
const RELEASE_BUILD: u32 = 99;
const BETA_BASE: u32 = 25;
const RC_BASE: u32 = 50;

/// Ordered release identifier.
///
/// The numeric id is `major * 1_000_000 + minor * 10_000 + revision * 100 + build`,
/// where `build` is 99 for a release, `alphaN` is N, `betaN` is 25 + N and
/// `rcN` is 50 + N. Comparing ids compares releases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Version {
    id: u32,
}

impl Version {
    pub const V_5_4_0: Version = Version::from_id(5_04_00_99);
    pub const V_5_5_0: Version = Version::from_id(5_05_00_99);
    pub const V_6_0_0_RC1: Version = Version::from_id(6_00_00_51);
    pub const V_6_0_0: Version = Version::from_id(6_00_00_99);
    pub const V_6_1_0: Version = Version::from_id(6_01_00_99);
    pub const CURRENT: Version = Version::V_6_1_0;

    pub const fn from_id(id: u32) -> Self {
        Self { id }
    }

    pub const fn id(&self) -> u32 {
        self.id
    }

    pub const fn major(&self) -> u32 {
        self.id / 1_000_000
    }

    pub const fn minor(&self) -> u32 {
        (self.id / 10_000) % 100
    }

    pub const fn revision(&self) -> u32 {
        (self.id / 100) % 100
    }

    pub const fn build(&self) -> u32 {
        self.id % 100
    }

    pub fn before(&self, other: Version) -> bool {
        *self < other
    }

    pub fn on_or_after(&self, other: Version) -> bool {
        *self >= other
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major(), self.minor(), self.revision())?;
        match self.build() {
            RELEASE_BUILD => Ok(()),
            b if b < BETA_BASE => write!(f, "-alpha{}", b),
            b if b < RC_BASE => write!(f, "-beta{}", b - BETA_BASE),
            b => write!(f, "-rc{}", b - RC_BASE),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal version format [{0}]")]
pub struct VersionParseError(String);

impl FromStr for Version {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || VersionParseError(s.to_string());
        let (numbers, qualifier) = match s.split_once('-') {
            Some((n, q)) => (n, Some(q)),
            None => (s, None),
        };

        let parts: Vec<u32> = numbers
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| err()))
            .collect::<Result<_, _>>()?;
        let &[major, minor, revision] = parts.as_slice() else {
            return Err(err());
        };
        if minor > 99 || revision > 99 || major > 4_000 {
            return Err(err());
        }

        let build = match qualifier {
            None => RELEASE_BUILD,
            Some(q) => {
                let (base, n) = if let Some(n) = q.strip_prefix("alpha") {
                    (0, n)
                } else if let Some(n) = q.strip_prefix("beta") {
                    (BETA_BASE, n)
                } else if let Some(n) = q.strip_prefix("rc") {
                    (RC_BASE, n)
                } else {
                    return Err(err());
                };
                let n: u32 = n.parse().map_err(|_| err())?;
                let limit = if base == RC_BASE { RELEASE_BUILD - RC_BASE } else { BETA_BASE };
                if n >= limit {
                    return Err(err());
                }
                base + n
            }
        };

        Ok(Version::from_id(
            major * 1_000_000 + minor * 10_000 + revision * 100 + build,
        ))
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Timestamp becomes mandatory; the legacy id field and bucket span change.
pub const TIMESTAMP_REQUIRED: Version = Version::V_5_5_0;
/// Actual is written as an optional double from here on.
pub const OPTIONAL_ACTUAL: Version = Version::V_6_0_0_RC1;
/// Detector index is on the wire from here on.
pub const DETECTOR_INDEX: Version = Version::V_6_1_0;

/// Which version-gated parts of the model plot wire format are present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WireShape {
    /// Timestamp is framed by a presence boolean.
    pub optional_timestamp: bool,
    /// An always-absent optional string stands in for the removed id field.
    pub legacy_id_placeholder: bool,
    /// Actual is an optional double; otherwise a required double.
    pub optional_actual: bool,
    /// Bucket span is written; otherwise it decodes as `0`.
    pub bucket_span: bool,
    /// Detector index is written; otherwise it decodes as `-1`.
    pub detector_index: bool,
}

impl WireShape {
    pub fn for_version(version: Version) -> Self {
        let timestamp_era = version.on_or_after(TIMESTAMP_REQUIRED);
        Self {
            optional_timestamp: !timestamp_era,
            legacy_id_placeholder: !timestamp_era,
            optional_actual: version.on_or_after(OPTIONAL_ACTUAL),
            bucket_span: timestamp_era,
            detector_index: version.on_or_after(DETECTOR_INDEX),
        }
    }
}
