//! Firmware versions and the status output they are read from.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// A dotted firmware version such as `1.0.29.8`.
///
/// Up to four numeric components; missing trailing components are zero, so
/// `2.0` and `2.0.0.0` compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FirmwareVersion([u32; 4]);

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid firmware version {0:?}")]
pub struct VersionParseError(pub String);

impl FirmwareVersion {
    pub const fn new(major: u32, minor: u32, build: u32, revision: u32) -> Self {
        Self([major, minor, build, revision])
    }
}

impl FromStr for FirmwareVersion {
    type Err = VersionParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parts: Vec<&str> = trimmed.split('.').collect();
        if parts.len() < 2 || parts.len() > 4 {
            return Err(VersionParseError(s.to_string()));
        }

        let mut components = [0u32; 4];
        for (slot, part) in components.iter_mut().zip(&parts) {
            *slot = part
                .parse::<u32>()
                .map_err(|_| VersionParseError(s.to_string()))?;
        }
        Ok(Self(components))
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d] = self.0;
        write!(f, "{a}.{b}.{c}.{d}")
    }
}

/// What the device said about itself in response to `status`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceStatus {
    /// Lower-cased model token, e.g. `ht802`. Used to name asset files.
    pub model: Option<String>,
    pub version: Option<FirmwareVersion>,
}

const MODEL_MARKER: &str = "model:";
const PROGRAM_MARKER: &str = "program --";

/// Picks the model and program version out of `status` output.
///
/// Lines are matched on their content; everything after the marker is the
/// value and only its first token is kept. Echoed commands and banners are
/// ignored.
pub fn parse_status<I, S>(lines: I) -> DeviceStatus
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut status = DeviceStatus::default();
    for line in lines {
        let line = line.as_ref();
        let lower = line.to_ascii_lowercase();

        if status.model.is_none() {
            if let Some(value) = value_after(&lower, MODEL_MARKER) {
                status.model = Some(value.to_string());
            }
        }
        if status.version.is_none() {
            if let Some(value) = value_after(&lower, PROGRAM_MARKER) {
                status.version = value.parse().ok();
            }
        }
    }
    status
}

fn value_after<'a>(line: &'a str, marker: &str) -> Option<&'a str> {
    let start = line.find(marker)? + marker.len();
    line[start..].split_whitespace().next()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionComparison {
    UpToDate,
    NeedsUpgrade,
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FirmwareCheckResult {
    /// Latest version shipped in the local assets for this model.
    pub latest: Option<FirmwareVersion>,
    pub device: Option<FirmwareVersion>,
    pub model: Option<String>,
    pub outcome: VersionComparison,
}

impl FirmwareCheckResult {
    /// Missing local metadata means there is nothing to install, so the
    /// device counts as up to date.
    pub fn evaluate(latest: Option<FirmwareVersion>, status: DeviceStatus) -> Self {
        let outcome = match (latest, status.version) {
            (None, _) => VersionComparison::UpToDate,
            (Some(_), None) => VersionComparison::Unknown,
            (Some(latest), Some(device)) if device < latest => VersionComparison::NeedsUpgrade,
            (Some(_), Some(_)) => VersionComparison::UpToDate,
        };
        Self {
            latest,
            device: status.version,
            model: status.model,
            outcome,
        }
    }
}
