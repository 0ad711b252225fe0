//! Version-format tags.
//!
//! The tag only says how a version string should be displayed and
//! compared by the host; nothing here parses firmware versions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a device's version string is laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VersionFormat {
    /// Not yet known
    #[default]
    Unknown,
    /// Opaque string
    Plain,
    /// `major.minor`
    Pair,
    /// `major.minor.micro`
    Triplet,
    /// `a.b.c.d`
    Quad,
    /// Single integer
    Number,
}

impl VersionFormat {
    /// Stable lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            VersionFormat::Unknown => "unknown",
            VersionFormat::Plain => "plain",
            VersionFormat::Pair => "pair",
            VersionFormat::Triplet => "triplet",
            VersionFormat::Quad => "quad",
            VersionFormat::Number => "number",
        }
    }
}

impl fmt::Display for VersionFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VersionFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(VersionFormat::Unknown),
            "plain" => Ok(VersionFormat::Plain),
            "pair" => Ok(VersionFormat::Pair),
            "triplet" => Ok(VersionFormat::Triplet),
            "quad" => Ok(VersionFormat::Quad),
            "number" => Ok(VersionFormat::Number),
            other => Err(format!("unknown version format: {other}")),
        }
    }
}
