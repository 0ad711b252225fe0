//! Kernel release parsing and comparison.
//!
//! Only the leading dotted numeric part of a release is significant:
//! `5.4.0-42-generic` compares as `5.4.0`. Missing trailing components
//! compare as zero, so `5.4` equals `5.4.0`.

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use fwlink_errors::KernelPolicyError;

/// Errors from parsing a kernel release.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KernelVersionError {
    /// No leading numeric component
    #[error("kernel version has no numeric component: '{0}'")]
    Empty(String),

    /// A component between dots is empty or too large
    #[error("invalid component '{component}' in kernel version '{raw}'")]
    InvalidComponent {
        /// Full input
        raw: String,
        /// Offending component
        component: String,
    },
}

impl From<KernelVersionError> for KernelPolicyError {
    fn from(e: KernelVersionError) -> Self {
        match e {
            KernelVersionError::Empty(raw) | KernelVersionError::InvalidComponent { raw, .. } => {
                KernelPolicyError::InvalidVersion(raw)
            }
        }
    }
}

/// Numeric kernel version.
#[derive(Debug, Clone)]
pub struct KernelVersion {
    components: Vec<u32>,
    raw: String,
}

impl KernelVersion {
    /// Parse a kernel release string.
    ///
    /// # Errors
    ///
    /// [`KernelVersionError`] if there is no leading `N(.N)*` part.
    pub fn parse(raw: &str) -> Result<Self, KernelVersionError> {
        let trimmed = raw.trim();
        let numeric = trimmed
            .split(|c: char| !(c.is_ascii_digit() || c == '.'))
            .next()
            .unwrap_or_default()
            .trim_end_matches('.');

        if numeric.is_empty() {
            return Err(KernelVersionError::Empty(raw.to_string()));
        }

        let components = numeric
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .ok()
                    .ok_or_else(|| KernelVersionError::InvalidComponent {
                        raw: raw.to_string(),
                        component: part.to_string(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            components,
            raw: trimmed.to_string(),
        })
    }

    /// Numeric components, most significant first.
    pub fn components(&self) -> &[u32] {
        &self.components
    }

    /// The string this version was parsed from.
    pub fn as_raw(&self) -> &str {
        &self.raw
    }

    /// Compare two release strings, `None` if either does not parse.
    pub fn try_compare(a: &str, b: &str) -> Option<Ordering> {
        let a = Self::parse(a).ok()?;
        let b = Self::parse(b).ok()?;
        Some(a.cmp(&b))
    }
}

impl PartialEq for KernelVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for KernelVersion {}

impl PartialOrd for KernelVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for KernelVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        (0..len)
            .map(|i| {
                let a = self.components.get(i).copied().unwrap_or(0);
                let b = other.components.get(i).copied().unwrap_or(0);
                a.cmp(&b)
            })
            .find(|ord| ord.is_ne())
            .unwrap_or(Ordering::Equal)
    }
}

impl fmt::Display for KernelVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for KernelVersion {
    type Err = KernelVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
