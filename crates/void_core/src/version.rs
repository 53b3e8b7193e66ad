//! Semantic versions declared by plugin manifests

use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

/// `major.minor.patch`
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Version {
    pub major: u32,
    pub minor: u32,
    pub patch: u32,
}

impl Version {
    #[inline]
    pub const fn new(major: u32, minor: u32, patch: u32) -> Self {
        Self { major, minor, patch }
    }

    /// Version 0.0.0
    pub const ZERO: Version = Version::new(0, 0, 0);

    /// Parse "1", "1.2" or "1.2.3", with an optional leading `v` and an
    /// ignored pre-release/build suffix ("1.2.3-beta+7").
    pub fn parse(text: &str) -> EngineResult<Self> {
        let invalid = || EngineError::invalid_argument(format!("invalid version '{}'", text));

        let trimmed = text.trim();
        let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
        let core = trimmed
            .split(|c: char| c == '-' || c == '+')
            .next()
            .unwrap_or_default();
        if core.is_empty() {
            return Err(invalid());
        }

        let mut numbers = [0u32; 3];
        let mut count = 0;
        for part in core.split('.') {
            if count == numbers.len() {
                return Err(invalid());
            }
            numbers[count] = part.parse().map_err(|_| invalid())?;
            count += 1;
        }

        Ok(Self::new(numbers[0], numbers[1], numbers[2]))
    }

    /// Same major (or same minor before 1.0) and not older than `required`
    pub fn satisfies(&self, required: &Version) -> bool {
        if self.major == 0 && required.major == 0 {
            self.minor == required.minor && self.patch >= required.patch
        } else {
            self.major == required.major && self >= required
        }
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.major, self.minor, self.patch).cmp(&(other.major, other.minor, other.patch))
    }
}

impl FromStr for Version {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl fmt::Debug for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Version({})", self)
    }
}

impl Default for Version {
    fn default() -> Self {
        Self::new(0, 1, 0)
    }
}
