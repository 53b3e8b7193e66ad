//! 128-bit identifiers
//!
//! [`Uuid`] identifies messages, handler registrations, windows and assets.
//! Random ids come from the `uuid` crate; name-derived ids use a stable
//! FNV-1a hash so the same text maps to the same id across runs.

use std::fmt;
use std::str::FromStr;

use crate::error::{EngineError, EngineResult};

const FNV_OFFSET: u64 = 0xcbf29ce484222325;
const FNV_PRIME: u64 = 0x100000001b3;
// Second lane of the 128-bit name hash starts from a different basis.
const FNV_OFFSET_HIGH: u64 = 0x6c62272e07bb0142;

/// 64-bit FNV-1a over `bytes` starting from `basis`
fn fnv1a(basis: u64, bytes: &[u8]) -> u64 {
    let mut hash = basis;
    for byte in bytes {
        hash ^= *byte as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    hash
}

/// A 128-bit identifier
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Uuid(uuid::Uuid);

impl Uuid {
    /// The all-zero id
    pub const NIL: Uuid = Uuid(uuid::Uuid::nil());

    /// Generate a random (variant 4) id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Build from a raw 128-bit value
    #[inline]
    pub const fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    /// Build from a 32-bit value stored in the low bits
    #[inline]
    pub const fn from_u32(value: u32) -> Self {
        Self::from_u128(value as u128)
    }

    /// Derive a stable id from text. Never returns [`Uuid::NIL`].
    pub fn from_name(name: &str) -> Self {
        let low = fnv1a(FNV_OFFSET, name.as_bytes());
        let high = fnv1a(FNV_OFFSET_HIGH, name.as_bytes());
        let value = ((high as u128) << 64) | low as u128;
        if value == 0 {
            Self::from_u32(1)
        } else {
            Self::from_u128(value)
        }
    }

    /// Raw 128-bit value
    #[inline]
    pub fn as_u128(&self) -> u128 {
        self.0.as_u128()
    }

    /// Raw bytes (big endian)
    #[inline]
    pub fn as_bytes(&self) -> &[u8; 16] {
        self.0.as_bytes()
    }

    /// True unless every byte is zero
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.0.is_nil()
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uuid({})", self.0.hyphenated())
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for Uuid {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        uuid::Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| EngineError::invalid_argument(format!("'{}' is not a uuid: {}", s, e)))
    }
}

impl From<u32> for Uuid {
    fn from(value: u32) -> Self {
        Self::from_u32(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_is_valid_and_unique() {
        let a = Uuid::generate();
        let b = Uuid::generate();
        assert!(a.is_valid());
        assert_ne!(a, b);
        assert!(!Uuid::NIL.is_valid());
    }

    #[test]
    fn test_string_form() {
        let id = Uuid::from_u32(0x2f);
        assert_eq!(id.to_string(), "00000000-0000-0000-0000-00000000002f");
        assert_eq!(id.to_string().parse::<Uuid>().unwrap(), id);
        assert!("not-a-uuid".parse::<Uuid>().is_err());
    }

    #[test]
    fn test_from_name_is_stable() {
        let a = Uuid::from_name("textures/a.png");
        let b = Uuid::from_name("textures/a.png");
        let c = Uuid::from_name("textures/b.png");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(Uuid::from_name("").is_valid());
    }

    #[test]
    fn test_ordering_is_lexicographic() {
        assert!(Uuid::from_u32(1) < Uuid::from_u32(2));
        assert!(Uuid::from_u128(1 << 100) > Uuid::from_u32(u32::MAX));
    }
}
