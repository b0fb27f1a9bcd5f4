//! Partition keys.

use bytes::Bytes;
use std::borrow::Borrow;
use std::fmt;
use std::ops::Deref;

/// An opaque key identifying a group of rows that share window scope.
///
/// Keys compare by raw bytes, which fixes the natural scan order of a
/// table: partitions in ascending key order.
///
/// # Example
///
/// ```rust
/// use windlass_common::types::PartitionKey;
///
/// let a = PartitionKey::from_str("5");
/// let b = PartitionKey::from_str("55");
/// assert!(a < b);
/// ```
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PartitionKey(Bytes);

impl PartitionKey {
    /// Creates a key from a byte slice.
    #[inline]
    #[must_use]
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(Bytes::copy_from_slice(bytes))
    }

    /// Creates a key from a string.
    #[inline]
    #[must_use]
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }

    /// Returns the length of the key in bytes.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the key is empty.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the key as a byte slice.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl Deref for PartitionKey {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for PartitionKey {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl Borrow<[u8]> for PartitionKey {
    fn borrow(&self) -> &[u8] {
        &self.0
    }
}

impl From<&str> for PartitionKey {
    fn from(s: &str) -> Self {
        Self::from_str(s)
    }
}

impl From<String> for PartitionKey {
    fn from(s: String) -> Self {
        Self(Bytes::from(s.into_bytes()))
    }
}

impl From<&[u8]> for PartitionKey {
    fn from(bytes: &[u8]) -> Self {
        Self::from_bytes(bytes)
    }
}

impl fmt::Debug for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(s) => write!(f, "PartitionKey({:?})", s),
            Err(_) => write!(f, "PartitionKey({:02x?})", &self.0[..]),
        }
    }
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_order_is_bytewise() {
        let mut keys: Vec<PartitionKey> = ["55", "5", "6", ""].iter().map(|s| (*s).into()).collect();
        keys.sort();
        let names: Vec<String> = keys.iter().map(ToString::to_string).collect();
        assert_eq!(names, vec!["", "5", "55", "6"]);
    }

    #[test]
    fn test_key_debug_formats() {
        assert_eq!(format!("{:?}", PartitionKey::from_str("k1")), "PartitionKey(\"k1\")");
        let raw = PartitionKey::from_bytes(&[0xff, 0x00]);
        assert_eq!(format!("{:?}", raw), "PartitionKey([ff, 00])");
        assert_eq!(raw.len(), 2);
    }
}
