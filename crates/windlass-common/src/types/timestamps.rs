//! Writer-supplied timestamps.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A monotonically comparable 64-bit timestamp supplied by the writer.
///
/// The store never derives timestamps from wall-clock time; the value is
/// only ever compared, never interpreted.
///
/// # Example
///
/// ```rust
/// use windlass_common::types::Timestamp;
///
/// let a = Timestamp::new(1);
/// let b = Timestamp::from(2u64);
/// assert!(a < b);
/// ```
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Smallest timestamp.
    pub const ZERO: Self = Self(0);

    /// Largest timestamp.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates a timestamp from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({})", self.0)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    #[inline]
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    #[inline]
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamp_ordering() {
        let mut stamps = vec![Timestamp::new(3), Timestamp::ZERO, Timestamp::MAX, Timestamp::new(1)];
        stamps.sort();
        assert_eq!(
            stamps,
            vec![Timestamp::ZERO, Timestamp::new(1), Timestamp::new(3), Timestamp::MAX]
        );
    }

    #[test]
    fn test_timestamp_conversions() {
        let ts: Timestamp = 42u64.into();
        assert_eq!(u64::from(ts), 42);
        assert_eq!(format!("{:?}", ts), "Timestamp(42)");
        assert_eq!(ts.to_string(), "42");
    }
}
