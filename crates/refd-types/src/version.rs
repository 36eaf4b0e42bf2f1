use std::fmt;

use serde::{Deserialize, Serialize};

/// Per-object version counter used for optimistic concurrency and sync.
///
/// Stored as an unsigned 16-bit column, so a bump past the maximum **wraps
/// from 65535 to 0** rather than resetting to 1 or widening. Comparisons for
/// `newer=N` filtering are plain numeric comparisons on the stored value,
/// matching the storage column's behavior.
#[derive(
    Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct ObjectVersion(pub u16);

impl ObjectVersion {
    /// The initial version assigned at first save.
    pub const INITIAL: Self = Self(0);

    /// The next version after a mutating save.
    pub fn bumped(self) -> Self {
        Self(self.0.wrapping_add(1))
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Debug for ObjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

impl fmt::Display for ObjectVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn bump_increments() {
        assert_eq!(ObjectVersion(4).bumped(), ObjectVersion(5));
    }

    #[test]
    fn bump_wraps_at_max() {
        assert_eq!(ObjectVersion(u16::MAX).bumped(), ObjectVersion(0));
    }

    #[test]
    fn initial_is_zero() {
        assert_eq!(ObjectVersion::INITIAL.get(), 0);
    }

    proptest! {
        #[test]
        fn bump_differs_from_current(v: u16) {
            let version = ObjectVersion(v);
            prop_assert_ne!(version.bumped(), version);
        }
    }
}
