//! This module contains types used throughout the groupware protocol.

use std::fmt;

/// The identifier the server assigns to each collection and item it stores.
///
/// Identifiers are unique for the lifetime of the store and are never reused,
/// so they are the stable handle a client keeps across sessions. The value `0`
/// is reserved for the universal root that every top-level collection hangs
/// off of; it is a sentinel and never refers to a real record.
pub type Id = u64;

/// Sentinel identifier of the universal root collection.
///
/// Ancestor chains are walked up to, but never include, this value.
pub const ROOT: Id = 0;

/// An inclusive range of identifiers, as used in `FETCH` and `STORE`
/// arguments.
///
/// The wire rendering follows the usual sequence-set shorthand: a range with
/// equal endpoints collapses to a single number, an increasing range renders
/// as `lo:hi`, and a range whose upper bound lies below its lower bound
/// renders as `lo:*`, meaning "from `lo` through the highest identifier the
/// server knows".
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct IdRange {
    /// Lower endpoint, inclusive.
    pub lo: Id,
    /// Upper endpoint, inclusive. A value below `lo` stands for "unbounded".
    pub hi: Id,
}

impl IdRange {
    /// Create a new range over `[lo, hi]`.
    pub fn new(lo: Id, hi: Id) -> IdRange {
        IdRange { lo, hi }
    }

    /// A range covering a single identifier.
    pub fn single(id: Id) -> IdRange {
        IdRange { lo: id, hi: id }
    }
}

impl fmt::Display for IdRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.lo == self.hi {
            write!(f, "{}", self.lo)
        } else if self.lo < self.hi {
            write!(f, "{}:{}", self.lo, self.hi)
        } else {
            write!(f, "{}:*", self.lo)
        }
    }
}

/// How deep a collection fetch descends from its target(s).
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FetchDepth {
    /// Only the listed collections themselves.
    Base,
    /// The listed collections and their immediate children.
    FirstLevel,
    /// The listed collections and their entire subtrees.
    Recursive,
}

mod record;
pub use self::record::FetchRecord;

mod capabilities;
pub use self::capabilities::CapabilitySet;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_single() {
        assert_eq!(IdRange::new(5, 5).to_string(), "5");
        assert_eq!(IdRange::single(7).to_string(), "7");
    }

    #[test]
    fn range_increasing() {
        assert_eq!(IdRange::new(5, 9).to_string(), "5:9");
    }

    #[test]
    fn range_unbounded() {
        assert_eq!(IdRange::new(9, 5).to_string(), "9:*");
    }
}
