//! Types for use as [crate::Read::Cfg].

use core::ops::{Bound, RangeBounds};

/// Configuration for limiting the range of a value.
///
/// This is used to configure length limits for variable-length types.
///
/// # Examples
///
/// ```
/// use backpatch_codec::RangeCfg;
///
/// // Limit lengths to 0..=1024
/// let cfg = RangeCfg::new(0..=1024);
/// assert!(cfg.contains(&500));
/// assert!(!cfg.contains(&2000));
///
/// // Allow any length >= 1
/// let cfg_min = RangeCfg::from(1..);
/// assert!(cfg_min.contains(&1));
/// assert!(!cfg_min.contains(&0));
/// ```
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct RangeCfg {
    /// The lower bound of the range.
    start: Bound<usize>,

    /// The upper bound of the range.
    end: Bound<usize>,
}

impl From<core::ops::Range<usize>> for RangeCfg {
    fn from(r: core::ops::Range<usize>) -> Self {
        Self::new(r)
    }
}

impl From<core::ops::RangeInclusive<usize>> for RangeCfg {
    fn from(r: core::ops::RangeInclusive<usize>) -> Self {
        Self::new(r)
    }
}

impl From<core::ops::RangeFrom<usize>> for RangeCfg {
    fn from(r: core::ops::RangeFrom<usize>) -> Self {
        Self::new(r)
    }
}

impl From<core::ops::RangeTo<usize>> for RangeCfg {
    fn from(r: core::ops::RangeTo<usize>) -> Self {
        Self::new(r)
    }
}

impl From<core::ops::RangeFull> for RangeCfg {
    fn from(_: core::ops::RangeFull) -> Self {
        Self::new(..)
    }
}

impl RangeCfg {
    /// Creates a new `RangeCfg` from any type implementing `RangeBounds<usize>`.
    pub fn new(r: impl RangeBounds<usize>) -> Self {
        RangeCfg {
            start: r.start_bound().cloned(),
            end: r.end_bound().cloned(),
        }
    }

    /// Creates a `RangeCfg` that only accepts exactly `value`.
    pub fn exact(value: usize) -> Self {
        Self {
            start: Bound::Included(value),
            end: Bound::Included(value),
        }
    }

    /// Returns true if the value is within this range.
    pub fn contains(&self, value: &usize) -> bool {
        // Exclude by start bound
        match &self.start {
            Bound::Included(s) if value < s => return false,
            Bound::Excluded(s) if value <= s => return false,
            _ => {}
        }

        // Exclude by end bound
        match &self.end {
            Bound::Included(e) if value > e => return false,
            Bound::Excluded(e) if value >= e => return false,
            _ => {}
        }

        true
    }
}

impl RangeBounds<usize> for RangeCfg {
    fn start_bound(&self) -> Bound<&usize> {
        self.start.as_ref()
    }

    fn end_bound(&self) -> Bound<&usize> {
        self.end.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_cfg_contains() {
        let cfg_unbounded: RangeCfg = (..).into();
        assert!(cfg_unbounded.contains(&0));
        assert!(cfg_unbounded.contains(&usize::MAX));

        let cfg_end_excl: RangeCfg = (..10).into();
        assert!(cfg_end_excl.contains(&9));
        assert!(!cfg_end_excl.contains(&10));

        let cfg_incl_incl: RangeCfg = (5..=10).into();
        assert!(!cfg_incl_incl.contains(&4));
        assert!(cfg_incl_incl.contains(&5));
        assert!(cfg_incl_incl.contains(&10));
        assert!(!cfg_incl_incl.contains(&11));

        let cfg_exact = RangeCfg::exact(3);
        assert!(!cfg_exact.contains(&2));
        assert!(cfg_exact.contains(&3));
        assert!(!cfg_exact.contains(&4));
    }
}
