//! Sol range resolution
//!
//! Ranges are given as manifest indices. A negative index counts back from
//! the end of the manifest, so `-1` is the latest sol and `-10..=-1` the last
//! ten. Indices are never clamped: a range that reaches outside the manifest
//! is an error, while a range whose start lies after its end is simply empty.

use mars_common::types::{Manifest, SolRef};

use crate::error::ImportError;

/// A requested range of manifest indices, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SolRange {
    pub start: i64,
    pub end: i64,
}

/// Absolute manifest indices, inclusive on both ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedRange {
    pub start: i64,
    pub end: i64,
}

/// Resolve one index against a manifest of `total` sols.
pub fn resolve_index(index: i64, total: usize) -> i64 {
    if index < 0 {
        i64::try_from(total).unwrap_or(i64::MAX).saturating_add(index)
    } else {
        index
    }
}

impl SolRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    pub fn resolve(&self, total: usize) -> ResolvedRange {
        ResolvedRange {
            start: resolve_index(self.start, total),
            end: resolve_index(self.end, total),
        }
    }

    /// True when the range is empty whatever the manifest length.
    ///
    /// Holds when both ends count from the same side and start lies after
    /// end. Mixed-sign ranges need the manifest length to decide.
    pub fn is_empty_for_any_manifest(&self) -> bool {
        (self.start < 0) == (self.end < 0) && self.start > self.end
    }
}

impl ResolvedRange {
    pub fn is_empty(&self) -> bool {
        self.start > self.end
    }

    pub fn len(&self) -> usize {
        if self.is_empty() {
            0
        } else {
            usize::try_from(self.end - self.start + 1).unwrap_or(usize::MAX)
        }
    }

    /// Borrow the manifest entries covered by the range.
    ///
    /// Bounds are checked for the whole range up front, so either every
    /// sol is returned or none is.
    pub fn select<'m>(&self, manifest: &'m Manifest) -> Result<&'m [SolRef], ImportError> {
        if self.is_empty() {
            return Ok(&[]);
        }

        let total = manifest.len();
        let to_index = |index: i64| {
            usize::try_from(index)
                .ok()
                .filter(|i| *i < total)
                .ok_or(ImportError::RangeOutOfBounds { index, total })
        };

        let start = to_index(self.start)?;
        let end = to_index(self.end)?;

        Ok(&manifest.sols[start..=end])
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn manifest_of(total: usize) -> Manifest {
        Manifest::new(
            (0..total)
                .map(|i| SolRef::new(i as i64, format!("https://example.test/sol{}.json", i)))
                .collect(),
        )
    }

    #[test]
    fn test_default_range_resolves_from_the_end() {
        for total in [0usize, 1, 9, 10, 11, 250, 4_000] {
            let resolved = SolRange::new(-10, -1).resolve(total);
            assert_eq!(resolved.start, total as i64 - 10);
            assert_eq!(resolved.end, total as i64 - 1);
        }
    }

    #[test]
    fn test_non_negative_indices_are_used_as_is() {
        let resolved = SolRange::new(2, 40).resolve(5);
        assert_eq!(resolved, ResolvedRange { start: 2, end: 40 });
    }

    #[test]
    fn test_last_two_of_five() {
        let manifest = manifest_of(5);
        let resolved = SolRange::new(-2, -1).resolve(manifest.len());
        assert_eq!(resolved, ResolvedRange { start: 3, end: 4 });
        assert_eq!(resolved.len(), 2);

        let sols: Vec<i64> = resolved.select(&manifest).unwrap().iter().map(|s| s.sol).collect();
        assert_eq!(sols, vec![3, 4]);
    }

    #[test]
    fn test_start_after_end_is_empty() {
        let resolved = SolRange::new(4, 1).resolve(5);
        assert!(resolved.is_empty());
        assert_eq!(resolved.len(), 0);
        assert!(resolved.select(&manifest_of(5)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_range_is_not_bounds_checked() {
        let resolved = SolRange::new(100, 50).resolve(5);
        assert!(resolved.select(&manifest_of(5)).unwrap().is_empty());
    }

    #[test]
    fn test_empty_for_any_manifest() {
        assert!(SolRange::new(5, 2).is_empty_for_any_manifest());
        assert!(SolRange::new(-1, -3).is_empty_for_any_manifest());
        assert!(!SolRange::new(-10, -1).is_empty_for_any_manifest());
        assert!(!SolRange::new(2, 2).is_empty_for_any_manifest());
        // depends on the manifest length
        assert!(!SolRange::new(3, -1).is_empty_for_any_manifest());
        assert!(SolRange::new(3, -1).resolve(3).is_empty());
        assert!(!SolRange::new(3, -1).resolve(4).is_empty());
    }

    #[test]
    fn test_out_of_bounds_end_fails() {
        let manifest = manifest_of(5);
        let err = SolRange::new(0, 5).resolve(5).select(&manifest).unwrap_err();
        assert!(matches!(err, ImportError::RangeOutOfBounds { index: 5, total: 5 }));
    }

    #[test]
    fn test_out_of_bounds_start_fails() {
        let manifest = manifest_of(5);
        let resolved = SolRange::new(-10, -1).resolve(manifest.len());
        assert_eq!(resolved.start, -5);
        let err = resolved.select(&manifest).unwrap_err();
        assert!(matches!(err, ImportError::RangeOutOfBounds { index: -5, total: 5 }));
    }
}
