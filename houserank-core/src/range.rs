/// Feasible insertion range derived from a comparison log.
///
/// Never stored: every call folds the log again from `[0, len)`, so the
/// result depends only on the inputs and a log prefix always replays to the
/// same point of the search.
use crate::types::Comparison;

/// Half-open interval `[min_rank, max_rank)` of ranks still consistent with
/// the comparisons seen so far.
///
/// Contradictory logs are folded as-is. The interval may then be empty or
/// inverted (`min_rank > max_rank`); it is reported as collapsed and the
/// search stops. No consistency check is made.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FeasibleRange {
    pub min_rank: usize,
    pub max_rank: usize,
}

impl FeasibleRange {
    /// The untouched range for a list of `len` ranked items.
    pub fn full(len: usize) -> Self {
        FeasibleRange { min_rank: 0, max_rank: len }
    }

    /// Fold `comparisons` in order over the full range for `len` items.
    pub fn fold(len: usize, comparisons: &[Comparison]) -> Self {
        comparisons
            .iter()
            .fold(FeasibleRange::full(len), |range, c| range.tighten(c))
    }

    /// Apply one comparison. Re-applying the same comparison is a no-op.
    pub fn tighten(self, comparison: &Comparison) -> Self {
        if comparison.new_item_is_better {
            FeasibleRange {
                max_rank: self.max_rank.min(comparison.subject_rank),
                ..self
            }
        } else {
            FeasibleRange {
                min_rank: self.min_rank.max(comparison.subject_rank.saturating_add(1)),
                ..self
            }
        }
    }

    /// True once no further comparison can narrow the range.
    pub fn is_collapsed(&self) -> bool {
        self.min_rank >= self.max_rank
    }

    /// Rank of the next subject to compare against, or `None` when collapsed.
    pub fn midpoint(&self) -> Option<usize> {
        if self.is_collapsed() {
            return None;
        }
        Some(self.min_rank + (self.max_rank - self.min_rank) / 2)
    }

    /// Number of candidate ranks left to distinguish between.
    pub fn len(&self) -> usize {
        self.max_rank.saturating_sub(self.min_rank)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_range_is_open_for_nonempty_list() {
        let range = FeasibleRange::full(5);
        assert!(!range.is_collapsed());
        assert_eq!(range.midpoint(), Some(2));
        assert_eq!(range.len(), 5);
    }

    #[test]
    fn test_full_range_for_empty_list_is_collapsed() {
        let range = FeasibleRange::full(0);
        assert!(range.is_collapsed());
        assert_eq!(range.midpoint(), None);
    }

    #[test]
    fn test_tighten_better_lowers_max() {
        let range = FeasibleRange::full(5).tighten(&Comparison::new("c", 2, true));
        assert_eq!(range, FeasibleRange { min_rank: 0, max_rank: 2 });
    }

    #[test]
    fn test_tighten_worse_raises_min() {
        let range = FeasibleRange::full(5).tighten(&Comparison::new("c", 2, false));
        assert_eq!(range, FeasibleRange { min_rank: 3, max_rank: 5 });
    }

    #[test]
    fn test_tighten_never_widens() {
        let narrowed = FeasibleRange { min_rank: 2, max_rank: 3 };
        assert_eq!(narrowed.tighten(&Comparison::new("a", 4, true)), narrowed);
        assert_eq!(narrowed.tighten(&Comparison::new("b", 0, false)), narrowed);
    }

    #[test]
    fn test_contradictory_log_inverts_and_collapses() {
        // Better than rank 1, then worse than rank 3.
        let log = vec![Comparison::new("b", 1, true), Comparison::new("d", 3, false)];
        let range = FeasibleRange::fold(5, &log);
        assert_eq!(range, FeasibleRange { min_rank: 4, max_rank: 1 });
        assert!(range.is_collapsed());
        assert!(range.is_empty());
        assert_eq!(range.midpoint(), None);
    }

    #[test]
    fn test_huge_subject_rank_does_not_overflow() {
        let range = FeasibleRange::full(3).tighten(&Comparison::new("x", usize::MAX, false));
        assert_eq!(range.min_rank, usize::MAX);
        assert!(range.is_collapsed());
    }
}
