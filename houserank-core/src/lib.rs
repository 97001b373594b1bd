/// houserank-core: Pure insertion-ranking engine.
///
/// Ranked list + pairwise comparison log → next item to compare against →
/// final rank → renumbering plan for the rest of the list.
/// No IO, no storage, no locking. Bring your own judge.
///
/// Nothing is cached between calls: the feasible range is folded from the
/// full comparison log every time, so any prefix of a log replays to the
/// same point of the search.
///
/// # Quick start
///
/// ```rust
/// use houserank_core::{final_rank, next_comparison_subject, rebalance, Comparison, RankedItem};
///
/// let ranked = RankedItem::from_ordered(
///     ["Worst", "Bad", "OK", "Good", "Best"]
///         .iter()
///         .enumerate()
///         .map(|(i, title)| (format!("house-{i}"), title.to_string())),
/// );
///
/// let mut comparisons = Vec::new();
/// while let Some(subject) = next_comparison_subject(&ranked, &comparisons) {
///     // Ask the user. Here the new house beats "OK" but loses to "Bad".
///     let new_is_better = subject.payload == "OK";
///     comparisons.push(Comparison::against(subject, new_is_better).unwrap());
/// }
///
/// let rank = final_rank(&ranked, &comparisons);
/// assert_eq!(rank, 2);
///
/// let renumbered = rebalance(&ranked, rank);
/// assert_eq!(renumbered[2].rank, Some(3));
/// ```

pub mod range;
pub mod resolver;
pub mod types;

// Re-export primary public API at crate root.
pub use range::FeasibleRange;
pub use resolver::{
    final_rank, insertion_index, max_comparisons, next_comparison_subject, rebalance,
    rebalance_after_removal, resolve_with,
};
pub use types::{Comparison, Insertion, RankedItem};
