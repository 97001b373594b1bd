/// Insertion ranking by binary search over a comparison log.
///
/// Every function here is a pure function of its arguments. Callers hand in
/// the ranked list (ascending rank, so position == rank) and the comparisons
/// gathered so far; nothing is remembered between calls.
///
/// Callers must serialize insertion sessions per ranking scope themselves:
/// two sessions computed against the same stale list will produce
/// overlapping ranks, and nothing in this module can notice.
use std::cmp::Ordering;

use crate::range::FeasibleRange;
use crate::types::{Comparison, Insertion, RankedItem};

/// Pick the ranked item the new item should be compared against next.
///
/// Returns `None` when the list is empty (the new item simply takes rank 0)
/// or when the comparisons have collapsed the feasible range.
pub fn next_comparison_subject<'a, T>(
    ranked_items: &'a [RankedItem<T>],
    comparisons: &[Comparison],
) -> Option<&'a RankedItem<T>> {
    if ranked_items.is_empty() {
        return None;
    }
    let mid = FeasibleRange::fold(ranked_items.len(), comparisons).midpoint()?;
    ranked_items.get(mid)
}

/// Rank the new item takes given the comparisons so far.
///
/// Usually called once `next_comparison_subject` returns `None`, but calling
/// it early is allowed: the lower bound of the feasible range is returned.
/// With no comparisons that is 0, so an unjudged item becomes the new best.
/// Always within `0..=ranked_items.len()`.
pub fn final_rank<T>(ranked_items: &[RankedItem<T>], comparisons: &[Comparison]) -> usize {
    let len = ranked_items.len();
    FeasibleRange::fold(len, comparisons).min_rank.min(len)
}

/// Shift existing items to open a gap at `inserted_rank`.
///
/// Items ranked at or after `inserted_rank` move down the list by one.
/// Earlier items and unranked items are passed through unchanged.
pub fn rebalance<T: Clone>(ranked_items: &[RankedItem<T>], inserted_rank: usize) -> Vec<RankedItem<T>> {
    ranked_items
        .iter()
        .map(|item| match item.rank {
            Some(rank) if rank >= inserted_rank => item.shifted_up(),
            _ => item.clone(),
        })
        .collect()
}

/// Close the gap left by removing the item at `removed_rank`.
///
/// The removed item comes back unranked (`rank: None`), items after it move
/// up the list by one, everything else is unchanged.
pub fn rebalance_after_removal<T: Clone>(
    ranked_items: &[RankedItem<T>],
    removed_rank: usize,
) -> Vec<RankedItem<T>> {
    ranked_items
        .iter()
        .map(|item| match item.rank {
            Some(rank) if rank == removed_rank => RankedItem {
                rank: None,
                ..item.clone()
            },
            Some(rank) if rank > removed_rank => item.shifted_down(),
            _ => item.clone(),
        })
        .collect()
}

/// Insertion point for `new_item` in `sorted_items` under a three-way comparator.
///
/// `compare(new_item, existing)` returning `Less` means the new item sorts
/// before `existing`. Ties go after equal elements, so repeated insertion of
/// equal items is stable.
pub fn insertion_index<T, U, F>(sorted_items: &[T], new_item: &U, mut compare: F) -> usize
where
    F: FnMut(&U, &T) -> Ordering,
{
    let mut left = 0;
    let mut right = sorted_items.len();

    while left < right {
        let mid = left + (right - left) / 2;
        if compare(new_item, &sorted_items[mid]) == Ordering::Less {
            right = mid;
        } else {
            left = mid + 1;
        }
    }

    left
}

/// Worst-case number of comparisons needed to place an item among `num_ranked`.
///
/// This is `ceil(log2(num_ranked + 1))`.
pub fn max_comparisons(num_ranked: usize) -> usize {
    let candidates = num_ranked as u128 + 1;
    (u128::BITS - (candidates - 1).leading_zeros()) as usize
}

/// Run the whole search with a direct judge instead of an interactive log.
///
/// `judge(subject)` answers "is the new item better than `subject`?". The
/// search stops early if it lands on an unranked subject, since there is no
/// rank to record against it.
pub fn resolve_with<T, F>(ranked_items: &[RankedItem<T>], mut judge: F) -> Insertion
where
    F: FnMut(&RankedItem<T>) -> bool,
{
    let mut comparisons = Vec::new();

    while let Some(subject) = next_comparison_subject(ranked_items, &comparisons) {
        let better = judge(subject);
        let Some(comparison) = Comparison::against(subject, better) else {
            break;
        };
        comparisons.push(comparison);
    }

    Insertion {
        rank: final_rank(ranked_items, &comparisons),
        comparisons,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn make_list(titles: &[&str]) -> Vec<RankedItem<String>> {
        RankedItem::from_ordered(
            titles
                .iter()
                .enumerate()
                .map(|(i, t)| ((i + 1).to_string(), t.to_string())),
        )
    }

    fn numbered(n: usize) -> Vec<RankedItem<usize>> {
        RankedItem::from_ordered((0..n).map(|i| (format!("h{i}"), i)))
    }

    fn cmp(rank: usize, better: bool) -> Comparison {
        Comparison::new(format!("h{rank}"), rank, better)
    }

    /// Drive the search as if the new item belongs exactly at `target`.
    fn converge(list: &[RankedItem<usize>], target: usize) -> Insertion {
        resolve_with(list, |subject| subject.rank.unwrap_or_default() >= target)
    }

    #[test]
    fn test_empty_list_base_case() {
        let empty: Vec<RankedItem<()>> = Vec::new();
        assert!(next_comparison_subject(&empty, &[]).is_none());
        assert_eq!(final_rank(&empty, &[]), 0);
    }

    #[test]
    fn test_single_item_converges_after_one_comparison() {
        let list = numbered(1);
        assert_eq!(next_comparison_subject(&list, &[]).map(|h| h.payload), Some(0));

        let better = vec![cmp(0, true)];
        assert!(next_comparison_subject(&list, &better).is_none());
        assert_eq!(final_rank(&list, &better), 0);

        let worse = vec![cmp(0, false)];
        assert!(next_comparison_subject(&list, &worse).is_none());
        assert_eq!(final_rank(&list, &worse), 1);
    }

    #[test]
    fn test_first_subject_is_midpoint() {
        let list = numbered(5);
        let subject = next_comparison_subject(&list, &[]).unwrap();
        assert_eq!(subject.rank, Some(2));

        let list = numbered(4);
        assert_eq!(next_comparison_subject(&list, &[]).unwrap().rank, Some(2));
    }

    #[test]
    fn test_house_scenario() {
        let list = make_list(&["Worst", "Bad", "OK", "Good", "Best"]);

        let first = next_comparison_subject(&list, &[]).unwrap();
        assert_eq!(first.payload, "OK");

        let mut log = vec![Comparison::against(first, true).unwrap()];
        let second = next_comparison_subject(&list, &log).unwrap();
        assert_eq!(second.payload, "Bad");
        assert_eq!(second.id, "2");

        log.push(Comparison::against(second, false).unwrap());
        assert!(next_comparison_subject(&list, &log).is_none());
        assert_eq!(final_rank(&list, &log), 2);
    }

    #[test]
    fn test_final_rank_best_and_worst() {
        let list = numbered(5);
        let best = vec![cmp(2, true), cmp(1, true), cmp(0, true)];
        assert_eq!(final_rank(&list, &best), 0);

        let worst = vec![cmp(2, false), cmp(3, false), cmp(4, false)];
        assert_eq!(final_rank(&list, &worst), 5);
    }

    #[test]
    fn test_final_rank_without_comparisons_is_zero() {
        assert_eq!(final_rank(&numbered(7), &[]), 0);
    }

    #[test]
    fn test_converges_to_every_target_within_budget() {
        for n in 0..=40 {
            let list = numbered(n);
            let budget = max_comparisons(n);
            for target in 0..=n {
                let insertion = converge(&list, target);
                assert_eq!(insertion.rank, target, "n={n} target={target}");
                assert!(
                    insertion.comparisons.len() <= budget,
                    "n={n} target={target}: {} comparisons > {budget}",
                    insertion.comparisons.len(),
                );
            }
        }
    }

    #[test]
    fn test_converges_on_random_large_lists() {
        let mut rng = rand::rng();
        for _ in 0..50 {
            let n = rng.random_range(1..2000);
            let target = rng.random_range(0..=n);
            let insertion = converge(&numbered(n), target);
            assert_eq!(insertion.rank, target);
            assert!(insertion.comparisons.len() <= max_comparisons(n));
        }
    }

    #[test]
    fn test_log_prefix_replays_same_search() {
        let list = numbered(20);
        let insertion = converge(&list, 13);
        for k in 0..insertion.comparisons.len() {
            let subject = next_comparison_subject(&list, &insertion.comparisons[..k]).unwrap();
            assert_eq!(subject.id, insertion.comparisons[k].subject_id);
            assert_eq!(subject.rank, Some(insertion.comparisons[k].subject_rank));
        }
        assert!(next_comparison_subject(&list, &insertion.comparisons).is_none());
    }

    #[test]
    fn test_duplicate_comparisons_are_idempotent() {
        let list = numbered(9);
        let log = vec![cmp(4, false), cmp(6, true)];
        let mut doubled = log.clone();
        doubled.push(cmp(4, false));
        doubled.push(cmp(6, true));

        assert_eq!(
            next_comparison_subject(&list, &log).map(|h| &h.id),
            next_comparison_subject(&list, &doubled).map(|h| &h.id),
        );
        assert_eq!(final_rank(&list, &log), final_rank(&list, &doubled));
    }

    #[test]
    fn test_contradictory_log_is_accepted_silently() {
        let list = numbered(5);
        // Better than rank 1, then worse than rank 3: no consistent position.
        let log = vec![cmp(1, true), cmp(3, false)];
        assert!(next_comparison_subject(&list, &log).is_none());
        // Last-tightened bound wins.
        assert_eq!(final_rank(&list, &log), 4);
    }

    #[test]
    fn test_final_rank_clamped_for_out_of_range_subject() {
        let list = numbered(3);
        let log = vec![cmp(10, false)];
        assert_eq!(final_rank(&list, &log), 3);
        assert!(next_comparison_subject(&list, &log).is_none());
    }

    #[test]
    fn test_rebalance_shifts_only_items_at_or_after_rank() {
        for n in 0..8 {
            let mut list = numbered(n);
            list.push(RankedItem::new("unranked", None, 99));

            for k in 0..=n {
                let shifted = rebalance(&list, k);
                assert_eq!(shifted.len(), list.len());

                for (before, after) in list.iter().zip(&shifted) {
                    assert_eq!(before.id, after.id);
                    match before.rank {
                        Some(r) if r >= k => assert_eq!(after.rank, Some(r + 1)),
                        other => assert_eq!(after.rank, other),
                    }
                }

                let mut ranks: Vec<usize> = shifted.iter().filter_map(|h| h.rank).collect();
                ranks.push(k);
                ranks.sort_unstable();
                assert_eq!(ranks, (0..=n).collect::<Vec<_>>(), "n={n} k={k}");
            }
        }
    }

    #[test]
    fn test_rebalance_does_not_touch_input() {
        let list = numbered(3);
        let _ = rebalance(&list, 0);
        assert_eq!(list, numbered(3));
    }

    #[test]
    fn test_removal_is_inverse_of_insertion() {
        let list = numbered(6);
        for k in 0..=6 {
            let mut grown = rebalance(&list, k);
            grown.push(RankedItem::new("new", Some(k), 100));

            let shrunk = rebalance_after_removal(&grown, k);
            let (removed, rest): (Vec<_>, Vec<_>) = shrunk.into_iter().partition(|h| h.id == "new");
            assert_eq!(removed[0].rank, None);
            assert_eq!(rest, list, "k={k}");
        }
    }

    #[test]
    fn test_removal_leaves_unranked_items_alone() {
        let mut list = numbered(3);
        list.push(RankedItem::new("loose", None, 7));
        let shrunk = rebalance_after_removal(&list, 0);
        let ranks: Vec<Option<usize>> = shrunk.iter().map(|h| h.rank).collect();
        assert_eq!(ranks, vec![None, Some(0), Some(1), None]);
    }

    #[test]
    fn test_insertion_index_empty() {
        let sorted: Vec<&str> = Vec::new();
        assert_eq!(insertion_index(&sorted, &"D", |a, b| a.cmp(b)), 0);
    }

    #[test]
    fn test_insertion_index_boundaries() {
        let sorted: Vec<i32> = vec![10, 20, 30];
        let by_value = |a: &i32, b: &i32| a.cmp(b);
        assert_eq!(insertion_index(&sorted, &5, by_value), 0);
        assert_eq!(insertion_index(&sorted, &25, by_value), 2);
        assert_eq!(insertion_index(&sorted, &35, by_value), 3);
    }

    #[test]
    fn test_insertion_index_ties_go_right() {
        let by_value = |a: &i32, b: &i32| a.cmp(b);
        assert_eq!(insertion_index(&[10, 20, 30], &20, by_value), 2);
        assert_eq!(insertion_index(&[10, 20, 20, 20, 30], &20, by_value), 4);
    }

    #[test]
    fn test_insertion_index_with_mixed_types() {
        let houses = make_list(&["A House", "C House", "E House"]);
        let index = insertion_index(&houses, &"D House", |new, existing| {
            (*new).cmp(existing.payload.as_str())
        });
        assert_eq!(index, 2);
    }

    #[test]
    fn test_max_comparisons() {
        assert_eq!(max_comparisons(0), 0);
        assert_eq!(max_comparisons(1), 1);
        assert_eq!(max_comparisons(2), 2);
        assert_eq!(max_comparisons(3), 2);
        assert_eq!(max_comparisons(4), 3);
        assert_eq!(max_comparisons(7), 3);
        assert_eq!(max_comparisons(8), 4);
        assert_eq!(max_comparisons(1000), 10);
    }

    #[test]
    fn test_resolve_with_records_subject_ranks() {
        let list = numbered(7);
        let insertion = resolve_with(&list, |subject| subject.rank.unwrap_or_default() >= 5);

        assert_eq!(insertion.rank, 5);
        for comparison in &insertion.comparisons {
            let subject = list.iter().find(|item| item.id == comparison.subject_id).unwrap();
            assert_eq!(Some(comparison.subject_rank), subject.rank);
        }
    }

    #[test]
    fn test_resolve_with_stops_at_unranked_subject() {
        let mut list = numbered(3);
        list[1].rank = None;

        let insertion = resolve_with(&list, |_| true);

        assert!(insertion.comparisons.is_empty());
        assert_eq!(insertion.rank, 0);
    }
}
