/// An item taking part in a ranking.
///
/// `rank` is `None` for items that have not been ranked yet; the resolver
/// passes those through untouched. `payload` is whatever the caller wants to
/// display and is never inspected here.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RankedItem<T> {
    /// Stable caller-provided identifier.
    pub id: String,
    /// Zero-based position, 0 = most preferred.
    pub rank: Option<usize>,
    pub payload: T,
}

impl<T> RankedItem<T> {
    pub fn new(id: impl Into<String>, rank: Option<usize>, payload: T) -> Self {
        RankedItem { id: id.into(), rank, payload }
    }

    /// Build a ranked list from payloads already in preference order (best first).
    pub fn from_ordered<I>(items: I) -> Vec<RankedItem<T>>
    where
        I: IntoIterator<Item = (String, T)>,
    {
        items
            .into_iter()
            .enumerate()
            .map(|(rank, (id, payload))| RankedItem::new(id, Some(rank), payload))
            .collect()
    }

    fn with_rank(&self, rank: Option<usize>) -> Self
    where
        T: Clone,
    {
        RankedItem {
            id: self.id.clone(),
            rank,
            payload: self.payload.clone(),
        }
    }

    pub(crate) fn shifted_up(&self) -> Self
    where
        T: Clone,
    {
        self.with_rank(self.rank.map(|r| r + 1))
    }

    pub(crate) fn shifted_down(&self) -> Self
    where
        T: Clone,
    {
        self.with_rank(self.rank.map(|r| r.saturating_sub(1)))
    }
}

/// Outcome of showing the new item next to one already-ranked item.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Comparison {
    /// ID of the ranked item the new item was compared against.
    /// Kept for the caller's records; only `subject_rank` drives the search.
    pub subject_id: String,
    /// Rank the subject held when the comparison was made.
    pub subject_rank: usize,
    /// True when the new item was preferred over the subject.
    pub new_item_is_better: bool,
}

impl Comparison {
    pub fn new(subject_id: impl Into<String>, subject_rank: usize, new_item_is_better: bool) -> Self {
        Comparison {
            subject_id: subject_id.into(),
            subject_rank,
            new_item_is_better,
        }
    }

    /// Record a comparison against `subject`. Returns `None` if the subject is unranked.
    pub fn against<T>(subject: &RankedItem<T>, new_item_is_better: bool) -> Option<Self> {
        subject
            .rank
            .map(|rank| Comparison::new(subject.id.clone(), rank, new_item_is_better))
    }
}

/// Result of a search driven to completion by [`crate::resolve_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Insertion {
    /// Rank the new item should take.
    pub rank: usize,
    /// Every comparison asked, in order.
    pub comparisons: Vec<Comparison>,
}
