//! Set of questions a query or bulk update is restricted to.
use std::collections::BTreeSet;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum TargetSet {
    /// Every question stored for the partition.
    #[default]
    All,
    Questions(BTreeSet<String>),
}

impl TargetSet {
    /// An empty id list means "no restriction".
    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let ids: BTreeSet<String> = ids.into_iter().map(Into::into).collect();
        if ids.is_empty() {
            TargetSet::All
        } else {
            TargetSet::Questions(ids)
        }
    }

    /// An empty explicit set restricts nothing, same as [`TargetSet::All`].
    pub fn contains(&self, question_id: &str) -> bool {
        match self {
            TargetSet::All => true,
            TargetSet::Questions(ids) => ids.is_empty() || ids.contains(question_id),
        }
    }

    pub fn is_all(&self) -> bool {
        match self {
            TargetSet::All => true,
            TargetSet::Questions(ids) => ids.is_empty(),
        }
    }

    /// True for an explicit set that came back empty from a search.
    pub fn is_empty_selection(&self) -> bool {
        matches!(self, TargetSet::Questions(ids) if ids.is_empty())
    }
}
