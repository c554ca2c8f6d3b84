use std::collections::{BTreeSet, HashMap};

use crate::errors::MetadataError;
use crate::record::ImageRecord;

/// How per-class predicates combine into a record-level match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    /// Logical OR: at least one selected class must match.
    Any,
    /// Logical AND: every selected class must match.
    All,
}

impl std::str::FromStr for SearchMode {
    type Err = MetadataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "any" => Ok(SearchMode::Any),
            "all" => Ok(SearchMode::All),
            other => Err(MetadataError::validation(format!(
                "unknown search mode '{other}' (expected 'any' or 'all')"
            ))),
        }
    }
}

/// Per-class filter on the in-image occurrence count.
///
/// Note the asymmetry, kept from the original UI: `NoBound` means "present
/// at least once", while `UpperBound(t)` means "at most t occurrences" and
/// therefore also matches records where the class is absent (n = 0).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Threshold {
    NoBound,
    UpperBound(u32),
}

impl Threshold {
    /// Parse a `CLASS=N` bound spec, returning the class and its bound.
    /// A non-numeric bound is a validation error, not a silent default.
    pub fn parse_spec(spec: &str) -> Result<(String, Threshold), MetadataError> {
        let (class, bound) = spec.split_once('=').ok_or_else(|| {
            MetadataError::validation(format!(
                "count bound '{spec}' must have the form CLASS=N"
            ))
        })?;

        if class.trim().is_empty() {
            return Err(MetadataError::validation(format!(
                "count bound '{spec}' has an empty class label"
            )));
        }

        let value: u32 = bound.trim().parse().map_err(|_| {
            MetadataError::validation(format!(
                "count bound for '{class}' must be a non-negative integer, got '{bound}'"
            ))
        })?;

        Ok((class.trim().to_string(), Threshold::UpperBound(value)))
    }

    fn matches(&self, occurrences: u32) -> bool {
        match self {
            Threshold::NoBound => occurrences >= 1,
            Threshold::UpperBound(t) => occurrences <= *t,
        }
    }
}

/// A user-chosen query over a metadata collection.
#[derive(Debug, Clone)]
pub struct SearchParameters {
    pub mode: SearchMode,
    pub selected_classes: BTreeSet<String>,
    /// Classes without an entry here are filtered with [`Threshold::NoBound`].
    pub thresholds: HashMap<String, Threshold>,
}

impl SearchParameters {
    pub fn new(mode: SearchMode, selected_classes: BTreeSet<String>) -> Self {
        Self {
            mode,
            selected_classes,
            thresholds: HashMap::new(),
        }
    }

    fn threshold_for(&self, class: &str) -> Threshold {
        self.thresholds
            .get(class)
            .copied()
            .unwrap_or(Threshold::NoBound)
    }
}

fn class_matches(params: &SearchParameters, record: &ImageRecord, class: &str) -> bool {
    let occurrences = record.class_counts.get(class).copied().unwrap_or(0);
    params.threshold_for(class).matches(occurrences)
}

/// Filter a collection down to the records matching `params`.
///
/// Returns an order-preserving subsequence of `collection`; the collection is
/// never mutated and the same inputs always yield the same result. An empty
/// class selection yields an empty result in either mode.
pub fn search<'a>(
    params: &SearchParameters,
    collection: &'a [ImageRecord],
) -> Vec<&'a ImageRecord> {
    if params.selected_classes.is_empty() {
        return Vec::new();
    }

    collection
        .iter()
        .filter(|record| match params.mode {
            SearchMode::Any => params
                .selected_classes
                .iter()
                .any(|class| class_matches(params, record, class)),
            SearchMode::All => params
                .selected_classes
                .iter()
                .all(|class| class_matches(params, record, class)),
        })
        .collect()
}
