use std::collections::{BTreeMap, BTreeSet};

use crate::record::ImageRecord;

/// Browsing facets derived from a metadata collection: which classes exist
/// anywhere, and which per-image count values each class was seen with.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Facets {
    /// Every distinct class label, ascending.
    pub unique_classes: Vec<String>,
    /// Class label -> ascending distinct `count` values observed for it.
    pub count_options: BTreeMap<String, Vec<u32>>,
}

/// Derive the search facets for a collection.
///
/// Single pass over all detections; an empty collection yields empty facets.
pub fn extract_facets(collection: &[ImageRecord]) -> Facets {
    let mut count_sets: BTreeMap<String, BTreeSet<u32>> = BTreeMap::new();

    for record in collection {
        for det in &record.detections {
            count_sets
                .entry(det.class.clone())
                .or_default()
                .insert(det.count);
        }
    }

    Facets {
        unique_classes: count_sets.keys().cloned().collect(),
        count_options: count_sets
            .into_iter()
            .map(|(class, counts)| (class, counts.into_iter().collect()))
            .collect(),
    }
}
