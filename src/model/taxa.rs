//! Ordered set of taxon labels, as declared by a TAXA block.

use std::collections::HashMap;

/// Index of a taxon in its [TaxonSet] (0-based, insertion order).
pub type TaxonIndex = usize;

/// Ordered sequence of unique taxon names.
///
/// Insertion order defines the [TaxonIndex] of each taxon, which is also the
/// row of the taxon in the [CharacterMatrix](crate::model::CharacterMatrix)
/// and the node id of its leaf in a [PhyloTree](crate::model::PhyloTree).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaxonSet {
    labels: Vec<String>,
    index: HashMap<String, TaxonIndex>,
}

impl TaxonSet {
    /// Creates an empty set with room for `capacity` taxa.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            labels: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Adds a taxon and returns its index, or `None` if the label is
    /// already present (the set is left unchanged then).
    pub fn insert(&mut self, label: &str) -> Option<TaxonIndex> {
        if self.index.contains_key(label) {
            return None;
        }
        let idx = self.labels.len();
        self.labels.push(label.to_string());
        self.index.insert(label.to_string(), idx);
        Some(idx)
    }

    /// Returns the index of `label`, if it is a member.
    pub fn index_of(&self, label: &str) -> Option<TaxonIndex> {
        self.index.get(label).copied()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.index.contains_key(label)
    }

    /// Returns the label at `idx`.
    pub fn label(&self, idx: TaxonIndex) -> Option<&str> {
        self.labels.get(idx).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Iterates over the labels in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.labels.iter().map(String::as_str)
    }
}
