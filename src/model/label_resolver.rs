//! Label resolution for Newick leaves in Nexus TREES blocks.

use crate::model::taxa::{TaxonIndex, TaxonSet};
use std::collections::HashMap;
use thiserror::Error;

/// Error of [LabelResolver::resolve_label].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct LabelResolvingError(pub String);

// =#========================================================================#=
// LABEL RESOLVER
// =#========================================================================€=
/// Resolves leaf labels of Newick strings to the [TaxonIndex] of a [TaxonSet].
///
/// - [VerbatimLabels](Self::VerbatimLabels): raw Newick strings, labels must
///   be taxon labels
/// - [NexusLabels](Self::NexusLabels): TREES block, with or without TRANSLATE
#[derive(Debug, Clone)]
pub enum LabelResolver<'a> {
    /// Leaf labels are looked up verbatim.
    VerbatimLabels(&'a TaxonSet),

    /// Following the Nexus standard, tries to resolve in order:
    /// 1. Key provided by TRANSLATE map
    ///    (e.g. "kea" -> "Nestor notabilis")
    /// 2. Integer as 1-based index of label in TAXA block
    ///    (e.g. 2 -> "Nestor notabilis")
    /// 3. Verbatim label match
    NexusLabels {
        /// TRANSLATE key -> taxon index
        index_map: HashMap<String, TaxonIndex>,
        taxa: &'a TaxonSet,
    },
}

impl<'a> LabelResolver<'a> {
    pub fn new_verbatim_labels_resolver(taxa: &'a TaxonSet) -> Self {
        LabelResolver::VerbatimLabels(taxa)
    }

    /// Creates a [NexusLabels](Self::NexusLabels) resolver from the pairs
    /// (key, taxon label) of a TRANSLATE command.
    ///
    /// # Errors
    /// Returns a [LabelResolvingError] if a translated label is not a taxon
    /// or a key is given twice.
    pub fn new_nexus_labels_resolver(
        translation: Vec<(String, String)>,
        taxa: &'a TaxonSet,
    ) -> Result<Self, LabelResolvingError> {
        let mut index_map = HashMap::with_capacity(translation.len());
        for (key, label) in translation {
            let index = taxa.index_of(&label).ok_or_else(|| {
                LabelResolvingError(format!(
                    "TRANSLATE maps '{key}' to '{label}', which is not a taxon"
                ))
            })?;
            if index_map.insert(key.clone(), index).is_some() {
                return Err(LabelResolvingError(format!(
                    "TRANSLATE key '{key}' given more than once"
                )));
            }
        }
        Ok(LabelResolver::NexusLabels { index_map, taxa })
    }

    /// Resolves a parsed leaf label to its taxon index.
    pub fn resolve_label(&self, parsed_label: &str) -> Result<TaxonIndex, LabelResolvingError> {
        match self {
            LabelResolver::VerbatimLabels(taxa) => taxa
                .index_of(parsed_label)
                .ok_or_else(|| LabelResolvingError(format!("Unknown taxon '{parsed_label}'"))),

            LabelResolver::NexusLabels { index_map, taxa } => {
                // 1. Try if parsed label is key of translation map
                if let Some(&index) = index_map.get(parsed_label) {
                    return Ok(index);
                }

                // 2. Try if parsed label is integer
                if let Ok(nexus_index) = parsed_label.parse::<usize>() {
                    if nexus_index == 0 || nexus_index > taxa.len() {
                        return Err(LabelResolvingError(format!(
                            "Nexus label index {nexus_index} out of bounds \
                             (1-based indexing, max {})",
                            taxa.len()
                        )));
                    }
                    return Ok(nexus_index - 1);
                }

                // 3. Try if parsed label is verbatim label
                taxa.index_of(parsed_label)
                    .ok_or_else(|| LabelResolvingError(format!("Unknown taxon '{parsed_label}'")))
            }
        }
    }

    /// The taxa labels are resolved against.
    pub fn taxa(&self) -> &'a TaxonSet {
        match self {
            LabelResolver::VerbatimLabels(taxa) => *taxa,
            LabelResolver::NexusLabels { taxa, .. } => *taxa,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn taxa() -> TaxonSet {
        let mut taxa = TaxonSet::with_capacity(3);
        for label in ["Nestor meridionalis", "Nestor notabilis", "Strigops habroptilus"] {
            taxa.insert(label);
        }
        taxa
    }

    #[test]
    fn test_nexus_resolution_order() {
        let taxa = taxa();
        let translation = vec![
            ("kaka".to_string(), "Nestor meridionalis".to_string()),
            ("3".to_string(), "Nestor notabilis".to_string()),
        ];
        let resolver = LabelResolver::new_nexus_labels_resolver(translation, &taxa).unwrap();
        assert_eq!(resolver.resolve_label("kaka"), Ok(0));
        // TRANSLATE key takes precedence over integer index
        assert_eq!(resolver.resolve_label("3"), Ok(1));
        assert_eq!(resolver.resolve_label("1"), Ok(0));
        assert_eq!(resolver.resolve_label("Strigops habroptilus"), Ok(2));
        assert!(resolver.resolve_label("4").is_err());
        assert!(resolver.resolve_label("kea").is_err());
    }

    #[test]
    fn test_translation_to_unknown_taxon() {
        let taxa = taxa();
        let translation = vec![("k".to_string(), "Nestor productus".to_string())];
        assert!(LabelResolver::new_nexus_labels_resolver(translation, &taxa).is_err());
    }

    #[test]
    fn test_verbatim() {
        let taxa = taxa();
        let resolver = LabelResolver::new_verbatim_labels_resolver(&taxa);
        assert_eq!(resolver.resolve_label("Nestor notabilis"), Ok(1));
        assert!(resolver.resolve_label("2").is_err());
    }
}
