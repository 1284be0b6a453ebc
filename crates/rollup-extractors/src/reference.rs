// crates/rollup-extractors/src/reference.rs
// ============================================================================
// Module: Extracted References
// Description: spec.md §4.A "Reference" (the per-extractor output record).
// Purpose: Intermediate value between an extractor and the index build that
//          turns it into an ExternalObjectEntry.
// Dependencies: rollup-core
// ============================================================================

use std::collections::BTreeMap;

use rollup_core::ReferenceType;

/// The output of a single [`crate::extractor::Extractor::extract`] call
/// (`spec.md` §4.A).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Raw external identifier as it appeared on the node.
    pub external_id: String,
    /// Reference type classification.
    pub reference_type: ReferenceType,
    /// Normalized identifier, per `normalize.rs`.
    pub normalized_id: String,
    /// Small key/value map of reference components (e.g. ARN partition).
    pub components: BTreeMap<String, String>,
    /// The node attribute this reference was extracted from.
    pub source_attribute: String,
    /// Free-form extractor metadata.
    pub metadata: BTreeMap<String, String>,
}
