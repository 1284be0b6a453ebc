// crates/rollup-extractors/src/registry.rs
// ============================================================================
// Module: Extractor Registry
// Description: spec.md §4.A "Factory": maps node types to applicable
//              extractors.
// Purpose: A string-keyed registry routing by node type instead of
//          provider id.
// Dependencies: rollup-core, std::collections::BTreeMap, std::sync::Arc
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;

use rollup_core::GraphNode;

use crate::extractor::ArnExtractor;
use crate::extractor::Extractor;
use crate::extractor::K8sReferenceExtractor;
use crate::extractor::ResourceIdExtractor;
use crate::reference::Reference;

/// Node types the built-in extractor set registers itself against by
/// default. Additional node types can be registered by callers via
/// [`ExtractorRegistry::register`].
const DEFAULT_NODE_TYPES: [&str; 8] = [
    "aws_s3_bucket",
    "aws_iam_role",
    "aws_lambda_function",
    "aws_security_group",
    "google_compute_instance",
    "google_storage_bucket",
    "azurerm_storage_account",
    "azurerm_virtual_machine",
];

/// Routes node-type strings to the extractors applicable to them
/// (`spec.md` §4.A "Factory": "Unknown node types yield no references,
/// never an error").
pub struct ExtractorRegistry {
    /// Extractors keyed by node type; absent keys yield no references.
    by_node_type: BTreeMap<String, Vec<Arc<dyn Extractor>>>,
}

impl ExtractorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { by_node_type: BTreeMap::new() }
    }

    /// Creates a registry with the built-in arn/resource_id/k8s_reference
    /// extractors registered against a representative set of common cloud
    /// and Kubernetes node types.
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        let builtins: Vec<Arc<dyn Extractor>> = vec![
            Arc::new(ArnExtractor),
            Arc::new(ResourceIdExtractor::new(true)),
            Arc::new(K8sReferenceExtractor),
        ];
        for node_type in DEFAULT_NODE_TYPES {
            registry.by_node_type.insert(node_type.to_string(), builtins.clone());
        }
        registry
    }

    /// Registers an extractor for a node type, appending to any extractors
    /// already registered for it.
    pub fn register(&mut self, node_type: impl Into<String>, extractor: Arc<dyn Extractor>) {
        self.by_node_type.entry(node_type.into()).or_default().push(extractor);
    }

    /// Returns the extractors registered for a node type; empty when the
    /// node type is unknown to this registry.
    #[must_use]
    pub fn extractors_for(&self, node_type: &str) -> &[Arc<dyn Extractor>] {
        self.by_node_type.get(node_type).map_or(&[], Vec::as_slice)
    }

    /// Runs every registered extractor for `node`'s node type and
    /// concatenates their references. Extractor panics are not caught here;
    /// callers that must isolate a misbehaving extractor per node (the
    /// index build, per `spec.md` §4.B step 2) wrap this call in
    /// `std::panic::catch_unwind`.
    #[must_use]
    pub fn extract_all(&self, node: &GraphNode) -> Vec<Reference> {
        self.extractors_for(&node.node_type).iter().flat_map(|e| e.extract(node)).collect()
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rollup_core::NodeId;

    use super::*;

    #[test]
    fn unknown_node_type_yields_no_references() {
        let registry = ExtractorRegistry::with_builtins();
        let node = GraphNode {
            id: NodeId::new(),
            node_type: "some_unmodeled_resource".to_string(),
            name: "x".to_string(),
            file: "main.tf".to_string(),
            line_start: 1,
            line_end: 1,
            attributes: BTreeMap::new(),
        };
        assert!(registry.extract_all(&node).is_empty());
    }

    #[test]
    fn known_node_type_runs_every_registered_extractor() {
        let registry = ExtractorRegistry::with_builtins();
        let mut attributes = BTreeMap::new();
        attributes.insert("arn".to_string(), "arn:aws:s3:::my-bucket".to_string());
        let node = GraphNode {
            id: NodeId::new(),
            node_type: "aws_s3_bucket".to_string(),
            name: "my-bucket".to_string(),
            file: "main.tf".to_string(),
            line_start: 1,
            line_end: 1,
            attributes,
        };
        let refs = registry.extract_all(&node);
        assert_eq!(refs.len(), 1);
    }
}
