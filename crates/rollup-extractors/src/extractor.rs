// crates/rollup-extractors/src/extractor.rs
// ============================================================================
// Module: Extractors
// Description: spec.md §4.A "Contract" and the three built-in extractors
//              that feed ExternalObjectEntry records.
// Purpose: Stateless, pure node -> []Reference functions, one per reference
//          type the external object index tracks.
// Dependencies: rollup-core
// ============================================================================

use std::collections::BTreeMap;

use rollup_core::GraphNode;
use rollup_core::ReferenceType;

use crate::normalize::normalize_arn;
use crate::normalize::normalize_k8s_reference;
use crate::normalize::normalize_resource_id;
use crate::reference::Reference;

/// A stateless, pure node-to-reference extractor (`spec.md` §4.A
/// "Contract").
///
/// # Invariants
/// - `extract` never panics and never depends on anything beyond `node`.
pub trait Extractor: Send + Sync {
    /// Extracts zero or more references from a node's attributes.
    fn extract(&self, node: &GraphNode) -> Vec<Reference>;

    /// A stable name for diagnostics and registry listings.
    fn name(&self) -> &'static str;
}

/// Extracts an ARN from the `arn` attribute, when present.
#[derive(Debug, Default, Clone, Copy)]
pub struct ArnExtractor;

impl Extractor for ArnExtractor {
    fn extract(&self, node: &GraphNode) -> Vec<Reference> {
        let Some(raw) = node.attributes.get("arn").filter(|v| !v.trim().is_empty()) else {
            return Vec::new();
        };
        let normalized_id = normalize_arn(raw);
        let mut components = BTreeMap::new();
        let mut parts = normalized_id.splitn(6, ':').skip(1);
        if let Some(partition) = parts.next() {
            components.insert("partition".to_string(), partition.to_string());
        }
        if let Some(service) = parts.next() {
            components.insert("service".to_string(), service.to_string());
        }
        if let Some(region) = parts.next() {
            components.insert("region".to_string(), region.to_string());
        }
        if let Some(account) = parts.next() {
            components.insert("account".to_string(), account.to_string());
        }
        vec![Reference {
            external_id: raw.clone(),
            reference_type: ReferenceType::Arn,
            normalized_id,
            components,
            source_attribute: "arn".to_string(),
            metadata: BTreeMap::new(),
        }]
    }

    fn name(&self) -> &'static str {
        "arn"
    }
}

/// Extracts a provider resource id from a configurable attribute
/// (`resource_id` by default).
#[derive(Debug, Clone)]
pub struct ResourceIdExtractor {
    /// Attribute key to read the raw id from.
    attribute: String,
    /// Whether to apply provider-prefix normalization.
    normalize: bool,
}

impl ResourceIdExtractor {
    /// Builds a resource-id extractor reading from the default
    /// `resource_id` attribute.
    #[must_use]
    pub fn new(normalize: bool) -> Self {
        Self { attribute: "resource_id".to_string(), normalize }
    }

    /// Builds a resource-id extractor reading from a custom attribute key.
    #[must_use]
    pub fn with_attribute(attribute: impl Into<String>, normalize: bool) -> Self {
        Self { attribute: attribute.into(), normalize }
    }
}

impl Extractor for ResourceIdExtractor {
    fn extract(&self, node: &GraphNode) -> Vec<Reference> {
        let Some(raw) = node.attributes.get(&self.attribute).filter(|v| !v.trim().is_empty()) else {
            return Vec::new();
        };
        vec![Reference {
            external_id: raw.clone(),
            reference_type: ReferenceType::ResourceId,
            normalized_id: normalize_resource_id(raw, self.normalize),
            components: BTreeMap::new(),
            source_attribute: self.attribute.clone(),
            metadata: BTreeMap::new(),
        }]
    }

    fn name(&self) -> &'static str {
        "resource_id"
    }
}

/// Extracts a Kubernetes object reference from the `kind`/`namespace`
/// attributes. Only fires when an explicit `kind` attribute is present —
/// unlike ARN/resource-id attributes, `node_type` alone is not a reliable
/// signal that a node is a Kubernetes object.
#[derive(Debug, Default, Clone, Copy)]
pub struct K8sReferenceExtractor;

impl Extractor for K8sReferenceExtractor {
    fn extract(&self, node: &GraphNode) -> Vec<Reference> {
        let Some(kind) = node.attributes.get("kind").filter(|v| !v.trim().is_empty()) else {
            return Vec::new();
        };
        let kind = kind.as_str();
        if node.name.is_empty() {
            return Vec::new();
        }
        let namespace = node.attributes.get("namespace").map(String::as_str);
        let normalized_id = normalize_k8s_reference(kind, namespace, &node.name);
        let mut components = BTreeMap::new();
        components.insert("kind".to_string(), kind.to_string());
        if let Some(ns) = namespace {
            components.insert("namespace".to_string(), ns.to_string());
        }
        vec![Reference {
            external_id: format!("{kind}/{}/{}", namespace.unwrap_or("_"), node.name),
            reference_type: ReferenceType::K8sReference,
            normalized_id,
            components,
            source_attribute: "kind".to_string(),
            metadata: BTreeMap::new(),
        }]
    }

    fn name(&self) -> &'static str {
        "k8s_reference"
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use rollup_core::NodeId;

    use super::*;

    fn node(attributes: &[(&str, &str)]) -> GraphNode {
        let mut map = BTreeMap::new();
        for (k, v) in attributes {
            map.insert((*k).to_string(), (*v).to_string());
        }
        GraphNode {
            id: NodeId::new(),
            node_type: "aws_s3_bucket".to_string(),
            name: "my-bucket".to_string(),
            file: "main.tf".to_string(),
            line_start: 1,
            line_end: 10,
            attributes: map,
        }
    }

    #[test]
    fn arn_extractor_skips_nodes_without_an_arn() {
        let n = node(&[]);
        assert!(ArnExtractor.extract(&n).is_empty());
    }

    #[test]
    fn arn_extractor_produces_a_reference_with_normalized_components() {
        let n = node(&[("arn", "arn:AWS:S3:us-east-1:123456789012:my-bucket")]);
        let refs = ArnExtractor.extract(&n);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].normalized_id, "arn:aws:s3:us-east-1:123456789012:my-bucket");
        assert_eq!(refs[0].components.get("partition"), Some(&"aws".to_string()));
    }

    #[test]
    fn resource_id_extractor_honors_custom_attribute() {
        let n = node(&[("arn", "arn:aws:s3:::x"), ("id", "AWS_S3_BUCKET foo")]);
        let extractor = ResourceIdExtractor::with_attribute("id", true);
        let refs = extractor.extract(&n);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].normalized_id, "s3_bucket_foo");
    }

    #[test]
    fn k8s_extractor_requires_an_explicit_kind_attribute() {
        let without_kind = node(&[("namespace", "prod")]);
        assert!(K8sReferenceExtractor.extract(&without_kind).is_empty());

        let with_kind = node(&[("kind", "Deployment"), ("namespace", "prod")]);
        let refs = K8sReferenceExtractor.extract(&with_kind);
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].normalized_id, "deployment/prod/my-bucket");
    }
}
