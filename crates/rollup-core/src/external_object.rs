// crates/rollup-core/src/external_object.rs
// ============================================================================
// Module: External Object Entries
// Description: spec.md §3 "ExternalObjectEntry" and its reference type.
// Purpose: The inverted-index record produced by rollup-extractors and
//          stored/queried by rollup-index.
// Dependencies: serde, std::collections::BTreeMap
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::identifiers::NodeId;
use crate::identifiers::RepositoryId;
use crate::identifiers::ScanId;
use crate::identifiers::TenantId;
use crate::time::Timestamp;

/// The kind of external reference an [`ExternalObjectEntry`] carries
/// (`spec.md` §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceType {
    /// Cloud ARN.
    Arn,
    /// Generic provider resource id.
    ResourceId,
    /// Kubernetes object reference.
    K8sReference,
    /// GCP resource reference.
    GcpResource,
    /// Azure resource reference.
    AzureResource,
}

/// `spec.md` §3 "ExternalObjectEntry".
///
/// # Invariants
/// - `(tenant, repository_id, scan_id, node_id, external_id)` is unique.
/// - `normalized_id` is a pure function of `external_id` and
///   `reference_type` (`rollup-extractors` normalization rules).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalObjectEntry {
    /// Entry identifier (freshly generated at index-build time).
    pub id: String,
    /// Raw external identifier as it appeared in the source node.
    pub external_id: String,
    /// Reference type classification.
    pub reference_type: ReferenceType,
    /// Normalized identifier used for cross-repository lookup.
    pub normalized_id: String,
    /// Owning tenant.
    pub tenant: TenantId,
    /// Repository the node was scanned from.
    pub repository_id: RepositoryId,
    /// Scan the node came from.
    pub scan_id: ScanId,
    /// Node identifier within the scan graph.
    pub node_id: NodeId,
    /// Human-readable node name, for diagnostics and UI.
    pub node_name: String,
    /// IaC node type (e.g. `aws_s3_bucket`).
    pub node_type: String,
    /// File path the node was declared in.
    pub file_path: String,
    /// Small key/value map of reference components (e.g. ARN partition).
    pub components: BTreeMap<String, String>,
    /// Free-form extractor metadata.
    pub metadata: BTreeMap<String, String>,
    /// Time this entry was indexed.
    pub indexed_at: Timestamp,
}
