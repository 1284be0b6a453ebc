// crates/rollup-extractors/src/normalize.rs
// ============================================================================
// Module: ID Normalizers
// Description: spec.md §4.A "Normalization rules (bit-exact; tests will pin
//              these)".
// Purpose: The single place these rules are implemented, shared by the
//          reference extractors in this crate and by rollup-matchers.
// Dependencies: none (pure functions over &str)
// ============================================================================

//! ## Overview
//! Every function here is pure and total: given the same input it always
//! produces the same output, and no input is rejected outright (malformed
//! ARNs normalize to a best-effort form rather than erroring — rejection is
//! a matcher/extractor-level policy, not a normalization-level one).

/// Normalizes an ARN into the canonical
/// `arn:{partition}:{service}:{region}:{account}:{resource}` form
/// (`spec.md` §4.A).
///
/// # Invariants
/// - `partition`, `service`, and `region` are lowercased.
/// - `resource` preserves case.
/// - A single trailing `/` on `resource` is stripped.
#[must_use]
pub fn normalize_arn(arn: &str) -> String {
    let mut parts = arn.splitn(6, ':');
    let _literal = parts.next().unwrap_or_default();
    let partition = parts.next().unwrap_or_default().to_lowercase();
    let service = parts.next().unwrap_or_default().to_lowercase();
    let region = parts.next().unwrap_or_default().to_lowercase();
    let account = parts.next().unwrap_or_default();
    let resource = parts.next().unwrap_or_default().trim_end_matches('/');
    format!("arn:{partition}:{service}:{region}:{account}:{resource}")
}

/// The provider-prefix strings stripped by [`normalize_resource_id`]
/// (`spec.md` §4.A).
const PROVIDER_PREFIXES: [&str; 3] = ["aws_", "google_", "azurerm_"];

/// Normalizes a provider resource id (`spec.md` §4.A).
///
/// When `normalize` is `false`, returns `raw` unchanged.
#[must_use]
pub fn normalize_resource_id(raw: &str, normalize: bool) -> String {
    if !normalize {
        return raw.to_string();
    }
    let mut stripped = raw;
    for prefix in PROVIDER_PREFIXES {
        if let Some(rest) = stripped.strip_prefix(prefix) {
            stripped = rest;
            break;
        }
    }
    stripped.to_lowercase().split_whitespace().collect::<Vec<_>>().join("_")
}

/// Normalizes a Kubernetes object reference into `{kind}/{namespace|"_"}/{name}`,
/// all lowercase (`spec.md` §4.A).
#[must_use]
pub fn normalize_k8s_reference(kind: &str, namespace: Option<&str>, name: &str) -> String {
    let namespace = namespace.filter(|ns| !ns.is_empty()).unwrap_or("_");
    format!("{}/{}/{}", kind.to_lowercase(), namespace.to_lowercase(), name.to_lowercase())
}

/// Normalizes a display name for the name matcher (`spec.md` §4.A):
/// lowercased unless `case_sensitive`, internal whitespace collapsed.
#[must_use]
pub fn normalize_name(name: &str, case_sensitive: bool) -> String {
    let collapsed = name.split_whitespace().collect::<Vec<_>>().join(" ");
    if case_sensitive { collapsed } else { collapsed.to_lowercase() }
}

/// Normalizes a tag value for the tag matcher: untouched unless a pattern
/// match requires case-insensitive comparison, in which case the value is
/// lowercased for comparison purposes only (`spec.md` §4.A).
#[must_use]
pub fn normalize_tag_value_for_pattern_match(value: &str) -> String {
    value.to_lowercase()
}
