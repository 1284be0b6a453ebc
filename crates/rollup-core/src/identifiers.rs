// crates/rollup-core/src/identifiers.rs
// ============================================================================
// Module: Rollup Engine Identifiers
// Description: Canonical opaque identifiers used throughout the rollup
//              engine, with wire forms pinned by spec.md §6.
// Purpose: Provide strongly typed, serializable identifiers that cannot be
//          confused with one another at compile time.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Every identifier in the rollup engine is a UUID under the hood (per
//! `spec.md` §8 invariant 9: "all public IDs match the UUID grammar; no
//! sequential or guessable prefixes"). Each identifier class is a distinct
//! newtype so a `TenantId` can never be passed where a `RollupId` is
//! expected, even though both wrap a `Uuid`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Identifier Macro
// ============================================================================

/// Defines a `Uuid`-backed opaque identifier newtype with a stable wire form.
///
/// # Invariants
/// - The wire form is the bare UUID string (`serde(transparent)`); external
///   rendering with a prefix (`rollup_<uuid>`, `exec_<uuid>`) is applied by
///   callers that need the prefixed form, not by the type itself.
macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing `Uuid`.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying `Uuid`.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_id!(
    /// Tenant identifier; the top-level isolation boundary (`spec.md` §3).
    TenantId
);
uuid_id!(
    /// Identifier of a scanned repository.
    RepositoryId
);
uuid_id!(
    /// Identifier of a single scan of a repository.
    ScanId
);
uuid_id!(
    /// Identifier of a node within a scan graph.
    NodeId
);
uuid_id!(
    /// `RollupConfig` identifier; rendered externally as `rollup_<uuid>`.
    RollupId
);
uuid_id!(
    /// `RollupExecution` identifier; rendered externally as `exec_<uuid>`.
    ExecutionId
);
uuid_id!(
    /// Identifier correlating every event emitted for one execution.
    CorrelationId
);
uuid_id!(
    /// Identifier of an individual emitted event.
    EventId
);
uuid_id!(
    /// Identifier of a merged node produced by the merge engine.
    MergedNodeId
);

impl RollupId {
    /// Renders the external id form `rollup_<uuid>` used by `spec.md` §6.
    #[must_use]
    pub fn external_id(&self) -> String {
        format!("rollup_{}", self.0)
    }
}

impl ExecutionId {
    /// Renders the external id form `exec_<uuid>` used by `spec.md` §6.
    #[must_use]
    pub fn external_id(&self) -> String {
        format!("exec_{}", self.0)
    }
}

/// Identifier of a dead-letter queue entry.
///
/// # Invariants
/// - Rendered externally as `dlq_{epoch}_{rand9}` (`spec.md` §6), not a
///   bare UUID — the DLQ id format is pinned independently of the UUID
///   grammar used elsewhere.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeadLetterId(String);

impl DeadLetterId {
    /// Builds a DLQ id from an epoch-millis timestamp and a 9-character
    /// random suffix.
    #[must_use]
    pub fn new(epoch_millis: u64, rand9: &str) -> Self {
        Self(format!("dlq_{epoch_millis}_{rand9}"))
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeadLetterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::TenantId;

    #[test]
    fn distinct_ids_are_not_equal() {
        let a = TenantId::new();
        let b = TenantId::new();
        assert_ne!(a, b);
    }

    #[test]
    fn round_trips_through_json() {
        let id = TenantId::new();
        let json = serde_json::to_string(&id).expect("serialize");
        let back: TenantId = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(id, back);
    }
}
