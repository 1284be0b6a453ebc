// crates/rollup-core/src/matcher_config.rs
// ============================================================================
// Module: Matcher Configuration
// Description: The four matcher variants from spec.md §3 "MatcherConfig".
// Purpose: Give the service, orchestrator, and matchers crate one shared
//          sum type for matcher configuration instead of duplicating it.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! `MatcherConfig` is a closed, tagged union over four variants (arn,
//! resource_id, name, tag). Deep semantic validation (regex safety, fuzzy
//! threshold range, etc.) lives in `rollup-matchers::validate`, which is the
//! component that owns matcher semantics; this module only owns the shape.

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Shared Matcher Fields
// ============================================================================

/// Fields common to every matcher variant (`spec.md` §3).
///
/// # Invariants
/// - `priority` and `min_confidence` are both conceptually in `[0, 100]`;
///   this type does not enforce the range itself — see
///   `rollup-matchers::validate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatcherCommon {
    /// Whether this matcher participates in a run.
    pub enabled: bool,
    /// Running-order priority; higher runs first.
    pub priority: u8,
    /// Minimum confidence a result must meet to survive.
    pub min_confidence: u8,
}

// ============================================================================
// SECTION: Matcher Variants
// ============================================================================

/// Per-ARN-component enable flags for the ARN matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ArnComponentEnables {
    /// Compare the ARN partition component.
    pub partition: bool,
    /// Compare the ARN service component.
    pub service: bool,
    /// Compare the ARN region component.
    pub region: bool,
    /// Compare the ARN account component.
    pub account: bool,
    /// Compare the ARN resource component.
    pub resource: bool,
}

/// `arn` matcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArnMatcherConfig {
    /// Common matcher fields.
    pub common: MatcherCommon,
    /// Glob pattern (`*` wildcard) the ARN must match.
    pub pattern: String,
    /// Per-component comparison enables; `None` compares all components.
    pub component_enables: Option<ArnComponentEnables>,
    /// Whether a partial component match (per `allowPartial`) is accepted.
    pub allow_partial: bool,
}

/// `resource_id` matcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceIdMatcherConfig {
    /// Common matcher fields.
    pub common: MatcherCommon,
    /// Resource type the matcher applies to.
    pub resource_type: String,
    /// Attribute name carrying the id, if not the default.
    pub id_attribute: Option<String>,
    /// Whether provider-prefix normalization is applied before comparison.
    pub normalize: bool,
    /// Optional regex used to extract the id before comparison.
    pub extraction_regex: Option<String>,
}

/// `name` matcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameMatcherConfig {
    /// Common matcher fields.
    pub common: MatcherCommon,
    /// Optional glob pattern names must match before comparison.
    pub pattern: Option<String>,
    /// Whether the namespace participates in the comparison.
    pub include_namespace: bool,
    /// Optional namespace glob pattern.
    pub namespace_pattern: Option<String>,
    /// Whether comparison is case-sensitive.
    pub case_sensitive: bool,
    /// Fuzzy Levenshtein-ratio threshold in `[0, 100]`, inclusive (`>=`).
    pub fuzzy_threshold: Option<u8>,
}

/// A single required tag predicate for the `tag` matcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagRequirement {
    /// Tag key that must be present.
    pub key: String,
    /// Exact value the tag must carry, if specified.
    pub value: Option<String>,
    /// Case-insensitive pattern the tag value must match, if specified.
    pub value_pattern: Option<String>,
}

/// Boolean combination mode for `tag` matcher requirements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TagMatchMode {
    /// Every required tag must match.
    All,
    /// At least one required tag must match.
    Any,
}

/// `tag` matcher configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagMatcherConfig {
    /// Common matcher fields.
    pub common: MatcherCommon,
    /// Non-empty list of required tag predicates.
    pub required_tags: Vec<TagRequirement>,
    /// Combination mode over `required_tags`.
    pub match_mode: TagMatchMode,
    /// Tag keys to ignore when comparing, regardless of requirements.
    pub ignore_tags: Option<Vec<String>>,
}

/// The closed set of matcher configurations (`spec.md` §3 "MatcherConfig").
///
/// # Invariants
/// - Exactly one of the four variants; no open inheritance (`spec.md` §9
///   "Design Notes").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MatcherConfig {
    /// ARN matcher.
    Arn(ArnMatcherConfig),
    /// Resource-id matcher.
    ResourceId(ResourceIdMatcherConfig),
    /// Name matcher.
    Name(NameMatcherConfig),
    /// Tag matcher.
    Tag(TagMatcherConfig),
}

impl MatcherConfig {
    /// Returns the common fields shared by every variant.
    #[must_use]
    pub const fn common(&self) -> &MatcherCommon {
        match self {
            Self::Arn(c) => &c.common,
            Self::ResourceId(c) => &c.common,
            Self::Name(c) => &c.common,
            Self::Tag(c) => &c.common,
        }
    }

    /// Returns the strategy tag for this matcher's configuration, matching
    /// `MatchResult::strategy`.
    #[must_use]
    pub const fn strategy_name(&self) -> &'static str {
        match self {
            Self::Arn(_) => "arn",
            Self::ResourceId(_) => "resource_id",
            Self::Name(_) => "name",
            Self::Tag(_) => "tag",
        }
    }
}
