// crates/rollup-matchers/src/validate.rs
// ============================================================================
// Module: Matcher Configuration Validation
// Description: spec.md §4.C "Validation".
// Purpose: Reject matcher configurations that are malformed or could cause
//          catastrophic regex backtracking before a matcher ever runs.
// Dependencies: rollup-core
// ============================================================================

//! ## Overview
//! The catastrophic-backtracking check is a static text scan, not a regex
//! compilation: cancellation is cooperative (`spec.md` §5 "a runaway
//! user-supplied regex is NOT interruptible"), so the defense has to happen
//! before any engine ever evaluates the pattern, the same defense-in-depth
//! posture `ret-logic`'s DSL parser takes with `MAX_DSL_NESTING` and
//! `MAX_DSL_INPUT_BYTES` — reject the shape up front rather than bound the
//! evaluation after the fact.

use rollup_core::MatcherConfig;
use thiserror::Error;

/// Substrings that flag a pattern as carrying nested-quantifier or
/// repeated-wildcard catastrophic-backtracking risk (`spec.md` §4.C:
/// "nested quantifiers, `(a+)+`, `.*.*` pairs").
const BACKTRACKING_RISK_MARKERS: [&str; 8] =
    ["+)+", "+)*", "*)+", "*)*", ".*.*", ".+.+", ".*.+", ".+.*"];

/// Matcher configuration validation errors (`spec.md` §4.C "Validation").
#[derive(Debug, Error)]
pub enum ValidationError {
    /// An `arn` matcher's pattern was empty.
    #[error("arn matcher pattern must not be empty")]
    EmptyArnPattern,
    /// A `resource_id` matcher's resource type was empty.
    #[error("resource_id matcher resourceType must not be empty")]
    EmptyResourceType,
    /// A `tag` matcher's required-tags list was empty.
    #[error("tag matcher requiredTags must not be empty")]
    EmptyRequiredTags,
    /// A `name` matcher's fuzzy threshold was outside `[0, 100]`.
    #[error("fuzzy threshold {value} is outside [0, 100]")]
    FuzzyThresholdOutOfRange {
        /// The rejected threshold value.
        value: u8,
    },
    /// A pattern could cause catastrophic regex backtracking.
    #[error("pattern in field {field} has catastrophic-backtracking shape: {pattern}")]
    CatastrophicBacktrackingRisk {
        /// Which configuration field carried the risky pattern.
        field: &'static str,
        /// The rejected pattern.
        pattern: String,
    },
}

/// Returns whether `pattern` matches a known catastrophic-backtracking
/// shape.
#[must_use]
pub fn has_catastrophic_backtracking_risk(pattern: &str) -> bool {
    BACKTRACKING_RISK_MARKERS.iter().any(|marker| pattern.contains(marker))
}

/// Validates a matcher configuration before it is allowed to run
/// (`spec.md` §4.C "Validation").
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn validate(config: &MatcherConfig) -> Result<(), ValidationError> {
    match config {
        MatcherConfig::Arn(arn) => {
            if arn.pattern.trim().is_empty() {
                return Err(ValidationError::EmptyArnPattern);
            }
            check_pattern("pattern", &arn.pattern)?;
        }
        MatcherConfig::ResourceId(resource_id) => {
            if resource_id.resource_type.trim().is_empty() {
                return Err(ValidationError::EmptyResourceType);
            }
            if let Some(regex) = &resource_id.extraction_regex {
                check_pattern("extractionRegex", regex)?;
            }
        }
        MatcherConfig::Name(name) => {
            if let Some(threshold) = name.fuzzy_threshold {
                if threshold > 100 {
                    return Err(ValidationError::FuzzyThresholdOutOfRange { value: threshold });
                }
            }
            if let Some(pattern) = &name.pattern {
                check_pattern("pattern", pattern)?;
            }
            if let Some(namespace_pattern) = &name.namespace_pattern {
                check_pattern("namespacePattern", namespace_pattern)?;
            }
        }
        MatcherConfig::Tag(tag) => {
            if tag.required_tags.is_empty() {
                return Err(ValidationError::EmptyRequiredTags);
            }
            for requirement in &tag.required_tags {
                if let Some(pattern) = &requirement.value_pattern {
                    check_pattern("requiredTags[].valuePattern", pattern)?;
                }
            }
        }
    }
    Ok(())
}

/// Checks a single pattern string for catastrophic-backtracking risk.
fn check_pattern(field: &'static str, pattern: &str) -> Result<(), ValidationError> {
    if has_catastrophic_backtracking_risk(pattern) {
        return Err(ValidationError::CatastrophicBacktrackingRisk { field, pattern: pattern.to_string() });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rollup_core::ArnMatcherConfig;
    use rollup_core::MatcherCommon;

    use super::*;

    fn common() -> MatcherCommon {
        MatcherCommon { enabled: true, priority: 50, min_confidence: 50 }
    }

    #[test]
    fn rejects_empty_arn_pattern() {
        let cfg = MatcherConfig::Arn(ArnMatcherConfig {
            common: common(),
            pattern: String::new(),
            component_enables: None,
            allow_partial: false,
        });
        assert!(matches!(validate(&cfg), Err(ValidationError::EmptyArnPattern)));
    }

    #[test]
    fn rejects_nested_quantifier_shape() {
        let cfg = MatcherConfig::Arn(ArnMatcherConfig {
            common: common(),
            pattern: "arn:aws:s3:::(a+)+".to_string(),
            component_enables: None,
            allow_partial: false,
        });
        assert!(matches!(validate(&cfg), Err(ValidationError::CatastrophicBacktrackingRisk { .. })));
    }

    #[test]
    fn accepts_plain_wildcard_pattern() {
        let cfg = MatcherConfig::Arn(ArnMatcherConfig {
            common: common(),
            pattern: "arn:aws:s3:::prod-*".to_string(),
            component_enables: None,
            allow_partial: false,
        });
        assert!(validate(&cfg).is_ok());
    }
}
