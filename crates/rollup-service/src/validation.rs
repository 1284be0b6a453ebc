// crates/rollup-service/src/validation.rs
// ============================================================================
// Module: Rollup Configuration Validation
// Description: spec.md §4.F "Validation (before any persistence)".
// Purpose: One pure, side-effect-free entry point both `create`/`update`
//          and the standalone `Validate` operation run through, so the two
//          paths can never disagree (`spec.md` §8 invariant 2: "Validate is
//          pure and side-effect-free; failure classifications are stable
//          across runs").
// Dependencies: rollup-core, rollup-matchers
// ============================================================================

use rollup_core::MergeOptions;
use rollup_core::RollupConfig;
use rollup_core::RollupError;

/// Maximum rollup display name length (`spec.md` §4.F "name non-empty,
/// <= limit").
pub const MAX_NAME_LENGTH: usize = 200;

/// Validates a [`RollupConfig`] against the policy limits and shape rules
/// `spec.md` §4.F enumerates, before any persistence.
///
/// # Errors
///
/// Returns [`RollupError::Validation`] on the first rule violated, in the
/// order `spec.md` §4.F lists them.
pub fn validate_rollup_config(
    rollup: &RollupConfig,
    max_repositories_per_rollup: u32,
    max_matchers_per_rollup: u32,
) -> Result<(), RollupError> {
    if rollup.name.trim().is_empty() {
        return Err(invalid("name must not be empty"));
    }
    if rollup.name.len() > MAX_NAME_LENGTH {
        return Err(invalid(format!("name must be at most {MAX_NAME_LENGTH} characters")));
    }
    if !rollup.has_valid_repository_count(usize_from_u32(max_repositories_per_rollup)) {
        return Err(invalid(format!(
            "repository_ids must contain between 2 and {max_repositories_per_rollup} entries"
        )));
    }
    if rollup.matchers.is_empty() || rollup.matchers.len() > usize_from_u32(max_matchers_per_rollup) {
        return Err(invalid(format!("matchers must contain between 1 and {max_matchers_per_rollup} entries")));
    }
    for matcher in &rollup.matchers {
        rollup_matchers::validate(matcher).map_err(|err| invalid(err.to_string()))?;
    }
    if let Some(schedule) = &rollup.schedule {
        validate_schedule(schedule)?;
    }
    validate_merge_options(&rollup.merge_options)?;
    if rollup.status.requires_full_validity() && !rollup.has_enabled_matcher() {
        return Err(invalid("at least one matcher must be enabled for this status"));
    }
    Ok(())
}

/// Validates a cron schedule string by field count only
/// (`spec.md` §3 "optional schedule (opaque 5- or 6-field cron string,
/// validated only by field count)").
///
/// # Errors
///
/// Returns [`RollupError::Validation`] when the field count is not 5 or 6.
pub fn validate_schedule(schedule: &str) -> Result<(), RollupError> {
    let field_count = schedule.split_whitespace().count();
    if field_count == 5 || field_count == 6 {
        Ok(())
    } else {
        Err(invalid(format!("schedule must have 5 or 6 whitespace-separated fields, found {field_count}")))
    }
}

/// Validates `mergeOptions.maxNodes > 0` (`spec.md` §4.F). The
/// `conflictResolution` field is a closed enum at the type level, so "is a
/// known variant" is enforced by the type system rather than at runtime.
///
/// # Errors
///
/// Returns [`RollupError::Validation`] when `max_nodes` is zero.
pub fn validate_merge_options(options: &MergeOptions) -> Result<(), RollupError> {
    if options.has_valid_max_nodes() {
        Ok(())
    } else {
        Err(invalid("mergeOptions.maxNodes must be greater than zero"))
    }
}

fn usize_from_u32(value: u32) -> usize {
    usize::try_from(value).unwrap_or(usize::MAX)
}

fn invalid(message: impl Into<String>) -> RollupError {
    RollupError::Validation { message: message.into() }
}

#[cfg(test)]
mod tests {
    use rollup_core::ArnMatcherConfig;
    use rollup_core::ConflictResolution;
    use rollup_core::MatcherConfig;
    use rollup_core::matcher_config::MatcherCommon;
    use rollup_core::RepositoryId;
    use rollup_core::RollupId;
    use rollup_core::RollupStatus;
    use rollup_core::TenantId;
    use rollup_core::Timestamp;

    use super::*;

    fn base_rollup() -> RollupConfig {
        RollupConfig {
            rollup_id: RollupId::new(),
            tenant: TenantId::new(),
            name: "prod-rollup".to_string(),
            description: None,
            created_by: "alice".to_string(),
            updated_by: "alice".to_string(),
            repository_ids: vec![RepositoryId::new(), RepositoryId::new()],
            matchers: vec![MatcherConfig::Arn(ArnMatcherConfig {
                common: MatcherCommon { enabled: true, priority: 50, min_confidence: 50 },
                pattern: "arn:aws:*".to_string(),
                component_enables: None,
                allow_partial: false,
            })],
            merge_options: MergeOptions {
                conflict_resolution: ConflictResolution::PreferHigherConfidence,
                preserve_source_info: true,
                create_cross_repo_edges: true,
                max_nodes: 1000,
            },
            schedule: None,
            status: RollupStatus::Active,
            version: 1,
            created_at: Timestamp::new(chrono::Utc::now()),
            updated_at: Timestamp::new(chrono::Utc::now()),
        }
    }

    #[test]
    fn accepts_a_well_formed_active_rollup() {
        validate_rollup_config(&base_rollup(), 50, 20).expect("must validate");
    }

    #[test]
    fn rejects_empty_name() {
        let mut rollup = base_rollup();
        rollup.name = "   ".to_string();
        assert!(validate_rollup_config(&rollup, 50, 20).is_err());
    }

    #[test]
    fn rejects_too_few_repositories() {
        let mut rollup = base_rollup();
        rollup.repository_ids = vec![RepositoryId::new()];
        assert!(validate_rollup_config(&rollup, 50, 20).is_err());
    }

    #[test]
    fn rejects_too_many_repositories() {
        let mut rollup = base_rollup();
        rollup.repository_ids = (0..5).map(|_| RepositoryId::new()).collect();
        assert!(validate_rollup_config(&rollup, 4, 20).is_err());
    }

    #[test]
    fn rejects_empty_matcher_list() {
        let mut rollup = base_rollup();
        rollup.matchers.clear();
        assert!(validate_rollup_config(&rollup, 50, 20).is_err());
    }

    #[test]
    fn draft_status_tolerates_no_enabled_matcher() {
        let mut rollup = base_rollup();
        rollup.status = RollupStatus::Draft;
        if let MatcherConfig::Arn(cfg) = &mut rollup.matchers[0] {
            cfg.common.enabled = false;
        }
        validate_rollup_config(&rollup, 50, 20).expect("draft status must tolerate a disabled matcher");
    }

    #[test]
    fn active_status_requires_an_enabled_matcher() {
        let mut rollup = base_rollup();
        if let MatcherConfig::Arn(cfg) = &mut rollup.matchers[0] {
            cfg.common.enabled = false;
        }
        assert!(validate_rollup_config(&rollup, 50, 20).is_err());
    }

    #[test]
    fn accepts_five_and_six_field_schedules() {
        validate_schedule("0 0 * * *").expect("five fields must validate");
        validate_schedule("0 0 * * * *").expect("six fields must validate");
    }

    #[test]
    fn rejects_malformed_schedule_field_count() {
        assert!(validate_schedule("0 0 *").is_err());
        assert!(validate_schedule("0 0 * * * * *").is_err());
    }

    #[test]
    fn rejects_zero_max_nodes() {
        let mut options = base_rollup().merge_options;
        options.max_nodes = 0;
        assert!(validate_merge_options(&options).is_err());
    }
}
