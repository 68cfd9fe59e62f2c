// crates/stats-gate-core/tests/policy.rs
// ============================================================================
// Module: Gate Policy Tests
// Description: Tests for profile presets and denial overrides.
// Purpose: Ensure only report retrieval can report state-unavailable denials.
// ============================================================================

//! Gate policy construction tests.

use stats_gate_core::DenialCause;
use stats_gate_core::DenialPolicy;
use stats_gate_core::GatePolicy;
use stats_gate_core::PolicyError;
use stats_gate_core::PolicyProfile;
use stats_gate_core::StatsOperation;

type TestResult = Result<(), String>;

#[test]
fn legacy_profile_reports_capability_denied_everywhere() {
    let policy = DenialPolicy::from_profile(PolicyProfile::Legacy);
    for operation in StatsOperation::all() {
        assert_eq!(policy.cause_for(*operation), DenialCause::CapabilityDenied);
    }
}

#[test]
fn current_profile_only_changes_get_reports() {
    let policy = DenialPolicy::from_profile(PolicyProfile::Current);
    for operation in StatsOperation::all() {
        let expected = if *operation == StatsOperation::GetReports {
            DenialCause::StateUnavailable
        } else {
            DenialCause::CapabilityDenied
        };
        assert_eq!(policy.cause_for(*operation), expected);
    }
}

#[test]
fn get_reports_override_to_state_unavailable_is_accepted() -> TestResult {
    let policy = DenialPolicy::from_profile(PolicyProfile::Legacy)
        .with_override(StatsOperation::GetReports, DenialCause::StateUnavailable)
        .map_err(|err| err.to_string())?;
    assert_eq!(policy, DenialPolicy::from_profile(PolicyProfile::Current));
    Ok(())
}

#[test]
fn other_query_overrides_to_state_unavailable_are_rejected() {
    for operation in [StatsOperation::GetMetadata, StatsOperation::GetRegisteredExperimentIds] {
        let result = DenialPolicy::from_profile(PolicyProfile::Legacy)
            .with_override(operation, DenialCause::StateUnavailable);
        assert_eq!(result, Err(PolicyError::StateUnavailableNotAllowed(operation)));
    }
}

#[test]
fn override_back_to_capability_denied_clears_profile_entry() -> TestResult {
    let policy = DenialPolicy::from_profile(PolicyProfile::Current)
        .with_override(StatsOperation::GetReports, DenialCause::CapabilityDenied)
        .map_err(|err| err.to_string())?;
    assert_eq!(policy, DenialPolicy::from_profile(PolicyProfile::Legacy));
    Ok(())
}

#[test]
fn every_other_override_to_state_unavailable_is_rejected() {
    let others = StatsOperation::all().iter().filter(|op| !op.has_version_dependent_denial());
    for operation in others {
        let result =
            DenialPolicy::default().with_override(*operation, DenialCause::StateUnavailable);
        assert_eq!(result, Err(PolicyError::StateUnavailableNotAllowed(*operation)));
    }
}

#[test]
fn default_profile_is_current() {
    assert_eq!(PolicyProfile::default(), PolicyProfile::Current);
    assert_eq!(PolicyProfile::Current.as_str(), "current");
}

#[test]
fn default_tables_follow_current_profile() {
    assert_eq!(DenialPolicy::default(), DenialPolicy::from_profile(PolicyProfile::Current));
    assert_eq!(GatePolicy::default(), GatePolicy::for_profile(PolicyProfile::Current));
}
