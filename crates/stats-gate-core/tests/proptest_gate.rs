// crates/stats-gate-core/tests/proptest_gate.rs
// ============================================================================
// Module: Gate Property-Based Tests
// Description: Property tests for gate determinism and fail-closed behavior.
// Purpose: Exercise arbitrary permission sets and principals.
// ============================================================================

//! Property-based tests for authorization gate invariants.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use stats_gate_core::CallerIdentity;
use stats_gate_core::GatePolicy;
use stats_gate_core::PolicyProfile;
use stats_gate_core::PrincipalId;
use stats_gate_core::StatsOperation;
use stats_gate_core::authorize;
use stats_gate_core::policy::DEFAULT_ACCESS_METRICS_PERMISSION;
use stats_gate_core::policy::DEFAULT_REGISTER_PULL_ATOM_PERMISSION;

fn operation_strategy() -> impl Strategy<Value = StatsOperation> {
    prop::sample::select(StatsOperation::all().to_vec())
}

fn profile_strategy() -> impl Strategy<Value = PolicyProfile> {
    prop_oneof![Just(PolicyProfile::Legacy), Just(PolicyProfile::Current)]
}

fn identity_strategy() -> impl Strategy<Value = CallerIdentity> {
    let permission = prop_oneof![
        Just(DEFAULT_ACCESS_METRICS_PERMISSION.to_string()),
        Just(DEFAULT_REGISTER_PULL_ATOM_PERMISSION.to_string()),
        "[a-z.]{1,24}",
    ];
    (any::<u32>(), prop::collection::btree_set(permission, 0 .. 4)).prop_map(|(uid, perms)| {
        let base = CallerIdentity::new(PrincipalId::new(uid));
        perms.into_iter().fold(base, |identity, perm| identity.with_permission(perm))
    })
}

proptest! {
    #[test]
    fn decision_matches_permission_membership(
        identity in identity_strategy(),
        operation in operation_strategy(),
        profile in profile_strategy(),
    ) {
        let policy = GatePolicy::for_profile(profile);
        let holds = identity.holds(policy.required_permission(operation));
        let result = authorize(&policy, Some(&identity), operation);
        prop_assert_eq!(result.is_permitted(), holds);
    }

    #[test]
    fn decision_is_idempotent(
        identity in identity_strategy(),
        operation in operation_strategy(),
        profile in profile_strategy(),
    ) {
        let policy = GatePolicy::for_profile(profile);
        let first = authorize(&policy, Some(&identity), operation);
        let second = authorize(&policy, Some(&identity), operation);
        prop_assert_eq!(first, second);
    }

    #[test]
    fn denial_cause_always_comes_from_policy_table(
        identity in identity_strategy(),
        operation in operation_strategy(),
        profile in profile_strategy(),
    ) {
        let policy = GatePolicy::for_profile(profile);
        if let Some(denial) = authorize(&policy, Some(&identity), operation).denial() {
            prop_assert_eq!(denial.cause, policy.denial.cause_for(operation));
            prop_assert_eq!(denial.operation, operation);
        }
    }
}
