// crates/stats-gate-service/tests/audit.rs
// ============================================================================
// Module: Gate Audit Tests
// Description: Tests for decision audit events and configured sinks.
// Purpose: Ensure every gated call is audited with its surfacing mode.
// ============================================================================

//! Gate audit event tests.

#![allow(
    clippy::panic,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

mod common;

use std::fs;
use std::sync::Arc;

use common::TestResult;
use common::harness;
use common::invoke;
use common::privileged;
use common::unprivileged;
use stats_gate_config::AuditConfig;
use stats_gate_config::OneWayDenial;
use stats_gate_config::StatsGateConfig;
use stats_gate_core::DenialCause;
use stats_gate_core::PolicyProfile;
use stats_gate_core::PrincipalId;
use stats_gate_core::StatsOperation;
use stats_gate_service::DenialSurface;
use stats_gate_service::InMemoryStatsBackend;
use stats_gate_service::ServiceBuildError;
use stats_gate_service::StatsService;
use stats_gate_service::sink_from_config;

#[test]
fn every_call_records_one_event() {
    let harness = harness(PolicyProfile::Current, OneWayDenial::Silent);
    let caller = unprivileged();
    for operation in StatsOperation::all() {
        let _ = invoke(&harness.service, Some(&caller), *operation);
    }
    let events = harness.audit.events();
    assert_eq!(events.len(), StatsOperation::all().len());
    for (event, operation) in events.iter().zip(StatsOperation::all()) {
        assert_eq!(event.operation, *operation);
        assert_eq!(event.decision, "deny");
    }
}

#[test]
fn deny_event_carries_cause_reason_and_surface() -> TestResult {
    let harness = harness(PolicyProfile::Current, OneWayDenial::Silent);
    let _ = harness.service.get_reports(Some(&unprivileged()), 1);
    let events = harness.audit.events();
    let event = events.first().ok_or("missing audit event")?;
    assert_eq!(event.event, "stats_gate_authz");
    assert_eq!(event.principal, Some(PrincipalId::new(common::CALLER)));
    assert_eq!(event.cause, Some(DenialCause::StateUnavailable));
    assert_eq!(event.surface, Some(DenialSurface::Raised));
    let reason = event.reason.as_deref().ok_or("missing reason")?;
    assert!(reason.contains("missing permission"));
    Ok(())
}

#[test]
fn allow_event_omits_denial_fields() -> TestResult {
    let harness = harness(PolicyProfile::Current, OneWayDenial::Silent);
    harness.service.get_metadata(Some(&privileged())).map_err(|err| err.to_string())?;
    let events = harness.audit.events();
    let event = events.first().ok_or("missing audit event")?;
    assert_eq!(event.decision, "allow");
    assert_eq!(event.cause, None);
    assert_eq!(event.reason, None);
    assert_eq!(event.surface, None);
    Ok(())
}

#[test]
fn one_way_denial_surface_follows_mode() -> TestResult {
    for (mode, surface) in [
        (OneWayDenial::Silent, DenialSurface::Suppressed),
        (OneWayDenial::Observable, DenialSurface::Raised),
    ] {
        let harness = harness(PolicyProfile::Current, mode);
        let caller = unprivileged();
        let _ = invoke(&harness.service, Some(&caller), StatsOperation::SetPullAtomCallback);
        let events = harness.audit.events();
        let event = events.first().ok_or("missing audit event")?;
        assert_eq!(event.surface, Some(surface));
    }
    Ok(())
}

#[test]
fn event_serializes_with_snake_case_labels() -> TestResult {
    let harness = harness(PolicyProfile::Current, OneWayDenial::Silent);
    let _ = invoke(&harness.service, None, StatsOperation::SetPullAtomCallback);
    let events = harness.audit.events();
    let event = events.first().ok_or("missing audit event")?;
    let value = serde_json::to_value(event).map_err(|err| err.to_string())?;
    assert_eq!(value["operation"], "set_pull_atom_callback");
    assert_eq!(value["cause"], "capability_denied");
    assert_eq!(value["surface"], "suppressed");
    assert_eq!(value["principal"], serde_json::Value::Null);
    Ok(())
}

#[test]
fn configured_file_sink_writes_json_lines() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let path = dir.path().join("audit.jsonl");
    let mut config = StatsGateConfig::default();
    config.audit.path = Some(path.display().to_string());

    let service = StatsService::from_config(&config, Arc::new(InMemoryStatsBackend::new()))
        .map_err(|err| err.to_string())?;
    let _ = service.add_config(Some(&unprivileged()), 1, b"cfg");
    service.get_metadata(Some(&privileged())).map_err(|err| err.to_string())?;

    let content = fs::read_to_string(&path).map_err(|err| err.to_string())?;
    let lines: Vec<serde_json::Value> = content
        .lines()
        .map(serde_json::from_str)
        .collect::<Result<_, _>>()
        .map_err(|err| err.to_string())?;
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["decision"], "deny");
    assert_eq!(lines[0]["operation"], "add_config");
    assert_eq!(lines[1]["decision"], "allow");
    Ok(())
}

#[test]
fn from_config_rejects_unopenable_audit_path() -> TestResult {
    let dir = tempfile::tempdir().map_err(|err| err.to_string())?;
    let mut config = StatsGateConfig::default();
    config.audit.path = Some(dir.path().join("missing").join("audit.jsonl").display().to_string());
    match StatsService::from_config(&config, Arc::new(InMemoryStatsBackend::new())) {
        Err(ServiceBuildError::Audit(_)) => Ok(()),
        Err(err) => Err(format!("unexpected error {err}")),
        Ok(_) => Err("expected audit failure".to_string()),
    }
}

#[test]
fn disabled_audit_builds_noop_sink() -> TestResult {
    let config = AuditConfig {
        enabled: false,
        path: Some("/nonexistent/dir/audit.jsonl".to_string()),
    };
    sink_from_config(&config).map_err(|err| err.to_string())?;
    Ok(())
}
