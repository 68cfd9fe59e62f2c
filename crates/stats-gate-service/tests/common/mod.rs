// crates/stats-gate-service/tests/common/mod.rs
// ============================================================================
// Module: Service Test Support
// Description: Shared fixtures for stats service integration tests.
// Purpose: Build services over an in-memory backend and a recording sink.
// ============================================================================

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers.")]

use std::sync::Arc;
use std::sync::Mutex;

use stats_gate_config::OneWayDenial;
use stats_gate_core::CallerIdentity;
use stats_gate_core::GatePolicy;
use stats_gate_core::PermissionGate;
use stats_gate_core::PolicyProfile;
use stats_gate_core::PrincipalId;
use stats_gate_core::StatsOperation;
use stats_gate_core::policy::DEFAULT_ACCESS_METRICS_PERMISSION;
use stats_gate_core::policy::DEFAULT_REGISTER_PULL_ATOM_PERMISSION;
use stats_gate_service::GateAuditEvent;
use stats_gate_service::GateAuditSink;
use stats_gate_service::InMemoryStatsBackend;
use stats_gate_service::PendingOperation;
use stats_gate_service::PullAtomMetadata;
use stats_gate_service::StatsBackend;
use stats_gate_service::StatsError;
use stats_gate_service::StatsService;

pub type TestResult = Result<(), String>;

/// Principal used by unprivileged and privileged test callers.
pub const CALLER: u32 = 10_123;
/// Atom tag used by pull registration tests.
pub const ATOM_TAG: i32 = 10_001;

/// Audit sink that keeps events in memory.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<GateAuditEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<GateAuditEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

impl GateAuditSink for RecordingSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Service plus handles to its collaborators.
pub struct Harness {
    pub service: StatsService,
    pub backend: Arc<InMemoryStatsBackend>,
    pub audit: Arc<RecordingSink>,
}

pub fn harness(profile: PolicyProfile, one_way_denial: OneWayDenial) -> Harness {
    harness_with_policy(GatePolicy::for_profile(profile), one_way_denial)
}

pub fn harness_with_policy(policy: GatePolicy, one_way_denial: OneWayDenial) -> Harness {
    let backend = Arc::new(InMemoryStatsBackend::with_experiment_ids(vec![42, 7]));
    let audit = Arc::new(RecordingSink::default());
    let backend_handle: Arc<dyn StatsBackend> = backend.clone();
    let audit_handle: Arc<dyn GateAuditSink> = audit.clone();
    let service = StatsService::new(
        Arc::new(PermissionGate::new(policy)),
        backend_handle,
        audit_handle,
        one_way_denial,
    );
    Harness {
        service,
        backend,
        audit,
    }
}

pub fn unprivileged() -> CallerIdentity {
    CallerIdentity::new(PrincipalId::new(CALLER))
}

pub fn privileged() -> CallerIdentity {
    unprivileged()
        .with_permission(DEFAULT_ACCESS_METRICS_PERMISSION)
        .with_permission(DEFAULT_REGISTER_PULL_ATOM_PERMISSION)
}

pub fn callback(token: &str) -> PendingOperation {
    PendingOperation::new(token)
}

/// Invokes `operation` with valid arguments.
pub fn invoke(
    service: &StatsService,
    identity: Option<&CallerIdentity>,
    operation: StatsOperation,
) -> Result<(), StatsError> {
    match operation {
        StatsOperation::AddConfig => service.add_config(identity, 1, b"metric config"),
        StatsOperation::RemoveConfig => service.remove_config(identity, 1),
        StatsOperation::GetReports => service.get_reports(identity, 1).map(|_| ()),
        StatsOperation::GetMetadata => service.get_metadata(identity).map(|_| ()),
        StatsOperation::GetRegisteredExperimentIds => {
            service.get_registered_experiment_ids(identity).map(|_| ())
        }
        StatsOperation::SetBroadcastSubscriber => {
            service.set_broadcast_subscriber(identity, Some(callback("broadcast")), 1, 7)
        }
        StatsOperation::SetFetchReportsOperation => {
            service.set_fetch_reports_operation(identity, Some(callback("fetch")), 1)
        }
        StatsOperation::SetActiveConfigsChangedOperation => service
            .set_active_configs_changed_operation(identity, Some(callback("active")))
            .map(|_| ()),
        StatsOperation::SetPullAtomCallback => service.set_pull_atom_callback(
            identity,
            ATOM_TAG,
            PullAtomMetadata::default(),
            callback("puller"),
        ),
    }
}
