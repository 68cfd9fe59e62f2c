// crates/stats-gate-service/src/audit.rs
// ============================================================================
// Module: Gate Audit Logging
// Description: Structured audit events for authorization decisions.
// Purpose: Emit JSON-line decision logs without hard logging dependencies.
// Dependencies: stats-gate-core, stats-gate-config, serde, serde_json
// ============================================================================

//! ## Overview
//! Every call through the service boundary produces one [`GateAuditEvent`]
//! describing the decision and whether a denial reached the caller. Sinks only
//! serialize and write JSON lines; routing is left to the deployment.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use stats_gate_config::AuditConfig;
use stats_gate_core::AuthorizationResult;
use stats_gate_core::CallerIdentity;
use stats_gate_core::DenialCause;
use stats_gate_core::PrincipalId;
use stats_gate_core::StatsOperation;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Whether a denial was returned to the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialSurface {
    /// The caller received the denial.
    Raised,
    /// The denial was recorded but not returned (one-way call).
    Suppressed,
}

/// Authorization audit event payload.
#[derive(Debug, Clone, Serialize)]
pub struct GateAuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// Operation being authorized.
    pub operation: StatsOperation,
    /// Decision outcome label.
    pub decision: &'static str,
    /// Caller principal when an identity was supplied.
    pub principal: Option<PrincipalId>,
    /// Denial cause (deny events only).
    pub cause: Option<DenialCause>,
    /// Denial reason detail (deny events only).
    pub reason: Option<String>,
    /// Surfacing of the denial (deny events only).
    pub surface: Option<DenialSurface>,
}

impl GateAuditEvent {
    /// Builds an event for a gate decision.
    #[must_use]
    pub fn new(
        identity: Option<&CallerIdentity>,
        operation: StatsOperation,
        result: &AuthorizationResult,
        surface: DenialSurface,
    ) -> Self {
        let timestamp_ms =
            SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis();
        let denial = result.denial();
        Self {
            event: "stats_gate_authz",
            timestamp_ms,
            operation,
            decision: if denial.is_some() { "deny" } else { "allow" },
            principal: identity.map(|identity| identity.principal),
            cause: denial.map(|denial| denial.cause),
            reason: denial.map(|denial| denial.reason.to_string()),
            surface: denial.map(|_| surface),
        }
    }
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Audit sink for authorization decisions.
pub trait GateAuditSink: Send + Sync {
    /// Record an audit event.
    fn record(&self, event: &GateAuditEvent);
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl GateAuditSink for StderrAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl GateAuditSink for FileAuditSink {
    fn record(&self, event: &GateAuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink.
pub struct NoopAuditSink;

impl GateAuditSink for NoopAuditSink {
    fn record(&self, _event: &GateAuditEvent) {}
}

/// Builds the audit sink selected by configuration.
///
/// # Errors
///
/// Returns an error when the configured audit file cannot be opened.
pub fn sink_from_config(config: &AuditConfig) -> io::Result<Arc<dyn GateAuditSink>> {
    if !config.enabled {
        return Ok(Arc::new(NoopAuditSink));
    }
    match config.path.as_deref().map(str::trim) {
        Some(path) => Ok(Arc::new(FileAuditSink::new(Path::new(path))?)),
        None => Ok(Arc::new(StderrAuditSink)),
    }
}
