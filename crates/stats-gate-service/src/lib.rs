// crates/stats-gate-service/src/lib.rs
// ============================================================================
// Module: Stats Gate Service Library
// Description: Gated service boundary for the metrics-collection engine.
// Purpose: Wire the authorization gate, audit sinks, and backend together.
// Dependencies: crate::{audit, backend, service}
// ============================================================================

//! ## Overview
//! The service crate is where authorization decisions take effect. Every
//! entry point of [`StatsService`] consults the gate before anything else,
//! audits the decision, and only then validates arguments and reaches the
//! [`StatsBackend`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod backend;
pub mod service;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::DenialSurface;
pub use audit::FileAuditSink;
pub use audit::GateAuditEvent;
pub use audit::GateAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use audit::sink_from_config;
pub use backend::BackendError;
pub use backend::ConfigKey;
pub use backend::InMemoryStatsBackend;
pub use backend::PendingOperation;
pub use backend::PullAtomMetadata;
pub use backend::PullRegistration;
pub use backend::StatsBackend;
pub use service::MAX_ADDITIVE_FIELDS;
pub use service::MAX_CONFIG_BYTES;
pub use service::MAX_PULL_TIMEOUT_MILLIS;
pub use service::ServiceBuildError;
pub use service::StatsError;
pub use service::StatsService;
pub use service::UnavailableCause;
