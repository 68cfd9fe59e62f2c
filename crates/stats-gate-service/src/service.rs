// crates/stats-gate-service/src/service.rs
// ============================================================================
// Module: Stats Service Boundary
// Description: Gated entry points of the metrics-collection service.
// Purpose: Authorize every call before argument validation or backend access.
// Dependencies: stats-gate-core, stats-gate-config, thiserror
// ============================================================================

//! ## Overview
//! [`StatsService`] exposes the nine stats operations. Each entry point runs
//! the same sequence: consult the injected [`AuthorizationGate`], record an
//! audit event, surface a denial as [`StatsError::Unavailable`], validate
//! arguments, then forward to the [`StatsBackend`].
//!
//! ## Invariants
//! - A denied call never reaches argument validation or the backend.
//! - Denials of two-way calls always reach the caller with their cause intact.
//! - Denials of one-way calls reach the caller only in
//!   [`OneWayDenial::Observable`] mode.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;
use std::sync::Arc;

use stats_gate_config::ConfigError;
use stats_gate_config::OneWayDenial;
use stats_gate_config::StatsGateConfig;
use stats_gate_core::AuthorizationGate;
use stats_gate_core::AuthorizationResult;
use stats_gate_core::CallMode;
use stats_gate_core::CallerIdentity;
use stats_gate_core::Denial;
use stats_gate_core::DenialCause;
use stats_gate_core::DenialReason;
use stats_gate_core::PermissionGate;
use stats_gate_core::StatsOperation;
use thiserror::Error;

use crate::audit::DenialSurface;
use crate::audit::GateAuditEvent;
use crate::audit::GateAuditSink;
use crate::audit::sink_from_config;
use crate::backend::BackendError;
use crate::backend::ConfigKey;
use crate::backend::PendingOperation;
use crate::backend::PullAtomMetadata;
use crate::backend::StatsBackend;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Maximum accepted config payload size in bytes.
pub const MAX_CONFIG_BYTES: usize = 1024 * 1024;
/// Maximum pull-atom timeout in milliseconds.
pub const MAX_PULL_TIMEOUT_MILLIS: u64 = 10_000;
/// Maximum number of additive fields on a pull-atom registration.
pub const MAX_ADDITIVE_FIELDS: usize = 64;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Underlying cause of an unavailable outcome.
#[derive(Debug, Error)]
pub enum UnavailableCause {
    /// The authorization gate refused the call.
    #[error("authorization denied")]
    Denied(#[from] Denial),
    /// The collection engine failed the call.
    #[error("backend failure")]
    Backend(#[from] BackendError),
}

/// Errors surfaced to callers of the stats service.
#[derive(Debug, Error)]
pub enum StatsError {
    /// The call could not be served; the source names the cause.
    #[error("stats service unavailable")]
    Unavailable(#[source] UnavailableCause),
    /// The call was authorized but its arguments are invalid.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl StatsError {
    /// Returns the authorization denial behind this error, if any.
    #[must_use]
    pub const fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Unavailable(UnavailableCause::Denied(denial)) => Some(denial),
            _ => None,
        }
    }

    /// Returns the denial cause behind this error, if any.
    #[must_use]
    pub fn denial_cause(&self) -> Option<DenialCause> {
        self.denial().map(|denial| denial.cause)
    }
}

impl From<Denial> for StatsError {
    fn from(denial: Denial) -> Self {
        Self::Unavailable(UnavailableCause::Denied(denial))
    }
}

impl From<BackendError> for StatsError {
    fn from(error: BackendError) -> Self {
        Self::Unavailable(UnavailableCause::Backend(error))
    }
}

/// Errors raised while assembling a service from configuration.
#[derive(Debug, Error)]
pub enum ServiceBuildError {
    /// Configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// Audit sink could not be opened.
    #[error("audit sink unavailable: {0}")]
    Audit(#[from] io::Error),
}

// ============================================================================
// SECTION: Service
// ============================================================================

/// Gated stats service boundary.
pub struct StatsService {
    /// Authorization gate consulted first on every call.
    gate: Arc<dyn AuthorizationGate>,
    /// Collection engine reached after authorization.
    backend: Arc<dyn StatsBackend>,
    /// Decision audit sink.
    audit: Arc<dyn GateAuditSink>,
    /// Surfacing mode for one-way denials.
    one_way_denial: OneWayDenial,
}

impl StatsService {
    /// Builds a service from explicit collaborators.
    #[must_use]
    pub fn new(
        gate: Arc<dyn AuthorizationGate>,
        backend: Arc<dyn StatsBackend>,
        audit: Arc<dyn GateAuditSink>,
        one_way_denial: OneWayDenial,
    ) -> Self {
        Self {
            gate,
            backend,
            audit,
            one_way_denial,
        }
    }

    /// Builds a service whose gate and audit sink come from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ServiceBuildError`] when the policy is invalid or the audit
    /// sink cannot be opened.
    pub fn from_config(
        config: &StatsGateConfig,
        backend: Arc<dyn StatsBackend>,
    ) -> Result<Self, ServiceBuildError> {
        let policy = config.gate.gate_policy()?;
        let audit = sink_from_config(&config.audit)?;
        Ok(Self::new(
            Arc::new(PermissionGate::new(policy)),
            backend,
            audit,
            config.gate.one_way_denial,
        ))
    }

    /// Returns the one-way denial mode.
    #[must_use]
    pub const fn one_way_denial(&self) -> OneWayDenial {
        self.one_way_denial
    }

    // ------------------------------------------------------------------------
    // Config mutation
    // ------------------------------------------------------------------------

    /// Installs or replaces the caller's config `config_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the call is denied, the payload is empty or
    /// oversized, or the backend fails.
    pub fn add_config(
        &self,
        identity: Option<&CallerIdentity>,
        config_id: i64,
        config: &[u8],
    ) -> Result<(), StatsError> {
        let caller = self.check(identity, StatsOperation::AddConfig)?;
        if config.is_empty() {
            return Err(StatsError::InvalidArgument("config payload is empty".to_string()));
        }
        if config.len() > MAX_CONFIG_BYTES {
            return Err(StatsError::InvalidArgument(
                "config payload exceeds size limit".to_string(),
            ));
        }
        self.backend.add_config(ConfigKey::new(caller.principal, config_id), config)?;
        Ok(())
    }

    /// Removes the caller's config `config_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the call is denied or the backend fails.
    pub fn remove_config(
        &self,
        identity: Option<&CallerIdentity>,
        config_id: i64,
    ) -> Result<(), StatsError> {
        let caller = self.check(identity, StatsOperation::RemoveConfig)?;
        self.backend.remove_config(ConfigKey::new(caller.principal, config_id))?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------------

    /// Fetches pending reports for the caller's config `config_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the call is denied or the backend fails.
    pub fn get_reports(
        &self,
        identity: Option<&CallerIdentity>,
        config_id: i64,
    ) -> Result<Vec<u8>, StatsError> {
        let caller = self.check(identity, StatsOperation::GetReports)?;
        Ok(self.backend.get_reports(ConfigKey::new(caller.principal, config_id))?)
    }

    /// Fetches collection engine metadata.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the call is denied or the backend fails.
    pub fn get_metadata(&self, identity: Option<&CallerIdentity>) -> Result<Vec<u8>, StatsError> {
        self.check(identity, StatsOperation::GetMetadata)?;
        Ok(self.backend.get_metadata()?)
    }

    /// Fetches registered experiment identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the call is denied or the backend fails.
    pub fn get_registered_experiment_ids(
        &self,
        identity: Option<&CallerIdentity>,
    ) -> Result<Vec<i64>, StatsError> {
        self.check(identity, StatsOperation::GetRegisteredExperimentIds)?;
        Ok(self.backend.registered_experiment_ids()?)
    }

    // ------------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------------

    /// Registers (`Some`) or clears (`None`) a broadcast subscriber for the
    /// caller's config `config_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the call is denied or the backend fails.
    pub fn set_broadcast_subscriber(
        &self,
        identity: Option<&CallerIdentity>,
        operation: Option<PendingOperation>,
        config_id: i64,
        subscriber_id: i64,
    ) -> Result<(), StatsError> {
        let caller = self.check(identity, StatsOperation::SetBroadcastSubscriber)?;
        if let Some(operation) = &operation {
            validate_pending_operation(operation)?;
        }
        self.backend.set_broadcast_subscriber(
            ConfigKey::new(caller.principal, config_id),
            subscriber_id,
            operation,
        )?;
        Ok(())
    }

    /// Registers (`Some`) or clears (`None`) the fetch-reports operation for
    /// the caller's config `config_id`.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the call is denied or the backend fails.
    pub fn set_fetch_reports_operation(
        &self,
        identity: Option<&CallerIdentity>,
        operation: Option<PendingOperation>,
        config_id: i64,
    ) -> Result<(), StatsError> {
        let caller = self.check(identity, StatsOperation::SetFetchReportsOperation)?;
        if let Some(operation) = &operation {
            validate_pending_operation(operation)?;
        }
        self.backend
            .set_fetch_reports_operation(ConfigKey::new(caller.principal, config_id), operation)?;
        Ok(())
    }

    /// Registers (`Some`) or clears (`None`) the caller's active-configs-changed
    /// operation and returns the caller's active config identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when the call is denied or the backend fails.
    pub fn set_active_configs_changed_operation(
        &self,
        identity: Option<&CallerIdentity>,
        operation: Option<PendingOperation>,
    ) -> Result<Vec<i64>, StatsError> {
        let caller = self.check(identity, StatsOperation::SetActiveConfigsChangedOperation)?;
        if let Some(operation) = &operation {
            validate_pending_operation(operation)?;
        }
        Ok(self.backend.set_active_configs_changed_operation(caller.principal, operation)?)
    }

    // ------------------------------------------------------------------------
    // Pull registration (one-way)
    // ------------------------------------------------------------------------

    /// Registers a pull-atom callback for `atom_tag`.
    ///
    /// This is a one-way call: in [`OneWayDenial::Silent`] mode a denial is
    /// audited and the call returns `Ok(())` without registering anything.
    ///
    /// # Errors
    ///
    /// Returns [`StatsError`] when arguments are invalid, the backend fails,
    /// or the call is denied in [`OneWayDenial::Observable`] mode.
    pub fn set_pull_atom_callback(
        &self,
        identity: Option<&CallerIdentity>,
        atom_tag: i32,
        metadata: PullAtomMetadata,
        callback: PendingOperation,
    ) -> Result<(), StatsError> {
        let caller = match self.check(identity, StatsOperation::SetPullAtomCallback) {
            Ok(caller) => caller,
            Err(_) if self.one_way_denial == OneWayDenial::Silent => return Ok(()),
            Err(err) => return Err(err),
        };
        validate_pull_registration(atom_tag, &metadata)?;
        validate_pending_operation(&callback)?;
        self.backend.set_pull_atom_callback(caller.principal, atom_tag, metadata, callback)?;
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Guard
    // ------------------------------------------------------------------------

    /// Authorizes the call, audits the decision, and returns the caller.
    fn check<'a>(
        &self,
        identity: Option<&'a CallerIdentity>,
        operation: StatsOperation,
    ) -> Result<&'a CallerIdentity, StatsError> {
        let decision = match (self.gate.authorize(identity, operation), identity) {
            (AuthorizationResult::Permitted, Some(caller)) => Ok(caller),
            // Fail closed when a gate permits a call without an identity.
            (AuthorizationResult::Permitted, None) => Err(Denial {
                operation,
                cause: self.gate.denial_cause(operation),
                reason: DenialReason::MissingIdentity,
            }),
            (AuthorizationResult::Denied(denial), _) => Err(denial),
        };
        let result = match &decision {
            Ok(_) => AuthorizationResult::Permitted,
            Err(denial) => AuthorizationResult::Denied(denial.clone()),
        };
        let surface = match (operation.call_mode(), self.one_way_denial) {
            (CallMode::OneWay, OneWayDenial::Silent) => DenialSurface::Suppressed,
            _ => DenialSurface::Raised,
        };
        self.audit.record(&GateAuditEvent::new(identity, operation, &result, surface));
        decision.map_err(StatsError::from)
    }
}

// ============================================================================
// SECTION: Argument Validation
// ============================================================================

/// Validates a callback reference.
fn validate_pending_operation(operation: &PendingOperation) -> Result<(), StatsError> {
    if operation.as_str().trim().is_empty() {
        return Err(StatsError::InvalidArgument("callback reference is empty".to_string()));
    }
    Ok(())
}

/// Validates pull-atom registration arguments.
fn validate_pull_registration(
    atom_tag: i32,
    metadata: &PullAtomMetadata,
) -> Result<(), StatsError> {
    if atom_tag <= 0 {
        return Err(StatsError::InvalidArgument("atom tag must be positive".to_string()));
    }
    if metadata.timeout_millis == 0 || metadata.timeout_millis > MAX_PULL_TIMEOUT_MILLIS {
        return Err(StatsError::InvalidArgument(format!(
            "pull timeout must be between 1 and {MAX_PULL_TIMEOUT_MILLIS} ms"
        )));
    }
    if metadata.additive_fields.len() > MAX_ADDITIVE_FIELDS {
        return Err(StatsError::InvalidArgument("too many additive fields".to_string()));
    }
    if metadata.additive_fields.iter().any(|field| *field <= 0) {
        return Err(StatsError::InvalidArgument("additive fields must be positive".to_string()));
    }
    Ok(())
}
