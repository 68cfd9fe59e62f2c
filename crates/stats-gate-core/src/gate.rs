// crates/stats-gate-core/src/gate.rs
// ============================================================================
// Module: Authorization Gate
// Description: Permit/deny decisions for stats service operations.
// Purpose: Provide a single fail-closed guard evaluated before any work.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`authorize`] is the guard every stats entry point calls first. It returns
//! a value, never an error: denial is an ordinary outcome the service layer
//! translates into whatever surfacing mechanism it uses.
//!
//! ## Invariants
//! - Decisions are deterministic for identical identity, operation, and policy.
//! - An absent identity is denied, never permitted.
//! - A decision is never partial: permitted or denied with a single cause.
//!
//! Security posture: the gate is a trust boundary and fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::identity::CallerIdentity;
use crate::identity::Permission;
use crate::operation::StatsOperation;
use crate::policy::GatePolicy;

// ============================================================================
// SECTION: Decision Types
// ============================================================================

/// Inspectable cause attached to a denial.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialCause {
    /// The caller lacks the required capability.
    CapabilityDenied,
    /// The service cannot answer the query in its current state.
    StateUnavailable,
}

impl DenialCause {
    /// Returns the canonical cause label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::CapabilityDenied => "capability_denied",
            Self::StateUnavailable => "state_unavailable",
        }
    }
}

impl fmt::Display for DenialCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why the gate refused the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "permission", rename_all = "snake_case")]
pub enum DenialReason {
    /// No caller identity was available.
    MissingIdentity,
    /// The caller does not hold the named permission.
    MissingPermission(Permission),
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingIdentity => f.write_str("caller identity unavailable"),
            Self::MissingPermission(permission) => write!(f, "missing permission {permission}"),
        }
    }
}

/// Denied authorization outcome.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{operation} denied ({cause}): {reason}")]
pub struct Denial {
    /// Operation that was refused.
    pub operation: StatsOperation,
    /// Cause surfaced to the caller.
    pub cause: DenialCause,
    /// Detail for audit logs.
    pub reason: DenialReason,
}

/// Outcome of an authorization check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use]
pub enum AuthorizationResult {
    /// The operation may proceed unmodified.
    Permitted,
    /// The operation must abort.
    Denied(Denial),
}

impl AuthorizationResult {
    /// Returns true when the operation may proceed.
    #[must_use]
    pub const fn is_permitted(&self) -> bool {
        matches!(self, Self::Permitted)
    }

    /// Returns the denial when the operation was refused.
    #[must_use]
    pub const fn denial(&self) -> Option<&Denial> {
        match self {
            Self::Permitted => None,
            Self::Denied(denial) => Some(denial),
        }
    }

    /// Converts the outcome into a `Result` for `?` propagation.
    ///
    /// # Errors
    ///
    /// Returns the [`Denial`] when the operation was refused.
    pub fn into_result(self) -> Result<(), Denial> {
        match self {
            Self::Permitted => Ok(()),
            Self::Denied(denial) => Err(denial),
        }
    }
}

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Decides whether `identity` may perform `operation` under `policy`.
pub fn authorize(
    policy: &GatePolicy,
    identity: Option<&CallerIdentity>,
    operation: StatsOperation,
) -> AuthorizationResult {
    let deny = |reason| {
        AuthorizationResult::Denied(Denial {
            operation,
            cause: policy.denial.cause_for(operation),
            reason,
        })
    };
    let Some(identity) = identity else {
        return deny(DenialReason::MissingIdentity);
    };
    if policy.is_trusted(identity.principal) {
        return AuthorizationResult::Permitted;
    }
    let required = policy.required_permission(operation);
    if identity.holds(required) {
        AuthorizationResult::Permitted
    } else {
        deny(DenialReason::MissingPermission(required.clone()))
    }
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Authorization interface consulted by the stats service.
pub trait AuthorizationGate: Send + Sync {
    /// Decide whether the caller may perform the operation.
    fn authorize(
        &self,
        identity: Option<&CallerIdentity>,
        operation: StatsOperation,
    ) -> AuthorizationResult;

    /// Returns the cause this gate reports when it denies `operation`.
    ///
    /// Callers use it to deny consistently when they refuse a call the gate
    /// itself let through.
    fn denial_cause(&self, _operation: StatsOperation) -> DenialCause {
        DenialCause::CapabilityDenied
    }
}

// ============================================================================
// SECTION: Default Gate
// ============================================================================

/// Default gate evaluating a fixed [`GatePolicy`].
#[derive(Debug, Clone, Default)]
pub struct PermissionGate {
    /// Policy consulted for every decision.
    policy: GatePolicy,
}

impl PermissionGate {
    /// Builds a gate over `policy`.
    #[must_use]
    pub const fn new(policy: GatePolicy) -> Self {
        Self {
            policy,
        }
    }

    /// Returns the policy backing this gate.
    #[must_use]
    pub const fn policy(&self) -> &GatePolicy {
        &self.policy
    }
}

impl AuthorizationGate for PermissionGate {
    fn authorize(
        &self,
        identity: Option<&CallerIdentity>,
        operation: StatsOperation,
    ) -> AuthorizationResult {
        authorize(&self.policy, identity, operation)
    }

    fn denial_cause(&self, operation: StatsOperation) -> DenialCause {
        self.policy.denial.cause_for(operation)
    }
}
