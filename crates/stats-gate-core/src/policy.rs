// crates/stats-gate-core/src/policy.rs
// ============================================================================
// Module: Gate Policy
// Description: Permission names, denial cause table, and trusted principals.
// Purpose: Select version-dependent denial behavior at construction time.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! The gate decision itself is fixed; what varies between deployments is the
//! permission name bound to each capability and the cause a denial reports.
//! Those choices live in a [`GatePolicy`] chosen when the gate is built, so the
//! predicate stays deterministic and testable in isolation.
//!
//! ## Invariants
//! - Only query operations may deny with [`DenialCause::StateUnavailable`].
//! - Operations absent from the denial table deny with
//!   [`DenialCause::CapabilityDenied`].

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::gate::DenialCause;
use crate::identity::Permission;
use crate::identity::PrincipalId;
use crate::operation::RequiredCapability;
use crate::operation::StatsOperation;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default permission name for metrics access.
pub const DEFAULT_ACCESS_METRICS_PERMISSION: &str = "stats.access_metrics";
/// Default permission name for pull-atom registration.
pub const DEFAULT_REGISTER_PULL_ATOM_PERMISSION: &str = "stats.register_pull_atom";

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Policy construction errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    /// An operation without a version-dependent denial was mapped to a
    /// state-unavailable denial.
    #[error("operation {0} cannot deny with state_unavailable; only get_reports may")]
    StateUnavailableNotAllowed(StatsOperation),
}

// ============================================================================
// SECTION: Permission Map
// ============================================================================

/// Permission names bound to each required capability.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionMap {
    /// Permission granting metrics access.
    pub access_metrics: Permission,
    /// Permission granting pull-atom registration.
    pub register_pull_atom: Permission,
}

impl PermissionMap {
    /// Returns the permission bound to a capability.
    #[must_use]
    pub const fn for_capability(&self, capability: RequiredCapability) -> &Permission {
        match capability {
            RequiredCapability::AccessMetrics => &self.access_metrics,
            RequiredCapability::RegisterPullAtom => &self.register_pull_atom,
        }
    }
}

impl Default for PermissionMap {
    fn default() -> Self {
        Self {
            access_metrics: Permission::new(DEFAULT_ACCESS_METRICS_PERMISSION),
            register_pull_atom: Permission::new(DEFAULT_REGISTER_PULL_ATOM_PERMISSION),
        }
    }
}

// ============================================================================
// SECTION: Denial Policy
// ============================================================================

/// Named presets for the denial cause table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyProfile {
    /// Every denial reports a capability denial.
    Legacy,
    /// Report fetches deny with a state-unavailable cause.
    #[default]
    Current,
}

impl PolicyProfile {
    /// Returns the canonical profile label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Legacy => "legacy",
            Self::Current => "current",
        }
    }
}

/// Table of denial causes keyed by operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DenialPolicy {
    /// Operations whose denial cause differs from capability denial.
    causes: BTreeMap<StatsOperation, DenialCause>,
}

impl DenialPolicy {
    /// Builds the denial table for a named profile.
    #[must_use]
    pub fn from_profile(profile: PolicyProfile) -> Self {
        let mut causes = BTreeMap::new();
        if profile == PolicyProfile::Current {
            causes.insert(StatsOperation::GetReports, DenialCause::StateUnavailable);
        }
        Self {
            causes,
        }
    }

    /// Returns a copy with the denial cause for `operation` replaced.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::StateUnavailableNotAllowed`] when an operation
    /// other than [`StatsOperation::GetReports`] is mapped to
    /// [`DenialCause::StateUnavailable`].
    pub fn with_override(
        mut self,
        operation: StatsOperation,
        cause: DenialCause,
    ) -> Result<Self, PolicyError> {
        if cause == DenialCause::StateUnavailable && !operation.has_version_dependent_denial() {
            return Err(PolicyError::StateUnavailableNotAllowed(operation));
        }
        match cause {
            DenialCause::CapabilityDenied => {
                self.causes.remove(&operation);
            }
            DenialCause::StateUnavailable => {
                self.causes.insert(operation, cause);
            }
        }
        Ok(self)
    }

    /// Returns the denial cause reported for `operation`.
    #[must_use]
    pub fn cause_for(&self, operation: StatsOperation) -> DenialCause {
        self.causes.get(&operation).copied().unwrap_or(DenialCause::CapabilityDenied)
    }
}

impl Default for DenialPolicy {
    fn default() -> Self {
        Self::from_profile(PolicyProfile::default())
    }
}

// ============================================================================
// SECTION: Gate Policy
// ============================================================================

/// Complete policy evaluated by the permission gate.
///
/// The default policy uses the current profile, default permission names and
/// no trusted principals.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GatePolicy {
    /// Permission names per capability.
    pub permissions: PermissionMap,
    /// Denial cause table.
    pub denial: DenialPolicy,
    /// Principals permitted for every operation regardless of permissions.
    pub trusted_principals: BTreeSet<PrincipalId>,
}

impl GatePolicy {
    /// Builds a policy for a profile with default permission names.
    #[must_use]
    pub fn for_profile(profile: PolicyProfile) -> Self {
        Self {
            permissions: PermissionMap::default(),
            denial: DenialPolicy::from_profile(profile),
            trusted_principals: BTreeSet::new(),
        }
    }

    /// Returns the permission required for `operation`.
    #[must_use]
    pub const fn required_permission(&self, operation: StatsOperation) -> &Permission {
        self.permissions.for_capability(operation.required_capability())
    }

    /// Returns true when the principal bypasses permission checks.
    #[must_use]
    pub fn is_trusted(&self, principal: PrincipalId) -> bool {
        self.trusted_principals.contains(&principal)
    }
}
