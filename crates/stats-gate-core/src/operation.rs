// crates/stats-gate-core/src/operation.rs
// ============================================================================
// Module: Stats Operations
// Description: Canonical enumeration of gated stats service operations.
// Purpose: Attach required capability, kind, and call mode to each operation.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Every entry point of the stats service is named by a [`StatsOperation`].
//! The enumeration is closed: adding an entry point means adding a variant,
//! which forces every match on operations to be revisited.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Operation Attributes
// ============================================================================

/// Capability an operation requires of its caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredCapability {
    /// Access to collected metrics and their configuration.
    AccessMetrics,
    /// Registration of pull-atom callbacks.
    RegisterPullAtom,
}

/// Broad classification of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Mutates the config store.
    ConfigMutation,
    /// Reads service data without mutating it.
    Query,
    /// Registers or clears a subscriber.
    Subscription,
    /// Registers a pull-atom callback.
    PullRegistration,
}

/// Whether the caller observes the outcome of the call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallMode {
    /// Request/response call; failures reach the caller.
    TwoWay,
    /// Fire-and-forget call; the caller receives no response.
    OneWay,
}

// ============================================================================
// SECTION: Operations
// ============================================================================

/// Gated operations exposed by the stats service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatsOperation {
    /// Install or replace a metrics config.
    AddConfig,
    /// Remove a metrics config.
    RemoveConfig,
    /// Fetch pending reports for a config.
    GetReports,
    /// Fetch service metadata.
    GetMetadata,
    /// Fetch registered experiment identifiers.
    GetRegisteredExperimentIds,
    /// Register or clear a broadcast subscriber.
    SetBroadcastSubscriber,
    /// Register or clear the fetch-reports operation for a config.
    SetFetchReportsOperation,
    /// Register or clear the active-configs-changed operation.
    SetActiveConfigsChangedOperation,
    /// Register a pull-atom callback.
    SetPullAtomCallback,
}

impl StatsOperation {
    /// Returns the canonical string name for the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AddConfig => "add_config",
            Self::RemoveConfig => "remove_config",
            Self::GetReports => "get_reports",
            Self::GetMetadata => "get_metadata",
            Self::GetRegisteredExperimentIds => "get_registered_experiment_ids",
            Self::SetBroadcastSubscriber => "set_broadcast_subscriber",
            Self::SetFetchReportsOperation => "set_fetch_reports_operation",
            Self::SetActiveConfigsChangedOperation => "set_active_configs_changed_operation",
            Self::SetPullAtomCallback => "set_pull_atom_callback",
        }
    }

    /// Returns all operations in canonical order.
    #[must_use]
    pub const fn all() -> &'static [Self] {
        &[
            Self::AddConfig,
            Self::RemoveConfig,
            Self::GetReports,
            Self::GetMetadata,
            Self::GetRegisteredExperimentIds,
            Self::SetBroadcastSubscriber,
            Self::SetFetchReportsOperation,
            Self::SetActiveConfigsChangedOperation,
            Self::SetPullAtomCallback,
        ]
    }

    /// Parses an operation from its string representation.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "add_config" => Some(Self::AddConfig),
            "remove_config" => Some(Self::RemoveConfig),
            "get_reports" => Some(Self::GetReports),
            "get_metadata" => Some(Self::GetMetadata),
            "get_registered_experiment_ids" => Some(Self::GetRegisteredExperimentIds),
            "set_broadcast_subscriber" => Some(Self::SetBroadcastSubscriber),
            "set_fetch_reports_operation" => Some(Self::SetFetchReportsOperation),
            "set_active_configs_changed_operation" => Some(Self::SetActiveConfigsChangedOperation),
            "set_pull_atom_callback" => Some(Self::SetPullAtomCallback),
            _ => None,
        }
    }

    /// Returns the capability the caller must hold.
    #[must_use]
    pub const fn required_capability(self) -> RequiredCapability {
        match self {
            Self::SetPullAtomCallback => RequiredCapability::RegisterPullAtom,
            _ => RequiredCapability::AccessMetrics,
        }
    }

    /// Returns the operation classification.
    #[must_use]
    pub const fn kind(self) -> OperationKind {
        match self {
            Self::AddConfig | Self::RemoveConfig => OperationKind::ConfigMutation,
            Self::GetReports | Self::GetMetadata | Self::GetRegisteredExperimentIds => {
                OperationKind::Query
            }
            Self::SetBroadcastSubscriber
            | Self::SetFetchReportsOperation
            | Self::SetActiveConfigsChangedOperation => OperationKind::Subscription,
            Self::SetPullAtomCallback => OperationKind::PullRegistration,
        }
    }

    /// Returns the call mode of the operation.
    #[must_use]
    pub const fn call_mode(self) -> CallMode {
        match self {
            Self::SetPullAtomCallback => CallMode::OneWay,
            _ => CallMode::TwoWay,
        }
    }

    /// Returns true for read-style query operations.
    #[must_use]
    pub const fn is_query(self) -> bool {
        matches!(self.kind(), OperationKind::Query)
    }

    /// Returns true when the denial cause may differ between policy profiles.
    ///
    /// Only report retrieval qualifies; every other operation always denies
    /// with a capability denial.
    #[must_use]
    pub const fn has_version_dependent_denial(self) -> bool {
        matches!(self, Self::GetReports)
    }
}

impl fmt::Display for StatsOperation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}
