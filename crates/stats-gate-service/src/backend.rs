// crates/stats-gate-service/src/backend.rs
// ============================================================================
// Module: Stats Backend
// Description: Collaborator interface for the metrics-collection engine.
// Purpose: Isolate config storage and subscriber registration behind a trait.
// Dependencies: stats-gate-core, serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! [`StatsBackend`] is the metrics-collection engine as seen from the service
//! boundary. The service only calls it after the gate has permitted the
//! request and arguments have been validated. [`InMemoryStatsBackend`] keeps
//! everything in memory and can be switched unreachable; report contents and
//! callback delivery are outside its scope.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use stats_gate_core::PrincipalId;
use thiserror::Error;

// ============================================================================
// SECTION: Request Types
// ============================================================================

/// Config identifier scoped to the principal that installed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConfigKey {
    /// Owning principal.
    pub principal: PrincipalId,
    /// Caller-chosen config identifier.
    pub config_id: i64,
}

impl ConfigKey {
    /// Builds a config key.
    #[must_use]
    pub const fn new(principal: PrincipalId, config_id: i64) -> Self {
        Self {
            principal,
            config_id,
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.principal, self.config_id)
    }
}

/// Opaque reference to a caller-provided callback target.
///
/// # Invariants
/// - Opaque token; the service never interprets or invokes it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PendingOperation(String);

impl PendingOperation {
    /// Wraps a callback token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the callback token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Scheduling hints for a pull-atom callback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullAtomMetadata {
    /// Minimum interval between pulls in milliseconds.
    pub cool_down_millis: u64,
    /// Maximum time a pull may take in milliseconds.
    pub timeout_millis: u64,
    /// Field numbers aggregated additively across pulls.
    #[serde(default)]
    pub additive_fields: Vec<i32>,
}

impl Default for PullAtomMetadata {
    fn default() -> Self {
        Self {
            cool_down_millis: DEFAULT_PULL_COOL_DOWN_MILLIS,
            timeout_millis: DEFAULT_PULL_TIMEOUT_MILLIS,
            additive_fields: Vec::new(),
        }
    }
}

/// Default pull cool-down in milliseconds.
pub const DEFAULT_PULL_COOL_DOWN_MILLIS: u64 = 1_000;
/// Default pull timeout in milliseconds.
pub const DEFAULT_PULL_TIMEOUT_MILLIS: u64 = 2_000;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Backend failures surfaced through the service boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackendError {
    /// The collection engine cannot be reached.
    #[error("stats backend unreachable")]
    Unreachable,
    /// No config is installed under the key.
    #[error("unknown config {0}")]
    UnknownConfig(ConfigKey),
    /// Internal backend failure.
    #[error("stats backend internal error: {0}")]
    Internal(String),
}

// ============================================================================
// SECTION: Traits
// ============================================================================

/// Metrics-collection engine reached through the service boundary.
pub trait StatsBackend: Send + Sync {
    /// Install or replace a config.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the engine rejects the request.
    fn add_config(&self, key: ConfigKey, config: &[u8]) -> Result<(), BackendError>;

    /// Remove a config; removing an absent config succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the engine rejects the request.
    fn remove_config(&self, key: ConfigKey) -> Result<(), BackendError>;

    /// Fetch and clear pending reports for a config.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the config is unknown or the engine fails.
    fn get_reports(&self, key: ConfigKey) -> Result<Vec<u8>, BackendError>;

    /// Fetch engine metadata.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the engine fails.
    fn get_metadata(&self) -> Result<Vec<u8>, BackendError>;

    /// Fetch registered experiment identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the engine fails.
    fn registered_experiment_ids(&self) -> Result<Vec<i64>, BackendError>;

    /// Register (`Some`) or clear (`None`) a broadcast subscriber.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the engine rejects the request.
    fn set_broadcast_subscriber(
        &self,
        key: ConfigKey,
        subscriber_id: i64,
        operation: Option<PendingOperation>,
    ) -> Result<(), BackendError>;

    /// Register (`Some`) or clear (`None`) the fetch-reports operation.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the engine rejects the request.
    fn set_fetch_reports_operation(
        &self,
        key: ConfigKey,
        operation: Option<PendingOperation>,
    ) -> Result<(), BackendError>;

    /// Register (`Some`) or clear (`None`) the active-configs-changed
    /// operation; returns the principal's active config identifiers.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the engine rejects the request.
    fn set_active_configs_changed_operation(
        &self,
        principal: PrincipalId,
        operation: Option<PendingOperation>,
    ) -> Result<Vec<i64>, BackendError>;

    /// Register a pull-atom callback for `atom_tag`.
    ///
    /// # Errors
    ///
    /// Returns [`BackendError`] when the engine rejects the request.
    fn set_pull_atom_callback(
        &self,
        principal: PrincipalId,
        atom_tag: i32,
        metadata: PullAtomMetadata,
        callback: PendingOperation,
    ) -> Result<(), BackendError>;
}

// ============================================================================
// SECTION: In-Memory Backend
// ============================================================================

/// Registered pull-atom callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRegistration {
    /// Registering principal.
    pub principal: PrincipalId,
    /// Scheduling hints.
    pub metadata: PullAtomMetadata,
    /// Callback reference.
    pub callback: PendingOperation,
}

/// Mutable state of the in-memory backend.
#[derive(Debug, Default)]
struct BackendState {
    /// Installed configs.
    configs: BTreeMap<ConfigKey, Vec<u8>>,
    /// Broadcast subscribers keyed by config and subscriber id.
    broadcast_subscribers: BTreeMap<(ConfigKey, i64), PendingOperation>,
    /// Fetch-reports operations keyed by config.
    fetch_operations: BTreeMap<ConfigKey, PendingOperation>,
    /// Active-configs-changed operations keyed by principal.
    active_config_operations: BTreeMap<PrincipalId, PendingOperation>,
    /// Pull-atom callbacks keyed by atom tag.
    pull_callbacks: BTreeMap<i32, PullRegistration>,
    /// Registered experiment identifiers.
    experiment_ids: Vec<i64>,
}

/// Engine metadata payload produced by the in-memory backend.
#[derive(Debug, Serialize)]
struct MetadataSnapshot {
    /// Installed config count.
    config_count: usize,
    /// Registered broadcast subscriber count.
    broadcast_subscriber_count: usize,
    /// Registered pull callback count.
    pull_callback_count: usize,
}

/// In-memory stats backend for tests and offline tooling.
#[derive(Debug, Default)]
pub struct InMemoryStatsBackend {
    /// Guarded backend state.
    state: Mutex<BackendState>,
    /// Whether the backend accepts calls.
    unreachable: AtomicBool,
    /// Number of calls that reached the backend.
    calls: AtomicU64,
}

impl InMemoryStatsBackend {
    /// Builds an empty reachable backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a backend reporting the given experiment identifiers.
    #[must_use]
    pub fn with_experiment_ids(experiment_ids: Vec<i64>) -> Self {
        Self {
            state: Mutex::new(BackendState {
                experiment_ids,
                ..BackendState::default()
            }),
            ..Self::default()
        }
    }

    /// Marks the backend reachable or unreachable.
    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    /// Returns the number of calls that reached the backend.
    #[must_use]
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Returns the installed config payload for `key`.
    #[must_use]
    pub fn config(&self, key: ConfigKey) -> Option<Vec<u8>> {
        self.state.lock().ok().and_then(|state| state.configs.get(&key).cloned())
    }

    /// Returns the broadcast subscriber registered for `key` and `subscriber_id`.
    #[must_use]
    pub fn broadcast_subscriber(
        &self,
        key: ConfigKey,
        subscriber_id: i64,
    ) -> Option<PendingOperation> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.broadcast_subscribers.get(&(key, subscriber_id)).cloned())
    }

    /// Returns the fetch-reports operation registered for `key`.
    #[must_use]
    pub fn fetch_operation(&self, key: ConfigKey) -> Option<PendingOperation> {
        self.state.lock().ok().and_then(|state| state.fetch_operations.get(&key).cloned())
    }

    /// Returns the active-configs-changed operation registered by `principal`.
    #[must_use]
    pub fn active_configs_operation(&self, principal: PrincipalId) -> Option<PendingOperation> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.active_config_operations.get(&principal).cloned())
    }

    /// Returns the pull callback registered for `atom_tag`.
    #[must_use]
    pub fn pull_registration(&self, atom_tag: i32) -> Option<PullRegistration> {
        self.state.lock().ok().and_then(|state| state.pull_callbacks.get(&atom_tag).cloned())
    }

    /// Counts the call and returns the locked state when reachable.
    fn enter(&self) -> Result<MutexGuard<'_, BackendState>, BackendError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.unreachable.load(Ordering::SeqCst) {
            return Err(BackendError::Unreachable);
        }
        self.state.lock().map_err(|_| BackendError::Internal("backend lock poisoned".to_string()))
    }
}

impl StatsBackend for InMemoryStatsBackend {
    fn add_config(&self, key: ConfigKey, config: &[u8]) -> Result<(), BackendError> {
        self.enter()?.configs.insert(key, config.to_vec());
        Ok(())
    }

    fn remove_config(&self, key: ConfigKey) -> Result<(), BackendError> {
        let mut state = self.enter()?;
        state.configs.remove(&key);
        state.fetch_operations.remove(&key);
        state.broadcast_subscribers.retain(|(config, _), _| *config != key);
        Ok(())
    }

    fn get_reports(&self, key: ConfigKey) -> Result<Vec<u8>, BackendError> {
        let state = self.enter()?;
        if state.configs.contains_key(&key) {
            Ok(Vec::new())
        } else {
            Err(BackendError::UnknownConfig(key))
        }
    }

    fn get_metadata(&self) -> Result<Vec<u8>, BackendError> {
        let state = self.enter()?;
        let snapshot = MetadataSnapshot {
            config_count: state.configs.len(),
            broadcast_subscriber_count: state.broadcast_subscribers.len(),
            pull_callback_count: state.pull_callbacks.len(),
        };
        serde_json::to_vec(&snapshot).map_err(|err| BackendError::Internal(err.to_string()))
    }

    fn registered_experiment_ids(&self) -> Result<Vec<i64>, BackendError> {
        Ok(self.enter()?.experiment_ids.clone())
    }

    fn set_broadcast_subscriber(
        &self,
        key: ConfigKey,
        subscriber_id: i64,
        operation: Option<PendingOperation>,
    ) -> Result<(), BackendError> {
        let mut state = self.enter()?;
        match operation {
            Some(operation) => {
                state.broadcast_subscribers.insert((key, subscriber_id), operation);
            }
            None => {
                state.broadcast_subscribers.remove(&(key, subscriber_id));
            }
        }
        Ok(())
    }

    fn set_fetch_reports_operation(
        &self,
        key: ConfigKey,
        operation: Option<PendingOperation>,
    ) -> Result<(), BackendError> {
        let mut state = self.enter()?;
        match operation {
            Some(operation) => {
                state.fetch_operations.insert(key, operation);
            }
            None => {
                state.fetch_operations.remove(&key);
            }
        }
        Ok(())
    }

    fn set_active_configs_changed_operation(
        &self,
        principal: PrincipalId,
        operation: Option<PendingOperation>,
    ) -> Result<Vec<i64>, BackendError> {
        let mut state = self.enter()?;
        match operation {
            Some(operation) => {
                state.active_config_operations.insert(principal, operation);
            }
            None => {
                state.active_config_operations.remove(&principal);
            }
        }
        Ok(state
            .configs
            .keys()
            .filter(|key| key.principal == principal)
            .map(|key| key.config_id)
            .collect())
    }

    fn set_pull_atom_callback(
        &self,
        principal: PrincipalId,
        atom_tag: i32,
        metadata: PullAtomMetadata,
        callback: PendingOperation,
    ) -> Result<(), BackendError> {
        self.enter()?.pull_callbacks.insert(
            atom_tag,
            PullRegistration {
                principal,
                metadata,
                callback,
            },
        );
        Ok(())
    }
}
