// crates/stats-gate-config/src/config.rs
// ============================================================================
// Module: Stats Gate Configuration
// Description: Configuration loading and validation for the stats gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: stats-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Missing sections fall back to fail-closed defaults: the `current` denial
//! profile, default permission names, no trusted principals, and stderr audit
//! logging.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use stats_gate_core::DenialCause;
use stats_gate_core::DenialPolicy;
use stats_gate_core::GatePolicy;
use stats_gate_core::Permission;
use stats_gate_core::PermissionMap;
use stats_gate_core::PolicyProfile;
use stats_gate_core::PrincipalId;
use stats_gate_core::StatsOperation;
use stats_gate_core::policy::DEFAULT_ACCESS_METRICS_PERMISSION;
use stats_gate_core::policy::DEFAULT_REGISTER_PULL_ATOM_PERMISSION;
use thiserror::Error;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "stats-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "STATS_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 64 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum length of a permission name.
pub const MAX_PERMISSION_LENGTH: usize = 256;
/// Maximum number of trusted principals.
pub const MAX_TRUSTED_PRINCIPALS: usize = 64;

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Stats gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatsGateConfig {
    /// Authorization gate configuration.
    #[serde(default)]
    pub gate: GateConfig,
    /// Audit logging configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl StatsGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when loading or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.gate.validate()?;
        self.audit.validate()
    }
}

/// Authorization gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GateConfig {
    /// Denial cause preset.
    #[serde(default)]
    pub profile: PolicyProfile,
    /// Permission names bound to each capability.
    #[serde(default)]
    pub permissions: PermissionsConfig,
    /// Per-operation denial cause overrides applied on top of the profile.
    #[serde(default)]
    pub overrides: Vec<DenialOverrideConfig>,
    /// How denials of one-way calls are surfaced.
    #[serde(default)]
    pub one_way_denial: OneWayDenial,
    /// Principals permitted for every operation.
    #[serde(default)]
    pub trusted_principals: Vec<u32>,
}

impl GateConfig {
    /// Validates gate configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        self.permissions.validate()?;
        if self.trusted_principals.len() > MAX_TRUSTED_PRINCIPALS {
            return Err(ConfigError::Invalid("too many gate.trusted_principals".to_string()));
        }
        self.gate_policy().map(|_| ())
    }

    /// Builds the gate policy described by this configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when an override is unknown, duplicated, or
    /// rejected by the denial policy.
    pub fn gate_policy(&self) -> Result<GatePolicy, ConfigError> {
        let mut denial = DenialPolicy::from_profile(self.profile);
        let mut seen = BTreeSet::new();
        for entry in &self.overrides {
            let operation = StatsOperation::parse(entry.operation.trim()).ok_or_else(|| {
                ConfigError::Invalid(format!("unknown override operation: {}", entry.operation))
            })?;
            if !seen.insert(operation) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate override for operation: {operation}"
                )));
            }
            denial = denial
                .with_override(operation, entry.cause)
                .map_err(|err| ConfigError::Invalid(err.to_string()))?;
        }
        Ok(GatePolicy {
            permissions: self.permissions.permission_map(),
            denial,
            trusted_principals: self
                .trusted_principals
                .iter()
                .copied()
                .map(PrincipalId::new)
                .collect(),
        })
    }
}

/// Permission names bound to capabilities.
#[derive(Debug, Clone, Deserialize)]
pub struct PermissionsConfig {
    /// Permission granting metrics access.
    #[serde(default = "default_access_metrics")]
    pub access_metrics: String,
    /// Permission granting pull-atom registration.
    #[serde(default = "default_register_pull_atom")]
    pub register_pull_atom: String,
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            access_metrics: default_access_metrics(),
            register_pull_atom: default_register_pull_atom(),
        }
    }
}

impl PermissionsConfig {
    /// Validates permission names.
    fn validate(&self) -> Result<(), ConfigError> {
        validate_permission("gate.permissions.access_metrics", &self.access_metrics)?;
        validate_permission("gate.permissions.register_pull_atom", &self.register_pull_atom)
    }

    /// Converts the configured names into a core permission map.
    fn permission_map(&self) -> PermissionMap {
        PermissionMap {
            access_metrics: Permission::new(self.access_metrics.trim()),
            register_pull_atom: Permission::new(self.register_pull_atom.trim()),
        }
    }
}

/// Denial cause override for a single operation.
#[derive(Debug, Clone, Deserialize)]
pub struct DenialOverrideConfig {
    /// Operation name (snake case).
    pub operation: String,
    /// Cause reported when the operation is denied.
    pub cause: DenialCause,
}

/// Surfacing mode for denied one-way calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OneWayDenial {
    /// The call returns normally; the denial is only audited.
    #[default]
    Silent,
    /// The denial is returned to the caller like any two-way call.
    Observable,
}

impl OneWayDenial {
    /// Returns the canonical mode label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Silent => "silent",
            Self::Observable => "observable",
        }
    }
}

/// Audit logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuditConfig {
    /// Enable structured audit logging.
    #[serde(default = "default_audit_enabled")]
    pub enabled: bool,
    /// Optional audit log path (JSON lines); stderr when unset.
    #[serde(default)]
    pub path: Option<String>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            enabled: default_audit_enabled(),
            path: None,
        }
    }
}

impl AuditConfig {
    /// Validates audit configuration.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("audit.path", path)?;
        }
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path-valued config field.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    for component in Path::new(trimmed).components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Validates a permission name.
fn validate_permission(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_PERMISSION_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} too long")));
    }
    if trimmed.chars().any(char::is_whitespace) {
        return Err(ConfigError::Invalid(format!("{field} must not contain whitespace")));
    }
    Ok(())
}

/// Default metrics access permission name.
fn default_access_metrics() -> String {
    DEFAULT_ACCESS_METRICS_PERMISSION.to_string()
}

/// Default pull-atom registration permission name.
fn default_register_pull_atom() -> String {
    DEFAULT_REGISTER_PULL_ATOM_PERMISSION.to_string()
}

/// Default audit logging enabled.
const fn default_audit_enabled() -> bool {
    true
}

// ============================================================================
// SECTION: Tests
// ============================================================================
