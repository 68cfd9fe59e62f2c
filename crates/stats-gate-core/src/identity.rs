// crates/stats-gate-core/src/identity.rs
// ============================================================================
// Module: Caller Identity
// Description: Principal identifiers and granted permissions for callers.
// Purpose: Provide the read-only identity view inspected by the gate.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A [`CallerIdentity`] is supplied by the hosting environment for every
//! incoming call. The gate only inspects it; it never constructs, caches, or
//! persists identities.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Principal Identifier
// ============================================================================

/// Numeric principal identifier (a uid on the hosting platform).
///
/// # Invariants
/// - Opaque; zero is a valid value (commonly the root principal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrincipalId(u32);

impl PrincipalId {
    /// Creates a principal identifier from a raw value.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PrincipalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

// ============================================================================
// SECTION: Permission
// ============================================================================

/// Named permission a caller may hold.
///
/// # Invariants
/// - Compared by exact string value; no normalization is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(String);

impl Permission {
    /// Creates a new permission name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Returns the permission name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for Permission {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Permission {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Caller Identity
// ============================================================================

/// Runtime identity of the process making a request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerIdentity {
    /// Principal making the call.
    pub principal: PrincipalId,
    /// Permissions granted to the principal.
    #[serde(default)]
    pub permissions: BTreeSet<Permission>,
}

impl CallerIdentity {
    /// Builds an identity holding no permissions.
    #[must_use]
    pub const fn new(principal: PrincipalId) -> Self {
        Self {
            principal,
            permissions: BTreeSet::new(),
        }
    }

    /// Returns a copy with the permission granted.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<Permission>) -> Self {
        self.permissions.insert(permission.into());
        self
    }

    /// Returns true when the identity holds the permission.
    #[must_use]
    pub fn holds(&self, permission: &Permission) -> bool {
        self.permissions.contains(permission)
    }
}
