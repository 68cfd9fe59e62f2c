// crates/stats-gate-config/src/lib.rs
// ============================================================================
// Module: Stats Gate Config Library
// Description: Canonical config model and validation for the stats gate.
// Purpose: Single source of truth for stats-gate.toml semantics.
// Dependencies: stats-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! `stats-gate-config` defines the configuration model for the stats
//! authorization gate: permission names, denial policy profile and overrides,
//! one-way denial surfacing, trusted principals, and audit logging. Validation
//! is strict and fail-closed.
//!
//! Security posture: config inputs are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
