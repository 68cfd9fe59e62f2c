// crates/stats-gate-core/src/lib.rs
// ============================================================================
// Module: Stats Gate Core Library
// Description: Public API surface for the stats authorization gate.
// Purpose: Expose caller identity, operation, policy, and decision types.
// Dependencies: crate::{identity, operation, policy, gate}
// ============================================================================

//! ## Overview
//! Stats Gate core decides, before any work is performed, whether a caller may
//! invoke an administrative or data-access operation of a metrics-collection
//! service. The gate is a pure predicate: it never performs I/O, never blocks,
//! and never mutates shared state, so it can be evaluated concurrently from any
//! number of request threads.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod gate;
pub mod identity;
pub mod operation;
pub mod policy;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use gate::AuthorizationGate;
pub use gate::AuthorizationResult;
pub use gate::Denial;
pub use gate::DenialCause;
pub use gate::DenialReason;
pub use gate::PermissionGate;
pub use gate::authorize;
pub use identity::CallerIdentity;
pub use identity::Permission;
pub use identity::PrincipalId;
pub use operation::CallMode;
pub use operation::OperationKind;
pub use operation::RequiredCapability;
pub use operation::StatsOperation;
pub use policy::DenialPolicy;
pub use policy::GatePolicy;
pub use policy::PermissionMap;
pub use policy::PolicyError;
pub use policy::PolicyProfile;
