//! Router Module Index
//!
//! Organizes routing into access-segregated modules. Access control is attached at the
//! module level (authentication) and per route (authorization policy), so a protected
//! endpoint cannot be mounted without its gate.

/// Routes accessible to anonymous clients: health and the session lifecycle endpoints.
pub mod public;

/// Routes behind the `require_auth` gate, each with its own ownership policy.
pub mod authenticated;

/// Routes restricted to users with the admin role.
pub mod admin;
