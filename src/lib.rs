//! Multi-tenant access control and leaderboard membership engine.
//!
//! Resolves "what can this user do, in which organisation, right now" and
//! "which leaderboards can this user see and join". Authentication, HTTP
//! routing and billing computation live elsewhere; this crate exposes the
//! authorization gates and the membership state machines over a storage
//! collaborator trait.

pub mod authz;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod store;

pub use authz::{can_read, can_write, require_permission, require_writable, resolve, AccessContext};
pub use config::Config;
pub use error::{CoreError, CoreResult};
pub use services::visibility::{check_visibility, Access, DenialReason};
