//! Shared domain types for Workdesk.
//!
//! Work orders, estimates, chat messages and sessions, the caller identity,
//! attachment policy, configuration and the error enums used across the
//! workspace.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod attachment;
pub mod config;
pub mod error;
pub mod estimate;
pub mod identity;
pub mod message;
pub mod session;
pub mod work_order;
