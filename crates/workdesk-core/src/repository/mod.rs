//! Repository trait definitions (ports).
//!
//! These traits define the storage interface that the infrastructure layer
//! (workdesk-infra) implements. The core crate never depends on any
//! specific storage technology.

pub mod estimate;
pub mod identity;
pub mod message;
pub mod resource;
pub mod work_order;
