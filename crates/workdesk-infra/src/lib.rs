//! Infrastructure layer for Workdesk.
//!
//! Contains implementations of the port traits defined in `workdesk-core`:
//! SQLite repositories and the identity token table, the in-process session
//! store, the filesystem blob store with signed links, and the config loader.

pub mod blob;
pub mod config;
pub mod session;
pub mod sqlite;
