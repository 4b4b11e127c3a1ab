//! Business logic and repository trait definitions for Workdesk.
//!
//! This crate defines the "ports" (repository, session store and blob store
//! traits) that the infrastructure layer implements, plus the session guard,
//! the transactional attachment writer and the services built on them. It
//! depends only on `workdesk-types` -- never on `workdesk-infra` or any
//! database/IO crate.

pub mod chat;
pub mod repository;
pub mod resource;
pub mod service;
pub mod session;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_support;
