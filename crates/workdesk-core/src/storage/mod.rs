//! Storage abstractions for Workdesk.
//!
//! Defines the blob store trait used for attachments.
//! Implementations live in workdesk-infra.

pub mod blob_store;
