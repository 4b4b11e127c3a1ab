//! Attachment-carrying resources: the upload saga, the transactional writer
//! and the signed-access resolver used on every read.

pub mod saga;
pub mod signed;
pub mod writer;
