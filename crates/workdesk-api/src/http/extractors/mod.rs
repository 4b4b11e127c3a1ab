//! Request extractors: bearer identity, session header, multipart forms.

pub mod auth;
pub mod multipart;
pub mod session;
