//! Chat session coordination: the TTL session store port and the guard that
//! admits or rejects every chat operation.

pub mod guard;
pub mod store;
