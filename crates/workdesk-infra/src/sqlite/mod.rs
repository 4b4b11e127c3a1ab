//! SQLite storage layer.
//!
//! Repository implementations backed by SQLite with WAL mode and split
//! read/write connection pools.

pub mod estimate;
pub mod identity;
pub mod message;
pub mod pool;
pub mod tx;
pub mod work_order;
