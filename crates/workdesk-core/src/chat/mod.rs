//! Chat over work orders: session start/close, messages and history.

pub mod service;
