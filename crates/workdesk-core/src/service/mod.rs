//! Business logic services (use cases).
//!
//! Services orchestrate repository calls, the transactional writer and
//! access rules. They depend on traits (ports) -- never on concrete
//! infrastructure implementations.

pub mod estimate;
pub mod work_order;
