//! Property-based tests

pub mod debounce_proptest;
pub mod lead_time_proptest;
pub mod rollback_proptest;
