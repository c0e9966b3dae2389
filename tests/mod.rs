//! Test suite for CareSync
//!
//! This module organizes all tests

pub mod common;
pub mod property;
