//! Common test utilities and helpers
//!
//! - Access token minting
//! - Mock backend (wiremock) and envelope bodies
//! - Scripted credential renewer
//! - Assertion macros

pub mod renewer;
pub mod tokens;

pub use mock_backend::*;
pub use renewer::*;
pub use tokens::*;
