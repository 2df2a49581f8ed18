//! Integration test module
//!
//! This module contains integration tests for the survey engine API.
//!
//! - `health_test` - Health check endpoint tests (/api/health/*)
//! - `survey_test` - Public façade tests against the seeded sample survey (/api/respondents/*)
//!
//! # Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test --test integration
//!
//! # Run tests requiring a database
//! TEST_DATABASE_URL=postgresql://... cargo test --test integration
//! ```

pub mod health_test;
pub mod survey_test;

// Re-export common utilities for convenience
pub use crate::common::*;
