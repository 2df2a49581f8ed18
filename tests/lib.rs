//! Test crate for the survey engine
//!
//! This crate provides the test infrastructure and integration tests
//! for the survey engine API.

// Common test utilities shared across all tests
pub mod common;

// Integration tests organized by feature
pub mod integration;
