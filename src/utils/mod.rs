//! Utility functions module
//!
//! Contains helper functions used across the application.

pub mod logging;

// Re-export commonly used items for convenience
pub use logging::{
    create_trace_layer, init_tracing, sanitize_email, sanitize_ip, sanitize_log_value,
    sanitize_url, sanitize_user_id, Environment, SanitizeOptions,
};

// Future utility modules will be declared here:
// pub mod date;
