//! Custom middleware module
//!
//! Contains middleware for CORS and rate limiting.

pub mod cors;
pub mod rate_limit;

// Re-export commonly used items for convenience
pub use cors::{cors_layer, cors_layer_permissive};
pub use rate_limit::{
    default_rate_limit_layer, rate_limit_middleware, strict_rate_limit_layer, RateLimitConfig,
    RateLimiter,
};
