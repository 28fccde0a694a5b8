//! Per-client admission control for the public validation endpoint.

pub mod window;

pub use window::{RateLimiter, WindowState};
