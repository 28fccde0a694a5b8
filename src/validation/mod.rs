//! Read-only key validation.

pub mod engine;

pub use engine::{validate, InvalidReason, Validation};
