//! Durable JSON document stores.

pub mod file;

pub use file::JsonStore;
