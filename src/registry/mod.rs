//! Key records and the registry that administers them.

pub mod keys;
pub mod record;

pub use keys::KeyRegistry;
pub use record::{is_valid_key_format, KeyRecord, KeyTable};
