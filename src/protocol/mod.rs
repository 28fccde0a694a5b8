//! Wire formats: persisted timestamp layout and the response shapes handed
//! to the transport layer.

pub mod models;
pub mod timestamp;
