//! Operator authentication: shared administrative secrets and the external
//! session collaborator.

pub mod secret;
pub mod session;

pub use secret::SharedSecret;
pub use session::{Operator, SessionVerifier};
