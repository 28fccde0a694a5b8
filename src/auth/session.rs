//! Session verification is delegated to the host's auth collaborator.

use crate::KeywardenError;
use serde::{Deserialize, Serialize};

/// The authenticated operator behind a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operator {
    /// Operator username.
    pub username: String,
}

/// Validates operator bearer credentials.
///
/// Implementations return `Unauthorized` for missing, expired or forged tokens.
pub trait SessionVerifier: Send + Sync {
    /// Resolve a bearer token to its operator.
    fn verify(&self, bearer: &str) -> Result<Operator, KeywardenError>;
}

impl<F> SessionVerifier for F
where
    F: Fn(&str) -> Result<Operator, KeywardenError> + Send + Sync,
{
    fn verify(&self, bearer: &str) -> Result<Operator, KeywardenError> {
        self(bearer)
    }
}

/// Verify an optional bearer token, treating absence as `Unauthorized`.
pub fn require_session(
    verifier: &dyn SessionVerifier,
    bearer: Option<&str>,
) -> Result<Operator, KeywardenError> {
    match bearer.filter(|b| !b.is_empty()) {
        Some(token) => verifier.verify(token),
        None => Err(KeywardenError::Unauthorized(
            "no session token provided".to_string(),
        )),
    }
}
