//! Shared secrets held as SHA-256 digests.
//!
//! The configured secret is hashed once; presented credentials are hashed and
//! compared digest-to-digest over the full length, so comparison time does not
//! depend on where the first mismatching byte sits.

use crate::KeywardenError;
use sha2::{Digest, Sha256};
use std::fmt;

/// A shared secret such as the admin key or the clear-logs key.
#[derive(Clone)]
pub struct SharedSecret {
    digest: [u8; 32],
}

impl SharedSecret {
    /// Hash `secret` for later comparison.
    pub fn new(secret: &str) -> Self {
        Self {
            digest: sha256(secret),
        }
    }

    /// Whether `presented` equals the configured secret.
    pub fn matches(&self, presented: &str) -> bool {
        let candidate = sha256(presented);
        self.digest
            .iter()
            .zip(candidate.iter())
            .fold(0u8, |acc, (a, b)| acc | (a ^ b))
            == 0
    }

    /// Require a matching credential; `what` names it in the error.
    pub fn verify(&self, presented: Option<&str>, what: &str) -> Result<(), KeywardenError> {
        match presented {
            Some(value) if self.matches(value) => Ok(()),
            Some(_) => Err(KeywardenError::Unauthorized(format!("invalid {}", what))),
            None => Err(KeywardenError::Unauthorized(format!("missing {}", what))),
        }
    }

    /// Short hex prefix of the digest, safe to log.
    pub fn fingerprint(&self) -> String {
        hex::encode(&self.digest[..4])
    }
}

impl fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedSecret")
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

fn sha256(value: &str) -> [u8; 32] {
    let hash = Sha256::digest(value.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hash);
    out
}
