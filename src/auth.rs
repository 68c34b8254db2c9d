use std::collections::HashSet;
use std::sync::Arc;

use axum::http::{HeaderMap, header::AUTHORIZATION};
use sha2::{Digest, Sha256};

// Rate-limit key for anonymous and unrecognized callers
pub const SHARED_KEY: &str = "shared";

/// Bearer tokens that get a rate-limit bucket of their own.
///
/// Only digests are held. A token that is not in the set is treated like a
/// missing one, so minting new tokens never yields fresh quota.
#[derive(Clone, Debug, Default)]
pub struct ClientKeys {
    known: Arc<HashSet<String>>,
}

impl ClientKeys {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let known = tokens
            .into_iter()
            .map(|t| t.as_ref().trim().to_string())
            .filter(|t| !t.is_empty())
            .map(|t| digest(&t))
            .collect();
        Self {
            known: Arc::new(known),
        }
    }

    pub fn len(&self) -> usize {
        self.known.len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.is_empty()
    }

    /// Rate-limit key for a request: `client:<hash>` for a known bearer token,
    /// the shared key otherwise.
    pub fn caller_key(&self, headers: &HeaderMap) -> String {
        let token = headers
            .get(AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|t| !t.is_empty());

        match token.map(digest) {
            Some(hash) if self.known.contains(&hash) => format!("client:{hash}"),
            _ => SHARED_KEY.to_string(),
        }
    }
}

// First 16 hex chars of sha256(token)
fn digest(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token);
    let hex = format!("{:x}", hasher.finalize());
    hex[..16].to_string()
}
