//! Cache key for portfolio snapshots.

use std::fmt;

use crate::cache::{CacheKey, MAX_KEY_LENGTH};

const SCOPE: &str = "portfolio";

// == Portfolio Key ==
/// `("portfolio", token)`. Debug output never shows the token.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct PortfolioKey {
    token: String,
}

impl PortfolioKey {
    /// Derives the key for `token`; an empty token means no subscription.
    ///
    /// Any other string yields a key, so a whitespace-only token is rejected
    /// by validation instead of silently deactivating.
    pub fn for_token(token: &str) -> Option<Self> {
        if token.is_empty() {
            return None;
        }
        Some(Self {
            token: token.to_string(),
        })
    }

    pub fn scope(&self) -> &'static str {
        SCOPE
    }

    pub fn token(&self) -> &str {
        &self.token
    }
}

impl CacheKey for PortfolioKey {
    fn validate(&self) -> Result<(), String> {
        if self.token.len() > MAX_KEY_LENGTH {
            return Err(format!(
                "Token exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        // The token is sent verbatim in an Authorization header
        if !self.token.bytes().all(|b| b.is_ascii_graphic()) {
            return Err("Token contains whitespace or non-printable characters".to_string());
        }
        Ok(())
    }
}

impl fmt::Debug for PortfolioKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:?}, <token:{} bytes>)", SCOPE, self.token.len())
    }
}
