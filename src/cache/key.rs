//! Cache Key and Fetcher Traits
//!
//! Defines what the cache needs from its keys and from the operation that
//! produces values for them.

use std::fmt::Debug;
use std::hash::Hash;

use async_trait::async_trait;

use crate::cache::MAX_KEY_LENGTH;
use crate::error::FetchError;

// == Cache Key ==
/// An opaque, structurally comparable cache key.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {
    /// Rejects malformed keys before any entry is created.
    ///
    /// Returns a human readable reason on failure.
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

impl CacheKey for String {
    fn validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("Key cannot be empty".to_string());
        }
        if self.len() > MAX_KEY_LENGTH {
            return Err(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            ));
        }
        Ok(())
    }
}

// == Fetcher ==
/// The asynchronous operation that resolves a key to a fresh value.
///
/// The cache never calls this twice concurrently for the same key.
#[async_trait]
pub trait Fetcher<K, V>: Send + Sync + 'static
where
    K: Send + Sync,
    V: Send,
{
    async fn fetch(&self, key: &K) -> Result<V, FetchError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_key_valid() {
        assert!("portfolio".to_string().validate().is_ok());
    }

    #[test]
    fn test_string_key_empty() {
        assert!(String::new().validate().is_err());
    }

    #[test]
    fn test_string_key_too_long() {
        let key = "x".repeat(MAX_KEY_LENGTH + 1);
        assert!(key.validate().is_err());

        let key = "x".repeat(MAX_KEY_LENGTH);
        assert!(key.validate().is_ok());
    }
}
