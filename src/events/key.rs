//! # Topic and subscription identifiers.
//!
//! - [`EventKey`] names a topic.
//! - [`SubscriptionKey`] identifies one handler under a topic: the hex SHA-256
//!   of 64 random bytes, regenerated on collision up to a bounded number of
//!   times.

use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;

use rand::RngCore;
use sha2::{Digest, Sha256};

use crate::error::EventError;

/// Opaque, comparable topic identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventKey(Cow<'static, str>);

impl EventKey {
    /// Creates a topic key.
    pub fn new(value: impl Into<Cow<'static, str>>) -> Self {
        Self(value.into())
    }

    /// Topic name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&'static str> for EventKey {
    fn from(value: &'static str) -> Self {
        Self::new(value)
    }
}

impl From<String> for EventKey {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

/// Handle returned by [`EventBus::subscribe`](crate::EventBus::subscribe).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    /// Hex representation of the key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates a key not present in `taken`, trying at most `retries` times.
pub(crate) fn generate_key<V>(
    taken: &HashMap<String, V>,
    retries: usize,
) -> Result<SubscriptionKey, EventError> {
    let mut rng = rand::rng();
    for _ in 0..retries {
        let mut seed = [0u8; 64];
        rng.fill_bytes(&mut seed);
        let key = format!("{:x}", Sha256::digest(seed));

        if !taken.contains_key(&key) {
            return Ok(SubscriptionKey(key));
        }
    }
    Err(EventError::KeyExhausted { retries })
}
