//! Session tokens
//!
//! Tokens are random v4 UUIDs. They carry no information about the
//! document they stand for.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque handle for a loaded document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(Uuid);

impl SessionToken {
    /// Mint a fresh random token
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a caller-supplied token.
    ///
    /// Returns `None` for anything that is not a well-formed token; callers
    /// treat that exactly like an unknown token.
    pub fn parse(raw: &str) -> Option<Self> {
        Uuid::parse_str(raw.trim()).ok().map(Self)
    }

    /// Shard index for a cache with `shards` partitions
    pub(crate) fn shard(&self, shards: usize) -> usize {
        // v4 UUIDs are random in their low bits
        (self.0.as_u128() as usize) % shards
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}
