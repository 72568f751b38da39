//! Session cache
//!
//! Volatile, process-scoped store that lets a token stand in for a loaded
//! document across independent requests.
//!
//! - Fixed-window expiry from creation (no sliding)
//! - Expired entries miss on lookup; a periodic sweep purges them
//! - Sharded locking so unrelated tokens do not contend

mod cache;
mod token;

pub use cache::{CachedDocument, SessionCache, DEFAULT_SHARDS, DEFAULT_TTL};
pub use token::SessionToken;
