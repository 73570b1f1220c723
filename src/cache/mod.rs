//! Cache Module
//!
//! Query-result cache with hybrid LFU/LRU eviction, payload sanitization and
//! two interchangeable storage backends.

pub mod backend;
pub mod entry;
pub mod eviction;
pub mod key;
pub mod local;
pub mod sanitize;
pub mod shared;
mod store;


// Re-export public types
pub use backend::Backend;
pub use entry::{CacheEntry, PopularQuery, DEGRADED_WARNING};
pub use store::{CacheStore, Lookup};

// == Public Constants ==
/// Maximum stored query length in characters
pub const MAX_QUERY_LENGTH: usize = 500;

/// Default number of rows returned by popularity listings
pub const DEFAULT_POPULAR_LIMIT: usize = 10;
