//! Client-side query result cache.
//!
//! This module is independent of the dashboard's resources:
//! - Results are keyed by (resource, filter, page, limit)
//! - Entries expire after a per-call TTL
//! - Concurrent misses for one key share a single fetch
//! - The user's current selection lives beside the cache, not in it

mod key;
mod layer;
mod selection;
mod traits;

pub use key::CacheKey;
pub use layer::{Freshness, QueryCache};
pub use selection::{CurrentSelection, Selection, SelectionChange};
#[cfg(test)]
pub use traits::ManualClock;
pub use traits::{CacheResult, Clock, FetchResult, PaginationInfo, SystemClock};
