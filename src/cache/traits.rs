//! Core types shared by the cache and its callers.

use serde::{Deserialize, Serialize};
#[cfg(test)]
use std::sync::atomic::{AtomicI64, Ordering};
#[cfg(test)]
use std::sync::Arc;

/// Source of "now" in epoch milliseconds.
///
/// The cache never calls the system clock directly so TTL behaviour can be
/// driven deterministically in tests.
pub trait Clock: Send + Sync {
  fn now_millis(&self) -> i64;
}

/// Wall clock backed by chrono.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
  fn now_millis(&self) -> i64 {
    chrono::Utc::now().timestamp_millis()
  }
}

/// Clock that only moves when told to.
#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
  now: Arc<AtomicI64>,
}

#[cfg(test)]
impl ManualClock {
  pub fn new(start_millis: i64) -> Self {
    Self {
      now: Arc::new(AtomicI64::new(start_millis)),
    }
  }

  pub fn advance(&self, millis: i64) {
    self.now.fetch_add(millis, Ordering::SeqCst);
  }

  pub fn set(&self, millis: i64) {
    self.now.store(millis, Ordering::SeqCst);
  }
}

#[cfg(test)]
impl Clock for ManualClock {
  fn now_millis(&self) -> i64 {
    self.now.load(Ordering::SeqCst)
  }
}

/// Pagination block as returned by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationInfo {
  pub current_page: u32,
  pub total_pages: u32,
  pub total_count: u64,
  pub has_next_page: bool,
  pub has_prev_page: bool,
}

impl PaginationInfo {
  /// Copy of this block with `current_page` replaced.
  ///
  /// The server's value goes stale when the same filter is revisited at a
  /// different page, so callers always substitute their own page.
  pub fn with_current_page(self, page: u32) -> Self {
    Self {
      current_page: page,
      ..self
    }
  }
}

/// What a fetch function hands back to the cache.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResult<T> {
  pub data: T,
  pub pagination: Option<PaginationInfo>,
}

impl<T> FetchResult<T> {
  pub fn new(data: T) -> Self {
    Self {
      data,
      pagination: None,
    }
  }

  pub fn paginated(data: T, pagination: PaginationInfo) -> Self {
    Self {
      data,
      pagination: Some(pagination),
    }
  }
}

/// Result from a cache operation, including data and metadata about the source.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  pub pagination: Option<PaginationInfo>,
  /// True when served from storage without touching the network
  pub from_cache: bool,
  /// When the served data was fetched (epoch millis)
  pub fetched_at: i64,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(fetched: FetchResult<T>, fetched_at: i64) -> Self {
    Self {
      data: fetched.data,
      pagination: fetched.pagination,
      from_cache: false,
      fetched_at,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(data: T, pagination: Option<PaginationInfo>, fetched_at: i64) -> Self {
    Self {
      data,
      pagination,
      from_cache: true,
      fetched_at,
    }
  }

  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> CacheResult<U> {
    CacheResult {
      data: f(self.data),
      pagination: self.pagination,
      from_cache: self.from_cache,
      fetched_at: self.fetched_at,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_manual_clock_advances() {
    let clock = ManualClock::new(1_000);
    clock.advance(500);
    assert_eq!(clock.now_millis(), 1_500);
    clock.set(42);
    assert_eq!(clock.now_millis(), 42);
  }

  #[test]
  fn test_pagination_deserializes_camel_case() {
    let json = r#"{"currentPage":3,"totalPages":4,"totalCount":52,"hasNextPage":true,"hasPrevPage":true}"#;
    let p: PaginationInfo = serde_json::from_str(json).unwrap();
    assert_eq!(p.current_page, 3);
    assert_eq!(p.total_count, 52);
    assert_eq!(p.with_current_page(1).current_page, 1);
    assert_eq!(p.with_current_page(1).total_pages, 4);
  }
}
