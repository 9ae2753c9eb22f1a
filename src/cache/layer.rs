//! Query result cache with TTL freshness and single-flight fetching.

use futures::future::{BoxFuture, FutureExt, Shared};
use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::{debug, warn};

use super::key::CacheKey;
use super::traits::{CacheResult, Clock, FetchResult, PaginationInfo, SystemClock};

type Flight<T, E> = Shared<BoxFuture<'static, Result<FetchResult<T>, E>>>;

enum Lookup<T, E> {
  Hit(CacheResult<T>),
  Wait(Flight<T, E>),
}

/// Whether a read may be answered from a fresh entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Freshness {
  #[default]
  CacheFirst,
  /// Always fetch; keep serving the entry if that fetch fails
  Reload,
}

fn ttl_millis(ttl: Duration) -> i64 {
  i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX)
}

/// One stored result. Replaced wholesale on refresh.
struct Slot<T> {
  data: T,
  pagination: Option<PaginationInfo>,
  timestamp: i64,
  last_used: u64,
}

struct Inner<T, E> {
  entries: HashMap<CacheKey, Slot<T>>,
  in_flight: HashMap<CacheKey, Flight<T, E>>,
  tick: u64,
}

/// In-memory cache for one resource family.
///
/// Entries are addressed by the full [`CacheKey`] and served while
/// `now - timestamp < ttl`. Concurrent misses for the same key share one
/// fetch; only that fetch writes the entry back. Fetch failures are passed
/// through untouched and never overwrite stored data.
pub struct QueryCache<T, E> {
  inner: Arc<Mutex<Inner<T, E>>>,
  clock: Arc<dyn Clock>,
  /// Least recently used entries are evicted above this size
  max_entries: Option<usize>,
}

impl<T, E> QueryCache<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Display + Send + Sync + 'static,
{
  /// Create an unbounded cache on the system clock.
  pub fn new() -> Self {
    Self::with_clock(Arc::new(SystemClock))
  }

  pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
    Self {
      inner: Arc::new(Mutex::new(Inner {
        entries: HashMap::new(),
        in_flight: HashMap::new(),
        tick: 0,
      })),
      clock,
      max_entries: None,
    }
  }

  /// Cap the number of stored entries. `0` disables the cap.
  pub fn with_max_entries(mut self, max_entries: usize) -> Self {
    self.max_entries = (max_entries > 0).then_some(max_entries);
    self
  }

  fn lock(&self) -> MutexGuard<'_, Inner<T, E>> {
    // Entries are only ever replaced whole, so a poisoned map is still consistent.
    self.inner.lock().unwrap_or_else(PoisonError::into_inner)
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Fresh entry for `key`: return it, `fetch` is not called
  /// 2. A fetch for `key` is already running: wait for it instead
  /// 3. Otherwise call `fetch`, store a success under `key`
  ///
  /// `fetch` runs under the cache lock only long enough to build its
  /// future, so it must not call back into this cache synchronously.
  pub async fn get<F, Fut>(
    &self,
    key: &CacheKey,
    ttl: Duration,
    fetch: F,
  ) -> Result<CacheResult<T>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<FetchResult<T>, E>> + Send + 'static,
  {
    match self.lookup(key, Some(ttl_millis(ttl)), fetch) {
      Lookup::Hit(hit) => Ok(hit),
      Lookup::Wait(flight) => self.land(key, flight).await,
    }
  }

  /// Fetch `key` even if a fresh entry exists.
  ///
  /// A success replaces the entry. On failure an entry that is still fresh
  /// under `ttl` is served instead of the error.
  pub async fn reload<F, Fut>(
    &self,
    key: &CacheKey,
    ttl: Duration,
    fetch: F,
  ) -> Result<CacheResult<T>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<FetchResult<T>, E>> + Send + 'static,
  {
    let outcome = match self.lookup(key, None, fetch) {
      Lookup::Hit(hit) => return Ok(hit),
      Lookup::Wait(flight) => self.land(key, flight).await,
    };
    outcome.or_else(|err| match self.fresh(key, ttl_millis(ttl)) {
      Some(kept) => {
        debug!(%key, "reload failed, serving cached entry");
        Ok(kept)
      }
      None => Err(err),
    })
  }

  /// Same as [`get`](Self::get) or [`reload`](Self::reload), picked by `freshness`.
  pub async fn load<F, Fut>(
    &self,
    key: &CacheKey,
    ttl: Duration,
    freshness: Freshness,
    fetch: F,
  ) -> Result<CacheResult<T>, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<FetchResult<T>, E>> + Send + 'static,
  {
    match freshness {
      Freshness::CacheFirst => self.get(key, ttl, fetch).await,
      Freshness::Reload => self.reload(key, ttl, fetch).await,
    }
  }

  /// The stored entry for `key` if it is younger than `ttl_ms`.
  fn fresh(&self, key: &CacheKey, ttl_ms: i64) -> Option<CacheResult<T>> {
    let mut inner = self.lock();
    let now = self.clock.now_millis();
    inner.tick += 1;
    let tick = inner.tick;

    let slot = inner.entries.get_mut(key)?;
    if now.saturating_sub(slot.timestamp) >= ttl_ms {
      return None;
    }
    slot.last_used = tick;
    Some(CacheResult::from_cache(
      slot.data.clone(),
      slot.pagination.map(|p| page_of(key, p)),
      slot.timestamp,
    ))
  }

  /// Serve a fresh entry (unless `ttl_ms` is `None`), join a running fetch,
  /// or start a new one.
  fn lookup<F, Fut>(&self, key: &CacheKey, ttl_ms: Option<i64>, fetch: F) -> Lookup<T, E>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<FetchResult<T>, E>> + Send + 'static,
  {
    if let Some(hit) = ttl_ms.and_then(|ttl_ms| self.fresh(key, ttl_ms)) {
      debug!(%key, age_ms = self.clock.now_millis() - hit.fetched_at, "cache hit");
      return Lookup::Hit(hit);
    }

    let mut inner = self.lock();
    match inner.in_flight.get(key) {
      Some(flight) => {
        debug!(%key, "joining in-flight fetch");
        Lookup::Wait(flight.clone())
      }
      None => {
        debug!(%key, "cache miss");
        let flight = fetch().boxed().shared();
        inner.in_flight.insert(key.clone(), flight.clone());
        Lookup::Wait(flight)
      }
    }
  }

  /// Wait for `flight` and store its success if it still owns `key`.
  ///
  /// Failures leave stored entries alone; an expired entry simply misses on
  /// the next read.
  async fn land(&self, key: &CacheKey, flight: Flight<T, E>) -> Result<CacheResult<T>, E> {
    let outcome = flight.clone().await;

    let mut inner = self.lock();
    // Only the flight still registered for this key may write; one that was
    // abandoned by clear/invalidate must not repopulate the map.
    let owns_flight = inner
      .in_flight
      .get(key)
      .is_some_and(|registered| registered.ptr_eq(&flight));
    if owns_flight {
      inner.in_flight.remove(key);
    }
    let now = self.clock.now_millis();

    match outcome {
      Ok(fetched) => {
        if owns_flight {
          self.store(&mut inner, key, &fetched, now);
        }
        let pagination = fetched.pagination.map(|p| page_of(key, p));
        Ok(CacheResult {
          data: fetched.data,
          pagination,
          from_cache: false,
          fetched_at: now,
        })
      }
      Err(err) => {
        warn!(%key, error = %err, "fetch failed");
        Err(err)
      }
    }
  }

  /// Run `fetch` without reading or writing the cache.
  ///
  /// Used for parameterized queries whose results are never cached; the
  /// result shape matches [`get`](Self::get).
  pub async fn bypass<Fut>(&self, fetch: Fut) -> Result<CacheResult<T>, E>
  where
    Fut: Future<Output = Result<FetchResult<T>, E>>,
  {
    let fetched = fetch.await?;
    Ok(CacheResult::from_network(fetched, self.clock.now_millis()))
  }

  fn store(&self, inner: &mut Inner<T, E>, key: &CacheKey, fetched: &FetchResult<T>, now: i64) {
    inner.tick += 1;
    let slot = Slot {
      data: fetched.data.clone(),
      pagination: fetched.pagination,
      timestamp: now,
      last_used: inner.tick,
    };
    inner.entries.insert(key.clone(), slot);

    let Some(max) = self.max_entries else {
      return;
    };
    while inner.entries.len() > max {
      let victim = inner
        .entries
        .iter()
        .filter(|(k, _)| *k != key)
        .min_by_key(|(_, slot)| slot.last_used)
        .map(|(k, _)| k.clone());
      match victim {
        Some(victim) => {
          debug!(key = %victim, "evicting least recently used entry");
          inner.entries.remove(&victim);
        }
        None => break,
      }
    }
  }

  /// Remove every entry of `resource` (optionally only one `filter`).
  ///
  /// Matching in-flight fetches are abandoned: callers still receive their
  /// results, but those results are not stored. Returns the number of
  /// entries removed.
  pub fn invalidate(&self, resource: &str, filter: Option<&str>) -> usize {
    let mut inner = self.lock();
    let before = inner.entries.len();
    inner.entries.retain(|k, _| !k.matches(resource, filter));
    inner.in_flight.retain(|k, _| !k.matches(resource, filter));
    let removed = before - inner.entries.len();
    debug!(resource, ?filter, removed, "invalidated cache entries");
    removed
  }

  /// Drop everything, including in-flight bookkeeping.
  pub fn clear(&self) {
    let mut inner = self.lock();
    inner.entries.clear();
    inner.in_flight.clear();
  }

  /// Pagination stored for any page of `resource`/`filter` at `limit`,
  /// reported at `current_page`.
  pub fn pagination_for(
    &self,
    resource: &str,
    filter: &str,
    limit: u32,
    current_page: u32,
  ) -> Option<PaginationInfo> {
    let inner = self.lock();
    inner
      .entries
      .iter()
      .filter(|(k, _)| k.matches(resource, Some(filter)) && k.limit == Some(limit))
      .filter_map(|(k, slot)| slot.pagination.map(|p| (k.page, p)))
      .min_by_key(|(page, _)| *page)
      .map(|(_, p)| p.with_current_page(current_page))
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  #[cfg(test)]
  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn contains(&self, key: &CacheKey) -> bool {
    self.lock().entries.contains_key(key)
  }
}

impl<T, E> Default for QueryCache<T, E>
where
  T: Clone + Send + Sync + 'static,
  E: Clone + Display + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<T, E> Clone for QueryCache<T, E> {
  fn clone(&self) -> Self {
    Self {
      inner: Arc::clone(&self.inner),
      clock: Arc::clone(&self.clock),
      max_entries: self.max_entries,
    }
  }
}

fn page_of(key: &CacheKey, pagination: PaginationInfo) -> PaginationInfo {
  match key.page {
    Some(page) => pagination.with_current_page(page),
    None => pagination,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::traits::ManualClock;
  use std::sync::atomic::{AtomicU32, Ordering};

  const TTL: Duration = Duration::from_millis(300_000);

  fn cache(clock: &ManualClock) -> QueryCache<Vec<u32>, String> {
    QueryCache::with_clock(Arc::new(clock.clone()))
  }

  fn counting_fetch(
    calls: &Arc<AtomicU32>,
    data: Vec<u32>,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<FetchResult<Vec<u32>>, String>> {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async move { Ok(FetchResult::new(data)) }.boxed()
    }
  }

  fn failing_fetch(
    calls: &Arc<AtomicU32>,
  ) -> impl FnOnce() -> BoxFuture<'static, Result<FetchResult<Vec<u32>>, String>> {
    let calls = calls.clone();
    move || {
      calls.fetch_add(1, Ordering::SeqCst);
      async { Err("network error".to_string()) }.boxed()
    }
  }

  fn pagination(total_pages: u32) -> PaginationInfo {
    PaginationInfo {
      current_page: 1,
      total_pages,
      total_count: 23,
      has_next_page: true,
      has_prev_page: false,
    }
  }

  #[tokio::test]
  async fn test_second_call_within_ttl_is_served_from_cache() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::paged("repositories", "all", 1, 15);

    let first = cache.get(&key, TTL, counting_fetch(&calls, vec![1])).await.unwrap();
    assert!(!first.from_cache);

    clock.advance(299_999);
    let second = cache.get(&key, TTL, counting_fetch(&calls, vec![2])).await.unwrap();
    assert!(second.from_cache);
    assert_eq!(second.data, vec![1]);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn test_expired_entry_is_refetched_once() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::singleton("repository-stats");

    cache.get(&key, TTL, counting_fetch(&calls, vec![1])).await.unwrap();
    clock.advance(300_000);
    let refreshed = cache.get(&key, TTL, counting_fetch(&calls, vec![2])).await.unwrap();

    assert!(!refreshed.from_cache);
    assert_eq!(refreshed.data, vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_refresh_keeps_fresh_entry() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::paged("repositories", "all", 1, 15);

    cache.get(&key, TTL, counting_fetch(&calls, vec![7])).await.unwrap();

    // A refresh forced with a zero TTL fails
    let err = cache.get(&key, Duration::ZERO, failing_fetch(&calls)).await;
    assert_eq!(err.unwrap_err(), "network error");

    // The old entry is still there and still fresh under the real TTL
    clock.advance(1_000);
    let served = cache.get(&key, TTL, failing_fetch(&calls)).await.unwrap();
    assert!(served.from_cache);
    assert_eq!(served.data, vec![7]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_refresh_of_expired_entry_misses_again() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::singleton("ai-comment-stats");

    cache.get(&key, TTL, counting_fetch(&calls, vec![1])).await.unwrap();
    clock.advance(400_000);
    assert!(cache.get(&key, TTL, failing_fetch(&calls)).await.is_err());

    // The stale entry is never served; the next read fetches again
    let next = cache.get(&key, TTL, counting_fetch(&calls, vec![2])).await.unwrap();
    assert!(!next.from_cache);
    assert_eq!(next.data, vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 3);
  }

  #[tokio::test]
  async fn test_reload_replaces_fresh_entry() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::paged("repositories", "all", 1, 15);

    cache.get(&key, TTL, counting_fetch(&calls, vec![1])).await.unwrap();
    let reloaded = cache.reload(&key, TTL, counting_fetch(&calls, vec![2])).await.unwrap();
    assert!(!reloaded.from_cache);
    assert_eq!(reloaded.data, vec![2]);

    let served = cache.get(&key, TTL, failing_fetch(&calls)).await.unwrap();
    assert!(served.from_cache);
    assert_eq!(served.data, vec![2]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_reload_serves_fresh_entry() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::paged("repositories", "starred", 1, 15);

    let stored = cache.get(&key, TTL, counting_fetch(&calls, vec![4])).await.unwrap();
    clock.advance(10_000);

    let served = cache.reload(&key, TTL, failing_fetch(&calls)).await.unwrap();
    assert!(served.from_cache);
    assert_eq!(served.data, vec![4]);
    assert_eq!(served.fetched_at, stored.fetched_at);
    assert_eq!(calls.load(Ordering::SeqCst), 2);

    // Still stored and served cache-first afterwards
    let again = cache.get(&key, TTL, failing_fetch(&calls)).await.unwrap();
    assert!(again.from_cache);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_failed_reload_without_fresh_entry_reports_error() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::singleton("starred-count");

    cache.get(&key, TTL, counting_fetch(&calls, vec![1])).await.unwrap();
    clock.advance(300_000);
    let err = cache.reload(&key, TTL, failing_fetch(&calls)).await;
    assert_eq!(err.unwrap_err(), "network error");
  }

  #[tokio::test]
  async fn test_failure_on_miss_writes_nothing() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::singleton("repository-stats");

    assert!(cache.get(&key, TTL, failing_fetch(&calls)).await.is_err());
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_invalidate_filter_leaves_other_filters() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));

    for key in [
      CacheKey::paged("repositories", "starred", 1, 15),
      CacheKey::paged("repositories", "starred", 2, 15),
      CacheKey::paged("repositories", "all", 1, 15),
    ] {
      cache.get(&key, TTL, counting_fetch(&calls, vec![1])).await.unwrap();
    }

    assert_eq!(cache.invalidate("repositories", Some("starred")), 2);
    assert!(cache.contains(&CacheKey::paged("repositories", "all", 1, 15)));
    assert!(!cache.contains(&CacheKey::paged("repositories", "starred", 1, 15)));
  }

  #[tokio::test]
  async fn test_end_to_end_starred_scenario() {
    let clock = ManualClock::new(1_700_000_000_000);
    let cache = cache(&clock);
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::paged("repositories", "starred", 1, 15);
    let items: Vec<u32> = (0..23).collect();

    let make_fetch = |items: Vec<u32>| {
      let calls = calls.clone();
      move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async move { Ok::<_, String>(FetchResult::paginated(items, pagination(2))) }
      }
    };

    let miss = cache.get(&key, TTL, make_fetch(items.clone())).await.unwrap();
    assert!(!miss.from_cache);
    assert_eq!(miss.data.len(), 23);
    let stored_at = miss.fetched_at;

    clock.advance(1_000);
    let hit = cache.get(&key, TTL, make_fetch(items.clone())).await.unwrap();
    assert!(hit.from_cache);
    assert_eq!(hit.data.len(), 23);
    assert_eq!(hit.fetched_at, stored_at);
    assert_eq!(hit.pagination.unwrap().total_count, 23);

    clock.advance(399_000);
    let refetched = cache.get(&key, TTL, make_fetch(items)).await.unwrap();
    assert!(!refetched.from_cache);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn test_concurrent_gets_share_one_fetch() {
    let cache: QueryCache<Vec<u32>, String> = QueryCache::new();
    let calls = Arc::new(AtomicU32::new(0));
    let key = CacheKey::paged("repositories", "all", 1, 15);

    let slow = |value: u32| {
      let calls = calls.clone();
      move || {
        calls.fetch_add(1, Ordering::SeqCst);
        async move {
          tokio::time::sleep(Duration::from_millis(20)).await;
          Ok::<_, String>(FetchResult::new(vec![value]))
        }
      }
    };

    let (a, b) = tokio::join!(cache.get(&key, TTL, slow(1)), cache.get(&key, TTL, slow(2)));

    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(a.unwrap().data, vec![1]);
    assert_eq!(b.unwrap().data, vec![1]);
    assert_eq!(cache.len(), 1);
  }

  #[tokio::test]
  async fn test_clear_abandons_in_flight_fetch() {
    let cache: QueryCache<Vec<u32>, String> = QueryCache::new();
    let key = CacheKey::singleton("repository-stats");
    let (tx, rx) = tokio::sync::oneshot::channel::<()>();

    let pending = {
      let cache = cache.clone();
      let key = key.clone();
      tokio::spawn(async move {
        cache
          .get(&key, TTL, move || async move {
            let _ = rx.await;
            Ok::<_, String>(FetchResult::new(vec![9]))
          })
          .await
      })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    cache.clear();
    tx.send(()).unwrap();

    let result = pending.await.unwrap().unwrap();
    assert_eq!(result.data, vec![9]);
    assert!(!cache.contains(&key));
  }

  #[tokio::test]
  async fn test_bypass_never_touches_storage() {
    let cache: QueryCache<Vec<u32>, String> = QueryCache::new();
    let result = cache
      .bypass(async { Ok(FetchResult::new(vec![3])) })
      .await
      .unwrap();
    assert!(!result.from_cache);
    assert!(cache.is_empty());
  }

  #[tokio::test]
  async fn test_least_recently_used_entry_is_evicted() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock).with_max_entries(2);
    let calls = Arc::new(AtomicU32::new(0));
    let a = CacheKey::paged("repositories", "all", 1, 15);
    let b = CacheKey::paged("repositories", "all", 2, 15);
    let c = CacheKey::paged("repositories", "all", 3, 15);

    cache.get(&a, TTL, counting_fetch(&calls, vec![1])).await.unwrap();
    cache.get(&b, TTL, counting_fetch(&calls, vec![2])).await.unwrap();
    // Touch `a` so `b` becomes the oldest
    cache.get(&a, TTL, counting_fetch(&calls, vec![1])).await.unwrap();
    cache.get(&c, TTL, counting_fetch(&calls, vec![3])).await.unwrap();

    assert_eq!(cache.len(), 2);
    assert!(cache.contains(&a));
    assert!(!cache.contains(&b));
    assert!(cache.contains(&c));
  }

  #[tokio::test]
  async fn test_pagination_reports_requested_page() {
    let clock = ManualClock::new(0);
    let cache = cache(&clock);
    let key = CacheKey::paged("repositories", "all", 2, 15);

    let result = cache
      .get(&key, TTL, || async {
        Ok::<_, String>(FetchResult::paginated(vec![1], pagination(3)))
      })
      .await
      .unwrap();
    assert_eq!(result.pagination.unwrap().current_page, 2);

    let found = cache.pagination_for("repositories", "all", 15, 3).unwrap();
    assert_eq!(found.current_page, 3);
    assert_eq!(found.total_pages, 3);
    assert!(cache.pagination_for("repositories", "all", 30, 1).is_none());
  }
}
