//! Async query handle bridging spawned fetches and the render loop.
//!
//! A `Query<T, E>` owns a fetcher closure, spawns it on `fetch()`, and picks
//! up the outcome on `poll()` from the event loop tick. Freshness is the
//! cache's job; a query only tracks the state of its latest request.
//!
//! ```ignore
//! let client = client.clone();
//! let selection = selection.clone();
//! let mut query = Query::new(move || {
//!     let client = client.clone();
//!     let selection = selection.get();
//!     async move { client.repositories(&selection).await }
//! });
//!
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll() {
//!     // State changed, trigger re-render
//! }
//! ```

use std::future::Future;
use std::pin::Pin;
use tokio::sync::mpsc;

use crate::github::ApiError;

/// The state of a query
#[derive(Debug, Clone)]
pub enum QueryState<T, E = ApiError> {
  /// Query has not been started
  Idle,
  /// Query is currently fetching data
  Loading,
  /// Query completed successfully
  Success(T),
  /// Query failed with an error
  Error(E),
}

impl<T, E> QueryState<T, E> {
  pub fn is_loading(&self) -> bool {
    matches!(self, QueryState::Loading)
  }

  pub fn data(&self) -> Option<&T> {
    match self {
      QueryState::Success(data) => Some(data),
      _ => None,
    }
  }

  pub fn error(&self) -> Option<&E> {
    match self {
      QueryState::Error(e) => Some(e),
      _ => None,
    }
  }
}

type BoxFuture<T, E> = Pin<Box<dyn Future<Output = Result<T, E>> + Send>>;

type FetcherFn<T, E> = Box<dyn Fn() -> BoxFuture<T, E> + Send + Sync>;

/// Async query for data fetching with state management.
pub struct Query<T, E = ApiError> {
  state: QueryState<T, E>,
  fetcher: FetcherFn<T, E>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, E>>>,
  /// Data from the last success, kept while a refetch runs
  previous: Option<T>,
}

impl<T: Clone + Send + 'static, E: Send + 'static> Query<T, E> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is called each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, E>> + Send + 'static,
  {
    Self {
      state: QueryState::Idle,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      previous: None,
    }
  }

  pub fn state(&self) -> &QueryState<T, E> {
    &self.state
  }

  /// Data of the current success, or of the last one while reloading.
  pub fn data(&self) -> Option<&T> {
    self.state.data().or(self.previous.as_ref())
  }

  pub fn is_loading(&self) -> bool {
    self.state.is_loading()
  }

  pub fn error(&self) -> Option<&E> {
    self.state.error()
  }

  /// Start fetching data if not already loading.
  pub fn fetch(&mut self) {
    if self.state.is_loading() {
      return;
    }
    self.start_fetch();
  }

  /// Force a refetch, even if already loading or data exists.
  pub fn refetch(&mut self) {
    // Cancel any pending fetch by dropping the receiver
    self.receiver = None;
    self.start_fetch();
  }

  /// Replace the data without fetching (optimistic updates).
  pub fn set_data(&mut self, data: T) {
    self.receiver = None;
    self.state = QueryState::Success(data);
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns `true` if the state changed. Call this in the event loop tick.
  pub fn poll(&mut self) -> bool {
    let receiver = match &mut self.receiver {
      Some(rx) => rx,
      None => return false,
    };

    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.state = QueryState::Success(data);
        self.receiver = None;
        true
      }
      Ok(Err(error)) => {
        self.state = QueryState::Error(error);
        self.receiver = None;
        true
      }
      Err(mpsc::error::TryRecvError::Empty) => false,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Fetch task died without reporting
        self.state = QueryState::Idle;
        self.receiver = None;
        true
      }
    }
  }

  fn start_fetch(&mut self) {
    if let Some(data) = self.state.data() {
      self.previous = Some(data.clone());
    }
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);
    self.state = QueryState::Loading;

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

impl<T: std::fmt::Debug, E: std::fmt::Debug> std::fmt::Debug for Query<T, E> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("state", &self.state)
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::time::Duration;

  #[tokio::test]
  async fn test_query_success() {
    let mut query: Query<Vec<i32>, String> = Query::new(|| async { Ok(vec![1, 2, 3]) });

    assert!(matches!(query.state(), QueryState::Idle));

    query.fetch();
    assert!(query.is_loading());

    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert_eq!(query.data(), Some(&vec![1, 2, 3]));
  }

  #[tokio::test]
  async fn test_query_error() {
    let mut query: Query<i32, String> = Query::new(|| async { Err("Something went wrong".to_string()) });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    assert!(query.poll());
    assert_eq!(query.error().map(String::as_str), Some("Something went wrong"));
  }

  #[tokio::test]
  async fn test_previous_data_kept_while_reloading() {
    let mut query: Query<i32, String> = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(20)).await;
      Ok(7)
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(50)).await;
    query.poll();

    query.refetch();
    assert!(query.is_loading());
    assert_eq!(query.data(), Some(&7));
  }

  #[tokio::test]
  async fn test_fetch_while_loading_is_noop() {
    let mut query: Query<i32, String> = Query::new(|| async {
      tokio::time::sleep(Duration::from_millis(100)).await;
      Ok(42)
    });

    query.fetch();
    assert!(query.is_loading());

    query.fetch();
    assert!(query.is_loading());
  }

  #[tokio::test]
  async fn test_refetch_cancels_pending() {
    let counter = std::sync::Arc::new(std::sync::atomic::AtomicU32::new(0));
    let counter_clone = counter.clone();

    let mut query: Query<u32, String> = Query::new(move || {
      let counter = counter_clone.clone();
      async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        Ok(counter.fetch_add(1, std::sync::atomic::Ordering::SeqCst))
      }
    });

    query.fetch();
    tokio::time::sleep(Duration::from_millis(10)).await;

    query.refetch();
    tokio::time::sleep(Duration::from_millis(100)).await;

    query.poll();
    // Only the second fetch should have been received
    assert_eq!(query.data(), Some(&1));
  }

  #[test]
  fn test_set_data() {
    let mut query: Query<i32, String> = Query::new(|| async { Ok(1) });
    query.set_data(5);
    assert_eq!(query.data(), Some(&5));
  }
}
