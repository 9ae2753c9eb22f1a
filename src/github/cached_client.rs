//! Cached dashboard client that wraps BackendClient with transparent caching.

use color_eyre::Result;
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::cache::{
  CacheKey, CacheResult, Clock, FetchResult, Freshness, PaginationInfo, QueryCache, Selection,
  SelectionChange, SystemClock,
};
use crate::config::{CacheConfig, Config};

use super::client::BackendClient;
use super::error::{ApiError, ErrorKind};
use super::types::{
  AiCommentStats, CommentFilters, CommentPage, Commit, PullRequest, PullRequestsCount,
  Repository, RepositoryDetails, RepositoryFilter, RepositoryStats, StarredCount, User,
  WebhookStatus,
};

/// Resource family names used in cache keys and TTL overrides.
pub mod resources {
  pub const REPOSITORIES: &str = "repositories";
  pub const REPOSITORY_STATS: &str = "repository-stats";
  pub const AI_COMMENTS: &str = "ai-comments";
  pub const AI_COMMENT_STATS: &str = "ai-comment-stats";
  pub const PULL_REQUEST_COUNT: &str = "pull-request-count";
  pub const STARRED_COUNT: &str = "starred-count";
}

use resources::*;

/// Everything the overview page shows. Each part fails on its own.
#[derive(Debug, Clone)]
pub struct Overview {
  pub repository_stats: Result<CacheResult<RepositoryStats>, ApiError>,
  pub comment_stats: Result<CacheResult<AiCommentStats>, ApiError>,
  pub pull_requests: Result<CacheResult<PullRequestsCount>, ApiError>,
  pub starred: Result<CacheResult<StarredCount>, ApiError>,
}

/// Repository detail page data. Each part fails on its own.
#[derive(Debug, Clone)]
pub struct RepositoryBundle {
  pub details: Result<RepositoryDetails, ApiError>,
  pub pull_requests: Result<Vec<PullRequest>, ApiError>,
  pub commits: Result<Vec<Commit>, ApiError>,
}

/// Dashboard client with transparent caching support.
///
/// This wraps the underlying BackendClient and provides the same API, but
/// list and statistics queries go through one [`QueryCache`] per resource
/// family. Writes and detail lookups are passed straight through.
#[derive(Clone)]
pub struct CachedDashboardClient {
  inner: BackendClient,
  ttl: CacheConfig,
  sort: String,
  direction: String,
  repositories: QueryCache<Vec<Repository>, ApiError>,
  repository_stats: QueryCache<RepositoryStats, ApiError>,
  comments: QueryCache<CommentPage, ApiError>,
  comment_stats: QueryCache<AiCommentStats, ApiError>,
  pull_request_count: QueryCache<PullRequestsCount, ApiError>,
  starred_count: QueryCache<StarredCount, ApiError>,
}

impl CachedDashboardClient {
  /// Create a new cached client.
  pub fn new(config: &Config, token: Option<String>) -> Result<Self> {
    let inner = BackendClient::new(config, token)?;
    Ok(Self::with_clock(inner, config, Arc::new(SystemClock)))
  }

  pub fn with_clock(inner: BackendClient, config: &Config, clock: Arc<dyn Clock>) -> Self {
    let max = config.cache.max_entries;
    Self {
      inner,
      ttl: config.cache.clone(),
      sort: config.repositories.sort.clone(),
      direction: config.repositories.direction.clone(),
      repositories: QueryCache::with_clock(clock.clone()).with_max_entries(max),
      repository_stats: QueryCache::with_clock(clock.clone()).with_max_entries(max),
      comments: QueryCache::with_clock(clock.clone()).with_max_entries(max),
      comment_stats: QueryCache::with_clock(clock.clone()).with_max_entries(max),
      pull_request_count: QueryCache::with_clock(clock.clone()).with_max_entries(max),
      starred_count: QueryCache::with_clock(clock).with_max_entries(max),
    }
  }

  pub fn backend(&self) -> &BackendClient {
    &self.inner
  }

  /// Get one page of repositories for the selection, cache first.
  pub async fn repositories(&self, selection: &Selection) -> Result<CacheResult<Vec<Repository>>, ApiError> {
    self.load_repositories(selection, Freshness::CacheFirst).await
  }

  /// Refetch the selection's page. The cached page stays in use if this fails
  /// while it is still fresh.
  pub async fn reload_repositories(
    &self,
    selection: &Selection,
  ) -> Result<CacheResult<Vec<Repository>>, ApiError> {
    self.load_repositories(selection, Freshness::Reload).await
  }

  async fn load_repositories(
    &self,
    selection: &Selection,
    freshness: Freshness,
  ) -> Result<CacheResult<Vec<Repository>>, ApiError> {
    let filter: RepositoryFilter = selection
      .filter
      .parse()
      .map_err(|e: String| ApiError::new(ErrorKind::Generic, e))?;
    let key = selection.key();

    self
      .repositories
      .load(&key, self.ttl.ttl_for(REPOSITORIES), freshness, || {
        let inner = self.inner.clone();
        let (page, limit) = (selection.page, selection.limit);
        let (sort, direction) = (self.sort.clone(), self.direction.clone());
        async move {
          inner
            .list_repositories(filter, page, limit, &sort, &direction)
            .await
        }
      })
      .await
  }

  /// Pagination already known for the selection's filter and page size.
  pub fn repository_pagination(&self, selection: &Selection) -> Option<PaginationInfo> {
    self.repositories.pagination_for(
      REPOSITORIES,
      &selection.filter,
      selection.limit,
      selection.page,
    )
  }

  /// React to a selection update. A page size change drops every cached
  /// page of the old filter. Returns the number of entries removed.
  pub fn apply_selection_change(&self, change: &SelectionChange) -> usize {
    match change {
      SelectionChange::LimitChanged { filter, old_limit } => {
        let removed = self.repositories.invalidate(REPOSITORIES, Some(filter));
        debug!(%filter, old_limit, removed, "page size changed");
        removed
      }
      SelectionChange::Moved | SelectionChange::Unchanged => 0,
    }
  }

  async fn repository_stats(&self, freshness: Freshness) -> Result<CacheResult<RepositoryStats>, ApiError> {
    let inner = self.inner.clone();
    self
      .repository_stats
      .load(
        &CacheKey::singleton(REPOSITORY_STATS),
        self.ttl.ttl_for(REPOSITORY_STATS),
        freshness,
        move || async move { inner.repository_stats().await.map(FetchResult::new) },
      )
      .await
  }

  /// AI comments. The plain list is cached; filtered queries always hit the
  /// network and never touch the cache.
  pub async fn ai_comments(&self, filters: &CommentFilters) -> Result<CacheResult<CommentPage>, ApiError> {
    self.load_comments(filters, Freshness::CacheFirst).await
  }

  pub async fn reload_ai_comments(
    &self,
    filters: &CommentFilters,
  ) -> Result<CacheResult<CommentPage>, ApiError> {
    self.load_comments(filters, Freshness::Reload).await
  }

  async fn load_comments(
    &self,
    filters: &CommentFilters,
    freshness: Freshness,
  ) -> Result<CacheResult<CommentPage>, ApiError> {
    let inner = self.inner.clone();
    let filters = filters.clone();

    if !filters.is_empty() {
      debug!(?filters, "bypassing cache for filtered comments");
      return self
        .comments
        .bypass(async move { inner.ai_comments(&filters).await.map(FetchResult::new) })
        .await;
    }

    self
      .comments
      .load(
        &CacheKey::singleton(AI_COMMENTS),
        self.ttl.ttl_for(AI_COMMENTS),
        freshness,
        move || async move { inner.ai_comments(&filters).await.map(FetchResult::new) },
      )
      .await
  }

  async fn ai_comment_stats(&self, freshness: Freshness) -> Result<CacheResult<AiCommentStats>, ApiError> {
    let inner = self.inner.clone();
    self
      .comment_stats
      .load(
        &CacheKey::singleton(AI_COMMENT_STATS),
        self.ttl.ttl_for(AI_COMMENT_STATS),
        freshness,
        move || async move { inner.ai_comment_stats().await.map(FetchResult::new) },
      )
      .await
  }

  async fn pull_requests_count(&self, freshness: Freshness) -> Result<CacheResult<PullRequestsCount>, ApiError> {
    let inner = self.inner.clone();
    self
      .pull_request_count
      .load(
        &CacheKey::singleton(PULL_REQUEST_COUNT),
        self.ttl.ttl_for(PULL_REQUEST_COUNT),
        freshness,
        move || async move { inner.pull_requests_count().await.map(FetchResult::new) },
      )
      .await
  }

  async fn starred_count(&self, freshness: Freshness) -> Result<CacheResult<StarredCount>, ApiError> {
    let inner = self.inner.clone();
    self
      .starred_count
      .load(
        &CacheKey::singleton(STARRED_COUNT),
        self.ttl.ttl_for(STARRED_COUNT),
        freshness,
        move || async move { inner.starred_count().await.map(FetchResult::new) },
      )
      .await
  }

  /// Load the overview page. All four queries run concurrently.
  pub async fn overview(&self) -> Overview {
    self.load_overview(Freshness::CacheFirst).await
  }

  /// Refetch every overview statistic; each keeps its fresh cached value
  /// if its own refetch fails.
  pub async fn reload_overview(&self) -> Overview {
    self.load_overview(Freshness::Reload).await
  }

  async fn load_overview(&self, freshness: Freshness) -> Overview {
    let (repository_stats, comment_stats, pull_requests, starred) = futures::join!(
      self.repository_stats(freshness),
      self.ai_comment_stats(freshness),
      self.pull_requests_count(freshness),
      self.starred_count(freshness),
    );
    Overview {
      repository_stats,
      comment_stats,
      pull_requests,
      starred,
    }
  }

  /// Repository detail page (not cached - viewed one at a time).
  pub async fn repository_bundle(&self, owner: &str, name: &str) -> RepositoryBundle {
    let (details, pull_requests, commits) = futures::join!(
      self.inner.repository_details(owner, name),
      self.inner.pull_requests(owner, name, "all", 1, 10),
      self.inner.commits(owner, name, 1, 10),
    );
    RepositoryBundle {
      details,
      pull_requests,
      commits,
    }
  }

  /// Webhook status for each repository, fetched concurrently.
  ///
  /// Repositories whose lookup fails are left out of the map.
  pub async fn webhook_statuses(&self, repo_ids: &[u64]) -> HashMap<u64, WebhookStatus> {
    let lookups = repo_ids.iter().map(|&id| {
      let inner = self.inner.clone();
      async move { (id, inner.webhook_status(id).await) }
    });

    join_all(lookups)
      .await
      .into_iter()
      .filter_map(|(id, result)| match result {
        Ok(status) => Some((id, status)),
        Err(e) => {
          warn!(repo_id = id, error = %e, "Failed to fetch webhook status");
          None
        }
      })
      .collect()
  }

  /// Create or delete the webhook, then read back the real status.
  ///
  /// Returns the server's message alongside the new status.
  pub async fn toggle_webhook(
    &self,
    repo: &Repository,
    currently_active: bool,
  ) -> Result<(String, WebhookStatus), ApiError> {
    let message = if currently_active {
      self.inner.delete_webhook(repo).await?
    } else {
      self.inner.create_webhook(repo).await?
    };
    info!(repo = %repo.full_name, enabled = !currently_active, %message, "Webhook toggled");
    let status = self.inner.webhook_status(repo.id).await?;
    Ok((message, status))
  }

  /// Get the current user (not cached - read once at start-up).
  pub async fn current_user(&self) -> Result<User, ApiError> {
    self.inner.current_user().await
  }

  /// Drop every cached result.
  pub fn clear_all(&self) {
    self.repositories.clear();
    self.repository_stats.clear();
    self.comments.clear();
    self.comment_stats.clear();
    self.pull_request_count.clear();
    self.starred_count.clear();
    debug!("cleared all caches");
  }

  /// End the session: tell the backend, forget the token and every cached
  /// result. Local state is cleared even when the backend call fails.
  pub async fn logout(&self) -> Result<(), ApiError> {
    let result = self.inner.logout().await;
    self.inner.set_token(None);
    self.clear_all();
    result
  }
}
