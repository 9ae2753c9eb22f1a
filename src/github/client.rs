use crate::cache::FetchResult;
use crate::config::Config;
use crate::github::api_types::{
  ApiCommentsResponse, ApiCommit, ApiMessage, ApiRepositoriesResponse, ApiWebhookRequest,
};
use crate::github::error::{ApiError, ErrorKind};
use crate::github::types::{
  AiCommentStats, Commit, CommentFilters, CommentPage, PullRequest, PullRequestsCount,
  Repository, RepositoryDetails, RepositoryFilter, RepositoryStats, StarredCount, User,
  WebhookStatus,
};
use color_eyre::{eyre::eyre, Result};
use reqwest::header::HeaderMap;
use reqwest::RequestBuilder;
use serde::de::DeserializeOwned;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};
use url::Url;

/// Dashboard backend API client
#[derive(Clone)]
pub struct BackendClient {
  http: reqwest::Client,
  base_url: Url,
  token: Arc<RwLock<Option<String>>>,
}

impl BackendClient {
  pub fn new(config: &Config, token: Option<String>) -> Result<Self> {
    let base_url = Url::parse(&config.backend_url)
      .map_err(|e| eyre!("Invalid backend_url '{}': {}", config.backend_url, e))?;
    if base_url.cannot_be_a_base() {
      return Err(eyre!("backend_url must be an http(s) URL"));
    }

    let http = reqwest::Client::builder()
      .timeout(config.request_timeout())
      .user_agent(concat!("ghdash/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token: Arc::new(RwLock::new(token)),
    })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  pub fn set_token(&self, token: Option<String>) {
    *self.token.write().unwrap_or_else(PoisonError::into_inner) = token;
  }

  pub fn has_token(&self) -> bool {
    self
      .token
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .is_some()
  }

  fn bearer(&self) -> Result<String, ApiError> {
    self
      .token
      .read()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
      .ok_or_else(ApiError::missing_token)
  }

  /// Build an endpoint URL from path segments, escaping each one.
  pub(crate) fn endpoint(&self, segments: &[&str], query: &[(&str, String)]) -> Result<Url, ApiError> {
    let mut url = self.base_url.clone();
    url
      .path_segments_mut()
      .map_err(|_| ApiError::new(ErrorKind::Generic, "backend_url cannot be a base URL"))?
      .pop_if_empty()
      .extend(segments);
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
  }

  async fn get<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T, ApiError> {
    let token = self.bearer()?;
    debug!(%url, "GET");
    let body = self.send(self.http.get(url).bearer_auth(token), context).await?;
    decode(&body, context)
  }

  async fn post_webhook(&self, action: &str, repo: &Repository, context: &str) -> Result<String, ApiError> {
    let token = self.bearer()?;
    let url = self.endpoint(&["webhooks", action], &[])?;
    debug!(%url, repo = %repo.full_name, "POST");
    let request = self
      .http
      .post(url)
      .bearer_auth(token)
      .json(&ApiWebhookRequest { repo: repo.into() });
    let body = self.send(request, context).await?;
    let message = serde_json::from_slice::<ApiMessage>(&body)
      .ok()
      .and_then(ApiMessage::text)
      .unwrap_or_default();
    Ok(message)
  }

  /// Send a request and return the body of a successful response.
  async fn send(&self, request: RequestBuilder, context: &str) -> Result<Vec<u8>, ApiError> {
    let response = request
      .send()
      .await
      .map_err(|e| ApiError::transport(context, e))?;

    let status = response.status();
    if !status.is_success() {
      let exhausted = rate_limit_exhausted(response.headers());
      let body = response.bytes().await.unwrap_or_default();
      let message = serde_json::from_slice::<ApiMessage>(&body)
        .ok()
        .and_then(ApiMessage::text);
      let err = ApiError::from_response(context, status, exhausted, message);
      warn!(kind = ?err.kind, error = %err, "Backend request failed");
      return Err(err);
    }

    response
      .bytes()
      .await
      .map(|b| b.to_vec())
      .map_err(|e| ApiError::transport(context, e))
  }

  /// List one page of repositories for a server-side filter
  pub async fn list_repositories(
    &self,
    filter: RepositoryFilter,
    page: u32,
    limit: u32,
    sort: &str,
    direction: &str,
  ) -> Result<FetchResult<Vec<Repository>>, ApiError> {
    let url = self.endpoint(
      &["repositories", filter.as_str()],
      &[
        ("page", page.to_string()),
        ("limit", limit.to_string()),
        ("sort", sort.to_string()),
        ("direction", direction.to_string()),
      ],
    )?;
    let response: ApiRepositoriesResponse = self.get(url, "Failed to fetch repositories").await?;

    Ok(FetchResult {
      data: response.repositories,
      pagination: response.pagination,
    })
  }

  pub async fn repository_stats(&self) -> Result<RepositoryStats, ApiError> {
    let url = self.endpoint(&["repositories", "stats"], &[])?;
    self
      .get(url, "Failed to fetch repository statistics")
      .await
  }

  pub async fn repository_details(&self, owner: &str, name: &str) -> Result<RepositoryDetails, ApiError> {
    let url = self.endpoint(&["repositories", owner, name, "details"], &[])?;
    self
      .get(url, "Failed to fetch repository details")
      .await
  }

  pub async fn pull_requests(
    &self,
    owner: &str,
    name: &str,
    state: &str,
    page: u32,
    per_page: u32,
  ) -> Result<Vec<PullRequest>, ApiError> {
    let url = self.endpoint(
      &["repositories", owner, name, "pulls"],
      &[
        ("state", state.to_string()),
        ("page", page.to_string()),
        ("per_page", per_page.to_string()),
      ],
    )?;
    self.get(url, "Failed to fetch pull requests").await
  }

  pub async fn commits(&self, owner: &str, name: &str, page: u32, per_page: u32) -> Result<Vec<Commit>, ApiError> {
    let url = self.endpoint(
      &["repositories", owner, name, "commits"],
      &[("page", page.to_string()), ("per_page", per_page.to_string())],
    )?;
    let commits: Vec<ApiCommit> = self.get(url, "Failed to fetch commits").await?;
    Ok(commits.into_iter().map(Commit::from).collect())
  }

  pub async fn pull_requests_count(&self) -> Result<PullRequestsCount, ApiError> {
    let url = self.endpoint(&["repositories", "pull-requests", "count"], &[])?;
    self
      .get(url, "Failed to fetch pull requests count")
      .await
  }

  pub async fn starred_count(&self) -> Result<StarredCount, ApiError> {
    let url = self.endpoint(&["repositories", "starred", "count"], &[])?;
    self
      .get(url, "Failed to fetch starred repositories count")
      .await
  }

  pub async fn ai_comments(&self, filters: &CommentFilters) -> Result<CommentPage, ApiError> {
    let url = self.endpoint(&["ai-comments"], &filters.query_pairs())?;
    let response: ApiCommentsResponse = self.get(url, "Failed to fetch AI comments").await?;
    Ok(response.into())
  }

  pub async fn ai_comment_stats(&self) -> Result<AiCommentStats, ApiError> {
    let url = self.endpoint(&["ai-comments", "stats"], &[])?;
    self
      .get(url, "Failed to fetch AI comments statistics")
      .await
  }

  pub async fn webhook_status(&self, repo_id: u64) -> Result<WebhookStatus, ApiError> {
    let url = self.endpoint(&["webhooks", "status", &repo_id.to_string()], &[])?;
    self.get(url, "Failed to fetch webhook status").await
  }

  /// Install the AI comment webhook on a repository. Returns the server's message.
  pub async fn create_webhook(&self, repo: &Repository) -> Result<String, ApiError> {
    self
      .post_webhook("create-webhook", repo, "Failed to create webhook")
      .await
  }

  pub async fn delete_webhook(&self, repo: &Repository) -> Result<String, ApiError> {
    self
      .post_webhook("delete-webhook", repo, "Failed to delete webhook")
      .await
  }

  pub async fn current_user(&self) -> Result<User, ApiError> {
    let url = self.endpoint(&["user"], &[])?;
    self.get(url, "Failed to fetch user").await
  }

  /// End the backend session. The response body is ignored.
  pub async fn logout(&self) -> Result<(), ApiError> {
    let token = self.bearer()?;
    let url = self.endpoint(&["auth", "logout"], &[])?;
    debug!(%url, "GET");
    self
      .send(self.http.get(url).bearer_auth(token), "Failed to log out")
      .await?;
    Ok(())
  }
}

fn decode<T: DeserializeOwned>(body: &[u8], context: &str) -> Result<T, ApiError> {
  serde_json::from_slice(body).map_err(|e| {
    ApiError::new(
      ErrorKind::Generic,
      format!("{}: invalid response: {}", context, e),
    )
  })
}

/// True when the response says the rate-limit window is used up.
fn rate_limit_exhausted(headers: &HeaderMap) -> bool {
  headers
    .get("x-ratelimit-remaining")
    .and_then(|v| v.to_str().ok())
    .map(|v| v.trim() == "0")
    .unwrap_or(false)
}

#[cfg(test)]
mod tests {
  use super::*;
  use reqwest::header::HeaderValue;

  fn client(base: &str, token: Option<&str>) -> BackendClient {
    let config = Config::parse(&format!("backend_url: {}\n", base)).unwrap();
    BackendClient::new(&config, token.map(String::from)).unwrap()
  }

  #[test]
  fn test_endpoint_without_base_path() {
    let c = client("https://api.example.com", Some("t"));
    let url = c
      .endpoint(
        &["repositories", "starred"],
        &[("page", "1".to_string()), ("limit", "15".to_string())],
      )
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.example.com/repositories/starred?page=1&limit=15"
    );
  }

  #[test]
  fn test_endpoint_keeps_base_path_and_escapes() {
    let c = client("https://example.com/api/", Some("t"));
    let url = c.endpoint(&["repositories", "octo", "my repo", "details"], &[]).unwrap();
    assert_eq!(
      url.as_str(),
      "https://example.com/api/repositories/octo/my%20repo/details"
    );

    let c = client("https://example.com/api", Some("t"));
    let url = c.endpoint(&["user"], &[]).unwrap();
    assert_eq!(url.as_str(), "https://example.com/api/user");
  }

  #[tokio::test]
  async fn test_missing_token_fails_before_request() {
    let c = client("http://127.0.0.1:9", None);
    let err = c.repository_stats().await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Authentication);

    c.set_token(Some("abc".to_string()));
    assert!(c.has_token());
    c.set_token(None);
    assert!(!c.has_token());
  }

  #[test]
  fn test_rate_limit_header() {
    let mut headers = HeaderMap::new();
    assert!(!rate_limit_exhausted(&headers));
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("12"));
    assert!(!rate_limit_exhausted(&headers));
    headers.insert("x-ratelimit-remaining", HeaderValue::from_static("0"));
    assert!(rate_limit_exhausted(&headers));
  }

  #[test]
  fn test_decode_error_is_generic() {
    let err = decode::<RepositoryStats>(b"<html>", "stats").unwrap_err();
    assert_eq!(err.kind, ErrorKind::Generic);
    assert!(err.message.starts_with("stats: invalid response"));
  }
}
