//! Serde-deserializable envelopes matching backend responses.
//!
//! Domain records that already match the wire shape live in `types`; this
//! module holds the wrappers and the shapes that need converting.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::cache::PaginationInfo;

use super::types::{AiComment, Commit, CommentPage, Repository};

// ============================================================================
// List endpoints
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiRepositoriesResponse {
  #[serde(default)]
  pub repositories: Vec<Repository>,
  pub pagination: Option<PaginationInfo>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCommentsResponse {
  #[serde(default)]
  pub comments: Vec<AiComment>,
  #[serde(default)]
  pub total: u64,
  #[serde(default)]
  pub limit: u32,
  #[serde(default)]
  pub offset: u32,
}

impl From<ApiCommentsResponse> for CommentPage {
  fn from(resp: ApiCommentsResponse) -> Self {
    CommentPage {
      comments: resp.comments,
      total: resp.total,
      limit: resp.limit,
      offset: resp.offset,
    }
  }
}

// ============================================================================
// Commits endpoint response
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ApiCommitAuthor {
  #[serde(default)]
  pub name: String,
  pub date: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ApiCommitBody {
  #[serde(default)]
  pub message: String,
  pub author: ApiCommitAuthor,
}

#[derive(Debug, Deserialize)]
pub struct ApiAccount {
  pub login: String,
}

#[derive(Debug, Deserialize)]
pub struct ApiCommit {
  pub sha: String,
  pub commit: ApiCommitBody,
  pub author: Option<ApiAccount>,
}

impl From<ApiCommit> for Commit {
  fn from(c: ApiCommit) -> Self {
    Commit {
      sha: c.sha,
      message: c.commit.message,
      // Prefer the GitHub login over the free-form git author name
      author: c.author.map(|a| a.login).unwrap_or(c.commit.author.name),
      date: c.commit.author.date,
    }
  }
}

// ============================================================================
// Messages
// ============================================================================

/// `{message}` or `{error}` body used by error responses and webhook calls
#[derive(Debug, Default, Deserialize)]
pub struct ApiMessage {
  pub message: Option<String>,
  pub error: Option<String>,
}

impl ApiMessage {
  pub fn text(self) -> Option<String> {
    self.message.or(self.error)
  }
}

// ============================================================================
// Webhook request body
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiWebhookRepo<'a> {
  pub id: String,
  pub name: &'a str,
  pub full_name: &'a str,
  pub html_url: &'a str,
  pub description: &'a str,
  pub language: &'a str,
  pub default_branch: &'a str,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  pub clone_url: &'a str,
  pub forks_count: u64,
  pub stargazers_count: u64,
  pub open_issues_count: u64,
  pub visibility: &'static str,
}

impl<'a> From<&'a Repository> for ApiWebhookRepo<'a> {
  fn from(repo: &'a Repository) -> Self {
    ApiWebhookRepo {
      id: repo.id.to_string(),
      name: &repo.name,
      full_name: &repo.full_name,
      html_url: &repo.html_url,
      description: repo.description.as_deref().unwrap_or_default(),
      language: repo.language.as_deref().unwrap_or_default(),
      default_branch: "main",
      created_at: repo.created_at,
      updated_at: repo.updated_at,
      clone_url: &repo.clone_url,
      forks_count: repo.forks_count,
      stargazers_count: repo.stargazers_count,
      open_issues_count: repo.open_issues_count,
      visibility: repo.visibility(),
    }
  }
}

#[derive(Debug, Serialize)]
pub struct ApiWebhookRequest<'a> {
  pub repo: ApiWebhookRepo<'a>,
}
