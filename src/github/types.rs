use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Repository as listed by the backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
  pub id: u64,
  pub name: String,
  pub full_name: String,
  #[serde(default)]
  pub private: bool,
  pub description: Option<String>,
  #[serde(default)]
  pub fork: bool,
  #[serde(default)]
  pub archived: bool,
  #[serde(default)]
  pub stargazers_count: u64,
  #[serde(default)]
  pub forks_count: u64,
  #[serde(default)]
  pub open_issues_count: u64,
  pub language: Option<String>,
  pub updated_at: DateTime<Utc>,
  pub created_at: DateTime<Utc>,
  #[serde(default)]
  pub html_url: String,
  #[serde(default)]
  pub clone_url: String,
  pub owner: Owner,
}

impl Repository {
  pub fn visibility(&self) -> &'static str {
    if self.private {
      "private"
    } else {
      "public"
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Owner {
  pub login: String,
  #[serde(default)]
  pub avatar_url: String,
}

/// Full repository record from the details endpoint
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RepositoryDetails {
  #[serde(flatten)]
  pub repository: Repository,
  pub pushed_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub default_branch: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepositoryStats {
  pub total: u64,
  pub public: u64,
  pub private: u64,
  pub forked: u64,
  pub archived: u64,
  pub total_stars: u64,
  pub total_forks: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct PullRequest {
  pub id: u64,
  pub number: u64,
  pub title: String,
  pub state: String,
  pub created_at: DateTime<Utc>,
  pub merged_at: Option<DateTime<Utc>>,
  #[serde(default)]
  pub html_url: String,
  pub user: Owner,
}

/// Commit summary for the detail view
#[derive(Debug, Clone, PartialEq)]
pub struct Commit {
  pub sha: String,
  pub message: String,
  pub author: String,
  pub date: DateTime<Utc>,
}

impl Commit {
  pub fn short_sha(&self) -> &str {
    &self.sha[..self.sha.len().min(7)]
  }

  /// First line of the commit message
  pub fn headline(&self) -> &str {
    self.message.lines().next().unwrap_or_default()
  }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiComment {
  pub id: String,
  pub repository_name: String,
  pub pull_request_id: String,
  pub comment: String,
  #[serde(default)]
  pub branch: String,
  pub created_at: String,
  pub status: String,
  #[serde(rename = "type")]
  pub comment_type: String,
}

/// One page of AI comments with the server's offset bookkeeping
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CommentPage {
  pub comments: Vec<AiComment>,
  pub total: u64,
  pub limit: u32,
  pub offset: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiCommentStats {
  pub total_comments: u64,
  pub recent_comments: u64,
  pub average_per_day: f64,
  pub repositories_with_comments: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct PullRequestsCount {
  #[serde(rename = "totalOpenPRs")]
  pub total_open_prs: u64,
  pub repositories: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StarredCount {
  pub total_starred: u64,
  #[serde(default)]
  pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookStatus {
  pub active: bool,
  pub webhook_id: Option<String>,
}

/// Signed-in user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
  pub login: String,
  #[serde(default)]
  pub name: Option<String>,
  #[serde(default)]
  pub avatar_url: Option<String>,
}

/// Server-side repository filter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RepositoryFilter {
  All,
  Starred,
  Active,
  Private,
  Public,
  Archived,
  Forked,
}

impl RepositoryFilter {
  pub const ALL: [RepositoryFilter; 7] = [
    RepositoryFilter::All,
    RepositoryFilter::Starred,
    RepositoryFilter::Active,
    RepositoryFilter::Private,
    RepositoryFilter::Public,
    RepositoryFilter::Archived,
    RepositoryFilter::Forked,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      RepositoryFilter::All => "all",
      RepositoryFilter::Starred => "starred",
      RepositoryFilter::Active => "active",
      RepositoryFilter::Private => "private",
      RepositoryFilter::Public => "public",
      RepositoryFilter::Archived => "archived",
      RepositoryFilter::Forked => "forked",
    }
  }

  pub fn title(self) -> &'static str {
    match self {
      RepositoryFilter::All => "All Repositories",
      RepositoryFilter::Starred => "Starred Repositories",
      RepositoryFilter::Active => "Active Repositories",
      RepositoryFilter::Private => "Private Repositories",
      RepositoryFilter::Public => "Public Repositories",
      RepositoryFilter::Archived => "Archived Repositories",
      RepositoryFilter::Forked => "Forked Repositories",
    }
  }

  /// Count line shown under the title
  pub fn count_label(self, count: u64) -> String {
    match self {
      RepositoryFilter::All => format!("{} repositories", count),
      RepositoryFilter::Active => format!("{} repositories (updated in last 6 months)", count),
      other => format!("{} {} repositories", count, other.as_str()),
    }
  }

  /// (title, description) for an empty page
  pub fn empty_state(self) -> (&'static str, &'static str) {
    match self {
      RepositoryFilter::All => (
        "No repositories found",
        "Connect with GitHub to see your repositories here.",
      ),
      RepositoryFilter::Starred => (
        "No starred repositories found",
        "Star repositories you find interesting to see them here.",
      ),
      RepositoryFilter::Active => (
        "No active repositories found",
        "Repositories are considered active if they were updated in the last 6 months.",
      ),
      RepositoryFilter::Private => (
        "No private repositories found",
        "Private repositories are only visible to you and collaborators.",
      ),
      RepositoryFilter::Public => (
        "No public repositories found",
        "Public repositories are visible to everyone on GitHub.",
      ),
      RepositoryFilter::Archived => (
        "No archived repositories found",
        "Archived repositories are read-only and cannot receive new changes.",
      ),
      RepositoryFilter::Forked => (
        "No forked repositories found",
        "Forked repositories are copies of other repositories that you've forked to your account.",
      ),
    }
  }
}

impl fmt::Display for RepositoryFilter {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RepositoryFilter {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    RepositoryFilter::ALL
      .into_iter()
      .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
      .ok_or_else(|| format!("unknown repository filter: {}", s))
  }
}

/// Query parameters for the AI comments endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentFilters {
  pub status: Option<String>,
  pub repository: Option<String>,
  pub comment_type: Option<String>,
  pub limit: Option<u32>,
  pub offset: Option<u32>,
}

impl CommentFilters {
  /// True when the request is the plain, unparameterized list.
  pub fn is_empty(&self) -> bool {
    self.status.is_none()
      && self.repository.is_none()
      && self.comment_type.is_none()
      && self.limit.is_none()
      && self.offset.is_none()
  }

  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(status) = &self.status {
      pairs.push(("status", status.clone()));
    }
    if let Some(repository) = &self.repository {
      pairs.push(("repository", repository.clone()));
    }
    if let Some(comment_type) = &self.comment_type {
      pairs.push(("type", comment_type.clone()));
    }
    if let Some(limit) = self.limit {
      pairs.push(("limit", limit.to_string()));
    }
    if let Some(offset) = self.offset {
      pairs.push(("offset", offset.to_string()));
    }
    pairs
  }
}
