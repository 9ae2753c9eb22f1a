//! Composite cache keys.

use std::fmt;

/// Address of one cache entry.
///
/// Paginated resources carry filter, page and limit; singleton resources
/// (stats, counts) carry none of them.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey {
  pub resource: String,
  pub filter: Option<String>,
  pub page: Option<u32>,
  pub limit: Option<u32>,
}

impl CacheKey {
  /// Key for a resource without filter or paging.
  pub fn singleton(resource: impl Into<String>) -> Self {
    Self {
      resource: resource.into(),
      filter: None,
      page: None,
      limit: None,
    }
  }

  /// Key for one page of a filtered resource. `page` is 1-based.
  pub fn paged(resource: impl Into<String>, filter: impl Into<String>, page: u32, limit: u32) -> Self {
    Self {
      resource: resource.into(),
      filter: Some(filter.into()),
      page: Some(page.max(1)),
      limit: Some(limit.max(1)),
    }
  }

  /// Whether this key falls under `resource` and, when given, `filter`.
  pub fn matches(&self, resource: &str, filter: Option<&str>) -> bool {
    if self.resource != resource {
      return false;
    }
    match filter {
      Some(f) => self.filter.as_deref() == Some(f),
      None => true,
    }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", self.resource)?;
    if let Some(filter) = &self.filter {
      write!(f, ":{}", filter)?;
    }
    if let Some(page) = self.page {
      write!(f, ":p{}", page)?;
    }
    if let Some(limit) = self.limit {
      write!(f, ":l{}", limit)?;
    }
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_paged_key_clamps_to_one() {
    let key = CacheKey::paged("repositories", "all", 0, 0);
    assert_eq!(key.page, Some(1));
    assert_eq!(key.limit, Some(1));
  }

  #[test]
  fn test_matches_resource_and_filter() {
    let key = CacheKey::paged("repositories", "starred", 2, 15);
    assert!(key.matches("repositories", None));
    assert!(key.matches("repositories", Some("starred")));
    assert!(!key.matches("repositories", Some("all")));
    assert!(!key.matches("ai-comments", None));
  }

  #[test]
  fn test_singleton_never_matches_a_filter() {
    let key = CacheKey::singleton("repository-stats");
    assert!(key.matches("repository-stats", None));
    assert!(!key.matches("repository-stats", Some("all")));
  }

  #[test]
  fn test_display() {
    assert_eq!(
      CacheKey::paged("repositories", "all", 1, 15).to_string(),
      "repositories:all:p1:l15"
    );
    assert_eq!(CacheKey::singleton("ai-comment-stats").to_string(), "ai-comment-stats");
  }
}
