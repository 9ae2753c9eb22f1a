//! Client-side refinement of a loaded page of repositories.
//!
//! The server already applied the repository filter; this narrows the page
//! by search term, language and recent activity, then re-sorts it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use super::types::Repository;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortField {
  #[default]
  Updated,
  Name,
  Stars,
  Forks,
}

impl SortField {
  pub const ALL: [SortField; 4] = [
    SortField::Updated,
    SortField::Name,
    SortField::Stars,
    SortField::Forks,
  ];

  pub fn label(self) -> &'static str {
    match self {
      SortField::Updated => "updated",
      SortField::Name => "name",
      SortField::Stars => "stars",
      SortField::Forks => "forks",
    }
  }

  pub fn next(self) -> Self {
    let i = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
    Self::ALL[(i + 1) % Self::ALL.len()]
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
  Asc,
  #[default]
  Desc,
}

impl SortDirection {
  pub fn toggled(self) -> Self {
    match self {
      SortDirection::Asc => SortDirection::Desc,
      SortDirection::Desc => SortDirection::Asc,
    }
  }

  pub fn arrow(self) -> &'static str {
    match self {
      SortDirection::Asc => "↑",
      SortDirection::Desc => "↓",
    }
  }
}

/// Time since last update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
  VeryActive,
  Active,
  Moderate,
  Inactive,
}

impl Activity {
  pub const ALL: [Activity; 4] = [
    Activity::VeryActive,
    Activity::Active,
    Activity::Moderate,
    Activity::Inactive,
  ];

  pub fn label(self) -> &'static str {
    match self {
      Activity::VeryActive => "Very Active (< 1 week)",
      Activity::Active => "Active (< 1 month)",
      Activity::Moderate => "Moderate (< 3 months)",
      Activity::Inactive => "Inactive (> 3 months)",
    }
  }

  fn matches(self, days_since_update: f64) -> bool {
    match self {
      Activity::VeryActive => days_since_update <= 7.0,
      Activity::Active => days_since_update <= 30.0,
      Activity::Moderate => days_since_update <= 90.0,
      Activity::Inactive => days_since_update > 90.0,
    }
  }
}

/// One refinement chip
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "key", content = "value", rename_all = "lowercase")]
pub enum ActiveFilter {
  Language(String),
  Activity(Activity),
}

impl ActiveFilter {
  pub fn label(&self) -> String {
    match self {
      ActiveFilter::Language(lang) => format!("language: {}", lang),
      ActiveFilter::Activity(a) => format!("activity: {}", a.label()),
    }
  }
}

/// Full set of client-side refinements
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Refinement {
  pub search: String,
  pub filters: Vec<ActiveFilter>,
  pub sort_by: SortField,
  pub direction: SortDirection,
}

impl Refinement {
  /// Add a filter, or remove it when already present.
  pub fn toggle_filter(&mut self, filter: ActiveFilter) {
    if let Some(pos) = self.filters.iter().position(|f| *f == filter) {
      self.filters.remove(pos);
    } else {
      self.filters.push(filter);
    }
  }

  /// Drop the search term and every filter chip; sort order stays.
  pub fn clear(&mut self) {
    self.search.clear();
    self.filters.clear();
  }

  pub fn is_narrowing(&self) -> bool {
    !self.search.trim().is_empty() || !self.filters.is_empty()
  }

  /// Apply to a page, returning the matching repositories in display order.
  pub fn apply<'a>(&self, repos: &'a [Repository], now: DateTime<Utc>) -> Vec<&'a Repository> {
    let needle = self.search.trim().to_lowercase();

    let mut result: Vec<&Repository> = repos
      .iter()
      .filter(|r| needle.is_empty() || matches_search(r, &needle))
      .filter(|r| self.filters.iter().all(|f| matches_filter(r, f, now)))
      .collect();

    result.sort_by(|a, b| {
      let ord = compare(a, b, self.sort_by);
      match self.direction {
        SortDirection::Asc => ord,
        SortDirection::Desc => ord.reverse(),
      }
    });
    result
  }
}

fn matches_search(repo: &Repository, needle: &str) -> bool {
  let contains = |s: &str| s.to_lowercase().contains(needle);
  contains(&repo.name)
    || repo.description.as_deref().is_some_and(contains)
    || repo.language.as_deref().is_some_and(contains)
}

fn matches_filter(repo: &Repository, filter: &ActiveFilter, now: DateTime<Utc>) -> bool {
  match filter {
    ActiveFilter::Language(lang) => repo.language.as_deref() == Some(lang.as_str()),
    ActiveFilter::Activity(activity) => {
      let days = (now - repo.updated_at).num_seconds() as f64 / 86_400.0;
      activity.matches(days)
    }
  }
}

fn compare(a: &Repository, b: &Repository, field: SortField) -> Ordering {
  match field {
    SortField::Name => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
    SortField::Stars => a.stargazers_count.cmp(&b.stargazers_count),
    SortField::Forks => a.forks_count.cmp(&b.forks_count),
    SortField::Updated => a.updated_at.cmp(&b.updated_at),
  }
}

/// Distinct languages on a page, sorted, for the language picker.
pub fn languages(repos: &[Repository]) -> Vec<(String, usize)> {
  let mut counts: std::collections::BTreeMap<&str, usize> = Default::default();
  for lang in repos.iter().filter_map(|r| r.language.as_deref()) {
    *counts.entry(lang).or_default() += 1;
  }
  counts
    .into_iter()
    .map(|(lang, n)| (lang.to_string(), n))
    .collect()
}
