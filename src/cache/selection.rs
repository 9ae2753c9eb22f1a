//! What the user is currently looking at, kept apart from cached data.

use std::sync::{Arc, Mutex, PoisonError};

use super::key::CacheKey;

/// Current (resource, filter, page, limit) pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
  pub resource: String,
  pub filter: String,
  pub page: u32,
  pub limit: u32,
}

impl Selection {
  pub fn new(resource: impl Into<String>, filter: impl Into<String>, page: u32, limit: u32) -> Self {
    Self {
      resource: resource.into(),
      filter: filter.into(),
      page: page.max(1),
      limit: limit.max(1),
    }
  }

  /// Key the next fetch for this selection should use.
  pub fn key(&self) -> CacheKey {
    CacheKey::paged(&self.resource, &self.filter, self.page, self.limit)
  }
}

/// How a selection update changed the pointer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionChange {
  Unchanged,
  Moved,
  /// The page size changed; cached pages of `filter` at the old size are stale
  LimitChanged { filter: String, old_limit: u32 },
}

/// Process-wide current selection.
///
/// Cheap to clone; every clone sees the same pointer. Updating it never
/// fetches anything, callers issue the cache request for [`Self::key`].
#[derive(Debug, Clone)]
pub struct CurrentSelection {
  inner: Arc<Mutex<Selection>>,
}

impl CurrentSelection {
  pub fn new(initial: Selection) -> Self {
    Self {
      inner: Arc::new(Mutex::new(initial)),
    }
  }

  pub fn get(&self) -> Selection {
    self
      .inner
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone()
  }

  pub fn key(&self) -> CacheKey {
    self.get().key()
  }

  /// Replace the whole pointer.
  pub fn set(&self, resource: &str, filter: &str, page: u32, limit: u32) -> SelectionChange {
    self.update(|s| {
      s.resource = resource.to_string();
      s.filter = filter.to_string();
      s.page = page.max(1);
      s.limit = limit.max(1);
    })
  }

  /// Switch filter, starting again at page 1.
  pub fn set_filter(&self, filter: &str) -> SelectionChange {
    self.update(|s| {
      if s.filter != filter {
        s.filter = filter.to_string();
        s.page = 1;
      }
    })
  }

  pub fn set_page(&self, page: u32) -> SelectionChange {
    self.update(|s| s.page = page.max(1))
  }

  /// Switch page size, starting again at page 1.
  pub fn set_limit(&self, limit: u32) -> SelectionChange {
    self.update(|s| {
      if s.limit != limit.max(1) {
        s.limit = limit.max(1);
        s.page = 1;
      }
    })
  }

  fn update(&self, f: impl FnOnce(&mut Selection)) -> SelectionChange {
    let mut current = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
    let before = current.clone();
    f(&mut current);

    if *current == before {
      SelectionChange::Unchanged
    } else if current.limit != before.limit {
      SelectionChange::LimitChanged {
        filter: before.filter,
        old_limit: before.limit,
      }
    } else {
      SelectionChange::Moved
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn selection() -> CurrentSelection {
    CurrentSelection::new(Selection::new("repositories", "all", 1, 15))
  }

  #[test]
  fn test_setting_same_values_is_unchanged() {
    let current = selection();
    assert_eq!(current.set("repositories", "starred", 2, 15), SelectionChange::Moved);
    assert_eq!(
      current.set("repositories", "starred", 2, 15),
      SelectionChange::Unchanged
    );
    assert_eq!(current.key(), CacheKey::paged("repositories", "starred", 2, 15));
  }

  #[test]
  fn test_filter_change_resets_page() {
    let current = selection();
    current.set_page(4);
    current.set_filter("forked");
    assert_eq!(current.get().page, 1);
    assert_eq!(current.set_filter("forked"), SelectionChange::Unchanged);
  }

  #[test]
  fn test_limit_change_reports_old_limit() {
    let current = selection();
    current.set_filter("starred");
    current.set_page(3);
    let change = current.set_limit(30);
    assert_eq!(
      change,
      SelectionChange::LimitChanged {
        filter: "starred".to_string(),
        old_limit: 15
      }
    );
    assert_eq!(current.get().page, 1);
  }

  #[test]
  fn test_clones_share_state() {
    let a = selection();
    let b = a.clone();
    a.set_page(2);
    assert_eq!(b.get().page, 2);
  }
}
