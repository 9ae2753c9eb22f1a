use serde::{Deserialize, Serialize};

use crate::github::refine::Refinement;

/// Repository list settings remembered between runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
  /// Render long grids through the windowed projection
  pub use_virtualization: bool,
  /// Load details for the highlighted repository on demand
  pub use_lazy_loading: bool,
  /// Multi-line cards with counts and language
  pub use_enhanced_cards: bool,
  /// Last chosen page size
  pub page_size: Option<u32>,
  pub refinement: Refinement,
}

impl Default for Preferences {
  fn default() -> Self {
    Self {
      use_virtualization: true,
      use_lazy_loading: true,
      use_enhanced_cards: true,
      page_size: None,
      refinement: Refinement::default(),
    }
  }
}

/// Page sizes offered by the page-size picker
pub const PAGE_SIZES: [u32; 4] = [9, 15, 30, 60];

/// Next entry of [`PAGE_SIZES`] after `current`, wrapping around.
pub fn next_page_size(current: u32) -> u32 {
  PAGE_SIZES
    .iter()
    .copied()
    .find(|&s| s > current)
    .unwrap_or(PAGE_SIZES[0])
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_missing_fields_use_defaults() {
    let prefs: Preferences = serde_json::from_str(r#"{"use_enhanced_cards": false}"#).unwrap();
    assert!(prefs.use_virtualization);
    assert!(!prefs.use_enhanced_cards);
    assert_eq!(prefs.refinement, Refinement::default());
  }

  #[test]
  fn test_page_size_cycle() {
    assert_eq!(next_page_size(9), 15);
    assert_eq!(next_page_size(15), 30);
    assert_eq!(next_page_size(60), 9);
    assert_eq!(next_page_size(20), 30);
  }
}
