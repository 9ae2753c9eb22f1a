//! Windowed projection of long card grids.
//!
//! Only the rows intersecting the viewport (plus a few buffer rows on each
//! side) are rendered. Units are abstract: the default configuration uses
//! pixels, [`WindowConfig::terminal`] uses terminal cells.

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default = "WindowConfig::terminal")]
pub struct WindowConfig {
  /// Lists with at most this many items render unwindowed
  pub threshold: usize,
  pub item_height: u32,
  pub gap: u32,
  pub buffer_rows: u32,
  pub max_columns: u32,
  /// Widths below `breakpoints[i]` get `i + 1` columns
  pub breakpoints: Vec<u32>,
}

impl Default for WindowConfig {
  fn default() -> Self {
    Self {
      threshold: 50,
      item_height: 280,
      gap: 16,
      buffer_rows: 2,
      max_columns: 4,
      breakpoints: vec![640, 768, 1024],
    }
  }
}

impl WindowConfig {
  /// Cell-based preset used by the terminal front-end.
  pub fn terminal() -> Self {
    Self {
      item_height: 3,
      gap: 1,
      breakpoints: vec![80, 96, 128],
      ..Self::default()
    }
  }

  pub fn row_height(&self) -> u32 {
    (self.item_height + self.gap).max(1)
  }

  /// Column count for a container width.
  pub fn columns_for_width(&self, width: u32) -> u32 {
    self
      .breakpoints
      .iter()
      .position(|&bp| width < bp)
      .map(|i| i as u32 + 1)
      .unwrap_or(self.max_columns)
      .clamp(1, self.max_columns.max(1))
  }

  pub fn should_window(&self, total_items: usize) -> bool {
    total_items > self.threshold
  }

  pub fn visible_range(
    &self,
    total_items: usize,
    columns: u32,
    container_height: u32,
    scroll_top: u32,
  ) -> Option<VisibleRange> {
    compute_visible_range(
      total_items,
      columns,
      self.item_height,
      self.gap,
      container_height,
      scroll_top,
      self.buffer_rows,
    )
  }

  /// Smallest change to `scroll_top` that brings item `index` fully into
  /// view, clamped to the grid's scrollable extent.
  pub fn reveal(&self, index: usize, total_items: usize, columns: u32, container_height: u32, scroll_top: u32) -> u32 {
    let columns = columns.max(1) as usize;
    let row_height = self.row_height();
    let rows = total_items.div_ceil(columns) as u32;
    let max_scroll = (rows * row_height).saturating_sub(self.gap).saturating_sub(container_height);

    let top = (index / columns) as u32 * row_height;
    let bottom = top + self.item_height;
    let scroll_top = if top < scroll_top {
      top
    } else if bottom > scroll_top + container_height {
      bottom.saturating_sub(container_height)
    } else {
      scroll_top
    };
    scroll_top.min(max_scroll)
  }
}

/// Slice of a grid that should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibleRange {
  /// First rendered item (inclusive)
  pub start_index: usize,
  /// Last rendered item (inclusive)
  pub end_index: usize,
  pub total_height: u64,
  /// Offset of the first rendered row from the top of the grid
  pub offset_y: u64,
}

impl VisibleRange {
  pub fn len(&self) -> usize {
    self.end_index - self.start_index + 1
  }
}

/// Compute which items of a `columns`-wide grid fall inside the viewport.
///
/// Returns `None` for an empty list.
pub fn compute_visible_range(
  total_items: usize,
  columns: u32,
  item_height: u32,
  gap: u32,
  container_height: u32,
  scroll_top: u32,
  buffer_rows: u32,
) -> Option<VisibleRange> {
  if total_items == 0 {
    return None;
  }

  let columns = columns.max(1) as usize;
  let row_height = u64::from((item_height + gap).max(1));
  let total_rows = total_items.div_ceil(columns);
  let last_row = total_rows - 1;

  let scroll_top = u64::from(scroll_top);
  let first_visible = ((scroll_top / row_height) as usize).min(last_row);
  let last_visible = ((scroll_top + u64::from(container_height)).div_ceil(row_height) as usize)
    .min(last_row);

  let start_row = first_visible.saturating_sub(buffer_rows as usize);
  let end_row = (last_visible + buffer_rows as usize).min(last_row);

  Some(VisibleRange {
    start_index: start_row * columns,
    end_index: ((end_row + 1) * columns - 1).min(total_items - 1),
    total_height: total_rows as u64 * row_height,
    offset_y: start_row as u64 * row_height,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_large_grid_at_top() {
    let range = compute_visible_range(437, 4, 280, 16, 600, 0, 2).unwrap();
    assert_eq!(range.start_index, 0);
    // The bottom edge is rounded up, so row 3 (starting at 888) counts as
    // visible even though the viewport ends at 600; two buffer rows follow
    assert_eq!(range.end_index, 23);
    assert_eq!(range.total_height, 110 * 296);
    assert_eq!(range.offset_y, 0);
    assert!(range.end_index + 1 >= 4 * 3);
  }

  #[test]
  fn test_scrolled_grid_keeps_buffer_above() {
    let range = compute_visible_range(437, 4, 280, 16, 600, 296 * 10, 2).unwrap();
    assert_eq!(range.start_index, 8 * 4);
    assert_eq!(range.offset_y, 8 * 296);
    // rows 10..=13 visible, 15 with buffer
    assert_eq!(range.end_index, 16 * 4 - 1);
  }

  #[test]
  fn test_scrolled_past_end_is_clamped() {
    let range = compute_visible_range(10, 2, 3, 1, 12, 10_000, 1).unwrap();
    assert_eq!(range.end_index, 9);
    assert!(range.start_index <= range.end_index);
    assert_eq!(range.total_height, 5 * 4);
  }

  #[test]
  fn test_last_row_partial() {
    let range = compute_visible_range(5, 4, 3, 1, 100, 0, 2).unwrap();
    assert_eq!(range.start_index, 0);
    assert_eq!(range.end_index, 4);
    assert_eq!(range.len(), 5);
  }

  #[test]
  fn test_empty_list_projects_nothing() {
    assert_eq!(compute_visible_range(0, 4, 280, 16, 600, 0, 2), None);
  }

  #[test]
  fn test_projection_is_idempotent() {
    let a = compute_visible_range(300, 3, 280, 16, 700, 1234, 2);
    let b = compute_visible_range(300, 3, 280, 16, 700, 1234, 2);
    assert_eq!(a, b);
  }

  #[test]
  fn test_reveal_scrolls_minimally() {
    let config = WindowConfig::terminal();
    // 20 rows of 4 cells, 12 cells tall viewport
    assert_eq!(config.reveal(0, 40, 2, 12, 0), 0);
    // row 3 spans 12..15, so the viewport must start at 3
    assert_eq!(config.reveal(6, 40, 2, 12, 0), 3);
    // already visible, unchanged
    assert_eq!(config.reveal(6, 40, 2, 12, 5), 5);
    // above the viewport snaps to the row top
    assert_eq!(config.reveal(2, 40, 2, 12, 20), 4);
    // never scrolls past the last row
    assert_eq!(config.reveal(39, 40, 2, 12, 0), 20 * 4 - 1 - 12);
  }

  #[test]
  fn test_threshold() {
    let config = WindowConfig::default();
    assert!(!config.should_window(0));
    assert!(!config.should_window(50));
    assert!(config.should_window(51));
  }

  #[test]
  fn test_columns_for_width() {
    let config = WindowConfig::default();
    assert_eq!(config.columns_for_width(320), 1);
    assert_eq!(config.columns_for_width(640), 2);
    assert_eq!(config.columns_for_width(767), 2);
    assert_eq!(config.columns_for_width(800), 3);
    assert_eq!(config.columns_for_width(1024), 4);
    assert_eq!(config.columns_for_width(4000), 4);

    let terminal = WindowConfig::terminal();
    assert_eq!(terminal.columns_for_width(60), 1);
    assert_eq!(terminal.columns_for_width(140), 4);
  }

  #[test]
  fn test_partial_yaml_falls_back_to_terminal_preset() {
    let config: WindowConfig = serde_yaml::from_str("threshold: 10").unwrap();
    assert_eq!(config.threshold, 10);
    assert_eq!(config.item_height, 3);
    assert_eq!(config.breakpoints, vec![80, 96, 128]);
  }
}
