pub mod components;
pub mod renderfns;
pub mod view;
pub mod views;
pub mod window;

use ratatui::widgets::ListState;

/// Keep a list selection inside `0..len`, selecting the first item when
/// nothing is selected yet.
pub fn ensure_valid_selection(state: &mut ListState, len: usize) {
  if len == 0 {
    state.select(None);
    return;
  }
  match state.selected() {
    Some(i) if i >= len => state.select(Some(len - 1)),
    None => state.select(Some(0)),
    _ => {}
  }
}
