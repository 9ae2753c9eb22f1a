use super::input::{InputResult, TextInput};
use super::KeyResult;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, Paragraph};

/// Events emitted by search input that parent needs to handle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
  /// Search term changed (each keystroke, or the restored term on cancel)
  Changed(String),
  /// Search submitted (overlay closed, term persists)
  Submitted(String),
}

/// Live search box opened with `/`.
///
/// Opening it starts from the term already applied, so search refines
/// instead of starting over. Escape restores that term.
#[derive(Debug, Clone, Default)]
pub struct SearchInput {
  input: TextInput,
  active: bool,
  before: String,
}

impl SearchInput {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn is_active(&self) -> bool {
    self.active
  }

  pub fn query(&self) -> &str {
    self.input.value()
  }

  /// Open the search box, pre-filled with the applied term
  pub fn activate(&mut self, current: &str) {
    self.active = true;
    self.before = current.to_string();
    self.input = TextInput::with_value(current);
  }

  /// Handle a key event.
  /// `current` is the applied term, used when `/` opens the box.
  pub fn handle_key(&mut self, key: KeyEvent, current: &str) -> KeyResult<SearchEvent> {
    if !self.active {
      if key.code == KeyCode::Char('/') {
        self.activate(current);
        return KeyResult::Handled;
      }
      return KeyResult::NotHandled;
    }

    match self.input.handle_key(key) {
      InputResult::Submitted(value) => {
        self.active = false;
        KeyResult::Event(SearchEvent::Submitted(value))
      }
      InputResult::Cancelled => {
        self.active = false;
        self.input = TextInput::with_value(&self.before);
        KeyResult::Event(SearchEvent::Changed(self.before.clone()))
      }
      InputResult::Consumed => {
        KeyResult::Event(SearchEvent::Changed(self.input.value().to_string()))
      }
      // Swallow everything else while typing
      InputResult::NotHandled => KeyResult::Handled,
    }
  }

  /// Render the search overlay if active
  pub fn render_overlay(&self, frame: &mut Frame, area: Rect) {
    if !self.active {
      return;
    }

    let width = (area.width * 60 / 100).clamp(30, 60).min(area.width);
    let overlay_area = Rect::new(area.x + 1, area.y + 1, width, 3.min(area.height));

    frame.render_widget(Clear, overlay_area);

    let block = Block::default()
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Yellow))
      .title(" Search name, description, language ");

    let inner = block.inner(overlay_area);
    frame.render_widget(block, overlay_area);

    if inner.height == 0 {
      return;
    }

    let input_line = Line::from(vec![
      Span::styled("/", Style::default().fg(Color::Yellow)),
      Span::raw(self.input.value()),
      Span::styled("_", Style::default().fg(Color::Yellow)),
    ]);
    frame.render_widget(Paragraph::new(input_line), inner);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crossterm::event::KeyModifiers;

  fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
  }

  #[test]
  fn test_slash_activates_with_current_term() {
    let mut search = SearchInput::new();
    assert_eq!(search.handle_key(key(KeyCode::Char('x')), ""), KeyResult::NotHandled);

    assert_eq!(search.handle_key(key(KeyCode::Char('/')), "ru"), KeyResult::Handled);
    assert!(search.is_active());
    assert_eq!(
      search.handle_key(key(KeyCode::Char('s')), "ru"),
      KeyResult::Event(SearchEvent::Changed("rus".to_string()))
    );
    assert_eq!(
      search.handle_key(key(KeyCode::Enter), "ru"),
      KeyResult::Event(SearchEvent::Submitted("rus".to_string()))
    );
    assert!(!search.is_active());
  }

  #[test]
  fn test_escape_restores_previous_term() {
    let mut search = SearchInput::new();
    search.activate("go");
    search.handle_key(key(KeyCode::Backspace), "go");
    assert_eq!(search.query(), "g");

    assert_eq!(
      search.handle_key(key(KeyCode::Esc), "go"),
      KeyResult::Event(SearchEvent::Changed("go".to_string()))
    );
    assert_eq!(search.query(), "go");
  }
}
