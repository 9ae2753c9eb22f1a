use crate::github::ApiError;
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Wrap};

/// Manual retries allowed per error episode
pub const MAX_RETRIES: u32 = 3;

const EXHAUSTED: &str = "Maximum retries reached. Please restart or contact support.";

/// Retry budget for one failing query.
///
/// An episode ends when the query succeeds; call [`Self::reset`] then.
#[derive(Debug, Clone, Default)]
pub struct RetryBudget {
  attempts: u32,
}

impl RetryBudget {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn attempts(&self) -> u32 {
    self.attempts
  }

  /// Whether `r` may retry this error
  pub fn can_retry(&self, error: &ApiError) -> bool {
    error.kind.is_retryable() && self.attempts < MAX_RETRIES
  }

  /// Count a retry. Returns false, without counting, when none is left.
  pub fn record_retry(&mut self, error: &ApiError) -> bool {
    if !self.can_retry(error) {
      return false;
    }
    self.attempts += 1;
    true
  }

  pub fn reset(&mut self) {
    self.attempts = 0;
  }

  /// Lines of the banner for `error`
  pub fn lines(&self, error: &ApiError) -> Vec<Line<'static>> {
    let mut lines = vec![
      Line::from(Span::styled(
        error.kind.title(),
        Style::default().fg(Color::Red).bold(),
      )),
      Line::from(error.user_message()),
    ];

    // The hint replaced the raw message above; keep it for reference
    if error.kind.hint().is_some() {
      lines.push(Line::from(Span::styled(
        error.message.clone(),
        Style::default().fg(Color::DarkGray),
      )));
    }

    let footer = if !error.kind.is_retryable() {
      Span::styled("Log in again with --token.", Style::default().fg(Color::Yellow))
    } else if self.attempts >= MAX_RETRIES {
      Span::styled(EXHAUSTED, Style::default().fg(Color::Yellow))
    } else {
      Span::styled(
        format!(
          "Press 'r' to retry ({} of {} left)",
          MAX_RETRIES - self.attempts,
          MAX_RETRIES
        ),
        Style::default().fg(Color::Cyan),
      )
    };
    lines.push(Line::default());
    lines.push(Line::from(footer));
    lines
  }

  /// Draw the banner into `area`
  pub fn render(&self, frame: &mut Frame, area: Rect, error: &ApiError) {
    let paragraph = Paragraph::new(self.lines(error))
      .wrap(Wrap { trim: true })
      .block(
        Block::default()
          .borders(Borders::ALL)
          .border_style(Style::default().fg(Color::Red)),
      );
    frame.render_widget(paragraph, area);
  }
}
