use chrono::{DateTime, Utc};
use ratatui::prelude::Color;

/// Truncate a string to a maximum width in characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Display color for an AI comment status
pub fn status_color(status: &str) -> Color {
  match status {
    "posted" | "approved" => Color::Green,
    "pending" => Color::Yellow,
    "failed" | "rejected" => Color::Red,
    _ => Color::White,
  }
}

/// Display color for a pull request state
pub fn pr_state_color(state: &str, merged: bool) -> Color {
  if merged {
    return Color::Magenta;
  }
  match state {
    "open" => Color::Green,
    "closed" => Color::Red,
    _ => Color::White,
  }
}

/// "3d ago" style age
pub fn relative_time(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
  let secs = (now - at).num_seconds().max(0);
  match secs {
    s if s < 60 => "just now".to_string(),
    s if s < 3_600 => format!("{}m ago", s / 60),
    s if s < 86_400 => format!("{}h ago", s / 3_600),
    s if s < 86_400 * 30 => format!("{}d ago", s / 86_400),
    s if s < 86_400 * 365 => format!("{}mo ago", s / (86_400 * 30)),
    s => format!("{}y ago", s / (86_400 * 365)),
  }
}

/// Compact count: 999, 1.2k, 3.4M
pub fn compact_count(n: u64) -> String {
  match n {
    n if n < 1_000 => n.to_string(),
    n if n < 1_000_000 => format!("{:.1}k", n as f64 / 1_000.0),
    n => format!("{:.1}M", n as f64 / 1_000_000.0),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Duration;

  #[test]
  fn test_truncate_short_string() {
    assert_eq!(truncate("hello", 10), "hello");
  }

  #[test]
  fn test_truncate_exact_length() {
    assert_eq!(truncate("hello", 5), "hello");
  }

  #[test]
  fn test_truncate_long_string() {
    assert_eq!(truncate("hello world", 8), "hello...");
  }

  #[test]
  fn test_truncate_multibyte() {
    assert_eq!(truncate("héllo wörld", 8), "héllo...");
  }

  #[test]
  fn test_status_colors() {
    assert_eq!(status_color("posted"), Color::Green);
    assert_eq!(status_color("pending"), Color::Yellow);
    assert_eq!(status_color("rejected"), Color::Red);
    assert_eq!(status_color("unknown"), Color::White);
    assert_eq!(pr_state_color("closed", true), Color::Magenta);
    assert_eq!(pr_state_color("open", false), Color::Green);
  }

  #[test]
  fn test_relative_time() {
    let now = Utc::now();
    assert_eq!(relative_time(now, now), "just now");
    assert_eq!(relative_time(now - Duration::minutes(5), now), "5m ago");
    assert_eq!(relative_time(now - Duration::hours(3), now), "3h ago");
    assert_eq!(relative_time(now - Duration::days(12), now), "12d ago");
    assert_eq!(relative_time(now - Duration::days(400), now), "1y ago");
  }

  #[test]
  fn test_compact_count() {
    assert_eq!(compact_count(999), "999");
    assert_eq!(compact_count(1_240), "1.2k");
    assert_eq!(compact_count(3_400_000), "3.4M");
  }
}
