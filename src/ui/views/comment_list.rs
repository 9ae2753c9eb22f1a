use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::AppContext;
use crate::cache::CacheResult;
use crate::github::types::{AiComment, CommentFilters, CommentPage};
use crate::query::{Query, QueryState};
use crate::ui::components::RetryBudget;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{relative_time, status_color, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

const STATUSES: &[&str] = &["posted", "approved", "pending", "failed", "rejected"];
const TYPES: &[&str] = &["summary", "code_review", "suggestion", "issue_analysis"];
const PAGE_SIZE: u32 = 20;

/// AI review comments, optionally filtered by status and type
pub struct CommentListView {
  ctx: AppContext,
  filters: CommentFilters,
  query: Query<CacheResult<CommentPage>>,
  reload: Arc<AtomicBool>,
  retries: RetryBudget,
  list_state: ListState,
}

impl CommentListView {
  pub fn new(ctx: AppContext) -> Self {
    let filters = CommentFilters::default();
    let reload = Arc::new(AtomicBool::new(false));
    let query = comments_query(&ctx, &filters, &reload);
    Self {
      ctx,
      filters,
      query,
      reload,
      retries: RetryBudget::new(),
      list_state: ListState::default(),
    }
  }

  fn reload(&mut self) {
    self.query = comments_query(&self.ctx, &self.filters, &self.reload);
    self.retries.reset();
    self.list_state.select(Some(0));
  }

  fn comments(&self) -> &[AiComment] {
    self
      .query
      .data()
      .map(|p| p.data.comments.as_slice())
      .unwrap_or(&[])
  }

  fn title(&self) -> String {
    let mut parts = Vec::new();
    if let Some(status) = &self.filters.status {
      parts.push(format!("status={}", status));
    }
    if let Some(kind) = &self.filters.comment_type {
      parts.push(format!("type={}", kind));
    }
    let scope = if parts.is_empty() {
      String::new()
    } else {
      format!(" [{}]", parts.join(" "))
    };

    match self.query.state() {
      QueryState::Loading => format!(" AI comments{} (loading...) ", scope),
      QueryState::Error(e) => format!(" AI comments{} ({}) ", scope, e.kind.title()),
      _ => {
        let page = self.query.data();
        let total = page.map(|p| p.data.total).unwrap_or(0);
        let cached = if page.is_some_and(|p| p.from_cache) { ", cached" } else { "" };
        format!(" AI comments{} ({} total{}) ", scope, total, cached)
      }
    }
  }

  fn render_list(&mut self, frame: &mut Frame, area: Rect) {
    let len = self.comments().len();
    ensure_valid_selection(&mut self.list_state, len);

    let block = Block::default()
      .title(self.title())
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    if let Some(error) = self.query.error() {
      let inner = block.inner(area);
      frame.render_widget(block, area);
      self.retries.render(frame, inner, error);
      return;
    }

    if len == 0 && !self.query.is_loading() {
      let content = if self.filters.is_empty() {
        "No AI comments yet."
      } else {
        "No comments match these filters. Press 'x' to clear them."
      };
      let paragraph = Paragraph::new(content)
        .block(block)
        .style(Style::default().fg(Color::DarkGray));
      frame.render_widget(paragraph, area);
      return;
    }

    let now = Utc::now();
    let items: Vec<ListItem> = self
      .comments()
      .iter()
      .map(|c| comment_item(c, now))
      .collect();

    let list = List::new(items)
      .block(block)
      .highlight_style(
        Style::default()
          .bg(Color::DarkGray)
          .add_modifier(Modifier::BOLD),
      )
      .highlight_symbol("> ");

    frame.render_stateful_widget(list, area, &mut self.list_state);
  }

  fn render_body(&self, frame: &mut Frame, area: Rect) {
    let selected = self
      .list_state
      .selected()
      .and_then(|i| self.comments().get(i));
    let Some(comment) = selected else {
      frame.render_widget(Block::default().borders(Borders::ALL), area);
      return;
    };

    let block = Block::default()
      .title(format!(
        " {} PR #{} ({}) ",
        comment.repository_name, comment.pull_request_id, comment.branch
      ))
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::DarkGray));
    frame.render_widget(
      Paragraph::new(comment.comment.as_str())
        .wrap(Wrap { trim: false })
        .block(block),
      area,
    );
  }

  fn page_offset(&self) -> Option<(u32, u32, u64)> {
    self
      .query
      .data()
      .map(|p| (p.data.offset, p.data.limit.max(1), p.data.total))
  }
}

impl View for CommentListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.list_state.select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.list_state.select_previous(),
      KeyCode::Char('s') => {
        self.filters.status = cycle(STATUSES, self.filters.status.as_deref());
        self.filters.offset = None;
        self.reload();
      }
      KeyCode::Char('t') => {
        self.filters.comment_type = cycle(TYPES, self.filters.comment_type.as_deref());
        self.filters.offset = None;
        self.reload();
      }
      KeyCode::Char('x') => {
        self.filters = CommentFilters::default();
        self.reload();
      }
      KeyCode::Char('n') => {
        if let Some((offset, limit, total)) = self.page_offset() {
          if u64::from(offset + limit) < total {
            self.filters.limit = Some(PAGE_SIZE);
            self.filters.offset = Some(offset + limit);
            self.reload();
          }
        }
      }
      KeyCode::Char('p') => {
        if let Some((offset, limit, _)) = self.page_offset() {
          if offset > 0 {
            let previous = offset.saturating_sub(limit);
            self.filters.offset = (previous > 0).then_some(previous);
            if self.filters.offset.is_none() {
              self.filters.limit = None;
            }
            self.reload();
          }
        }
      }
      KeyCode::Char('r') => {
        if let Some(error) = self.query.error().cloned() {
          if self.retries.record_retry(&error) {
            self.query.refetch();
          }
        } else {
          self.reload.store(true, Ordering::SeqCst);
          self.query.refetch();
        }
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [list, body] =
      Layout::vertical([Constraint::Percentage(60), Constraint::Percentage(40)]).areas(area);
    self.render_list(frame, list);
    self.render_body(frame, body);
  }

  fn breadcrumb_label(&self) -> String {
    "AI comments".to_string()
  }

  fn context(&self) -> Option<String> {
    Some("comments".to_string())
  }

  fn tick(&mut self) {
    if self.query.poll() && self.query.error().is_none() {
      self.retries.reset();
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("s", "status").with_priority(20),
      ShortcutInfo::new("t", "type").with_priority(25),
      ShortcutInfo::new("x", "clear").with_priority(30),
      ShortcutInfo::new("n/p", "page").with_priority(35),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

/// Query for one comment page. Setting `reload` makes its next fetch skip
/// the cache.
fn comments_query(
  ctx: &AppContext,
  filters: &CommentFilters,
  reload: &Arc<AtomicBool>,
) -> Query<CacheResult<CommentPage>> {
  let client = ctx.client.clone();
  let filters = filters.clone();
  let reload = reload.clone();
  let mut query = Query::new(move || {
    let client = client.clone();
    let filters = filters.clone();
    let forced = reload.swap(false, Ordering::SeqCst);
    async move {
      if forced {
        client.reload_ai_comments(&filters).await
      } else {
        client.ai_comments(&filters).await
      }
    }
  });
  query.fetch();
  query
}

/// Next option after `current`; `None` (no filter) follows the last one.
fn cycle(options: &[&str], current: Option<&str>) -> Option<String> {
  let next = match current {
    None => options.first(),
    Some(cur) => options
      .iter()
      .position(|o| *o == cur)
      .and_then(|i| options.get(i + 1)),
  };
  next.map(|s| s.to_string())
}

/// Relative age of a backend timestamp, or the raw text when unparseable
fn comment_age(created_at: &str, now: DateTime<Utc>) -> String {
  DateTime::parse_from_rfc3339(created_at)
    .map(|t| relative_time(t.with_timezone(&Utc), now))
    .unwrap_or_else(|_| created_at.to_string())
}

fn comment_item(comment: &AiComment, now: DateTime<Utc>) -> ListItem<'static> {
  let age = comment_age(&comment.created_at, now);
  let headline = comment.comment.lines().next().unwrap_or_default();

  ListItem::new(Line::from(vec![
    Span::styled(
      format!("{:<9}", comment.status),
      Style::default().fg(status_color(&comment.status)),
    ),
    Span::styled(
      format!("{:<15}", comment.comment_type),
      Style::default().fg(Color::Magenta),
    ),
    Span::styled(
      format!("{:<24}", truncate(&comment.repository_name, 23)),
      Style::default().fg(Color::Cyan),
    ),
    Span::raw(truncate(headline, 60)),
    Span::styled(format!("  {}", age), Style::default().fg(Color::DarkGray)),
  ]))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cycle_wraps_through_none() {
    assert_eq!(cycle(STATUSES, None).as_deref(), Some("posted"));
    assert_eq!(cycle(STATUSES, Some("posted")).as_deref(), Some("approved"));
    assert_eq!(cycle(STATUSES, Some("rejected")), None);
    assert_eq!(cycle(TYPES, Some("unknown")), None);
  }

  #[test]
  fn test_comment_age() {
    let now = Utc::now();
    let two_hours_ago = (now - chrono::Duration::hours(2)).to_rfc3339();
    assert_eq!(comment_age(&two_hours_ago, now), "2h ago");
    assert_eq!(comment_age("yesterday", now), "yesterday");
  }
}
