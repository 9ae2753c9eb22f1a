use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph, Scrollbar, ScrollbarOrientation, ScrollbarState};
use tracing::debug;

use crate::app::AppContext;
use crate::cache::{CacheResult, PaginationInfo, SelectionChange};
use crate::db::preferences::next_page_size;
use crate::db::Preferences;
use crate::github::refine::{self, ActiveFilter, Activity};
use crate::github::types::{Repository, RepositoryFilter, WebhookStatus};
use crate::query::{Query, QueryState};
use crate::ui::components::{KeyResult, RetryBudget, SearchEvent, SearchInput};
use crate::ui::renderfns::{compact_count, relative_time, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};
use crate::ui::views::RepositoryDetailView;
use crate::ui::window::{VisibleRange, WindowConfig};

type Page = CacheResult<Vec<Repository>>;
type WebhookMap = HashMap<u64, WebhookStatus>;

/// Root view: one page of repositories for the current selection.
pub struct RepositoryListView {
  ctx: AppContext,
  prefs: Preferences,
  query: Query<Page>,
  /// Next fetch skips the fresh-entry check
  reload: Arc<AtomicBool>,
  retries: RetryBudget,
  search: SearchInput,

  // Grid state
  cursor: usize,
  scroll_top: u32,
  columns: u32,

  // Webhooks
  webhooks: WebhookMap,
  webhook_queries: Vec<Query<WebhookMap>>,
  requested: HashSet<u64>,
  visible_ids: Vec<u64>,
  toggle: Option<(u64, Query<(String, WebhookStatus)>)>,

  status: Option<String>,
}

impl RepositoryListView {
  pub fn new(ctx: AppContext, prefs: Preferences) -> Self {
    let client = ctx.client.clone();
    let selection = ctx.selection.clone();
    let reload = Arc::new(AtomicBool::new(false));
    let reload_flag = reload.clone();
    let mut query = Query::new(move || {
      let client = client.clone();
      let selection = selection.get();
      let forced = reload_flag.swap(false, Ordering::SeqCst);
      async move {
        if forced {
          client.reload_repositories(&selection).await
        } else {
          client.repositories(&selection).await
        }
      }
    });

    // Start fetching immediately
    query.fetch();

    Self {
      ctx,
      prefs,
      query,
      reload,
      retries: RetryBudget::new(),
      search: SearchInput::new(),
      cursor: 0,
      scroll_top: 0,
      columns: 1,
      webhooks: HashMap::new(),
      webhook_queries: Vec::new(),
      requested: HashSet::new(),
      visible_ids: Vec::new(),
      toggle: None,
      status: None,
    }
  }

  fn filter(&self) -> RepositoryFilter {
    self
      .ctx
      .selection
      .get()
      .filter
      .parse()
      .unwrap_or(RepositoryFilter::All)
  }

  fn page_repos(&self) -> &[Repository] {
    self.query.data().map(|p| p.data.as_slice()).unwrap_or(&[])
  }

  /// The page after search, chips and sort
  fn refined(&self) -> Vec<&Repository> {
    self.prefs.refinement.apply(self.page_repos(), Utc::now())
  }

  fn highlighted(&self) -> Option<Repository> {
    self.refined().get(self.cursor).map(|r| (*r).clone())
  }

  fn pagination(&self) -> Option<PaginationInfo> {
    self
      .query
      .data()
      .and_then(|p| p.pagination.clone())
      .or_else(|| self.ctx.client.repository_pagination(&self.ctx.selection.get()))
  }

  /// Card geometry for the current card style
  fn layout(&self) -> WindowConfig {
    if self.prefs.use_enhanced_cards {
      self.ctx.window.clone()
    } else {
      WindowConfig {
        item_height: 1,
        gap: 0,
        max_columns: 1,
        breakpoints: Vec::new(),
        ..self.ctx.window.clone()
      }
    }
  }

  fn save(&self) -> ViewAction {
    ViewAction::SavePreferences(self.prefs.clone())
  }

  fn reset_position(&mut self) {
    self.cursor = 0;
    self.scroll_top = 0;
  }

  fn after_selection_change(&mut self, change: &SelectionChange) {
    let removed = self.ctx.client.apply_selection_change(change);
    if *change != SelectionChange::Unchanged {
      debug!(?change, removed, "selection changed");
      self.reset_position();
      self.retries.reset();
      self.query.refetch();
    }
  }

  fn go_to_page(&mut self, page: u32) {
    let change = self.ctx.selection.set_page(page);
    self.after_selection_change(&change);
  }

  fn request_webhooks(&mut self, ids: Vec<u64>) {
    let ids: Vec<u64> = ids
      .into_iter()
      .filter(|id| self.requested.insert(*id))
      .collect();
    if ids.is_empty() {
      return;
    }

    let client = self.ctx.client.clone();
    let mut query: Query<WebhookMap> = Query::new(move || {
      let client = client.clone();
      let ids = ids.clone();
      async move { Ok(client.webhook_statuses(&ids).await) }
    });
    query.fetch();
    self.webhook_queries.push(query);
  }

  fn on_page_loaded(&mut self) {
    self.retries.reset();
    let len = self.refined().len();
    self.cursor = self.cursor.min(len.saturating_sub(1));
    if !self.prefs.use_lazy_loading {
      let ids = self.page_repos().iter().map(|r| r.id).collect();
      self.request_webhooks(ids);
    }
  }

  fn toggle_webhook(&mut self) {
    let Some(repo) = self.highlighted() else {
      return;
    };
    if self.toggle.is_some() {
      self.status = Some("A webhook update is already running".to_string());
      return;
    }
    let Some(active) = self.webhooks.get(&repo.id).map(|s| s.active) else {
      self.status = Some(format!("Webhook status for {} not loaded yet", repo.name));
      return;
    };

    let id = repo.id;
    let client = self.ctx.client.clone();
    let mut query = Query::new(move || {
      let client = client.clone();
      let repo = repo.clone();
      async move { client.toggle_webhook(&repo, active).await }
    });
    query.fetch();
    self.toggle = Some((id, query));
    self.status = Some(if active { "Removing webhook..." } else { "Creating webhook..." }.to_string());
  }

  fn poll_webhooks(&mut self) {
    let webhooks = &mut self.webhooks;
    self.webhook_queries.retain_mut(|query| {
      if !query.poll() {
        return true;
      }
      if let Some(statuses) = query.data() {
        webhooks.extend(statuses.iter().map(|(id, s)| (*id, s.clone())));
      }
      false
    });

    let finished = match &mut self.toggle {
      Some((id, query)) => query.poll().then(|| (*id, query.state().clone())),
      None => None,
    };
    if let Some((id, state)) = finished {
      self.toggle = None;
      match state {
        QueryState::Success((message, status)) => {
          self.webhooks.insert(id, status);
          self.status = Some(message);
        }
        QueryState::Error(e) => {
          self.status = Some(format!("Webhook update failed: {}", e.user_message()));
        }
        _ => {}
      }
    }
  }

  // Rendering

  fn render_page(&mut self, frame: &mut Frame, area: Rect) {
    let filter = self.filter();
    let block = Block::default()
      .title(format!(" {} ", filter.title()))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));
    let inner = block.inner(area);
    frame.render_widget(block, area);

    let [summary, body, status] = Layout::vertical([
      Constraint::Length(2),
      Constraint::Min(0),
      Constraint::Length(1),
    ])
    .areas(inner);

    self.render_summary(frame, summary, filter);

    if let Some(error) = self.query.error() {
      self.retries.render(frame, body, error);
    } else if self.query.data().is_none() {
      let text = if self.query.is_loading() {
        "Loading repositories..."
      } else {
        "Press 'r' to load repositories."
      };
      frame.render_widget(
        Paragraph::new(text).style(Style::default().fg(Color::DarkGray)),
        body,
      );
    } else if self.refined().is_empty() {
      self.render_empty(frame, body, filter);
    } else {
      self.render_grid(frame, body);
    }

    let status_line = match &self.status {
      Some(text) => Line::from(Span::styled(text.clone(), Style::default().fg(Color::Yellow))),
      None => Line::default(),
    };
    frame.render_widget(Paragraph::new(status_line), status);
  }

  fn render_summary(&self, frame: &mut Frame, area: Rect, filter: RepositoryFilter) {
    let selection = self.ctx.selection.get();
    let pagination = self.pagination();
    let total = pagination
      .as_ref()
      .map(|p| p.total_count)
      .unwrap_or(self.page_repos().len() as u64);

    let mut first = vec![Span::styled(filter.count_label(total), Style::default().fg(Color::White))];
    if let Some(p) = &pagination {
      first.push(Span::styled(
        format!("   page {}/{}", p.current_page, p.total_pages.max(1)),
        Style::default().fg(Color::Cyan),
      ));
    }
    if let Some(page) = self.query.data() {
      let source = if page.from_cache { "cached" } else { "live" };
      first.push(Span::styled(format!("   {}", source), Style::default().fg(Color::DarkGray)));
    }
    if self.query.is_loading() {
      first.push(Span::styled("   loading...", Style::default().fg(Color::Yellow)));
    }

    let refinement = &self.prefs.refinement;
    let mut second = vec![Span::styled(
      format!(
        "sort: {} {}   {}/page",
        refinement.sort_by.label(),
        refinement.direction.arrow(),
        selection.limit
      ),
      Style::default().fg(Color::DarkGray),
    )];
    if !refinement.search.trim().is_empty() {
      second.push(Span::styled(
        format!("   /{}", refinement.search.trim()),
        Style::default().fg(Color::Yellow),
      ));
    }
    for chip in &refinement.filters {
      second.push(Span::raw(" "));
      second.push(Span::styled(
        format!("[{}]", chip.label()),
        Style::default().fg(Color::Magenta),
      ));
    }
    second.push(Span::styled(
      format!(
        "   {} {} {}",
        flag("window", self.prefs.use_virtualization),
        flag("lazy", self.prefs.use_lazy_loading),
        flag("cards", self.prefs.use_enhanced_cards)
      ),
      Style::default().fg(Color::DarkGray),
    ));

    frame.render_widget(
      Paragraph::new(vec![Line::from(first), Line::from(second)]),
      area,
    );
  }

  fn render_empty(&self, frame: &mut Frame, area: Rect, filter: RepositoryFilter) {
    let (title, description) = if self.page_repos().is_empty() {
      filter.empty_state()
    } else {
      (
        "No repositories match your filters",
        "Press 'c' to clear the search and filter chips.",
      )
    };
    let lines = vec![
      Line::default(),
      Line::from(Span::styled(title, Style::default().fg(Color::White).bold())),
      Line::from(Span::styled(description, Style::default().fg(Color::DarkGray))),
    ];
    frame.render_widget(Paragraph::new(lines).alignment(Alignment::Center), area);
  }

  fn render_grid(&mut self, frame: &mut Frame, area: Rect) {
    if area.height == 0 || area.width == 0 {
      return;
    }
    let layout = self.layout();
    let len = self.refined().len();
    self.cursor = self.cursor.min(len.saturating_sub(1));
    self.columns = layout.columns_for_width(u32::from(area.width));
    self.scroll_top = layout.reveal(
      self.cursor,
      len,
      self.columns,
      u32::from(area.height),
      self.scroll_top,
    );

    let windowed = self.prefs.use_virtualization && layout.should_window(len);
    let range = if windowed {
      layout.visible_range(len, self.columns, u32::from(area.height), self.scroll_top)
    } else {
      Some(VisibleRange {
        start_index: 0,
        end_index: len - 1,
        total_height: len.div_ceil(self.columns as usize) as u64 * u64::from(layout.row_height()),
        offset_y: 0,
      })
    };
    let Some(range) = range else {
      return;
    };

    let columns = self.columns as usize;
    let card_width = area.width / self.columns as u16;
    let now = Utc::now();
    let mut drawn = Vec::new();
    {
      let repos = self.refined();
      for index in range.start_index..=range.end_index {
        let Some(repo) = repos.get(index) else { break };
        let top = (index / columns) as i64 * i64::from(layout.row_height()) - i64::from(self.scroll_top);
        if top < 0 || top >= i64::from(area.height) {
          continue;
        }
        let height = (layout.item_height as u16).min(area.height - top as u16);
        let card = Rect::new(
          area.x + (index % columns) as u16 * card_width,
          area.y + top as u16,
          card_width.saturating_sub(1),
          height,
        );

        let lines = card_lines(
          repo,
          self.webhooks.get(&repo.id),
          self.prefs.use_enhanced_cards,
          usize::from(card.width),
          now,
        );
        let style = if index == self.cursor {
          Style::default().bg(Color::DarkGray)
        } else {
          Style::default()
        };
        frame.render_widget(Paragraph::new(lines).style(style), card);
        drawn.push(repo.id);
      }
    }
    self.visible_ids = drawn;

    if range.total_height > u64::from(area.height) {
      let mut state = ScrollbarState::new(range.total_height as usize)
        .viewport_content_length(usize::from(area.height))
        .position(self.scroll_top as usize);
      frame.render_stateful_widget(
        Scrollbar::new(ScrollbarOrientation::VerticalRight),
        area,
        &mut state,
      );
    }
  }

  // Key handling helpers for or_else chain pattern

  fn handle_overlays(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match self.search.handle_key(key, &self.prefs.refinement.search) {
      KeyResult::Handled => Some(ViewAction::None),
      KeyResult::Event(SearchEvent::Changed(term)) => {
        self.prefs.refinement.search = term;
        self.reset_position();
        Some(ViewAction::None)
      }
      KeyResult::Event(SearchEvent::Submitted(term)) => {
        self.prefs.refinement.search = term;
        Some(self.save())
      }
      KeyResult::NotHandled => None,
    }
  }

  fn handle_navigation(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let len = self.refined().len();
    let columns = self.columns as isize;
    let delta = match key.code {
      KeyCode::Char('j') | KeyCode::Down => columns,
      KeyCode::Char('k') | KeyCode::Up => -columns,
      KeyCode::Char('l') | KeyCode::Right => 1,
      KeyCode::Char('h') | KeyCode::Left => -1,
      KeyCode::Char('g') | KeyCode::Home => {
        self.cursor = 0;
        return Some(ViewAction::None);
      }
      KeyCode::Char('G') | KeyCode::End => {
        self.cursor = len.saturating_sub(1);
        return Some(ViewAction::None);
      }
      _ => return None,
    };
    self.cursor = step(self.cursor, len, delta);
    Some(ViewAction::None)
  }

  fn handle_paging(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('n') | KeyCode::Char(']') => {
        if let Some(p) = self.pagination().filter(|p| p.has_next_page) {
          self.go_to_page(p.current_page + 1);
        }
        Some(ViewAction::None)
      }
      KeyCode::Char('p') | KeyCode::Char('[') => {
        if let Some(p) = self.pagination().filter(|p| p.has_prev_page) {
          self.go_to_page(p.current_page.saturating_sub(1));
        }
        Some(ViewAction::None)
      }
      KeyCode::Char('+') => {
        let next = next_page_size(self.ctx.selection.get().limit);
        let change = self.ctx.selection.set_limit(next);
        self.after_selection_change(&change);
        self.prefs.page_size = Some(next);
        self.status = Some(format!("{} repositories per page", next));
        Some(self.save())
      }
      _ => None,
    }
  }

  fn handle_refinement(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let languages = match key.code {
      KeyCode::Char('L') => refine::languages(self.page_repos()),
      _ => Vec::new(),
    };
    let refinement = &mut self.prefs.refinement;
    match key.code {
      KeyCode::Char('s') => refinement.sort_by = refinement.sort_by.next(),
      KeyCode::Char('S') => refinement.direction = refinement.direction.toggled(),
      KeyCode::Char('L') => {
        let current = refinement.filters.iter().find_map(|f| match f {
          ActiveFilter::Language(lang) => Some(lang.clone()),
          _ => None,
        });
        refinement
          .filters
          .retain(|f| !matches!(f, ActiveFilter::Language(_)));
        if let Some(lang) = next_language(&languages, current.as_deref()) {
          refinement.toggle_filter(ActiveFilter::Language(lang));
        }
      }
      KeyCode::Char('a') => {
        let current = refinement.filters.iter().find_map(|f| match f {
          ActiveFilter::Activity(a) => Some(*a),
          _ => None,
        });
        refinement
          .filters
          .retain(|f| !matches!(f, ActiveFilter::Activity(_)));
        if let Some(activity) = next_activity(current) {
          refinement.toggle_filter(ActiveFilter::Activity(activity));
        }
      }
      KeyCode::Char('c') => refinement.clear(),
      _ => return None,
    }
    self.reset_position();
    Some(self.save())
  }

  fn handle_toggles(&mut self, key: KeyEvent) -> Option<ViewAction> {
    let (name, value) = match key.code {
      KeyCode::Char('v') => {
        self.prefs.use_virtualization = !self.prefs.use_virtualization;
        ("windowed rendering", self.prefs.use_virtualization)
      }
      KeyCode::Char('z') => {
        self.prefs.use_lazy_loading = !self.prefs.use_lazy_loading;
        if !self.prefs.use_lazy_loading {
          let ids = self.page_repos().iter().map(|r| r.id).collect();
          self.request_webhooks(ids);
        }
        ("lazy loading", self.prefs.use_lazy_loading)
      }
      KeyCode::Char('e') => {
        self.prefs.use_enhanced_cards = !self.prefs.use_enhanced_cards;
        self.scroll_top = 0;
        ("enhanced cards", self.prefs.use_enhanced_cards)
      }
      _ => return None,
    };
    self.status = Some(format!("{} {}", name, if value { "on" } else { "off" }));
    Some(self.save())
  }

  fn handle_actions(&mut self, key: KeyEvent) -> Option<ViewAction> {
    match key.code {
      KeyCode::Char('r') => {
        if let Some(error) = self.query.error().cloned() {
          if self.retries.record_retry(&error) {
            self.query.refetch();
          }
        } else {
          self.reload.store(true, Ordering::SeqCst);
          self.requested.clear();
          self.query.refetch();
        }
        Some(ViewAction::None)
      }
      KeyCode::Char('w') => {
        self.toggle_webhook();
        Some(ViewAction::None)
      }
      KeyCode::Char('W') => {
        self.requested.clear();
        let ids = if self.prefs.use_lazy_loading {
          self.visible_ids.clone()
        } else {
          self.page_repos().iter().map(|r| r.id).collect()
        };
        self.request_webhooks(ids);
        self.status = Some("Refreshing webhook status...".to_string());
        Some(ViewAction::None)
      }
      KeyCode::Enter => {
        let repo = self.highlighted()?;
        let webhook = self.webhooks.get(&repo.id).cloned();
        Some(ViewAction::Push(Box::new(RepositoryDetailView::new(
          self.ctx.clone(),
          repo,
          webhook,
        ))))
      }
      KeyCode::Char('q') | KeyCode::Esc => Some(ViewAction::Pop),
      _ => None,
    }
  }
}

impl View for RepositoryListView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    self
      .handle_overlays(key)
      .or_else(|| self.handle_navigation(key))
      .or_else(|| self.handle_paging(key))
      .or_else(|| self.handle_refinement(key))
      .or_else(|| self.handle_toggles(key))
      .or_else(|| self.handle_actions(key))
      .unwrap_or(ViewAction::None)
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    self.render_page(frame, area);
    self.search.render_overlay(frame, area);
  }

  fn breadcrumb_label(&self) -> String {
    self.filter().title().to_string()
  }

  fn context(&self) -> Option<String> {
    Some(self.filter().as_str().to_string())
  }

  fn is_capturing_input(&self) -> bool {
    self.search.is_active()
  }

  fn tick(&mut self) {
    if self.query.poll() && self.query.data().is_some() && self.query.error().is_none() {
      self.on_page_loaded();
    }
    if self.prefs.use_lazy_loading {
      let ids = self.visible_ids.clone();
      self.request_webhooks(ids);
    }
    self.poll_webhooks();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("/", "search").with_priority(20),
      ShortcutInfo::new("n/p", "page").with_priority(30),
      ShortcutInfo::new("+", "page size").with_priority(35),
      ShortcutInfo::new("s/S", "sort").with_priority(40),
      ShortcutInfo::new("L/a", "language/activity").with_priority(45),
      ShortcutInfo::new("w", "webhook").with_priority(50),
      ShortcutInfo::new("v/z/e", "prefs").with_priority(60),
      ShortcutInfo::new("q", "quit").with_priority(90),
    ]
  }
}

fn flag(name: &str, on: bool) -> String {
  format!("{}{}", if on { "+" } else { "-" }, name)
}

/// Move the cursor by `delta` cards, staying inside the list.
fn step(cursor: usize, len: usize, delta: isize) -> usize {
  if len == 0 {
    return 0;
  }
  let target = cursor as isize + delta;
  if target < 0 {
    cursor
  } else {
    (target as usize).min(len - 1)
  }
}

/// Language after `current` in the page's language list; `None` after the
/// last one turns the chip off.
fn next_language(languages: &[(String, usize)], current: Option<&str>) -> Option<String> {
  let next = match current {
    None => languages.first(),
    Some(cur) => languages
      .iter()
      .skip_while(|(lang, _)| lang != cur)
      .nth(1),
  };
  next.map(|(lang, _)| lang.clone())
}

fn next_activity(current: Option<Activity>) -> Option<Activity> {
  match current {
    None => Some(Activity::ALL[0]),
    Some(a) => {
      let i = Activity::ALL.iter().position(|x| *x == a)?;
      Activity::ALL.get(i + 1).copied()
    }
  }
}

fn visibility_style(repo: &Repository) -> Style {
  if repo.archived {
    Style::default().fg(Color::DarkGray)
  } else if repo.private {
    Style::default().fg(Color::Yellow)
  } else {
    Style::default().fg(Color::Green)
  }
}

fn webhook_span(status: Option<&WebhookStatus>) -> Span<'static> {
  match status {
    Some(s) if s.active => Span::styled("● hook", Style::default().fg(Color::Green)),
    Some(_) => Span::styled("○ hook", Style::default().fg(Color::DarkGray)),
    None => Span::raw(""),
  }
}

/// Text of one repository card, `width` cells wide.
fn card_lines(
  repo: &Repository,
  webhook: Option<&WebhookStatus>,
  enhanced: bool,
  width: usize,
  now: DateTime<Utc>,
) -> Vec<Line<'static>> {
  let badge = if repo.fork {
    format!("{} fork", repo.visibility())
  } else {
    repo.visibility().to_string()
  };
  let updated = relative_time(repo.updated_at, now);

  if !enhanced {
    let name_width = width.saturating_sub(32).max(8);
    return vec![Line::from(vec![
      Span::styled(
        format!("{:<w$}", truncate(&repo.name, name_width), w = name_width),
        Style::default().fg(Color::Cyan),
      ),
      Span::styled(format!(" {:<12}", badge), visibility_style(repo)),
      Span::raw(format!("★ {:>6} ", compact_count(repo.stargazers_count))),
      Span::styled(format!("{:<9}", updated), Style::default().fg(Color::DarkGray)),
      webhook_span(webhook),
    ])];
  }

  let name_width = width.saturating_sub(badge.chars().count() + 1).max(4);
  let description = repo.description.as_deref().unwrap_or("No description");
  let mut stats = vec![
    Span::raw(format!("★ {}  ⑂ {}  ", compact_count(repo.stargazers_count), compact_count(repo.forks_count))),
  ];
  if let Some(lang) = &repo.language {
    stats.push(Span::styled(format!("{}  ", lang), Style::default().fg(Color::Magenta)));
  }
  stats.push(Span::styled(format!("{}  ", updated), Style::default().fg(Color::DarkGray)));
  stats.push(webhook_span(webhook));

  vec![
    Line::from(vec![
      Span::styled(
        truncate(&repo.name, name_width),
        Style::default().fg(Color::Cyan).bold(),
      ),
      Span::raw(" "),
      Span::styled(badge, visibility_style(repo)),
    ]),
    Line::from(Span::styled(
      truncate(description, width),
      Style::default().fg(Color::Gray),
    )),
    Line::from(stats),
  ]
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CurrentSelection, Selection};
  use crate::config::Config;
  use crate::github::types::Owner;
  use crate::github::{ApiError, CachedDashboardClient};
  use crossterm::event::KeyModifiers;
  use std::time::Duration;

  fn repo(name: &str) -> Repository {
    Repository {
      id: 1,
      name: name.to_string(),
      full_name: format!("octo/{}", name),
      private: true,
      description: None,
      fork: false,
      archived: false,
      stargazers_count: 1_240,
      forks_count: 3,
      open_issues_count: 0,
      language: Some("Rust".to_string()),
      updated_at: Utc::now(),
      created_at: Utc::now(),
      html_url: String::new(),
      clone_url: String::new(),
      owner: Owner {
        login: "octo".to_string(),
        avatar_url: String::new(),
      },
    }
  }

  fn text(lines: &[Line]) -> String {
    lines
      .iter()
      .map(|l| l.spans.iter().map(|s| s.content.as_ref()).collect::<String>())
      .collect::<Vec<_>>()
      .join("\n")
  }

  #[test]
  fn test_step_stays_in_bounds() {
    assert_eq!(step(0, 10, -1), 0);
    assert_eq!(step(2, 10, 4), 6);
    // Down from the row above a partial last row lands on the last card
    assert_eq!(step(7, 10, 4), 9);
    assert_eq!(step(3, 10, -4), 3);
    assert_eq!(step(0, 0, 1), 0);
  }

  #[test]
  fn test_language_cycle_ends_with_none() {
    let langs = vec![("Go".to_string(), 1), ("Rust".to_string(), 2)];
    assert_eq!(next_language(&langs, None).as_deref(), Some("Go"));
    assert_eq!(next_language(&langs, Some("Go")).as_deref(), Some("Rust"));
    assert_eq!(next_language(&langs, Some("Rust")), None);
    assert_eq!(next_language(&[], None), None);
  }

  #[test]
  fn test_activity_cycle_ends_with_none() {
    assert_eq!(next_activity(None), Some(Activity::VeryActive));
    assert_eq!(next_activity(Some(Activity::Moderate)), Some(Activity::Inactive));
    assert_eq!(next_activity(Some(Activity::Inactive)), None);
  }

  #[test]
  fn test_enhanced_card_lines() {
    let now = Utc::now();
    let status = WebhookStatus {
      active: true,
      webhook_id: Some("7".to_string()),
    };
    let lines = card_lines(&repo("ghdash"), Some(&status), true, 40, now);
    assert_eq!(lines.len(), 3);
    let rendered = text(&lines);
    assert!(rendered.contains("ghdash private"));
    assert!(rendered.contains("No description"));
    assert!(rendered.contains("★ 1.2k"));
    assert!(rendered.contains("Rust"));
    assert!(rendered.contains("● hook"));
  }

  #[test]
  fn test_standard_card_is_one_line() {
    let lines = card_lines(&repo("ghdash"), None, false, 80, Utc::now());
    assert_eq!(lines.len(), 1);
    assert!(!text(&lines).contains("hook"));
  }

  fn context() -> AppContext {
    let config = Config::parse("backend_url: http://127.0.0.1:9\n").unwrap();
    AppContext {
      client: CachedDashboardClient::new(&config, Some("t".to_string())).unwrap(),
      selection: CurrentSelection::new(Selection::new("repositories", "starred", 2, 15)),
      window: config.window.clone(),
    }
  }

  #[tokio::test]
  async fn test_page_size_key_resets_page_and_saves() {
    let ctx = context();
    let mut view = RepositoryListView::new(ctx.clone(), Preferences::default());

    let action = view.handle_key(KeyEvent::new(KeyCode::Char('+'), KeyModifiers::NONE));
    match action {
      ViewAction::SavePreferences(prefs) => assert_eq!(prefs.page_size, Some(30)),
      _ => panic!("expected preferences to be saved"),
    }
    let selection = ctx.selection.get();
    assert_eq!((selection.page, selection.limit), (1, 30));
  }

  #[tokio::test]
  async fn test_sort_key_updates_refinement() {
    let mut view = RepositoryListView::new(context(), Preferences::default());
    let action = view.handle_key(KeyEvent::new(KeyCode::Char('S'), KeyModifiers::NONE));
    match action {
      ViewAction::SavePreferences(prefs) => {
        assert_eq!(prefs.refinement.direction, refine::SortDirection::Asc)
      }
      _ => panic!("expected preferences to be saved"),
    }
    assert_eq!(view.context().as_deref(), Some("starred"));
  }

  #[tokio::test]
  async fn test_finished_webhook_toggle_updates_status() {
    let mut view = RepositoryListView::new(context(), Preferences::default());
    let mut query: Query<(String, WebhookStatus)> = Query::new(|| async {
      Ok((
        "Webhook created".to_string(),
        WebhookStatus {
          active: true,
          webhook_id: Some("12".to_string()),
        },
      ))
    });
    query.fetch();
    view.toggle = Some((7, query));

    tokio::time::sleep(Duration::from_millis(20)).await;
    view.poll_webhooks();

    assert!(view.toggle.is_none());
    assert!(view.webhooks[&7].active);
    assert_eq!(view.status.as_deref(), Some("Webhook created"));
  }

  #[tokio::test]
  async fn test_failed_webhook_toggle_reports_error() {
    let mut view = RepositoryListView::new(context(), Preferences::default());
    let mut query: Query<(String, WebhookStatus)> =
      Query::new(|| async { Err(ApiError::missing_token()) });
    query.fetch();
    view.toggle = Some((7, query));

    tokio::time::sleep(Duration::from_millis(20)).await;
    view.poll_webhooks();

    assert!(view.toggle.is_none());
    assert!(!view.webhooks.contains_key(&7));
    assert!(view
      .status
      .as_deref()
      .is_some_and(|s| s.starts_with("Webhook update failed")));
  }
}
