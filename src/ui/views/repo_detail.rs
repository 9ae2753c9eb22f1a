use chrono::Utc;
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState, Paragraph, Wrap};

use crate::app::AppContext;
use crate::github::types::{Commit, PullRequest, Repository, WebhookStatus};
use crate::github::{ApiError, RepositoryBundle};
use crate::query::Query;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{compact_count, pr_state_color, relative_time, truncate};
use crate::ui::view::{ShortcutInfo, View, ViewAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Section {
  PullRequests,
  Commits,
}

/// Details, pull requests and recent commits of one repository
pub struct RepositoryDetailView {
  ctx: AppContext,
  repo: Repository,
  bundle: Query<RepositoryBundle>,
  webhook: Option<WebhookStatus>,
  webhook_query: Query<WebhookStatus>,
  toggle: Option<Query<(String, WebhookStatus)>>,
  focus: Section,
  pulls_state: ListState,
  commits_state: ListState,
  status: Option<String>,
}

impl RepositoryDetailView {
  pub fn new(ctx: AppContext, repo: Repository, webhook: Option<WebhookStatus>) -> Self {
    let client = ctx.client.clone();
    let (owner, name) = (repo.owner.login.clone(), repo.name.clone());
    let mut bundle: Query<RepositoryBundle> = Query::new(move || {
      let client = client.clone();
      let (owner, name) = (owner.clone(), name.clone());
      async move { Ok(client.repository_bundle(&owner, &name).await) }
    });
    bundle.fetch();

    let client = ctx.client.clone();
    let repo_id = repo.id;
    let mut webhook_query = Query::new(move || {
      let client = client.clone();
      async move { client.backend().webhook_status(repo_id).await }
    });
    // The list may already know the status
    if webhook.is_none() {
      webhook_query.fetch();
    }

    Self {
      ctx,
      repo,
      bundle,
      webhook,
      webhook_query,
      toggle: None,
      focus: Section::PullRequests,
      pulls_state: ListState::default(),
      commits_state: ListState::default(),
      status: None,
    }
  }

  fn toggle_webhook(&mut self) {
    if self.toggle.is_some() {
      return;
    }
    let Some(active) = self.webhook.as_ref().map(|s| s.active) else {
      self.status = Some("Webhook status not loaded yet".to_string());
      return;
    };

    let client = self.ctx.client.clone();
    let repo = self.repo.clone();
    let mut query = Query::new(move || {
      let client = client.clone();
      let repo = repo.clone();
      async move { client.toggle_webhook(&repo, active).await }
    });
    query.fetch();
    self.toggle = Some(query);
    self.status = Some(if active { "Removing webhook..." } else { "Creating webhook..." }.to_string());
  }

  fn render_info(&self, frame: &mut Frame, area: Rect) {
    let block = Block::default()
      .title(format!(" {} ", self.repo.full_name))
      .title_alignment(Alignment::Center)
      .borders(Borders::ALL)
      .border_style(Style::default().fg(Color::Blue));

    let label = |text: &'static str| Span::styled(format!("{:<12}", text), Style::default().fg(Color::DarkGray));
    let now = Utc::now();
    let repo = &self.repo;

    let mut lines = vec![Line::from(Span::styled(
      repo.description.clone().unwrap_or_else(|| "No description".to_string()),
      Style::default().fg(Color::White),
    ))];
    lines.push(Line::default());
    lines.push(Line::from(vec![
      label("Visibility"),
      Span::raw(repo.visibility()),
      Span::raw(if repo.fork { " (fork)" } else { "" }),
    ]));

    match self.bundle.data().map(|b| &b.details) {
      Some(Ok(details)) => {
        lines.push(Line::from(vec![label("Branch"), Span::raw(details.default_branch.clone())]));
        if let Some(pushed) = details.pushed_at {
          lines.push(Line::from(vec![label("Pushed"), Span::raw(relative_time(pushed, now))]));
        }
      }
      Some(Err(e)) => lines.push(section_error("Details", e)),
      None => lines.push(Line::from(Span::styled("Loading details...", Style::default().fg(Color::Yellow)))),
    }

    lines.push(Line::from(vec![
      label("Stats"),
      Span::raw(format!(
        "★ {}   ⑂ {}   {} open issues",
        compact_count(repo.stargazers_count),
        compact_count(repo.forks_count),
        repo.open_issues_count
      )),
    ]));
    if let Some(lang) = &repo.language {
      lines.push(Line::from(vec![label("Language"), Span::raw(lang.clone())]));
    }
    lines.push(Line::from(vec![label("Updated"), Span::raw(relative_time(repo.updated_at, now))]));
    lines.push(Line::from(vec![label("URL"), Span::styled(repo.html_url.clone(), Style::default().fg(Color::Cyan))]));

    let webhook = match (&self.webhook, self.webhook_query.error()) {
      (Some(s), _) if s.active => Span::styled("active", Style::default().fg(Color::Green)),
      (Some(_), _) => Span::styled("not installed", Style::default().fg(Color::DarkGray)),
      (None, Some(e)) => Span::styled(format!("unknown ({})", e.kind.title()), Style::default().fg(Color::Red)),
      (None, None) => Span::styled("loading...", Style::default().fg(Color::Yellow)),
    };
    lines.push(Line::from(vec![label("Webhook"), webhook]));

    if let Some(status) = &self.status {
      lines.push(Line::from(Span::styled(status.clone(), Style::default().fg(Color::Yellow))));
    }

    frame.render_widget(
      Paragraph::new(lines).wrap(Wrap { trim: true }).block(block),
      area,
    );
  }

  fn render_pulls(&mut self, frame: &mut Frame, area: Rect) {
    let now = Utc::now();
    let focused = self.focus == Section::PullRequests;
    let (items, error) = match self.bundle.data().map(|b| &b.pull_requests) {
      Some(Ok(pulls)) => (pulls.iter().map(|pr| pull_item(pr, now)).collect(), None),
      Some(Err(e)) => (Vec::new(), Some(e.clone())),
      None => (Vec::new(), None),
    };
    render_section(frame, area, " Pull requests ", items, error, focused, &mut self.pulls_state);
  }

  fn render_commits(&mut self, frame: &mut Frame, area: Rect) {
    let now = Utc::now();
    let focused = self.focus == Section::Commits;
    let (items, error) = match self.bundle.data().map(|b| &b.commits) {
      Some(Ok(commits)) => (commits.iter().map(|c| commit_item(c, now)).collect(), None),
      Some(Err(e)) => (Vec::new(), Some(e.clone())),
      None => (Vec::new(), None),
    };
    render_section(frame, area, " Recent commits ", items, error, focused, &mut self.commits_state);
  }

  fn focused_state(&mut self) -> &mut ListState {
    match self.focus {
      Section::PullRequests => &mut self.pulls_state,
      Section::Commits => &mut self.commits_state,
    }
  }
}

impl View for RepositoryDetailView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('j') | KeyCode::Down => self.focused_state().select_next(),
      KeyCode::Char('k') | KeyCode::Up => self.focused_state().select_previous(),
      KeyCode::Tab => {
        self.focus = match self.focus {
          Section::PullRequests => Section::Commits,
          Section::Commits => Section::PullRequests,
        }
      }
      KeyCode::Char('w') => self.toggle_webhook(),
      KeyCode::Char('r') => {
        self.bundle.refetch();
        self.webhook_query.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [info, lists] = Layout::vertical([Constraint::Length(12), Constraint::Min(0)]).areas(area);
    let [pulls, commits] =
      Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(lists);
    self.render_info(frame, info);
    self.render_pulls(frame, pulls);
    self.render_commits(frame, commits);
  }

  fn breadcrumb_label(&self) -> String {
    self.repo.name.clone()
  }

  fn context(&self) -> Option<String> {
    Some(self.repo.full_name.clone())
  }

  fn tick(&mut self) {
    self.bundle.poll();
    if self.webhook_query.poll() {
      if let Some(status) = self.webhook_query.data() {
        self.webhook = Some(status.clone());
      }
    }
    if let Some(query) = &mut self.toggle {
      if query.poll() {
        self.status = Some(match (query.data(), query.error()) {
          (Some((message, status)), _) => {
            self.webhook = Some(status.clone());
            message.clone()
          }
          (None, Some(e)) => format!("Webhook update failed: {}", e.user_message()),
          (None, None) => "Webhook update interrupted".to_string(),
        });
        self.toggle = None;
      }
    }
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("tab", "switch list").with_priority(20),
      ShortcutInfo::new("w", "webhook").with_priority(30),
      ShortcutInfo::new("r", "reload").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

fn section_error(section: &str, e: &ApiError) -> Line<'static> {
  Line::from(Span::styled(
    format!("{} unavailable: {} ({})", section, e.kind.title(), e.user_message()),
    Style::default().fg(Color::Red),
  ))
}

fn render_section(
  frame: &mut Frame,
  area: Rect,
  title: &'static str,
  items: Vec<ListItem<'static>>,
  error: Option<ApiError>,
  focused: bool,
  state: &mut ListState,
) {
  let border = if focused { Color::Cyan } else { Color::Blue };
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(border));

  if let Some(e) = error {
    let paragraph = Paragraph::new(section_error(title.trim(), &e))
      .wrap(Wrap { trim: true })
      .block(block);
    frame.render_widget(paragraph, area);
    return;
  }
  if items.is_empty() {
    frame.render_widget(
      Paragraph::new("Nothing to show.")
        .style(Style::default().fg(Color::DarkGray))
        .block(block),
      area,
    );
    return;
  }

  ensure_valid_selection(state, items.len());
  let list = List::new(items)
    .block(block)
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("> ");
  frame.render_stateful_widget(list, area, state);
}

fn pull_item(pr: &PullRequest, now: chrono::DateTime<Utc>) -> ListItem<'static> {
  let merged = pr.merged_at.is_some();
  let state = if merged { "merged" } else { pr.state.as_str() };
  ListItem::new(Line::from(vec![
    Span::styled(format!("#{:<5}", pr.number), Style::default().fg(Color::Cyan)),
    Span::styled(format!("{:<7}", state), Style::default().fg(pr_state_color(&pr.state, merged))),
    Span::raw(truncate(&pr.title, 50)),
    Span::styled(
      format!("  {} · {}", pr.user.login, relative_time(pr.created_at, now)),
      Style::default().fg(Color::DarkGray),
    ),
  ]))
}

fn commit_item(commit: &Commit, now: chrono::DateTime<Utc>) -> ListItem<'static> {
  ListItem::new(Line::from(vec![
    Span::styled(format!("{} ", commit.short_sha()), Style::default().fg(Color::Yellow)),
    Span::raw(truncate(commit.headline(), 50)),
    Span::styled(
      format!("  {} · {}", commit.author, relative_time(commit.date, now)),
      Style::default().fg(Color::DarkGray),
    ),
  ]))
}
