use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Paragraph};

use crate::app::AppContext;
use crate::cache::CacheResult;
use crate::github::{ApiError, Overview};
use crate::query::Query;
use crate::ui::renderfns::compact_count;
use crate::ui::view::{ShortcutInfo, View, ViewAction};

/// Dashboard statistics, four independently failing panels
pub struct OverviewView {
  query: Query<Overview>,
  reload: Arc<AtomicBool>,
}

impl OverviewView {
  pub fn new(ctx: AppContext) -> Self {
    let client = ctx.client.clone();
    let reload = Arc::new(AtomicBool::new(false));
    let reload_flag = reload.clone();
    let mut query: Query<Overview> = Query::new(move || {
      let client = client.clone();
      let forced = reload_flag.swap(false, Ordering::SeqCst);
      async move {
        if forced {
          Ok(client.reload_overview().await)
        } else {
          Ok(client.overview().await)
        }
      }
    });
    query.fetch();
    Self { query, reload }
  }
}

impl View for OverviewView {
  fn handle_key(&mut self, key: KeyEvent) -> ViewAction {
    match key.code {
      KeyCode::Char('r') => {
        self.reload.store(true, Ordering::SeqCst);
        self.query.refetch();
      }
      KeyCode::Char('q') | KeyCode::Esc => return ViewAction::Pop,
      _ => {}
    }
    ViewAction::None
  }

  fn render(&mut self, frame: &mut Frame, area: Rect) {
    let [top, bottom] = Layout::vertical([Constraint::Length(11), Constraint::Min(0)]).areas(area);
    let [repos, comments] =
      Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(top);
    let [pulls, starred] =
      Layout::horizontal([Constraint::Percentage(50), Constraint::Percentage(50)]).areas(bottom);

    let Some(overview) = self.query.data() else {
      let text = if self.query.is_loading() {
        "Loading overview..."
      } else {
        "Press 'r' to load the overview."
      };
      frame.render_widget(
        Paragraph::new(text)
          .style(Style::default().fg(Color::DarkGray))
          .block(Block::default().borders(Borders::ALL)),
        area,
      );
      return;
    };

    panel(frame, repos, " Repositories ", &overview.repository_stats, |s| {
      vec![
        stat("Total", compact_count(s.total)),
        stat("Public", compact_count(s.public)),
        stat("Private", compact_count(s.private)),
        stat("Forked", compact_count(s.forked)),
        stat("Archived", compact_count(s.archived)),
        stat("Stars", compact_count(s.total_stars)),
        stat("Forks", compact_count(s.total_forks)),
      ]
    });
    panel(frame, comments, " AI comments ", &overview.comment_stats, |s| {
      vec![
        stat("Total", compact_count(s.total_comments)),
        stat("Last 7 days", compact_count(s.recent_comments)),
        stat("Per day", format!("{:.1}", s.average_per_day)),
        stat("Repositories", compact_count(s.repositories_with_comments)),
      ]
    });
    panel(frame, pulls, " Pull requests ", &overview.pull_requests, |s| {
      vec![
        stat("Open", compact_count(s.total_open_prs)),
        stat("Repositories", compact_count(s.repositories)),
      ]
    });
    panel(frame, starred, " Starred ", &overview.starred, |s| {
      vec![
        stat("Starred", compact_count(s.total_starred)),
        Line::from(Span::styled(s.message.clone(), Style::default().fg(Color::DarkGray))),
      ]
    });
  }

  fn breadcrumb_label(&self) -> String {
    "Overview".to_string()
  }

  fn context(&self) -> Option<String> {
    Some("overview".to_string())
  }

  fn tick(&mut self) {
    self.query.poll();
  }

  fn shortcuts(&self) -> Vec<ShortcutInfo> {
    vec![
      ShortcutInfo::new(":", "command").with_priority(10),
      ShortcutInfo::new("r", "refresh").with_priority(40),
      ShortcutInfo::new("q", "back").with_priority(90),
    ]
  }
}

fn stat(label: &str, value: String) -> Line<'static> {
  Line::from(vec![
    Span::styled(format!("{:<14}", label), Style::default().fg(Color::DarkGray)),
    Span::styled(value, Style::default().fg(Color::White).bold()),
  ])
}

fn panel<T>(
  frame: &mut Frame,
  area: Rect,
  title: &'static str,
  result: &Result<CacheResult<T>, ApiError>,
  lines: impl FnOnce(&T) -> Vec<Line<'static>>,
) {
  let block = Block::default()
    .title(title)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  let content = match result {
    Ok(loaded) => {
      let mut content = lines(&loaded.data);
      if loaded.from_cache {
        content.push(Line::from(Span::styled("cached", Style::default().fg(Color::DarkGray))));
      }
      content
    }
    Err(e) => vec![
      Line::from(Span::styled(e.kind.title(), Style::default().fg(Color::Red).bold())),
      Line::from(e.user_message()),
    ],
  };
  frame.render_widget(Paragraph::new(content).block(block), area);
}
