use crate::cache::{CurrentSelection, Selection};
use crate::config::Config;
use crate::db::{Database, Preferences};
use crate::event::{Event, EventHandler};
use crate::github::types::User;
use crate::github::{ApiError, CachedDashboardClient, ErrorKind};
use crate::query::{Query, QueryState};
use crate::ui::components::{draw_footer, CommandEvent, CommandInput, KeyResult};
use crate::ui::renderfns::{draw_header, extract_domain};
use crate::ui::view::{View, ViewAction};
use crate::ui::views::{CommentListView, OverviewView, RepositoryListView};
use crate::ui::window::WindowConfig;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use std::io::stdout;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Shared handles every view gets a clone of
#[derive(Clone)]
pub struct AppContext {
  pub client: CachedDashboardClient,
  pub selection: CurrentSelection,
  pub window: WindowConfig,
}

/// How the event loop ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exit {
  Quit,
  LoggedOut,
}

/// Main application state
pub struct App {
  ctx: AppContext,
  db: Database,
  title: String,
  prefs: Preferences,

  /// Navigation stack - root is always at index 0
  views: Vec<Box<dyn View>>,
  command: CommandInput,

  user: Option<User>,
  user_query: Query<User>,
  logout: Option<Query<()>>,

  notice: Option<String>,
  exit: Option<Exit>,
}

impl App {
  pub fn new(config: &Config, db: Database, client: CachedDashboardClient, selection: Selection) -> Result<Self> {
    let prefs = db.preferences()?;
    let user = db.cached_user()?;

    let ctx = AppContext {
      client,
      selection: CurrentSelection::new(selection),
      window: config.window.clone(),
    };

    let client = ctx.client.clone();
    let mut user_query = Query::new(move || {
      let client = client.clone();
      async move { client.current_user().await }
    });
    user_query.fetch();

    let title = config
      .title
      .clone()
      .unwrap_or_else(|| extract_domain(&config.backend_url).to_string());
    let root = RepositoryListView::new(ctx.clone(), prefs.clone());

    Ok(Self {
      ctx,
      db,
      title,
      prefs,
      views: vec![Box::new(root)],
      command: CommandInput::new(),
      user,
      user_query,
      logout: None,
      notice: None,
      exit: None,
    })
  }

  pub async fn run(&mut self) -> Result<Exit> {
    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let result = self.event_loop(&mut terminal).await;

    // Cleanup terminal, even when the loop failed
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop(&mut self, terminal: &mut Terminal<CrosstermBackend<std::io::Stdout>>) -> Result<Exit> {
    let mut events = EventHandler::new(Duration::from_millis(100));

    loop {
      terminal.draw(|frame| self.draw(frame))?;

      match events.next().await {
        Some(Event::Key(key)) => self.handle_key(key),
        Some(Event::Resize(width, height)) => debug!(width, height, "terminal resized"),
        Some(Event::Tick) => self.tick(),
        None => return Ok(Exit::Quit),
      }

      if let Some(exit) = self.exit {
        info!(?exit, "leaving event loop");
        return Ok(exit);
      }
    }
  }

  fn handle_key(&mut self, key: KeyEvent) {
    if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL) {
      self.exit = Some(Exit::Quit);
      return;
    }
    self.notice = None;

    let capturing = self.views.last().is_some_and(|v| v.is_capturing_input());
    if !capturing {
      match self.command.handle_key(key) {
        KeyResult::Handled => return,
        KeyResult::Event(CommandEvent::Run(name)) => return self.run_command(name),
        KeyResult::Event(CommandEvent::Unknown(text)) => {
          self.notice = Some(format!("Unknown command: {}", text));
          return;
        }
        KeyResult::Event(CommandEvent::Cancelled) => return,
        KeyResult::NotHandled => {}
      }
    }

    let action = match self.views.last_mut() {
      Some(view) => view.handle_key(key),
      None => ViewAction::None,
    };
    self.apply(action);
  }

  fn apply(&mut self, action: ViewAction) {
    match action {
      ViewAction::None => {}
      ViewAction::Push(view) => self.views.push(view),
      ViewAction::Pop => {
        if self.views.len() > 1 {
          self.views.pop();
        } else {
          self.exit = Some(Exit::Quit);
        }
      }
      ViewAction::SavePreferences(prefs) => {
        if let Err(e) = self.db.save_preferences(&prefs) {
          warn!(error = %e, "Failed to save preferences");
          self.notice = Some("Could not save preferences".to_string());
        }
        self.prefs = prefs;
      }
    }
  }

  fn run_command(&mut self, name: &str) {
    debug!(command = name, "running command");
    match name {
      "quit" => self.exit = Some(Exit::Quit),
      "logout" => self.start_logout(),
      "comments" => {
        self.views.truncate(1);
        self.views.push(Box::new(CommentListView::new(self.ctx.clone())));
      }
      "overview" => {
        self.views.truncate(1);
        self.views.push(Box::new(OverviewView::new(self.ctx.clone())));
      }
      repos => {
        let filter = if repos == "repos" { "all" } else { repos };
        self.ctx.selection.set_filter(filter);
        self.views = vec![Box::new(RepositoryListView::new(
          self.ctx.clone(),
          self.prefs.clone(),
        ))];
      }
    }
  }

  fn start_logout(&mut self) {
    if self.logout.is_some() {
      return;
    }
    let client = self.ctx.client.clone();
    let mut query = Query::new(move || {
      let client = client.clone();
      async move { client.logout().await }
    });
    query.fetch();
    self.logout = Some(query);
    self.notice = Some("Logging out...".to_string());
  }

  fn finish_logout(&mut self, result: Option<&ApiError>) {
    if let Some(e) = result {
      // The local session goes regardless
      warn!(error = %e, "Backend logout failed");
    }
    if let Err(e) = self.db.clear_session() {
      warn!(error = %e, "Failed to clear stored session");
    }
    self.exit = Some(Exit::LoggedOut);
  }

  fn tick(&mut self) {
    for view in &mut self.views {
      view.tick();
    }

    if self.user_query.poll() {
      match self.user_query.state() {
        QueryState::Success(user) => {
          if let Err(e) = self.db.set_cached_user(user) {
            warn!(error = %e, "Failed to store user");
          }
          self.user = Some(user.clone());
        }
        QueryState::Error(e) if e.kind == ErrorKind::Authentication => {
          self.notice = Some(e.user_message());
        }
        QueryState::Error(e) => warn!(error = %e, "Failed to load current user"),
        _ => {}
      }
    }

    let finished = match &mut self.logout {
      Some(query) => query.poll().then(|| query.error().cloned()),
      None => None,
    };
    if let Some(error) = finished {
      self.logout = None;
      self.finish_logout(error.as_ref());
    }
  }

  fn draw(&mut self, frame: &mut Frame) {
    let [header, body, footer] = Layout::vertical([
      Constraint::Length(1),
      Constraint::Min(1),
      Constraint::Length(1),
    ])
    .areas(frame.area());

    let breadcrumb: Vec<String> = self.views.iter().map(|v| v.breadcrumb_label()).collect();
    let login = self.user.as_ref().map(|u| u.login.as_str());

    if let Some(view) = self.views.last_mut() {
      let context = view.context().unwrap_or_default();
      draw_header(frame, header, &self.title, &context, login, &view.shortcuts());
      view.render(frame, body);
    }
    self.command.render_overlay(frame, body);
    draw_footer(frame, footer, &breadcrumb, self.notice.as_deref());
  }
}
