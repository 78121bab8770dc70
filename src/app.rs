use crate::auth::{AuthHolder, SessionEvent, SessionExpiryTimer};
use crate::cache::Items;
use crate::domain::kinds::{self, KindInfo};
use crate::domain::{Record, ResourceKind, User};
use crate::event::{Event, EventHandler};
use crate::notice::{Notice, NoticeLevel};
use crate::sync::{Registry, Resource};
use crate::ui;
use color_eyre::Result;
use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::terminal::{
  disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::prelude::*;
use ratatui::widgets::TableState;
use std::io::stdout;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::info;

/// Input mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mode {
  Normal,
  Command,
}

/// Why the browse view closed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrowseExit {
  Quit,
  SessionExpired,
}

/// Browse view state: one resource at a time, rendered from its store.
pub struct App {
  registry: Arc<Registry>,
  resource: Arc<Resource<Record>>,
  /// Store updates, so refetches and deletes redraw without waiting for a tick
  changes: watch::Receiver<Items<Record>>,
  auth: AuthHolder,
  base_url: String,

  mode: Mode,
  command_input: String,
  selected_suggestion: usize,

  table_state: TableState,
  last_notice: Option<Notice>,

  exit: Option<BrowseExit>,
}

impl App {
  pub fn new(
    registry: Arc<Registry>,
    kind: ResourceKind,
    auth: AuthHolder,
    base_url: String,
  ) -> Result<Self> {
    let resource = registry.records(kind)?;
    let changes = resource.store().subscribe();

    Ok(Self {
      registry,
      resource,
      changes,
      auth,
      base_url,
      mode: Mode::Normal,
      command_input: String::new(),
      selected_suggestion: 0,
      table_state: TableState::default(),
      last_notice: None,
      exit: None,
    })
  }

  pub async fn run(&mut self, notices: mpsc::UnboundedReceiver<Notice>) -> Result<BrowseExit> {
    let mut events = EventHandler::new(Duration::from_millis(250));
    events.forward(notices, Event::Notice);

    let (session_tx, session_rx) = mpsc::unbounded_channel();
    let _timer = SessionExpiryTimer::arm(self.auth.clone(), session_tx);
    events.forward(session_rx, Event::Session);

    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    self.load();

    let result = self.event_loop(&mut terminal, &mut events).await;

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    result
  }

  async fn event_loop<B: Backend>(
    &mut self,
    terminal: &mut Terminal<B>,
    events: &mut EventHandler,
  ) -> Result<BrowseExit> {
    loop {
      if let Some(exit) = self.exit {
        return Ok(exit);
      }

      terminal.draw(|frame| ui::draw(frame, self))?;

      tokio::select! {
        event = events.next() => match event {
          Some(event) => self.handle_event(event)?,
          None => return Ok(BrowseExit::Quit),
        },
        // Redraw on the next iteration
        _ = self.changes.changed() => {}
      }
    }
  }

  fn load(&self) {
    let resource = self.resource.clone();
    tokio::spawn(async move {
      resource.list().await;
    });
  }

  fn refetch(&self) {
    let resource = self.resource.clone();
    tokio::spawn(async move {
      resource.refetch().await;
    });
  }

  fn delete_selected(&self) {
    let Some(record) = self.selected_record() else {
      return;
    };
    let resource = self.resource.clone();
    tokio::spawn(async move {
      // Failures arrive as a notice
      let _ = resource.delete(&record.id).await;
    });
  }

  fn handle_event(&mut self, event: Event) -> Result<()> {
    match event {
      Event::Key(key) => self.handle_key(key)?,
      Event::Tick => {}
      Event::Notice(notice) => self.last_notice = Some(notice),
      Event::Session(SessionEvent::Expired) => {
        info!("session expired while browsing");
        self.exit = Some(BrowseExit::SessionExpired);
      }
    }
    Ok(())
  }

  fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
    match self.mode {
      Mode::Normal => self.handle_normal_mode_key(key),
      Mode::Command => return self.handle_command_mode_key(key),
    }
    Ok(())
  }

  fn handle_normal_mode_key(&mut self, key: KeyEvent) {
    match key.code {
      KeyCode::Char('q') => self.exit = Some(BrowseExit::Quit),
      KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
        self.exit = Some(BrowseExit::Quit);
      }

      KeyCode::Up | KeyCode::Char('k') => self.move_selection(-1),
      KeyCode::Down | KeyCode::Char('j') => self.move_selection(1),

      KeyCode::Char('r') => self.refetch(),
      KeyCode::Char('d') => self.delete_selected(),

      KeyCode::Char(':') => {
        self.mode = Mode::Command;
        self.command_input.clear();
      }

      _ => {}
    }
  }

  fn handle_command_mode_key(&mut self, key: KeyEvent) -> Result<()> {
    match key.code {
      KeyCode::Esc => {
        self.mode = Mode::Normal;
        self.command_input.clear();
        self.selected_suggestion = 0;
      }
      KeyCode::Enter => {
        self.execute_command()?;
        self.mode = Mode::Normal;
        self.selected_suggestion = 0;
      }
      KeyCode::Tab | KeyCode::Down => {
        let suggestions = kinds::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = (self.selected_suggestion + 1) % suggestions.len();
        }
      }
      KeyCode::BackTab | KeyCode::Up => {
        let suggestions = kinds::get_suggestions(&self.command_input);
        if !suggestions.is_empty() {
          self.selected_suggestion = if self.selected_suggestion == 0 {
            suggestions.len() - 1
          } else {
            self.selected_suggestion - 1
          };
        }
      }
      KeyCode::Backspace => {
        self.command_input.pop();
        self.selected_suggestion = 0;
      }
      KeyCode::Char(c) => {
        self.command_input.push(c);
        self.selected_suggestion = 0;
      }
      _ => {}
    }
    Ok(())
  }

  fn execute_command(&mut self) -> Result<()> {
    let input = self.command_input.trim().to_lowercase();
    self.command_input.clear();

    // Empty prompt behaves like Esc
    if input.is_empty() {
      return Ok(());
    }

    if input == "quit" || input == "q" {
      self.exit = Some(BrowseExit::Quit);
      return Ok(());
    }

    let suggestions = kinds::get_suggestions(&input);
    let kind = suggestions
      .get(self.selected_suggestion)
      .map(|info| info.kind)
      .or_else(|| kinds::resolve(&input));

    match kind {
      Some(kind) => self.switch_to(kind)?,
      None => {
        self.last_notice = Some(Notice {
          level: NoticeLevel::Error,
          message: format!("Unknown resource: {}", input),
        });
      }
    }
    Ok(())
  }

  fn switch_to(&mut self, kind: ResourceKind) -> Result<()> {
    if kind == self.resource.kind() {
      return Ok(());
    }
    self.resource = self.registry.records(kind)?;
    self.changes = self.resource.store().subscribe();
    self.table_state = TableState::default();
    self.load();
    Ok(())
  }

  fn move_selection(&mut self, delta: i32) {
    let len = self.resource.store().len();
    if len == 0 {
      self.table_state.select(None);
      return;
    }
    let current = self.table_state.selected().unwrap_or(0) as i32;
    let next = (current + delta).rem_euclid(len as i32) as usize;
    self.table_state.select(Some(next));
  }

  fn selected_record(&self) -> Option<Arc<Record>> {
    let items = self.resource.store().items();
    self.table_state.selected().and_then(|i| items.get(i).cloned())
  }

  // Accessors for UI rendering
  pub fn resource(&self) -> &Resource<Record> {
    &self.resource
  }

  pub fn table_state_mut(&mut self) -> &mut TableState {
    &mut self.table_state
  }

  pub fn mode(&self) -> &Mode {
    &self.mode
  }

  pub fn command_input(&self) -> &str {
    &self.command_input
  }

  pub fn autocomplete_suggestions(&self) -> Vec<&'static KindInfo> {
    kinds::get_suggestions(&self.command_input)
  }

  pub fn selected_suggestion(&self) -> usize {
    self.selected_suggestion
  }

  pub fn base_url(&self) -> &str {
    &self.base_url
  }

  pub fn user(&self) -> Option<User> {
    self.auth.user()
  }

  pub fn last_notice(&self) -> Option<&Notice> {
    self.last_notice.as_ref()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::transport::mock::MockTransport;
  use crate::api::ApiClient;
  use crate::cache::NoopStorage;
  use crate::notice::Notifier;
  use crossterm::event::KeyEventKind;

  fn app(kind: ResourceKind) -> App {
    let mock = MockTransport::new();
    let auth = AuthHolder::load(Arc::new(NoopStorage));
    let client = ApiClient::new("http://mock.local", mock, auth.clone()).unwrap();
    let (notifier, _) = Notifier::channel();
    let registry = Arc::new(Registry::new(
      client,
      Arc::new(NoopStorage),
      notifier,
      Duration::from_secs(60),
    ));
    App::new(registry, kind, auth, "http://mock.local".to_string()).unwrap()
  }

  fn press(app: &mut App, code: KeyCode) {
    let key = KeyEvent::new_with_kind(code, KeyModifiers::NONE, KeyEventKind::Press);
    app.handle_event(Event::Key(key)).unwrap();
  }

  fn type_command(app: &mut App, text: &str) {
    press(app, KeyCode::Char(':'));
    for c in text.chars() {
      press(app, KeyCode::Char(c));
    }
    press(app, KeyCode::Enter);
  }

  #[tokio::test]
  async fn test_empty_prompt_keeps_resource() {
    let mut app = app(ResourceKind::Tasks);

    type_command(&mut app, "");

    assert_eq!(app.resource().kind(), ResourceKind::Tasks);
    assert_eq!(*app.mode(), Mode::Normal);
    assert!(app.last_notice().is_none());
  }

  #[tokio::test]
  async fn test_prompt_switches_resource() {
    let mut app = app(ResourceKind::Tasks);

    type_command(&mut app, "mat");

    assert_eq!(app.resource().kind(), ResourceKind::Materials);
  }

  #[tokio::test]
  async fn test_unknown_resource_leaves_notice() {
    let mut app = app(ResourceKind::Tasks);

    type_command(&mut app, "zzz");

    assert_eq!(app.resource().kind(), ResourceKind::Tasks);
    assert_eq!(app.last_notice().map(|n| n.level), Some(NoticeLevel::Error));
  }

  #[tokio::test]
  async fn test_session_expiry_exits() {
    let mut app = app(ResourceKind::Tasks);
    app.handle_event(Event::Session(SessionEvent::Expired)).unwrap();
    assert_eq!(app.exit, Some(BrowseExit::SessionExpired));
  }
}
