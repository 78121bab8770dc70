mod components;
mod renderfns;
mod views;

use crate::app::{App, Mode};
use ratatui::prelude::*;
use ratatui::widgets::TableState;

/// Main draw function
pub fn draw(frame: &mut Frame, app: &mut App) {
  let chunks = Layout::default()
    .direction(Direction::Vertical)
    .constraints([
      Constraint::Length(1), // Header
      Constraint::Min(1),    // Records
      Constraint::Length(1), // Query state + last notice
    ])
    .split(frame.area());

  let user = app.user();
  renderfns::draw_header(
    frame,
    chunks[0],
    app.base_url(),
    app.resource().kind().name(),
    user.as_ref().map(|u| u.display_name()),
  );

  let resource = app.resource();
  let items = resource.store().items();
  let state = resource.list_state();
  let label = resource.kind().label();
  views::draw_records(frame, chunks[1], label, &items, &state, app.table_state_mut());

  components::draw_footer(frame, chunks[2], &state, app.last_notice());

  if *app.mode() == Mode::Command {
    components::draw_command_overlay(
      frame,
      chunks[1],
      app.command_input(),
      &app.autocomplete_suggestions(),
      app.selected_suggestion(),
    );
  }
}

/// Keep the table selection inside the current row count.
pub fn ensure_valid_selection(state: &mut TableState, len: usize) {
  match state.selected() {
    _ if len == 0 => state.select(None),
    None => state.select(Some(0)),
    Some(i) if i >= len => state.select(Some(len - 1)),
    Some(_) => {}
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_selection_clamped_after_shrink() {
    let mut state = TableState::default();
    state.select(Some(5));
    ensure_valid_selection(&mut state, 3);
    assert_eq!(state.selected(), Some(2));
  }

  #[test]
  fn test_selection_cleared_when_empty() {
    let mut state = TableState::default();
    state.select(Some(0));
    ensure_valid_selection(&mut state, 0);
    assert_eq!(state.selected(), None);
  }

  #[test]
  fn test_selection_starts_at_top() {
    let mut state = TableState::default();
    ensure_valid_selection(&mut state, 4);
    assert_eq!(state.selected(), Some(0));
  }
}
