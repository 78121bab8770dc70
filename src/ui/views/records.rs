use crate::cache::{Items, QueryResult};
use crate::domain::Record;
use crate::ui::ensure_valid_selection;
use crate::ui::renderfns::{status_color, truncate};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState};

/// Table over a resource's store.
///
/// Rows come from the store, not the query result, so a persisted snapshot
/// shows up before the first fetch settles.
pub fn draw_records(
  frame: &mut Frame,
  area: Rect,
  label: &str,
  items: &Items<Record>,
  state: &QueryResult<Vec<Record>>,
  table_state: &mut TableState,
) {
  ensure_valid_selection(table_state, items.len());

  let title = if state.is_loading {
    format!(" {} (loading...) ", label)
  } else {
    format!(" {} ({}) ", label, items.len())
  };

  let block = Block::default()
    .title(title)
    .title_alignment(Alignment::Center)
    .borders(Borders::ALL)
    .border_style(Style::default().fg(Color::Blue));

  if items.is_empty() {
    let content = if state.is_loading {
      "Loading..."
    } else if state.is_error {
      "Failed to load. Press 'r' to retry."
    } else {
      "Nothing here yet."
    };
    let paragraph = Paragraph::new(content)
      .block(block)
      .style(Style::default().fg(Color::DarkGray));
    frame.render_widget(paragraph, area);
    return;
  }

  let header = Row::new(["ID", "NAME", "STATUS", "UPDATED"])
    .style(Style::default().fg(Color::DarkGray).bold());

  let rows: Vec<Row> = items
    .iter()
    .map(|record| {
      let status = record.status().unwrap_or("-");
      Row::new(vec![
        Cell::from(truncate(&record.id, 24)).style(Style::default().fg(Color::Cyan)),
        Cell::from(truncate(record.title().unwrap_or("(untitled)"), 48)),
        Cell::from(truncate(status, 14)).style(Style::default().fg(status_color(status))),
        Cell::from(record.updated_at.as_deref().map(short_date).unwrap_or("-")),
      ])
    })
    .collect();

  let table = Table::new(
    rows,
    [
      Constraint::Length(24),
      Constraint::Min(20),
      Constraint::Length(14),
      Constraint::Length(10),
    ],
  )
  .header(header)
  .block(block)
  .row_highlight_style(
    Style::default()
      .bg(Color::DarkGray)
      .add_modifier(Modifier::BOLD),
  )
  .highlight_symbol("> ");

  frame.render_stateful_widget(table, area, table_state);
}

/// Date part of an ISO-8601 timestamp
fn short_date(timestamp: &str) -> &str {
  timestamp.split('T').next().unwrap_or(timestamp)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_short_date() {
    assert_eq!(short_date("2026-03-01T10:00:00.000Z"), "2026-03-01");
    assert_eq!(short_date("2026-03-01"), "2026-03-01");
  }
}
