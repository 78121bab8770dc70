use crate::cache::QueryResult;
use crate::domain::Record;
use crate::notice::{Notice, NoticeLevel};
use ratatui::prelude::*;
use ratatui::widgets::Paragraph;

/// Draw the footer bar with the list query state and the most recent notice
pub fn draw_footer(
  frame: &mut Frame,
  area: Rect,
  state: &QueryResult<Vec<Record>>,
  notice: Option<&Notice>,
) {
  let mut spans = vec![Span::raw(" ")];

  let (text, color) = query_status(state);
  spans.push(Span::styled(text, Style::default().fg(color).bold()));

  if let Some(notice) = notice {
    let color = match notice.level {
      NoticeLevel::Success => Color::Green,
      NoticeLevel::Info => Color::Cyan,
      NoticeLevel::Error => Color::Red,
    };
    spans.push(Span::styled(" │ ", Style::default().fg(Color::DarkGray)));
    spans.push(Span::styled(notice.message.clone(), Style::default().fg(color)));
  }

  let paragraph = Paragraph::new(Line::from(spans)).style(Style::default().bg(Color::Black));

  frame.render_widget(paragraph, area);
}

fn query_status(state: &QueryResult<Vec<Record>>) -> (String, Color) {
  if state.is_loading {
    return ("loading...".to_string(), Color::Yellow);
  }
  if state.is_error {
    let message = state
      .error
      .as_ref()
      .map(|e| e.user_message())
      .unwrap_or("request failed");
    return (format!("error: {}", message), Color::Red);
  }
  match &state.data {
    Some(records) => (format!("{} synced", records.len()), Color::White),
    None => ("not loaded".to_string(), Color::DarkGray),
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::api::ApiError;

  #[test]
  fn test_query_status_text() {
    let mut state: QueryResult<Vec<Record>> = QueryResult::idle();
    assert_eq!(query_status(&state).0, "not loaded");

    state.is_loading = true;
    assert_eq!(query_status(&state).0, "loading...");

    state.is_loading = false;
    state.data = Some(Vec::new());
    assert_eq!(query_status(&state).0, "0 synced");

    state.is_error = true;
    state.error = Some(ApiError::Transport("connection refused".to_string()));
    assert!(query_status(&state).0.starts_with("error:"));
  }
}
