use ratatui::prelude::Color;

/// Truncate a string to a maximum number of characters, adding "..." if truncated
pub fn truncate(s: &str, max_len: usize) -> String {
  if s.chars().count() <= max_len {
    s.to_string()
  } else {
    let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
    format!("{}...", kept)
  }
}

/// Get the display color for a record status
pub fn status_color(status: &str) -> Color {
  match status.to_lowercase().replace(|c: char| c == '_' || c == ' ', "-").as_str() {
    "completed" | "done" | "approved" | "delivered" | "paid" | "closed" => Color::Green,
    "in-progress" | "pending" | "active" | "ongoing" | "in-review" => Color::Yellow,
    "rejected" | "cancelled" | "overdue" | "failed" => Color::Red,
    _ => Color::White,
  }
}

#[cfg(test)]
mod tests {
  use super::*;

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
    assert_eq!(truncate("Béton armé coulé", 8), "Béton...");
  }

  #[test]
  fn test_status_color_done() {
    assert_eq!(status_color("completed"), Color::Green);
    assert_eq!(status_color("Approved"), Color::Green);
  }

  #[test]
  fn test_status_color_in_progress() {
    assert_eq!(status_color("in_progress"), Color::Yellow);
    assert_eq!(status_color("In Progress"), Color::Yellow);
    assert_eq!(status_color("pending"), Color::Yellow);
  }

  #[test]
  fn test_status_color_rejected() {
    assert_eq!(status_color("rejected"), Color::Red);
  }

  #[test]
  fn test_status_color_default() {
    assert_eq!(status_color("planned"), Color::White);
  }
}
