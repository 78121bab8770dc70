//! Role-based permission check.

use super::types::User;

/// Role that bypasses the permission list.
const ADMIN_ROLE: &str = "admin";

/// Whether `user` may perform `permission` (e.g. `"projects:delete"`).
///
/// Admins may do everything; everyone else needs the permission listed on
/// their role. No user, no permissions.
pub fn has_permission(user: Option<&User>, permission: &str) -> bool {
  let Some(role) = user.and_then(|u| u.role.as_ref()) else {
    return false;
  };

  if role.name().eq_ignore_ascii_case(ADMIN_ROLE) {
    return true;
  }

  role.permissions().iter().any(|p| p == permission)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn user(role: serde_json::Value) -> User {
    serde_json::from_value(json!({"id": "u1", "role": role})).unwrap()
  }

  #[test]
  fn test_admin_can_do_anything() {
    assert!(has_permission(Some(&user(json!("Admin"))), "payrolls:delete"));
  }

  #[test]
  fn test_listed_permission() {
    let engineer = user(json!({"name": "engineer", "permissions": ["tasks:update"]}));
    assert!(has_permission(Some(&engineer), "tasks:update"));
    assert!(!has_permission(Some(&engineer), "tasks:delete"));
  }

  #[test]
  fn test_no_user_or_role() {
    assert!(!has_permission(None, "projects:read"));
    assert!(!has_permission(Some(&User::named("u2", "Guest")), "projects:read"));
  }
}
