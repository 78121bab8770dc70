use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::cache::Entity;

/// Fields tried, in order, for a human-readable record title.
const TITLE_FIELDS: &[&str] = &["name", "title", "fullName", "label", "subject", "description"];

/// Any backend record: an id, optional timestamps and whatever else the
/// server sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
  #[serde(alias = "_id")]
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<String>,
  #[serde(flatten)]
  pub fields: Map<String, Value>,
}

impl Record {
  #[cfg(test)]
  pub fn from_value(value: Value) -> serde_json::Result<Self> {
    serde_json::from_value(value)
  }

  pub fn title(&self) -> Option<&str> {
    TITLE_FIELDS
      .iter()
      .find_map(|f| self.fields.get(*f).and_then(Value::as_str))
  }

  pub fn status(&self) -> Option<&str> {
    self.fields.get("status").and_then(Value::as_str)
  }
}

impl Entity for Record {
  fn id(&self) -> &str {
    &self.id
  }

  fn updated_at(&self) -> Option<&str> {
    self.updated_at.as_deref()
  }
}

/// A role as sent by the backend: either a bare name or a full object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RoleRef {
  Name(String),
  Detailed(Role),
}

impl RoleRef {
  pub fn name(&self) -> &str {
    match self {
      RoleRef::Name(name) => name,
      RoleRef::Detailed(role) => &role.name,
    }
  }

  pub fn permissions(&self) -> &[String] {
    match self {
      RoleRef::Name(_) => &[],
      RoleRef::Detailed(role) => &role.permissions,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Role {
  #[serde(default, alias = "_id", skip_serializing_if = "Option::is_none")]
  pub id: Option<String>,
  pub name: String,
  #[serde(default)]
  pub permissions: Vec<String>,
}

/// Authenticated user, without the bearer token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
  #[serde(alias = "_id")]
  pub id: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub email: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub role: Option<RoleRef>,
  #[serde(flatten)]
  pub extra: Map<String, Value>,
}

impl User {
  #[cfg(test)]
  pub fn named(id: &str, name: &str) -> Self {
    Self {
      id: id.to_string(),
      name: Some(name.to_string()),
      email: None,
      role: None,
      extra: Map::new(),
    }
  }

  pub fn display_name(&self) -> &str {
    self
      .name
      .as_deref()
      .or(self.email.as_deref())
      .unwrap_or(&self.id)
  }
}

impl Entity for User {
  fn id(&self) -> &str {
    &self.id
  }
}
