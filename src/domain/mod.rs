//! Construction-dashboard domain: resource kinds, records, users, permissions.

pub mod kinds;
pub mod permissions;
mod types;

pub use kinds::ResourceKind;
pub use types::{Record, User};
