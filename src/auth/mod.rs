//! Authentication: session holder, auth endpoints and session expiry.

mod expiry;
mod service;
mod session;

pub use expiry::{check_session, SessionEvent, SessionExpiryTimer, SessionStatus};
pub use service::{AuthService, Registration};
pub use session::AuthHolder;
#[cfg(test)]
pub use session::Session;
