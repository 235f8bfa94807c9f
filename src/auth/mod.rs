//! Authentication system
//!
//! Handles admin credential validation and session management.

pub mod credentials;
pub mod session;
pub mod validator;

pub use session::{MemorySessionStore, SESSION_COOKIE, Session, SessionStore};
pub use validator::validate_login;
