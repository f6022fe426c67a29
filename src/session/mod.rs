//! Session persistence
//!
//! A session is identified by `(app_name, user_id, session_id)` and owns a
//! state map plus an append-only event log. The runtime only talks to the
//! narrow [`SessionStore`] trait; two backends ship with the crate:
//!
//! ```text
//! ┌─────────────────────┐
//! │       Runner        │
//! └──────────┬──────────┘
//!            │
//! ┌──────────▼──────────┐
//! │    SessionStore     │  <-- Trait
//! │      (async)        │
//! └──────────┬──────────┘
//!            │
//!     ┌──────┴──────┐
//!     │             │
//! ┌───▼────┐   ┌────▼───┐
//! │ Memory │   │  File  │
//! └────────┘   └────────┘
//! ```

pub mod errors;
pub mod file_store;
pub mod memory;
pub mod models;
pub mod store;

pub use errors::{SessionError, SessionResult};
pub use file_store::FileSessionStore;
pub use memory::InMemorySessionStore;
pub use models::{Session, SessionKey, StateMap};
pub use store::SessionStore;
