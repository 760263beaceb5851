//! # unimart-client
//!
//! The UniMart application layer: shared state, user-facing notices and
//! one command module per screen. Front ends (the headless binary, tests)
//! call the commands and render the notices and live query snapshots.

pub mod commands;
pub mod config;
pub mod error;
pub mod events;
pub mod state;

pub use config::{BackendKind, ClientConfig};
pub use error::{ClientError, Result};
pub use events::{Notice, NoticeKind, Notifier};
pub use state::AppState;
