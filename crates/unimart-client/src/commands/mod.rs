//! Command handlers, one module per screen.
//!
//! Every command takes the shared [`AppState`](crate::state::AppState),
//! returns a typed result and reports its outcome as a notice.

pub mod auth;
pub mod chat;
pub mod conversations;
pub mod favorites;
pub mod products;
pub mod profile;
pub mod settings;

use crate::error::Result;
use crate::state::AppState;

/// Publish an error notice for a failed command and hand the result back.
pub(crate) fn report_failure<T>(state: &AppState, result: Result<T>, prefix: &str) -> Result<T> {
    if let Err(e) = &result {
        state.notifier().error(e.failure_message(prefix));
    }
    result
}
