//! Records persisted in the local database.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use unimart_shared::UserId;

/// The sign-in session kept on the device so the user stays signed in
/// across restarts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub user_id: UserId,
    pub email: Option<String>,
    pub refresh_token: String,
    pub saved_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub notifications_enabled: bool,
    pub theme: String,
    /// Last feed search, restored when the feed opens.
    pub last_search: Option<String>,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            notifications_enabled: true,
            theme: "light".into(),
            last_search: None,
        }
    }
}
