use tracing::info;
use unimart_store::AppSettings;

use crate::error::Result;
use crate::state::AppState;

pub fn get_settings(state: &AppState) -> Result<AppSettings> {
    state.with_db(|db| db.load_settings())
}

pub fn update_settings(state: &AppState, settings: &AppSettings) -> Result<()> {
    state.with_db(|db| db.save_settings(settings))?;
    info!(theme = %settings.theme, notifications = settings.notifications_enabled, "settings saved");
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use unimart_backend::memory::MemoryBackend;
    use unimart_store::Database;

    use super::*;

    #[test]
    fn settings_survive_reopening() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("unimart.db");
        let open = || {
            AppState::new(
                Arc::new(MemoryBackend::new()),
                Database::open_at(&path).unwrap(),
                Duration::from_millis(20),
            )
        };

        let state = open();
        assert_eq!(get_settings(&state).unwrap(), AppSettings::default());

        let changed = AppSettings {
            notifications_enabled: false,
            theme: "dark".into(),
            last_search: Some("calculus".into()),
        };
        update_settings(&state, &changed).unwrap();
        drop(state);

        assert_eq!(get_settings(&open()).unwrap(), changed);
    }
}
