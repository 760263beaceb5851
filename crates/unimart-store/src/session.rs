use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use unimart_shared::UserId;

use crate::database::Database;
use crate::error::Result;
use crate::models::StoredSession;

impl Database {
    pub fn save_session(&self, session: &StoredSession) -> Result<()> {
        self.conn().execute(
            "INSERT OR REPLACE INTO auth_session (id, user_id, email, refresh_token, saved_at)
             VALUES (1, ?1, ?2, ?3, ?4)",
            params![
                session.user_id.as_str(),
                session.email,
                session.refresh_token,
                session.saved_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    pub fn load_session(&self) -> Result<Option<StoredSession>> {
        let row = self
            .conn()
            .query_row(
                "SELECT user_id, email, refresh_token, saved_at FROM auth_session WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, Option<String>>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()?;

        let Some((user_id, email, refresh_token, saved_at)) = row else {
            return Ok(None);
        };

        let saved_at: DateTime<Utc> =
            DateTime::parse_from_rfc3339(&saved_at)?.with_timezone(&Utc);

        Ok(Some(StoredSession {
            user_id: UserId(user_id),
            email,
            refresh_token,
            saved_at,
        }))
    }

    /// Returns `true` if a session was stored.
    pub fn clear_session(&self) -> Result<bool> {
        let affected = self
            .conn()
            .execute("DELETE FROM auth_session WHERE id = 1", [])?;
        Ok(affected > 0)
    }
}
