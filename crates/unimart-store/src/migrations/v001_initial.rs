//! v001 -- Initial schema creation.
//!
//! Creates `favorites`, `auth_session` and `app_settings`.

use rusqlite::Connection;

const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Favorites: one row per (user, product), insertion ordered
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS favorites (
    seq        INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id    TEXT NOT NULL,
    product_id TEXT NOT NULL,
    added_at   TEXT NOT NULL                 -- RFC-3339
);

CREATE UNIQUE INDEX IF NOT EXISTS idx_favorites_user_product
    ON favorites(user_id, product_id);

-- ----------------------------------------------------------------
-- Persisted sign-in session (single row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS auth_session (
    id            INTEGER PRIMARY KEY CHECK (id = 1),
    user_id       TEXT NOT NULL,
    email         TEXT,
    refresh_token TEXT NOT NULL,
    saved_at      TEXT NOT NULL
);

-- ----------------------------------------------------------------
-- App settings (single JSON row)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS app_settings (
    id   INTEGER PRIMARY KEY CHECK (id = 1),
    json TEXT NOT NULL
);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
