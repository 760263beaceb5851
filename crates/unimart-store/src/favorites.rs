//! Per-user favorites list.
//!
//! Adding and removing are idempotent: adding a product twice keeps a
//! single entry at its original position, removing an absent product is a
//! no-op.

use chrono::Utc;
use rusqlite::params;
use unimart_shared::{ProductId, UserId};

use crate::database::Database;
use crate::error::Result;

impl Database {
    /// Favorite product ids, oldest first.
    pub fn favorite_ids(&self, user: &UserId) -> Result<Vec<ProductId>> {
        let mut stmt = self.conn().prepare(
            "SELECT product_id FROM favorites
             WHERE user_id = ?1
             ORDER BY seq ASC",
        )?;

        let rows = stmt.query_map(params![user.as_str()], |row| row.get::<_, String>(0))?;

        let mut ids = Vec::new();
        for row in rows {
            ids.push(ProductId(row?));
        }
        Ok(ids)
    }

    pub fn is_favorite(&self, user: &UserId, product: &ProductId) -> Result<bool> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM favorites WHERE user_id = ?1 AND product_id = ?2",
            params![user.as_str(), product.as_str()],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Returns `true` if the product was not a favorite before.
    pub fn add_favorite(&self, user: &UserId, product: &ProductId) -> Result<bool> {
        let affected = self.conn().execute(
            "INSERT OR IGNORE INTO favorites (user_id, product_id, added_at)
             VALUES (?1, ?2, ?3)",
            params![user.as_str(), product.as_str(), Utc::now().to_rfc3339()],
        )?;
        Ok(affected > 0)
    }

    /// Returns `true` if the product was a favorite before.
    pub fn remove_favorite(&self, user: &UserId, product: &ProductId) -> Result<bool> {
        let affected = self.conn().execute(
            "DELETE FROM favorites WHERE user_id = ?1 AND product_id = ?2",
            params![user.as_str(), product.as_str()],
        )?;
        Ok(affected > 0)
    }

    /// Flip the favorite state and return the new one.
    pub fn toggle_favorite(&self, user: &UserId, product: &ProductId) -> Result<bool> {
        if self.remove_favorite(user, product)? {
            Ok(false)
        } else {
            self.add_favorite(user, product)?;
            Ok(true)
        }
    }

    /// Drop every favorite of `user` that is not in `keep`. Returns how many
    /// entries were removed.
    pub fn prune_favorites(&self, user: &UserId, keep: &[ProductId]) -> Result<usize> {
        let mut removed = 0;
        for id in self.favorite_ids(user)? {
            if !keep.contains(&id) && self.remove_favorite(user, &id)? {
                removed += 1;
            }
        }
        if removed > 0 {
            tracing::debug!(user = %user, removed, "pruned stale favorites");
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[&str]) -> Vec<ProductId> {
        raw.iter().map(|s| ProductId::from(*s)).collect()
    }

    #[test]
    fn add_is_idempotent_and_keeps_order() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::from("u1");

        assert!(db.add_favorite(&user, &"p1".into()).unwrap());
        assert!(db.add_favorite(&user, &"p2".into()).unwrap());
        assert!(!db.add_favorite(&user, &"p1".into()).unwrap());
        assert!(!db.add_favorite(&user, &"p1".into()).unwrap());

        assert_eq!(db.favorite_ids(&user).unwrap(), ids(&["p1", "p2"]));
    }

    #[test]
    fn remove_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::from("u1");
        db.add_favorite(&user, &"p1".into()).unwrap();

        assert!(db.remove_favorite(&user, &"p1".into()).unwrap());
        assert!(!db.remove_favorite(&user, &"p1".into()).unwrap());
        assert!(!db.remove_favorite(&user, &"never".into()).unwrap());
        assert!(db.favorite_ids(&user).unwrap().is_empty());
    }

    #[test]
    fn toggle_flips_state() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::from("u1");
        let p = ProductId::from("p1");

        assert!(db.toggle_favorite(&user, &p).unwrap());
        assert!(db.is_favorite(&user, &p).unwrap());
        assert!(!db.toggle_favorite(&user, &p).unwrap());
        assert!(!db.is_favorite(&user, &p).unwrap());
    }

    #[test]
    fn lists_are_per_user() {
        let db = Database::open_in_memory().unwrap();
        db.add_favorite(&"a".into(), &"p1".into()).unwrap();
        db.add_favorite(&"b".into(), &"p2".into()).unwrap();

        assert_eq!(db.favorite_ids(&"a".into()).unwrap(), ids(&["p1"]));
        assert_eq!(db.favorite_ids(&"b".into()).unwrap(), ids(&["p2"]));
    }

    #[test]
    fn prune_drops_missing_products() {
        let db = Database::open_in_memory().unwrap();
        let user = UserId::from("u1");
        for p in ["p1", "p2", "p3"] {
            db.add_favorite(&user, &p.into()).unwrap();
        }

        let removed = db.prune_favorites(&user, &ids(&["p3", "p1"])).unwrap();
        assert_eq!(removed, 1);
        assert_eq!(db.favorite_ids(&user).unwrap(), ids(&["p1", "p3"]));
    }

    #[test]
    fn favorites_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fav.db");
        let user = UserId::from("u1");

        {
            let db = Database::open_at(&path).unwrap();
            db.add_favorite(&user, &"p1".into()).unwrap();
        }

        let db = Database::open_at(&path).unwrap();
        assert!(db.is_favorite(&user, &"p1".into()).unwrap());
    }
}
