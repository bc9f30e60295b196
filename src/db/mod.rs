pub mod models;

use models::{CartItem, CartSummary, Purchase, Session};
use rusqlite::{params, Connection, OptionalExtension, Result};
use std::sync::{Mutex, MutexGuard};

/// On-device state: settings, the signed-in session, the cart, and the
/// purchase cache.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    pub fn new(app_dir: &std::path::Path) -> Result<Self> {
        std::fs::create_dir_all(app_dir).ok();
        let db_path = app_dir.join("learnhub.db");
        Self::from_connection(Connection::open(db_path)?)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        let db = Self {
            conn: Mutex::new(conn),
        };
        db.migrate()?;
        Ok(db)
    }

    fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn migrate(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute_batch(
            "
            PRAGMA journal_mode=WAL;
            PRAGMA foreign_keys=ON;

            CREATE TABLE IF NOT EXISTS settings (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS session (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                user_id TEXT NOT NULL,
                access_token TEXT NOT NULL,
                refresh_token TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS cart_items (
                course_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                price_cents INTEGER NOT NULL CHECK (price_cents >= 0),
                thumbnail TEXT,
                added_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS purchases (
                course_id TEXT PRIMARY KEY,
                payment_intent_id TEXT,
                purchased_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            ",
        )?;
        Ok(())
    }

    // ── Settings ──

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT value FROM settings WHERE key = ?1",
            params![key],
            |row| row.get(0),
        )
        .optional()
    }

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn delete_setting(&self, key: &str) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM settings WHERE key = ?1", params![key])?;
        Ok(())
    }

    // ── Session ──

    pub fn save_session(
        &self,
        user_id: &str,
        access_token: &str,
        refresh_token: Option<&str>,
    ) -> Result<Session> {
        let conn = self.lock();
        conn.execute(
            "INSERT OR REPLACE INTO session (id, user_id, access_token, refresh_token) VALUES (1, ?1, ?2, ?3)",
            params![user_id, access_token, refresh_token],
        )?;
        conn.query_row(
            "SELECT user_id, access_token, refresh_token, created_at FROM session WHERE id = 1",
            [],
            |row| {
                Ok(Session {
                    user_id: row.get(0)?,
                    access_token: row.get(1)?,
                    refresh_token: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
    }

    pub fn load_session(&self) -> Result<Option<Session>> {
        let conn = self.lock();
        conn.query_row(
            "SELECT user_id, access_token, refresh_token, created_at FROM session WHERE id = 1",
            [],
            |row| {
                Ok(Session {
                    user_id: row.get(0)?,
                    access_token: row.get(1)?,
                    refresh_token: row.get(2)?,
                    created_at: row.get(3)?,
                })
            },
        )
        .optional()
    }

    pub fn clear_session(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM session", [])?;
        Ok(())
    }

    // ── Cart ──

    /// Adds a course once; returns `false` if it was already in the cart.
    pub fn add_cart_item(
        &self,
        course_id: &str,
        title: &str,
        price_cents: i64,
        thumbnail: Option<&str>,
    ) -> Result<bool> {
        let conn = self.lock();
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO cart_items (course_id, title, price_cents, thumbnail) VALUES (?1, ?2, ?3, ?4)",
            params![course_id, title, price_cents, thumbnail],
        )?;
        Ok(inserted > 0)
    }

    pub fn remove_cart_item(&self, course_id: &str) -> Result<bool> {
        let conn = self.lock();
        let removed = conn.execute(
            "DELETE FROM cart_items WHERE course_id = ?1",
            params![course_id],
        )?;
        Ok(removed > 0)
    }

    pub fn cart_items(&self) -> Result<Vec<CartItem>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT course_id, title, price_cents, thumbnail, added_at FROM cart_items ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(CartItem {
                course_id: row.get(0)?,
                title: row.get(1)?,
                price_cents: row.get(2)?,
                thumbnail: row.get(3)?,
                added_at: row.get(4)?,
            })
        })?;
        rows.collect()
    }

    pub fn cart_summary(&self) -> Result<CartSummary> {
        let items = self.cart_items()?;
        let total_cents = items.iter().map(|i| i.price_cents).sum();
        Ok(CartSummary { items, total_cents })
    }

    pub fn clear_cart(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM cart_items", [])?;
        Ok(())
    }

    // ── Purchase cache ──

    pub fn record_purchases(&self, course_ids: &[String], payment_intent_id: Option<&str>) -> Result<()> {
        let mut conn = self.lock();
        let tx = conn.transaction()?;
        for course_id in course_ids {
            tx.execute(
                "INSERT OR REPLACE INTO purchases (course_id, payment_intent_id) VALUES (?1, ?2)",
                params![course_id, payment_intent_id],
            )?;
            tx.execute(
                "DELETE FROM cart_items WHERE course_id = ?1",
                params![course_id],
            )?;
        }
        tx.commit()
    }

    pub fn is_purchased(&self, course_id: &str) -> Result<bool> {
        let conn = self.lock();
        let found: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM purchases WHERE course_id = ?1",
                params![course_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }

    pub fn purchases(&self) -> Result<Vec<Purchase>> {
        let conn = self.lock();
        let mut stmt = conn.prepare(
            "SELECT course_id, payment_intent_id, purchased_at FROM purchases ORDER BY purchased_at DESC, course_id ASC",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Purchase {
                course_id: row.get(0)?,
                payment_intent_id: row.get(1)?,
                purchased_at: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    pub fn clear_purchases(&self) -> Result<()> {
        let conn = self.lock();
        conn.execute("DELETE FROM purchases", [])?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_roundtrip() {
        let db = Database::open_in_memory().unwrap();
        assert_eq!(db.get_setting("api_base_url").unwrap(), None);
        db.set_setting("api_base_url", "https://a").unwrap();
        db.set_setting("api_base_url", "https://b").unwrap();
        assert_eq!(db.get_setting("api_base_url").unwrap().as_deref(), Some("https://b"));
        db.delete_setting("api_base_url").unwrap();
        assert_eq!(db.get_setting("api_base_url").unwrap(), None);
    }

    #[test]
    fn test_single_session() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.load_session().unwrap().is_none());
        db.save_session("u1", "t1", Some("r1")).unwrap();
        let s = db.save_session("u2", "t2", None).unwrap();
        assert_eq!(s.user_id, "u2");
        assert_eq!(db.load_session().unwrap().unwrap().access_token, "t2");
        db.clear_session().unwrap();
        assert!(db.load_session().unwrap().is_none());
    }

    #[test]
    fn test_cart_is_idempotent_and_ordered() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.add_cart_item("c2", "Go", 1500, None).unwrap());
        assert!(db.add_cart_item("c1", "Rust", 2999, Some("t.png")).unwrap());
        assert!(!db.add_cart_item("c2", "Go", 1500, None).unwrap());
        let summary = db.cart_summary().unwrap();
        let ids: Vec<&str> = summary.items.iter().map(|i| i.course_id.as_str()).collect();
        assert_eq!(ids, vec!["c2", "c1"]);
        assert_eq!(summary.total_cents, 4499);
        assert!(db.remove_cart_item("c2").unwrap());
        assert!(!db.remove_cart_item("c2").unwrap());
        db.clear_cart().unwrap();
        assert!(db.cart_items().unwrap().is_empty());
    }

    #[test]
    fn test_purchases_leave_cart() {
        let db = Database::open_in_memory().unwrap();
        db.add_cart_item("c1", "Rust", 100, None).unwrap();
        db.add_cart_item("c2", "Go", 100, None).unwrap();
        db.record_purchases(&["c1".to_string()], Some("pi_1")).unwrap();
        assert!(db.is_purchased("c1").unwrap());
        assert!(!db.is_purchased("c2").unwrap());
        assert_eq!(db.cart_items().unwrap().len(), 1);
        assert_eq!(db.purchases().unwrap()[0].payment_intent_id.as_deref(), Some("pi_1"));
    }

    #[test]
    fn test_on_disk_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        {
            let db = Database::new(dir.path()).unwrap();
            db.set_setting("socket_url", "wss://x").unwrap();
        }
        let db = Database::new(dir.path()).unwrap();
        assert_eq!(db.get_setting("socket_url").unwrap().as_deref(), Some("wss://x"));
    }
}
