//! SQLite-based local storage.
//!
//! Provides persistent storage for:
//! - Local accounts (email + salted password digest)
//! - Notes and habit-log entries, scoped by owning user id
//! - Key-value store for application state (timer engine, companion, session)

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use super::data_dir;
use crate::error::DatabaseError;
use crate::habits::HabitLogEntry;
use crate::notes::{Note, NotePatch};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub email: String,
    /// `pbkdf2-sha256$<rounds>$<hex digest>` of the password salted with `salt`.
    pub password_hash: String,
    pub salt: String,
    pub created_at: DateTime<Utc>,
}

/// SQLite database for local accounts, records and app state.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Open the database at `<data dir>/purrfocus.db`.
    ///
    /// Creates the database file and schema if they don't exist.
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open() -> Result<Self, DatabaseError> {
        let dir = data_dir().map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Self::open_at(&dir.join("purrfocus.db"))
    }

    pub fn open_at(path: &Path) -> Result<Self, DatabaseError> {
        let conn = Connection::open(path).map_err(|source| DatabaseError::OpenFailed {
            path: path.to_path_buf(),
            source,
        })?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    /// Open an in-memory database (for tests).
    pub fn open_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.migrate()
            .map_err(|e| DatabaseError::MigrationFailed(e.to_string()))?;
        Ok(db)
    }

    fn migrate(&self) -> Result<(), rusqlite::Error> {
        self.conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS accounts (
                id            TEXT PRIMARY KEY,
                email         TEXT NOT NULL UNIQUE,
                password_hash TEXT NOT NULL,
                salt          TEXT NOT NULL,
                created_at    TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS notes (
                id         TEXT PRIMARY KEY,
                user_id    TEXT NOT NULL,
                title      TEXT NOT NULL,
                content    TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS habit_logs (
                id                 INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id            TEXT NOT NULL,
                date               TEXT NOT NULL,
                focus_minutes      INTEGER NOT NULL,
                completed_sessions INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS kv (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_notes_user ON notes(user_id, created_at);
            CREATE INDEX IF NOT EXISTS idx_habit_logs_user_date ON habit_logs(user_id, date);",
        )?;
        Ok(())
    }

    // ── Accounts ─────────────────────────────────────────────────────

    pub fn insert_account(&self, account: &Account) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO accounts (id, email, password_hash, salt, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                account.id,
                account.email,
                account.password_hash,
                account.salt,
                account.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, email, password_hash, salt, created_at FROM accounts WHERE email = ?1",
                params![email],
                row_to_account,
            )
            .optional()
    }

    pub fn find_account(&self, id: &str) -> Result<Option<Account>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, email, password_hash, salt, created_at FROM accounts WHERE id = ?1",
                params![id],
                row_to_account,
            )
            .optional()
    }

    // ── Notes ────────────────────────────────────────────────────────

    pub fn insert_note(&self, note: &Note) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO notes (id, user_id, title, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![note.id, note.user_id, note.title, note.content, note.created_at],
        )?;
        Ok(())
    }

    /// Apply `patch` to the note if `user_id` owns it. Returns the updated
    /// note, or `None` when nothing matched.
    pub fn update_note(
        &self,
        user_id: &str,
        id: &str,
        patch: &NotePatch,
    ) -> Result<Option<Note>, rusqlite::Error> {
        let changed = self.conn.execute(
            "UPDATE notes
             SET title = COALESCE(?3, title), content = COALESCE(?4, content)
             WHERE id = ?1 AND user_id = ?2",
            params![id, user_id, patch.title, patch.content],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        self.find_note(user_id, id)
    }

    /// Returns whether a note was deleted.
    pub fn delete_note(&self, user_id: &str, id: &str) -> Result<bool, rusqlite::Error> {
        let changed = self.conn.execute(
            "DELETE FROM notes WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(changed > 0)
    }

    pub fn find_note(&self, user_id: &str, id: &str) -> Result<Option<Note>, rusqlite::Error> {
        self.conn
            .query_row(
                "SELECT id, user_id, title, content, created_at
                 FROM notes WHERE id = ?1 AND user_id = ?2",
                params![id, user_id],
                row_to_note,
            )
            .optional()
    }

    /// Notes owned by `user_id`, oldest first.
    pub fn list_notes(&self, user_id: &str) -> Result<Vec<Note>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT id, user_id, title, content, created_at
             FROM notes WHERE user_id = ?1
             ORDER BY created_at, rowid",
        )?;
        let rows = stmt.query_map(params![user_id], row_to_note)?;
        rows.collect()
    }

    // ── Habit log ────────────────────────────────────────────────────

    pub fn append_habit_log(
        &self,
        user_id: &str,
        entry: &HabitLogEntry,
    ) -> Result<i64, rusqlite::Error> {
        self.conn.execute(
            "INSERT INTO habit_logs (user_id, date, focus_minutes, completed_sessions)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                user_id,
                entry.date,
                entry.focus_minutes,
                entry.completed_sessions
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Raw entries for `user_id` in insertion order. Same-day entries are
    /// not merged.
    pub fn list_habit_logs(&self, user_id: &str) -> Result<Vec<HabitLogEntry>, rusqlite::Error> {
        let mut stmt = self.conn.prepare(
            "SELECT date, focus_minutes, completed_sessions
             FROM habit_logs WHERE user_id = ?1
             ORDER BY id",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(HabitLogEntry {
                date: row.get::<_, NaiveDate>(0)?,
                focus_minutes: row.get(1)?,
                completed_sessions: row.get(2)?,
            })
        })?;
        rows.collect()
    }

    // ── Key-value ────────────────────────────────────────────────────

    /// Get a value from the kv store.
    pub fn kv_get(&self, key: &str) -> Result<Option<String>, rusqlite::Error> {
        self.conn
            .query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
                row.get::<_, String>(0)
            })
            .optional()
    }

    /// Set a value in the kv store.
    pub fn kv_set(&self, key: &str, value: &str) -> Result<(), rusqlite::Error> {
        self.conn.execute(
            "INSERT OR REPLACE INTO kv (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    pub fn kv_delete(&self, key: &str) -> Result<(), rusqlite::Error> {
        self.conn
            .execute("DELETE FROM kv WHERE key = ?1", params![key])?;
        Ok(())
    }
}

fn row_to_account(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        salt: row.get(3)?,
        created_at: row.get(4)?,
    })
}

fn row_to_note(row: &rusqlite::Row<'_>) -> rusqlite::Result<Note> {
    Ok(Note {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        content: row.get(3)?,
        created_at: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notes::NoteDraft;

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn notes_are_scoped_by_owner() {
        let db = Database::open_memory().unwrap();
        let mine = NoteDraft::new("Mine", "a").into_note("alice").unwrap();
        let theirs = NoteDraft::new("Theirs", "b").into_note("bob").unwrap();
        db.insert_note(&mine).unwrap();
        db.insert_note(&theirs).unwrap();

        let listed = db.list_notes("alice").unwrap();
        assert_eq!(listed, vec![mine.clone()]);

        // bob cannot touch alice's note
        let patch = NotePatch {
            title: Some("hijack".into()),
            content: None,
        };
        assert!(db.update_note("bob", &mine.id, &patch).unwrap().is_none());
        assert!(!db.delete_note("bob", &mine.id).unwrap());
        assert_eq!(db.find_note("alice", &mine.id).unwrap().unwrap().title, "Mine");
    }

    #[test]
    fn update_and_delete_note() {
        let db = Database::open_memory().unwrap();
        let note = NoteDraft::new("Title", "body").into_note("alice").unwrap();
        db.insert_note(&note).unwrap();

        let updated = db
            .update_note(
                "alice",
                &note.id,
                &NotePatch {
                    title: None,
                    content: Some("new body".into()),
                },
            )
            .unwrap()
            .unwrap();
        assert_eq!(updated.title, "Title");
        assert_eq!(updated.content, "new body");
        assert_eq!(updated.created_at, note.created_at);

        assert!(db.delete_note("alice", &note.id).unwrap());
        assert!(db.list_notes("alice").unwrap().is_empty());
    }

    #[test]
    fn habit_logs_append_without_merging() {
        let db = Database::open_memory().unwrap();
        let entry = HabitLogEntry::for_session(day("2026-10-19"), 25);
        db.append_habit_log("alice", &entry).unwrap();
        db.append_habit_log("alice", &entry).unwrap();
        db.append_habit_log("bob", &entry).unwrap();

        let logs = db.list_habit_logs("alice").unwrap();
        assert_eq!(logs, vec![entry.clone(), entry]);
    }

    #[test]
    fn accounts_lookup_by_email_and_id() {
        let db = Database::open_memory().unwrap();
        let account = Account {
            id: "id-1".into(),
            email: "a@b.io".into(),
            password_hash: "ff".into(),
            salt: "00".into(),
            created_at: Utc::now(),
        };
        db.insert_account(&account).unwrap();
        assert_eq!(db.find_account_by_email("a@b.io").unwrap(), Some(account.clone()));
        assert_eq!(db.find_account("id-1").unwrap().map(|a| a.email), Some("a@b.io".into()));
        assert!(db.insert_account(&account).is_err());
    }

    #[test]
    fn kv_store() {
        let db = Database::open_memory().unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
        db.kv_set("test", "hello").unwrap();
        assert_eq!(db.kv_get("test").unwrap().unwrap(), "hello");
        db.kv_delete("test").unwrap();
        assert!(db.kv_get("test").unwrap().is_none());
    }

    #[test]
    fn open_at_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("focus.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.kv_set("k", "v").unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.kv_get("k").unwrap().as_deref(), Some("v"));
    }
}
