//! Relational backend.
//!
//! [`SqliteStore`] owns a single [`rusqlite::Connection`] behind a mutex and
//! guarantees that migrations are run before any other operation. Every
//! multi-statement write runs inside a transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use rusqlite::{params, params_from_iter, Connection};

use taskdeck_shared::{Tag, User};

use crate::error::{sql, translate, Result, StoreError};
use crate::migrations;
use crate::record::{get_ts, ts, Record};

const USER_COLUMNS: &str = "id, email, password_hash, name, created_at, updated_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database from a connection URL.
    ///
    /// Accepts `sqlite://path`, `sqlite:path`, a bare filesystem path, or
    /// `:memory:`.
    pub fn open(url: &str, busy_timeout: Duration) -> Result<Self> {
        let target = url
            .strip_prefix("sqlite://")
            .or_else(|| url.strip_prefix("sqlite:"))
            .unwrap_or(url);

        if target == ":memory:" {
            let conn = Connection::open_in_memory().map_err(|e| connection_error(e, target))?;
            return Self::init(conn, busy_timeout);
        }

        Self::open_at(Path::new(target), busy_timeout)
    }

    /// Open (or create) a database at an explicit path.
    pub fn open_at(path: &Path, busy_timeout: Duration) -> Result<Self> {
        tracing::info!(path = %path.display(), "opening database");
        let conn = Connection::open(path).map_err(|e| connection_error(e, &path.display().to_string()))?;

        // Recommended SQLite settings.
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(sql("pragma"))?;

        Self::init(conn, busy_timeout)
    }

    fn init(conn: Connection, busy_timeout: Duration) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")
            .map_err(sql("pragma"))?;
        conn.busy_timeout(busy_timeout).map_err(sql("pragma"))?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Connection("connection mutex poisoned".to_string()))
    }

    pub fn ping(&self) -> Result<()> {
        self.conn()?
            .query_row("SELECT 1", [], |_| Ok(()))
            .map_err(sql("ping"))
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn insert_user(&self, user: &User) -> Result<()> {
        self.conn()?
            .execute(
                "INSERT INTO users (id, email, password_hash, name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id,
                    user.email,
                    user.password_hash,
                    user.name,
                    ts(&user.created_at),
                    ts(&user.updated_at),
                ],
            )
            .map_err(sql("users"))?;
        Ok(())
    }

    pub fn user(&self, id: &str) -> Result<User> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
                params![id],
                row_to_user,
            )
            .map_err(sql("users"))
    }

    pub fn user_by_email(&self, email: &str) -> Result<User> {
        self.conn()?
            .query_row(
                &format!("SELECT {USER_COLUMNS} FROM users WHERE email = ?1"),
                params![email],
                row_to_user,
            )
            .map_err(sql("users"))
    }

    // ------------------------------------------------------------------
    // Owned records
    // ------------------------------------------------------------------

    pub fn insert<E: Record>(&self, record: &E) -> Result<()> {
        let placeholders = (1..=E::COLUMNS.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            E::TABLE,
            E::COLUMNS.join(", "),
            placeholders
        );
        self.conn()?
            .execute(&query, params_from_iter(record.to_row()))
            .map_err(sql(E::TABLE))?;
        Ok(())
    }

    pub fn get<E: Record>(&self, id: &str) -> Result<E> {
        let query = format!(
            "SELECT {} FROM {} WHERE id = ?1",
            E::COLUMNS.join(", "),
            E::TABLE
        );
        self.conn()?
            .query_row(&query, params![id], |row| E::from_row(row))
            .map_err(sql(E::TABLE))
    }

    /// All records of one owner, newest first.
    pub fn list<E: Record>(&self, owner_id: &str) -> Result<Vec<E>> {
        let query = format!(
            "SELECT {} FROM {} WHERE user_id = ?1 ORDER BY created_at DESC, id DESC",
            E::COLUMNS.join(", "),
            E::TABLE
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query).map_err(sql(E::TABLE))?;
        let rows = stmt
            .query_map(params![owner_id], |row| E::from_row(row))
            .map_err(sql(E::TABLE))?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row.map_err(sql(E::TABLE))?);
        }
        Ok(records)
    }

    /// Overwrite every column except `id`.
    pub fn update<E: Record>(&self, record: &E) -> Result<()> {
        let assignments = E::COLUMNS
            .iter()
            .enumerate()
            .skip(1)
            .map(|(i, col)| format!("{col} = ?{}", i + 1))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!("UPDATE {} SET {} WHERE id = ?1", E::TABLE, assignments);
        let affected = self
            .conn()?
            .execute(&query, params_from_iter(record.to_row()))
            .map_err(sql(E::TABLE))?;
        if affected == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    /// Delete a record and its join rows. Returns `true` if a row was deleted.
    pub fn delete<E: Record>(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn()?;
        let tx = conn.transaction().map_err(sql(E::TABLE))?;
        if let Some(column) = E::LINK_COLUMN {
            tx.execute(
                &format!("DELETE FROM task_tags WHERE {column} = ?1"),
                params![id],
            )
            .map_err(sql("task_tags"))?;
        }
        let affected = tx
            .execute(&format!("DELETE FROM {} WHERE id = ?1", E::TABLE), params![id])
            .map_err(sql(E::TABLE))?;
        tx.commit().map_err(sql(E::TABLE))?;
        Ok(affected > 0)
    }

    // ------------------------------------------------------------------
    // Task <-> tag links
    // ------------------------------------------------------------------

    /// Returns `true` if the link is new.
    pub fn attach_tag(&self, task_id: &str, tag_id: &str) -> Result<bool> {
        let affected = self
            .conn()?
            .execute(
                "INSERT OR IGNORE INTO task_tags (task_id, tag_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![task_id, tag_id, ts(&taskdeck_shared::now())],
            )
            .map_err(sql("task_tags"))?;
        Ok(affected > 0)
    }

    pub fn detach_tag(&self, task_id: &str, tag_id: &str) -> Result<bool> {
        let affected = self
            .conn()?
            .execute(
                "DELETE FROM task_tags WHERE task_id = ?1 AND tag_id = ?2",
                params![task_id, tag_id],
            )
            .map_err(sql("task_tags"))?;
        Ok(affected > 0)
    }

    /// Tags attached to a task, ordered by name.
    pub fn tags_for_task(&self, task_id: &str) -> Result<Vec<Tag>> {
        let columns = Tag::COLUMNS
            .iter()
            .map(|c| format!("t.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {columns} FROM tags t
                 JOIN task_tags tt ON tt.tag_id = t.id
                 WHERE tt.task_id = ?1
                 ORDER BY t.name ASC"
            ))
            .map_err(sql("task_tags"))?;
        let rows = stmt
            .query_map(params![task_id], |row| Tag::from_row(row))
            .map_err(sql("task_tags"))?;

        let mut tags = Vec::new();
        for row in rows {
            tags.push(row.map_err(sql("task_tags"))?);
        }
        Ok(tags)
    }
}

/// A failure to open is always a connection problem, whatever SQLite calls it.
fn connection_error(err: rusqlite::Error, target: &str) -> StoreError {
    match translate(err, "connection") {
        StoreError::Connection(msg) | StoreError::Database(msg) => {
            StoreError::Connection(format!("{target}: {msg}"))
        }
        other => other,
    }
}

fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        email: row.get(1)?,
        password_hash: row.get(2)?,
        name: row.get(3)?,
        created_at: get_ts(row, 4)?,
        updated_at: get_ts(row, 5)?,
    })
}
