//! Persistence metadata for each [`Entity`].
//!
//! A [`Record`] tells the backends which table it lives in, how to turn
//! itself into a row and back, and which of its fields must be unique per
//! owner. The generic CRUD code in both backends is written against this
//! trait only.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::{Type, Value};
use rusqlite::Row;

use taskdeck_shared::{Entity, Meeting, Note, Project, Tag, Task};

pub trait Record: Entity {
    const TABLE: &'static str;

    /// Column names in `to_row` / `from_row` order. `id` comes first.
    const COLUMNS: &'static [&'static str];

    /// Column of the `task_tags` join table that points at this record,
    /// cleared when the record is deleted.
    const LINK_COLUMN: Option<&'static str> = None;

    fn to_row(&self) -> Vec<Value>;

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self>;

    /// `(field, value)` that must be unique among one owner's records.
    fn unique_key(&self) -> Option<(&'static str, String)> {
        None
    }
}

// ---------------------------------------------------------------------------
// Encoding helpers
// ---------------------------------------------------------------------------

/// Fixed-width UTC text so that `ORDER BY` on the column sorts chronologically.
pub(crate) fn ts(dt: &DateTime<Utc>) -> Value {
    Value::Text(dt.to_rfc3339_opts(SecondsFormat::Micros, true))
}

fn opt_ts(dt: &Option<DateTime<Utc>>) -> Value {
    dt.as_ref().map(ts).unwrap_or(Value::Null)
}

fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

fn opt_text(s: &Option<String>) -> Value {
    s.as_deref().map(text).unwrap_or(Value::Null)
}

fn conversion<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

pub(crate) fn get_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion(idx, e))
}

fn get_opt_ts(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|s| {
        DateTime::parse_from_rfc3339(&s)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| conversion(idx, e))
    })
    .transpose()
}

fn get_enum<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e| conversion(idx, e))
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

impl Record for Task {
    const TABLE: &'static str = "tasks";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "status",
        "priority",
        "due_date",
        "project_id",
        "user_id",
        "created_at",
        "updated_at",
    ];
    const LINK_COLUMN: Option<&'static str> = Some("task_id");

    fn to_row(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.title),
            opt_text(&self.description),
            text(self.status.as_str()),
            text(self.priority.as_str()),
            opt_ts(&self.due_date),
            opt_text(&self.project_id),
            text(&self.user_id),
            ts(&self.created_at),
            ts(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Task {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            status: get_enum(row, 3)?,
            priority: get_enum(row, 4)?,
            due_date: get_opt_ts(row, 5)?,
            project_id: row.get(6)?,
            user_id: row.get(7)?,
            created_at: get_ts(row, 8)?,
            updated_at: get_ts(row, 9)?,
        })
    }
}

impl Record for Project {
    const TABLE: &'static str = "projects";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "status",
        "user_id",
        "created_at",
        "updated_at",
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.title),
            opt_text(&self.description),
            text(self.status.as_str()),
            text(&self.user_id),
            ts(&self.created_at),
            ts(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Project {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            status: get_enum(row, 3)?,
            user_id: row.get(4)?,
            created_at: get_ts(row, 5)?,
            updated_at: get_ts(row, 6)?,
        })
    }
}

impl Record for Meeting {
    const TABLE: &'static str = "meetings";
    const COLUMNS: &'static [&'static str] = &[
        "id",
        "title",
        "description",
        "start_time",
        "end_time",
        "user_id",
        "created_at",
        "updated_at",
    ];

    fn to_row(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.title),
            opt_text(&self.description),
            ts(&self.start_time),
            ts(&self.end_time),
            text(&self.user_id),
            ts(&self.created_at),
            ts(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let start_time = get_ts(row, 3)?;
        let end_time = get_ts(row, 4)?;
        Ok(Meeting {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            start_time,
            end_time,
            duration_minutes: Meeting::duration_between(start_time, end_time),
            user_id: row.get(5)?,
            created_at: get_ts(row, 6)?,
            updated_at: get_ts(row, 7)?,
        })
    }
}

impl Record for Note {
    const TABLE: &'static str = "notes";
    const COLUMNS: &'static [&'static str] =
        &["id", "title", "content", "user_id", "created_at", "updated_at"];

    fn to_row(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.title),
            text(&self.content),
            text(&self.user_id),
            ts(&self.created_at),
            ts(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Note {
            id: row.get(0)?,
            title: row.get(1)?,
            content: row.get(2)?,
            user_id: row.get(3)?,
            created_at: get_ts(row, 4)?,
            updated_at: get_ts(row, 5)?,
        })
    }
}

impl Record for Tag {
    const TABLE: &'static str = "tags";
    const COLUMNS: &'static [&'static str] =
        &["id", "name", "color", "user_id", "created_at", "updated_at"];
    const LINK_COLUMN: Option<&'static str> = Some("tag_id");

    fn to_row(&self) -> Vec<Value> {
        vec![
            text(&self.id),
            text(&self.name),
            text(&self.color),
            text(&self.user_id),
            ts(&self.created_at),
            ts(&self.updated_at),
        ]
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Tag {
            id: row.get(0)?,
            name: row.get(1)?,
            color: row.get(2)?,
            user_id: row.get(3)?,
            created_at: get_ts(row, 4)?,
            updated_at: get_ts(row, 5)?,
        })
    }

    fn unique_key(&self) -> Option<(&'static str, String)> {
        Some(("name", self.name.clone()))
    }
}
