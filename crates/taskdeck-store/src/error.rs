use rusqlite::ffi;
use rusqlite::ErrorCode;
use thiserror::Error;

/// Errors produced by the store layer, identical for both backends.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The database could not be reached, opened, or is locked.
    #[error("Database connection error: {0}")]
    Connection(String),

    /// A unique constraint rejected the write.
    #[error("Duplicate value for {table}.{field}")]
    UniqueViolation { table: String, field: String },

    /// A referenced row (owner, task, tag) does not exist.
    #[error("Referenced record does not exist ({table})")]
    ForeignKeyViolation { table: String },

    /// A query expected exactly one row but found none.
    #[error("Record not found")]
    NotFound,

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),

    /// Anything the translator does not recognise.
    #[error("Database error: {0}")]
    Database(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Map a raw SQLite error onto the store taxonomy.
///
/// `table` is the table the failing statement targeted; SQLite's foreign key
/// messages do not name the relation, so the caller supplies it.
pub fn translate(err: rusqlite::Error, table: &str) -> StoreError {
    match err {
        rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
        rusqlite::Error::SqliteFailure(code, message) => {
            let message = message.unwrap_or_else(|| code.to_string());
            match code.code {
                ErrorCode::CannotOpen
                | ErrorCode::DatabaseBusy
                | ErrorCode::DatabaseLocked
                | ErrorCode::NotADatabase => StoreError::Connection(message),
                ErrorCode::ConstraintViolation => match code.extended_code {
                    ffi::SQLITE_CONSTRAINT_UNIQUE | ffi::SQLITE_CONSTRAINT_PRIMARYKEY => {
                        let field = unique_field(&message).unwrap_or("id").to_string();
                        StoreError::UniqueViolation {
                            table: table.to_string(),
                            field,
                        }
                    }
                    ffi::SQLITE_CONSTRAINT_FOREIGNKEY => StoreError::ForeignKeyViolation {
                        table: table.to_string(),
                    },
                    _ => StoreError::Database(message),
                },
                _ => StoreError::Database(message),
            }
        }
        other => StoreError::Database(other.to_string()),
    }
}

/// Closure form of [`translate`] for `map_err`.
pub(crate) fn sql(table: &'static str) -> impl Fn(rusqlite::Error) -> StoreError {
    move |err| translate(err, table)
}

/// Pull the offending column out of
/// `"UNIQUE constraint failed: tags.user_id, tags.name"`.
///
/// For composite keys the last column is the one a user can change; the
/// leading ones are scoping columns like `user_id`.
fn unique_field(message: &str) -> Option<&str> {
    let columns = message.split("constraint failed:").nth(1)?;
    let last = columns.split(',').last()?.trim();
    let column = last.rsplit('.').next()?.trim();
    (!column.is_empty()).then_some(column)
}
