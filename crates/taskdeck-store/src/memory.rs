//! In-memory backend for development and tests.
//!
//! Records live in typed per-entity maps behind a single `RwLock`. The
//! backend raises the same [`StoreError`] variants as SQLite for duplicate
//! unique values and dangling references, so callers cannot tell the two
//! apart. Nothing survives a restart.

use std::any::{Any, TypeId};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use taskdeck_shared::{Tag, Task, User};

use crate::error::{Result, StoreError};
use crate::record::Record;

type Table<E> = BTreeMap<String, E>;

#[derive(Default)]
struct Tables {
    users: BTreeMap<String, User>,
    records: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    /// `(task_id, tag_id)` pairs.
    task_tags: BTreeSet<(String, String)>,
}

impl Tables {
    fn table<E: Record>(&self) -> Option<&Table<E>> {
        self.records
            .get(&TypeId::of::<E>())
            .and_then(|t| (**t).downcast_ref::<Table<E>>())
    }

    fn table_mut<E: Record>(&mut self) -> Result<&mut Table<E>> {
        self.records
            .entry(TypeId::of::<E>())
            .or_insert_with(|| Box::new(Table::<E>::new()) as Box<dyn Any + Send + Sync>)
            .downcast_mut::<Table<E>>()
            .ok_or_else(|| StoreError::Database(format!("table {} has the wrong type", E::TABLE)))
    }

    fn contains<E: Record>(&self, id: &str) -> bool {
        self.table::<E>().is_some_and(|t| t.contains_key(id))
    }

    /// Reject `record` if another record of the same owner already holds its
    /// unique value.
    fn check_unique<E: Record>(&self, record: &E) -> Result<()> {
        let Some((field, value)) = record.unique_key() else {
            return Ok(());
        };
        let Some(table) = self.table::<E>() else {
            return Ok(());
        };
        let clash = table.values().any(|other| {
            other.id() != record.id()
                && other.owner_id() == record.owner_id()
                && other.unique_key().is_some_and(|(_, v)| v == value)
        });
        if clash {
            return Err(StoreError::UniqueViolation {
                table: E::TABLE.to_string(),
                field: field.to_string(),
            });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>> {
        self.tables
            .read()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>> {
        self.tables
            .write()
            .map_err(|_| StoreError::Database("memory store lock poisoned".to_string()))
    }

    // ------------------------------------------------------------------
    // Users
    // ------------------------------------------------------------------

    pub fn insert_user(&self, user: &User) -> Result<()> {
        let mut tables = self.write()?;
        let duplicate = |field: &str| StoreError::UniqueViolation {
            table: "users".to_string(),
            field: field.to_string(),
        };
        if tables.users.contains_key(&user.id) {
            return Err(duplicate("id"));
        }
        if tables.users.values().any(|u| u.email == user.email) {
            return Err(duplicate("email"));
        }
        tables.users.insert(user.id.clone(), user.clone());
        Ok(())
    }

    pub fn user(&self, id: &str) -> Result<User> {
        self.read()?
            .users
            .get(id)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    pub fn user_by_email(&self, email: &str) -> Result<User> {
        self.read()?
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    // ------------------------------------------------------------------
    // Owned records
    // ------------------------------------------------------------------

    pub fn insert<E: Record>(&self, record: &E) -> Result<()> {
        let mut tables = self.write()?;
        if !tables.users.contains_key(record.owner_id()) {
            return Err(StoreError::ForeignKeyViolation {
                table: E::TABLE.to_string(),
            });
        }
        if tables.contains::<E>(record.id()) {
            return Err(StoreError::UniqueViolation {
                table: E::TABLE.to_string(),
                field: "id".to_string(),
            });
        }
        tables.check_unique(record)?;
        tables
            .table_mut::<E>()?
            .insert(record.id().to_string(), record.clone());
        Ok(())
    }

    pub fn get<E: Record>(&self, id: &str) -> Result<E> {
        self.read()?
            .table::<E>()
            .and_then(|t| t.get(id))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    /// All records of one owner, newest first.
    pub fn list<E: Record>(&self, owner_id: &str) -> Result<Vec<E>> {
        let tables = self.read()?;
        let mut records: Vec<E> = tables
            .table::<E>()
            .map(|t| {
                t.values()
                    .filter(|r| r.owner_id() == owner_id)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        records.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().cmp(a.id()))
        });
        Ok(records)
    }

    pub fn update<E: Record>(&self, record: &E) -> Result<()> {
        let mut tables = self.write()?;
        if !tables.contains::<E>(record.id()) {
            return Err(StoreError::NotFound);
        }
        tables.check_unique(record)?;
        tables
            .table_mut::<E>()?
            .insert(record.id().to_string(), record.clone());
        Ok(())
    }

    /// Delete a record and its join rows. Returns `true` if a row was deleted.
    pub fn delete<E: Record>(&self, id: &str) -> Result<bool> {
        let mut tables = self.write()?;
        let removed = tables.table_mut::<E>()?.remove(id).is_some();
        match E::LINK_COLUMN {
            Some("task_id") => tables.task_tags.retain(|(task, _)| task != id),
            Some("tag_id") => tables.task_tags.retain(|(_, tag)| tag != id),
            _ => {}
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------
    // Task <-> tag links
    // ------------------------------------------------------------------

    /// Returns `true` if the link is new.
    pub fn attach_tag(&self, task_id: &str, tag_id: &str) -> Result<bool> {
        let mut tables = self.write()?;
        if !tables.contains::<Task>(task_id) || !tables.contains::<Tag>(tag_id) {
            return Err(StoreError::ForeignKeyViolation {
                table: "task_tags".to_string(),
            });
        }
        Ok(tables
            .task_tags
            .insert((task_id.to_string(), tag_id.to_string())))
    }

    pub fn detach_tag(&self, task_id: &str, tag_id: &str) -> Result<bool> {
        Ok(self
            .write()?
            .task_tags
            .remove(&(task_id.to_string(), tag_id.to_string())))
    }

    /// Tags attached to a task, ordered by name.
    pub fn tags_for_task(&self, task_id: &str) -> Result<Vec<Tag>> {
        let tables = self.read()?;
        let Some(tags) = tables.table::<Tag>() else {
            return Ok(Vec::new());
        };
        let mut attached: Vec<Tag> = tables
            .task_tags
            .iter()
            .filter(|(task, _)| task == task_id)
            .filter_map(|(_, tag)| tags.get(tag).cloned())
            .collect();
        attached.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(attached)
    }
}
