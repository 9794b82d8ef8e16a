//! The storage capability handed to the rest of the application.

use std::sync::Arc;
use std::time::Duration;

use taskdeck_shared::{Tag, User};

use crate::error::Result;
use crate::memory::MemoryStore;
use crate::record::Record;
use crate::sqlite::SqliteStore;

/// One of the two interchangeable backends. Cloning is cheap.
#[derive(Clone)]
pub enum Store {
    Memory(Arc<MemoryStore>),
    Sqlite(Arc<SqliteStore>),
}

macro_rules! dispatch {
    ($self:ident, $backend:ident => $call:expr) => {
        match $self {
            Store::Memory($backend) => $call,
            Store::Sqlite($backend) => $call,
        }
    };
}

impl Store {
    pub fn memory() -> Self {
        Store::Memory(Arc::new(MemoryStore::new()))
    }

    pub fn sqlite(url: &str, busy_timeout: Duration) -> Result<Self> {
        Ok(Store::Sqlite(Arc::new(SqliteStore::open(url, busy_timeout)?)))
    }

    pub fn backend_name(&self) -> &'static str {
        match self {
            Store::Memory(_) => "memory",
            Store::Sqlite(_) => "sqlite",
        }
    }

    /// Cheap liveness check for health endpoints.
    pub fn ping(&self) -> Result<()> {
        match self {
            Store::Memory(_) => Ok(()),
            Store::Sqlite(s) => s.ping(),
        }
    }

    pub fn insert_user(&self, user: &User) -> Result<()> {
        dispatch!(self, s => s.insert_user(user))
    }

    pub fn user(&self, id: &str) -> Result<User> {
        dispatch!(self, s => s.user(id))
    }

    pub fn user_by_email(&self, email: &str) -> Result<User> {
        dispatch!(self, s => s.user_by_email(email))
    }

    pub fn insert<E: Record>(&self, record: &E) -> Result<()> {
        dispatch!(self, s => s.insert(record))
    }

    pub fn get<E: Record>(&self, id: &str) -> Result<E> {
        dispatch!(self, s => s.get::<E>(id))
    }

    pub fn list<E: Record>(&self, owner_id: &str) -> Result<Vec<E>> {
        dispatch!(self, s => s.list::<E>(owner_id))
    }

    pub fn update<E: Record>(&self, record: &E) -> Result<()> {
        dispatch!(self, s => s.update(record))
    }

    pub fn delete<E: Record>(&self, id: &str) -> Result<bool> {
        dispatch!(self, s => s.delete::<E>(id))
    }

    pub fn attach_tag(&self, task_id: &str, tag_id: &str) -> Result<bool> {
        dispatch!(self, s => s.attach_tag(task_id, tag_id))
    }

    pub fn detach_tag(&self, task_id: &str, tag_id: &str) -> Result<bool> {
        dispatch!(self, s => s.detach_tag(task_id, tag_id))
    }

    pub fn tags_for_task(&self, task_id: &str) -> Result<Vec<Tag>> {
        dispatch!(self, s => s.tags_for_task(task_id))
    }
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Store").field(&self.backend_name()).finish()
    }
}
