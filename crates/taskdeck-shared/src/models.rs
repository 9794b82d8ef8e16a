//! Domain records and the [`Entity`] trait that lets one set of generic CRUD
//! functions serve every user-owned record type.

use chrono::{DateTime, Duration, SubsecRound, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::ValidationErrors;
use crate::requests::*;
use crate::types::{Priority, ProjectStatus, TaskStatus};
use crate::validate::Validate;

/// Current time at the microsecond precision both backends store.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// The next `updatedAt` value: now, or one microsecond past `previous` if the
/// clock has not moved forward since the last write.
pub fn next_timestamp(previous: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if now > previous {
        now
    } else {
        previous + Duration::microseconds(1)
    }
}

/// A record that belongs to exactly one user.
pub trait Entity: Clone + Serialize + Send + Sync + 'static {
    /// Human-readable name used in error messages, e.g. `"Task"`.
    const LABEL: &'static str;

    type CreateRequest: DeserializeOwned + Validate<Output = Self::Draft> + Send;
    type UpdateRequest: DeserializeOwned + Validate<Output = Self::Changes> + Send;
    type Draft: Send + 'static;
    type Changes: Send + 'static;

    fn id(&self) -> &str;
    fn owner_id(&self) -> &str;
    fn created_at(&self) -> DateTime<Utc>;
    fn updated_at(&self) -> DateTime<Utc>;

    /// Build a fresh record from validated input.
    fn create(id: String, owner_id: String, draft: Self::Draft, now: DateTime<Utc>) -> Self;

    /// Merge validated changes. Fails only when the merged record would break
    /// a cross-field invariant.
    fn apply(&mut self, changes: Self::Changes) -> Result<(), ValidationErrors>;

    fn touch(&mut self, now: DateTime<Utc>);
}

macro_rules! owned_accessors {
    () => {
        fn id(&self) -> &str {
            &self.id
        }

        fn owner_id(&self) -> &str {
            &self.user_id
        }

        fn created_at(&self) -> DateTime<Utc> {
            self.created_at
        }

        fn updated_at(&self) -> DateTime<Utc> {
            self.updated_at
        }

        fn touch(&mut self, now: DateTime<Utc>) {
            self.updated_at = next_timestamp(self.updated_at, now);
        }
    };
}

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// An account. The password hash never leaves the server.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Task
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    /// Not a foreign key: deleting the project leaves this dangling.
    pub project_id: Option<String>,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn matches(&self, filter: &TaskFilter) -> bool {
        if filter.status.is_some_and(|s| s != self.status) {
            return false;
        }
        if filter.priority.is_some_and(|p| p != self.priority) {
            return false;
        }
        if let Some(project) = &filter.project_id {
            if self.project_id.as_ref() != Some(project) {
                return false;
            }
        }
        if let Some(needle) = &filter.search {
            let in_title = self.title.to_lowercase().contains(needle);
            let in_description = self
                .description
                .as_ref()
                .is_some_and(|d| d.to_lowercase().contains(needle));
            if !in_title && !in_description {
                return false;
            }
        }
        true
    }
}

impl Entity for Task {
    const LABEL: &'static str = "Task";

    type CreateRequest = CreateTaskRequest;
    type UpdateRequest = UpdateTaskRequest;
    type Draft = TaskDraft;
    type Changes = TaskChanges;

    owned_accessors!();

    fn create(id: String, owner_id: String, draft: TaskDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            status: draft.status,
            priority: draft.priority,
            due_date: draft.due_date,
            project_id: draft.project_id,
            user_id: owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: TaskChanges) -> Result<(), ValidationErrors> {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        if let Some(priority) = changes.priority {
            self.priority = priority;
        }
        if let Some(due_date) = changes.due_date {
            self.due_date = due_date;
        }
        if let Some(project_id) = changes.project_id {
            self.project_id = project_id;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Project
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Project {
    const LABEL: &'static str = "Project";

    type CreateRequest = CreateProjectRequest;
    type UpdateRequest = UpdateProjectRequest;
    type Draft = ProjectDraft;
    type Changes = ProjectChanges;

    owned_accessors!();

    fn create(id: String, owner_id: String, draft: ProjectDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            status: draft.status,
            user_id: owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: ProjectChanges) -> Result<(), ValidationErrors> {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        if let Some(status) = changes.status {
            self.status = status;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Meeting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    /// Derived from the window, never persisted.
    pub duration_minutes: i64,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Meeting {
    pub fn duration_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
        (end - start).num_minutes()
    }
}

impl Entity for Meeting {
    const LABEL: &'static str = "Meeting";

    type CreateRequest = CreateMeetingRequest;
    type UpdateRequest = UpdateMeetingRequest;
    type Draft = MeetingDraft;
    type Changes = MeetingChanges;

    owned_accessors!();

    fn create(id: String, owner_id: String, draft: MeetingDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            description: draft.description,
            start_time: draft.start_time,
            end_time: draft.end_time,
            duration_minutes: Meeting::duration_between(draft.start_time, draft.end_time),
            user_id: owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: MeetingChanges) -> Result<(), ValidationErrors> {
        let start = changes.start_time.unwrap_or(self.start_time);
        let end = changes.end_time.unwrap_or(self.end_time);
        let mut errors = ValidationErrors::new();
        check_meeting_window(&mut errors, start, end);
        if !errors.is_empty() {
            return Err(errors);
        }

        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(description) = changes.description {
            self.description = description;
        }
        self.start_time = start;
        self.end_time = end;
        self.duration_minutes = Meeting::duration_between(start, end);
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Note
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Note {
    const LABEL: &'static str = "Note";

    type CreateRequest = CreateNoteRequest;
    type UpdateRequest = UpdateNoteRequest;
    type Draft = NoteDraft;
    type Changes = NoteChanges;

    owned_accessors!();

    fn create(id: String, owner_id: String, draft: NoteDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title,
            content: draft.content,
            user_id: owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: NoteChanges) -> Result<(), ValidationErrors> {
        if let Some(title) = changes.title {
            self.title = title;
        }
        if let Some(content) = changes.content {
            self.content = content;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tag
// ---------------------------------------------------------------------------

/// A label attachable to many tasks. Names are unique per user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Tag {
    pub id: String,
    pub name: String,
    pub color: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Tag {
    const LABEL: &'static str = "Tag";

    type CreateRequest = CreateTagRequest;
    type UpdateRequest = UpdateTagRequest;
    type Draft = TagDraft;
    type Changes = TagChanges;

    owned_accessors!();

    fn create(id: String, owner_id: String, draft: TagDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: draft.name,
            color: draft.color,
            user_id: owner_id,
            created_at: now,
            updated_at: now,
        }
    }

    fn apply(&mut self, changes: TagChanges) -> Result<(), ValidationErrors> {
        if let Some(name) = changes.name {
            self.name = name;
        }
        if let Some(color) = changes.color {
            self.color = color;
        }
        Ok(())
    }
}
