//! Request bodies and query strings accepted by the API, plus the checked
//! values they validate into.
//!
//! Incoming DTOs are deliberately loose (`Option<String>` for enums and
//! dates) so that a bad value becomes a field-level validation error instead
//! of an opaque deserialization failure.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::constants::*;
use crate::error::ValidationErrors;
use crate::types::{Priority, ProjectStatus, TaskStatus};
use crate::validate::*;

const DEFAULT_TAG_COLOR: &str = "#6366F1";

fn no_fields(errors: &mut ValidationErrors, any: bool) {
    if !any {
        errors.add("body", "No fields to update");
    }
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
}

fn password(errors: &mut ValidationErrors, value: Option<String>) -> Option<String> {
    let Some(pw) = value else {
        errors.add("password", "Required");
        return None;
    };
    if pw.chars().count() < MIN_PASSWORD_LEN {
        errors.add("password", format!("must be at least {MIN_PASSWORD_LEN} characters"));
        return None;
    }
    if pw.len() > MAX_PASSWORD_BYTES {
        errors.add("password", format!("must be at most {MAX_PASSWORD_BYTES} bytes"));
        return None;
    }
    if check_chars(&pw).is_err() {
        errors.add("password", "contains invalid characters");
        return None;
    }
    Some(pw)
}

impl Validate for RegisterRequest {
    type Output = Registration;

    fn validate(self) -> Result<Registration, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = email(&mut errors, "email", self.email);
        let password = password(&mut errors, self.password);
        let name = required_text(&mut errors, "name", self.name, MAX_DISPLAY_NAME_LEN);
        match (email, password, name) {
            (Some(email), Some(password), Some(name)) if errors.is_empty() => Ok(Registration {
                email,
                password,
                name,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Validate for LoginRequest {
    type Output = Credentials;

    /// Only presence is checked; a wrong-shaped email simply fails to log in.
    fn validate(self) -> Result<Credentials, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let email = required_text(&mut errors, "email", self.email, MAX_EMAIL_LEN);
        let password = match self.password {
            Some(p) if !p.is_empty() => Some(p),
            _ => {
                errors.add("password", "Required");
                None
            }
        };
        match (email, password) {
            (Some(email), Some(password)) if errors.is_empty() => Ok(Credentials {
                email: email.to_ascii_lowercase(),
                password,
            }),
            _ => Err(errors),
        }
    }
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

/// `userId` is accepted and ignored so that clients echoing a full record
/// back do not get rejected; ownership always comes from the session.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub due_date: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: Priority,
    pub due_date: Option<DateTime<Utc>>,
    pub project_id: Option<String>,
}

impl Validate for CreateTaskRequest {
    type Output = TaskDraft;

    fn validate(self) -> Result<TaskDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = required_text(&mut errors, "title", self.title, MAX_TITLE_LEN);
        let description =
            optional_text(&mut errors, "description", self.description, MAX_DESCRIPTION_LEN);
        let status = enum_value(&mut errors, "status", self.status).unwrap_or_default();
        let priority = enum_value(&mut errors, "priority", self.priority).unwrap_or_default();
        let due_date = self
            .due_date
            .and_then(|d| timestamp(&mut errors, "dueDate", &d));
        let project_id = self
            .project_id
            .and_then(|p| reference(&mut errors, "projectId", p));
        match title {
            Some(title) if errors.is_empty() => Ok(TaskDraft {
                title,
                description,
                status,
                priority,
                due_date,
                project_id,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub due_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "nullable")]
    pub project_id: Option<Option<String>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub due_date: Option<Option<DateTime<Utc>>>,
    pub project_id: Option<Option<String>>,
}

impl Validate for UpdateTaskRequest {
    type Output = TaskChanges;

    fn validate(self) -> Result<TaskChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        no_fields(
            &mut errors,
            self.title.is_some()
                || self.description.is_some()
                || self.status.is_some()
                || self.priority.is_some()
                || self.due_date.is_some()
                || self.project_id.is_some(),
        );
        let changes = TaskChanges {
            title: changed_text(&mut errors, "title", self.title, MAX_TITLE_LEN),
            description: nullable_text(
                &mut errors,
                "description",
                self.description,
                MAX_DESCRIPTION_LEN,
            ),
            status: enum_value(&mut errors, "status", self.status),
            priority: enum_value(&mut errors, "priority", self.priority),
            due_date: nullable_timestamp(&mut errors, "dueDate", self.due_date),
            project_id: match self.project_id {
                None => None,
                Some(None) => Some(None),
                Some(Some(p)) => reference(&mut errors, "projectId", p).map(Some),
            },
        };
        errors.finish(|| changes)
    }
}

/// Query string for `GET /api/tasks`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskQuery {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default)]
    pub search: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<Priority>,
    pub project_id: Option<String>,
    /// Lower-cased needle matched against title and description.
    pub search: Option<String>,
}

impl Validate for TaskQuery {
    type Output = TaskFilter;

    fn validate(self) -> Result<TaskFilter, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let filter = TaskFilter {
            status: enum_value(&mut errors, "status", self.status),
            priority: enum_value(&mut errors, "priority", self.priority),
            project_id: self
                .project_id
                .and_then(|p| reference(&mut errors, "projectId", p)),
            search: optional_text(&mut errors, "search", self.search, MAX_TITLE_LEN)
                .map(|s| s.to_lowercase()),
        };
        errors.finish(|| filter)
    }
}

// ---------------------------------------------------------------------------
// Projects
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProjectRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDraft {
    pub title: String,
    pub description: Option<String>,
    pub status: ProjectStatus,
}

impl Validate for CreateProjectRequest {
    type Output = ProjectDraft;

    fn validate(self) -> Result<ProjectDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = required_text(&mut errors, "title", self.title, MAX_TITLE_LEN);
        let description =
            optional_text(&mut errors, "description", self.description, MAX_DESCRIPTION_LEN);
        let status = enum_value(&mut errors, "status", self.status).unwrap_or_default();
        match title {
            Some(title) if errors.is_empty() => Ok(ProjectDraft {
                title,
                description,
                status,
            }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProjectRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProjectChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub status: Option<ProjectStatus>,
}

impl Validate for UpdateProjectRequest {
    type Output = ProjectChanges;

    fn validate(self) -> Result<ProjectChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        no_fields(
            &mut errors,
            self.title.is_some() || self.description.is_some() || self.status.is_some(),
        );
        let changes = ProjectChanges {
            title: changed_text(&mut errors, "title", self.title, MAX_TITLE_LEN),
            description: nullable_text(
                &mut errors,
                "description",
                self.description,
                MAX_DESCRIPTION_LEN,
            ),
            status: enum_value(&mut errors, "status", self.status),
        };
        errors.finish(|| changes)
    }
}

// ---------------------------------------------------------------------------
// Meetings
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMeetingRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeetingDraft {
    pub title: String,
    pub description: Option<String>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

/// Shared by create and by the merged view of an update.
pub fn check_meeting_window(
    errors: &mut ValidationErrors,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) {
    if end <= start {
        errors.add("endTime", "must be after startTime");
    }
}

impl Validate for CreateMeetingRequest {
    type Output = MeetingDraft;

    fn validate(self) -> Result<MeetingDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = required_text(&mut errors, "title", self.title, MAX_TITLE_LEN);
        let description =
            optional_text(&mut errors, "description", self.description, MAX_DESCRIPTION_LEN);
        let start_time = required_timestamp(&mut errors, "startTime", self.start_time);
        let end_time = required_timestamp(&mut errors, "endTime", self.end_time);
        if let (Some(start), Some(end)) = (start_time, end_time) {
            check_meeting_window(&mut errors, start, end);
        }
        match (title, start_time, end_time) {
            (Some(title), Some(start_time), Some(end_time)) if errors.is_empty() => {
                Ok(MeetingDraft {
                    title,
                    description,
                    start_time,
                    end_time,
                })
            }
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMeetingRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, deserialize_with = "nullable")]
    pub description: Option<Option<String>>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeetingChanges {
    pub title: Option<String>,
    pub description: Option<Option<String>>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl Validate for UpdateMeetingRequest {
    type Output = MeetingChanges;

    fn validate(self) -> Result<MeetingChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        no_fields(
            &mut errors,
            self.title.is_some()
                || self.description.is_some()
                || self.start_time.is_some()
                || self.end_time.is_some(),
        );
        let start_time = self
            .start_time
            .and_then(|s| timestamp(&mut errors, "startTime", &s));
        let end_time = self
            .end_time
            .and_then(|s| timestamp(&mut errors, "endTime", &s));
        if let (Some(start), Some(end)) = (start_time, end_time) {
            check_meeting_window(&mut errors, start, end);
        }
        let changes = MeetingChanges {
            title: changed_text(&mut errors, "title", self.title, MAX_TITLE_LEN),
            description: nullable_text(
                &mut errors,
                "description",
                self.description,
                MAX_DESCRIPTION_LEN,
            ),
            start_time,
            end_time,
        };
        errors.finish(|| changes)
    }
}

// ---------------------------------------------------------------------------
// Notes
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateNoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NoteDraft {
    pub title: String,
    pub content: String,
}

impl Validate for CreateNoteRequest {
    type Output = NoteDraft;

    fn validate(self) -> Result<NoteDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let title = required_text(&mut errors, "title", self.title, MAX_TITLE_LEN);
        let content = body_text(
            &mut errors,
            "content",
            self.content.unwrap_or_default(),
            MAX_NOTE_CONTENT_LEN,
        );
        match (title, content) {
            (Some(title), Some(content)) if errors.is_empty() => Ok(NoteDraft { title, content }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateNoteRequest {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NoteChanges {
    pub title: Option<String>,
    pub content: Option<String>,
}

impl Validate for UpdateNoteRequest {
    type Output = NoteChanges;

    fn validate(self) -> Result<NoteChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        no_fields(&mut errors, self.title.is_some() || self.content.is_some());
        let changes = NoteChanges {
            title: changed_text(&mut errors, "title", self.title, MAX_TITLE_LEN),
            content: self
                .content
                .and_then(|c| body_text(&mut errors, "content", c, MAX_NOTE_CONTENT_LEN)),
        };
        errors.finish(|| changes)
    }
}

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CreateTagRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagDraft {
    pub name: String,
    pub color: String,
}

impl Validate for CreateTagRequest {
    type Output = TagDraft;

    fn validate(self) -> Result<TagDraft, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let name = required_text(&mut errors, "name", self.name, MAX_TAG_NAME_LEN);
        let color = match self.color {
            Some(c) => hex_color(&mut errors, "color", &c),
            None => Some(DEFAULT_TAG_COLOR.to_string()),
        };
        match (name, color) {
            (Some(name), Some(color)) if errors.is_empty() => Ok(TagDraft { name, color }),
            _ => Err(errors),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTagRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TagChanges {
    pub name: Option<String>,
    pub color: Option<String>,
}

impl Validate for UpdateTagRequest {
    type Output = TagChanges;

    fn validate(self) -> Result<TagChanges, ValidationErrors> {
        let mut errors = ValidationErrors::new();
        no_fields(&mut errors, self.name.is_some() || self.color.is_some());
        let changes = TagChanges {
            name: changed_text(&mut errors, "name", self.name, MAX_TAG_NAME_LEN),
            color: self.color.and_then(|c| hex_color(&mut errors, "color", &c)),
        };
        errors.finish(|| changes)
    }
}
