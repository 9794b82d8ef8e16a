//! Task handlers that go beyond plain CRUD: filtered listing, the project
//! reference check, and tag assignment.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use taskdeck_shared::requests::{CreateTaskRequest, TaskQuery, UpdateTaskRequest};
use taskdeck_shared::{Envelope, Project, Tag, Task};

use super::AppState;
use crate::error::ApiError;
use crate::extract::{load_owned, CurrentUser, Owned, Valid, ValidQuery};
use crate::service;

pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
    ValidQuery(filter): ValidQuery<TaskQuery>,
) -> Result<Json<Envelope<Vec<Task>>>, ApiError> {
    let tasks = service::list_tasks(&state.store, &user.id, &filter).await?;
    Ok(Json(Envelope::list(tasks)))
}

pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(draft): Valid<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Envelope<Task>>), ApiError> {
    if let Some(project_id) = &draft.project_id {
        load_owned::<Project>(&state.store, &user.id, project_id).await?;
    }
    let task = service::create::<Task>(&state.store, &user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(task))))
}

pub async fn update(
    State(state): State<AppState>,
    owned: Owned<Task>,
    Valid(changes): Valid<UpdateTaskRequest>,
) -> Result<Json<Envelope<Task>>, ApiError> {
    if let Some(Some(project_id)) = &changes.project_id {
        load_owned::<Project>(&state.store, &owned.user.id, project_id).await?;
    }
    let task = service::update(&state.store, owned.record, changes).await?;
    Ok(Json(Envelope::ok(task)))
}

pub async fn for_project(
    State(state): State<AppState>,
    owned: Owned<Project>,
) -> Result<Json<Envelope<Vec<Task>>>, ApiError> {
    let tasks = service::tasks_for_project(&state.store, &owned.user.id, &owned.record.id).await?;
    Ok(Json(Envelope::list(tasks)))
}

pub async fn tags(
    State(state): State<AppState>,
    owned: Owned<Task>,
) -> Result<Json<Envelope<Vec<Tag>>>, ApiError> {
    let tags = service::tags_for_task(&state.store, &owned.record.id).await?;
    Ok(Json(Envelope::list(tags)))
}

/// `PUT /api/tasks/:id/tags/:tag_id`. Returns the task's tags after the
/// change.
pub async fn attach_tag(
    State(state): State<AppState>,
    owned: Owned<Task>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<Json<Envelope<Vec<Tag>>>, ApiError> {
    let tag = owned_tag(&state, &owned, &params).await?;
    service::attach_tag(&state.store, &owned.record.id, &tag.id).await?;
    let tags = service::tags_for_task(&state.store, &owned.record.id).await?;
    Ok(Json(Envelope::list(tags)))
}

pub async fn detach_tag(
    State(state): State<AppState>,
    owned: Owned<Task>,
    Path(params): Path<HashMap<String, String>>,
) -> Result<StatusCode, ApiError> {
    let tag = owned_tag(&state, &owned, &params).await?;
    service::detach_tag(&state.store, &owned.record.id, &tag.id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn owned_tag(
    state: &AppState,
    owned: &Owned<Task>,
    params: &HashMap<String, String>,
) -> Result<Tag, ApiError> {
    let tag_id = params
        .get("tag_id")
        .ok_or_else(|| ApiError::BadRequest("Missing tag id in path".to_string()))?;
    load_owned::<Tag>(&state.store, &owned.user.id, tag_id).await
}
