//! Generic business operations over any stored entity.
//!
//! Store calls are synchronous, so each one is moved to tokio's blocking
//! pool. Storage failures are translated to [`ApiError`] here, with the
//! entity label attached so messages read "Task not found" rather than a
//! bare status.

use taskdeck_shared::models::now;
use taskdeck_shared::requests::{Credentials, Registration, TaskFilter};
use taskdeck_shared::{new_id, Entity, Tag, Task, User};
use taskdeck_store::{Record, Store};

use crate::auth::PasswordHasher;
use crate::error::ApiError;

/// Run a store operation on the blocking pool.
pub async fn run<T, F>(store: &Store, label: &'static str, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&Store) -> taskdeck_store::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let store = store.clone();
    tokio::task::spawn_blocking(move || op(&store))
        .await
        .map_err(|e| ApiError::Internal(format!("store task failed: {e}")))?
        .map_err(|e| ApiError::from_store(e, label))
}

// ---------------------------------------------------------------------------
// Owned records
// ---------------------------------------------------------------------------

pub async fn list_for_owner<E: Record>(store: &Store, owner_id: &str) -> Result<Vec<E>, ApiError> {
    let owner_id = owner_id.to_string();
    run(store, E::LABEL, move |s| s.list::<E>(&owner_id)).await
}

/// Load by id without an ownership check.
pub async fn find<E: Record>(store: &Store, id: &str) -> Result<E, ApiError> {
    let id = id.to_string();
    run(store, E::LABEL, move |s| s.get::<E>(&id)).await
}

pub async fn create<E: Record>(
    store: &Store,
    owner_id: &str,
    draft: E::Draft,
) -> Result<E, ApiError> {
    let record = E::create(new_id(), owner_id.to_string(), draft, now());
    let stored = record.clone();
    run(store, E::LABEL, move |s| s.insert(&stored)).await?;
    tracing::debug!(entity = E::LABEL, id = record.id(), "created");
    Ok(record)
}

/// Merge `changes` into `record`, bump `updatedAt` and persist.
pub async fn update<E: Record>(
    store: &Store,
    mut record: E,
    changes: E::Changes,
) -> Result<E, ApiError> {
    record.apply(changes)?;
    record.touch(now());
    let stored = record.clone();
    run(store, E::LABEL, move |s| s.update(&stored)).await?;
    Ok(record)
}

pub async fn delete<E: Record>(store: &Store, id: &str) -> Result<(), ApiError> {
    let id = id.to_string();
    let removed = run(store, E::LABEL, move |s| s.delete::<E>(&id)).await?;
    if !removed {
        return Err(ApiError::NotFound(E::LABEL));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

pub async fn list_tasks(
    store: &Store,
    owner_id: &str,
    filter: &TaskFilter,
) -> Result<Vec<Task>, ApiError> {
    let mut tasks = list_for_owner::<Task>(store, owner_id).await?;
    tasks.retain(|t| t.matches(filter));
    Ok(tasks)
}

pub async fn tasks_for_project(
    store: &Store,
    owner_id: &str,
    project_id: &str,
) -> Result<Vec<Task>, ApiError> {
    let filter = TaskFilter {
        project_id: Some(project_id.to_string()),
        ..TaskFilter::default()
    };
    list_tasks(store, owner_id, &filter).await
}

pub async fn tags_for_task(store: &Store, task_id: &str) -> Result<Vec<Tag>, ApiError> {
    let task_id = task_id.to_string();
    run(store, Tag::LABEL, move |s| s.tags_for_task(&task_id)).await
}

/// Attach a tag. Attaching twice is not an error.
pub async fn attach_tag(store: &Store, task_id: &str, tag_id: &str) -> Result<(), ApiError> {
    let (task, tag) = (task_id.to_string(), tag_id.to_string());
    let added = run(store, Tag::LABEL, move |s| s.attach_tag(&task, &tag)).await?;
    tracing::debug!(task_id, tag_id, added, "tag attached");
    Ok(())
}

pub async fn detach_tag(store: &Store, task_id: &str, tag_id: &str) -> Result<(), ApiError> {
    let (task, tag) = (task_id.to_string(), tag_id.to_string());
    let removed = run(store, Tag::LABEL, move |s| s.detach_tag(&task, &tag)).await?;
    if !removed {
        return Err(ApiError::NotFound("Tag assignment"));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

const USER: &str = "User";

pub async fn register(
    store: &Store,
    passwords: &PasswordHasher,
    registration: Registration,
) -> Result<User, ApiError> {
    let password_hash = passwords.hash(registration.password).await?;
    let created = now();
    let user = User {
        id: new_id(),
        email: registration.email,
        password_hash,
        name: registration.name,
        created_at: created,
        updated_at: created,
    };
    let stored = user.clone();
    run(store, USER, move |s| s.insert_user(&stored)).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok(user)
}

/// Check credentials. Unknown emails and wrong passwords are
/// indistinguishable to the caller.
pub async fn authenticate(
    store: &Store,
    passwords: &PasswordHasher,
    credentials: Credentials,
) -> Result<User, ApiError> {
    let email = credentials.email;
    let found = match run(store, USER, move |s| s.user_by_email(&email)).await {
        Ok(user) => Some(user),
        Err(ApiError::NotFound(_)) => None,
        Err(e) => return Err(e),
    };

    let hash = found.as_ref().map(|u| u.password_hash.clone());
    if !passwords.verify(credentials.password, hash).await? {
        return Err(ApiError::Unauthorized("Invalid email or password"));
    }
    found.ok_or(ApiError::Unauthorized("Invalid email or password"))
}

pub async fn current_user(store: &Store, user_id: &str) -> Result<User, ApiError> {
    let id = user_id.to_string();
    match run(store, USER, move |s| s.user(&id)).await {
        Err(ApiError::NotFound(_)) => Err(ApiError::Unauthorized("Authentication required")),
        other => other,
    }
}
