//! Handlers shared by every owned entity.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use taskdeck_shared::Envelope;
use taskdeck_store::Record;

use super::AppState;
use crate::error::ApiError;
use crate::extract::{CurrentUser, Owned, Valid};
use crate::service;

pub async fn list<E: Record>(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<Json<Envelope<Vec<E>>>, ApiError> {
    let records = service::list_for_owner::<E>(&state.store, &user.id).await?;
    Ok(Json(Envelope::list(records)))
}

pub async fn create<E: Record>(
    State(state): State<AppState>,
    user: CurrentUser,
    Valid(draft): Valid<E::CreateRequest>,
) -> Result<(StatusCode, Json<Envelope<E>>), ApiError> {
    let record = service::create::<E>(&state.store, &user.id, draft).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(record))))
}

pub async fn show<E: Record>(owned: Owned<E>) -> Json<Envelope<E>> {
    Json(Envelope::ok(owned.record))
}

pub async fn update<E: Record>(
    State(state): State<AppState>,
    owned: Owned<E>,
    Valid(changes): Valid<E::UpdateRequest>,
) -> Result<Json<Envelope<E>>, ApiError> {
    let record = service::update(&state.store, owned.record, changes).await?;
    Ok(Json(Envelope::ok(record)))
}

pub async fn remove<E: Record>(
    State(state): State<AppState>,
    owned: Owned<E>,
) -> Result<StatusCode, ApiError> {
    service::delete::<E>(&state.store, owned.record.id()).await?;
    tracing::info!(entity = E::LABEL, id = owned.record.id(), user_id = %owned.user.id, "deleted");
    Ok(StatusCode::NO_CONTENT)
}
