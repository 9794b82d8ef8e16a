//! Request extractors: validated bodies and queries, the session user and
//! owner-checked records.

use std::collections::HashMap;

use axum::extract::{FromRequest, FromRequestParts, Path, Query, Request};
use axum::http::request::Parts;
use axum::Json;
use serde::de::DeserializeOwned;

use taskdeck_shared::{Validate, ValidationErrors};
use taskdeck_store::{Record, Store};

use crate::api::AppState;
use crate::auth::read_cookie;
use crate::error::ApiError;
use crate::service;

/// A JSON body that parsed and passed validation. Holds the checked output,
/// never the raw DTO.
pub struct Valid<T: Validate>(pub T::Output);

#[axum::async_trait]
impl<T, S> FromRequest<S> for Valid<T>
where
    T: DeserializeOwned + Validate + Send,
    T::Output: Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(raw) = Json::<T>::from_request(req, state)
            .await
            .map_err(|rejection| ValidationErrors::single("body", rejection.body_text()))?;
        Ok(Valid(raw.validate()?))
    }
}

/// Query-string counterpart of [`Valid`].
pub struct ValidQuery<T: Validate>(pub T::Output);

#[axum::async_trait]
impl<T, S> FromRequestParts<S> for ValidQuery<T>
where
    T: DeserializeOwned + Validate + Send,
    T::Output: Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(raw) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ValidationErrors::single("query", rejection.body_text()))?;
        Ok(ValidQuery(raw.validate()?))
    }
}

/// The authenticated caller.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let cookie =
            read_cookie(&parts.headers).ok_or(ApiError::Unauthorized("Authentication required"))?;
        let id = state
            .sessions
            .resolve(cookie)
            .await
            .ok_or(ApiError::Unauthorized("Session expired or invalid"))?;
        Ok(CurrentUser { id })
    }
}

/// The record named by the `:id` path segment, loaded and checked to belong
/// to the caller. Missing and foreign records are both rejected as 404.
pub struct Owned<E> {
    pub user: CurrentUser,
    pub record: E,
}

#[axum::async_trait]
impl<E: Record> FromRequestParts<AppState> for Owned<E> {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        let Path(params) = Path::<HashMap<String, String>>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| ApiError::BadRequest(rejection.body_text()))?;
        let id = params
            .get("id")
            .ok_or_else(|| ApiError::BadRequest("Missing id in path".to_string()))?;
        let record = load_owned::<E>(&state.store, &user.id, id).await?;
        Ok(Owned { user, record })
    }
}

/// Load a record and reject it as missing unless `owner_id` owns it.
pub async fn load_owned<E: Record>(store: &Store, owner_id: &str, id: &str) -> Result<E, ApiError> {
    let record = service::find::<E>(store, id).await?;
    if record.owner_id() != owner_id {
        tracing::debug!(entity = E::LABEL, id, "ownership check failed");
        return Err(ApiError::NotFound(E::LABEL));
    }
    Ok(record)
}
