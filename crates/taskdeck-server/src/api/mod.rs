mod auth;
mod crud;
mod tasks;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, Request, State},
    http::{header, Method, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use taskdeck_shared::constants::MAX_BODY_SIZE;
use taskdeck_shared::{Envelope, Meeting, Note, Project, Tag, Task};
use taskdeck_store::{Record, Store};

use crate::auth::{PasswordHasher, Sessions};
use crate::config::{CorsOrigin, ServerConfig};
use crate::error::{ApiError, ErrorDiagnostics};
use crate::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::service;

#[derive(Clone)]
pub struct AppState {
    pub store: Store,
    pub sessions: Sessions,
    pub passwords: PasswordHasher,
    pub rate_limiter: RateLimiter,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    /// Whether cookies must carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.config.app_env.is_production()
    }
}

pub fn build_router(state: AppState) -> Router {
    let router = Router::new()
        .route("/api/health", get(health_check))
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/auth/logout", post(auth::logout))
        .route("/api/auth/user", get(auth::current_user))
        .route("/api/tasks", get(tasks::list).post(tasks::create))
        .route(
            "/api/tasks/:id",
            get(crud::show::<Task>)
                .patch(tasks::update)
                .delete(crud::remove::<Task>),
        )
        .route("/api/tasks/:id/tags", get(tasks::tags))
        .route(
            "/api/tasks/:id/tags/:tag_id",
            put(tasks::attach_tag).delete(tasks::detach_tag),
        )
        .route("/api/projects/:id/tasks", get(tasks::for_project));

    let router = resource::<Project>(router, "/api/projects");
    let router = resource::<Meeting>(router, "/api/meetings");
    let router = resource::<Note>(router, "/api/notes");
    let mut router = resource::<Tag>(router, "/api/tags")
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(MAX_BODY_SIZE))
        .layer(middleware::from_fn_with_state(
            state.rate_limiter.clone(),
            rate_limit_middleware,
        ));

    router = router.layer(middleware::from_fn(method_not_allowed));
    if !state.config.app_env.is_production() {
        router = router.layer(middleware::from_fn(expose_error_details));
    }

    router
        .layer(cors_layer(&state.config.cors_origin))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Mount the five standard CRUD routes for one entity.
fn resource<E: Record>(router: Router<AppState>, path: &str) -> Router<AppState> {
    router
        .route(path, get(crud::list::<E>).post(crud::create::<E>))
        .route(
            &format!("{path}/:id"),
            get(crud::show::<E>)
                .patch(crud::update::<E>)
                .delete(crud::remove::<E>),
        )
}

fn cors_layer(origin: &CorsOrigin) -> CorsLayer {
    let methods = [
        Method::GET,
        Method::POST,
        Method::PUT,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
    ];
    match origin {
        CorsOrigin::Any => CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(methods)
            .allow_headers(Any),
        CorsOrigin::Exact(origin) => CorsLayer::new()
            .allow_origin(origin.clone())
            .allow_methods(methods)
            .allow_headers([header::CONTENT_TYPE])
            .allow_credentials(true),
    }
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    environment: &'static str,
    storage: &'static str,
}

async fn health_check(
    State(state): State<AppState>,
) -> Result<Json<Envelope<HealthResponse>>, ApiError> {
    service::run(&state.store, "Storage", |s| s.ping())
        .await
        .map_err(|e| ApiError::Unavailable(e.to_string()))?;

    Ok(Json(Envelope::ok(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        environment: state.config.app_env.as_str(),
        storage: state.store.backend_name(),
    })))
}

async fn route_not_found() -> ApiError {
    ApiError::NotFound("Route")
}

/// Replace axum's bare 405 with the error envelope, keeping `Allow`.
async fn method_not_allowed(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    if response.status() != StatusCode::METHOD_NOT_ALLOWED {
        return response;
    }
    let allow = response.headers().get(header::ALLOW).cloned();
    let mut rendered = ApiError::MethodNotAllowed.into_response();
    if let Some(allow) = allow {
        rendered.headers_mut().insert(header::ALLOW, allow);
    }
    rendered
}

/// Copy the error cause recorded by [`ApiError`] into `error.stack`.
/// Only installed outside production.
async fn expose_error_details(req: Request, next: Next) -> Response {
    let response = next.run(req).await;
    let Some(ErrorDiagnostics(stack)) = response.extensions().get::<ErrorDiagnostics>().cloned()
    else {
        return response;
    };

    let (mut parts, body) = response.into_parts();
    let bytes = match axum::body::to_bytes(body, MAX_BODY_SIZE).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "could not buffer error response");
            return Response::from_parts(parts, Body::empty());
        }
    };

    let mut envelope: Envelope<serde_json::Value> = match serde_json::from_slice(&bytes) {
        Ok(envelope) => envelope,
        Err(_) => return Response::from_parts(parts, Body::from(bytes)),
    };
    if let Some(error) = envelope.error.as_mut() {
        error.stack = Some(stack);
    }

    match serde_json::to_vec(&envelope) {
        Ok(rendered) => {
            parts.headers.remove(header::CONTENT_LENGTH);
            Response::from_parts(parts, Body::from(rendered))
        }
        Err(_) => Response::from_parts(parts, Body::from(bytes)),
    }
}

pub async fn serve(state: AppState, addr: std::net::SocketAddr) -> anyhow::Result<()> {
    let app = build_router(state);

    info!(addr = %addr, "Starting HTTP API server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
