use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use super::*;
use crate::config::AppEnv;

struct TestApp {
    router: Router,
}

struct Reply {
    status: StatusCode,
    cookie: Option<String>,
    body: Value,
}

impl TestApp {
    async fn with(store: Store, config: ServerConfig) -> Self {
        let state = AppState {
            store,
            sessions: Sessions::new(&config.session_secret, config.session_ttl),
            passwords: PasswordHasher::new(4).await.unwrap(),
            rate_limiter: RateLimiter::new(config.rate_limit_window, config.rate_limit_max),
            config: Arc::new(config),
        };
        Self {
            router: build_router(state),
        }
    }

    async fn new() -> Self {
        Self::with(Store::memory(), test_config()).await
    }

    async fn call(
        &self,
        method: Method,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> Reply {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header("x-forwarded-for", "198.51.100.10");
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        let req = match body {
            Some(body) => req
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string())),
            None => req.body(Body::empty()),
        }
        .unwrap();

        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        Reply {
            status,
            cookie,
            body,
        }
    }

    async fn get(&self, uri: &str, cookie: &str) -> Reply {
        self.call(Method::GET, uri, Some(cookie), None).await
    }

    async fn post(&self, uri: &str, cookie: &str, body: Value) -> Reply {
        self.call(Method::POST, uri, Some(cookie), Some(body)).await
    }

    async fn patch(&self, uri: &str, cookie: &str, body: Value) -> Reply {
        self.call(Method::PATCH, uri, Some(cookie), Some(body)).await
    }

    async fn delete(&self, uri: &str, cookie: &str) -> Reply {
        self.call(Method::DELETE, uri, Some(cookie), None).await
    }

    async fn put(&self, uri: &str, cookie: &str) -> Reply {
        self.call(Method::PUT, uri, Some(cookie), None).await
    }

    /// Register a user and return the `Cookie` header value for their session.
    async fn register(&self, email: &str) -> String {
        let reply = self
            .call(
                Method::POST,
                "/api/auth/register",
                None,
                Some(json!({"email": email, "password": "s3cret-pass", "name": "Test User"})),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED, "{}", reply.body);
        session_pair(&reply)
    }
}

fn test_config() -> ServerConfig {
    ServerConfig {
        app_env: AppEnv::Test,
        bcrypt_cost: 4,
        ..ServerConfig::default()
    }
}

fn session_pair(reply: &Reply) -> String {
    let set_cookie = reply.cookie.as_deref().expect("session cookie");
    set_cookie.split(';').next().unwrap().to_string()
}

fn timestamp(value: &Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

fn detail_fields(body: &Value) -> Vec<String> {
    body["error"]["details"]
        .as_array()
        .map(|details| {
            details
                .iter()
                .map(|d| d["field"].as_str().unwrap().to_string())
                .collect()
        })
        .unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Health and plumbing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health_reports_backend() {
    let app = TestApp::new().await;
    let reply = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["success"], true);
    assert_eq!(reply.body["data"]["status"], "ok");
    assert_eq!(reply.body["data"]["storage"], "memory");
}

#[tokio::test]
async fn test_unknown_route_uses_envelope() {
    let app = TestApp::new().await;
    let reply = app.call(Method::GET, "/api/nothing-here", None, None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_wrong_method_uses_envelope() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    let reply = app.put("/api/tasks", &ada).await;
    assert_eq!(reply.status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(reply.body["success"], false);
    assert_eq!(reply.body["error"]["code"], "METHOD_NOT_ALLOWED");

    let req = Request::builder()
        .method(Method::DELETE)
        .uri("/api/health")
        .header("x-forwarded-for", "198.51.100.10")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
    let allow = response.headers().get(header::ALLOW).unwrap().to_str().unwrap();
    assert!(allow.contains("GET"), "{allow}");
}

#[tokio::test]
async fn test_rate_limit_rejects_excess_requests() {
    let config = ServerConfig {
        rate_limit_max: 2,
        rate_limit_window: Duration::from_secs(60),
        ..test_config()
    };
    let app = TestApp::with(Store::memory(), config).await;
    for _ in 0..2 {
        let reply = app.call(Method::GET, "/api/health", None, None).await;
        assert_eq!(reply.status, StatusCode::OK);
    }
    let reply = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(reply.body["error"]["code"], "RATE_LIMITED");
}

#[tokio::test]
async fn test_error_stack_only_outside_production() {
    let app = TestApp::new().await;
    let user = app.register("dev@example.com").await;
    let reply = app.get("/api/tasks/missing", &user).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert!(reply.body["error"]["stack"].is_string());

    let config = ServerConfig {
        app_env: AppEnv::Production,
        ..test_config()
    };
    let app = TestApp::with(Store::memory(), config).await;
    let reply = app.call(Method::GET, "/api/tasks", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(reply.body["error"].get("stack").is_none());
}

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_register_sets_cookie_and_hides_hash() {
    let app = TestApp::new().await;
    let reply = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "Ada@Example.com", "password": "s3cret-pass", "name": "Ada"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    let cookie = reply.cookie.as_deref().unwrap();
    assert!(cookie.starts_with("taskdeck_session="));
    assert!(cookie.contains("HttpOnly"));
    assert!(cookie.contains("SameSite=Lax"));
    assert!(!cookie.contains("Secure"));
    assert_eq!(reply.body["data"]["email"], "ada@example.com");
    assert!(reply.body["data"].get("passwordHash").is_none());
    assert!(reply.body["data"].get("password").is_none());
}

#[tokio::test]
async fn test_register_rejects_duplicate_email() {
    let app = TestApp::new().await;
    app.register("ada@example.com").await;
    let reply = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "ADA@example.com", "password": "another-pass", "name": "Ada 2"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    assert_eq!(reply.body["error"]["code"], "CONFLICT");
    assert_eq!(detail_fields(&reply.body), ["email"]);
}

#[tokio::test]
async fn test_register_reports_every_invalid_field() {
    let app = TestApp::new().await;
    let reply = app
        .call(
            Method::POST,
            "/api/auth/register",
            None,
            Some(json!({"email": "not-an-email", "password": "short"})),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(detail_fields(&reply.body), ["email", "password", "name"]);
}

#[tokio::test]
async fn test_login_and_current_user() {
    let app = TestApp::new().await;
    app.register("ada@example.com").await;

    let wrong = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ada@example.com", "password": "wrong-pass"})),
        )
        .await;
    assert_eq!(wrong.status, StatusCode::UNAUTHORIZED);

    let unknown = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "nobody@example.com", "password": "s3cret-pass"})),
        )
        .await;
    assert_eq!(unknown.status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown.body["error"]["message"], wrong.body["error"]["message"]);

    let ok = app
        .call(
            Method::POST,
            "/api/auth/login",
            None,
            Some(json!({"email": "ADA@example.com", "password": "s3cret-pass"})),
        )
        .await;
    assert_eq!(ok.status, StatusCode::OK);
    let cookie = session_pair(&ok);

    let me = app.get("/api/auth/user", &cookie).await;
    assert_eq!(me.status, StatusCode::OK);
    assert_eq!(me.body["data"]["email"], "ada@example.com");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new().await;
    let cookie = app.register("ada@example.com").await;

    let reply = app
        .call(Method::POST, "/api/auth/logout", Some(&cookie), None)
        .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert!(reply.cookie.unwrap().contains("Max-Age=0"));

    let me = app.get("/api/auth/user", &cookie).await;
    assert_eq!(me.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_requests_without_valid_session_are_unauthorized() {
    let app = TestApp::new().await;
    let reply = app.call(Method::GET, "/api/tasks", None, None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(reply.body["error"]["code"], "UNAUTHORIZED");

    let forged = app.get("/api/tasks", "taskdeck_session=abc.def").await;
    assert_eq!(forged.status, StatusCode::UNAUTHORIZED);
}

// ---------------------------------------------------------------------------
// Tasks
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_owner_comes_from_session_not_payload() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    let me = app.get("/api/auth/user", &ada).await;

    let reply = app
        .post(
            "/api/tasks",
            &ada,
            json!({"title": "Mine", "userId": "someone-else"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::CREATED);
    assert_eq!(reply.body["data"]["userId"], me.body["data"]["id"]);
}

#[tokio::test]
async fn test_create_then_fetch_returns_defaults() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;

    let created = app
        .post("/api/tasks", &ada, json!({"title": "  Write report  "}))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["data"]["id"].as_str().unwrap().to_string();

    let fetched = app.get(&format!("/api/tasks/{id}"), &ada).await;
    assert_eq!(fetched.status, StatusCode::OK);
    let task = &fetched.body["data"];
    assert_eq!(task["title"], "Write report");
    assert_eq!(task["status"], "TODO");
    assert_eq!(task["priority"], "MEDIUM");
    assert!(task["description"].is_null());
    assert_eq!(task["createdAt"], task["updatedAt"]);
    assert_eq!(fetched.body["data"], created.body["data"]);
}

#[tokio::test]
async fn test_invalid_task_is_rejected_and_not_stored() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;

    let reply = app
        .post(
            "/api/tasks",
            &ada,
            json!({"title": "", "priority": "URGENT", "dueDate": "tomorrow"}),
        )
        .await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail_fields(&reply.body), ["title", "priority", "dueDate"]);

    let list = app.get("/api/tasks", &ada).await;
    assert_eq!(list.body["meta"]["total"], 0);
}

#[tokio::test]
async fn test_malformed_json_is_a_body_error() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/tasks")
        .header(header::COOKIE, &ada)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"title\": "))
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(detail_fields(&body), ["body"]);
}

#[tokio::test]
async fn test_other_users_cannot_see_tasks() {
    let app = TestApp::new().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;

    let created = app
        .post(
            "/api/tasks",
            &alice,
            json!({"title": "Buy milk", "priority": "LOW", "status": "TODO"}),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let id = created.body["data"]["id"].as_str().unwrap().to_string();
    let uri = format!("/api/tasks/{id}");

    let bobs_list = app.get("/api/tasks", &bob).await;
    assert_eq!(bobs_list.status, StatusCode::OK);
    assert_eq!(bobs_list.body["data"], json!([]));
    assert_eq!(bobs_list.body["meta"]["total"], 0);

    assert_eq!(app.get(&uri, &bob).await.status, StatusCode::NOT_FOUND);
    assert_eq!(
        app.patch(&uri, &bob, json!({"title": "Hijacked"})).await.status,
        StatusCode::NOT_FOUND
    );
    assert_eq!(app.delete(&uri, &bob).await.status, StatusCode::NOT_FOUND);

    let still_there = app.get(&uri, &alice).await;
    assert_eq!(still_there.body["data"]["title"], "Buy milk");
}

#[tokio::test]
async fn test_other_users_cannot_touch_any_entity() {
    let app = TestApp::new().await;
    let alice = app.register("alice@example.com").await;
    let bob = app.register("bob@example.com").await;

    let cases = [
        ("/api/projects", json!({"title": "Launch"})),
        (
            "/api/meetings",
            json!({
                "title": "Retro",
                "startTime": "2026-03-02T09:00:00Z",
                "endTime": "2026-03-02T09:30:00Z"
            }),
        ),
        ("/api/notes", json!({"title": "Ideas", "content": "private"})),
        ("/api/tags", json!({"name": "secret"})),
    ];

    for (collection, body) in cases {
        let created = app.post(collection, &alice, body).await;
        assert_eq!(created.status, StatusCode::CREATED, "{collection}");
        let uri = format!("{collection}/{}", created.body["data"]["id"].as_str().unwrap());

        let listed = app.get(collection, &bob).await;
        assert_eq!(listed.body["meta"]["total"], 0, "{collection}");
        assert_eq!(app.get(&uri, &bob).await.status, StatusCode::NOT_FOUND, "{uri}");
        let patch = json!({"title": "Hijacked", "name": "hijacked"});
        let patched = app.patch(&uri, &bob, patch).await;
        assert_eq!(patched.status, StatusCode::NOT_FOUND, "{uri}");
        assert_eq!(app.delete(&uri, &bob).await.status, StatusCode::NOT_FOUND, "{uri}");

        let kept = app.get(&uri, &alice).await;
        assert_eq!(kept.body["data"], created.body["data"], "{uri}");
    }
}

#[tokio::test]
async fn test_patch_bumps_updated_at() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    let created = app.post("/api/tasks", &ada, json!({"title": "Ship it"})).await;
    let id = created.body["data"]["id"].as_str().unwrap().to_string();

    let patched = app
        .patch(&format!("/api/tasks/{id}"), &ada, json!({"status": "COMPLETED"}))
        .await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["data"]["status"], "COMPLETED");
    assert_eq!(patched.body["data"]["title"], "Ship it");
    assert!(
        timestamp(&patched.body["data"]["updatedAt"])
            > timestamp(&created.body["data"]["updatedAt"])
    );
    assert_eq!(patched.body["data"]["createdAt"], created.body["data"]["createdAt"]);
}

#[tokio::test]
async fn test_patch_null_clears_and_empty_patch_rejected() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    let created = app
        .post(
            "/api/tasks",
            &ada,
            json!({"title": "Plan", "description": "details", "dueDate": "2026-05-01T09:00:00Z"}),
        )
        .await;
    let uri = format!("/api/tasks/{}", created.body["data"]["id"].as_str().unwrap());

    let cleared = app
        .patch(&uri, &ada, json!({"description": null, "dueDate": null}))
        .await;
    assert_eq!(cleared.status, StatusCode::OK);
    assert!(cleared.body["data"]["description"].is_null());
    assert!(cleared.body["data"]["dueDate"].is_null());

    let empty = app.patch(&uri, &ada, json!({})).await;
    assert_eq!(empty.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail_fields(&empty.body), ["body"]);
}

#[tokio::test]
async fn test_delete_twice() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    let created = app.post("/api/notes", &ada, json!({"title": "Scratch"})).await;
    let uri = format!("/api/notes/{}", created.body["data"]["id"].as_str().unwrap());

    let first = app.delete(&uri, &ada).await;
    assert_eq!(first.status, StatusCode::NO_CONTENT);
    assert_eq!(first.body, Value::Null);
    assert_eq!(app.delete(&uri, &ada).await.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_task_filters() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    for (title, status, priority) in [
        ("Buy milk", "TODO", "LOW"),
        ("Write report", "IN_PROGRESS", "HIGH"),
        ("File taxes", "TODO", "HIGH"),
    ] {
        let reply = app
            .post(
                "/api/tasks",
                &ada,
                json!({"title": title, "status": status, "priority": priority}),
            )
            .await;
        assert_eq!(reply.status, StatusCode::CREATED);
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let todo_high = app.get("/api/tasks?status=TODO&priority=HIGH", &ada).await;
    assert_eq!(todo_high.body["meta"]["total"], 1);
    assert_eq!(todo_high.body["data"][0]["title"], "File taxes");

    let search = app.get("/api/tasks?search=REPORT", &ada).await;
    assert_eq!(search.body["meta"]["total"], 1);

    let all = app.get("/api/tasks", &ada).await;
    let titles: Vec<&str> = all.body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["File taxes", "Write report", "Buy milk"]);

    let bad = app.get("/api/tasks?status=DONE", &ada).await;
    assert_eq!(bad.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail_fields(&bad.body), ["status"]);
}

// ---------------------------------------------------------------------------
// Projects, meetings, tags
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_project_tasks_and_reference_checks() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    let bob = app.register("bob@example.com").await;

    let project = app.post("/api/projects", &ada, json!({"title": "Launch"})).await;
    assert_eq!(project.status, StatusCode::CREATED);
    assert_eq!(project.body["data"]["status"], "ACTIVE");
    let project_id = project.body["data"]["id"].as_str().unwrap().to_string();

    let task = app
        .post(
            "/api/tasks",
            &ada,
            json!({"title": "Press release", "projectId": project_id}),
        )
        .await;
    assert_eq!(task.status, StatusCode::CREATED);
    let task_id = task.body["data"]["id"].as_str().unwrap().to_string();
    app.post("/api/tasks", &ada, json!({"title": "Unrelated"})).await;

    let listed = app.get(&format!("/api/projects/{project_id}/tasks"), &ada).await;
    assert_eq!(listed.status, StatusCode::OK);
    assert_eq!(listed.body["meta"]["total"], 1);
    assert_eq!(listed.body["data"][0]["id"], task_id.as_str());

    // Bob can neither read Ada's project nor file tasks under it.
    let foreign = app.get(&format!("/api/projects/{project_id}/tasks"), &bob).await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);
    let sneaky = app
        .post("/api/tasks", &bob, json!({"title": "Sneaky", "projectId": project_id}))
        .await;
    assert_eq!(sneaky.status, StatusCode::NOT_FOUND);

    // Deleting the project leaves the task with a dangling reference.
    let deleted = app.delete(&format!("/api/projects/{project_id}"), &ada).await;
    assert_eq!(deleted.status, StatusCode::NO_CONTENT);
    let survivor = app.get(&format!("/api/tasks/{task_id}"), &ada).await;
    assert_eq!(survivor.status, StatusCode::OK);
    assert_eq!(survivor.body["data"]["projectId"], project_id.as_str());
}

#[tokio::test]
async fn test_meeting_window_and_duration() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;

    let backwards = app
        .post(
            "/api/meetings",
            &ada,
            json!({
                "title": "Retro",
                "startTime": "2026-03-02T10:00:00Z",
                "endTime": "2026-03-02T09:00:00Z"
            }),
        )
        .await;
    assert_eq!(backwards.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail_fields(&backwards.body), ["endTime"]);

    let created = app
        .post(
            "/api/meetings",
            &ada,
            json!({
                "title": "Retro",
                "startTime": "2026-03-02T09:00:00Z",
                "endTime": "2026-03-02T09:45:00Z"
            }),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["data"]["durationMinutes"], 45);
    let uri = format!("/api/meetings/{}", created.body["data"]["id"].as_str().unwrap());

    let moved = app
        .patch(&uri, &ada, json!({"endTime": "2026-03-02T10:30:00Z"}))
        .await;
    assert_eq!(moved.status, StatusCode::OK);
    assert_eq!(moved.body["data"]["durationMinutes"], 90);

    let inverted = app
        .patch(&uri, &ada, json!({"startTime": "2026-03-02T11:00:00Z"}))
        .await;
    assert_eq!(inverted.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail_fields(&inverted.body), ["endTime"]);
}

#[tokio::test]
async fn test_tag_names_unique_per_user() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    let bob = app.register("bob@example.com").await;

    let first = app.post("/api/tags", &ada, json!({"name": "work"})).await;
    assert_eq!(first.status, StatusCode::CREATED);
    assert_eq!(first.body["data"]["color"], "#6366F1");

    let clash = app
        .post("/api/tags", &ada, json!({"name": "work", "color": "#fff"}))
        .await;
    assert_eq!(clash.status, StatusCode::CONFLICT);
    assert_eq!(detail_fields(&clash.body), ["name"]);

    let other_user = app.post("/api/tags", &bob, json!({"name": "work"})).await;
    assert_eq!(other_user.status, StatusCode::CREATED);

    let bad_color = app
        .post("/api/tags", &ada, json!({"name": "home", "color": "red"}))
        .await;
    assert_eq!(bad_color.status, StatusCode::BAD_REQUEST);
    assert_eq!(detail_fields(&bad_color.body), ["color"]);
}

#[tokio::test]
async fn test_tag_assignment() {
    let app = TestApp::new().await;
    let ada = app.register("ada@example.com").await;
    let bob = app.register("bob@example.com").await;

    let task = app.post("/api/tasks", &ada, json!({"title": "Tagged"})).await;
    let task_id = task.body["data"]["id"].as_str().unwrap().to_string();
    let tag = app.post("/api/tags", &ada, json!({"name": "urgent"})).await;
    let tag_id = tag.body["data"]["id"].as_str().unwrap().to_string();
    let bobs_tag = app.post("/api/tags", &bob, json!({"name": "mine"})).await;
    let bobs_tag_id = bobs_tag.body["data"]["id"].as_str().unwrap().to_string();

    let link = format!("/api/tasks/{task_id}/tags/{tag_id}");
    for _ in 0..2 {
        let reply = app.put(&link, &ada).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["meta"]["total"], 1);
        assert_eq!(reply.body["data"][0]["name"], "urgent");
    }

    let foreign = app
        .put(&format!("/api/tasks/{task_id}/tags/{bobs_tag_id}"), &ada)
        .await;
    assert_eq!(foreign.status, StatusCode::NOT_FOUND);

    let listed = app.get(&format!("/api/tasks/{task_id}/tags"), &ada).await;
    assert_eq!(listed.body["meta"]["total"], 1);

    assert_eq!(app.delete(&link, &ada).await.status, StatusCode::NO_CONTENT);
    assert_eq!(app.delete(&link, &ada).await.status, StatusCode::NOT_FOUND);

    // Deleting a tag removes it from every task.
    app.put(&link, &ada).await;
    let removed = app.delete(&format!("/api/tags/{tag_id}"), &ada).await;
    assert_eq!(removed.status, StatusCode::NO_CONTENT);
    let listed = app.get(&format!("/api/tasks/{task_id}/tags"), &ada).await;
    assert_eq!(listed.body["data"], json!([]));
}

#[tokio::test]
async fn test_sqlite_backend_serves_same_api() {
    let dir = tempfile::tempdir().unwrap();
    let url = format!("sqlite://{}", dir.path().join("api.db").display());
    let store = Store::sqlite(&url, Duration::from_secs(1)).unwrap();
    let app = TestApp::with(store, test_config()).await;

    let health = app.call(Method::GET, "/api/health", None, None).await;
    assert_eq!(health.body["data"]["storage"], "sqlite");

    let ada = app.register("ada@example.com").await;
    let created = app
        .post("/api/notes", &ada, json!({"title": "Persisted", "content": "hello"}))
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    let uri = format!("/api/notes/{}", created.body["data"]["id"].as_str().unwrap());

    let fetched = app.get(&uri, &ada).await;
    assert_eq!(fetched.body["data"], created.body["data"]);

    let patched = app.patch(&uri, &ada, json!({"content": ""})).await;
    assert_eq!(patched.status, StatusCode::OK);
    assert_eq!(patched.body["data"]["content"], "");

    let precise = app
        .post(
            "/api/tasks",
            &ada,
            json!({"title": "Precise", "dueDate": "2026-05-01T09:00:00.123456789Z"}),
        )
        .await;
    assert_eq!(precise.status, StatusCode::CREATED);
    let uri = format!("/api/tasks/{}", precise.body["data"]["id"].as_str().unwrap());
    assert_eq!(app.get(&uri, &ada).await.body["data"], precise.body["data"]);
    assert_eq!(
        timestamp(&precise.body["data"]["dueDate"]).timestamp_subsec_nanos(),
        123_456_000
    );

    let tag = app.post("/api/tags", &ada, json!({"name": "dup"})).await;
    assert_eq!(tag.status, StatusCode::CREATED);
    let clash = app.post("/api/tags", &ada, json!({"name": "dup"})).await;
    assert_eq!(clash.status, StatusCode::CONFLICT);
    assert_eq!(detail_fields(&clash.body), ["name"]);
}
