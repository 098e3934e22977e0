//! Common test utilities for integration tests
//!
//! This module provides shared infrastructure for integration tests:
//! - Test database setup (skipped when `DATABASE_URL` is unset)
//! - Router construction with a logging mailer and no Redis
//! - User registration and request helpers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use sqlx::PgPool;
use std::sync::Arc;
use tower::Service as _;
use uuid::Uuid;
use warden_api::app::{build_router, AppState};
use warden_api::config::Config;
use warden_shared::mailer::LogMailer;

pub const TEST_SECRET: &str = "integration-test-secret-at-least-32-chars";
pub const TEST_PASSWORD: &str = "correct-horse-9";

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
}

/// A registered user and their access token
pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

impl TestContext {
    /// Connects, migrates and builds the router; `None` when `DATABASE_URL` is unset
    pub async fn new() -> Option<Self> {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            eprintln!("DATABASE_URL not set, skipping integration test");
            return None;
        };

        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some(url.clone()),
            "JWT_SECRET" => Some(TEST_SECRET.to_string()),
            _ => None,
        })
        .expect("test config");

        let db = PgPool::connect(&config.database.url).await.expect("connect");
        warden_shared::db::migrations::run_migrations(&db).await.expect("migrate");

        let state = AppState::new(db.clone(), config, Arc::new(LogMailer), None);
        let app = build_router(state);

        Some(TestContext { db, app })
    }

    /// Sends a request and returns status plus parsed JSON body (`Null` when empty)
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = match body {
            Some(json) => builder
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().call(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into()))
        };

        (status, json)
    }

    /// Registers a fresh user, optionally with their own workspace
    pub async fn register(&self, workspace_name: Option<&str>) -> (TestUser, Option<Uuid>) {
        let email = unique_email();
        let (status, body) = self
            .send(
                "POST",
                "/v1/auth/register",
                None,
                Some(serde_json::json!({
                    "email": email,
                    "password": TEST_PASSWORD,
                    "workspace_name": workspace_name,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");

        let user = TestUser {
            id: body["user"]["id"].as_str().unwrap().parse().unwrap(),
            email,
            token: body["access_token"].as_str().unwrap().to_string(),
        };
        let workspace = body["workspace"]["id"].as_str().map(|id| id.parse().unwrap());

        (user, workspace)
    }

    /// Deletes a workspace directly (cascades every tenant row)
    pub async fn cleanup(&self, workspace_id: Uuid) {
        sqlx::query("DELETE FROM workspaces WHERE id = $1")
            .bind(workspace_id)
            .execute(&self.db)
            .await
            .unwrap();
    }
}

pub fn unique_email() -> String {
    format!("user-{}@example.com", Uuid::new_v4())
}
