//! Liveness check: the database answers and its schema is current.

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use tracing::warn;

use crate::response::ApiResponse;
use crate::state::AppState;
use flashmart_db::MigrationStatus;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthStatus {
    pub database: &'static str,
    pub migrations: MigrationStatus,
    pub server_time: String,
}

/// `GET /health`
pub async fn health(State(state): State<AppState>) -> Response {
    if !state.db.health_check().await {
        warn!("Health check failed: database unreachable");
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiResponse::error("Database unavailable"),
        )
            .into_response();
    }

    let migrations = match state.db.migration_status().await {
        Ok(status) => status,
        Err(e) => {
            warn!(error = %e, "Health check failed: cannot read migration status");
            return (
                StatusCode::SERVICE_UNAVAILABLE,
                ApiResponse::error("Database unavailable"),
            )
                .into_response();
        }
    };

    if !migrations.is_current() {
        warn!(
            applied = migrations.applied,
            total = migrations.total,
            "Health check failed: migrations pending"
        );
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            ApiResponse::error("Database migrations pending"),
        )
            .into_response();
    }

    ApiResponse::ok(HealthStatus {
        database: "connected",
        migrations,
        server_time: state.clock.now().to_rfc3339(),
    })
    .into_response()
}

#[cfg(test)]
mod tests {
    use crate::test_support::*;
    use axum::http::StatusCode;
    use flashmart_db::{Database, DbConfig};

    #[tokio::test]
    async fn test_health() {
        let app = TestApp::new().await;
        let (status, body) = app.get("/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["database"], "connected");
        assert_eq!(body["data"]["migrations"]["applied"], body["data"]["migrations"]["total"]);
    }

    #[tokio::test]
    async fn test_unknown_route_gets_envelope() {
        let app = TestApp::new().await;
        let (status, body) = app.get("/api/nothing-here", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_health_after_close() {
        let app = TestApp::new().await;
        app.db.close().await;
        let (status, body) = app.get("/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Database unavailable");
    }

    #[tokio::test]
    async fn test_health_reports_pending_migrations() {
        let db = Database::new(DbConfig::in_memory().run_migrations(false))
            .await
            .unwrap();
        let app = TestApp::with_db(db);

        let (status, body) = app.get("/health", None).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], "Database migrations pending");

        app.db.run_migrations().await.unwrap();
        let (status, _) = app.get("/health", None).await;
        assert_eq!(status, StatusCode::OK);
    }
}
