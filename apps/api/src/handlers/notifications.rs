//! The caller's notification feed. Expired rows are filtered at read time;
//! the mail dispatcher's housekeeping deletes them later.

use axum::extract::{Path, State};
use serde::Serialize;

use crate::auth::AuthUser;
use crate::response::{ApiResponse, ApiResult};
use crate::state::AppState;
use flashmart_core::Notification;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: i64,
}

/// `GET /api/notifications`
pub async fn list_notifications(
    State(state): State<AppState>,
    user: AuthUser,
) -> ApiResult<NotificationFeed> {
    let now = state.clock.now();
    let repo = state.db.notifications();

    let feed = NotificationFeed {
        notifications: repo.list_for_user(&user.id, now).await?,
        unread_count: repo.unread_count(&user.id, now).await?,
    };

    Ok(ApiResponse::ok(feed))
}

/// `PUT /api/notifications/mark-all-read`
pub async fn mark_all_read(State(state): State<AppState>, user: AuthUser) -> ApiResult<()> {
    state.db.notifications().mark_all_read(&user.id).await?;
    Ok(ApiResponse::message("All notifications marked as read"))
}

/// `PUT /api/notifications/{id}`
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.db.notifications().mark_read(&user.id, &id).await?;
    Ok(ApiResponse::message("Notification marked as read"))
}

/// `DELETE /api/notifications/{id}`
pub async fn delete_notification(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<String>,
) -> ApiResult<()> {
    state.db.notifications().delete(&user.id, &id).await?;
    Ok(ApiResponse::message("Notification deleted"))
}

#[cfg(test)]
mod tests {
    use crate::auth::Role;
    use crate::test_support::*;
    use axum::http::{Method, StatusCode};
    use chrono::Duration;
    use flashmart_core::{Clock, Notification, NotificationKind};

    async fn seed(app: &TestApp, user: &str, message: &str) -> Notification {
        let n = Notification::new(user, NotificationKind::General, message, None, app.clock.now());
        app.db.notifications().insert(&n).await.unwrap();
        n
    }

    #[tokio::test]
    async fn test_feed_and_read_state() {
        let app = TestApp::new().await;
        let token = app.token("u1", Role::Customer);
        let first = seed(&app, "u1", "first").await;
        app.clock.advance(Duration::seconds(1));
        seed(&app, "u1", "second").await;
        seed(&app, "u2", "not yours").await;

        let (status, body) = app.get("/api/notifications", Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["unreadCount"], 2);
        assert_eq!(body["data"]["notifications"][0]["message"], "second");

        let (status, _) = app
            .request(
                Method::PUT,
                &format!("/api/notifications/{}", first.id),
                Some(&token),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = app.get("/api/notifications", Some(&token)).await;
        assert_eq!(body["data"]["unreadCount"], 1);

        let (status, body) = app
            .request(Method::PUT, "/api/notifications/mark-all-read", Some(&token), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "All notifications marked as read");
        let (_, body) = app.get("/api/notifications", Some(&token)).await;
        assert_eq!(body["data"]["unreadCount"], 0);
    }

    #[tokio::test]
    async fn test_expired_notifications_hidden() {
        let app = TestApp::new().await;
        let token = app.token("u1", Role::Customer);
        seed(&app, "u1", "old").await;

        app.clock.advance(Duration::days(30));
        let (_, body) = app.get("/api/notifications", Some(&token)).await;
        assert_eq!(body["data"]["notifications"].as_array().unwrap().len(), 0);
        assert_eq!(body["data"]["unreadCount"], 0);
    }

    #[tokio::test]
    async fn test_delete_only_own() {
        let app = TestApp::new().await;
        let owner = app.token("u1", Role::Customer);
        let other = app.token("u2", Role::Customer);
        let n = seed(&app, "u1", "hello").await;
        let uri = format!("/api/notifications/{}", n.id);

        let (status, body) = app.request(Method::DELETE, &uri, Some(&other), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Notification not found");

        let (status, _) = app.request(Method::DELETE, &uri, Some(&owner), None).await;
        assert_eq!(status, StatusCode::OK);

        let (_, body) = app.get("/api/notifications", Some(&owner)).await;
        assert_eq!(body["data"]["notifications"].as_array().unwrap().len(), 0);
    }
}
