use std::sync::Arc;

use axum::{extract::State, routing::post, Json, Router};
use serde::Deserialize;

use crate::error::AppResult;
use crate::services::ingress::{IngressService, NotificationRequest};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/", post(notify))
}

#[derive(Debug, Deserialize)]
pub struct NotifyBody {
    pub context: String,
    pub notification: NotificationRequest,
}

/// Accept one notification for durable delivery. The response echoes the
/// submission with its (possibly generated) idempotency token.
async fn notify(
    State(state): State<Arc<AppState>>,
    Json(body): Json<NotifyBody>,
) -> AppResult<Json<NotificationRequest>> {
    let service = IngressService::new(state.db.clone(), &state.config.notifier);
    let notification = service.notify(&body.context, body.notification).await?;
    Ok(Json(notification))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::testutil::{insert_user, test_pool};
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::util::ServiceExt;

    async fn app() -> (Router, sqlx::SqlitePool, i64) {
        let pool = test_pool().await;
        let alice = insert_user(&pool, "alice@example.com", "Alice", "Smith").await;
        let state = Arc::new(AppState {
            db: pool.clone(),
            config: Config::default(),
        });
        let router = Router::new()
            .nest("/api/notifications", router())
            .with_state(state);
        (router, pool, alice)
    }

    fn post_json(payload: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/notifications")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(payload.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn notify_accepts_a_valid_submission() {
        let (app, _pool, alice) = app().await;

        let response = app
            .oneshot(post_json(serde_json::json!({
                "context": "t",
                "notification": {
                    "priority": "DEFAULT_PRIORITY",
                    "recipientUserIds": [alice],
                    "subject": "s",
                    "plainText": "p"
                }
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let returned: serde_json::Value = serde_json::from_slice(&body).unwrap();
        let token = returned["token"].as_str().unwrap();
        assert_eq!(token.len(), 32);
        assert_eq!(returned["priority"], "DEFAULT_PRIORITY");
    }

    #[tokio::test]
    async fn notify_rejects_an_invalid_submission() {
        let (app, pool, alice) = app().await;

        let response = app
            .oneshot(post_json(serde_json::json!({
                "context": "t",
                "notification": {
                    "priority": "DEFAULT_PRIORITY",
                    "recipientUserIds": [alice],
                    "subject": "s"
                }
            })))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let returned: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(returned["error"]["code"], "INVALID_NOTIFICATION");

        let jobs: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notification_jobs")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(jobs, 0);
    }
}
