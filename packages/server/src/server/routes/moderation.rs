//! Submission checks.
//!
//! POST /api/posts/check     {actor, title, content}
//! POST /api/comments/check  {actor, content}
//!
//! Accepted content answers 200 `{"success": true}`. Rejected content answers
//! 400 with the grouped category message and per-field violation details. The
//! matched words themselves are never returned.

use axum::{
    extract::Extension,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;

use crate::server::app::AxumAppState;
use crate::server::error::ApiError;

const ANONYMOUS_ACTOR: &str = "anonymous";

#[derive(Debug, Deserialize)]
pub struct PostCheckRequest {
    #[serde(default)]
    pub actor: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentCheckRequest {
    #[serde(default)]
    pub actor: Option<String>,
    pub content: String,
}

fn actor_or_anonymous(actor: Option<String>) -> String {
    actor
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .unwrap_or_else(|| ANONYMOUS_ACTOR.to_string())
}

pub async fn check_post_handler(
    Extension(state): Extension<AxumAppState>,
    Json(request): Json<PostCheckRequest>,
) -> Response {
    let actor = actor_or_anonymous(request.actor);
    let verdict = state
        .deps
        .moderation
        .check_submission(&actor, &request.title, &request.content)
        .await;

    if verdict.accepted {
        return (StatusCode::OK, Json(json!({ "success": true }))).into_response();
    }

    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": verdict.error_message,
            "violation_details": verdict.details(),
        })),
    )
        .into_response()
}

pub async fn check_comment_handler(
    Extension(state): Extension<AxumAppState>,
    Json(request): Json<CommentCheckRequest>,
) -> Result<Response, ApiError> {
    let actor = actor_or_anonymous(request.actor);
    let verdict = state
        .deps
        .moderation
        .check_comment(&actor, &request.content)
        .await?;

    if verdict.accepted {
        return Ok((StatusCode::OK, Json(json!({ "success": true }))).into_response());
    }

    Ok((
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": verdict.error_message,
            "violations": verdict.public_violations(),
            "violation_category": verdict.primary_category,
        })),
    )
        .into_response())
}
