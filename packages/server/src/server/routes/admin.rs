//! Admin endpoints for rules, the audit log and chat cleanup.
//!
//! GET    /api/admin/rules
//! POST   /api/admin/rules
//! PUT    /api/admin/rules/:id
//! POST   /api/admin/rules/bulk          {ids, is_active}
//! GET    /api/admin/audit?outcome=&limit=
//! DELETE /api/admin/chat/:room?sender=

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domains::moderation::models::{AuditRecord, ModerationOutcome, Rule, RuleInput};
use crate::server::app::AxumAppState;
use crate::server::error::ApiError;

const DEFAULT_AUDIT_LIMIT: i64 = 50;
const MAX_AUDIT_LIMIT: i64 = 500;

pub async fn list_rules_handler(
    Extension(state): Extension<AxumAppState>,
) -> Result<Json<Vec<Rule>>, ApiError> {
    Ok(Json(state.deps.rule_admin.list_rules().await?))
}

pub async fn create_rule_handler(
    Extension(state): Extension<AxumAppState>,
    Json(input): Json<RuleInput>,
) -> Result<(StatusCode, Json<Rule>), ApiError> {
    let rule = state.deps.rule_admin.create_rule(input).await?;
    Ok((StatusCode::CREATED, Json(rule)))
}

pub async fn update_rule_handler(
    Extension(state): Extension<AxumAppState>,
    Path(id): Path<i64>,
    Json(input): Json<RuleInput>,
) -> Result<Json<Rule>, ApiError> {
    Ok(Json(state.deps.rule_admin.update_rule(id, input).await?))
}

#[derive(Debug, Deserialize)]
pub struct BulkActiveRequest {
    pub ids: Vec<i64>,
    pub is_active: bool,
}

pub async fn bulk_set_active_handler(
    Extension(state): Extension<AxumAppState>,
    Json(request): Json<BulkActiveRequest>,
) -> Result<Json<Value>, ApiError> {
    let updated = state
        .deps
        .rule_admin
        .set_active(&request.ids, request.is_active)
        .await?;
    Ok(Json(json!({ "updated": updated })))
}

#[derive(Debug, Deserialize)]
pub struct AuditQuery {
    pub outcome: Option<String>,
    pub limit: Option<i64>,
}

pub async fn list_audit_handler(
    Extension(state): Extension<AxumAppState>,
    Query(query): Query<AuditQuery>,
) -> Result<Json<Vec<AuditRecord>>, ApiError> {
    let outcome = query
        .outcome
        .as_deref()
        .map(str::parse::<ModerationOutcome>)
        .transpose()
        .map_err(|e| ApiError::BadRequest(e.to_string()))?;
    let limit = query
        .limit
        .unwrap_or(DEFAULT_AUDIT_LIMIT)
        .clamp(1, MAX_AUDIT_LIMIT);

    let records = state.deps.audit_log.list_recent(outcome, limit).await?;
    Ok(Json(records))
}

#[derive(Debug, Deserialize)]
pub struct ChatCleanupQuery {
    pub sender: Option<String>,
}

pub async fn clear_chat_handler(
    Extension(state): Extension<AxumAppState>,
    Path(room): Path<String>,
    Query(query): Query<ChatCleanupQuery>,
) -> Result<Json<Value>, ApiError> {
    let deleted = state
        .deps
        .chat_history
        .clear(&room, query.sender.as_deref())
        .await?;
    Ok(Json(json!({ "deleted": deleted })))
}
