use axum::{
    extract::{rejection::JsonRejection, Query, State},
    Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::error::ApiError;
use crate::app::AppState;
use crate::knowledge::KnowledgeItem;
use crate::utils::ChatError;

#[derive(Debug, Deserialize)]
pub struct AddKnowledgeRequest {
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct KnowledgeQuery {
    pub category: Option<String>,
}

/// GET /api/knowledge?category=<c>
pub async fn list_knowledge(
    State(state): State<AppState>,
    Query(query): Query<KnowledgeQuery>,
) -> Json<Value> {
    let category = query.category.filter(|c| !c.is_empty());
    let data: Vec<String> = state
        .knowledge
        .list(category.as_deref())
        .into_iter()
        .map(|item| item.content)
        .collect();

    Json(json!({ "status": "success", "data": data }))
}

/// POST /api/knowledge
pub async fn add_knowledge(
    State(state): State<AppState>,
    payload: Result<Json<AddKnowledgeRequest>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Json(request) =
        payload.map_err(|e| ChatError::validation(format!("invalid request body: {}", e.body_text())))?;

    state
        .knowledge
        .add(KnowledgeItem::new(request.content, request.category))?;

    info!(total = state.knowledge.len(), "Knowledge item added");
    Ok(Json(json!({ "status": "success" })))
}
