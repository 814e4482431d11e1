//! Content hierarchy handlers.
//!
//! `:level` is a table name (`exams`, `subjects`, `chapters`, `topics`,
//! `formula_cards`). Each handler runs one service call; the service
//! re-checks the role gate for the extracted editor.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};
use syllabus_core::policy::slug::check_slug_format;
use syllabus_core::{
    core_version, HierarchyLevel, HierarchyNode, HierarchyServiceError, MoveDirection,
    NodeChanges, NodeDraft, NodeId, NodePage,
};

use crate::auth::Editor;
use crate::error::AppError;
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub parent_id: Option<NodeId>,
}

#[derive(Debug, Deserialize)]
pub struct MoveRequest {
    pub direction: MoveDirection,
}

#[derive(Debug, Deserialize)]
pub struct SlugCheckParams {
    pub slug: String,
    pub exclude_id: Option<NodeId>,
}

#[derive(Debug, Serialize)]
pub struct SlugCheckResponse {
    pub slug: String,
    pub available: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: core_version(),
    })
}

pub async fn list_nodes(
    State(state): State<AppState>,
    Editor(_actor): Editor,
    Path(level): Path<String>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<NodePage>, AppError> {
    let level = parse_level(&level)?;
    let Query(params) = params.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let page = state
        .with_service(move |service| {
            service.list_page(level, params.parent_id, params.page, params.limit)
        })
        .await?;
    Ok(Json(page))
}

pub async fn create_node(
    State(state): State<AppState>,
    Editor(actor): Editor,
    Path(level): Path<String>,
    payload: Result<Json<NodeDraft>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let level = parse_level(&level)?;
    let Json(draft) = payload.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let node = state
        .with_service(move |service| service.create_node(&actor, level, draft))
        .await?;
    Ok((StatusCode::CREATED, Json(node)))
}

pub async fn get_node(
    State(state): State<AppState>,
    Editor(_actor): Editor,
    Path((level, id)): Path<(String, String)>,
) -> Result<Json<HierarchyNode>, AppError> {
    let (level, id) = parse_target(&level, &id)?;
    let node = state
        .with_service(move |service| service.get_node(level, id))
        .await?;
    Ok(Json(node))
}

pub async fn update_node(
    State(state): State<AppState>,
    Editor(actor): Editor,
    Path((level, id)): Path<(String, String)>,
    payload: Result<Json<NodeChanges>, JsonRejection>,
) -> Result<Json<HierarchyNode>, AppError> {
    let (level, id) = parse_target(&level, &id)?;
    let Json(changes) = payload.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let node = state
        .with_service(move |service| service.update_node(&actor, level, id, changes))
        .await?;
    Ok(Json(node))
}

pub async fn delete_node(
    State(state): State<AppState>,
    Editor(actor): Editor,
    Path((level, id)): Path<(String, String)>,
) -> Result<StatusCode, AppError> {
    let (level, id) = parse_target(&level, &id)?;
    state
        .with_service(move |service| service.delete_node(&actor, level, id))
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn move_node(
    State(state): State<AppState>,
    Editor(actor): Editor,
    Path((level, id)): Path<(String, String)>,
    payload: Result<Json<MoveRequest>, JsonRejection>,
) -> Result<Json<Vec<HierarchyNode>>, AppError> {
    let (level, id) = parse_target(&level, &id)?;
    let Json(request) = payload.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let siblings = state
        .with_service(move |service| service.move_node(&actor, level, id, request.direction))
        .await?;
    Ok(Json(siblings))
}

pub async fn slug_check(
    State(state): State<AppState>,
    Editor(_actor): Editor,
    Path(level): Path<String>,
    params: Result<Query<SlugCheckParams>, QueryRejection>,
) -> Result<Json<SlugCheckResponse>, AppError> {
    let level = parse_level(&level)?;
    let Query(params) = params.map_err(|err| AppError::BadRequest(err.body_text()))?;
    let slug = params.slug.trim().to_string();
    check_slug_format(&slug).map_err(HierarchyServiceError::from)?;
    let lookup = slug.clone();
    let available = state
        .with_service(move |service| {
            service.is_slug_available(level, &lookup, params.exclude_id)
        })
        .await?;
    Ok(Json(SlugCheckResponse { slug, available }))
}

fn parse_level(value: &str) -> Result<HierarchyLevel, AppError> {
    HierarchyLevel::from_table(value).ok_or_else(|| AppError::UnknownLevel(value.to_string()))
}

fn parse_target(level: &str, id: &str) -> Result<(HierarchyLevel, NodeId), AppError> {
    let level = parse_level(level)?;
    let id = NodeId::parse_str(id)
        .map_err(|_| AppError::BadRequest(format!("invalid node id `{id}`")))?;
    Ok((level, id))
}
