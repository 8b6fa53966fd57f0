use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post, put},
    Json, Router,
};
use footprint_planner::{export, fetch_feeds, PlanOutcome, PlannerError, PlanningArea};
use orbital_elements::{parse_bulk, ElementError, ParsedBatch};
use sensor_tree::{ElementUpdate, NodeState, TreeError, TreeNode};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::sessions::{ClientSession, SessionHandle};
use crate::AppState;

type Rejection = (StatusCode, String);

#[derive(Serialize)]
pub struct SessionCreated {
    pub session_id: Uuid,
}

#[derive(Serialize)]
pub struct TreeNodeView {
    #[serde(flatten)]
    pub node: TreeNode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<NodeState>,
}

#[derive(Serialize)]
pub struct TreeResponse {
    pub nodes: Vec<TreeNodeView>,
    pub selected_sensor_ids: Vec<String>,
}

#[derive(Deserialize)]
pub struct ToggleRequest {
    pub node_id: String,
    pub checked: bool,
}

#[derive(Serialize)]
pub struct SelectionResponse {
    pub selected_sensor_ids: Vec<String>,
    pub count: usize,
}

#[derive(Deserialize, Default)]
pub struct PlanRequest {
    pub horizon_days: Option<u32>,
}

#[derive(Deserialize, Default)]
pub struct FeedRequest {
    /// Overrides the gateway's configured feed URLs when non-empty
    #[serde(default)]
    pub urls: Vec<String>,
}

#[derive(Serialize)]
pub struct FeedResponse {
    #[serde(flatten)]
    pub update: ElementUpdate,
    pub total: usize,
    pub sites_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_sites: Vec<String>,
    pub rejected_lines: usize,
}

fn planner_rejection(e: PlannerError) -> Rejection {
    let status = match &e {
        PlannerError::NoAreaDefined | PlannerError::InvalidHorizon(_) => StatusCode::BAD_REQUEST,
        PlannerError::EngineUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        PlannerError::EngineFailed(_) => StatusCode::BAD_GATEWAY,
        PlannerError::Tree(TreeError::InvalidReference(_) | TreeError::NotFound(_)) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PlannerError::Elements(ElementError::EmptyBatch { .. }) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        PlannerError::Elements(_) => StatusCode::BAD_REQUEST,
        PlannerError::Tree(_) | PlannerError::Io(_) | PlannerError::Json(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    (status, e.to_string())
}

async fn find_session(state: &AppState, id: &Uuid) -> Result<SessionHandle, Rejection> {
    state
        .sessions
        .get(id)
        .await
        .ok_or((StatusCode::NOT_FOUND, format!("Session {} not found", id)))
}

fn selection(session: &ClientSession) -> SelectionResponse {
    let selected_sensor_ids = session.tree.selected_sensor_ids();
    SelectionResponse {
        count: selected_sensor_ids.len(),
        selected_sensor_ids,
    }
}

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "planning-gateway",
        "engine_ready": state.engine.is_ready(),
        "sessions": state.sessions.count().await,
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Validate pasted 3-line element text without touching any session
pub async fn parse_elements(body: String) -> Result<Json<ParsedBatch>, Rejection> {
    parse_bulk(&body)
        .map(Json)
        .map_err(|e| planner_rejection(e.into()))
}

pub async fn create_session(
    State(state): State<AppState>,
) -> (StatusCode, Json<SessionCreated>) {
    let session = ClientSession::new(
        state.tree.as_ref().clone(),
        state.engine.clone(),
        state.config.as_ref().clone(),
    );
    let session_id = state.sessions.create(session).await;
    info!("Created planning session {}", session_id);

    (StatusCode::CREATED, Json(SessionCreated { session_id }))
}

pub async fn delete_session(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    if state.sessions.remove(&id).await {
        info!("Closed planning session {}", id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err((StatusCode::NOT_FOUND, format!("Session {} not found", id)))
    }
}

pub async fn get_tree(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<TreeResponse>, Rejection> {
    let handle = find_session(&state, &id).await?;
    let session = handle.read().await;

    let nodes = session
        .tree
        .nodes()
        .map(|node| TreeNodeView {
            state: session.tree.state(&node.id),
            node: node.clone(),
        })
        .collect();

    Ok(Json(TreeResponse {
        nodes,
        selected_sensor_ids: session.tree.selected_sensor_ids(),
    }))
}

pub async fn toggle(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<ToggleRequest>,
) -> Result<Json<SelectionResponse>, Rejection> {
    let handle = find_session(&state, &id).await?;
    let mut session = handle.write().await;

    session
        .tree
        .toggle(&req.node_id, req.checked)
        .map_err(|e| planner_rejection(e.into()))?;

    Ok(Json(selection(&session)))
}

pub async fn get_selection(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SelectionResponse>, Rejection> {
    let handle = find_session(&state, &id).await?;
    let session = handle.read().await;
    Ok(Json(selection(&session)))
}

pub async fn set_area(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(area): Json<PlanningArea>,
) -> Result<Json<PlanningArea>, Rejection> {
    if !area.is_well_formed() {
        return Err((
            StatusCode::BAD_REQUEST,
            "Area must satisfy min_lon < max_lon and min_lat < max_lat within range".into(),
        ));
    }

    let handle = find_session(&state, &id).await?;
    handle.write().await.planning.set_area(area);
    Ok(Json(area))
}

pub async fn clear_area(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, Rejection> {
    let handle = find_session(&state, &id).await?;
    handle.write().await.planning.clear_area();
    Ok(StatusCode::NO_CONTENT)
}

/// Parse element text and write it into the session's satellites
pub async fn apply_elements(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    body: String,
) -> Result<Json<ElementUpdate>, Rejection> {
    let batch = parse_bulk(&body).map_err(|e| planner_rejection(e.into()))?;

    let handle = find_session(&state, &id).await?;
    let update = handle.write().await.tree.apply_elements(&batch.records);
    debug!("Session {}: {:?}", id, update);

    Ok(Json(update))
}

/// Fetch element feeds and write the records into the session's satellites
pub async fn apply_feeds(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<FeedRequest>>,
) -> Result<Json<FeedResponse>, Rejection> {
    let req = payload.map(|Json(req)| req).unwrap_or_default();
    let urls = if req.urls.is_empty() {
        state.feed_urls.as_ref().clone()
    } else {
        req.urls
    };
    if urls.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "No element feed URLs given or configured".into(),
        ));
    }

    let handle = find_session(&state, &id).await?;
    let fetch = fetch_feeds(&state.http, &urls).await;
    if fetch.all_failed() {
        warn!("Session {}: all {} element feeds failed", id, urls.len());
        return Err((
            StatusCode::BAD_GATEWAY,
            format!("All {} element feeds failed", urls.len()),
        ));
    }
    if fetch.records.is_empty() {
        return Err((
            StatusCode::UNPROCESSABLE_ENTITY,
            "No element sets found in feeds".into(),
        ));
    }

    let update = handle.write().await.tree.apply_elements(&fetch.records);
    info!(
        "Session {}: feeds applied ({} sites, {} updated, {} failed)",
        id,
        fetch.sites_fetched,
        update.updated,
        fetch.failed_sites.len()
    );

    Ok(Json(FeedResponse {
        total: fetch.records.len(),
        sites_count: fetch.sites_fetched,
        failed_sites: fetch.failed_sites,
        rejected_lines: fetch.rejected_lines,
        update,
    }))
}

/// Run on a snapshot so toggles stay accepted while the engine works
async fn plan_snapshot(
    state: &AppState,
    id: &Uuid,
    horizon_days: Option<u32>,
) -> Result<PlanOutcome, Rejection> {
    let handle = find_session(state, id).await?;
    let snapshot = handle.read().await.clone();

    snapshot
        .planning
        .run(&snapshot.tree, horizon_days)
        .await
        .map_err(planner_rejection)
}

pub async fn run_plan(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<PlanRequest>>,
) -> Result<Json<PlanOutcome>, Rejection> {
    let req = payload.map(|Json(req)| req).unwrap_or_default();
    let outcome = plan_snapshot(&state, &id, req.horizon_days).await?;
    Ok(Json(outcome))
}

pub async fn run_plan_geojson(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    payload: Option<Json<PlanRequest>>,
) -> Result<Json<serde_json::Value>, Rejection> {
    let req = payload.map(|Json(req)| req).unwrap_or_default();
    let outcome = plan_snapshot(&state, &id, req.horizon_days).await?;
    Ok(Json(export::to_geojson(&outcome)))
}

pub fn router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/elements/parse", post(parse_elements))
        .route("/sessions", post(create_session))
        .route("/sessions/:id", delete(delete_session))
        .route("/sessions/:id/tree", get(get_tree))
        .route("/sessions/:id/toggle", post(toggle))
        .route("/sessions/:id/selection", get(get_selection))
        .route("/sessions/:id/area", put(set_area).delete(clear_area))
        .route("/sessions/:id/elements", post(apply_elements))
        .route("/sessions/:id/elements/feed", post(apply_feeds))
        .route("/sessions/:id/plan", post(run_plan))
        .route("/sessions/:id/plan/geojson", post(run_plan_geojson))
        .with_state(state.clone());

    Router::new()
        .route("/health", get(health))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
