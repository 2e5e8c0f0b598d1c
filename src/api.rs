use std::path::PathBuf;
use axum::{
    extract::{DefaultBodyLimit, Json, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::{
    actions::{Action, SelectionShape},
    analytics_client::{SessionEvent, SessionStats, TimeRange},
    app_state::{AppState, Status},
    dispatcher::{ActionRequest, DispatchError, DispatcherStats, Outcome},
    models::{ArtifactKind, LocalFile, LocalTreeNode, Node},
    notify::{Notification, ScopedNotifier},
    remote::ServiceError,
    tree::TreeError,
    upload,
};

type ApiError = (StatusCode, Json<Value>);

/// Tamaño máximo de una subida multipart.
const UPLOAD_LIMIT_BYTES: usize = 256 * 1024 * 1024;

// --- Payloads y Respuestas de la API ---

#[derive(Deserialize)]
pub struct SelectDirPayload {
    #[serde(default)]
    path: String,
}

#[derive(Deserialize)]
pub struct SelectionPayload {
    #[serde(default)]
    selection: Vec<String>,
}

#[derive(Serialize)]
pub struct AllowedResponse {
    shape: SelectionShape,
    actions: Vec<Action>,
}

#[derive(Serialize)]
pub struct DispatchResponse {
    outcome: Outcome,
    notifications: Vec<Notification>,
}

#[derive(Deserialize)]
pub struct ChildrenQuery {
    #[serde(default)]
    grouped: bool,
}

#[derive(Deserialize)]
pub struct RangeQuery {
    #[serde(default)]
    range: TimeRange,
}

#[derive(Deserialize)]
pub struct LimitQuery {
    limit: Option<usize>,
}

#[derive(Deserialize)]
pub struct ArtifactPayload {
    content: String,
}

#[derive(Serialize)]
pub struct AnalyticsOverview {
    events: Vec<SessionEvent>,
    errors: Vec<SessionEvent>,
    stats: SessionStats,
}

#[derive(Serialize)]
pub struct StatusResponse {
    #[serde(flatten)]
    status: Status,
    #[serde(flatten)]
    stats: DispatcherStats,
}

// --- Router ---

pub fn create_router(app_state: AppState) -> Router {
    Router::new()
        .route("/api/projects/reload", post(reload_projects_handler))
        .route("/api/tree", get(tree_handler))
        .route("/api/nodes/:id/children", get(children_handler))
        .route("/api/nodes/:id/ancestors", get(ancestors_handler))
        .route("/api/actions/allowed", post(allowed_actions_handler))
        .route("/api/actions/dispatch", post(dispatch_handler))
        .route(
            "/api/upload",
            post(upload_handler).layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route("/api/artifacts/:project/:kind", put(save_artifact_handler))
        .route("/api/blobs/:token", get(blob_handler))
        .route("/api/notifications", get(notifications_handler))
        .route("/api/analytics/:project/events", get(analytics_events_handler))
        .route("/api/analytics/:project/errors", get(analytics_errors_handler))
        .route("/api/analytics/:project/stats", get(analytics_stats_handler))
        .route("/api/analytics/:project/overview", get(analytics_overview_handler))
        .route(
            "/api/tables",
            get(list_tables_handler)
                .post(upload_table_handler)
                .layer(DefaultBodyLimit::max(UPLOAD_LIMIT_BYTES)),
        )
        .route(
            "/api/tables/:id/config",
            get(table_config_handler).put(update_table_config_handler),
        )
        .route("/api/tables/:id", axum::routing::delete(delete_table_handler))
        .route("/api/list-directory", post(list_directory_handler))
        .route("/api/status", get(status_handler))
        .route("/api/shutdown", post(shutdown_handler))
        .with_state(app_state)
}

// --- Conversión de errores ---

fn api_error(status: StatusCode, message: impl std::fmt::Display) -> ApiError {
    (status, Json(json!({ "error": message.to_string() })))
}

fn tree_error(err: TreeError) -> ApiError {
    let status = match &err {
        TreeError::UnknownNode(_) => StatusCode::NOT_FOUND,
        TreeError::UploadMismatch { .. } | TreeError::Corrupted(_) => {
            error!("Error de integridad del árbol: {err}");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        _ => StatusCode::UNPROCESSABLE_ENTITY,
    };
    api_error(status, err)
}

fn dispatch_error(err: DispatchError) -> ApiError {
    match err {
        DispatchError::Tree(err) => tree_error(err),
        DispatchError::NotAllowed { .. } => api_error(StatusCode::FORBIDDEN, err),
        DispatchError::MissingArgument(_)
        | DispatchError::UnsupportedFile(_)
        | DispatchError::InvalidArtifact(_)
        | DispatchError::LocalFolder(_) => api_error(StatusCode::BAD_REQUEST, err),
    }
}

fn service_error(err: ServiceError) -> ApiError {
    error!("Error en un servicio remoto: {err}");
    let status = match err {
        ServiceError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        _ => StatusCode::BAD_GATEWAY,
    };
    api_error(status, err)
}

// --- Handlers del árbol y de las acciones ---

#[axum::debug_handler]
async fn reload_projects_handler(
    State(state): State<AppState>,
) -> Result<Json<Value>, ApiError> {
    {
        let mut status = state.status.lock().unwrap_or_else(|p| p.into_inner());
        status.is_busy = true;
        status.message = "Cargando proyectos...".to_string();
    }

    let notifier = ScopedNotifier::new(&state.notifications, false);
    let result = state.dispatcher.reload_projects(&notifier).await;

    *state.status.lock().unwrap_or_else(|p| p.into_inner()) = Status::ready();
    let reloaded = result.map_err(tree_error)?;
    Ok(Json(json!({
        "reloaded": reloaded,
        "notifications": notifier.into_notifications(),
    })))
}

#[axum::debug_handler]
async fn tree_handler(State(state): State<AppState>) -> Json<Vec<Node>> {
    Json(state.dispatcher.nodes().await)
}

#[axum::debug_handler]
async fn children_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<ChildrenQuery>,
) -> Result<Json<Vec<Node>>, ApiError> {
    state
        .dispatcher
        .children(&id, query.grouped)
        .await
        .map(Json)
        .map_err(tree_error)
}

#[axum::debug_handler]
async fn ancestors_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<Node>>, ApiError> {
    state
        .dispatcher
        .ancestors(&id)
        .await
        .map(Json)
        .map_err(tree_error)
}

#[axum::debug_handler]
async fn allowed_actions_handler(
    State(state): State<AppState>,
    Json(payload): Json<SelectionPayload>,
) -> Result<Json<AllowedResponse>, ApiError> {
    let (shape, actions) = state
        .dispatcher
        .allowed_for(&payload.selection)
        .await
        .map_err(tree_error)?;
    Ok(Json(AllowedResponse { shape, actions }))
}

#[axum::debug_handler]
async fn dispatch_handler(
    State(state): State<AppState>,
    Json(request): Json<ActionRequest>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let notifier = ScopedNotifier::new(&state.notifications, request.confirmed);
    let outcome = state
        .dispatcher
        .dispatch(request, &notifier)
        .await
        .map_err(dispatch_error)?;
    Ok(Json(DispatchResponse {
        outcome,
        notifications: notifier.into_notifications(),
    }))
}

/// Subida de ficheros: un campo `target` opcional con la carpeta destino y
/// uno o varios campos `files`.
#[axum::debug_handler]
async fn upload_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<DispatchResponse>, ApiError> {
    let mut request = ActionRequest::new(Action::UploadFile, &[]);
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "target" => {
                let target = field
                    .text()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
                request.current_folder = Some(target);
            }
            "files" => {
                let file_name = field
                    .file_name()
                    .map(str::to_string)
                    .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "Fichero sin nombre"))?;
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
                request.files.push(LocalFile::new(file_name, bytes.to_vec()));
            }
            other => warn!("Campo multipart ignorado: {other}"),
        }
    }
    info!("Subida de {} ficheros", request.files.len());

    let notifier = ScopedNotifier::new(&state.notifications, true);
    let outcome = state
        .dispatcher
        .dispatch(request, &notifier)
        .await
        .map_err(dispatch_error)?;
    Ok(Json(DispatchResponse {
        outcome,
        notifications: notifier.into_notifications(),
    }))
}

#[axum::debug_handler]
async fn save_artifact_handler(
    State(state): State<AppState>,
    Path((project, kind)): Path<(String, ArtifactKind)>,
    Json(payload): Json<ArtifactPayload>,
) -> Result<Json<DispatchResponse>, ApiError> {
    let notifier = ScopedNotifier::new(&state.notifications, true);
    let outcome = state
        .dispatcher
        .save_artifact(&project, kind, &payload.content, &notifier)
        .await
        .map_err(dispatch_error)?;
    Ok(Json(DispatchResponse {
        outcome,
        notifications: notifier.into_notifications(),
    }))
}

#[axum::debug_handler]
async fn blob_handler(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let blob = state
        .dispatcher
        .blob(&token)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "El recurso ha caducado o no existe."))?;
    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes))
}

#[axum::debug_handler]
async fn notifications_handler(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Json<Vec<Notification>> {
    Json(state.notifications.recent(query.limit.unwrap_or(20)))
}

// --- Handlers de analítica ---

#[axum::debug_handler]
async fn analytics_events_handler(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<SessionEvent>>, ApiError> {
    state
        .analytics
        .session_events(&project, query.range)
        .await
        .map(Json)
        .map_err(service_error)
}

#[axum::debug_handler]
async fn analytics_errors_handler(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<Vec<SessionEvent>>, ApiError> {
    state
        .analytics
        .session_error_events(&project, query.range)
        .await
        .map(Json)
        .map_err(service_error)
}

#[axum::debug_handler]
async fn analytics_stats_handler(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<SessionStats>, ApiError> {
    state
        .analytics
        .session_stats(&project, query.range)
        .await
        .map(Json)
        .map_err(service_error)
}

#[axum::debug_handler]
async fn analytics_overview_handler(
    State(state): State<AppState>,
    Path(project): Path<String>,
    Query(query): Query<RangeQuery>,
) -> Result<Json<AnalyticsOverview>, ApiError> {
    let analytics = &state.analytics;
    let (events, errors, stats) = futures::try_join!(
        analytics.session_events(&project, query.range),
        analytics.session_error_events(&project, query.range),
        analytics.session_stats(&project, query.range),
    )
    .map_err(service_error)?;
    Ok(Json(AnalyticsOverview {
        events,
        errors,
        stats,
    }))
}

// --- Handlers de tablas (servicio analista) ---

#[axum::debug_handler]
async fn list_tables_handler(State(state): State<AppState>) -> Result<Json<Vec<String>>, ApiError> {
    state.analyst.list_tables().await.map(Json).map_err(service_error)
}

#[axum::debug_handler]
async fn table_config_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.analyst.table_config(&id).await.map(Json).map_err(service_error)
}

#[axum::debug_handler]
async fn update_table_config_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(config): Json<Value>,
) -> Result<StatusCode, ApiError> {
    if !config.is_object() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "La configuración de la tabla debe ser un objeto JSON.",
        ));
    }
    state
        .analyst
        .update_table_config(&id, &config)
        .await
        .map_err(service_error)?;
    Ok(StatusCode::NO_CONTENT)
}

#[axum::debug_handler]
async fn delete_table_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.analyst.delete_table(&id).await.map_err(service_error)?;
    info!("Tabla {id} borrada");
    Ok(StatusCode::NO_CONTENT)
}

/// Alta de una tabla: campos `table` y `annotations`, ambos obligatorios.
#[axum::debug_handler]
async fn upload_table_handler(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, ApiError> {
    let mut table = None;
    let mut annotations = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?
    {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or(&name).to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| api_error(StatusCode::BAD_REQUEST, e))?;
        let file = LocalFile::new(file_name, bytes.to_vec());
        match name.as_str() {
            "table" => table = Some(file),
            "annotations" => annotations = Some(file),
            other => warn!("Campo multipart ignorado: {other}"),
        }
    }

    let (Some(table), Some(annotations)) = (table, annotations) else {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Se necesitan los campos 'table' y 'annotations'.",
        ));
    };
    let id = state
        .analyst
        .upload_table(table, annotations)
        .await
        .map_err(service_error)?;
    Ok(Json(json!({ "id": id })))
}

// --- Utilidades ---

#[axum::debug_handler]
async fn list_directory_handler(
    Json(payload): Json<SelectDirPayload>,
) -> Result<Json<LocalTreeNode>, ApiError> {
    let path = if payload.path.is_empty() {
        dirs::home_dir().ok_or_else(|| {
            api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "No se pudo determinar el directorio home del usuario.",
            )
        })?
    } else {
        PathBuf::from(&payload.path)
    };

    if !path.is_dir() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "La ruta proporcionada no es un directorio válido.",
        ));
    }

    upload::list_local_directory(&path).map(Json).map_err(|e| {
        api_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Error al leer el directorio: {e}"),
        )
    })
}

#[axum::debug_handler]
async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    let status = state.status.lock().unwrap_or_else(|p| p.into_inner()).clone();
    Json(StatusResponse {
        status,
        stats: state.dispatcher.stats().await,
    })
}

#[axum::debug_handler]
async fn shutdown_handler(State(state): State<AppState>) -> impl IntoResponse {
    info!("Petición de apagado recibida.");
    if let Some(sender) = state
        .shutdown_sender
        .lock()
        .unwrap_or_else(|p| p.into_inner())
        .take()
    {
        let _ = sender.send(());
    }
    StatusCode::OK
}
