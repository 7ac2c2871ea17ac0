use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, Multipart, Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;

use crate::config::ServerConfig;
use crate::downloader::EXPORT_FILE_NAME;
use crate::error::{ExportError, LoadError, SettingsError, ValidationError};
use crate::mapping::ColumnMapping;
use crate::production::EntryForm;
use crate::saving::SettingsStore;
use crate::session::Session;
use crate::table::Table;

/// Largest master workbook accepted by the upload endpoint
const MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;

pub struct AppState {
    session: Mutex<Session>,
    header_row: usize,
}

impl AppState {
    pub fn new(session: Session, header_row: usize) -> Self {
        AppState {
            session: Mutex::new(session),
            header_row,
        }
    }

    // A panic in one handler must not lock the operator out of the session
    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[derive(Serialize)]
struct StatusResponse {
    status: String,
    message: Option<String>,
}

/// Any failure a handler reports back to the page
#[derive(Debug)]
pub enum ApiError {
    Load(LoadError),
    Validation(ValidationError),
    Settings(SettingsError),
    Export(ExportError),
    BadRequest(String),
}

impl From<LoadError> for ApiError {
    fn from(e: LoadError) -> Self {
        ApiError::Load(e)
    }
}

impl From<ValidationError> for ApiError {
    fn from(e: ValidationError) -> Self {
        ApiError::Validation(e)
    }
}

impl From<SettingsError> for ApiError {
    fn from(e: SettingsError) -> Self {
        ApiError::Settings(e)
    }
}

impl From<ExportError> for ApiError {
    fn from(e: ExportError) -> Self {
        ApiError::Export(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Load(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Validation(e @ ValidationError::Unconfigured(_)) => {
                (StatusCode::UNPROCESSABLE_ENTITY, e.to_string())
            }
            ApiError::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()),
            ApiError::Settings(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::Export(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, message),
        };

        if status.is_server_error() {
            error!("{}", message);
        } else {
            warn!("{}", message);
        }

        let body = StatusResponse {
            status: "error".to_string(),
            message: Some(message),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Deserialize)]
struct LineQuery {
    line: String,
}

#[derive(Deserialize)]
struct PairQuery {
    line: String,
    weld: String,
}

#[derive(Deserialize)]
struct KeyColumns {
    line: String,
    weld: String,
}

#[derive(Deserialize)]
struct ColumnList {
    columns: Vec<String>,
}

#[derive(Deserialize)]
struct FreeColumns {
    text: String,
}

/// Build the router over an existing application state
///
/// Split from [`run`] so the routes can be exercised without a socket.
pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    Router::new()
        .route("/", get(serve_landing))
        .route("/api/mapping", get(get_mapping).put(put_mapping))
        .route("/api/mapping/suggest", get(suggest_mapping))
        .route("/api/mapping/keys", post(set_key_columns))
        .route("/api/mapping/auto_fill", post(set_auto_fill))
        .route("/api/mapping/reference", post(set_reference))
        .route("/api/mapping/custom", post(set_custom))
        .route("/api/mapping/save", post(force_save))
        .route(
            "/api/master",
            get(get_master)
                .post(upload_master)
                .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/api/lines", get(get_lines))
        .route("/api/welds", get(get_welds))
        .route("/api/reference", get(get_reference))
        .route("/api/record", get(get_record))
        .route("/api/log", get(get_log).post(submit_entry).put(replace_log))
        .route("/api/log/export", get(export_log))
        .route("/api/log/export.csv", get(export_log_csv))
        .nest_service("/static", ServeDir::new(&config.static_dir))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub async fn run(config: ServerConfig) -> Result<(), Box<dyn std::error::Error>> {
    let mut session = Session::open(SettingsStore::new(&config.settings_path));

    // A fixed master file is optional; the page can still upload one
    if let Some(path) = &config.master_path {
        if let Err(e) = session.load_master(path, config.header_row) {
            error!("Could not load {}: {}", path.display(), e);
        }
    }

    let app_state = Arc::new(AppState::new(session, config.header_row));
    let app = router(app_state, &config);

    let listener = TcpListener::bind(&config.addr).await?;
    info!("Listening on http://{}", config.addr);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn serve_landing() -> Html<&'static str> {
    Html(include_str!("./static/index.html"))
}

async fn get_mapping(State(state): State<Arc<AppState>>) -> Json<ColumnMapping> {
    Json(state.session().mapping().clone())
}

async fn put_mapping(
    State(state): State<Arc<AppState>>,
    Json(mapping): Json<ColumnMapping>,
) -> Result<impl IntoResponse, ApiError> {
    let mismatches = state.session().set_mapping(mapping)?;
    Ok(Json(serde_json::json!({ "status": "ok", "mismatches": mismatches })))
}

async fn suggest_mapping(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let session = state.session();
    let suggestion = session
        .mapping_suggestion()
        .ok_or(ValidationError::NoMasterTable)?;
    Ok(Json(suggestion))
}

async fn set_key_columns(
    State(state): State<Arc<AppState>>,
    Json(keys): Json<KeyColumns>,
) -> Result<impl IntoResponse, ApiError> {
    let mismatches = state.session().set_key_columns(keys.line, keys.weld)?;
    Ok(Json(serde_json::json!({ "status": "ok", "mismatches": mismatches })))
}

async fn set_auto_fill(
    State(state): State<Arc<AppState>>,
    Json(list): Json<ColumnList>,
) -> Result<impl IntoResponse, ApiError> {
    let mismatches = state.session().set_auto_fill_columns(list.columns)?;
    Ok(Json(serde_json::json!({ "status": "ok", "mismatches": mismatches })))
}

async fn set_reference(
    State(state): State<Arc<AppState>>,
    Json(list): Json<ColumnList>,
) -> Result<impl IntoResponse, ApiError> {
    let mismatches = state.session().set_reference_columns(list.columns)?;
    Ok(Json(serde_json::json!({ "status": "ok", "mismatches": mismatches })))
}

async fn set_custom(
    State(state): State<Arc<AppState>>,
    Json(free): Json<FreeColumns>,
) -> Result<impl IntoResponse, ApiError> {
    let columns = state.session().set_custom_columns(&free.text)?;
    Ok(Json(serde_json::json!({ "status": "ok", "columns": columns })))
}

async fn force_save(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    state.session().save_mapping()?;
    Ok(Json(StatusResponse {
        status: "ok".to_string(),
        message: Some("Settings saved to disk".to_string()),
    }))
}

async fn get_master(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let session = state.session();
    let master = session.master().ok_or(ValidationError::NoMasterTable)?;
    Ok(Json(serde_json::json!({
        "source": master.source,
        "rows": master.table.len(),
        "columns": master.table.columns(),
        "mismatches": session.mismatches(),
    })))
}

async fn upload_master(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    // Process the multipart form data
    let mut file: Option<(String, Vec<u8>)> = None;
    let mut header_row = state.header_row;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let name = field.file_name().unwrap_or("upload.xlsx").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some((name, data.to_vec()));
            }
            "header_row" => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| ApiError::BadRequest(e.to_string()))?;
                header_row = text
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::BadRequest(format!("invalid header row '{}'", text)))?;
            }
            _ => {}
        }
    }

    let Some((name, data)) = file else {
        return Err(ApiError::BadRequest("No file data received".to_string()));
    };

    let report = state.session().load_master_bytes(&name, &data, header_row)?;
    Ok(Json(report))
}

async fn get_lines(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.session().line_options()?))
}

async fn get_welds(
    State(state): State<Arc<AppState>>,
    Query(query): Query<LineQuery>,
) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.session().weld_options(&query.line)?))
}

async fn get_reference(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PairQuery>,
) -> Result<Response, ApiError> {
    match state.session().reference_info(&query.line, &query.weld)? {
        Some(lookup) => Ok(Json(lookup).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn get_record(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PairQuery>,
) -> Result<Response, ApiError> {
    match state.session().weld_record(&query.line, &query.weld)? {
        Some(record) => Ok(Json(record).into_response()),
        None => Ok(StatusCode::NOT_FOUND.into_response()),
    }
}

async fn get_log(State(state): State<Arc<AppState>>) -> Json<Table> {
    Json(state.session().log().table().clone())
}

async fn submit_entry(
    State(state): State<Arc<AppState>>,
    Json(form): Json<EntryForm>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.session().submit(&form)?;
    Ok((StatusCode::CREATED, Json(outcome)))
}

async fn replace_log(
    State(state): State<Arc<AppState>>,
    Json(edited): Json<Table>,
) -> Json<serde_json::Value> {
    let replaced = state.session().replace_log(edited);
    Json(serde_json::json!({ "status": "ok", "replaced": replaced }))
}

async fn export_log(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let buffer = state.session().export_log()?;

    // Return the workbook as a downloadable file
    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet".to_string(),
            ),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", EXPORT_FILE_NAME),
            ),
        ],
        buffer,
    )
        .into_response())
}

async fn export_log_csv(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let csv = state.session().export_log_csv()?;
    let file_name = EXPORT_FILE_NAME.replace(".xlsx", ".csv");

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file_name),
            ),
        ],
        csv,
    )
        .into_response())
}
