//! CSV exploratory-analysis upload server.
//!
//! - `GET  /`                       liveness message
//! - `POST /upload-csv`             multipart `file` + `schema_file`
//! - `GET  /static/plots/{file}`    charts written by the last upload

use std::sync::Arc;

use axum::{
    extract::{multipart::Field, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::json;
use tower_http::services::ServeDir;
use tracing::{error, info, warn};

use banklens_eda::{EdaError, EdaReport, EdaService};

const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;
pub const RUNNING_MESSAGE: &str = "AI-EDA Plot Server is running.";

#[derive(Clone)]
pub struct EdaState {
    service: Arc<EdaService>,
}

impl EdaState {
    pub fn new(service: EdaService) -> Self {
        Self { service: Arc::new(service) }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

enum UploadError {
    MissingField(&'static str),
    Multipart(String),
    Analysis(EdaError),
}

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::MissingField(name) => {
                (StatusCode::UNPROCESSABLE_ENTITY, format!("missing upload field `{name}`"))
            }
            Self::Multipart(message) => (StatusCode::BAD_REQUEST, message),
            Self::Analysis(error) if error.is_client_error() => {
                warn!(event_name = "eda.upload.rejected", error = %error, "upload rejected");
                (StatusCode::BAD_REQUEST, error.to_string())
            }
            Self::Analysis(error) => {
                error!(event_name = "eda.upload.failed", error = %error, "analysis failed");
                (StatusCode::INTERNAL_SERVER_ERROR, error.to_string())
            }
        };
        (status, Json(ErrorBody { error: message })).into_response()
    }
}

pub fn router(state: EdaState) -> Router {
    let plots = ServeDir::new(state.service.plot_dir());
    Router::new()
        .route("/", get(index))
        .route("/upload-csv", post(upload_csv))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .nest_service("/static/plots", plots)
        .with_state(state)
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({ "message": RUNNING_MESSAGE }))
}

async fn upload_csv(
    State(state): State<EdaState>,
    mut multipart: Multipart,
) -> Result<Json<EdaReport>, UploadError> {
    let mut csv = None;
    let mut schema = None;

    while let Some(field) =
        multipart.next_field().await.map_err(|error| UploadError::Multipart(error.body_text()))?
    {
        let name = field.name().map(str::to_owned);
        match name.as_deref() {
            Some("file") => csv = Some(read_field(field).await?),
            Some("schema_file") => schema = Some(read_field(field).await?),
            _ => {}
        }
    }

    let csv = csv.ok_or(UploadError::MissingField("file"))?;
    let schema = schema.ok_or(UploadError::MissingField("schema_file"))?;
    info!(
        event_name = "eda.upload.received",
        csv_bytes = csv.len(),
        schema_bytes = schema.len(),
        "csv upload received"
    );

    let report = state.service.analyze(&csv, &schema).await.map_err(UploadError::Analysis)?;
    Ok(Json(report))
}

async fn read_field(field: Field<'_>) -> Result<Vec<u8>, UploadError> {
    field
        .bytes()
        .await
        .map(|bytes| bytes.to_vec())
        .map_err(|error| UploadError::Multipart(error.body_text()))
}
