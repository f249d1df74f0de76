use axum::{
    Router,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::{OpenApi, ToSchema};

use depot_files::{
    DepotConfig, File, FileId, FileRepository, FilesError, StorageError, TracingNotifier,
    UploadSource, UploadedFile, resolve_config_path,
};

/// Application state shared across REST API handlers
///
/// Repository calls are blocking (filesystem backends), so handlers run them on
/// tokio's blocking pool.
#[derive(Clone)]
struct AppState {
    repository: Arc<FileRepository>,
}

#[derive(Serialize, ToSchema)]
struct HealthRes {
    ok: bool,
    message: String,
}

/// One entry of `GET /files`
#[derive(Serialize, ToSchema)]
struct FileSummary {
    id: String,
    disk: String,
    fullname: String,
    /// `null` when the bytes are missing or the disk has no public URL
    url: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct ListFilesRes {
    files: Vec<FileSummary>,
}

#[derive(Serialize, ToSchema)]
struct FileRes {
    id: String,
    name: String,
    extension: Option<String>,
    mime: Option<String>,
    disk: String,
    path: String,
    fullname: String,
    size: u64,
    created_at: String,
    updated_at: String,
    url: Option<String>,
}

/// Multipart body accepted by `POST /files/upload`
#[allow(dead_code)]
#[derive(ToSchema)]
struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
    /// e.g. "photos/", "photos/me.png" or "archive::2024/"
    destination: Option<String>,
    disk: Option<String>,
}

#[derive(Serialize, ToSchema)]
struct ErrorRes {
    error: String,
}

#[derive(OpenApi)]
#[openapi(
    paths(health, list_files, upload_file, get_file, get_file_content),
    components(schemas(
        HealthRes,
        FileSummary,
        ListFilesRes,
        FileRes,
        UploadForm,
        ErrorRes
    ))
)]
struct ApiDoc;

/// HTTP error carrying the status a [`FilesError`] maps to
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.into(),
        }
    }

    fn internal() -> Self {
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal error".into(),
        }
    }
}

impl From<FilesError> for ApiError {
    fn from(err: FilesError) -> Self {
        match err {
            FilesError::NotFound { .. } | FilesError::RecordNotFound(_) => Self {
                status: StatusCode::NOT_FOUND,
                message: err.to_string(),
            },
            FilesError::InvalidArgument(_) | FilesError::UnknownDisk(_) => {
                Self::bad_request(err.to_string())
            }
            other => {
                tracing::error!("Repository error: {:?}", other);
                Self::internal()
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorRes {
                error: self.message,
            }),
        )
            .into_response()
    }
}

/// Main entry point for the depot REST server
///
/// # Environment Variables
/// - `DEPOT_REST_ADDR`: listen address (default: "0.0.0.0:3000")
/// - `DEPOT_CONFIG`: configuration file (default: `depot.yaml` in the working directory)
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("depot_run=info".parse()?)
                .add_directive("depot_files=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let rest_addr = std::env::var("DEPOT_REST_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".into());
    let config_path =
        resolve_config_path(std::env::var_os("DEPOT_CONFIG").map(PathBuf::from))?;
    let config = DepotConfig::load(&config_path)?;
    let repository = config.repository(Arc::new(TracingNotifier))?;

    tracing::info!("++ Loaded configuration from {}", config_path.display());
    tracing::info!("++ Starting depot REST on {}", rest_addr);

    let app = router(AppState {
        repository: Arc::new(repository),
    });

    let listener = tokio::net::TcpListener::bind(&rest_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/files", get(list_files))
        .route("/files/upload", post(upload_file))
        .route("/files/:id", get(get_file))
        .route("/files/:id/content", get(get_file_content))
        .route("/api-docs/openapi.json", get(openapi_json))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Runs a blocking repository call on the blocking pool.
async fn with_repository<T, F>(state: &AppState, call: F) -> Result<T, ApiError>
where
    T: Send + 'static,
    F: FnOnce(&FileRepository) -> Result<T, ApiError> + Send + 'static,
{
    let repository = state.repository.clone();
    tokio::task::spawn_blocking(move || call(&repository))
        .await
        .map_err(|e| {
            tracing::error!("Repository task failed: {:?}", e);
            ApiError::internal()
        })?
}

fn parse_id(id: &str) -> Result<FileId, ApiError> {
    FileId::parse(id).map_err(|e| ApiError::bad_request(e.to_string()))
}

/// Public URL for listings; `None` when the bytes are missing or the disk publishes no URLs.
fn public_url(repository: &FileRepository, file: &File) -> Result<Option<String>, ApiError> {
    match repository.url(file) {
        Ok(url) => Ok(Some(url)),
        Err(FilesError::NotFound { .. })
        | Err(FilesError::Backend {
            source: StorageError::Unsupported(_),
            ..
        }) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn file_res(repository: &FileRepository, file: &File) -> Result<FileRes, ApiError> {
    Ok(FileRes {
        id: file.id().to_string(),
        name: file.name().to_string(),
        extension: file.extension().map(str::to_owned),
        mime: file.mime().map(|m| m.to_string()),
        disk: file.disk().to_string(),
        path: file.path().to_owned(),
        fullname: file.fullname(),
        size: file.size(),
        created_at: file.created_at().to_rfc3339(),
        updated_at: file.updated_at().to_rfc3339(),
        url: public_url(repository, file)?,
    })
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Health check response", body = HealthRes)
    )
)]
/// Health check endpoint used by monitoring and load balancers
async fn health() -> Json<HealthRes> {
    Json(HealthRes {
        ok: true,
        message: "Depot is alive".into(),
    })
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Every recorded file", body = ListFilesRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// List all recorded files with their public URLs
async fn list_files(State(state): State<AppState>) -> Result<Json<ListFilesRes>, ApiError> {
    let files = with_repository(&state, |repository| {
        let files = repository.list()?;
        files
            .iter()
            .map(|file| {
                Ok(FileSummary {
                    id: file.id().to_string(),
                    disk: file.disk().to_string(),
                    fullname: file.fullname(),
                    url: public_url(repository, file)?,
                })
            })
            .collect()
    })
    .await?;

    Ok(Json(ListFilesRes { files }))
}

#[utoipa::path(
    post,
    path = "/files/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = FileRes),
        (status = 400, description = "Bad request", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Store an uploaded file
///
/// Multipart fields: `file` (required), `destination` (default `/`), `disk`.
async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<FileRes>), ApiError> {
    let mut upload: Option<UploadedFile> = None;
    let mut destination = String::from("/");
    let mut disk: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Failed to parse multipart field: {}", e)))?
    {
        let field_name = field.name().map(str::to_owned);
        match field_name.as_deref() {
            Some("file") => {
                let original_name = field
                    .file_name()
                    .map(str::to_owned)
                    .ok_or_else(|| ApiError::bad_request("multipart field 'file' has no filename"))?;
                let declared = field.content_type().map(str::to_owned);
                let bytes = field.bytes().await.map_err(|e| {
                    ApiError::bad_request(format!("Failed reading file field: {}", e))
                })?;
                let mut file = UploadedFile::new(original_name, bytes.to_vec());
                if file.mime().is_none() {
                    if let Some(declared) = declared {
                        file = file.with_mime(declared);
                    }
                }
                upload = Some(file);
            }
            Some("destination") => {
                destination = field.text().await.map_err(|e| {
                    ApiError::bad_request(format!("Invalid destination field: {}", e))
                })?;
            }
            Some("disk") => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Invalid disk field: {}", e)))?;
                disk = Some(value).filter(|d| !d.trim().is_empty());
            }
            _ => {}
        }
    }

    let upload =
        upload.ok_or_else(|| ApiError::bad_request("missing multipart file field 'file'"))?;

    let created = with_repository(&state, move |repository| {
        let file = repository.create_from_upload(&upload, &destination, disk.as_deref())?;
        file_res(repository, &file)
    })
    .await?;

    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "File record", body = FileRes),
        (status = 400, description = "Malformed id", body = ErrorRes),
        (status = 404, description = "No such file", body = ErrorRes)
    )
)]
/// Fetch one file record
async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<FileRes>, ApiError> {
    let id = parse_id(&id)?;
    let file = with_repository(&state, move |repository| {
        let file = repository.find(id)?;
        file_res(repository, &file)
    })
    .await?;

    Ok(Json(file))
}

#[utoipa::path(
    get,
    path = "/files/{id}/content",
    params(("id" = String, Path, description = "File id")),
    responses(
        (status = 200, description = "Raw file bytes"),
        (status = 400, description = "Malformed id", body = ErrorRes),
        (status = 404, description = "No such file, or its bytes are missing", body = ErrorRes)
    )
)]
/// Stream the stored bytes of one file
async fn get_file_content(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&id)?;
    let (mime, contents) = with_repository(&state, move |repository| {
        let file = repository.find(id)?;
        let contents = repository.content(&file)?;
        let mime = file
            .mime()
            .map(|m| m.to_string())
            .unwrap_or_else(|| "application/octet-stream".into());
        Ok((mime, contents))
    })
    .await?;

    Ok(([(header::CONTENT_TYPE, mime)], contents).into_response())
}

async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
