//! docparser - PDF to structured data over OCR and an LLM.

mod config;
mod error;
mod export;
mod extractor;
mod models;
mod ocr;
mod openai;
mod sanitize;
mod storage;

use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config::AppConfig;
use error::DocParserError;
use extractor::Extractor;
use models::{ExtractionResult, UploadedDocument};
use ocr::{mistral::MistralOcrProvider, OcrProvider};
use openai::OpenAiClient;
use std::sync::Arc;
use storage::DocumentStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    store: DocumentStore,
    ocr: Arc<dyn OcrProvider>,
    extractor: Extractor,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "docparser=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;
    info!(
        "Config loaded: media_root={:?}, ocr_model={}, llm_model={}",
        config.media_root, config.ocr.model, config.llm.model
    );

    let http = reqwest::Client::new();
    let ocr = MistralOcrProvider::new(&config.ocr, http.clone())?;
    let llm = OpenAiClient::new(&config.llm, http)?;
    info!("OCR provider '{}' and chat client initialized", ocr.name());

    let state = AppState {
        store: DocumentStore::new(&config.media_root),
        ocr: Arc::new(ocr),
        extractor: Extractor::new(Arc::new(llm)),
    };

    let app = router(state, config.max_upload_bytes);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/documents", post(upload_document))
        .route("/documents/:id", get(get_document))
        .route("/api/upload/", post(upload_document))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Default, serde::Deserialize)]
struct UploadQuery {
    format: Option<String>,
}

/// Upload a PDF, OCR it and extract the requested fields.
async fn upload_document(
    State(state): State<AppState>,
    Query(query): Query<UploadQuery>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, DocParserError> {
    let form = read_upload_form(multipart).await?;
    let (filename, data) = form.file.ok_or(DocParserError::MissingFile)?;

    info!(
        "Received file: {} ({} bytes), description: {} chars",
        filename,
        data.len(),
        form.description.len()
    );

    let doc = state.store.save(&filename, &data).await?;

    let result = process_document(&state, &doc, &form.description)
        .await
        .map_err(|e| {
            error!("Processing failed for document {}: {}", doc.id, e);
            e
        })?;

    info!(
        "Document {} processed: {} chars of markdown, {} data points",
        doc.id,
        result.markdown.len(),
        result.data_points.len()
    );

    if query.format.as_deref() == Some("csv") {
        let csv = export::data_points_to_csv(&result.data_points)?;
        return Ok((
            [
                (header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()),
                (
                    header::CONTENT_DISPOSITION,
                    format!("attachment; filename=\"{}\"", export::CSV_FILE_NAME),
                ),
            ],
            csv,
        )
            .into_response());
    }

    Ok((StatusCode::OK, Json(result)).into_response())
}

/// Fetch the stored record for an earlier upload.
async fn get_document(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<UploadedDocument>, DocParserError> {
    let doc = state.store.load(&id).await.map_err(|e| {
        if !matches!(e, DocParserError::DocumentNotFound(_)) {
            error!("Cannot load record for document {}: {}", id, e);
        }
        e
    })?;
    Ok(Json(doc))
}

// ============================================================================
// Helper functions
// ============================================================================

/// OCR followed by field extraction. All or nothing.
async fn process_document(
    state: &AppState,
    doc: &UploadedDocument,
    description: &str,
) -> Result<ExtractionResult, DocParserError> {
    let markdown = state.ocr.extract_text(&doc.file).await?;
    let data_points = state.extractor.extract_fields(&markdown, description).await?;
    Ok(ExtractionResult {
        markdown,
        data_points,
    })
}

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<(String, Vec<u8>)>,
    description: String,
}

/// Pull `file` and `description` out of the multipart body.
///
/// A body that is not multipart at all has no file, so it is reported as one.
async fn read_upload_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<UploadForm, DocParserError> {
    let Ok(mut multipart) = multipart else {
        return Err(DocParserError::MissingFile);
    };

    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Multipart error", e))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some("file") => {
                let filename = field.file_name().unwrap_or("document.pdf").to_string();
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| multipart_error("Failed to read file", e))?;
                if !data.is_empty() {
                    form.file = Some((filename, data.to_vec()));
                }
            }
            Some("description") => {
                form.description = field
                    .text()
                    .await
                    .map_err(|e| multipart_error("Failed to read description", e))?;
            }
            _ => {}
        }
    }

    Ok(form)
}

/// A body over the upload limit is 413; any other broken stream is 400.
fn multipart_error(context: &str, e: MultipartError) -> DocParserError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        DocParserError::PayloadTooLarge(e.body_text())
    } else {
        DocParserError::InvalidRequest(format!("{}: {}", context, e))
    }
}
