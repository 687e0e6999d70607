//! Axum Handlers for the REST API
//!
//! This module contains the logic for handling HTTP requests for modules and
//! document uploads. It uses `utoipa` doc comments to generate OpenAPI
//! documentation.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::{
    models::{CreateDocumentPayload, DocumentResponse, ErrorResponse, ModuleStatus, ModuleSummary},
    state::AppState,
};

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl<E> From<E> for ApiError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self::InternalServerError(err.into())
    }
}

/// List all modules, most recently updated first.
#[utoipa::path(
    get,
    path = "/modules",
    responses(
        (status = 200, description = "List of modules", body = [ModuleSummary]),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn list_modules(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ModuleSummary>>, ApiError> {
    Ok(Json(state.modules.list().await))
}

/// Get a specific module by its ID.
#[utoipa::path(
    get,
    path = "/modules/{id}",
    responses(
        (status = 200, description = "Module details", body = crate::models::ModuleRecord),
        (status = 404, description = "Module not found", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Module ID")
    )
)]
pub async fn get_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let module = state
        .modules
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Module with id '{}' not found", id)))?;
    Ok((StatusCode::OK, Json(module)))
}

/// Get a module's playable command script.
#[utoipa::path(
    get,
    path = "/modules/{id}/play",
    responses(
        (status = 200, description = "The module's command script", body = Object),
        (status = 404, description = "Module not found", body = ErrorResponse),
        (status = 409, description = "Module is not playable yet", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    ),
    params(
        ("id" = Uuid, Path, description = "Module ID")
    )
)]
pub async fn play_module(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let module = state
        .modules
        .get(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("Module with id '{}' not found", id)))?;

    match (module.status, module.script) {
        (ModuleStatus::Completed, Some(script)) => Ok((StatusCode::OK, Json(script))),
        (ModuleStatus::Failed, _) => Err(ApiError::Conflict(
            "Module generation failed; nothing to play.".to_string(),
        )),
        _ => Err(ApiError::Conflict(
            "Module is still generating.".to_string(),
        )),
    }
}

/// Upload a document for retrieval-grounded sessions and modules.
#[utoipa::path(
    post,
    path = "/documents",
    request_body = CreateDocumentPayload,
    responses(
        (status = 201, description = "Document indexed successfully", body = DocumentResponse),
        (status = 400, description = "Bad request", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateDocumentPayload>,
) -> Result<impl IntoResponse, ApiError> {
    if payload.text.trim().is_empty() {
        return Err(ApiError::BadRequest(
            "Document text must not be empty".to_string(),
        ));
    }

    let (id, chunks) = state.indexer.index_document(&payload.name, &payload.text).await?;

    Ok((
        StatusCode::CREATED,
        Json(DocumentResponse {
            id,
            name: payload.name,
            chunks,
        }),
    ))
}
