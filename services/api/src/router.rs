//! Axum Router Configuration
//!
//! This module defines the complete HTTP routing for the application,
//! including the REST API, WebSocket endpoint, and OpenAPI documentation.

use crate::{
    handlers,
    models::{
        CreateDocumentPayload, DocumentResponse, ErrorResponse, ModuleRecord, ModuleStatus,
        ModuleSummary,
    },
    state::AppState,
    ws::ws_handler,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_modules,
        handlers::get_module,
        handlers::play_module,
        handlers::create_document,
    ),
    components(
        schemas(ModuleRecord, ModuleSummary, ModuleStatus, CreateDocumentPayload, DocumentResponse, ErrorResponse)
    ),
    tags(
        (name = "Slate API", description = "Module and document management for the Slate presentation compiler")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    // Group all routes that require AppState into their own router.
    let api_router = Router::new()
        .route("/modules", get(handlers::list_modules))
        .route("/modules/{id}", get(handlers::get_module))
        .route("/modules/{id}/play", get(handlers::play_module))
        .route("/documents", post(handlers::create_document))
        .route("/ws", get(ws_handler))
        // Apply the state ONLY to this group of routes.
        .with_state(app_state);

    // Create the final router that merges the stateful routes
    // with the stateless routes (like Swagger UI).
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
}
