//! Main Entrypoint for the Slate API Service
//!
//! This binary is responsible for:
//! 1. Loading configuration from the environment.
//! 2. Initializing logging.
//! 3. Wiring the capability gateways into the compiler and module pipeline.
//! 4. Constructing the Axum router and applying middleware.
//! 5. Starting the web server and handling graceful shutdown.

use anyhow::Context;
use async_openai::config::OpenAIConfig;
use slate_api::{
    config::{Config, Provider},
    gateway::{
        generation::OpenAiCompatibleClient,
        retrieval::{EmbeddingRetriever, InMemoryVectorStore},
        synthesis::{DisabledSynthesizer, HttpSpeechSynthesizer},
    },
    registry::{ModuleRegistry, SessionRegistry},
    router::create_router,
    state::AppState,
};
use slate_core::capability::{GenerationClient, SpeechSynthesizer};
use slate_core::compiler::ScriptCompiler;
use slate_core::module::ModulePipeline;
use std::{net::SocketAddr, sync::Arc};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

/// Listens for the `Ctrl+C` signal to gracefully shut down the server.
async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install Ctrl+C handler");
    info!("Received shutdown signal. Shutting down gracefully...");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // --- 1. Load Configuration ---
    let config = Config::from_env().context("Failed to load configuration")?;

    // --- 2. Initialize Logging ---
    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339())
        .init();
    info!("Configuration loaded. Initializing application state...");

    // --- 3. Initialize Capability Gateways ---
    let openai_config = match &config.provider {
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .as_ref()
                .context("OPENAI_API_KEY is required for the 'openai' provider")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://api.openai.com/v1/")
        }
        Provider::Gemini => {
            info!("Using Gemini provider.");
            let api_key = config
                .gemini_api_key
                .as_ref()
                .context("GEMINI_API_KEY is required for the 'gemini' provider")?;
            OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base("https://generativelanguage.googleapis.com/v1beta/openai")
        }
    };

    let generation: Arc<dyn GenerationClient> = Arc::new(OpenAiCompatibleClient::new(
        openai_config.clone(),
        config.chat_model.clone(),
    ));

    let vector_store = Arc::new(InMemoryVectorStore::new());
    let indexer = Arc::new(EmbeddingRetriever::new(
        openai_config,
        config.embedding_model.clone(),
        vector_store.clone(),
    ));

    let synthesizer: Arc<dyn SpeechSynthesizer> = match &config.tts_api_key {
        Some(key) => Arc::new(HttpSpeechSynthesizer::new(key.clone())),
        None => {
            info!("No TTS_API_KEY set; scripts will play silently.");
            Arc::new(DisabledSynthesizer)
        }
    };

    // --- 4. Assemble Core Services ---
    let compiler = Arc::new(
        ScriptCompiler::new(
            generation.clone(),
            indexer.clone(),
            synthesizer.clone(),
        )
        .with_max_tool_rounds(config.max_tool_rounds),
    );
    let pipeline = Arc::new(ModulePipeline::new(generation, synthesizer));

    let app_state = Arc::new(AppState {
        compiler,
        pipeline,
        indexer,
        vector_store,
        modules: Arc::new(ModuleRegistry::new()),
        sessions: Arc::new(SessionRegistry::new()),
        config: Arc::new(config.clone()),
    });

    // --- 5. Create Router and Apply Middleware ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(app_state).layer(cors);

    // --- 6. Start Server ---
    info!(
        provider = ?config.provider,
        model = %config.chat_model,
        bind_address = %config.bind_address,
        "Service configured. Starting server..."
    );
    let listener = tokio::net::TcpListener::bind(config.bind_address).await?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    info!("Server has shut down.");
    Ok(())
}
