//! Manages the WebSocket connection lifecycle for sessions and module generation.

use super::protocol::{ClientMessage, ServerMessage};
use crate::models::{ModuleRecord, ModuleStatus};
use crate::registry::SessionRecord;
use crate::state::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use slate_core::capability::{ChatTurn, Retriever as _};
use slate_core::module::{ModuleEvent, ModuleLength, ModuleRequest};
use slate_core::prompt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{Instrument, error, info, info_span, instrument, warn};
use uuid::Uuid;

/// Axum handler to upgrade an HTTP connection to a WebSocket.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<Arc<AppState>>) -> Response {
    ws.on_upgrade(|socket| handle_socket(socket, state))
}

/// Main handler for an individual WebSocket connection.
///
/// Outbound frames go through an mpsc channel so that background module
/// generation tasks can report progress while the inbound loop keeps
/// reading client messages.
#[instrument(name = "ws_connection", skip_all, fields(connection_id = %Uuid::new_v4()))]
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    info!("New WebSocket connection.");

    let (mut socket_tx, mut socket_rx) = socket.split();
    let (out_tx, mut out_rx) = mpsc::channel::<ServerMessage>(32);

    // Single writer task; everything else sends through the channel.
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    error!(error = %e, "Failed to serialize outbound frame");
                    continue;
                }
            };
            if socket_tx.send(Message::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(ws_msg)) = socket_rx.next().await {
        let text = match ws_msg {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };

        let message: ClientMessage = match serde_json::from_str(&text) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, "Unparseable client message");
                let _ = out_tx
                    .send(ServerMessage::Error {
                        message: format!("Unrecognized message: {e}"),
                    })
                    .await;
                continue;
            }
        };

        match message {
            ClientMessage::StartSession {
                prompt_text,
                session_id,
                file_ids,
                language_code,
            } => {
                let span = info_span!("start_session", session_id = ?session_id);
                if let Err(e) = run_session_turn(
                    &state,
                    &out_tx,
                    prompt_text,
                    session_id,
                    file_ids,
                    language_code,
                )
                .instrument(span)
                .await
                {
                    error!(error = ?e, "Session turn failed");
                    let _ = out_tx
                        .send(ServerMessage::Error {
                            message: format!("Failed to process session. {e}"),
                        })
                        .await;
                }
            }
            ClientMessage::GenerateModule {
                prompt,
                file_ids,
                module_length,
                module_language,
            } => {
                spawn_module_generation(
                    state.clone(),
                    out_tx.clone(),
                    prompt,
                    file_ids,
                    module_length,
                    module_language,
                )
                .await;
            }
        }
    }

    drop(out_tx);
    let _ = writer.await;
    info!("WebSocket connection closed.");
}

/// Compiles one session turn into a finished script and streams it back.
async fn run_session_turn(
    state: &Arc<AppState>,
    out: &mpsc::Sender<ServerMessage>,
    prompt_text: String,
    session_id: Option<Uuid>,
    file_ids: Vec<String>,
    language_code: Option<String>,
) -> Result<()> {
    let session = resolve_session(state, out, session_id, &prompt_text).await?;
    info!(session_id = %session.id, "Compiling session turn");

    let summaries = state.vector_store.summaries(&file_ids).await;
    let mut conversation = vec![ChatTurn::user(prompt::session_preamble(
        summaries.as_deref(),
    ))];
    conversation.extend(session.history.clone());
    conversation.push(ChatTurn::user(prompt_text.clone()));

    let language = language_code.unwrap_or_else(|| state.config.default_language.clone());
    let script = state
        .compiler
        .compile_with_narration(conversation, &file_ids, &language)
        .await?;

    // History keeps only what was said, not the drawing commands; that is
    // what later turns need for continuity.
    let narration = script.transcript().join(" ");
    state
        .sessions
        .append_history(
            session.id,
            vec![
                ChatTurn::user(prompt_text),
                ChatTurn::assistant(narration),
            ],
        )
        .await;

    out.send(ServerMessage::CommandStreamReceived {
        session_id: session.id,
        commands: script,
    })
    .await
    .context("Client disconnected")?;
    Ok(())
}

/// Loads the session to continue, or creates (and announces) a new one.
async fn resolve_session(
    state: &Arc<AppState>,
    out: &mpsc::Sender<ServerMessage>,
    session_id: Option<Uuid>,
    prompt_text: &str,
) -> Result<SessionRecord> {
    if let Some(id) = session_id {
        return state
            .sessions
            .get(id)
            .await
            .with_context(|| format!("Session '{id}' not found"));
    }

    let title = match state.pipeline.title(prompt_text).await {
        Ok(title) => title,
        Err(e) => {
            warn!(error = %e, "Title generation failed; falling back to the prompt");
            prompt_text.chars().take(40).collect()
        }
    };
    let session = state.sessions.create(title.clone()).await;
    out.send(ServerMessage::SessionCreated {
        session_id: session.id,
        title,
    })
    .await
    .context("Client disconnected")?;
    Ok(session)
}

/// Registers a module and generates it on a background task, forwarding
/// progress events to both the registry and the client.
async fn spawn_module_generation(
    state: Arc<AppState>,
    out: mpsc::Sender<ServerMessage>,
    prompt: String,
    file_ids: Vec<String>,
    module_length: ModuleLength,
    module_language: String,
) {
    let module_id = Uuid::new_v4();
    let title = match state.pipeline.title(&prompt).await {
        Ok(title) => title,
        Err(e) => {
            warn!(error = %e, "Title generation failed; falling back to the prompt");
            prompt.chars().take(40).collect()
        }
    };

    let now = Utc::now();
    state
        .modules
        .insert(ModuleRecord {
            id: module_id,
            title,
            prompt: prompt.clone(),
            length: module_length,
            status: ModuleStatus::Generating,
            language_code: module_language.clone(),
            script: None,
            created_at: now,
            updated_at: now,
        })
        .await;
    info!(%module_id, length = ?module_length, "Module registered; starting generation");

    // Ground the whole module in one retrieval pass over the prompt.
    let document_context = if file_ids.is_empty() {
        None
    } else {
        match state.indexer.retrieve(&prompt, &file_ids).await {
            Ok(content) if !content.is_empty() => Some(content),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "Document retrieval failed; generating without context");
                None
            }
        }
    };

    let (events_tx, mut events_rx) = mpsc::channel::<ModuleEvent>(16);

    let registry = state.modules.clone();
    let forwarder = async move {
        while let Some(event) = events_rx.recv().await {
            let frame = match event {
                ModuleEvent::Generating { message, .. } => ServerMessage::ModuleStatus {
                    module_id,
                    status: ModuleStatus::Generating,
                    message,
                },
                ModuleEvent::Completed { script, .. } => {
                    registry.complete(module_id, script).await;
                    ServerMessage::ModuleStatus {
                        module_id,
                        status: ModuleStatus::Completed,
                        message: "Module generation complete!".to_string(),
                    }
                }
                ModuleEvent::Failed { message, .. } => {
                    registry.set_status(module_id, ModuleStatus::Failed).await;
                    ServerMessage::ModuleStatus {
                        module_id,
                        status: ModuleStatus::Failed,
                        message: format!("Failed to generate module. {message}"),
                    }
                }
            };
            // The registry is the source of truth; a gone client only loses
            // the live progress frames.
            let _ = out.send(frame).await;
        }
    };
    tokio::spawn(forwarder.instrument(info_span!("module_events", %module_id)));

    let pipeline = state.pipeline.clone();
    tokio::spawn(
        async move {
            let request = ModuleRequest {
                module_id: module_id.to_string(),
                prompt,
                length: module_length,
                language_code: module_language,
                document_context,
            };
            if let Err(e) = pipeline.generate(&request, &events_tx).await {
                error!(error = %e, "Module generation failed");
            }
        }
        .instrument(info_span!("module_generation", %module_id)),
    );
}
