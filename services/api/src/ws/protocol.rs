//! Defines the WebSocket message protocol between the browser client and the API server.

use crate::models::ModuleStatus;
use serde::{Deserialize, Serialize};
use slate_core::command::CommandScript;
use slate_core::module::ModuleLength;
use uuid::Uuid;

/// Messages sent from the client (browser) to the server.
#[derive(Deserialize, Debug)]
#[serde(tag = "type")]
pub enum ClientMessage {
    /// Starts a new chat session or continues an existing one with a prompt.
    #[serde(rename = "start_session", rename_all = "camelCase")]
    StartSession {
        prompt_text: String,
        /// The session to continue; absent for a brand new session.
        session_id: Option<Uuid>,
        /// Document allow-list for retrieval.
        #[serde(default)]
        file_ids: Vec<String>,
        language_code: Option<String>,
    },
    /// Kicks off background generation of a multi-step module.
    #[serde(rename = "generate_module", rename_all = "camelCase")]
    GenerateModule {
        prompt: String,
        #[serde(default)]
        file_ids: Vec<String>,
        module_length: ModuleLength,
        module_language: String,
    },
}

/// Messages sent from the server to the client (browser).
#[derive(Serialize, Debug, Clone)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Announces the id and title of a freshly created session.
    #[serde(rename_all = "camelCase")]
    SessionCreated { session_id: Uuid, title: String },
    /// The finished, audio-bearing command script for one session turn.
    #[serde(rename_all = "camelCase")]
    CommandStreamReceived {
        session_id: Uuid,
        commands: CommandScript,
    },
    /// Progress of a background module generation.
    #[serde(rename_all = "camelCase")]
    ModuleStatus {
        module_id: Uuid,
        status: ModuleStatus,
        message: String,
    },
    /// Reports a fatal error to the client.
    Error { message: String },
}
