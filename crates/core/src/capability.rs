//! Capability Gateway Contracts
//!
//! The compiler and pipeline only ever talk to three external capabilities:
//! a conversational generation capability (which can answer with prose or
//! request named tools), a retrieval capability over an allow-list of
//! documents, and a speech synthesizer. Each is a trait so the service shell
//! can wire real providers while tests substitute mocks.

use crate::command::Command;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The wire name of the one tool the compiler resolves itself.
pub const RETRIEVE_TOOL: &str = "retrieve_document_context";

/// A single turn in the conversation sent to the generation capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    Tool,
}

impl ChatTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            content: content.into(),
        }
    }
}

/// One named function invocation requested by the generation capability.
///
/// Actions named [`RETRIEVE_TOOL`] are resolved by the tool loop; every other
/// name is interpreted as a presentation command.
#[derive(Debug, Clone, PartialEq)]
pub struct NamedAction {
    pub name: String,
    pub arguments: serde_json::Value,
}

impl NamedAction {
    pub fn new(name: impl Into<String>, arguments: serde_json::Value) -> Self {
        Self {
            name: name.into(),
            arguments,
        }
    }

    pub fn is_retrieval(&self) -> bool {
        self.name == RETRIEVE_TOOL
    }

    /// Interprets this action as a command. `None` when the name is not a
    /// known command kind.
    pub fn into_command(self) -> Option<Command> {
        Command::from_action(&self.name, self.arguments)
    }
}

/// What the generation capability produced for one request.
#[derive(Debug, Clone, PartialEq)]
pub enum GenerationOutcome {
    /// The model requested one or more named function invocations.
    Actions(Vec<NamedAction>),
    /// The model answered with prose instead of actions.
    Text(String),
}

/// A conversational generation capability with the canvas-command and
/// retrieval tools registered.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// One tool-enabled round: the model either requests actions or answers
    /// with prose.
    async fn generate_actions(&self, conversation: &[ChatTurn])
    -> anyhow::Result<GenerationOutcome>;

    /// A plain, tool-free completion. Used by the module planner and step
    /// generator, which expect a JSON payload embedded in free-form text.
    async fn generate_text(&self, prompt: &str) -> anyhow::Result<String>;
}

/// Maps a query and a document allow-list to concatenated relevant excerpts.
///
/// An empty allow-list yields `Ok("")`, not an error.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, document_ids: &[String]) -> anyhow::Result<String>;
}

/// Renders narration text into encoded audio bytes for a language.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str, language_code: &str) -> anyhow::Result<Vec<u8>>;
}
