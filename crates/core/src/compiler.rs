//! Script Compiler & Tool-Resolution Loop
//!
//! Drives the generation capability through zero or more tool-call rounds
//! until it yields a terminal, tool-free set of actions, resolving retrieval
//! requests against the caller's document allow-list along the way. The
//! terminal action set maps 1:1 into commands and is validated into a
//! [`CommandScript`].

use crate::capability::{
    ChatTurn, GenerationClient, GenerationOutcome, Retriever, SpeechSynthesizer,
};
use crate::command::{Command, CommandBody, CommandScript, ScriptError};
use crate::synthesis::attach_narration;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Upper bound on generation round-trips for one request.
pub const DEFAULT_MAX_TOOL_ROUNDS: usize = 4;

/// A fatal failure while compiling a script or module step.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("tool-resolution loop exceeded {0} round(s)")]
    ToolLoopExceeded(usize),
    #[error("malformed generation output: {0}")]
    MalformedOutput(String),
    #[error("invalid script: {0}")]
    InvalidScript(#[from] ScriptError),
    #[error("capability unavailable: {0}")]
    CapabilityUnavailable(#[source] anyhow::Error),
}

/// Compiles one user turn into a finished command script.
pub struct ScriptCompiler {
    generation: Arc<dyn GenerationClient>,
    retriever: Arc<dyn Retriever>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    max_tool_rounds: usize,
}

impl ScriptCompiler {
    pub fn new(
        generation: Arc<dyn GenerationClient>,
        retriever: Arc<dyn Retriever>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            generation,
            retriever,
            synthesizer,
            max_tool_rounds: DEFAULT_MAX_TOOL_ROUNDS,
        }
    }

    pub fn with_max_tool_rounds(mut self, max_tool_rounds: usize) -> Self {
        self.max_tool_rounds = max_tool_rounds;
        self
    }

    /// Runs the tool-resolution loop to a terminal command list.
    ///
    /// `document_ids` is the retrieval allow-list; an empty list makes every
    /// retrieval request resolve to an empty result rather than an error.
    pub async fn compile(
        &self,
        conversation: Vec<ChatTurn>,
        document_ids: &[String],
    ) -> Result<CommandScript, CompileError> {
        let mut conversation = conversation;

        for round in 0..=self.max_tool_rounds {
            let outcome = self
                .generation
                .generate_actions(&conversation)
                .await
                .map_err(CompileError::CapabilityUnavailable)?;

            let actions = match outcome {
                GenerationOutcome::Actions(actions) => actions,
                GenerationOutcome::Text(text) => {
                    return Err(CompileError::MalformedOutput(format!(
                        "expected command actions, got prose ({} chars)",
                        text.len()
                    )));
                }
            };

            let (retrievals, rest): (Vec<_>, Vec<_>) =
                actions.into_iter().partition(|a| a.is_retrieval());

            if retrievals.is_empty() {
                // Terminal round: the action set is the script.
                let mut commands = Vec::with_capacity(rest.len());
                for action in rest {
                    let name = action.name.clone();
                    match action.into_command() {
                        Some(Command {
                            body: CommandBody::Unknown,
                            ..
                        })
                        | None => {
                            warn!(tool = %name, "Ignoring unknown tool request");
                        }
                        Some(command) => commands.push(command),
                    }
                }
                info!(rounds = round, commands = commands.len(), "Compiled script");
                return Ok(CommandScript::new(commands)?);
            }

            if round == self.max_tool_rounds {
                return Err(CompileError::ToolLoopExceeded(self.max_tool_rounds));
            }

            if !rest.is_empty() {
                // A mixed round still counts as a tool round; the stray
                // actions are dropped and the model is asked again with the
                // retrieval results in hand.
                warn!(
                    dropped = rest.len(),
                    "Retrieval round carried non-retrieval actions; ignoring them"
                );
            }

            let mut responses = Vec::with_capacity(retrievals.len());
            for request in retrievals {
                let query = request
                    .arguments
                    .get("query")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                debug!(round, %query, "Resolving retrieval tool call");
                let content = if document_ids.is_empty() {
                    String::new()
                } else {
                    self.retriever
                        .retrieve(&query, document_ids)
                        .await
                        .map_err(CompileError::CapabilityUnavailable)?
                };
                let result = if content.is_empty() {
                    "No relevant content found.".to_string()
                } else {
                    content
                };
                responses.push(serde_json::json!({
                    "functionResponse": {
                        "name": request.name,
                        "response": { "result": result },
                    }
                }));
            }

            // All tool outputs of the round go back as a single follow-up turn.
            let packaged = serde_json::to_string(&responses)
                .map_err(|e| CompileError::MalformedOutput(e.to_string()))?;
            conversation.push(ChatTurn::tool(packaged));
        }

        unreachable!("loop either terminates or errors before exhausting the range")
    }

    /// Compiles and then runs the synthesis fan-out, so the caller receives
    /// a finished, audio-bearing script.
    pub async fn compile_with_narration(
        &self,
        conversation: Vec<ChatTurn>,
        document_ids: &[String],
        language_code: &str,
    ) -> Result<CommandScript, CompileError> {
        let script = self.compile(conversation, document_ids).await?;
        Ok(attach_narration(script, self.synthesizer.clone(), language_code).await)
    }
}
