//! OpenAI-Compatible Generation Gateway
//!
//! Implements the core `GenerationClient` trait against any OpenAI-compatible
//! chat-completions endpoint (OpenAI itself, or Gemini through its
//! compatibility surface). The presentation command set and the document
//! retrieval tool are registered as function declarations; tool calls come
//! back as named actions for the compiler's resolution loop.

use anyhow::{Result, anyhow};
use async_openai::{
    Client,
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs, ChatCompletionTool,
        ChatCompletionToolType, CreateChatCompletionRequestArgs, FunctionObject,
    },
};
use async_trait::async_trait;
use serde_json::json;
use slate_core::capability::{
    ChatRole, ChatTurn, GenerationClient, GenerationOutcome, NamedAction, RETRIEVE_TOOL,
};
use tracing::debug;

pub struct OpenAiCompatibleClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiCompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    pub fn new(config: OpenAIConfig, model: String) -> Self {
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

fn function(name: &str, description: &str, parameters: serde_json::Value) -> ChatCompletionTool {
    ChatCompletionTool {
        r#type: ChatCompletionToolType::Function,
        function: FunctionObject {
            name: name.to_string(),
            description: Some(description.to_string()),
            parameters: Some(parameters),
            strict: None,
        },
    }
}

/// The full tool surface offered to the model: every presentation command
/// plus document retrieval.
pub fn presentation_tools() -> Vec<ChatCompletionTool> {
    let delay = json!({ "type": "number", "description": "Time in milliseconds to wait after this command." });
    vec![
        function(
            "speak",
            "Provides the verbal part of the explanation. Should be called before visual elements to introduce them.",
            json!({
                "type": "object",
                "properties": {
                    "text": { "type": "string", "description": "The text to be spoken by the AI tutor." }
                },
                "required": ["text"]
            }),
        ),
        function(
            "createText",
            "Renders text on the canvas, like labels or titles.",
            json!({
                "type": "object",
                "properties": {
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "text": { "type": "string", "description": "The text content to display." },
                    "fontSize": { "type": "number" },
                    "color": { "type": "string", "description": "The color of the text (e.g., '#RRGGBB')." },
                    "delay": delay.clone()
                },
                "required": ["x", "y", "text", "delay"]
            }),
        ),
        function(
            "drawRectangle",
            "Draws a rectangle on the canvas.",
            json!({
                "type": "object",
                "properties": {
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "width": { "type": "number" },
                    "height": { "type": "number" },
                    "color": { "type": "string" },
                    "label": { "type": "string", "description": "A label to display inside the rectangle." },
                    "delay": delay.clone()
                },
                "required": ["x", "y", "width", "height", "color", "delay"]
            }),
        ),
        function(
            "drawCircle",
            "Draws a circle on the canvas.",
            json!({
                "type": "object",
                "properties": {
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "radius": { "type": "number" },
                    "color": { "type": "string" },
                    "label": { "type": "string", "description": "A label for the circle." },
                    "delay": delay.clone()
                },
                "required": ["x", "y", "radius", "color", "delay"]
            }),
        ),
        function(
            "drawArrow",
            "Draws an arrow to connect elements.",
            json!({
                "type": "object",
                "properties": {
                    "points": {
                        "type": "array",
                        "description": "An array of coordinates [x1, y1, x2, y2, ...].",
                        "items": { "type": "number" }
                    },
                    "color": { "type": "string" },
                    "delay": delay.clone()
                },
                "required": ["points", "color", "delay"]
            }),
        ),
        function(
            "createTable",
            "Draws the structure of a table.",
            json!({
                "type": "object",
                "properties": {
                    "id": { "type": "string", "description": "A unique identifier for the table." },
                    "x": { "type": "number" },
                    "y": { "type": "number" },
                    "rows": { "type": "number" },
                    "cols": { "type": "number" },
                    "colWidths": { "type": "array", "items": { "type": "number" } },
                    "rowHeight": { "type": "number" },
                    "headers": { "type": "array", "items": { "type": "string" } },
                    "delay": delay.clone()
                },
                "required": ["id", "x", "y", "rows", "cols", "colWidths", "rowHeight", "headers", "delay"]
            }),
        ),
        function(
            "fillTable",
            "Fills a specific cell in a pre-drawn table.",
            json!({
                "type": "object",
                "properties": {
                    "tableId": { "type": "string", "description": "The ID of the target table." },
                    "row": { "type": "number", "description": "The 0-indexed row number." },
                    "col": { "type": "number", "description": "The 0-indexed column number." },
                    "text": { "type": "string", "description": "The content to fill in the cell." },
                    "delay": delay.clone()
                },
                "required": ["tableId", "row", "col", "text", "delay"]
            }),
        ),
        function(
            "clearCanvas",
            "Clears all elements from the canvas.",
            json!({
                "type": "object",
                "properties": { "delay": delay.clone() },
                "required": ["delay"]
            }),
        ),
        function(
            "session_end",
            "Signals that the presentation is complete. Must be the last tool called.",
            json!({ "type": "object", "properties": {}, "required": [] }),
        ),
        function(
            RETRIEVE_TOOL,
            "Retrieves the most relevant excerpts from the user's uploaded documents for a focused query.",
            json!({
                "type": "object",
                "properties": {
                    "query": { "type": "string", "description": "A focused search query." }
                },
                "required": ["query"]
            }),
        ),
    ]
}

fn request_messages(conversation: &[ChatTurn]) -> Result<Vec<ChatCompletionRequestMessage>> {
    conversation
        .iter()
        .map(|turn| {
            Ok(match turn.role {
                ChatRole::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()?
                    .into(),
                // Tool results are replayed as user turns carrying the packaged
                // function responses; the compatibility surface does not hand
                // out tool-call ids for us to thread back.
                ChatRole::User | ChatRole::Tool => ChatCompletionRequestUserMessageArgs::default()
                    .content(turn.content.as_str())
                    .build()?
                    .into(),
            })
        })
        .collect()
}

fn action_from_tool_call(call: &ChatCompletionMessageToolCall) -> NamedAction {
    let arguments =
        serde_json::from_str(&call.function.arguments).unwrap_or_else(|_| json!({}));
    NamedAction::new(call.function.name.clone(), arguments)
}

#[async_trait]
impl GenerationClient for OpenAiCompatibleClient {
    async fn generate_actions(&self, conversation: &[ChatTurn]) -> Result<GenerationOutcome> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(request_messages(conversation)?)
            .tools(presentation_tools())
            .tool_choice("auto")
            .build()?;

        let response = self.client.chat().create(request).await?;
        let choice = response
            .choices
            .first()
            .ok_or_else(|| anyhow!("Chat completion returned no choices."))?;

        if let Some(tool_calls) = &choice.message.tool_calls {
            debug!(count = tool_calls.len(), "Model requested tool calls");
            Ok(GenerationOutcome::Actions(
                tool_calls.iter().map(action_from_tool_call).collect(),
            ))
        } else if let Some(content) = &choice.message.content {
            Ok(GenerationOutcome::Text(content.clone()))
        } else {
            Err(anyhow!(
                "Chat completion had neither text content nor tool calls."
            ))
        }
    }

    async fn generate_text(&self, prompt: &str) -> Result<String> {
        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![
                ChatCompletionRequestUserMessageArgs::default()
                    .content(prompt)
                    .build()?
                    .into(),
            ])
            .build()?;

        let response = self.client.chat().create(request).await?;
        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .ok_or_else(|| anyhow!("Chat completion returned no text content."))
    }
}
