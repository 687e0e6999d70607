//! Multi-step Module Pipeline
//!
//! A module is a pre-generated, multi-part lesson: one planning call maps the
//! topic to an ordered list of sub-topics, then the compiler runs once per
//! sub-topic, strictly in sequence, threading an accumulating read-only state
//! (commands drawn so far, narration said so far) into each step's prompt.
//! Step i+1 never starts before step i's commands are fully synthesized and
//! appended — continuity depends on it.

use crate::capability::{GenerationClient, SpeechSynthesizer};
use crate::command::{Command, CommandBody, CommandScript};
use crate::compiler::CompileError;
use crate::extract::extract_json;
use crate::prompt;
use crate::synthesis::attach_narration;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Requested module size, in generation steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModuleLength {
    Short,
    Medium,
    Long,
}

impl ModuleLength {
    pub fn step_count(self) -> usize {
        match self {
            ModuleLength::Short => 1,
            ModuleLength::Medium => 3,
            ModuleLength::Long => 5,
        }
    }
}

/// The ordered sub-topics for one module; produced once, immutable after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModulePlan(Vec<String>);

impl ModulePlan {
    pub fn new(steps: Vec<String>) -> Self {
        Self(steps)
    }

    pub fn steps(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Read-only continuation context threaded from step i into step i+1.
///
/// Append-only, single writer (the pipeline); each step's generation call
/// only ever reads it.
#[derive(Debug, Default, Clone)]
pub struct AccumulatedModuleState {
    pub commands: Vec<Command>,
    pub narration: Vec<String>,
}

/// Everything needed to generate one module.
#[derive(Debug, Clone)]
pub struct ModuleRequest {
    pub module_id: String,
    pub prompt: String,
    pub length: ModuleLength,
    pub language_code: String,
    /// Aggregated document text to ground the lesson in, if any.
    pub document_context: Option<String>,
}

/// Progress events emitted while a module generates. Exactly one terminal
/// event (`Completed` or `Failed`) is emitted per run.
#[derive(Debug, Clone, PartialEq)]
pub enum ModuleEvent {
    Generating {
        module_id: String,
        message: String,
    },
    Completed {
        module_id: String,
        script: CommandScript,
    },
    Failed {
        module_id: String,
        message: String,
    },
}

/// Runs the plan-then-generate-per-step pipeline for one module.
pub struct ModulePipeline {
    generation: Arc<dyn GenerationClient>,
    synthesizer: Arc<dyn SpeechSynthesizer>,
}

impl ModulePipeline {
    pub fn new(
        generation: Arc<dyn GenerationClient>,
        synthesizer: Arc<dyn SpeechSynthesizer>,
    ) -> Self {
        Self {
            generation,
            synthesizer,
        }
    }

    /// Generates the whole module, reporting progress on `events`.
    ///
    /// A step failure aborts the run: nothing is reported as completed and
    /// the caller receives the typed error alongside the `Failed` event.
    pub async fn generate(
        &self,
        request: &ModuleRequest,
        events: &mpsc::Sender<ModuleEvent>,
    ) -> Result<CommandScript, CompileError> {
        match self.run(request, events).await {
            Ok(script) => {
                let _ = events
                    .send(ModuleEvent::Completed {
                        module_id: request.module_id.clone(),
                        script: script.clone(),
                    })
                    .await;
                Ok(script)
            }
            Err(error) => {
                let _ = events
                    .send(ModuleEvent::Failed {
                        module_id: request.module_id.clone(),
                        message: error.to_string(),
                    })
                    .await;
                Err(error)
            }
        }
    }

    async fn run(
        &self,
        request: &ModuleRequest,
        events: &mpsc::Sender<ModuleEvent>,
    ) -> Result<CommandScript, CompileError> {
        self.emit_progress(events, request, "Planning the module structure...")
            .await;
        let plan = self.plan(request).await?;
        info!(module_id = %request.module_id, steps = plan.len(), "Module plan ready");

        let total = plan.len();
        let mut accumulated = AccumulatedModuleState::default();

        for (index, sub_topic) in plan.steps().iter().enumerate() {
            self.emit_progress(
                events,
                request,
                &format!("Generating step {} of {total}: {sub_topic}...", index + 1),
            )
            .await;

            let commands = self.generate_step(request, &accumulated, &plan, sub_topic).await?;
            info!(
                module_id = %request.module_id,
                step = index + 1,
                commands = commands.len(),
                "Module step generated"
            );

            // Synthesize before appending: the next step's prompt must see
            // this step exactly as it will play back.
            let synthesized = attach_narration(
                CommandScript::from_validated(commands),
                self.synthesizer.clone(),
                &request.language_code,
            )
            .await;

            let mut commands = synthesized.into_commands();
            accumulated.narration.extend(
                commands
                    .iter()
                    .filter_map(|c| c.narration_text().map(str::to_owned)),
            );
            accumulated.commands.append(&mut commands);
        }

        // Cross-step references (a later step filling an earlier step's
        // table) are legal; validation runs over the assembled whole.
        Ok(CommandScript::new(accumulated.commands)?)
    }

    async fn plan(&self, request: &ModuleRequest) -> Result<ModulePlan, CompileError> {
        let step_count = request.length.step_count();
        let plan_prompt = prompt::module_plan(
            &request.prompt,
            step_count,
            request.document_context.as_deref(),
        );
        let raw = self
            .generation
            .generate_text(&plan_prompt)
            .await
            .map_err(CompileError::CapabilityUnavailable)?;
        let value = extract_json(&raw)
            .map_err(|e| CompileError::MalformedOutput(format!("module plan: {e}")))?;
        let steps: Vec<String> = value
            .get("plan")
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| CompileError::MalformedOutput(format!("module plan: {e}")))?
            .ok_or_else(|| {
                CompileError::MalformedOutput("module plan has no \"plan\" array".to_string())
            })?;
        if steps.len() != step_count {
            return Err(CompileError::MalformedOutput(format!(
                "module plan has {} step(s), expected {step_count}",
                steps.len()
            )));
        }
        Ok(ModulePlan::new(steps))
    }

    async fn generate_step(
        &self,
        request: &ModuleRequest,
        accumulated: &AccumulatedModuleState,
        plan: &ModulePlan,
        sub_topic: &str,
    ) -> Result<Vec<Command>, CompileError> {
        let step_prompt = prompt::module_step(
            &request.prompt,
            request.document_context.as_deref(),
            accumulated,
            plan,
            sub_topic,
        );
        let raw = self
            .generation
            .generate_text(&step_prompt)
            .await
            .map_err(CompileError::CapabilityUnavailable)?;
        let value = extract_json(&raw)
            .map_err(|e| CompileError::MalformedOutput(format!("module step: {e}")))?;
        if !value.is_array() {
            return Err(CompileError::MalformedOutput(
                "module step response was not a JSON array".to_string(),
            ));
        }
        let commands: Vec<Command> = serde_json::from_value(value)
            .map_err(|e| CompileError::MalformedOutput(format!("module step: {e}")))?;

        // Steps are concatenated, never independently terminated.
        if commands
            .iter()
            .any(|c| matches!(c.body, CommandBody::SessionEnd {}))
        {
            return Err(CompileError::MalformedOutput(
                "module step contained a session_end command".to_string(),
            ));
        }

        Ok(commands
            .into_iter()
            .filter(|c| {
                if matches!(c.body, CommandBody::Unknown) {
                    warn!(module_id = %request.module_id, "Dropping unknown command from step");
                    false
                } else {
                    true
                }
            })
            .collect())
    }

    /// Generates a short display title for a module or session prompt.
    pub async fn title(&self, user_prompt: &str) -> Result<String, CompileError> {
        let raw = self
            .generation
            .generate_text(&prompt::title(user_prompt))
            .await
            .map_err(CompileError::CapabilityUnavailable)?;
        let title = raw.trim().trim_matches(['\'', '"']).to_string();
        if title.is_empty() {
            Ok(user_prompt.chars().take(40).collect())
        } else {
            Ok(title)
        }
    }

    async fn emit_progress(
        &self,
        events: &mpsc::Sender<ModuleEvent>,
        request: &ModuleRequest,
        message: &str,
    ) {
        let _ = events
            .send(ModuleEvent::Generating {
                module_id: request.module_id.clone(),
                message: message.to_string(),
            })
            .await;
    }
}
