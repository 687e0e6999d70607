//! Prompt Construction
//!
//! Pure builders for every prompt the compiler and module pipeline send to
//! the generation capability. Keeping them as functions (rather than files)
//! keeps the continuation context — accumulated canvas and transcript —
//! close to the code that threads it through.

use crate::command::Command;
use crate::module::{AccumulatedModuleState, ModulePlan};

/// The session-mode preamble: orchestrate the full presentation as one
/// tool-call sequence, retrieval tool available on demand.
pub fn session_preamble(document_summaries: Option<&str>) -> String {
    let document_context = match document_summaries {
        Some(summaries) => format!(
            "\n**Available Documents:**\n{summaries}\nWhen the user's request depends on these documents, call the `retrieve_document_context` tool with a focused query before planning your presentation.\n"
        ),
        None => String::new(),
    };
    format!(
        "You are an expert tutor AI. Your personality is enthusiastic, patient, and supportive, \
and you make complex topics easy to understand.\n{document_context}\n\
Your mission is to act as an orchestrator: generate the COMPLETE sequence of tool calls for the \
user's request in a single response.\n\n\
Principles:\n\
1. Introduce first, then draw: start with a `speak` call before visual elements.\n\
2. Build step by step: add one or two visual elements, then explain them with `speak`.\n\
3. Every visual tool call requires a `delay` in milliseconds (500-1500), the pause after the \
element is drawn.\n\
4. Keep spoken explanations and labels short.\n\
5. End the sequence with `session_end`."
    )
}

/// Maps a module length request to its plan prompt.
pub fn module_plan(topic: &str, step_count: usize, document_context: Option<&str>) -> String {
    let file_context = document_context
        .map(|content| {
            format!(
                "\n**Primary Knowledge Source:**\nBase your plan on the following document content.\n\"\"\"\n{content}\n\"\"\"\n"
            )
        })
        .unwrap_or_default();
    format!(
        "You are an expert curriculum designer AI. Break the topic below into {step_count} \
distinct, logically sequenced sub-topics, one per lesson part.\n\n\
**User's Request:** \"{topic}\"\n{file_context}\n\
**Output Format:** respond with a valid JSON object with a single key \"plan\", an array of \
exactly {step_count} strings, each string one sub-topic."
    )
}

/// The per-step prompt: current sub-topic, the whole plan, and the
/// accumulated canvas/transcript of prior steps as continuation context.
pub fn module_step(
    topic: &str,
    document_context: Option<&str>,
    accumulated: &AccumulatedModuleState,
    plan: &ModulePlan,
    current_step: &str,
) -> String {
    let file_context = document_context
        .map(|content| {
            format!(
                "\n**Primary Knowledge Source:**\nBase your explanation on the following document content.\n\"\"\"\n{content}\n\"\"\"\n"
            )
        })
        .unwrap_or_default();

    let continuation = if accumulated.commands.is_empty() {
        String::new()
    } else {
        // Prior canvas state is summarized by command kind only; the full
        // payloads would blow up the context without helping continuity.
        let kinds: Vec<&str> = accumulated
            .commands
            .iter()
            .map(|c: &Command| c.body.kind())
            .collect();
        format!(
            "\n**Continuation Context:**\nThis continues a multi-part module. Build on the \
existing canvas and transcript; do not reintroduce what is already covered.\n\
Existing canvas commands: {kinds:?}\nExisting transcript:\n{}\n",
            accumulated.narration.join("\n")
        )
    };

    let plan_lines: String = plan
        .steps()
        .iter()
        .enumerate()
        .map(|(i, step)| format!("- Step {}: {step}\n", i + 1))
        .collect();

    format!(
        "You are an expert tutor AI generating one part of a larger learning module about \
\"{topic}\".\n{file_context}{continuation}\n\
**Overall Module Plan:**\n{plan_lines}\n\
**Current Task:** generate the presentation commands for the sub-topic:\n\"{current_step}\"\n\n\
Core principles:\n\
1. Verbal first: start with a \"speak\" command.\n\
2. Build visually: add an element, then explain it with a \"speak\" command.\n\
3. Add a \"delay\" in milliseconds to every command except \"speak\" (500-1500 for drawing).\n\
4. Your entire output must be a single valid JSON array of command objects of the form \
{{\"command\": ..., \"payload\": {{...}}, \"delay\": ...}} using the commands speak, createText, \
drawRectangle, drawCircle, drawArrow, createTable, fillTable, clearCanvas.\n\
5. Do NOT emit a \"session_end\" command; this module has multiple parts."
    )
}

/// Asks for a short, display-ready title for a new session or module.
pub fn title(prompt: &str) -> String {
    format!(
        "Summarize the following user prompt into a short, descriptive title of no more than 5 words: \"{prompt}\""
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ModulePlan;

    #[test]
    fn plan_prompt_pins_the_step_count() {
        let prompt = module_plan("Photosynthesis", 3, None);
        assert!(prompt.contains("exactly 3 strings"));
        assert!(prompt.contains("Photosynthesis"));
    }

    #[test]
    fn step_prompt_carries_the_continuation_context() {
        let plan = ModulePlan::new(vec!["Intro".to_string(), "Details".to_string()]);
        let mut accumulated = AccumulatedModuleState::default();
        accumulated.narration.push("We started here.".to_string());
        accumulated.commands.push(Command::new(
            crate::command::CommandBody::ClearCanvas {},
            Some(500),
        ));

        let prompt = module_step("Topic", None, &accumulated, &plan, "Details");
        assert!(prompt.contains("We started here."));
        assert!(prompt.contains("clearCanvas"));
        assert!(prompt.contains("- Step 2: Details"));
        assert!(prompt.contains("session_end"));
    }

    #[test]
    fn first_step_has_no_continuation_block() {
        let plan = ModulePlan::new(vec!["Intro".to_string()]);
        let prompt = module_step("Topic", None, &AccumulatedModuleState::default(), &plan, "Intro");
        assert!(!prompt.contains("Continuation Context"));
    }

    #[test]
    fn preamble_mentions_retrieval_only_with_documents() {
        assert!(!session_preamble(None).contains("retrieve_document_context"));
        assert!(session_preamble(Some("File: notes.pdf")).contains("retrieve_document_context"));
    }
}
