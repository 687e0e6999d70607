//! Narration Synthesis Fan-out
//!
//! Attaches rendered audio to every `speak` command of a finished script.
//! All synthesis requests for one script run concurrently and are rejoined
//! positionally, so completion order never leaks into command order. A
//! failed synthesis degrades that one command to silent narration; it never
//! fails siblings or the script.

use crate::capability::SpeechSynthesizer;
use crate::command::{Command, CommandBody, CommandScript};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Returns the same script, in the same order, with every `speak` payload
/// carrying audio where synthesis succeeded.
pub async fn attach_narration(
    script: CommandScript,
    synthesizer: Arc<dyn SpeechSynthesizer>,
    language_code: &str,
) -> CommandScript {
    let commands = script.into_commands();
    let rendered = join_all(commands.into_iter().enumerate().map(|(index, command)| {
        let synthesizer = synthesizer.clone();
        async move {
            match command.body {
                CommandBody::Speak {
                    text,
                    audio_content: _,
                } => {
                    let audio_content = match synthesizer.synthesize(&text, language_code).await {
                        Ok(audio) => {
                            debug!(index, bytes = audio.len(), "Narration synthesized");
                            Some(audio)
                        }
                        Err(error) => {
                            warn!(index, %error, "Narration synthesis failed; leaving command silent");
                            None
                        }
                    };
                    Command {
                        body: CommandBody::Speak {
                            text,
                            audio_content,
                        },
                        delay: command.delay,
                    }
                }
                _ => command,
            }
        }
    }))
    .await;

    CommandScript::from_validated(rendered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::MockSpeechSynthesizer;
    use anyhow::anyhow;
    use std::time::Duration;

    fn speak(text: &str) -> Command {
        Command::new(
            CommandBody::Speak {
                text: text.to_string(),
                audio_content: None,
            },
            None,
        )
    }

    fn rect() -> Command {
        Command::new(
            CommandBody::DrawRectangle {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                color: "#333".to_string(),
                label: None,
            },
            Some(500),
        )
    }

    fn audio_of(command: &Command) -> Option<&Vec<u8>> {
        match &command.body {
            CommandBody::Speak { audio_content, .. } => audio_content.as_ref(),
            _ => None,
        }
    }

    /// Finishes earlier for later texts, to force an adversarial completion
    /// order.
    struct SlowestFirstSynthesizer;

    #[async_trait::async_trait]
    impl SpeechSynthesizer for SlowestFirstSynthesizer {
        async fn synthesize(&self, text: &str, _language_code: &str) -> anyhow::Result<Vec<u8>> {
            let delay = match text {
                "first" => 300,
                "second" => 200,
                _ => 100,
            };
            tokio::time::sleep(Duration::from_millis(delay)).await;
            Ok(text.as_bytes().to_vec())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn order_is_positional_regardless_of_completion_order() {
        // Later speak commands finish first; positions [0, 2, 4] must still
        // hold the original texts afterwards.
        let synthesizer = SlowestFirstSynthesizer;

        let script = CommandScript::from_validated(vec![
            speak("first"),
            rect(),
            speak("second"),
            rect(),
            speak("third"),
        ]);
        let rendered = attach_narration(script, Arc::new(synthesizer), "en-US").await;

        let commands = rendered.commands();
        assert_eq!(commands.len(), 5);
        assert_eq!(commands[0].narration_text(), Some("first"));
        assert_eq!(commands[2].narration_text(), Some("second"));
        assert_eq!(commands[4].narration_text(), Some("third"));
        assert_eq!(audio_of(&commands[0]), Some(&b"first".to_vec()));
        assert_eq!(audio_of(&commands[2]), Some(&b"second".to_vec()));
        assert_eq!(audio_of(&commands[4]), Some(&b"third".to_vec()));
    }

    #[tokio::test]
    async fn one_failure_degrades_only_that_command() {
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer.expect_synthesize().returning(|text, _| {
            if text == "broken" {
                Err(anyhow!("tts unavailable"))
            } else {
                Ok(vec![0xAA])
            }
        });

        let script =
            CommandScript::from_validated(vec![speak("ok1"), speak("broken"), speak("ok2")]);
        let rendered = attach_narration(script, Arc::new(synthesizer), "en-US").await;

        let commands = rendered.commands();
        assert_eq!(commands.len(), 3);
        assert!(audio_of(&commands[0]).is_some());
        assert!(audio_of(&commands[1]).is_none());
        assert!(audio_of(&commands[2]).is_some());
        // The silent command keeps its text for on-screen narration.
        assert_eq!(commands[1].narration_text(), Some("broken"));
    }

    #[tokio::test]
    async fn non_speak_commands_pass_through_untouched() {
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer.expect_synthesize().never();

        let script = CommandScript::from_validated(vec![rect(), rect()]);
        let rendered = attach_narration(script, Arc::new(synthesizer), "en-US").await;
        assert_eq!(rendered.commands(), &[rect(), rect()]);
    }

    #[tokio::test]
    async fn language_code_reaches_the_synthesizer() {
        let mut synthesizer = MockSpeechSynthesizer::new();
        synthesizer
            .expect_synthesize()
            .withf(|_, language| language == "id-ID")
            .times(1)
            .returning(|_, _| Ok(vec![1]));

        let script = CommandScript::from_validated(vec![speak("halo")]);
        attach_narration(script, Arc::new(synthesizer), "id-ID").await;
    }
}
