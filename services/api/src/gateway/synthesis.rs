//! Speech Synthesis Gateway
//!
//! Narration audio comes from the Google Cloud Text-to-Speech REST API,
//! voice-matched to the requested language. Deployments without a TTS key
//! get [`DisabledSynthesizer`]; the fan-out then leaves every narration
//! silent instead of failing scripts.

use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use slate_core::capability::SpeechSynthesizer;
use tracing::debug;

const TTS_ENDPOINT: &str = "https://texttospeech.googleapis.com/v1/text:synthesize";

/// Picks the voice for a BCP-47 language code. Unknown languages fall back
/// to the English voice.
fn voice_for(language_code: &str) -> &'static str {
    match language_code {
        "id-ID" => "id-ID-Chirp3-HD-Despina",
        "th-TH" => "th-TH-Chirp3-HD-Despina",
        "cmn-CN" => "cmn-CN-Chirp3-HD-Despina",
        "vi-VN" => "vi-VN-Chirp3-HD-Despina",
        _ => "en-US-Chirp3-HD-Despina",
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeRequest<'a> {
    input: TextInput<'a>,
    voice: VoiceSelection<'a>,
    audio_config: AudioConfig<'a>,
}

#[derive(Serialize)]
struct TextInput<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceSelection<'a> {
    language_code: &'a str,
    name: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct AudioConfig<'a> {
    audio_encoding: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SynthesizeResponse {
    audio_content: Option<String>,
}

/// Google Cloud Text-to-Speech over REST, MP3 output.
pub struct HttpSpeechSynthesizer {
    http: reqwest::Client,
    api_key: String,
}

impl HttpSpeechSynthesizer {
    pub fn new(api_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key,
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for HttpSpeechSynthesizer {
    async fn synthesize(&self, text: &str, language_code: &str) -> Result<Vec<u8>> {
        let request = SynthesizeRequest {
            input: TextInput { text },
            voice: VoiceSelection {
                language_code,
                name: voice_for(language_code),
            },
            audio_config: AudioConfig {
                audio_encoding: "MP3",
            },
        };

        let response = self
            .http
            .post(format!("{TTS_ENDPOINT}?key={}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("TTS request failed")?
            .error_for_status()
            .context("TTS request was rejected")?;

        let body: SynthesizeResponse = response
            .json()
            .await
            .context("TTS response was not valid JSON")?;
        let encoded = body
            .audio_content
            .ok_or_else(|| anyhow!("TTS response carried no audio content"))?;
        let audio = STANDARD
            .decode(encoded)
            .context("TTS audio content was not valid base64")?;
        debug!(bytes = audio.len(), language_code, "Synthesized narration");
        Ok(audio)
    }
}

/// Stand-in used when no TTS key is configured. Every request fails, which
/// the synthesis fan-out degrades to silent narration.
pub struct DisabledSynthesizer;

#[async_trait]
impl SpeechSynthesizer for DisabledSynthesizer {
    async fn synthesize(&self, _text: &str, _language_code: &str) -> Result<Vec<u8>> {
        Err(anyhow!("speech synthesis is disabled (no TTS_API_KEY)"))
    }
}
