//! Remote speech synthesis.
//!
//! [`SpeechClient`] is the seam to the hosted model: one block of text in,
//! one base64 PCM payload out.  [`GeminiSpeechClient`] talks to the Gemini
//! `generateContent` endpoint; tests substitute scripted clients.
//!
//! Request envelope:
//!
//! ```json
//! {
//!   "contents": [{ "parts": [{ "text": "…" }] }],
//!   "generationConfig": {
//!     "responseModalities": ["AUDIO"],
//!     "speechConfig": { "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": "Puck" } } }
//!   }
//! }
//! ```
//!
//! The audio is read from `candidates[0].content.parts[*].inlineData.data`.

use std::time::Duration;

use serde::Deserialize;
use serde_json::{json, Value};

use crate::audio::{decode_payload, Waveform};
use crate::config::{Credentials, SpeechConfig};
use crate::error::{Error, Result};

/// Upper bound on a response body; a full block of speech is a few MB.
const MAX_RESPONSE_BYTES: u64 = 64 * 1024 * 1024;

/// Converts one block of text to base64-encoded PCM16.
pub trait SpeechClient {
    fn generate_speech(&self, text: &str, voice: &str) -> Result<String>;
}

impl<T: SpeechClient + ?Sized> SpeechClient for Box<T> {
    fn generate_speech(&self, text: &str, voice: &str) -> Result<String> {
        (**self).generate_speech(text, voice)
    }
}

/// Synthesize `text` and decode the result into a waveform.
///
/// Blank text is rejected before the client is called.
pub fn synthesize<C: SpeechClient + ?Sized>(
    client: &C,
    text: &str,
    voice: &str,
    config: &SpeechConfig,
) -> Result<Waveform> {
    if text.trim().is_empty() {
        return Err(Error::EmptyText);
    }
    let payload = client.generate_speech(text, voice)?;
    decode_payload(&payload, config.sample_rate, config.channels)
}

// ─────────────────────────────────────────────────────────────────────────────
// Response schema
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
struct InlineData {
    data: String,
}

/// Build the `generateContent` request body.
pub fn build_request_body(text: &str, voice: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": text }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": {
                "voiceConfig": {
                    "prebuiltVoiceConfig": { "voiceName": voice }
                }
            }
        }
    })
}

/// Pull the base64 audio payload out of a `generateContent` response body.
pub fn extract_audio_payload(body: &[u8]) -> Result<String> {
    let response: GenerateResponse = serde_json::from_slice(body)
        .map_err(|e| Error::Remote(format!("malformed response: {}", e)))?;

    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|content| content.parts.into_iter().find_map(|p| p.inline_data))
        .map(|inline| inline.data)
        .filter(|data| !data.is_empty())
        .ok_or_else(|| Error::Remote("no audio data returned".to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Gemini client
// ─────────────────────────────────────────────────────────────────────────────

/// Blocking client for the Gemini TTS endpoint.
pub struct GeminiSpeechClient {
    agent: ureq::Agent,
    credentials: Credentials,
    url: String,
}

impl GeminiSpeechClient {
    pub fn new(credentials: Credentials, config: &SpeechConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_secs(config.timeout_secs)))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(agent_config),
            credentials,
            url: config.generate_url(),
        }
    }

    /// Build a client from the environment credential.
    ///
    /// Fails with [`Error::MissingCredential`] before any request is made.
    pub fn from_env(config: &SpeechConfig) -> Result<Self> {
        Ok(Self::new(Credentials::from_env()?, config))
    }
}

impl SpeechClient for GeminiSpeechClient {
    fn generate_speech(&self, text: &str, voice: &str) -> Result<String> {
        log::debug!("POST {} ({} chars, voice {})", self.url, text.chars().count(), voice);

        let mut response = self
            .agent
            .post(&self.url)
            .header("x-goog-api-key", self.credentials.api_key())
            .send_json(build_request_body(text, voice))
            .map_err(|e| Error::Remote(e.to_string()))?;

        let body = response
            .body_mut()
            .with_config()
            .limit(MAX_RESPONSE_BYTES)
            .read_to_vec()
            .map_err(|e| Error::Remote(format!("reading response: {}", e)))?;

        extract_audio_payload(&body)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
