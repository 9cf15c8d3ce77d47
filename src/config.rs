//! Speech API configuration, credentials and the static voice list.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::audio::{CHANNELS, SAMPLE_RATE};
use crate::error::{Error, Result};

/// Environment variables holding the API key, in lookup order.
pub const CREDENTIAL_VARS: [&str; 2] = ["API_KEY", "GEMINI_API_KEY"];

// ─────────────────────────────────────────────────────────────────────────────
// Voices
// ─────────────────────────────────────────────────────────────────────────────

/// A remote voice preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VoiceOption {
    /// Preset name sent to the API.
    pub id: &'static str,
    /// Display label.
    pub name: &'static str,
}

/// Voices offered to the user.  The first one is the default.
pub const VOICES: &[VoiceOption] = &[
    VoiceOption { id: "Puck", name: "Voz Neutra" },
    VoiceOption { id: "Charon", name: "Voz Grave" },
    VoiceOption { id: "Fenrir", name: "Voz Calma" },
];

/// Look up a voice preset by id.
pub fn find_voice(id: &str) -> Option<&'static VoiceOption> {
    VOICES.iter().find(|v| v.id == id)
}

// ─────────────────────────────────────────────────────────────────────────────
// config.json schema
// ─────────────────────────────────────────────────────────────────────────────

/// Remote speech API settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SpeechConfig {
    /// Model name, e.g. `"gemini-2.5-flash-preview-tts"`.
    pub model: String,
    /// API base URL, without a trailing slash.
    pub endpoint: String,
    /// Default voice preset.
    pub voice: String,
    /// Per-request timeout.
    pub timeout_secs: u64,
    /// Sample rate of the returned PCM.
    pub sample_rate: u32,
    /// Channel count of the returned PCM.
    pub channels: u16,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.5-flash-preview-tts".to_string(),
            endpoint: "https://generativelanguage.googleapis.com/v1beta".to_string(),
            voice: VOICES[0].id.to_string(),
            timeout_secs: 120,
            sample_rate: SAMPLE_RATE,
            channels: CHANNELS,
        }
    }
}

impl SpeechConfig {
    /// Load settings from a JSON file; missing fields take their defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    fn from_json(bytes: &[u8]) -> std::result::Result<Self, String> {
        let config: Self = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        if config.sample_rate == 0 || config.channels == 0 {
            return Err("sample_rate and channels must be positive".to_string());
        }
        if config.model.trim().is_empty() {
            return Err("model must not be empty".to_string());
        }
        Ok(config)
    }

    /// `{endpoint}/models/{model}:generateContent`
    pub fn generate_url(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.endpoint.trim_end_matches('/'),
            self.model
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Credentials
// ─────────────────────────────────────────────────────────────────────────────

/// The API key.  `Debug` never prints the secret.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials").field("api_key", &"<redacted>").finish()
    }
}

impl Credentials {
    /// Wrap an explicit key.  Blank keys are rejected.
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(Error::MissingCredential { var: CREDENTIAL_VARS[0] });
        }
        Ok(Self { api_key })
    }

    /// Read the key from `API_KEY`, falling back to `GEMINI_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        CREDENTIAL_VARS
            .iter()
            .filter_map(|var| lookup(var))
            .find(|v| !v.trim().is_empty())
            .map(|api_key| Self { api_key })
            .ok_or(Error::MissingCredential { var: CREDENTIAL_VARS[0] })
    }

    pub(crate) fn api_key(&self) -> &str {
        &self.api_key
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_voices() {
        assert_eq!(VOICES.len(), 3);
        assert_eq!(find_voice("Charon").map(|v| v.name), Some("Voz Grave"));
        assert!(find_voice("Nobody").is_none());
    }

    #[test]
    fn test_defaults_from_empty_json() {
        let config = SpeechConfig::from_json(b"{}").unwrap();
        assert_eq!(config, SpeechConfig::default());
        assert_eq!(config.voice, "Puck");
        assert_eq!(config.sample_rate, 24_000);
    }

    #[test]
    fn test_partial_json() {
        let config = SpeechConfig::from_json(br#"{"voice": "Fenrir", "timeout_secs": 5}"#).unwrap();
        assert_eq!(config.voice, "Fenrir");
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.channels, 1);
    }

    #[test]
    fn test_rejects_bad_json() {
        assert!(SpeechConfig::from_json(br#"{"colour": "blue"}"#).is_err());
        assert!(SpeechConfig::from_json(br#"{"channels": 0}"#).is_err());
        assert!(SpeechConfig::from_json(b"not json").is_err());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"model": "tts-test"}"#).unwrap();
        assert_eq!(SpeechConfig::from_file(&path).unwrap().model, "tts-test");

        std::fs::write(&path, "{").unwrap();
        assert!(matches!(SpeechConfig::from_file(&path), Err(Error::Config(_))));
    }

    #[test]
    fn test_generate_url() {
        let config = SpeechConfig { endpoint: "http://localhost:9/v1/".into(), ..Default::default() };
        assert_eq!(
            config.generate_url(),
            "http://localhost:9/v1/models/gemini-2.5-flash-preview-tts:generateContent"
        );
    }

    #[test]
    fn test_credentials_lookup_order() {
        let creds = Credentials::from_lookup(|var| match var {
            "API_KEY" => Some("primary".into()),
            "GEMINI_API_KEY" => Some("fallback".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.api_key(), "primary");

        let creds = Credentials::from_lookup(|var| match var {
            "API_KEY" => Some("  ".into()),
            "GEMINI_API_KEY" => Some("fallback".into()),
            _ => None,
        })
        .unwrap();
        assert_eq!(creds.api_key(), "fallback");
    }

    #[test]
    fn test_missing_credentials() {
        let err = Credentials::from_lookup(|_| None).unwrap_err();
        assert!(matches!(err, Error::MissingCredential { var: "API_KEY" }));
        assert!(Credentials::new("").is_err());
        assert!(!format!("{:?}", Credentials::new("secret").unwrap()).contains("secret"));
    }
}
