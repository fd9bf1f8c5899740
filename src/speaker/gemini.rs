//! Gemini REST client for speech synthesis and translation.
//!
//! Both calls go to `models/{model}:generateContent`. Speech comes back as
//! base64 PCM in the first candidate's `inlineData` part.

use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::debug;

use super::fetch::{SynthesisClient, SynthesisRequest, VoiceSelection};
use super::translate::TranslationClient;
use crate::config::GeminiConfig;
use crate::error::{status_error, AudioError};

const TRANSLATE_PROMPT: &str = "Translate the following text between Italian and Bengali. If it's in Bengali, translate to Italian. If it's in Italian, translate to Bengali. Return only the translated text: \"{text}\"";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    tts_model: String,
    text_model: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, AudioError> {
        let api_key = config
            .resolved_api_key()
            .ok_or_else(|| AudioError::Auth("no Gemini API key configured".into()))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AudioError::Network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tts_model: config.tts_model.clone(),
            text_model: config.text_model.clone(),
        })
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<Value, AudioError> {
        let url = format!("{}/v1beta/models/{model}:generateContent", self.base_url);
        let resp = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(status_error(status.as_u16(), error_message(&text)));
        }

        Ok(resp.json::<Value>().await?)
    }
}

#[async_trait]
impl SynthesisClient for GeminiClient {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, AudioError> {
        let body = speech_body(request);
        let data = self.generate(&self.tts_model, &body).await?;
        let bytes = extract_audio(&data)?
            .ok_or_else(|| AudioError::NoAudioReturned(request.prompt.clone()))?;
        debug!("Gemini returned {} bytes of PCM", bytes.len());
        Ok(bytes)
    }
}

#[async_trait]
impl TranslationClient for GeminiClient {
    async fn translate(&self, text: &str) -> Result<String, AudioError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": TRANSLATE_PROMPT.replace("{text}", text) }] }]
        });
        let data = self.generate(&self.text_model, &body).await?;
        let translated = extract_text(&data);
        if translated.is_empty() {
            return Err(AudioError::TranslationFailure("empty response".into()));
        }
        Ok(translated)
    }
}

fn prebuilt_voice(name: &str) -> Value {
    json!({ "prebuiltVoiceConfig": { "voiceName": name } })
}

/// Request body for a speech call.
pub fn speech_body(request: &SynthesisRequest) -> Value {
    let speech_config = match &request.voices {
        VoiceSelection::Single(voice) => json!({ "voiceConfig": prebuilt_voice(voice) }),
        VoiceSelection::MultiSpeaker(speakers) => {
            let configs: Vec<Value> = speakers
                .iter()
                .map(|(speaker, voice)| {
                    json!({ "speaker": speaker, "voiceConfig": prebuilt_voice(voice) })
                })
                .collect();
            json!({ "multiSpeakerVoiceConfig": { "speakerVoiceConfigs": configs } })
        }
    };

    json!({
        "contents": [{ "parts": [{ "text": request.prompt }] }],
        "generationConfig": {
            "responseModalities": ["AUDIO"],
            "speechConfig": speech_config
        }
    })
}

fn first_candidate_parts(data: &Value) -> &[Value] {
    data["candidates"][0]["content"]["parts"]
        .as_array()
        .map(Vec::as_slice)
        .unwrap_or_default()
}

/// Decoded audio bytes from a response, `None` when no part carries audio.
pub fn extract_audio(data: &Value) -> Result<Option<Vec<u8>>, AudioError> {
    let encoded = first_candidate_parts(data)
        .iter()
        .find_map(|part| part["inlineData"]["data"].as_str());

    match encoded {
        Some(b64) if !b64.is_empty() => base64::engine::general_purpose::STANDARD
            .decode(b64)
            .map(Some)
            .map_err(|e| AudioError::InvalidResponse(format!("bad base64 audio: {e}"))),
        _ => Ok(None),
    }
}

/// Concatenated text parts of the first candidate, trimmed.
pub fn extract_text(data: &Value) -> String {
    first_candidate_parts(data)
        .iter()
        .filter_map(|part| part["text"].as_str())
        .collect::<String>()
        .trim()
        .to_string()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.chars().take(200).collect())
}
