//! Fetch executor: payload -> synthesis request -> raw PCM bytes.
//!
//! Bilingual pairs go out as two-speaker requests. If a two-speaker request
//! comes back without audio, the same payload is asked for once more as a
//! single-voice prompt. That fallback is paced like any other call but is
//! not counted as a retry attempt.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info};

use super::pacing::Pacer;
use super::utterance::{Utterance, BANGLA_SPEAKER, ITALIAN_SPEAKER};
use crate::config::SynthesisConfig;
use crate::error::AudioError;

/// Which voice(s) the service should use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VoiceSelection {
    Single(String),
    /// (speaker name as used in the prompt, prebuilt voice name)
    MultiSpeaker(Vec<(String, String)>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SynthesisRequest {
    pub prompt: String,
    pub voices: VoiceSelection,
}

impl SynthesisRequest {
    pub fn is_dual_voice(&self) -> bool {
        matches!(self.voices, VoiceSelection::MultiSpeaker(_))
    }
}

/// Remote text-to-speech call. Returns raw PCM16LE bytes or
/// [`AudioError::NoAudioReturned`] when the response has no audio part.
#[async_trait]
pub trait SynthesisClient: Send + Sync {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, AudioError>;
}

pub struct FetchExecutor {
    client: Arc<dyn SynthesisClient>,
    pacer: Arc<Pacer>,
    italian_voice: String,
    bangla_voice: String,
    dual_voice: bool,
}

impl FetchExecutor {
    pub fn new(client: Arc<dyn SynthesisClient>, pacer: Arc<Pacer>, config: &SynthesisConfig) -> Self {
        Self {
            client,
            pacer,
            italian_voice: config.italian_voice.clone(),
            bangla_voice: config.bangla_voice.clone(),
            dual_voice: config.dual_voice,
        }
    }

    fn single_voice_request(&self, utterance: &Utterance) -> SynthesisRequest {
        SynthesisRequest {
            prompt: utterance.single_voice_prompt(),
            voices: VoiceSelection::Single(self.italian_voice.clone()),
        }
    }

    /// Build the first request for a payload.
    pub fn build_request(&self, utterance: &Utterance) -> SynthesisRequest {
        match utterance.dual_voice_prompt() {
            Some(prompt) if self.dual_voice => SynthesisRequest {
                prompt,
                voices: VoiceSelection::MultiSpeaker(vec![
                    (ITALIAN_SPEAKER.to_string(), self.italian_voice.clone()),
                    (BANGLA_SPEAKER.to_string(), self.bangla_voice.clone()),
                ]),
            },
            _ => self.single_voice_request(utterance),
        }
    }

    async fn call(&self, request: &SynthesisRequest, urgent: bool) -> Result<Vec<u8>, AudioError> {
        self.pacer.wait_turn(urgent).await;
        let bytes = self.client.synthesize(request).await?;
        if bytes.len() < 2 {
            return Err(AudioError::NoAudioReturned(request.prompt.clone()));
        }
        Ok(bytes)
    }

    /// Fetch encoded audio for `payload`.
    pub async fn fetch(&self, payload: &str, urgent: bool) -> Result<Vec<u8>, AudioError> {
        let utterance = Utterance::from_payload(payload);
        let request = self.build_request(&utterance);
        debug!("Synthesizing '{payload}' (dual_voice={})", request.is_dual_voice());

        match self.call(&request, urgent).await {
            Err(AudioError::NoAudioReturned(_)) if request.is_dual_voice() => {
                info!("No audio for two-speaker request '{payload}', retrying with one voice");
                let fallback = self.single_voice_request(&utterance);
                self.call(&fallback, urgent).await
            }
            other => other,
        }
    }
}
