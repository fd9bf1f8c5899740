//! Speaker: the audio request orchestrator.
//!
//! Components, leaf to root:
//! - `store` / `cache`: durable byte store + in-memory decoded tier
//! - `pacing`: minimum gaps between remote calls, rate-limit cooldown
//! - `retry`: exponential backoff with jitter
//! - `fetch` / `gemini`: payload -> synthesis request -> PCM bytes
//! - `scheduler`: single-flight urgent/background queue
//! - `playback`: one audible stream at a time
//! - `translate`: Italian <-> Bengali translation
//! - `api`: local HTTP control surface

pub mod api;
pub mod cache;
pub mod decode;
pub mod fetch;
pub mod gemini;
pub mod pacing;
pub mod playback;
pub mod retry;
pub mod scheduler;
pub mod store;
pub mod translate;
pub mod utterance;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::info;

use crate::config::Config;
use crate::error::AudioError;
use cache::AudioCache;
use decode::AudioBuffer;
use fetch::{FetchExecutor, SynthesisClient};
use gemini::GeminiClient;
use pacing::Pacer;
use playback::{OutputFactory, PlaybackController, PlaybackDone, RodioOutputFactory};
use retry::RetryPolicy;
use scheduler::{QueueDepth, Scheduler};
use store::{DurableStore, FileStore, MemoryStore};
use translate::{TranslationClient, Translator};
use utterance::Utterance;

/// Snapshot for the status endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SpeakerStatus {
    pub playing: bool,
    pub queue: QueueStatus,
    pub cooling_down: bool,
    pub cooldown_remaining_ms: u64,
    pub cached_in_memory: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueueStatus {
    pub urgent: usize,
    pub background: usize,
}

impl From<QueueDepth> for QueueStatus {
    fn from(depth: QueueDepth) -> Self {
        Self {
            urgent: depth.urgent,
            background: depth.background,
        }
    }
}

/// The single long-lived orchestrator instance.
pub struct Speaker {
    scheduler: Scheduler,
    player: PlaybackController,
    translator: Translator,
}

impl Speaker {
    pub fn new(
        config: &Config,
        synthesis: Arc<dyn SynthesisClient>,
        translation: Arc<dyn TranslationClient>,
        store: Arc<dyn DurableStore>,
        output: Box<dyn OutputFactory>,
    ) -> Self {
        let cooldown = config.pacing.cooldown();
        let retry = RetryPolicy::new(&config.retry, cooldown);

        let synthesis_pacer = Arc::new(Pacer::for_synthesis(&config.pacing));
        let fetcher = FetchExecutor::new(synthesis, synthesis_pacer.clone(), &config.synthesis);
        let scheduler = Scheduler::new(
            Arc::new(AudioCache::new(store)),
            fetcher,
            synthesis_pacer,
            retry.clone(),
            config.prefetch.max_per_call,
        );

        let translator = Translator::new(translation, Pacer::for_translation(&config.pacing), retry);

        Self {
            scheduler,
            player: PlaybackController::new(output),
            translator,
        }
    }

    /// Production wiring: Gemini, file (or memory) store, default output device.
    pub fn from_config(config: &Config) -> Result<Self, AudioError> {
        let gemini = Arc::new(GeminiClient::new(&config.gemini)?);

        let store: Arc<dyn DurableStore> = if config.cache.persist {
            let dir = config.cache.resolved_dir();
            info!("Audio cache at {}", dir.display());
            Arc::new(FileStore::new(dir))
        } else {
            info!("Audio cache persistence disabled");
            Arc::new(MemoryStore::new())
        };

        Ok(Self::new(
            config,
            gemini.clone(),
            gemini,
            store,
            Box::new(RodioOutputFactory),
        ))
    }

    /// Resolve audio for an utterance without playing it.
    pub async fn fetch(&self, utterance: Utterance, urgent: bool) -> Result<Arc<AudioBuffer>, AudioError> {
        let utterance = utterance.normalized();
        if utterance.is_empty() {
            return Err(AudioError::EmptyUtterance);
        }
        self.scheduler.submit(utterance.payload(), urgent).await
    }

    /// User-triggered: fetch with priority, then play, preempting any
    /// current playback. Returns once playback has started.
    pub async fn speak(&self, utterance: Utterance) -> Result<(PlaybackDone, Duration), AudioError> {
        let buffer = self.fetch(utterance, true).await?;
        let duration = buffer.duration();
        let done = self.player.play(buffer)?;
        Ok((done, duration))
    }

    /// Speak a translation result in whichever language its script suggests.
    pub async fn speak_translation(&self, text: &str) -> Result<(PlaybackDone, Duration), AudioError> {
        self.speak(Utterance::from_translation(text)).await
    }

    /// Warm the cache in the background.
    pub async fn prefetch(&self, utterances: Vec<Utterance>) -> usize {
        let payloads: Vec<String> = utterances
            .into_iter()
            .map(Utterance::normalized)
            .filter(|u| !u.is_empty())
            .map(|u| u.payload())
            .collect();
        self.scheduler.prefetch(payloads).await
    }

    pub async fn translate(&self, text: &str) -> String {
        self.translator.translate(text).await
    }

    pub fn stop(&self) {
        self.player.stop();
    }

    pub fn status(&self) -> SpeakerStatus {
        let remaining = self.scheduler.cooldown_remaining();
        SpeakerStatus {
            playing: self.player.is_playing(),
            queue: self.scheduler.queue_depth().into(),
            cooling_down: !remaining.is_zero(),
            cooldown_remaining_ms: u64::try_from(remaining.as_millis()).unwrap_or(u64::MAX),
            cached_in_memory: self.scheduler.cache().memory_len(),
        }
    }
}
