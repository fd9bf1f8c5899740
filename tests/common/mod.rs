//! Shared fakes for the orchestrator integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::time::Instant;

use vocab_speaker::config::{Config, RetryConfig};
use vocab_speaker::error::AudioError;
use vocab_speaker::speaker::cache::AudioCache;
use vocab_speaker::speaker::decode::AudioBuffer;
use vocab_speaker::speaker::fetch::{FetchExecutor, SynthesisClient, SynthesisRequest};
use vocab_speaker::speaker::pacing::Pacer;
use vocab_speaker::speaker::playback::{AudioOutput, EndedCallback, OutputFactory, PlaybackHandle};
use vocab_speaker::speaker::retry::RetryPolicy;
use vocab_speaker::speaker::scheduler::Scheduler;
use vocab_speaker::speaker::store::{DurableStore, MemoryStore};
use vocab_speaker::speaker::translate::TranslationClient;
use vocab_speaker::Speaker;

/// 0.1s of silence at 24kHz mono PCM16.
pub const CLIP_BYTES: usize = 4800;

// ── Mock backends ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Call {
    pub prompt: String,
    pub dual_voice: bool,
    pub at: Instant,
}

/// Records every request; answers with canned PCM after `latency`.
///
/// Scripted errors are consumed one per call, in order, before any call
/// succeeds.
pub struct FakeSynth {
    pub calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<AudioError>>,
    latency: Duration,
    /// Answer two-speaker requests without audio.
    no_dual_audio: bool,
    /// Answer every request without audio.
    no_audio: bool,
    panic_next: AtomicBool,
}

impl FakeSynth {
    pub fn new(latency: Duration) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(VecDeque::new()),
            latency,
            no_dual_audio: false,
            no_audio: false,
            panic_next: AtomicBool::new(false),
        }
    }

    pub fn single_voice_only(latency: Duration) -> Self {
        Self {
            no_dual_audio: true,
            ..Self::new(latency)
        }
    }

    pub fn silent(latency: Duration) -> Self {
        Self {
            no_audio: true,
            ..Self::new(latency)
        }
    }

    /// The next call panics instead of answering.
    pub fn panic_next(&self) {
        self.panic_next.store(true, Ordering::SeqCst);
    }

    pub fn fail_next(&self, error: AudioError) {
        self.script.lock().push_back(error);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn prompts(&self) -> Vec<String> {
        self.calls.lock().iter().map(|c| c.prompt.clone()).collect()
    }

    pub fn times(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|c| c.at).collect()
    }
}

#[async_trait]
impl SynthesisClient for FakeSynth {
    async fn synthesize(&self, request: &SynthesisRequest) -> Result<Vec<u8>, AudioError> {
        self.calls.lock().push(Call {
            prompt: request.prompt.clone(),
            dual_voice: request.is_dual_voice(),
            at: Instant::now(),
        });
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        if self.panic_next.swap(false, Ordering::SeqCst) {
            panic!("synthesis backend crashed");
        }
        if let Some(err) = self.script.lock().pop_front() {
            return Err(err);
        }
        if self.no_audio || (self.no_dual_audio && request.is_dual_voice()) {
            return Err(AudioError::NoAudioReturned(request.prompt.clone()));
        }
        Ok(vec![0; CLIP_BYTES])
    }
}

pub struct FakeTranslator;

#[async_trait]
impl TranslationClient for FakeTranslator {
    async fn translate(&self, text: &str) -> Result<String, AudioError> {
        Ok(match text {
            "ciao" => "হ্যালো".to_string(),
            other => format!("tr:{other}"),
        })
    }
}

pub type Log = Arc<Mutex<Vec<String>>>;

/// Output device that only records what it was asked to do.
pub struct FakeOutputFactory {
    pub log: Log,
}

struct FakeOutput {
    log: Log,
    next: usize,
}

struct FakeHandle {
    name: String,
    log: Log,
    // Held until the handle is dropped; never fired.
    _on_ended: Option<EndedCallback>,
}

impl OutputFactory for FakeOutputFactory {
    fn open(&self) -> Result<Box<dyn AudioOutput>, AudioError> {
        self.log.lock().push("open".into());
        Ok(Box::new(FakeOutput {
            log: self.log.clone(),
            next: 0,
        }))
    }
}

impl AudioOutput for FakeOutput {
    fn create_source(&mut self, _buffer: Arc<AudioBuffer>) -> Result<Box<dyn PlaybackHandle>, AudioError> {
        self.next += 1;
        Ok(Box::new(FakeHandle {
            name: format!("clip{}", self.next),
            log: self.log.clone(),
            _on_ended: None,
        }))
    }
}

impl PlaybackHandle for FakeHandle {
    fn start(&mut self) -> Result<(), AudioError> {
        self.log.lock().push(format!("{}.start", self.name));
        Ok(())
    }

    fn stop(&mut self) {
        self.log.lock().push(format!("{}.stop", self.name));
    }

    fn on_ended(&mut self, callback: EndedCallback) {
        self._on_ended = Some(callback);
    }
}

// ── Builders ───────────────────────────────────────────────────────

/// Default config with jitter disabled so backoff timing is exact.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.retry = RetryConfig {
        jitter_ms: 0,
        ..RetryConfig::default()
    };
    config
}

pub fn speaker_with(
    config: &Config,
    synth: Arc<FakeSynth>,
    store: Arc<dyn DurableStore>,
) -> (Speaker, Log) {
    let log: Log = Arc::default();
    let speaker = Speaker::new(
        config,
        synth,
        Arc::new(FakeTranslator),
        store,
        Box::new(FakeOutputFactory { log: log.clone() }),
    );
    (speaker, log)
}

pub fn speaker(synth: Arc<FakeSynth>) -> (Speaker, Log) {
    speaker_with(&test_config(), synth, Arc::new(MemoryStore::new()))
}

/// Scheduler wired the same way `Speaker` wires it.
pub fn scheduler(config: &Config, synth: Arc<dyn SynthesisClient>) -> Scheduler {
    let pacer = Arc::new(Pacer::for_synthesis(&config.pacing));
    let fetcher = FetchExecutor::new(synth, pacer.clone(), &config.synthesis);
    Scheduler::new(
        Arc::new(AudioCache::new(Arc::new(MemoryStore::new()))),
        fetcher,
        pacer,
        RetryPolicy::new(&config.retry, config.pacing.cooldown()),
        config.prefetch.max_per_call,
    )
}
