//! Playback controller: one audible stream at a time.
//!
//! Starting a new stream stops the previous handle before the new one is
//! started. A stopped handle never reports a natural end. The output device
//! is opened lazily on the first `play` and reused afterwards.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::decode::AudioBuffer;
use crate::error::AudioError;

/// Callback invoked once when a handle finishes naturally.
pub type EndedCallback = Box<dyn FnOnce() + Send + 'static>;

/// One playable source bound to an output device.
pub trait PlaybackHandle: Send {
    fn start(&mut self) -> Result<(), AudioError>;
    /// Best effort; a stopped handle must not fire its ended callback.
    fn stop(&mut self);
    fn on_ended(&mut self, callback: EndedCallback);
}

/// An opened output device.
pub trait AudioOutput: Send {
    /// Resume the device if the platform suspended it.
    fn resume(&mut self) -> Result<(), AudioError> {
        Ok(())
    }

    fn create_source(&mut self, buffer: Arc<AudioBuffer>) -> Result<Box<dyn PlaybackHandle>, AudioError>;
}

/// Opens the output device on first use.
pub trait OutputFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn AudioOutput>, AudioError>;
}

/// How a playback ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackEnd {
    Finished,
    /// Preempted by a newer `play` or stopped explicitly.
    Interrupted,
}

/// Resolves when the playback it belongs to ends.
pub struct PlaybackDone {
    rx: oneshot::Receiver<()>,
}

impl Future for PlaybackDone {
    type Output = PlaybackEnd;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx).poll(cx).map(|ended| match ended {
            Ok(()) => PlaybackEnd::Finished,
            // Sender dropped together with the stopped handle.
            Err(_) => PlaybackEnd::Interrupted,
        })
    }
}

#[derive(Default)]
struct PlayerState {
    device: Option<Box<dyn AudioOutput>>,
    current: Option<Box<dyn PlaybackHandle>>,
    generation: u64,
}

pub struct PlaybackController {
    factory: Box<dyn OutputFactory>,
    state: Arc<Mutex<PlayerState>>,
}

impl PlaybackController {
    pub fn new(factory: Box<dyn OutputFactory>) -> Self {
        Self {
            factory,
            state: Arc::new(Mutex::new(PlayerState::default())),
        }
    }

    /// Stop whatever is playing and start `buffer`.
    pub fn play(&self, buffer: Arc<AudioBuffer>) -> Result<PlaybackDone, AudioError> {
        let mut state = self.state.lock();

        if let Some(mut previous) = state.current.take() {
            previous.stop();
            debug!("Preempted previous playback");
        }
        state.generation += 1;
        let generation = state.generation;

        if state.device.is_none() {
            state.device = Some(self.factory.open()?);
            info!("Audio output opened");
        }
        let device = state
            .device
            .as_mut()
            .ok_or_else(|| AudioError::DeviceStart("output device unavailable".into()))?;
        device.resume()?;

        let mut handle = device.create_source(buffer)?;

        let (tx, rx) = oneshot::channel();
        let shared = Arc::downgrade(&self.state);
        handle.on_ended(Box::new(move || {
            if let Some(shared) = shared.upgrade() {
                let mut state = shared.lock();
                if state.generation == generation {
                    state.current = None;
                }
            }
            let _ = tx.send(());
        }));

        if let Err(e) = handle.start() {
            warn!("Playback failed to start: {e}");
            return Err(e);
        }
        state.current = Some(handle);

        Ok(PlaybackDone { rx })
    }

    pub fn stop(&self) {
        let mut state = self.state.lock();
        if let Some(mut handle) = state.current.take() {
            handle.stop();
            state.generation += 1;
            info!("Playback stopped");
        }
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().current.is_some()
    }
}

// --- rodio backend ---

/// Default output device through rodio.
pub struct RodioOutputFactory;

impl OutputFactory for RodioOutputFactory {
    fn open(&self) -> Result<Box<dyn AudioOutput>, AudioError> {
        let stream = OutputStreamBuilder::open_default_stream()
            .map_err(|e| AudioError::DeviceStart(format!("Failed to open audio output: {e}")))?;
        Ok(Box::new(RodioOutput { stream }))
    }
}

struct RodioOutput {
    // Kept alive for the process lifetime; dropping it silences every sink.
    stream: OutputStream,
}

impl AudioOutput for RodioOutput {
    fn create_source(&mut self, buffer: Arc<AudioBuffer>) -> Result<Box<dyn PlaybackHandle>, AudioError> {
        let sink = Sink::connect_new(self.stream.mixer());
        sink.pause();
        sink.append(SamplesBuffer::new(
            buffer.channels,
            buffer.sample_rate,
            buffer.samples.clone(),
        ));
        Ok(Box::new(RodioHandle {
            sink: Arc::new(sink),
            stopped: Arc::new(AtomicBool::new(false)),
            on_ended: None,
        }))
    }
}

struct RodioHandle {
    sink: Arc<Sink>,
    stopped: Arc<AtomicBool>,
    on_ended: Option<EndedCallback>,
}

impl PlaybackHandle for RodioHandle {
    fn start(&mut self) -> Result<(), AudioError> {
        let sink = self.sink.clone();
        let stopped = self.stopped.clone();
        let on_ended = self.on_ended.take();

        // sleep_until_end returns when the queue drains or stop() clears it.
        std::thread::Builder::new()
            .name("playback-watch".into())
            .spawn(move || {
                sink.sleep_until_end();
                if stopped.load(Ordering::SeqCst) {
                    return;
                }
                debug!("Playback finished naturally");
                if let Some(cb) = on_ended {
                    cb();
                }
            })
            .map_err(|e| AudioError::DeviceStart(format!("Failed to spawn playback watcher: {e}")))?;

        self.sink.play();
        Ok(())
    }

    fn stop(&mut self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.sink.stop();
    }

    fn on_ended(&mut self, callback: EndedCallback) {
        self.on_ended = Some(callback);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    type Log = Arc<Mutex<Vec<String>>>;
    type Endings = Arc<Mutex<Vec<(String, Arc<AtomicBool>, Option<EndedCallback>)>>>;

    struct FakeFactory {
        log: Log,
        endings: Endings,
        opens: Arc<AtomicUsize>,
        fail_start: bool,
    }

    struct FakeOutput {
        log: Log,
        endings: Endings,
        fail_start: bool,
        next: usize,
    }

    struct FakeHandle {
        name: String,
        log: Log,
        endings: Endings,
        stopped: Arc<AtomicBool>,
        on_ended: Option<EndedCallback>,
        fail_start: bool,
    }

    impl OutputFactory for FakeFactory {
        fn open(&self) -> Result<Box<dyn AudioOutput>, AudioError> {
            self.opens.fetch_add(1, Ordering::SeqCst);
            Ok(Box::new(FakeOutput {
                log: self.log.clone(),
                endings: self.endings.clone(),
                fail_start: self.fail_start,
                next: 0,
            }))
        }
    }

    impl AudioOutput for FakeOutput {
        fn create_source(&mut self, _buffer: Arc<AudioBuffer>) -> Result<Box<dyn PlaybackHandle>, AudioError> {
            let name = ((b'A' + self.next as u8) as char).to_string();
            self.next += 1;
            Ok(Box::new(FakeHandle {
                name,
                log: self.log.clone(),
                endings: self.endings.clone(),
                stopped: Arc::new(AtomicBool::new(false)),
                on_ended: None,
                fail_start: self.fail_start,
            }))
        }
    }

    impl PlaybackHandle for FakeHandle {
        fn start(&mut self) -> Result<(), AudioError> {
            if self.fail_start {
                return Err(AudioError::DeviceStart("no sink".into()));
            }
            self.log.lock().push(format!("{}.start", self.name));
            self.endings
                .lock()
                .push((self.name.clone(), self.stopped.clone(), self.on_ended.take()));
            Ok(())
        }

        fn stop(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
            self.log.lock().push(format!("{}.stop", self.name));
        }

        fn on_ended(&mut self, callback: EndedCallback) {
            self.on_ended = Some(callback);
        }
    }

    /// Let every un-stopped handle end naturally; returns the names that fired.
    fn finish_all(endings: &Endings) -> Vec<String> {
        let mut fired = Vec::new();
        for (name, stopped, cb) in endings.lock().drain(..) {
            if stopped.load(Ordering::SeqCst) {
                continue;
            }
            if let Some(cb) = cb {
                cb();
                fired.push(name);
            }
        }
        fired
    }

    fn controller(fail_start: bool) -> (PlaybackController, Log, Endings, Arc<AtomicUsize>) {
        let log: Log = Arc::default();
        let endings: Endings = Arc::default();
        let opens = Arc::new(AtomicUsize::new(0));
        let factory = FakeFactory {
            log: log.clone(),
            endings: endings.clone(),
            opens: opens.clone(),
            fail_start,
        };
        (PlaybackController::new(Box::new(factory)), log, endings, opens)
    }

    fn buffer() -> Arc<AudioBuffer> {
        Arc::new(AudioBuffer {
            samples: vec![0.0; 240],
            sample_rate: 24000,
            channels: 1,
        })
    }

    #[tokio::test]
    async fn test_new_playback_preempts_old() {
        let (player, log, endings, opens) = controller(false);

        let done_a = player.play(buffer()).unwrap();
        let done_b = player.play(buffer()).unwrap();

        assert_eq!(*log.lock(), vec!["A.start", "A.stop", "B.start"]);
        assert_eq!(finish_all(&endings), vec!["B"]);
        assert_eq!(done_a.await, PlaybackEnd::Interrupted);
        assert_eq!(done_b.await, PlaybackEnd::Finished);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(!player.is_playing());
    }

    #[tokio::test]
    async fn test_stop_interrupts() {
        let (player, log, endings, _) = controller(false);
        let done = player.play(buffer()).unwrap();
        assert!(player.is_playing());

        player.stop();
        assert!(!player.is_playing());
        assert!(finish_all(&endings).is_empty());
        assert_eq!(done.await, PlaybackEnd::Interrupted);
        assert_eq!(*log.lock(), vec!["A.start", "A.stop"]);
    }

    #[tokio::test]
    async fn test_start_failure_surfaces() {
        let (player, _, _, _) = controller(true);
        assert!(matches!(player.play(buffer()), Err(AudioError::DeviceStart(_))));
        assert!(!player.is_playing());
    }
}
