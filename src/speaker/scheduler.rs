//! Single-flight priority scheduler.
//!
//! Requests land in one of two FIFOs (urgent, background). One drain task
//! at a time pops the next request, urgent first, and runs it to completion
//! before popping another, so there is never more than one synthesis call
//! outstanding:
//!
//! Queued → CacheHit → Resolved
//! Queued → CacheMiss → Paced → Fetching → Resolved | Rejected
//!
//! The queues and the `draining` flag share one mutex, which is also what
//! decides whether a new drain task has to be spawned.

use std::collections::{HashSet, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::cache::AudioCache;
use super::decode::{decode, AudioBuffer};
use super::fetch::FetchExecutor;
use super::pacing::Pacer;
use super::retry::RetryPolicy;
use crate::error::AudioError;

type Reply = oneshot::Sender<Result<Arc<AudioBuffer>, AudioError>>;

struct Task {
    id: u64,
    payload: String,
    urgent: bool,
    reply: Reply,
}

#[derive(Default)]
struct Queues {
    urgent: VecDeque<Task>,
    background: VecDeque<Task>,
    draining: bool,
}

impl Queues {
    fn pop_next(&mut self) -> Option<Task> {
        self.urgent.pop_front().or_else(|| self.background.pop_front())
    }
}

/// Resolves to the decoded audio of a submitted request.
pub struct Ticket {
    rx: oneshot::Receiver<Result<Arc<AudioBuffer>, AudioError>>,
}

impl Future for Ticket {
    type Output = Result<Arc<AudioBuffer>, AudioError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or(Err(AudioError::SchedulerClosed)))
    }
}

/// Number of queued (not yet started) requests per level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueDepth {
    pub urgent: usize,
    pub background: usize,
}

struct Inner {
    queues: Mutex<Queues>,
    next_id: AtomicU64,
    cache: Arc<AudioCache>,
    fetcher: FetchExecutor,
    pacer: Arc<Pacer>,
    retry: RetryPolicy,
    prefetch_limit: usize,
}

#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(
        cache: Arc<AudioCache>,
        fetcher: FetchExecutor,
        pacer: Arc<Pacer>,
        retry: RetryPolicy,
        prefetch_limit: usize,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: Mutex::new(Queues::default()),
                next_id: AtomicU64::new(1),
                cache,
                fetcher,
                pacer,
                retry,
                prefetch_limit,
            }),
        }
    }

    /// Queue a request. Order is fixed when this returns, not when the
    /// ticket is first polled. Must be called from within a tokio runtime.
    pub fn submit(&self, payload: impl Into<String>, urgent: bool) -> Ticket {
        let (reply, rx) = oneshot::channel();
        let task = Task {
            id: self.inner.next_id.fetch_add(1, Ordering::Relaxed),
            payload: payload.into(),
            urgent,
            reply,
        };
        debug!("Queued #{} '{}' (urgent={urgent})", task.id, task.payload);

        let start_drain = {
            let mut queues = self.inner.queues.lock();
            if urgent {
                queues.urgent.push_back(task);
            } else {
                queues.background.push_back(task);
            }
            !std::mem::replace(&mut queues.draining, true)
        };

        if start_drain {
            tokio::spawn(drain(self.inner.clone()));
        }

        Ticket { rx }
    }

    /// Warm the cache with a batch of payloads.
    ///
    /// Blank, duplicate and already cached payloads are skipped, and at most
    /// the configured per-call limit is queued. Failures are logged only.
    /// Returns how many requests were queued.
    pub async fn prefetch<I, S>(&self, payloads: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let mut queued = 0;

        for payload in payloads {
            if queued >= self.inner.prefetch_limit {
                break;
            }
            let payload: String = payload.into();
            if payload.trim().is_empty() || !seen.insert(payload.clone()) {
                continue;
            }
            if self.inner.cache.contains(&payload).await {
                continue;
            }

            let ticket = self.submit(payload.clone(), false);
            tokio::spawn(async move {
                if let Err(e) = ticket.await {
                    debug!("Pre-fetch of '{payload}' dropped: {e}");
                }
            });
            queued += 1;
        }

        if queued > 0 {
            info!("Pre-fetch queued {queued} request(s)");
        }
        queued
    }

    pub fn queue_depth(&self) -> QueueDepth {
        let queues = self.inner.queues.lock();
        QueueDepth {
            urgent: queues.urgent.len(),
            background: queues.background.len(),
        }
    }

    pub fn cooldown_remaining(&self) -> std::time::Duration {
        self.inner.pacer.cooldown_remaining()
    }

    pub fn cache(&self) -> &Arc<AudioCache> {
        &self.inner.cache
    }
}

/// Clears `draining` if the drain loop exits without doing so itself, so
/// the next `submit` can start a fresh one.
struct DrainGuard {
    inner: Arc<Inner>,
    finished: bool,
}

impl Drop for DrainGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.inner.queues.lock().draining = false;
            warn!("Drain loop stopped early; the next request restarts it");
        }
    }
}

/// Drain loop. Exits, clearing `draining` under the same lock, once both
/// queues are empty.
async fn drain(inner: Arc<Inner>) {
    let mut guard = DrainGuard {
        inner: inner.clone(),
        finished: false,
    };

    loop {
        let next = {
            let mut queues = inner.queues.lock();
            let next = queues.pop_next();
            if next.is_none() {
                queues.draining = false;
                guard.finished = true;
            }
            next
        };

        let Some(task) = next else {
            return;
        };

        // Each step runs as its own task so a panic fails one request
        // instead of the loop.
        let step = tokio::spawn({
            let inner = inner.clone();
            let payload = task.payload.clone();
            let urgent = task.urgent;
            async move { inner.resolve(&payload, urgent).await }
        });
        let result = match step.await {
            Ok(result) => result,
            Err(e) => Err(AudioError::TaskFailed(e.to_string())),
        };

        match &result {
            Ok(_) => debug!("Resolved #{} '{}'", task.id, task.payload),
            Err(e) if task.urgent => warn!("Request #{} '{}' failed: {e}", task.id, task.payload),
            Err(e) => debug!("Background #{} '{}' failed: {e}", task.id, task.payload),
        }
        // Receiver may have been dropped by an impatient caller.
        let _ = task.reply.send(result);
    }
}

impl Inner {
    async fn resolve(&self, payload: &str, urgent: bool) -> Result<Arc<AudioBuffer>, AudioError> {
        if let Some(buffer) = self.cache.lookup(payload).await {
            debug!("Cache hit for '{payload}'");
            return Ok(buffer);
        }

        if self.pacer.is_cooling_down(urgent) {
            return Err(AudioError::CoolingDown {
                remaining: self.pacer.cooldown_remaining(),
            });
        }

        let bytes = self
            .retry
            .execute(&self.pacer, urgent, || self.fetcher.fetch(payload, urgent))
            .await?;

        self.cache.store(payload, &bytes).await;
        let buffer = Arc::new(decode(&bytes)?);
        self.cache.insert_decoded(payload, buffer.clone());
        info!(
            "Synthesized '{payload}' ({:.1}s of audio)",
            buffer.duration().as_secs_f64()
        );
        Ok(buffer)
    }
}
