//! Error types for the audio orchestrator.

use std::time::Duration;

/// Errors produced while resolving, fetching or playing audio.
#[derive(Debug, thiserror::Error)]
pub enum AudioError {
    /// Durable cache write failed. Logged by the cache, never returned to callers.
    #[error("Failed to write cache entry '{key}': {reason}")]
    CacheWrite { key: String, reason: String },

    /// Remote service answered 429.
    #[error("Rate limited by the synthesis service")]
    RateLimited,

    /// Remote service answered with a 5xx status.
    #[error("Synthesis service unavailable (HTTP {status})")]
    TransientServer { status: u16 },

    /// Connection failure or request timeout.
    #[error("Network error: {0}")]
    Network(String),

    /// Any other non-success status. Not retried.
    #[error("Request rejected (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    /// Missing API key or credentials refused.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Nothing to say.
    #[error("Nothing to speak")]
    EmptyUtterance,

    /// The response carried no audio payload.
    #[error("No audio returned for '{0}'")]
    NoAudioReturned(String),

    /// The response could not be parsed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Translation produced no text.
    #[error("Translation failed: {0}")]
    TranslationFailure(String),

    /// Output device could not be opened or the source could not start.
    #[error("Audio device failed to start: {0}")]
    DeviceStart(String),

    /// Background request rejected while a rate-limit cooldown is active.
    #[error("Cooling down after rate limit ({}ms remaining)", .remaining.as_millis())]
    CoolingDown { remaining: Duration },

    /// Every attempt failed with a retryable error.
    #[error("Giving up after {attempts} attempts: {last}")]
    RetriesExhausted {
        attempts: u32,
        last: Box<AudioError>,
    },

    /// The drain loop dropped the task without answering.
    #[error("Audio scheduler shut down before the request completed")]
    SchedulerClosed,

    /// A resolution step panicked. The scheduler keeps draining.
    #[error("Request failed unexpectedly: {0}")]
    TaskFailed(String),

    /// IO error (durable store).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AudioError {
    /// Whether the retry controller may attempt the operation again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RateLimited | Self::TransientServer { .. } | Self::Network(_)
        )
    }

    /// Whether the error is, or was ultimately caused by, a 429.
    pub fn is_rate_limit(&self) -> bool {
        match self {
            Self::RateLimited => true,
            Self::RetriesExhausted { last, .. } => last.is_rate_limit(),
            _ => false,
        }
    }
}

impl From<reqwest::Error> for AudioError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return status_error(status.as_u16(), e.to_string());
        }
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Map an HTTP status onto the error taxonomy.
pub fn status_error(status: u16, message: String) -> AudioError {
    match status {
        429 => AudioError::RateLimited,
        401 | 403 => AudioError::Auth(message),
        500..=599 => AudioError::TransientServer { status },
        _ => AudioError::Api { status, message },
    }
}
