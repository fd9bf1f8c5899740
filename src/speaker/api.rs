//! HTTP control API for the speaker.
//!
//! Binds to 127.0.0.1 only. `/speak` answers once playback has started, so
//! the caller sees synthesis failures directly.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::playback::PlaybackDone;
use super::utterance::Utterance;
use super::{Speaker, SpeakerStatus};
use crate::error::AudioError;

#[derive(Clone)]
pub struct ApiState {
    pub speaker: Arc<Speaker>,
}

// --- Request/Response types ---

#[derive(Debug, Serialize, Deserialize)]
pub struct PrefetchRequest {
    pub items: Vec<Utterance>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TextRequest {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TranslateResponse {
    pub translation: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct SimpleResponse {
    pub status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl SimpleResponse {
    fn ok(status: &str) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    fn err(error: &AudioError) -> Self {
        Self {
            status: "error".into(),
            error: Some(error.to_string()),
            hint: hint(error).map(String::from),
            ..Self::default()
        }
    }
}

/// Something the learner can act on.
fn hint(error: &AudioError) -> Option<&'static str> {
    if error.is_rate_limit() || matches!(error, AudioError::CoolingDown { .. }) {
        return Some("The voice service is busy. Wait a minute and try again.");
    }
    match error {
        AudioError::Auth(_) => Some("Check the Gemini API key (GEMINI_API_KEY)."),
        AudioError::DeviceStart(_) => Some("Check that an audio output device is available."),
        AudioError::Network(_) => Some("Check the network connection."),
        AudioError::NoAudioReturned(_) => Some("Try a shorter phrase."),
        AudioError::EmptyUtterance => Some("Send some text to speak."),
        _ => None,
    }
}

/// Build the axum router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/status", get(handle_status))
        .route("/speak", post(handle_speak))
        .route("/prefetch", post(handle_prefetch))
        .route("/translate", post(handle_translate))
        .route("/speak-translation", post(handle_speak_translation))
        .route("/stop", post(handle_stop))
        .with_state(state)
}

/// Start the API server as a background tokio task.
pub async fn start_api(state: ApiState, port: u16) -> Result<(), AudioError> {
    let app = router(state);
    let addr = format!("127.0.0.1:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Speaker API listening on {addr}");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            warn!("Speaker API server error: {e}");
        }
    });
    Ok(())
}

// --- Handlers ---

async fn handle_status(State(state): State<ApiState>) -> Json<SpeakerStatus> {
    Json(state.speaker.status())
}

fn started(result: Result<(PlaybackDone, Duration), AudioError>) -> Json<SimpleResponse> {
    match result {
        // Dropping the PlaybackDone does not stop playback.
        Ok((_done, duration)) => Json(SimpleResponse {
            duration_ms: Some(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)),
            ..SimpleResponse::ok("playing")
        }),
        Err(e) => {
            warn!("Speak failed: {e}");
            Json(SimpleResponse::err(&e))
        }
    }
}

async fn handle_speak(
    State(state): State<ApiState>,
    Json(utterance): Json<Utterance>,
) -> Json<SimpleResponse> {
    info!("HTTP /speak: {}", utterance.payload());
    started(state.speaker.speak(utterance).await)
}

async fn handle_prefetch(
    State(state): State<ApiState>,
    Json(req): Json<PrefetchRequest>,
) -> Json<SimpleResponse> {
    let queued = state.speaker.prefetch(req.items).await;
    Json(SimpleResponse {
        queued: Some(queued),
        ..SimpleResponse::ok("queued")
    })
}

async fn handle_translate(
    State(state): State<ApiState>,
    Json(req): Json<TextRequest>,
) -> Json<TranslateResponse> {
    Json(TranslateResponse {
        translation: state.speaker.translate(&req.text).await,
    })
}

async fn handle_speak_translation(
    State(state): State<ApiState>,
    Json(req): Json<TextRequest>,
) -> Json<SimpleResponse> {
    started(state.speaker.speak_translation(&req.text).await)
}

async fn handle_stop(State(state): State<ApiState>) -> Json<SimpleResponse> {
    state.speaker.stop();
    Json(SimpleResponse::ok("stopped"))
}
