//! Italian <-> Bengali translation.
//!
//! Paced independently of synthesis, retried with the same policy. A failed
//! translation comes back as a placeholder string for the learner to see.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use super::pacing::Pacer;
use super::retry::RetryPolicy;
use crate::error::AudioError;

pub const TRANSLATION_PLACEHOLDER: &str = "Translation error";

#[async_trait]
pub trait TranslationClient: Send + Sync {
    async fn translate(&self, text: &str) -> Result<String, AudioError>;
}

pub struct Translator {
    client: Arc<dyn TranslationClient>,
    pacer: Pacer,
    retry: RetryPolicy,
}

impl Translator {
    pub fn new(client: Arc<dyn TranslationClient>, pacer: Pacer, retry: RetryPolicy) -> Self {
        Self {
            client,
            pacer,
            retry,
        }
    }

    /// Translate, surfacing errors.
    pub async fn try_translate(&self, text: &str) -> Result<String, AudioError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AudioError::TranslationFailure("nothing to translate".into()));
        }

        self.retry
            .execute(&self.pacer, true, || async {
                self.pacer.wait_turn(true).await;
                self.client.translate(text).await
            })
            .await
    }

    /// Translate, returning [`TRANSLATION_PLACEHOLDER`] on failure.
    pub async fn translate(&self, text: &str) -> String {
        match self.try_translate(text).await {
            Ok(translated) => {
                info!("Translated {} chars -> {} chars", text.len(), translated.len());
                translated
            }
            Err(e) => {
                warn!("Translation failed: {e}");
                TRANSLATION_PLACEHOLDER.to_string()
            }
        }
    }
}
