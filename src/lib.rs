//! vocab-speaker: audio orchestration for an Italian/Bengali vocabulary trainer.

pub mod config;
pub mod error;
pub mod speaker;

pub use config::Config;
pub use error::AudioError;
pub use speaker::utterance::Utterance;
pub use speaker::Speaker;
