//! Utterances and their payload keys.
//!
//! A payload is the deterministic string identifying one synthesis request
//! and doubling as the cache key. Parts are joined with [`PAYLOAD_DELIMITER`]:
//! one part is a single-language phrase, two parts an Italian/Bengali pair,
//! three parts an alphabet tile (letter, example word, Bengali meaning).

use serde::{Deserialize, Serialize};

pub const PAYLOAD_DELIMITER: &str = "|||";

/// Something the learner wants to hear.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Utterance {
    AlphabetTile {
        letter: String,
        word: String,
        meaning: String,
    },
    Bilingual {
        italian: String,
        bangla: String,
    },
    Single {
        text: String,
    },
}

/// Trim a text part and blank out the delimiter so the part cannot split
/// into several when its payload is parsed back.
fn clean_part(part: String) -> String {
    if part.contains(PAYLOAD_DELIMITER) {
        part.replace(PAYLOAD_DELIMITER, " ").trim().to_string()
    } else {
        part.trim().to_string()
    }
}

impl Utterance {
    pub fn single(text: impl Into<String>) -> Self {
        Self::Single {
            text: clean_part(text.into()),
        }
    }

    /// Italian/Bengali pair. A pair with one empty side collapses to a single phrase.
    pub fn bilingual(italian: impl Into<String>, bangla: impl Into<String>) -> Self {
        let italian = clean_part(italian.into());
        let bangla = clean_part(bangla.into());
        match (italian.is_empty(), bangla.is_empty()) {
            (false, true) => Self::Single { text: italian },
            (true, false) => Self::Single { text: bangla },
            _ => Self::Bilingual { italian, bangla },
        }
    }

    pub fn alphabet_tile(
        letter: impl Into<String>,
        word: impl Into<String>,
        meaning: impl Into<String>,
    ) -> Self {
        Self::AlphabetTile {
            letter: clean_part(letter.into()),
            word: clean_part(word.into()),
            meaning: clean_part(meaning.into()),
        }
    }

    /// Wrap a translation result so it is spoken in the right language.
    ///
    /// Any ASCII letter means Italian, otherwise the text is treated as Bengali.
    pub fn from_translation(text: &str) -> Self {
        if text.chars().any(|c| c.is_ascii_alphabetic()) {
            Self::bilingual(text, "")
        } else {
            Self::bilingual("", text)
        }
    }

    /// Trim every part, strip the payload delimiter from it, and collapse
    /// one-sided pairs, as the constructors do. Needed for values built by
    /// deserialization.
    pub fn normalized(self) -> Self {
        match self {
            Self::Single { text } => Self::single(text),
            Self::Bilingual { italian, bangla } => Self::bilingual(italian, bangla),
            Self::AlphabetTile {
                letter,
                word,
                meaning,
            } => Self::alphabet_tile(letter, word, meaning),
        }
    }

    /// Deterministic cache key.
    pub fn payload(&self) -> String {
        match self {
            Self::Single { text } => text.trim().to_string(),
            Self::Bilingual { italian, bangla } => {
                format!("{italian}{PAYLOAD_DELIMITER}{bangla}")
            }
            Self::AlphabetTile {
                letter,
                word,
                meaning,
            } => format!("{letter}{PAYLOAD_DELIMITER}{word}{PAYLOAD_DELIMITER}{meaning}"),
        }
    }

    /// Parse a payload key back into an utterance.
    pub fn from_payload(payload: &str) -> Self {
        let parts: Vec<&str> = payload.split(PAYLOAD_DELIMITER).collect();
        match parts.as_slice() {
            [italian, bangla] => Self::bilingual(*italian, *bangla),
            [letter, word, meaning] => Self::alphabet_tile(*letter, *word, *meaning),
            _ => Self::single(payload),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Self::Single { text } => text.trim().is_empty(),
            Self::Bilingual { italian, bangla } => italian.is_empty() && bangla.is_empty(),
            Self::AlphabetTile {
                letter,
                word,
                meaning,
            } => letter.is_empty() && word.is_empty() && meaning.is_empty(),
        }
    }

    /// True when the request needs two distinct voices.
    pub fn is_dual_voice(&self) -> bool {
        matches!(self, Self::Bilingual { .. })
    }

    /// Prompt for a single-voice request.
    pub fn single_voice_prompt(&self) -> String {
        match self {
            Self::Single { text } => format!("Pronounce the following: {text}"),
            Self::Bilingual { italian, bangla } => {
                format!("Pronounce the following: Italian: {italian} Bengali: {bangla}")
            }
            Self::AlphabetTile {
                letter,
                word,
                meaning,
            } => format!(
                "Speak concisely: Italian letter \"{letter}\", then word \"{word}\", then say the Bengali meaning \"{meaning}\"."
            ),
        }
    }

    /// Prompt for a two-speaker request. Speaker names must match the
    /// names used in the multi-speaker voice config.
    pub fn dual_voice_prompt(&self) -> Option<String> {
        match self {
            Self::Bilingual { italian, bangla } => Some(format!(
                "Read this pronunciation drill slowly and clearly:\n{ITALIAN_SPEAKER}: {italian}\n{BANGLA_SPEAKER}: {bangla}"
            )),
            _ => None,
        }
    }
}

pub const ITALIAN_SPEAKER: &str = "Italian";
pub const BANGLA_SPEAKER: &str = "Bengali";
