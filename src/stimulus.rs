use serde::{Deserialize, Serialize};

/// Emotional polarity of a word, and the direction of a participant's answer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum_macros::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Polarity {
    Positive,
    Negative,
}

/// One word shown for classification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordStimulus {
    pub word: String,
    pub emotion: Polarity,
    pub language: String,
}

impl WordStimulus {
    pub fn new(word: impl Into<String>, emotion: Polarity, language: impl Into<String>) -> Self {
        Self {
            word: word.into(),
            emotion,
            language: language.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum_macros::Display)]
pub enum Block {
    Practice,
    Scored,
}

/// The practice and scored word lists for one session.
///
/// Presentation order is list order. The lists are private so nothing can
/// reorder or edit them once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StimulusSet {
    #[serde(rename = "trialWords")]
    practice: Vec<WordStimulus>,
    #[serde(rename = "testWords")]
    scored: Vec<WordStimulus>,
}

impl StimulusSet {
    pub fn new(practice: Vec<WordStimulus>, scored: Vec<WordStimulus>) -> Self {
        Self { practice, scored }
    }

    pub fn practice(&self) -> &[WordStimulus] {
        &self.practice
    }

    pub fn scored(&self) -> &[WordStimulus] {
        &self.scored
    }

    pub fn block(&self, block: Block) -> &[WordStimulus] {
        match block {
            Block::Practice => &self.practice,
            Block::Scored => &self.scored,
        }
    }

    /// Total number of exposures a complete session produces.
    pub fn len(&self) -> usize {
        self.practice.len() + self.scored.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
