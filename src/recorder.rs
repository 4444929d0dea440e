use serde::{Deserialize, Serialize};

use crate::stimulus::{Block, Polarity, WordStimulus};

/// One completed exposure, in the shape the results service expects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub word: String,
    pub emotion: Polarity,
    pub language: String,
    pub response: Polarity,
    #[serde(rename = "responseTime")]
    pub latency_ms: u64,
}

impl TrialRecord {
    pub fn new(stimulus: &WordStimulus, response: Polarity, latency_ms: u64) -> Self {
        Self {
            word: stimulus.word.clone(),
            emotion: stimulus.emotion,
            language: stimulus.language.clone(),
            response,
            latency_ms,
        }
    }
}

#[derive(Debug, Clone)]
struct Entry {
    block: Block,
    record: TrialRecord,
}

/// Append-only history of trial records in exposure order.
#[derive(Debug, Default)]
pub struct TrialRecorder {
    entries: Vec<Entry>,
}

impl TrialRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        block: Block,
        stimulus: &WordStimulus,
        response: Polarity,
        latency_ms: u64,
    ) -> &TrialRecord {
        self.entries.push(Entry {
            block,
            record: TrialRecord::new(stimulus, response, latency_ms),
        });
        &self.entries[self.entries.len() - 1].record
    }

    /// Every record from both blocks.
    pub fn all(&self) -> Vec<TrialRecord> {
        self.entries.iter().map(|e| e.record.clone()).collect()
    }

    pub fn from_block(&self, block: Block) -> Vec<TrialRecord> {
        self.entries
            .iter()
            .filter(|e| e.block == block)
            .map(|e| e.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
