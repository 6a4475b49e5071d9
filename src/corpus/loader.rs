//! JSONL corpus loading.
//!
//! K_i: Each line holds premise, hypothesis and an integer label.
//! B_i: Lines may be malformed → Parse error with line number
//! K_i: SNLI marks examples without a gold label with -1; those are skipped.

use crate::models::{ContrastError, Label, Result, SourceExample};
use serde::Deserialize;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
struct RawExample {
    premise: String,
    hypothesis: String,
    label: i64,
}

/// Examples loaded from a corpus file.
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    pub examples: Vec<SourceExample>,
    /// Rows whose label was outside {0, 1, 2}
    pub skipped: usize,
}

impl Corpus {
    /// Load a JSONL corpus file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| ContrastError::io("opening corpus file", e))?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parse JSONL from any reader.
    pub fn from_reader(reader: impl BufRead) -> Result<Self> {
        let mut corpus = Corpus::default();

        for (line_num, line) in reader.lines().enumerate() {
            let line = line.map_err(|e| ContrastError::io("reading corpus file", e))?;
            if line.trim().is_empty() {
                continue;
            }
            let raw: RawExample = serde_json::from_str(&line)
                .map_err(|e| ContrastError::Parse(format!("Line {}: {}", line_num + 1, e)))?;

            match Label::from_code(raw.label) {
                Some(label) => corpus
                    .examples
                    .push(SourceExample::new(raw.premise, raw.hypothesis, label)),
                None => corpus.skipped += 1,
            }
        }

        if corpus.skipped > 0 {
            warn!(
                skipped = corpus.skipped,
                "Skipped corpus rows without a gold label"
            );
        }
        info!(count = corpus.examples.len(), "Loaded corpus");
        Ok(corpus)
    }

    /// Number of examples carrying `label`.
    pub fn count(&self, label: Label) -> usize {
        self.examples.iter().filter(|e| e.label == label).count()
    }
}
