//! Label remapping and JSONL export.
//!
//! Epistemic foundation:
//! - K_i: Artifacts are concatenated in the order given
//! - K_i: new_label ∈ {entailment, neutral, contradiction} → {0, 1, 2}
//! - B_i: Anything else → -1, counted and logged, never dropped
//! - B_i: An artifact may not be a JSON array of objects → MalformedArtifact

use crate::models::{ContrastError, NormalizedRecord, Result, UNMAPPED_LABEL};
use serde_json::Value;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// A record whose `new_label` is not a canonical label.
#[derive(Debug, Clone, PartialEq)]
pub struct UnmappedLabel {
    pub artifact: PathBuf,
    /// Position within that artifact
    pub index: usize,
    pub value: Value,
}

/// Normalized records plus what could not be mapped.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    pub records: Vec<NormalizedRecord>,
    pub unmapped: Vec<UnmappedLabel>,
}

impl Normalized {
    pub fn unmapped_count(&self) -> usize {
        self.unmapped.len()
    }
}

/// Normalize every artifact, in order.
pub fn normalize<P: AsRef<Path>>(paths: &[P]) -> Result<Normalized> {
    let mut out = Normalized::default();

    for path in paths {
        let path = path.as_ref();
        let value = read_value(path)?;
        let before = out.records.len();
        normalize_value(path, value, &mut out)?;
        info!(
            artifact = %path.display(),
            records = out.records.len() - before,
            "Normalized artifact"
        );
    }

    if !out.unmapped.is_empty() {
        warn!(
            unmapped = out.unmapped.len(),
            total = out.records.len(),
            "Records with unmapped labels were written with label {}",
            UNMAPPED_LABEL
        );
    }

    Ok(out)
}

fn read_value(path: &Path) -> Result<Value> {
    let file = File::open(path)
        .map_err(|e| ContrastError::io(format!("opening artifact {}", path.display()), e))?;
    serde_json::from_reader(BufReader::new(file))
        .map_err(|e| ContrastError::malformed(path, format!("not valid JSON: {e}")))
}

fn normalize_value(path: &Path, value: Value, out: &mut Normalized) -> Result<()> {
    let Value::Array(items) = value else {
        return Err(ContrastError::malformed(path, "top level is not a JSON array"));
    };

    for (index, item) in items.into_iter().enumerate() {
        let Value::Object(mut obj) = item else {
            return Err(ContrastError::malformed(
                path,
                format!("element {index} is not an object"),
            ));
        };

        let premise = take_string(path, index, &mut obj, "premise")?;
        let hypothesis = take_string(path, index, &mut obj, "perturbed_hypothesis")?;
        let new_label = obj.remove("new_label").ok_or_else(|| {
            ContrastError::malformed(path, format!("element {index} has no \"new_label\""))
        })?;

        let record = match &new_label {
            Value::String(symbol) => NormalizedRecord::from_parts(premise, hypothesis, symbol),
            _ => NormalizedRecord {
                premise,
                hypothesis,
                label: UNMAPPED_LABEL,
            },
        };

        if record.is_unmapped() {
            warn!(
                artifact = %path.display(),
                index,
                new_label = %new_label,
                "Unmapped label"
            );
            out.unmapped.push(UnmappedLabel {
                artifact: path.to_path_buf(),
                index,
                value: new_label,
            });
        }

        out.records.push(record);
    }

    Ok(())
}

fn take_string(
    path: &Path,
    index: usize,
    obj: &mut serde_json::Map<String, Value>,
    field: &str,
) -> Result<String> {
    match obj.remove(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(ContrastError::malformed(
            path,
            format!("element {index}: \"{field}\" is not a string"),
        )),
        None => Err(ContrastError::malformed(
            path,
            format!("element {index} has no \"{field}\""),
        )),
    }
}

/// Expand CLI inputs that may be glob patterns.
///
/// Argument order is kept; the matches of one pattern are sorted. Plain
/// paths pass through unchanged so a missing file fails at read time.
pub fn expand_inputs(inputs: &[PathBuf]) -> Result<Vec<PathBuf>> {
    let mut resolved = Vec::new();
    for input in inputs {
        let text = input.to_string_lossy();
        if !(text.contains('*') || text.contains('?') || text.contains('[')) {
            resolved.push(input.clone());
            continue;
        }

        let entries = glob::glob(&text)
            .map_err(|e| ContrastError::Input(format!("bad pattern {text}: {e}")))?;
        let mut matched = Vec::new();
        for entry in entries {
            matched.push(entry.map_err(|e| {
                let path = e.path().to_path_buf();
                ContrastError::io(format!("reading {}", path.display()), e.into_error())
            })?);
        }
        if matched.is_empty() {
            return Err(ContrastError::Input(format!("pattern {text} matched no files")));
        }
        matched.sort();
        resolved.extend(matched);
    }
    Ok(resolved)
}

/// Write records as JSONL: one compact object per line, in order.
pub fn write_jsonl(records: &[NormalizedRecord], path: &Path) -> Result<()> {
    let file = File::create(path).map_err(|e| ContrastError::io("creating JSONL output", e))?;
    let mut writer = BufWriter::new(file);

    for record in records {
        let json = serde_json::to_string(record)
            .map_err(|e| ContrastError::Internal(format!("Failed to serialize record: {}", e)))?;
        writeln!(writer, "{}", json).map_err(|e| ContrastError::io("writing JSONL output", e))?;
    }

    writer
        .flush()
        .map_err(|e| ContrastError::io("flushing JSONL output", e))?;

    info!(path = %path.display(), records = records.len(), "Wrote JSONL");
    Ok(())
}
