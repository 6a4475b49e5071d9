//! Contrast set assembly.
//!
//! Pipeline flow:
//! Corpus → select (once per original label) → Engine (per transition)
//!        → `{from}_to_{to}.json` → [combined JSONL] → manifest.json
//!
//! Epistemic foundation:
//! - K_i: Every transition with the same original label sees the same subset
//! - B_i: The corpus may be too small → InsufficientData before any call
//! - I^B: Per-example failures stay inside the engine; only counts escape

use super::{
    GenerationEngine, artifact_path, normalize, write_artifact, write_json_atomic, write_jsonl,
};
use crate::corpus::select;
use crate::models::{
    Config, ContrastError, Label, OutputConfig, Result, RunStats, SamplingConfig, SourceExample,
    TransitionStats,
};
use crate::prompt::TransitionRegistry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn};

/// Manifest file name inside the output directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// What one transition produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionReport {
    pub name: String,
    pub from: Label,
    pub to: Label,
    pub artifact: PathBuf,
    pub stats: TransitionStats,
}

/// Summary of an assembly run, also persisted as `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssemblyReport {
    pub run_id: String,
    pub model: String,
    pub seed: Option<u64>,
    pub per_label_sample_size: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub transitions: Vec<TransitionReport>,
    #[serde(default)]
    pub combined: Option<PathBuf>,
    #[serde(default)]
    pub unmapped_labels: usize,
    pub stats: RunStats,
}

impl AssemblyReport {
    /// Transition name → artifact path.
    pub fn paths(&self) -> BTreeMap<String, PathBuf> {
        self.transitions
            .iter()
            .map(|t| (t.name.clone(), t.artifact.clone()))
            .collect()
    }
}

/// Runs every configured transition and persists the artifacts.
pub struct ContrastSetAssembler {
    engine: GenerationEngine,
    registry: TransitionRegistry,
    sampling: SamplingConfig,
    output: OutputConfig,
    model_id: String,
}

impl ContrastSetAssembler {
    /// Build from configuration. Templates are loaded and validated here.
    pub fn from_config(config: &Config, engine: GenerationEngine) -> Result<Self> {
        let registry = TransitionRegistry::from_config(config)?;
        Ok(Self::new(
            registry,
            engine,
            config.sampling.clone(),
            config.output.clone(),
            config.model.id.clone(),
        ))
    }

    pub fn new(
        registry: TransitionRegistry,
        engine: GenerationEngine,
        sampling: SamplingConfig,
        output: OutputConfig,
        model_id: String,
    ) -> Self {
        Self {
            engine,
            registry,
            sampling,
            output,
            model_id,
        }
    }

    pub fn registry(&self) -> &TransitionRegistry {
        &self.registry
    }

    /// Select the source subset for every distinct original label.
    ///
    /// Done up front so a short pool fails the run before any completion
    /// call is spent.
    fn select_subsets(
        &self,
        corpus: &[SourceExample],
    ) -> Result<HashMap<Label, Vec<SourceExample>>> {
        let mut subsets = HashMap::new();
        for transition in self.registry.iter() {
            let label = transition.from();
            if subsets.contains_key(&label) {
                continue;
            }
            let subset = select(
                corpus,
                label,
                self.sampling.per_label_sample_size,
                self.sampling.seed,
            )?;
            info!(label = %label, selected = subset.len(), "Selected source examples");
            subsets.insert(label, subset);
        }
        Ok(subsets)
    }

    /// Generate and persist every transition.
    pub async fn run(&self, corpus: &[SourceExample]) -> Result<AssemblyReport> {
        let start = Instant::now();
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();

        info!(
            run_id = %run_id,
            model = %self.model_id,
            transitions = self.registry.len(),
            per_label = self.sampling.per_label_sample_size,
            seed = ?self.sampling.seed,
            "Starting contrast set generation"
        );

        let subsets = self.select_subsets(corpus)?;

        fs::create_dir_all(&self.output.dir)
            .map_err(|e| ContrastError::io("creating output directory", e))?;

        let mut stats = RunStats::default();
        let mut transitions = Vec::with_capacity(self.registry.len());

        for transition in self.registry.iter() {
            let examples = subsets.get(&transition.from()).ok_or_else(|| {
                ContrastError::Internal(format!("no subset selected for {}", transition.from()))
            })?;

            let outcome = self.engine.generate(examples, transition).await;

            let path = artifact_path(&self.output.dir, &transition.name());
            write_artifact(&outcome.records, &path)?;
            info!(
                transition = %transition.name(),
                path = %path.display(),
                records = outcome.records.len(),
                "Artifact saved"
            );

            stats.record(&outcome.stats);
            transitions.push(TransitionReport {
                name: transition.name(),
                from: transition.from(),
                to: transition.to(),
                artifact: path,
                stats: outcome.stats,
            });
        }

        let mut unmapped_labels = 0;
        if let Some(combined) = &self.output.combined {
            let paths: Vec<&Path> = transitions.iter().map(|t| t.artifact.as_path()).collect();
            let normalized = normalize(&paths)?;
            unmapped_labels = normalized.unmapped_count();
            if let Some(parent) = combined.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent)
                    .map_err(|e| ContrastError::io("creating combined output directory", e))?;
            }
            write_jsonl(&normalized.records, combined)?;
        }

        stats.runtime_secs = start.elapsed().as_secs_f64();
        stats.finalize();

        let report = AssemblyReport {
            run_id,
            model: self.model_id.clone(),
            seed: self.sampling.seed,
            per_label_sample_size: self.sampling.per_label_sample_size,
            started_at,
            finished_at: Utc::now(),
            transitions,
            combined: self.output.combined.clone(),
            unmapped_labels,
            stats,
        };

        write_json_atomic(&report, &self.output.dir.join(MANIFEST_FILE))?;

        if report.stats.total_dropped > 0 {
            warn!(
                dropped = report.stats.total_dropped,
                "Some examples produced no record"
            );
        }
        info!(
            produced = report.stats.total_produced,
            requested = report.stats.total_requested,
            success_rate = format!("{:.1}%", report.stats.success_rate * 100.0),
            throughput = format!("{:.0}/hr", report.stats.throughput_per_hour),
            "Contrast set generation complete"
        );

        Ok(report)
    }
}
