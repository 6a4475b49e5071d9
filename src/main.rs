//! contrastset CLI - NLI contrast set generation.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use contrastset::client::{LLMClient, RateLimiter};
use contrastset::corpus::Corpus;
use contrastset::models::{Config, EditStrictness, Label};
use contrastset::pipeline::{
    ContrastSetAssembler, GenerationEngine, NonEmptyCheck, expand_inputs, normalize, write_jsonl,
};
use contrastset::prompt::{LabelTransition, TransitionRegistry};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{Level, info, warn};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "contrastset")]
#[command(version)]
#[command(about = "NLI contrast set generation via OpenAI-compatible completion endpoints")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(short, long, global = true, default_value = "config.toml")]
    config: PathBuf,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate one contrast artifact per configured transition
    Generate {
        /// Override the corpus path from the config
        #[arg(long)]
        corpus: Option<PathBuf>,

        /// Override the output directory from the config
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// Override the per-label sample size
        #[arg(short = 'n', long)]
        per_label: Option<usize>,

        /// Override the selection seed
        #[arg(long)]
        seed: Option<u64>,

        /// Also write all artifacts, normalized, to this JSONL file
        #[arg(long)]
        combined: Option<PathBuf>,

        /// Drop examples whose completion is empty
        #[arg(long)]
        reject_empty: bool,

        /// Hide progress bars
        #[arg(long)]
        no_progress: bool,
    },

    /// Convert transition artifacts into a single JSONL file
    Normalize {
        /// Artifact paths or glob patterns, concatenated in order
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Path to output JSONL file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// List transitions and their prompt templates
    Transitions {
        /// Show every label pair with built-in templates instead of the config
        #[arg(long)]
        all: bool,

        /// Editing strictness used with --all
        #[arg(long, default_value = "minimal")]
        strictness: EditStrictness,

        /// Print full template text
        #[arg(long)]
        templates: bool,

        /// Only show the transition starting from this label (requires --to)
        #[arg(long, requires = "to")]
        from: Option<Label>,

        /// Only show the transition ending at this label (requires --from)
        #[arg(long, requires = "from")]
        to: Option<Label>,
    },

    /// Validate configuration file
    Validate,

    /// Show example configuration
    Example,
}

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("Failed to set subscriber")
}

fn print_example_config() {
    let example = r#"# contrastset configuration file

[service]
# API key (can also use the api_key_env variable); ${VAR} is expanded
# api_key = "${GEMINI_API_KEY}"
api_key_env = "GEMINI_API_KEY"
base_url = "https://generativelanguage.googleapis.com/v1beta/openai"
timeout_secs = 60
max_retries = 1

[model]
id = "gemini-1.5-flash"
max_tokens = 256
# temperature = 0.7

[sampling]
corpus = "data/snli_test.jsonl"
per_label_sample_size = 100
seed = 42

[generation]
rate_limit_delay_seconds = 1.0
editing_strictness = "minimal"

[[transitions]]
from = "entailment"
to = "contradiction"

[[transitions]]
from = "contradiction"
to = "entailment"
editing_strictness = "free-form"

[[transitions]]
from = "neutral"
to = "entailment"
# template = "prompts/neutral_to_entailment.txt"

[output]
dir = "output"
combined = "output/contrast_set.jsonl"
"#;
    println!("{example}");
}

fn load_config(path: &Path) -> Result<Config> {
    Config::from_file(path).with_context(|| format!("Failed to load config from {:?}", path))
}

fn print_transition(transition: &LabelTransition, templates: bool) {
    println!("{:<32} {}", transition.name(), transition);
    if templates {
        println!("{}", transition.template().as_str());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        Commands::Example => {
            print_example_config();
        }

        Commands::Validate => {
            let config = load_config(&cli.config)?;
            let registry =
                TransitionRegistry::from_config(&config).context("Invalid transitions")?;

            if let Err(e) = config.resolve_api_key() {
                warn!("{e}");
            }

            info!("Configuration is valid");
            info!("  Model: {} at {}", config.model.id, config.service.base_url);
            info!(
                "  Sampling: {} per label from {:?} (seed: {:?})",
                config.sampling.per_label_sample_size, config.sampling.corpus, config.sampling.seed
            );
            info!(
                "  Delay: {:.2}s after each call",
                config.generation.rate_limit_delay_seconds
            );
            for transition in registry.iter() {
                info!("  Transition: {transition}");
            }
        }

        Commands::Transitions {
            all,
            strictness,
            templates,
            from,
            to,
        } => {
            let registry = if all {
                TransitionRegistry::all(strictness)?
            } else {
                TransitionRegistry::from_config(&load_config(&cli.config)?)?
            };
            match (from, to) {
                (Some(from), Some(to)) => match registry.get(from, to) {
                    Some(transition) => print_transition(transition, templates),
                    None => bail!("Transition {from} -> {to} is not configured"),
                },
                _ => {
                    for transition in registry.iter() {
                        print_transition(transition, templates);
                    }
                }
            }
        }

        Commands::Normalize { inputs, output } => {
            let paths = expand_inputs(&inputs)?;
            let normalized = normalize(&paths)?;
            write_jsonl(&normalized.records, &output)
                .with_context(|| format!("Failed to write {:?}", output))?;

            println!("\n=== Normalization Complete ===");
            println!("Artifacts:   {}", paths.len());
            println!("Records:     {}", normalized.records.len());
            println!("Unmapped:    {}", normalized.unmapped_count());
            println!("Output:      {output:?}");
        }

        Commands::Generate {
            corpus,
            output_dir,
            per_label,
            seed,
            combined,
            reject_empty,
            no_progress,
        } => {
            let mut config = load_config(&cli.config)?;

            if let Some(corpus) = corpus {
                config.sampling.corpus = corpus;
            }
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            if let Some(n) = per_label {
                config.sampling.per_label_sample_size = n;
            }
            if seed.is_some() {
                config.sampling.seed = seed;
            }
            if combined.is_some() {
                config.output.combined = combined;
            }

            let api_key = config
                .resolve_api_key()
                .context("Failed to resolve API key")?;

            let limiter = Arc::new(RateLimiter::from_secs_f64(
                config.generation.rate_limit_delay_seconds,
            ));
            let client = Arc::new(LLMClient::from_config(
                &config,
                api_key,
                Arc::clone(&limiter),
            )?);

            let mut engine = GenerationEngine::new(client.clone(), Arc::clone(&limiter))
                .with_progress(!no_progress);
            if reject_empty {
                engine = engine.with_check(Arc::new(NonEmptyCheck));
            }

            let assembler = ContrastSetAssembler::from_config(&config, engine)?;
            let corpus = Corpus::load(&config.sampling.corpus)
                .with_context(|| format!("Failed to load corpus {:?}", config.sampling.corpus))?;

            let report = assembler.run(&corpus.examples).await?;
            let (input_tokens, output_tokens) = client.total_tokens();
            let limiter_stats = limiter.stats();

            println!("\n=== Contrast Set Generation Complete ===");
            for t in &report.transitions {
                println!(
                    "{:<32} requested: {:>5}  produced: {:>5}  dropped: {:>5}",
                    t.name,
                    t.stats.requested,
                    t.stats.produced,
                    t.stats.dropped()
                );
            }
            println!("Run:         {}", report.run_id);
            println!("Requested:   {}", report.stats.total_requested);
            println!("Produced:    {}", report.stats.total_produced);
            println!("Dropped:     {}", report.stats.total_dropped);
            println!("Success:     {:.1}%", report.stats.success_rate * 100.0);
            println!("Throughput:  {:.0}/hr", report.stats.throughput_per_hour);
            println!("Tokens:      {input_tokens} in / {output_tokens} out");
            println!("429s:        {}", limiter_stats.total_429s);
            println!("Runtime:     {:.1}s", report.stats.runtime_secs);
            println!("Output:      {:?}", config.output.dir);
            if let Some(combined) = &report.combined {
                println!("Combined:    {combined:?} ({} unmapped)", report.unmapped_labels);
            }
        }
    }

    Ok(())
}
