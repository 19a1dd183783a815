//! recobra-analyze - CLI front end for the sales-recovery analysis pipeline
//!
//! Loads transcript JSONL files, runs them through the cached classification
//! pipeline, and prints the derived status flags for the reporting layer.

use anyhow::{Context, Result};
use clap::Parser;
use recobra_core::cache::ResultCache;
use recobra_core::ingest::load_transcript_jsonl;
use recobra_core::pipeline::AnalysisPipeline;
use recobra_core::summary::create_summary_client;
use recobra_core::Config;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "recobra-analyze")]
#[command(about = "Analyze sales-recovery conversation transcripts")]
#[command(version)]
struct Args {
    /// Transcript files (JSONL, one message per line)
    #[arg(required_unless_present = "evict_field")]
    transcripts: Vec<PathBuf>,

    /// Also summarize each lead with the configured LLM
    #[arg(long)]
    summarize: bool,

    /// Strip a field from every stored payload (cache maintenance)
    #[arg(long, value_name = "FIELD")]
    evict_field: Option<String>,

    /// Digest to evict the field from; applies with --evict-field
    #[arg(long, value_name = "DIGEST", requires = "evict_field")]
    digest: Option<String>,

    /// Output format: text (default) or json
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Cache database path (defaults to the configured location)
    #[arg(long)]
    cache: Option<PathBuf>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        recobra_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open cache
    let cache_path = args
        .cache
        .clone()
        .unwrap_or_else(|| config.cache.resolved_path());
    let cache = ResultCache::open(&cache_path).context("failed to open cache")?;
    cache.migrate().context("failed to run cache migrations")?;

    // Targeted cache maintenance mode
    if let Some(ref field) = args.evict_field {
        let digest = args
            .digest
            .as_deref()
            .context("--digest is required with --evict-field")?;
        let removed = cache
            .evict_field(digest, field)
            .context("failed to evict field")?;
        if removed {
            println!("Evicted `{}` from {}", field, digest);
        } else {
            println!("Nothing to evict for {}", digest);
        }
        return Ok(());
    }

    // Validation rules: configured, or the built-in sales-recovery recipe
    let constraints = if config.validation.fields.is_empty() {
        recobra_core::config::ValidationConfig::sales_recovery_defaults().constraints()
    } else {
        config.validation.constraints()
    };

    let pipeline =
        AnalysisPipeline::with_spanish_patterns(constraints).context("failed to compile patterns")?;

    let summary_client = if args.summarize {
        let llm = config
            .llm
            .as_ref()
            .context("--summarize requires an [llm] section in the config")?;
        Some(create_summary_client(llm).context("failed to create LLM client")?)
    } else {
        None
    };

    for path in &args.transcripts {
        let loaded =
            load_transcript_jsonl(path).with_context(|| format!("failed to load {:?}", path))?;
        for warning in &loaded.warnings {
            tracing::warn!(file = %path.display(), "{}", warning);
        }

        if loaded.transcript.is_empty() {
            eprintln!("{}: empty transcript, skipping", path.display());
            continue;
        }

        let outcome = match &summary_client {
            Some(client) => pipeline
                .analyze_with_summary(&cache, &loaded.transcript, client.as_ref())
                .with_context(|| format!("failed to analyze {:?}", path))?,
            None => pipeline
                .analyze(&cache, &loaded.transcript)
                .with_context(|| format!("failed to analyze {:?}", path))?,
        };

        match args.format.as_str() {
            "json" => {
                let mut record = outcome.payload.clone();
                if let Some(map) = record.as_object_mut() {
                    map.insert("digest".to_string(), outcome.digest.clone().into());
                    map.insert("from_cache".to_string(), outcome.from_cache.into());
                }
                println!("{}", serde_json::to_string(&record)?);
            }
            _ => {
                println!("{}", path.display());
                println!("  digest:         {}", outcome.digest);
                println!(
                    "  handoff:        {}{}",
                    outcome.result.handoff,
                    if outcome.from_cache { " (cached)" } else { "" }
                );
                println!("  human transfer: {}", outcome.result.human_transfer);
                println!("  template sent:  {}", outcome.result.template_sent);
                println!("  pre-validation: {}", outcome.result.pre_validation);
                if let Some(action) = outcome.payload.get("next_action").and_then(|v| v.as_str()) {
                    println!("  next action:    {}", action);
                }
                if let Some(summary) = outcome.payload.get("summary").and_then(|v| v.as_str()) {
                    println!("  summary:        {}", summary);
                }
                for repair in &outcome.repairs {
                    println!(
                        "  repaired:       {} ({})",
                        repair.field_name,
                        repair.action.as_str()
                    );
                }
                println!();
            }
        }
    }

    Ok(())
}
