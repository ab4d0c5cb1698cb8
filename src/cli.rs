//! CLI interface for arrow-patterns

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{self, Config};
use crate::learning::{ContentPatternLearner, ExtractionMethod, LearnOutcome, SkipReason};

#[derive(Parser)]
#[command(name = "arrow-patterns")]
#[command(about = "Inspect and maintain learned content-extraction patterns", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to the platform config directory)
    #[arg(long, env = "ARROW_PATTERNS_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Pattern file, overriding `patterns.store_path`
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show pattern statistics
    Stats {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// List learned patterns
    List {
        /// Only patterns for this domain
        #[arg(short, long)]
        domain: Option<String>,
        /// Only patterns for this manufacturer
        #[arg(short, long)]
        manufacturer: Option<String>,
    },
    /// Find the learned window for a saved page
    Match {
        /// URL the page was fetched from
        #[arg(long)]
        url: String,
        #[arg(short, long)]
        manufacturer: String,
        /// Page text (markdown or plain text)
        file: PathBuf,
        /// Print the selected text
        #[arg(long)]
        print: bool,
    },
    /// Learn from a saved page as if extraction had succeeded
    Learn {
        #[arg(long)]
        url: String,
        #[arg(short, long)]
        manufacturer: String,
        /// Tier that extracted the data (text, vision, knowledge)
        #[arg(long, default_value = "text")]
        method: ExtractionMethod,
        /// Page text (markdown or plain text)
        file: PathBuf,
    },
    /// Remove old patterns that were rarely reused
    Cleanup {
        /// Age threshold in days
        #[arg(long)]
        days: Option<i64>,
        /// Patterns with at least this many reuses are kept
        #[arg(long)]
        min_success: Option<u32>,
    },
    /// Show the effective configuration
    Config,
}

/// Run the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Some(store) = cli.store {
        config.patterns.store_path = store;
    }

    match cli.command {
        Commands::Stats { json } => {
            let learner = ContentPatternLearner::open(config.patterns);
            let stats = learner.stats();
            if json {
                println!("{}", serde_json::to_string_pretty(&stats)?);
                return Ok(());
            }
            println!("Content Pattern Statistics");
            println!("==========================");
            println!("Patterns: {}", stats.total_patterns);
            println!("Average confidence: {:.2}", stats.average_confidence);
            println!();
            if !stats.by_domain.is_empty() {
                println!("By domain:");
                for (domain, count) in &stats.by_domain {
                    println!("  {:<40} {}", domain, count);
                }
                println!();
                println!("By extraction method:");
                for (method, count) in &stats.by_method {
                    println!("  {:<40} {}", method, count);
                }
                println!();
                println!("Most used:");
                for usage in &stats.most_used {
                    println!(
                        "  {} {} / {} ({}) uses={} confidence={:.2}",
                        usage.id,
                        usage.domain,
                        usage.manufacturer,
                        usage.pattern_type,
                        usage.success_count,
                        usage.confidence_score
                    );
                }
                println!();
            }
            println!("Store: {}", learner.store().path().display());
        }
        Commands::List { domain, manufacturer } => {
            let learner = ContentPatternLearner::open(config.patterns);
            let mut shown = 0;
            for (id, pattern) in learner.store().iter() {
                if domain.as_deref().is_some_and(|d| !pattern.domain.eq_ignore_ascii_case(d)) {
                    continue;
                }
                if manufacturer
                    .as_deref()
                    .is_some_and(|m| !pattern.manufacturer.eq_ignore_ascii_case(m))
                {
                    continue;
                }
                println!(
                    "{} {:<30} {:<20} {:<20} [{}, {}] {} uses={} confidence={:.2} last_used={}",
                    id,
                    pattern.domain,
                    pattern.manufacturer,
                    pattern.pattern_type,
                    pattern.content_slice.start(),
                    pattern.content_slice.end(),
                    pattern.extraction_method,
                    pattern.success_count,
                    pattern.confidence_score,
                    pattern.last_used.format("%Y-%m-%d %H:%M UTC")
                );
                shown += 1;
            }
            if shown == 0 {
                println!("No patterns found.");
            }
        }
        Commands::Match { url, manufacturer, file, print } => {
            let content = read_page(&file)?;
            let learner = ContentPatternLearner::open(config.patterns);
            match learner.find_matching_pattern(&url, &content, &manufacturer) {
                Some(slice) => {
                    println!(
                        "Pattern {} ({}) selects bytes {}..{} ({} of {})",
                        slice.pattern_id,
                        slice.pattern_type,
                        slice.start,
                        slice.end,
                        slice.len(),
                        content.len()
                    );
                    if print {
                        if let Some(window) = slice.apply(&content) {
                            println!();
                            println!("{}", window);
                        }
                    }
                }
                None => println!("No pattern applies; the full page would be used."),
            }
        }
        Commands::Learn { url, manufacturer, method, file } => {
            let content = read_page(&file)?;
            let mut learner = ContentPatternLearner::open(config.patterns);
            let assumed_success = [()];
            let outcome =
                learner.learn_successful_pattern(&url, &content, &manufacturer, &assumed_success, method);
            match &outcome {
                LearnOutcome::Created { id, pattern_type } => {
                    println!("Created {} pattern {}", pattern_type, id)
                }
                LearnOutcome::Reinforced { id, pattern_type, confidence } => {
                    println!("Reinforced {} pattern {} (confidence {:.2})", pattern_type, id, confidence)
                }
                LearnOutcome::Skipped(SkipReason::InvalidUrl) => println!("Nothing learned: URL has no host"),
                LearnOutcome::Skipped(SkipReason::NoHeuristic) => {
                    println!("Nothing learned: no known spec layout found in page")
                }
                LearnOutcome::Skipped(SkipReason::NoData) => println!("Nothing learned"),
            }
            if outcome.pattern_id().is_some() {
                learner.save().context("Failed to save patterns")?;
            }
        }
        Commands::Cleanup { days, min_success } => {
            let days = days.unwrap_or(config.patterns.prune_max_age_days);
            if let Some(min_success) = min_success {
                config.patterns.prune_min_success = min_success;
            }
            let mut learner = ContentPatternLearner::open(config.patterns);
            let removed = learner.cleanup_old_patterns(days);
            println!("Removed {} patterns unused for more than {} days", removed.len(), days);
            for id in &removed {
                println!("  {}", id);
            }
        }
        Commands::Config => {
            match &cli.config {
                Some(path) => println!("# {}", path.display()),
                None => println!("# {}", config::config_path()?.display()),
            }
            print!("{}", config.to_toml()?);
        }
    }

    Ok(())
}

fn read_page(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).with_context(|| format!("Failed to read page {}", path.display()))
}
