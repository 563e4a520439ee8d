//! CLI for importing moderation rules
//!
//! Upserts rules by word from a CSV or JSON file and/or the built-in default
//! list, then prints a JSON summary of created/updated/error counts.
//!
//! CSV (default) needs a header row; only `word` is required:
//!   word,category,severity,match_type,pattern
//!   代写,advertisement,2,contains,
//! JSON is an array of rule objects with the same fields.
//!
//! File imports leave the active flag of existing rules alone. `--seed`
//! re-enables the built-in rules.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use campus_core::domains::moderation::defaults::default_rules;
use campus_core::domains::moderation::models::{RuleInput, UpsertMode};
use campus_core::domains::moderation::{
    parse_rule_file, ImportSummary, ParsedRules, RuleAdmin, RuleCache, RuleFileFormat,
};
use campus_core::kernel::PgRuleStore;
use campus_core::Config;
use clap::{Parser, ValueEnum};
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "import_rules")]
#[command(about = "Import moderation rules into the rule store")]
struct Cli {
    /// Rule file to import
    #[arg(long)]
    file: Option<PathBuf>,

    /// Format of --file
    #[arg(long, value_enum, default_value_t = Format::Csv)]
    format: Format,

    /// Also import the built-in default rule list
    #[arg(long)]
    seed: bool,

    /// Parse and validate only; do not touch the database
    #[arg(long)]
    dry_run: bool,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Csv,
    Json,
}

impl From<Format> for RuleFileFormat {
    fn from(format: Format) -> Self {
        match format {
            Format::Csv => RuleFileFormat::Csv,
            Format::Json => RuleFileFormat::Json,
        }
    }
}

fn read_rules(cli: &Cli) -> Result<ParsedRules> {
    let Some(path) = &cli.file else {
        return Ok(ParsedRules::default());
    };
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_rule_file(cli.format.into(), &raw)
        .with_context(|| format!("Invalid rule file {}", path.display()))
}

/// Validation errors for a dry run, one per rejected rule
fn dry_run_errors(inputs: &[RuleInput]) -> Vec<String> {
    inputs
        .iter()
        .filter_map(|input| {
            input
                .clone()
                .normalized()
                .validate()
                .err()
                .map(|e| format!("{}: {}", input.word, e))
        })
        .collect()
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,campus_core=info,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    if cli.file.is_none() && !cli.seed {
        bail!("Nothing to import: pass --file and/or --seed");
    }

    let seed = if cli.seed { default_rules() } else { Vec::new() };
    let from_file = read_rules(&cli)?;

    if cli.dry_run {
        let mut errors = from_file.errors;
        errors.extend(dry_run_errors(&seed));
        errors.extend(dry_run_errors(&from_file.rules));
        let summary = ImportSummary {
            errors,
            ..Default::default()
        };
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = PgPool::connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;

    let store = Arc::new(PgRuleStore::new(pool));
    let cache = Arc::new(RuleCache::new(store.clone(), config.rule_cache_ttl));
    let admin = RuleAdmin::new(store, cache);

    let total = seed.len() + from_file.rules.len() + from_file.errors.len();
    let mut summary = ImportSummary {
        errors: from_file.errors,
        ..Default::default()
    };
    if !seed.is_empty() {
        let seeded = admin
            .import_rules(seed, UpsertMode::ResetActive)
            .await
            .context("Seeding default rules failed")?;
        summary.merge(seeded);
    }
    if cli.file.is_some() {
        let imported = admin
            .import_rules(from_file.rules, UpsertMode::PreserveActive)
            .await
            .context("Rule import failed")?;
        summary.merge(imported);
    }

    tracing::info!(
        total,
        created = summary.created,
        updated = summary.updated,
        errors = summary.errors.len(),
        "Import finished"
    );
    println!("{}", serde_json::to_string_pretty(&summary)?);

    Ok(())
}
