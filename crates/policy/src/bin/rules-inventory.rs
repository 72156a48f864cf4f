//! rules-inventory: list the rules a policy tree would admit.
//!
//! Runs the loader and pre-load filters exactly as engine initialization
//! does, without compiling anything, and prints the active rule set.
//! Configuration comes from the environment (`IACGUARD_*`, `.env`), with
//! command-line flags taking precedence.

use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;
use tracing::{error, info};

use iacguard_core::config::{load_dotenv, split_list};
use iacguard_core::Config;
use iacguard_policy::filters::PreLoadFilter;
use iacguard_policy::loader::{LoadResult, LoadStats, LoadStatus, RuleLoader, RuleSet};
use iacguard_policy::RuleDescriptor;

// ── CLI ─────────────────────────────────────────────────────────────

/// Policy tree inventory.
#[derive(Parser, Debug)]
#[command(name = "rules-inventory", version, about)]
struct Cli {
    /// Configuration profile; keys are looked up as `{PROFILE}_{KEY}` first.
    #[arg(long, env = "IACGUARD_PROFILE")]
    profile: Option<String>,

    /// Policy base path.
    #[arg(long)]
    base_path: Option<String>,

    /// Sub-tree of the base path to load.
    #[arg(long)]
    repo_path: Option<String>,

    /// Comma-separated rule ids to restrict loading to.
    #[arg(long)]
    scan_rules: Option<String>,

    /// Comma-separated rule ids to exclude.
    #[arg(long)]
    skip_rules: Option<String>,

    /// Comma-separated categories.
    #[arg(long)]
    categories: Option<String>,

    /// Comma-separated policy types (`all` matches every type).
    #[arg(long)]
    policy_types: Option<String>,

    /// Minimum rule severity (low, medium, high).
    #[arg(long)]
    severity: Option<String>,

    /// Print the inventory as JSON.
    #[arg(long)]
    json: bool,

    /// Also report files that were rejected or failed to load.
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> (Config, bool, bool) {
        let mut config = match &self.profile {
            Some(profile) => Config::for_profile(profile),
            None => Config::from_env(),
        };
        let policy = &mut config.policy;
        if let Some(path) = self.base_path {
            policy.base_path = path.into();
        }
        if let Some(path) = self.repo_path {
            policy.repo_path = Some(path.into());
        }
        if let Some(raw) = self.scan_rules {
            policy.scan_rules = split_list(&raw);
        }
        if let Some(raw) = self.skip_rules {
            policy.skip_rules = split_list(&raw);
        }
        if let Some(raw) = self.categories {
            policy.categories = split_list(&raw);
        }
        if let Some(raw) = self.policy_types {
            policy.policy_types = split_list(&raw);
        }
        if self.severity.is_some() {
            policy.severity = self.severity;
        }
        (config, self.json, self.verbose)
    }
}

// ── Output ──────────────────────────────────────────────────────────

#[derive(Serialize)]
struct Inventory<'a> {
    rules: Vec<&'a RuleDescriptor>,
    stats: &'a LoadStats,
    /// Every metadata file's outcome; only with `--verbose`.
    #[serde(skip_serializing_if = "Option::is_none")]
    results: Option<&'a [LoadResult]>,
}

impl<'a> Inventory<'a> {
    fn new(set: &'a RuleSet, verbose: bool) -> Self {
        Self {
            rules: set.rules.values().map(|r| &r.descriptor).collect(),
            stats: &set.stats,
            results: verbose.then_some(set.results.as_slice()),
        }
    }
}

fn print_table(set: &RuleSet, verbose: bool) {
    for rule in set.rules.values() {
        let d = &rule.descriptor;
        println!(
            "{:<28} {:<20} {:<7} {:<28} {}",
            d.reference_id, d.id, d.severity, d.category, d.name
        );
    }

    if verbose {
        for result in &set.results {
            match &result.status {
                LoadStatus::Registered { .. } => {}
                LoadStatus::Rejected { reason } => {
                    println!("rejected  {}  ({})", result.path.display(), reason)
                }
                LoadStatus::Failed { error } => {
                    println!("failed    {}  ({})", result.path.display(), error)
                }
            }
        }
    }

    let s = &set.stats;
    println!(
        "\n{} rules from {} metadata files ({} admitted, {} body files)",
        s.rule_count, s.metadata_files, s.descriptors, s.body_files
    );
}

// ── main ────────────────────────────────────────────────────────────

fn run(cli: Cli) -> anyhow::Result<()> {
    let (config, json, verbose) = cli.into_config();
    config.log_summary();

    let policy = &config.policy;
    let (_, root) = policy.resolve_paths()?;
    policy.validate_categories()?;
    let filter = PreLoadFilter::from_config(policy)?;

    let set = RuleLoader::new().load(&root, &filter)?;
    info!(rules = set.stats.rule_count, path = %root.display(), "inventory complete");

    if json {
        println!("{}", serde_json::to_string_pretty(&Inventory::new(&set, verbose))?);
    } else {
        print_table(&set, verbose);
    }
    Ok(())
}

fn main() -> ExitCode {
    load_dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "rules inventory failed");
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}
