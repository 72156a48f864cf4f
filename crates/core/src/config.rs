use std::env;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::severity::Severity;

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

/// Comma-separated list; blank entries are dropped.
fn profiled_env_list(profile: &str, key: &str) -> Vec<String> {
    profiled_env_opt(profile, key)
        .map(|v| split_list(&v))
        .unwrap_or_default()
}

pub fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Default query namespace every rule module is expected to live under.
pub const DEFAULT_QUERY_BASE: &str = "data.iacguard";

/// All policy categories a rule may declare.
pub const ACCEPTED_CATEGORIES: &[&str] = &[
    "LOGGING AND MONITORING",
    "COMPLIANCE VALIDATION",
    "RESILIENCE",
    "SECURITY BEST PRACTICES",
    "INFRASTRUCTURE SECURITY",
    "IDENTITY AND ACCESS MANAGEMENT",
    "CONFIGURATION AND VULNERABILITY ANALYSIS",
    "DATA PROTECTION",
];

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub policy: PolicyConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `IACGUARD_PROFILE`. When set (e.g. `CI`), every key
    /// is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("IACGUARD_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        Self {
            policy: PolicyConfig::from_env_profiled(&p),
            profile: p,
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        let p = &self.policy;
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  policy:      base_path={}", p.base_path.display());
        tracing::info!(
            "  policy:      repo_path={}",
            p.repo_path.as_deref().map(|r| r.display().to_string()).unwrap_or_else(|| "(base)".into())
        );
        tracing::info!("  filters:     scan_rules={:?} skip_rules={:?}", p.scan_rules, p.skip_rules);
        tracing::info!("  filters:     categories={:?} policy_types={:?}", p.categories, p.policy_types);
        tracing::info!("  filters:     severity={}", p.severity.as_deref().unwrap_or("(any)"));
        tracing::info!("  backend:     query_base={}", p.query_base);
    }
}

// ── Policy ────────────────────────────────────────────────────

/// Where rules live and which of them take part in a run.
///
/// Every list is optional; an empty list leaves that dimension unconstrained.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    pub base_path: PathBuf,
    /// Sub-tree of `base_path` to load; `None` loads the whole base path.
    pub repo_path: Option<PathBuf>,
    pub scan_rules: Vec<String>,
    pub skip_rules: Vec<String>,
    pub categories: Vec<String>,
    pub policy_types: Vec<String>,
    /// Minimum rule severity, kept raw until [`PolicyConfig::min_severity`] parses it.
    pub severity: Option<String>,
    pub query_base: String,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            base_path: PathBuf::from("policies"),
            repo_path: None,
            scan_rules: Vec::new(),
            skip_rules: Vec::new(),
            categories: Vec::new(),
            policy_types: Vec::new(),
            severity: None,
            query_base: DEFAULT_QUERY_BASE.to_string(),
        }
    }
}

impl PolicyConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            base_path: PathBuf::from(profiled_env_or(p, "IACGUARD_POLICY_BASE_PATH", "policies")),
            repo_path: profiled_env_opt(p, "IACGUARD_POLICY_REPO_PATH").map(PathBuf::from),
            scan_rules: profiled_env_list(p, "IACGUARD_SCAN_RULES"),
            skip_rules: profiled_env_list(p, "IACGUARD_SKIP_RULES"),
            categories: profiled_env_list(p, "IACGUARD_CATEGORIES"),
            policy_types: profiled_env_list(p, "IACGUARD_POLICY_TYPES"),
            severity: profiled_env_opt(p, "IACGUARD_SEVERITY"),
            query_base: profiled_env_or(p, "IACGUARD_QUERY_BASE", DEFAULT_QUERY_BASE),
        }
    }

    /// Parse the configured minimum severity. Blank means unconstrained.
    pub fn min_severity(&self) -> Result<Option<Severity>, CoreError> {
        match self.severity.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some),
        }
    }

    /// Reject categories outside [`ACCEPTED_CATEGORIES`].
    pub fn validate_categories(&self) -> Result<(), CoreError> {
        let invalid: Vec<String> = self
            .categories
            .iter()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !ACCEPTED_CATEGORIES.contains(&c.as_str()))
            .collect();
        if invalid.is_empty() {
            Ok(())
        } else {
            Err(CoreError::InvalidCategories(invalid))
        }
    }

    /// Absolute base path and the absolute directory rules are loaded from.
    ///
    /// A repo path that already lies under the base path is used as-is;
    /// anything else is joined onto the base path.
    pub fn resolve_paths(&self) -> Result<(PathBuf, PathBuf), CoreError> {
        let base = absolute(&self.base_path)?;
        let repo = match &self.repo_path {
            None => base.clone(),
            Some(repo) => {
                let abs_repo = absolute(repo)?;
                if abs_repo.starts_with(&base) {
                    abs_repo
                } else {
                    tracing::debug!(
                        repo = %repo.display(),
                        base = %base.display(),
                        "repo path is outside the base path, joining onto base"
                    );
                    base.join(repo)
                }
            }
        };
        Ok((base, repo))
    }
}

fn absolute(path: &Path) -> Result<PathBuf, CoreError> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    let cwd = env::current_dir()?;
    Ok(cwd.join(path))
}
