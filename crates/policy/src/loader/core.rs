//! Core [`RuleLoader`]: directory walk, metadata parsing, filtering and body rendering.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::descriptor::{RuleDescriptor, METADATA_FILE_SUFFIX};
use crate::filters::PreLoadFilter;
use crate::template::RuleRenderer;

use super::error::{LoadError, LoadResult, LoadStatus, RejectReason};

/// A rule admitted into the active set, with its rendered body.
#[derive(Debug, Clone)]
pub struct LoadedRule {
    pub descriptor: RuleDescriptor,
    /// Body after template rendering; what the backend compiles.
    pub body: String,
    /// Canonical path of the body file the rule was rendered from.
    pub body_path: PathBuf,
}

impl AsRef<RuleDescriptor> for LoadedRule {
    fn as_ref(&self) -> &RuleDescriptor {
        &self.descriptor
    }
}

/// Counters gathered during one load.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LoadStats {
    /// Candidate metadata files found.
    pub metadata_files: usize,
    /// Descriptors that parsed and passed filtering and name checks.
    pub descriptors: usize,
    /// Distinct body files read.
    pub body_files: usize,
    /// Registrations performed, collisions included.
    pub registered: usize,
    /// Rules in the final active set.
    pub rule_count: usize,
}

/// Result of loading a policy tree.
#[derive(Debug, Default)]
pub struct RuleSet {
    /// Active rules keyed by reference id.
    pub rules: BTreeMap<String, LoadedRule>,
    pub stats: LoadStats,
    /// One entry per metadata file, in processing order.
    pub results: Vec<LoadResult>,
}

/// Metadata parsed from one directory, before filtering.
struct DirectoryScan {
    dir: PathBuf,
    files: Vec<(PathBuf, Result<RuleDescriptor, String>)>,
}

/// Loads rule metadata and bodies from a policy tree.
pub struct RuleLoader {
    renderer: RuleRenderer,
}

impl RuleLoader {
    pub fn new() -> Self {
        Self {
            renderer: RuleRenderer::new(),
        }
    }

    /// Load every admitted rule under `root` (root included).
    ///
    /// Directories are processed in sorted path order, so when two rules
    /// share a reference id the one in the later directory wins.
    pub fn load(&self, root: &Path, filter: &PreLoadFilter) -> Result<RuleSet, LoadError> {
        let dirs = find_directories(root)?;
        if dirs.is_empty() {
            return Err(LoadError::NoDirectories(root.to_path_buf()));
        }

        // Parsing is independent per directory; registration below is not.
        let scans: Vec<DirectoryScan> = dirs.par_iter().filter_map(|d| scan_directory(d)).collect();

        let mut set = RuleSet::default();
        let mut bodies: HashMap<PathBuf, Arc<Vec<u8>>> = HashMap::new();

        for scan in scans {
            for (path, parsed) in scan.files {
                set.stats.metadata_files += 1;
                let status = self.admit(&scan.dir, parsed, filter, &mut bodies, &mut set);
                set.results.push(LoadResult { path, status });
            }
        }

        set.stats.body_files = bodies.len();
        set.stats.rule_count = set.rules.len();
        info!(
            rules = set.stats.rule_count,
            bodies = set.stats.body_files,
            metadata_files = set.stats.metadata_files,
            path = %root.display(),
            "loaded policy rules"
        );
        Ok(set)
    }

    /// Filter, render and register one parsed descriptor.
    fn admit(
        &self,
        dir: &Path,
        parsed: Result<RuleDescriptor, String>,
        filter: &PreLoadFilter,
        bodies: &mut HashMap<PathBuf, Arc<Vec<u8>>>,
        set: &mut RuleSet,
    ) -> LoadStatus {
        let mut descriptor = match parsed {
            Ok(d) => d,
            Err(error) => return LoadStatus::Failed { error },
        };

        if !filter.is_allowed(&descriptor) {
            return rejected(&descriptor, RejectReason::NotAllowed);
        }
        if filter.is_filtered(&descriptor) {
            return rejected(&descriptor, RejectReason::SkipRule);
        }
        if descriptor.has_reserved_name() {
            warn!(name = %descriptor.name, "rule name must not contain a dot character");
            return rejected(&descriptor, RejectReason::ReservedName);
        }

        descriptor.inject_reserved_args();
        set.stats.descriptors += 1;

        // Cache key is the canonical path, so `../shared/x.rego` from two
        // directories hits the same entry.
        let body_path = match fs::canonicalize(dir.join(&descriptor.file)) {
            Ok(path) => path,
            Err(e) => {
                let missing = dir.join(&descriptor.file);
                warn!(file = %missing.display(), error = %e, "failed to load rule body");
                return LoadStatus::Failed {
                    error: format!("failed to read {}: {}", missing.display(), e),
                };
            }
        };
        let raw = match bodies.get(&body_path) {
            Some(raw) => {
                debug!(file = %body_path.display(), "rule body already loaded");
                Arc::clone(raw)
            }
            None => match fs::read(&body_path) {
                Ok(bytes) => {
                    let raw = Arc::new(bytes);
                    bodies.insert(body_path.clone(), Arc::clone(&raw));
                    raw
                }
                Err(e) => {
                    warn!(file = %body_path.display(), error = %e, "failed to load rule body");
                    return LoadStatus::Failed {
                        error: format!("failed to read {}: {}", body_path.display(), e),
                    };
                }
            },
        };

        let body = match self.renderer.render(&raw, &descriptor.template_args) {
            Ok(body) => body,
            Err(e) => {
                warn!(rule = %descriptor.reference_id, file = %descriptor.file, error = %e, "unable to render rule body");
                return LoadStatus::Failed {
                    error: e.to_string(),
                };
            }
        };
        if body.trim().is_empty() {
            debug!(rule = %descriptor.reference_id, file = %descriptor.file, "rule body empty after rendering");
            return rejected(&descriptor, RejectReason::EmptyBody);
        }

        let reference_id = descriptor.reference_id.clone();
        let previous = set.rules.insert(
            reference_id.clone(),
            LoadedRule {
                descriptor,
                body,
                body_path,
            },
        );
        if let Some(prev) = previous {
            warn!(
                rule = %reference_id,
                replaced = %prev.body_path.display(),
                "duplicate reference id, keeping the later rule"
            );
        }
        set.stats.registered += 1;
        LoadStatus::Registered { reference_id }
    }
}

impl Default for RuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn rejected(descriptor: &RuleDescriptor, reason: RejectReason) -> LoadStatus {
    debug!(rule = %descriptor.reference_id, %reason, "rule not loaded");
    LoadStatus::Rejected { reason }
}

/// Every directory under `root`, root included, sorted by path.
///
/// Symlinks are not followed. Only an error on the root itself is fatal;
/// unreadable entries further down are logged and skipped.
fn find_directories(root: &Path) -> Result<Vec<PathBuf>, LoadError> {
    let mut dirs = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(source) if source.depth() == 0 => {
                return Err(LoadError::Walk {
                    path: root.to_path_buf(),
                    source,
                })
            }
            Err(e) => {
                warn!(path = %root.display(), error = %e, "skipping unreadable policy path entry");
                continue;
            }
        };
        if entry.file_type().is_dir() {
            dirs.push(entry.into_path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Parse every metadata file in `dir`. `None` when the directory has none.
fn scan_directory(dir: &Path) -> Option<DirectoryScan> {
    let entries = match fs::read_dir(dir) {
        Ok(e) => e,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "failed to read directory");
            return None;
        }
    };

    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && is_metadata_file(p))
        .collect();
    if candidates.is_empty() {
        debug!(dir = %dir.display(), "no metadata files found");
        return None;
    }
    candidates.sort();

    let files = candidates
        .into_iter()
        .map(|path| {
            let parsed = fs::read(&path)
                .map_err(|e| e.to_string())
                .and_then(|raw| RuleDescriptor::from_json(&raw).map_err(|e| e.to_string()));
            if let Err(e) = &parsed {
                warn!(file = %path.display(), error = %e, "failed to load rule metadata");
            }
            (path, parsed)
        })
        .collect();

    Some(DirectoryScan {
        dir: dir.to_path_buf(),
        files,
    })
}

/// `*.json`, dotfiles excluded.
fn is_metadata_file(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .map(|n| !n.starts_with('.') && n.ends_with(METADATA_FILE_SUFFIX))
        .unwrap_or(false)
}
