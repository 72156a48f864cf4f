//! Error types and per-file load results for the rule loader.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Fatal loader errors. Anything else is recorded per file and skipped.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The policy path contains no directories at all.
    #[error("no directories found for path {}", .0.display())]
    NoDirectories(PathBuf),

    /// The directory walk itself failed (missing root, permissions, loops).
    #[error("failed to walk policy path {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Outcome of loading a single metadata file.
#[derive(Debug, Serialize)]
pub struct LoadResult {
    /// Path to the metadata file.
    pub path: PathBuf,
    /// Status of the load attempt.
    #[serde(flatten)]
    pub status: LoadStatus,
}

/// Status of a single metadata file.
#[derive(Debug, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadStatus {
    /// Rule was rendered and registered under `reference_id`.
    Registered { reference_id: String },
    /// Rule was parsed but deliberately left out.
    Rejected { reason: RejectReason },
    /// Metadata, body or template could not be processed.
    Failed { error: String },
}

/// Why a parsed rule was left out of the active set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    /// Failed scan-rule, category, severity or policy-type selection.
    NotAllowed,
    /// Named by a configured skip rule.
    SkipRule,
    /// Rule name contains `.`.
    ReservedName,
    /// Body rendered to nothing.
    EmptyBody,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectReason::NotAllowed => write!(f, "not selected by filters"),
            RejectReason::SkipRule => write!(f, "excluded by skip rule"),
            RejectReason::ReservedName => write!(f, "rule name must not contain a dot"),
            RejectReason::EmptyBody => write!(f, "rendered rule body is empty"),
        }
    }
}
