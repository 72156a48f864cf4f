//! Scan report: violations, skips, passes and the aggregated summary.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use iacguard_core::{ResourceConfig, Severity};

use crate::descriptor::RuleDescriptor;

// ── Findings ────────────────────────────────────────────────────────

/// A rule matched against one resource.
///
/// The same shape serves active, skipped and muted findings; `comment` is
/// only set for skipped ones.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    pub rule_name: String,
    pub rule_id: String,
    pub reference_id: String,
    pub description: String,
    pub category: String,
    /// Severity after resource-level overrides.
    pub severity: Severity,
    pub rule_file: String,
    pub resource_name: String,
    pub resource_type: String,
    pub file: String,
    pub line: usize,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub resource_config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

impl Violation {
    pub fn new(rule: &RuleDescriptor, resource: &ResourceConfig, severity: Severity) -> Self {
        Self {
            rule_name: rule.name.clone(),
            rule_id: rule.id.clone(),
            reference_id: rule.reference_id.clone(),
            description: rule.description.clone(),
            category: rule.category.clone(),
            severity,
            rule_file: rule.file.clone(),
            resource_name: resource.name.clone(),
            resource_type: resource.resource_type.clone(),
            file: resource.source.clone(),
            line: resource.line,
            resource_config: resource.config.clone(),
            comment: None,
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }
}

/// A rule that matched nothing in the scan input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PassedRule {
    pub rule_name: String,
    pub rule_id: String,
    pub reference_id: String,
    pub description: String,
    pub severity: Severity,
    pub category: String,
}

impl From<&RuleDescriptor> for PassedRule {
    fn from(rule: &RuleDescriptor) -> Self {
        Self {
            rule_name: rule.name.clone(),
            rule_id: rule.id.clone(),
            reference_id: rule.reference_id.clone(),
            description: rule.description.clone(),
            severity: rule.severity,
            category: rule.category.clone(),
        }
    }
}

// ── Summary ─────────────────────────────────────────────────────────

/// What a scan was run against, copied into its [`Summary`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanTarget {
    /// Path of the scanned IaC sources.
    pub resource_path: String,
    /// IaC flavor the resource graph was translated from (`terraform`, `k8s`, ...).
    pub iac_type: String,
}

impl ScanTarget {
    pub fn new(resource_path: impl Into<String>, iac_type: impl Into<String>) -> Self {
        Self {
            resource_path: resource_path.into(),
            iac_type: iac_type.into(),
        }
    }
}

/// Aggregated counters of one or more scans.
///
/// `resource_path` and `iac_type` come from the [`ScanTarget`] the scan was
/// evaluated with and stay empty without one; `timestamp` is the scan start.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(default)]
    pub resource_path: String,
    #[serde(default)]
    pub iac_type: String,
    pub timestamp: DateTime<Utc>,
    pub total_policies: usize,
    pub violated_policies: usize,
    pub low: usize,
    pub medium: usize,
    pub high: usize,
    pub total_time: Duration,
}

impl Default for Summary {
    fn default() -> Self {
        Self {
            resource_path: String::new(),
            iac_type: String::new(),
            timestamp: Utc::now(),
            total_policies: 0,
            violated_policies: 0,
            low: 0,
            medium: 0,
            high: 0,
            total_time: Duration::ZERO,
        }
    }
}

impl Summary {
    /// Empty summary for a scan of `target` starting at `timestamp`.
    pub fn for_scan(target: &ScanTarget, timestamp: DateTime<Utc>) -> Self {
        Self {
            resource_path: target.resource_path.clone(),
            iac_type: target.iac_type.clone(),
            timestamp,
            ..Default::default()
        }
    }

    /// Count one active violation at `severity`.
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::Low => self.low += 1,
            Severity::Medium => self.medium += 1,
            Severity::High => self.high += 1,
        }
        self.violated_policies += 1;
    }

    /// Field-wise merge. Counters and time add up; descriptive fields keep
    /// the first non-empty value and the earlier timestamp.
    pub fn merge(&mut self, other: &Summary) {
        if self.resource_path.is_empty() {
            self.resource_path = other.resource_path.clone();
        }
        if self.iac_type.is_empty() {
            self.iac_type = other.iac_type.clone();
        }
        self.timestamp = self.timestamp.min(other.timestamp);
        self.total_policies += other.total_policies;
        self.violated_policies += other.violated_policies;
        self.low += other.low;
        self.medium += other.medium;
        self.high += other.high;
        self.total_time += other.total_time;
    }
}

// ── Engine output ───────────────────────────────────────────────────

/// Everything one evaluation produced.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineOutput {
    pub violations: Vec<Violation>,
    pub skipped_violations: Vec<Violation>,
    /// Matches on resources whose max severity is `none`. Never counted.
    pub muted_violations: Vec<Violation>,
    pub passed_rules: Vec<PassedRule>,
    pub summary: Summary,
}

impl EngineOutput {
    /// Append `other` to this output and merge the summaries.
    pub fn merge(&mut self, other: EngineOutput) {
        self.violations.extend(other.violations);
        self.skipped_violations.extend(other.skipped_violations);
        self.muted_violations.extend(other.muted_violations);
        self.passed_rules.extend(other.passed_rules);
        self.summary.merge(&other.summary);
    }
}
