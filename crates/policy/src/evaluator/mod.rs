//! Runs compiled rules against one scan input and reconciles the matches.
//!
//! Backend calls fan out per rule on the rayon pool. Their outcomes are
//! collected in reference-id order and folded into the report sequentially,
//! so the report is deterministic and counters are never shared across
//! threads.
//!
//! Per rule:
//! - backend error: the rule is dropped from `total_policies`
//! - no identifiers: the rule is recorded as passed
//! - otherwise every identifier is resolved to resources and each match is
//!   skipped, muted or counted (see [`reconcile`])

mod identifier;
mod reconcile;

pub use identifier::{IdentifierError, ViolationIdentifier, ID_KEY};
pub use reconcile::{find_skip_rule, reconcile, resolve_severity, Disposition};

use std::collections::BTreeMap;
use std::time::Instant;

use chrono::Utc;
use rayon::prelude::*;
use serde_json::Value;
use tracing::{debug, error, warn};

use iacguard_core::{CoreError, ResourceGraph};

use crate::backend::PolicyBackend;
use crate::compiler::CompiledRule;
use crate::descriptor::RuleDescriptor;
use crate::filters::PreScanFilter;
use crate::report::{EngineOutput, PassedRule, ScanTarget, Summary, Violation};

enum RuleOutcome {
    Failed,
    Passed,
    Matched(Vec<Value>),
}

// ── Evaluator ───────────────────────────────────────────────────────

/// Evaluates a compiled rule set against resource graphs.
pub struct Evaluator<'a, B: PolicyBackend> {
    backend: &'a B,
    rules: &'a BTreeMap<String, CompiledRule<B::Query>>,
}

impl<'a, B: PolicyBackend> Evaluator<'a, B> {
    pub fn new(backend: &'a B, rules: &'a BTreeMap<String, CompiledRule<B::Query>>) -> Self {
        Self { backend, rules }
    }

    /// [`Evaluator::evaluate_target`] with an anonymous target.
    pub fn evaluate<G: ResourceGraph + ?Sized>(&self, graph: &G) -> Result<EngineOutput, CoreError> {
        self.evaluate_target(graph, &ScanTarget::default())
    }

    /// Evaluate every rule relevant to `graph` and build a fresh report
    /// whose summary describes `target`.
    ///
    /// Only failing to build the backend input is an error; per-rule and
    /// per-resource problems are logged and skipped.
    pub fn evaluate_target<G: ResourceGraph + ?Sized>(
        &self,
        graph: &G,
        target: &ScanTarget,
    ) -> Result<EngineOutput, CoreError> {
        let started_at = Utc::now();
        let start = Instant::now();
        let input = graph.input_document()?;

        let selected = PreScanFilter::new(&graph.resource_types()).filter(self.rules);
        let mut rule_count = selected.len();
        debug!(
            rules = rule_count,
            total = self.rules.len(),
            "rules selected for scan"
        );

        let outcomes: Vec<(&str, &CompiledRule<B::Query>, RuleOutcome)> = selected
            .into_par_iter()
            .map(|(key, compiled)| (key, compiled, self.run_rule(key, compiled, &input)))
            .collect();

        let mut output = EngineOutput {
            summary: Summary::for_scan(target, started_at),
            ..Default::default()
        };
        for (key, compiled, outcome) in outcomes {
            let rule = compiled.descriptor();
            match outcome {
                RuleOutcome::Failed => rule_count -= 1,
                RuleOutcome::Passed => output.passed_rules.push(PassedRule::from(rule)),
                RuleOutcome::Matched(identifiers) => {
                    record_matches(key, rule, &identifiers, graph, &mut output)
                }
            }
        }

        output.summary.total_policies = rule_count;
        output.summary.total_time = start.elapsed();
        debug!(
            violations = output.violations.len(),
            skipped = output.skipped_violations.len(),
            muted = output.muted_violations.len(),
            passed = output.passed_rules.len(),
            elapsed_ms = output.summary.total_time.as_millis() as u64,
            "scan evaluated"
        );
        Ok(output)
    }

    fn run_rule(&self, key: &str, compiled: &CompiledRule<B::Query>, input: &Value) -> RuleOutcome {
        match self.backend.evaluate(&compiled.query, input) {
            Ok(identifiers) if identifiers.is_empty() => {
                debug!(rule = %key, "query executed but found no violations");
                RuleOutcome::Passed
            }
            Ok(identifiers) => RuleOutcome::Matched(identifiers),
            Err(e) => {
                warn!(
                    rule = %key,
                    file = %compiled.descriptor().file,
                    error = %e,
                    "failed to run prepared query"
                );
                RuleOutcome::Failed
            }
        }
    }
}

/// Resolve each identifier and file every matched resource under the right list.
fn record_matches<G: ResourceGraph + ?Sized>(
    key: &str,
    rule: &RuleDescriptor,
    identifiers: &[Value],
    graph: &G,
    output: &mut EngineOutput,
) {
    for raw in identifiers {
        let identifier = match ViolationIdentifier::try_from(raw) {
            Ok(id) => id,
            Err(e) => {
                warn!(rule = %key, error = %e, "malformed violation identifier");
                continue;
            }
        };

        let resources = match graph.find_all_by_id(identifier.resource_id()) {
            Ok(found) => found,
            Err(e) => {
                error!(rule = %key, resource = %identifier.resource_id(), error = %e, "failed to resolve resource");
                continue;
            }
        };
        if resources.is_empty() {
            warn!(rule = %key, resource = %identifier.resource_id(), "resource was not found");
            continue;
        }

        for resource in &resources {
            match reconcile(rule, key, resource) {
                Disposition::Skipped { comment } => {
                    debug!(rule = %key, resource = %resource.id, "rule skipped for resource");
                    output
                        .skipped_violations
                        .push(Violation::new(rule, resource, rule.severity).with_comment(comment));
                }
                Disposition::Muted => {
                    debug!(rule = %key, resource = %resource.id, "violation muted by max severity");
                    output
                        .muted_violations
                        .push(Violation::new(rule, resource, rule.severity));
                }
                Disposition::Active(severity) => {
                    output.summary.record(severity);
                    output.violations.push(Violation::new(rule, resource, severity));
                }
            }
        }
    }
}
