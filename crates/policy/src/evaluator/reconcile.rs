//! Per-resource reconciliation of skip directives and severity overrides.

use tracing::warn;

use iacguard_core::{ResourceConfig, Severity, SeverityCap, SkipRule};

use crate::descriptor::RuleDescriptor;

/// What to do with one rule match on one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// The resource carries a skip directive for the rule.
    Skipped { comment: String },
    /// The resource caps severity at `none`.
    Muted,
    /// A real violation at the resolved severity.
    Active(Severity),
}

/// Decide the fate of a match of `rule` (registered under `key`) on `resource`.
pub fn reconcile(rule: &RuleDescriptor, key: &str, resource: &ResourceConfig) -> Disposition {
    if let Some(skip) = find_skip_rule(rule, key, resource) {
        return Disposition::Skipped {
            comment: skip.comment.clone(),
        };
    }
    match resolve_severity(rule.severity, resource) {
        Some(severity) => Disposition::Active(severity),
        None => Disposition::Muted,
    }
}

/// Skip directive on `resource` naming `rule`.
///
/// Directives are matched case-insensitively against the rule's canonical
/// id first, then against its map key.
pub fn find_skip_rule<'a>(
    rule: &RuleDescriptor,
    key: &str,
    resource: &'a ResourceConfig,
) -> Option<&'a SkipRule> {
    if resource.skip_rules.is_empty() {
        return None;
    }

    if !rule.id.is_empty() {
        if let Some(skip) = resource
            .skip_rules
            .iter()
            .find(|s| s.rule.eq_ignore_ascii_case(&rule.id))
        {
            return Some(skip);
        }
    }

    let legacy = resource
        .skip_rules
        .iter()
        .find(|s| s.rule.eq_ignore_ascii_case(key));
    if let Some(skip) = legacy {
        warn!(
            rule = %key,
            resource = %resource.id,
            "skip rule matched by reference id; this is deprecated, use the rule id instead"
        );
    }
    legacy
}

/// Effective severity of a match on `resource`; `None` when muted.
///
/// A minimum floor at or above the rule severity escalates to the floor;
/// otherwise a maximum ceiling below it clamps down.
pub fn resolve_severity(severity: Severity, resource: &ResourceConfig) -> Option<Severity> {
    let ceiling = match resource.max_severity {
        Some(SeverityCap::Mute) => return None,
        Some(SeverityCap::Level(max)) => Some(max),
        None => None,
    };

    if let Some(floor) = resource.min_severity {
        if severity <= floor {
            return Some(floor);
        }
    }
    match ceiling {
        Some(max) if severity > max => Some(max),
        _ => Some(severity),
    }
}
