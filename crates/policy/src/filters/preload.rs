//! Decides which rules enter the active set while the repository is loaded.

use iacguard_core::{CoreError, PolicyConfig, Severity};

use super::{AllOf, CategorySpec, FilterSpec, PolicyTypeSpec, ReferenceIdsSpec, SeveritySpec};
use crate::descriptor::RuleDescriptor;

/// Scan/skip rule, category, severity and policy-type selection applied to
/// every descriptor before its body is rendered.
pub struct PreLoadFilter {
    allowed: AllOf,
    skipped: ReferenceIdsSpec,
}

impl PreLoadFilter {
    pub fn new(
        scan_rules: &[String],
        skip_rules: &[String],
        categories: &[String],
        policy_types: &[String],
        severity: Option<Severity>,
    ) -> Self {
        Self {
            allowed: AllOf::new(vec![
                Box::new(ReferenceIdsSpec::new(scan_rules)),
                Box::new(CategorySpec::new(categories)),
                Box::new(SeveritySpec::new(severity)),
                Box::new(PolicyTypeSpec::new(policy_types)),
            ]),
            skipped: ReferenceIdsSpec::new(skip_rules),
        }
    }

    /// Build from configuration, rejecting an unknown minimum severity.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, CoreError> {
        Ok(Self::new(
            &config.scan_rules,
            &config.skip_rules,
            &config.categories,
            &config.policy_types,
            config.min_severity()?,
        ))
    }

    /// Filter that admits every rule.
    pub fn permissive() -> Self {
        Self::new(&[], &[], &[], &[], None)
    }

    /// Rule passes scan-rule, category, severity and policy-type selection.
    pub fn is_allowed(&self, rule: &RuleDescriptor) -> bool {
        self.allowed.is_satisfied(rule)
    }

    /// Rule is named by a skip rule. Never true when no skip rules are configured.
    pub fn is_filtered(&self, rule: &RuleDescriptor) -> bool {
        !self.skipped.is_empty() && self.skipped.is_satisfied(rule)
    }

    /// Allowed and not filtered.
    pub fn admits(&self, rule: &RuleDescriptor) -> bool {
        self.is_allowed(rule) && !self.is_filtered(rule)
    }
}
