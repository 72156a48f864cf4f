//! Narrows the active rule set to the resource types present in one scan input.

use std::collections::BTreeMap;

use super::{FilterSpec, ResourceTypeSpec};
use crate::descriptor::RuleDescriptor;

/// Keeps the rules whose resource type occurs in the scan input.
pub struct PreScanFilter {
    specs: Vec<ResourceTypeSpec>,
}

impl PreScanFilter {
    pub fn new(resource_types: &[String]) -> Self {
        Self {
            specs: resource_types.iter().map(ResourceTypeSpec::new).collect(),
        }
    }

    /// Rule applies to at least one input type. With no declared types every rule applies.
    pub fn is_relevant(&self, rule: &RuleDescriptor) -> bool {
        self.specs.is_empty() || self.specs.iter().any(|s| s.is_satisfied(rule))
    }

    /// Relevant entries of `rules`, in key order.
    pub fn filter<'a, T: AsRef<RuleDescriptor>>(
        &self,
        rules: &'a BTreeMap<String, T>,
    ) -> Vec<(&'a str, &'a T)> {
        rules
            .iter()
            .filter(|(_, rule)| self.is_relevant(rule.as_ref()))
            .map(|(key, rule)| (key.as_str(), rule))
            .collect()
    }
}
