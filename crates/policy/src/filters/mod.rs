//! Filter specifications over rule metadata.
//!
//! Each dimension (policy type, resource type, reference id, category,
//! severity) is one named [`FilterSpec`]. [`AllOf`] and [`AnyOf`] combine
//! them; both deny when given no specs at all.

mod preload;
mod prescan;

pub use preload::PreLoadFilter;
pub use prescan::PreScanFilter;

use tracing::warn;

use iacguard_core::Severity;

use crate::descriptor::RuleDescriptor;

/// Predicate over a rule's metadata.
pub trait FilterSpec: Send + Sync {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool;
}

/// Shared spec list used by the combinators.
pub type BoxedSpec = Box<dyn FilterSpec>;

fn normalize(s: &str) -> String {
    s.trim().to_uppercase()
}

// ── Primitives ──────────────────────────────────────────────────────

/// Rule policy type is one of the configured types (or `all` is configured).
#[derive(Debug, Clone, Default)]
pub struct PolicyTypeSpec {
    policy_types: Vec<String>,
}

impl PolicyTypeSpec {
    pub fn new(policy_types: &[String]) -> Self {
        Self {
            policy_types: policy_types.iter().map(|p| normalize(p)).collect(),
        }
    }
}

impl FilterSpec for PolicyTypeSpec {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool {
        if rule.policy_type.is_empty() || self.policy_types.is_empty() {
            return true;
        }
        let wanted = normalize(&rule.policy_type);
        self.policy_types.iter().any(|p| p == "ALL" || *p == wanted)
    }
}

/// Rule targets the given resource type. Rules with no resource type match anything.
#[derive(Debug, Clone)]
pub struct ResourceTypeSpec {
    resource_type: String,
}

impl ResourceTypeSpec {
    pub fn new(resource_type: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
        }
    }
}

impl FilterSpec for ResourceTypeSpec {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool {
        if rule.resource_type.is_empty() {
            return true;
        }
        // k8s rules apply to every kubernetes_* resource kind
        if rule.policy_type == "k8s"
            && self.resource_type.to_lowercase().contains("kubernetes")
        {
            return true;
        }
        self.resource_type == rule.resource_type
    }
}

/// Rule is identified by `target`, via its canonical id or its legacy reference id.
#[derive(Debug, Clone)]
pub struct ReferenceIdSpec {
    target: String,
}

impl ReferenceIdSpec {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
        }
    }
}

impl FilterSpec for ReferenceIdSpec {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool {
        if !rule.id.is_empty() && self.target == rule.id {
            return true;
        }
        if self.target == rule.reference_id {
            warn!(
                id = %rule.id,
                reference_id = %rule.reference_id,
                "deprecated: select rules by 'id' instead of 'reference_id'"
            );
            return true;
        }
        false
    }
}

/// Any of the listed ids matches. An empty list is unconstrained.
#[derive(Debug, Clone, Default)]
pub struct ReferenceIdsSpec {
    ids: Vec<ReferenceIdSpec>,
}

impl ReferenceIdsSpec {
    pub fn new(ids: &[String]) -> Self {
        Self {
            ids: ids.iter().map(ReferenceIdSpec::new).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl FilterSpec for ReferenceIdsSpec {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool {
        self.ids.is_empty() || self.ids.iter().any(|spec| spec.is_satisfied(rule))
    }
}

/// Rule category is one of the configured categories, compared case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct CategorySpec {
    categories: Vec<String>,
}

impl CategorySpec {
    pub fn new(categories: &[String]) -> Self {
        Self {
            categories: categories.iter().map(|c| normalize(c)).collect(),
        }
    }
}

impl FilterSpec for CategorySpec {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool {
        if self.categories.is_empty() {
            return true;
        }
        let category = normalize(&rule.category);
        self.categories.contains(&category)
    }
}

/// Rule severity is at or above the configured minimum.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeveritySpec {
    minimum: Option<Severity>,
}

impl SeveritySpec {
    pub fn new(minimum: Option<Severity>) -> Self {
        Self { minimum }
    }
}

impl FilterSpec for SeveritySpec {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool {
        self.minimum.map_or(true, |min| rule.severity.meets(min))
    }
}

// ── Combinators ─────────────────────────────────────────────────────

/// Logical AND. Denies when empty; stops at the first failing spec.
#[derive(Default)]
pub struct AllOf {
    specs: Vec<BoxedSpec>,
}

impl AllOf {
    pub fn new(specs: Vec<BoxedSpec>) -> Self {
        Self { specs }
    }
}

impl FilterSpec for AllOf {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool {
        !self.specs.is_empty() && self.specs.iter().all(|s| s.is_satisfied(rule))
    }
}

/// Logical OR. Denies when empty; stops at the first passing spec.
#[derive(Default)]
pub struct AnyOf {
    specs: Vec<BoxedSpec>,
}

impl AnyOf {
    pub fn new(specs: Vec<BoxedSpec>) -> Self {
        Self { specs }
    }
}

impl FilterSpec for AnyOf {
    fn is_satisfied(&self, rule: &RuleDescriptor) -> bool {
        self.specs.iter().any(|s| s.is_satisfied(rule))
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn rule(reference_id: &str) -> RuleDescriptor {
        RuleDescriptor {
            name: "testRule".into(),
            file: "testRule.rego".into(),
            template_args: Default::default(),
            severity: Severity::Medium,
            description: String::new(),
            reference_id: reference_id.into(),
            category: String::new(),
            version: 1,
            id: String::new(),
            resource_type: String::new(),
            policy_type: String::new(),
        }
    }

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    struct Always(bool);

    impl FilterSpec for Always {
        fn is_satisfied(&self, _: &RuleDescriptor) -> bool {
            self.0
        }
    }

    #[test]
    fn all_of_empty_denies() {
        assert!(!AllOf::new(vec![]).is_satisfied(&rule("R1")));
        assert!(!AllOf::default().is_satisfied(&rule("R1")));
    }

    #[test]
    fn all_of_requires_every_spec() {
        let yes = AllOf::new(vec![Box::new(Always(true)), Box::new(Always(true))]);
        let no = AllOf::new(vec![Box::new(Always(true)), Box::new(Always(false))]);
        assert!(yes.is_satisfied(&rule("R1")));
        assert!(!no.is_satisfied(&rule("R1")));
    }

    #[test]
    fn any_of_needs_one_spec() {
        assert!(!AnyOf::new(vec![]).is_satisfied(&rule("R1")));
        let one = AnyOf::new(vec![Box::new(Always(false)), Box::new(Always(true))]);
        assert!(one.is_satisfied(&rule("R1")));
    }

    #[test]
    fn policy_type_matches_case_insensitively_and_wildcard() {
        let mut r = rule("R1");
        r.policy_type = "aws".into();

        assert!(PolicyTypeSpec::new(&[]).is_satisfied(&r));
        assert!(PolicyTypeSpec::new(&strings(&["AWS"])).is_satisfied(&r));
        assert!(PolicyTypeSpec::new(&strings(&["all"])).is_satisfied(&r));
        assert!(!PolicyTypeSpec::new(&strings(&["k8s"])).is_satisfied(&r));

        r.policy_type.clear();
        assert!(PolicyTypeSpec::new(&strings(&["k8s"])).is_satisfied(&r));
    }

    #[test]
    fn resource_type_empty_rule_matches_everything() {
        let r = rule("R1");
        assert!(ResourceTypeSpec::new("aws_s3_bucket").is_satisfied(&r));
    }

    #[test]
    fn resource_type_exact_match_and_k8s_special_case() {
        let mut r = rule("R1");
        r.resource_type = "aws_s3_bucket".into();
        assert!(ResourceTypeSpec::new("aws_s3_bucket").is_satisfied(&r));
        assert!(!ResourceTypeSpec::new("aws_iam_role").is_satisfied(&r));

        r.policy_type = "k8s".into();
        r.resource_type = "kubernetes_pod".into();
        assert!(ResourceTypeSpec::new("kubernetes_deployment").is_satisfied(&r));
    }

    #[test]
    fn reference_id_matches_canonical_or_legacy_id() {
        let mut r = rule("AWS.S3Bucket.DS.High.1043");
        r.id = "AC_AWS_0214".into();
        assert!(ReferenceIdSpec::new("AC_AWS_0214").is_satisfied(&r));
        assert!(ReferenceIdSpec::new("AWS.S3Bucket.DS.High.1043").is_satisfied(&r));
        assert!(!ReferenceIdSpec::new("AC_AWS_0001").is_satisfied(&r));
    }

    #[test]
    fn reference_ids_is_unconstrained_when_empty() {
        let r = rule("Rule.1");
        assert!(ReferenceIdsSpec::new(&[]).is_satisfied(&r));
        assert!(ReferenceIdsSpec::new(&strings(&["Rule.2", "Rule.1"])).is_satisfied(&r));
        assert!(!ReferenceIdsSpec::new(&strings(&["Rule.2", "Rule.3"])).is_satisfied(&r));
    }

    #[test]
    fn category_membership_is_case_insensitive() {
        let mut r = rule("R1");
        r.category = "Data Protection".into();
        assert!(CategorySpec::new(&[]).is_satisfied(&r));
        assert!(CategorySpec::new(&strings(&["DATA PROTECTION"])).is_satisfied(&r));
        assert!(!CategorySpec::new(&strings(&["Resilience"])).is_satisfied(&r));
    }

    #[test]
    fn severity_is_a_minimum_threshold() {
        let mut r = rule("R1");
        r.severity = Severity::Medium;
        assert!(SeveritySpec::new(None).is_satisfied(&r));
        assert!(SeveritySpec::new(Some(Severity::Low)).is_satisfied(&r));
        assert!(SeveritySpec::new(Some(Severity::Medium)).is_satisfied(&r));
        assert!(!SeveritySpec::new(Some(Severity::High)).is_satisfied(&r));
    }
}
