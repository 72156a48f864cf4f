//! End-to-end tests: policy tree on disk, scripted backend, resource graph.

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde_json::{json, Value};
use tempfile::TempDir;

use iacguard_core::{AllResourceConfigs, PolicyConfig, ResourceConfig, Severity, SeverityCap, SkipRule};
use iacguard_policy::engine::InitFailure;
use iacguard_policy::{BackendError, EngineError, PolicyBackend, PolicyEngine, ScanTarget, Summary};

// ── Fixtures ────────────────────────────────────────────────────────

/// Backend whose evaluation results are scripted per query path.
#[derive(Default)]
struct ScriptedBackend {
    results: HashMap<String, Result<Vec<Value>, String>>,
}

impl ScriptedBackend {
    fn violation(mut self, rule: &str, ids: Vec<Value>) -> Self {
        self.results.insert(format!("data.iacguard.{rule}"), Ok(ids));
        self
    }

    fn failure(mut self, rule: &str) -> Self {
        self.results
            .insert(format!("data.iacguard.{rule}"), Err("evaluation aborted".into()));
        self
    }
}

impl PolicyBackend for ScriptedBackend {
    type Module = String;
    type Query = String;

    fn compile_module(&self, name: &str, body: &str) -> Result<String, BackendError> {
        if body.contains("syntax error") {
            return Err(BackendError::Compile(format!("{name}: rego_parse_error")));
        }
        Ok(body.to_string())
    }

    fn prepare_query(&self, _module: &String, query_path: &str) -> Result<String, BackendError> {
        Ok(query_path.to_string())
    }

    fn evaluate(&self, query: &String, _input: &Value) -> Result<Vec<Value>, BackendError> {
        match self.results.get(query) {
            Some(Ok(ids)) => Ok(ids.clone()),
            Some(Err(e)) => Err(BackendError::Evaluate(e.clone())),
            None => Ok(Vec::new()),
        }
    }
}

struct RuleFixture<'a> {
    name: &'a str,
    id: &'a str,
    reference_id: &'a str,
    severity: &'a str,
    resource_type: &'a str,
    category: &'a str,
}

impl<'a> RuleFixture<'a> {
    fn new(name: &'a str, reference_id: &'a str, severity: &'a str) -> Self {
        Self {
            name,
            id: "",
            reference_id,
            severity,
            resource_type: "aws_s3_bucket",
            category: "Data Protection",
        }
    }

    fn write(&self, dir: &Path, body: &str) {
        fs::create_dir_all(dir).unwrap();
        let metadata = json!({
            "name": self.name,
            "file": format!("{}.rego", self.name),
            "template_args": {"prefix": ""},
            "severity": self.severity,
            "description": format!("{} description", self.name),
            "reference_id": self.reference_id,
            "category": self.category,
            "version": 1,
            "id": self.id,
            "resource_type": self.resource_type,
            "policy_type": "aws",
        });
        fs::write(
            dir.join(format!("{}.json", self.name)),
            serde_json::to_vec_pretty(&metadata).unwrap(),
        )
        .unwrap();
        fs::write(dir.join(format!("{}.rego", self.name)), body).unwrap();
    }
}

const BODY: &str = "package iacguard\n\n{{ prefix }}{{ name }}[bucket.id] {\n  bucket := input.aws_s3_bucket[_]\n}\n";

fn config(root: &Path) -> PolicyConfig {
    PolicyConfig {
        base_path: root.to_path_buf(),
        ..Default::default()
    }
}

fn bucket(name: &str) -> ResourceConfig {
    let mut r = ResourceConfig::new("aws_s3_bucket", name);
    r.source = "main.tf".into();
    r.line = 1;
    r.config = json!({"bucket": name});
    r
}

fn graph(resources: Vec<ResourceConfig>) -> AllResourceConfigs {
    let mut all = AllResourceConfigs::new();
    all.add_resources("aws_s3_bucket", resources);
    all
}

// ── Tests ───────────────────────────────────────────────────────────

#[test]
fn single_high_violation_end_to_end() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Versioning", "R1", "HIGH").write(dir.path(), BODY);
    let backend = ScriptedBackend::default().violation("s3Versioning", vec![json!("aws_s3_bucket.mybucket")]);

    let engine = PolicyEngine::init(backend, &config(dir.path())).unwrap();
    let out = engine.evaluate(&graph(vec![bucket("mybucket")])).unwrap();

    assert_eq!(out.violations.len(), 1);
    let v = &out.violations[0];
    assert_eq!(v.severity, Severity::High);
    assert_eq!(v.resource_type, "aws_s3_bucket");
    assert_eq!(v.rule_name, "s3Versioning");
    assert_eq!(v.rule_file, "s3Versioning.rego");
    assert_eq!(v.resource_config["bucket"], "mybucket");
    assert_eq!(out.summary.high, 1);
    assert_eq!(out.summary.violated_policies, 1);
    assert_eq!(out.summary.total_policies, 1);
}

#[test]
fn rule_with_no_matches_is_passed() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Logging", "R1", "LOW").write(dir.path(), BODY);

    let engine = PolicyEngine::init(ScriptedBackend::default(), &config(dir.path())).unwrap();
    let out = engine.evaluate(&graph(vec![bucket("a")])).unwrap();

    assert!(out.violations.is_empty());
    assert_eq!(out.passed_rules.len(), 1);
    assert_eq!(out.passed_rules[0].rule_name, "s3Logging");
}

#[test]
fn rendered_body_reaches_the_backend() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Acl", "R1", "LOW").write(dir.path(), BODY);

    let engine = PolicyEngine::init(ScriptedBackend::default(), &config(dir.path())).unwrap();

    let compiled = &engine.rules()["R1"];
    assert!(compiled.rule.body.contains("s3Acl[bucket.id]"));
    assert_eq!(compiled.query, "data.iacguard.s3Acl");
}

#[test]
fn muted_resource_never_counts() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Public", "R1", "HIGH").write(dir.path(), BODY);
    let backend = ScriptedBackend::default().violation("s3Public", vec![json!("aws_s3_bucket.quiet")]);
    let mut quiet = bucket("quiet");
    quiet.max_severity = Some(SeverityCap::Mute);

    let engine = PolicyEngine::init(backend, &config(dir.path())).unwrap();
    let out = engine.evaluate(&graph(vec![quiet])).unwrap();

    assert!(out.violations.is_empty());
    assert_eq!(out.muted_violations.len(), 1);
    assert_eq!(out.summary.high, 0);
    assert_eq!(out.summary.violated_policies, 0);
}

#[test]
fn skip_rule_with_comment_is_reported_as_skipped() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Encryption", "rule.id", "MEDIUM").write(dir.path(), BODY);
    let backend = ScriptedBackend::default().violation("s3Encryption", vec![json!({"Id": "aws_s3_bucket.a"})]);
    let mut a = bucket("a");
    a.skip_rules = vec![SkipRule {
        rule: "RULE.ID".into(),
        comment: "approved".into(),
    }];

    let engine = PolicyEngine::init(backend, &config(dir.path())).unwrap();
    let out = engine.evaluate(&graph(vec![a])).unwrap();

    assert!(out.violations.is_empty());
    assert_eq!(out.skipped_violations.len(), 1);
    assert_eq!(out.skipped_violations[0].comment.as_deref(), Some("approved"));
    assert_eq!(out.summary.medium, 0);
}

#[test]
fn severity_overrides_escalate_and_clamp() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Tags", "R1", "MEDIUM").write(dir.path(), BODY);
    let backend = ScriptedBackend::default().violation(
        "s3Tags",
        vec![json!("aws_s3_bucket.critical"), json!("aws_s3_bucket.sandbox")],
    );
    let mut critical = bucket("critical");
    critical.min_severity = Some(Severity::High);
    let mut sandbox = bucket("sandbox");
    sandbox.max_severity = Some(SeverityCap::Level(Severity::Low));

    let engine = PolicyEngine::init(backend, &config(dir.path())).unwrap();
    let out = engine.evaluate(&graph(vec![critical, sandbox])).unwrap();

    assert_eq!(out.summary.high, 1);
    assert_eq!(out.summary.low, 1);
    assert_eq!(out.summary.medium, 0);
    assert_eq!(out.summary.violated_policies, 2);
}

#[test]
fn malformed_identifiers_are_ignored() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Cors", "R1", "LOW").write(dir.path(), BODY);
    let backend = ScriptedBackend::default().violation(
        "s3Cors",
        vec![json!(7), json!({"id": "aws_s3_bucket.a"}), json!("aws_s3_bucket.a")],
    );

    let engine = PolicyEngine::init(backend, &config(dir.path())).unwrap();
    let out = engine.evaluate(&graph(vec![bucket("a")])).unwrap();

    assert_eq!(out.violations.len(), 1);
    assert_eq!(out.summary.low, 1);
}

#[test]
fn backend_error_removes_rule_from_total() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Broken", "R1", "LOW").write(dir.path(), BODY);
    RuleFixture::new("s3Fine", "R2", "LOW").write(&dir.path().join("more"), BODY);
    let backend = ScriptedBackend::default().failure("s3Broken");

    let engine = PolicyEngine::init(backend, &config(dir.path())).unwrap();
    let out = engine.evaluate(&graph(vec![bucket("a")])).unwrap();

    assert_eq!(engine.rules().len(), 2);
    assert_eq!(out.summary.total_policies, 1);
    assert_eq!(out.passed_rules.len(), 1);
}

#[test]
fn compile_failure_aborts_init() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("good", "R1", "LOW").write(dir.path(), BODY);
    RuleFixture::new("bad", "R2", "LOW").write(&dir.path().join("broken"), "syntax error {");

    let err = PolicyEngine::init(ScriptedBackend::default(), &config(dir.path()))
        .err()
        .unwrap();

    match err {
        EngineError::InitFailed(InitFailure::Compile(e)) => assert_eq!(e.rule, "bad"),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn unknown_severity_and_missing_tree_abort_init() {
    let dir = TempDir::new().unwrap();

    let mut cfg = config(dir.path());
    cfg.severity = Some("critical".into());
    let err = PolicyEngine::init(ScriptedBackend::default(), &cfg).err().unwrap();
    assert!(matches!(err, EngineError::InitFailed(InitFailure::Config(_))));

    let cfg = config(&dir.path().join("missing"));
    let err = PolicyEngine::init(ScriptedBackend::default(), &cfg).err().unwrap();
    assert!(matches!(err, EngineError::InitFailed(InitFailure::Load(_))));
}

#[test]
fn filters_shape_the_active_set() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("high", "Rule.1", "HIGH").write(dir.path(), BODY);
    RuleFixture::new("low", "Rule.2", "LOW").write(&dir.path().join("b"), BODY);
    RuleFixture::new("other", "Rule.3", "HIGH").write(&dir.path().join("c"), BODY);

    let mut cfg = config(dir.path());
    cfg.scan_rules = vec!["Rule.1".into(), "Rule.2".into()];
    cfg.severity = Some("medium".into());
    let engine = PolicyEngine::init(ScriptedBackend::default(), &cfg).unwrap();

    assert_eq!(engine.rules().keys().collect::<Vec<_>>(), vec!["Rule.1"]);
    assert_eq!(engine.stats().metadata_file_count, 3);
    assert_eq!(engine.stats().rule_count, 1);
}

#[test]
fn repo_path_narrows_the_loaded_tree() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("awsRule", "R1", "LOW").write(&dir.path().join("aws"), BODY);
    RuleFixture::new("k8sRule", "R2", "LOW").write(&dir.path().join("k8s"), BODY);

    let mut cfg = config(dir.path());
    cfg.repo_path = Some("aws".into());
    let engine = PolicyEngine::init(ScriptedBackend::default(), &cfg).unwrap();

    assert_eq!(engine.rules().keys().collect::<Vec<_>>(), vec!["R1"]);
    assert!(engine.policy_path().ends_with("aws"));
}

#[test]
fn summaries_merge_across_scans() {
    let a = Summary {
        high: 1,
        total_policies: 5,
        ..Default::default()
    };
    let mut merged = Summary {
        high: 2,
        total_policies: 3,
        ..Default::default()
    };
    merged.merge(&a);

    assert_eq!(merged.high, 3);
    assert_eq!(merged.total_policies, 8);
}

#[test]
fn engine_is_reusable_across_scans() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Versioning", "R1", "HIGH").write(dir.path(), BODY);
    let backend = ScriptedBackend::default().violation("s3Versioning", vec![json!("aws_s3_bucket.a")]);
    let engine = PolicyEngine::init(backend, &config(dir.path())).unwrap();

    let mut first = engine.evaluate(&graph(vec![bucket("a")])).unwrap();
    let second = engine.evaluate(&graph(vec![bucket("a")])).unwrap();
    assert_eq!(first.violations, second.violations);

    first.merge(second);
    assert_eq!(first.summary.high, 2);
    assert_eq!(first.summary.total_policies, 2);
}

#[test]
fn scan_target_is_carried_into_merged_summaries() {
    let dir = TempDir::new().unwrap();
    RuleFixture::new("s3Versioning", "R1", "HIGH").write(dir.path(), BODY);
    let engine = PolicyEngine::init(ScriptedBackend::default(), &config(dir.path())).unwrap();

    let mut tf = engine
        .evaluate_target(&graph(vec![bucket("a")]), &ScanTarget::new("infra/", "terraform"))
        .unwrap();
    let anonymous = engine.evaluate(&graph(vec![bucket("a")])).unwrap();
    assert!(anonymous.summary.resource_path.is_empty());

    tf.merge(anonymous);
    assert_eq!(tf.summary.resource_path, "infra/");
    assert_eq!(tf.summary.iac_type, "terraform");
}
