//! The policy engine: load, filter and compile once, then evaluate per scan.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::info;

use iacguard_core::{CoreError, PolicyConfig, ResourceGraph};

use crate::backend::PolicyBackend;
use crate::compiler::{compile_rules, CompileError, CompiledRule};
use crate::evaluator::Evaluator;
use crate::filters::PreLoadFilter;
use crate::loader::{LoadError, LoadResult, LoadStats, RuleLoader};
use crate::report::{EngineOutput, ScanTarget};

/// Why initialization failed.
#[derive(Debug, thiserror::Error)]
pub enum InitFailure {
    #[error("invalid policy configuration: {0}")]
    Config(#[from] CoreError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Compile(#[from] CompileError),
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("failed to initialize policy engine: {0}")]
    InitFailed(#[source] InitFailure),

    #[error("failed to build scan input: {0}")]
    Input(#[source] CoreError),
}

impl From<CoreError> for EngineError {
    fn from(e: CoreError) -> Self {
        EngineError::InitFailed(InitFailure::Config(e))
    }
}

impl From<LoadError> for EngineError {
    fn from(e: LoadError) -> Self {
        EngineError::InitFailed(InitFailure::Load(e))
    }
}

impl From<CompileError> for EngineError {
    fn from(e: CompileError) -> Self {
        EngineError::InitFailed(InitFailure::Compile(e))
    }
}

/// Counters describing the loaded rule corpus.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Compiled rules in the active set.
    pub rule_count: usize,
    pub body_file_count: usize,
    pub metadata_file_count: usize,
    /// Descriptors admitted past filtering.
    pub metadata_count: usize,
}

impl From<&LoadStats> for EngineStats {
    fn from(stats: &LoadStats) -> Self {
        Self {
            rule_count: stats.rule_count,
            body_file_count: stats.body_files,
            metadata_file_count: stats.metadata_files,
            metadata_count: stats.descriptors,
        }
    }
}

/// Compiled rule set bound to a backend.
///
/// The rule set is fixed at [`PolicyEngine::init`]; [`PolicyEngine::evaluate`]
/// takes `&self` and may run for several scans at once.
pub struct PolicyEngine<B: PolicyBackend> {
    backend: B,
    rules: BTreeMap<String, CompiledRule<B::Query>>,
    stats: EngineStats,
    load_results: Vec<LoadResult>,
    policy_path: PathBuf,
    config: PolicyConfig,
}

impl<B: PolicyBackend> PolicyEngine<B> {
    /// Load, filter and compile every rule under the configured policy path.
    pub fn init(backend: B, config: &PolicyConfig) -> Result<Self, EngineError> {
        let (_, policy_path) = config.resolve_paths()?;
        config.validate_categories()?;
        let filter = PreLoadFilter::from_config(config)?;

        let set = RuleLoader::new().load(&policy_path, &filter)?;
        let stats = EngineStats::from(&set.stats);
        let rules = compile_rules(&backend, set.rules, &config.query_base)?;

        info!(
            rules = rules.len(),
            path = %policy_path.display(),
            "policy engine initialized"
        );
        Ok(Self {
            backend,
            rules,
            stats,
            load_results: set.results,
            policy_path,
            config: config.clone(),
        })
    }

    /// Evaluate the active rules against one resource graph.
    pub fn evaluate<G: ResourceGraph + ?Sized>(&self, graph: &G) -> Result<EngineOutput, EngineError> {
        self.evaluate_target(graph, &ScanTarget::default())
    }

    /// Like [`PolicyEngine::evaluate`], recording `target` in the summary.
    pub fn evaluate_target<G: ResourceGraph + ?Sized>(
        &self,
        graph: &G,
        target: &ScanTarget,
    ) -> Result<EngineOutput, EngineError> {
        Evaluator::new(&self.backend, &self.rules)
            .evaluate_target(graph, target)
            .map_err(EngineError::Input)
    }

    pub fn rules(&self) -> &BTreeMap<String, CompiledRule<B::Query>> {
        &self.rules
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }

    /// Per-file outcome of the load that built this engine.
    pub fn load_results(&self) -> &[LoadResult] {
        &self.load_results
    }

    pub fn policy_path(&self) -> &Path {
        &self.policy_path
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }
}
