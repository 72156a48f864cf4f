//! Turns loaded rules into prepared backend queries.
//!
//! Unlike loading, compilation is fail-fast: the first rule that does not
//! compile or prepare aborts the whole set.

use std::collections::BTreeMap;
use std::fmt;

use tracing::{debug, error};

use crate::backend::{BackendError, PolicyBackend};
use crate::descriptor::RuleDescriptor;
use crate::loader::LoadedRule;

/// A loaded rule with its prepared query.
pub struct CompiledRule<Q> {
    pub rule: LoadedRule,
    pub query: Q,
}

impl<Q> CompiledRule<Q> {
    pub fn descriptor(&self) -> &RuleDescriptor {
        &self.rule.descriptor
    }
}

impl<Q> AsRef<RuleDescriptor> for CompiledRule<Q> {
    fn as_ref(&self) -> &RuleDescriptor {
        &self.rule.descriptor
    }
}

/// Step at which compilation failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileStage {
    Compile,
    Prepare,
}

impl fmt::Display for CompileStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompileStage::Compile => write!(f, "compiling module"),
            CompileStage::Prepare => write!(f, "preparing query"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("rule '{rule}' failed while {stage}: {source}")]
pub struct CompileError {
    pub rule: String,
    pub stage: CompileStage,
    #[source]
    pub source: BackendError,
}

/// Query path for a rule: `query_base.name`.
pub fn query_path(query_base: &str, name: &str) -> String {
    format!("{}.{}", query_base, name)
}

/// Compile and prepare every rule, in reference-id order.
pub fn compile_rules<B: PolicyBackend>(
    backend: &B,
    rules: BTreeMap<String, LoadedRule>,
    query_base: &str,
) -> Result<BTreeMap<String, CompiledRule<B::Query>>, CompileError> {
    let mut compiled = BTreeMap::new();

    for (key, rule) in rules {
        let name = rule.descriptor.name.clone();
        let fail = |stage: CompileStage, source: BackendError| {
            error!(rule = %name, %stage, error = %source, body = %rule.body, "error compiling rule");
            CompileError {
                rule: name.clone(),
                stage,
                source,
            }
        };

        let module = backend
            .compile_module(&name, &rule.body)
            .map_err(|e| fail(CompileStage::Compile, e))?;
        let query = backend
            .prepare_query(&module, &query_path(query_base, &name))
            .map_err(|e| fail(CompileStage::Prepare, e))?;

        debug!(rule = %key, "compiled rule");
        compiled.insert(key, CompiledRule { rule, query });
    }

    Ok(compiled)
}
