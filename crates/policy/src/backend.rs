//! Seam to the policy evaluation backend.
//!
//! The engine never interprets rule bodies itself. A backend compiles each
//! rendered body into a module, prepares a query against it and evaluates
//! that query against the scan input, returning opaque violation
//! identifiers (see [`crate::evaluator::ViolationIdentifier`]).

/// Errors reported by a backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("compile error: {0}")]
    Compile(String),

    #[error("query preparation error: {0}")]
    Prepare(String),

    #[error("evaluation error: {0}")]
    Evaluate(String),
}

/// A rule-language compiler and evaluator.
///
/// Prepared queries are shared by concurrent scans, so they must be `Send + Sync`.
pub trait PolicyBackend: Send + Sync {
    type Module;
    type Query: Send + Sync;

    /// Compile one rendered rule body under the module name `name`.
    fn compile_module(&self, name: &str, body: &str) -> Result<Self::Module, BackendError>;

    /// Prepare the query at `query_path` (e.g. `data.iacguard.s3Versioning`).
    fn prepare_query(
        &self,
        module: &Self::Module,
        query_path: &str,
    ) -> Result<Self::Query, BackendError>;

    /// Evaluate a prepared query. An empty result means the rule passed.
    fn evaluate(
        &self,
        query: &Self::Query,
        input: &serde_json::Value,
    ) -> Result<Vec<serde_json::Value>, BackendError>;
}
