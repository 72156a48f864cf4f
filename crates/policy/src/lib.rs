//! Rule-driven configuration compliance engine.
//!
//! This crate provides:
//! - Filter specifications selecting rules by id, category, severity and type
//! - A policy-tree loader with per-rule body templating via `minijinja`
//! - Fail-fast compilation through a pluggable [`PolicyBackend`]
//! - Parallel evaluation against a resource graph, with per-resource skip
//!   directives and severity overrides
//! - Mergeable report summaries

pub mod backend;
pub mod compiler;
pub mod descriptor;
pub mod engine;
pub mod evaluator;
pub mod filters;
pub mod loader;
pub mod report;
pub mod template;

pub use backend::{BackendError, PolicyBackend};
pub use descriptor::RuleDescriptor;
pub use engine::{EngineError, EngineStats, InitFailure, PolicyEngine};
pub use report::{EngineOutput, PassedRule, ScanTarget, Summary, Violation};
