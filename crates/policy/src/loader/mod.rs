//! Rule repository loader.
//!
//! Walks a policy tree, parses each directory's `*.json` rule metadata,
//! applies the [`PreLoadFilter`](crate::filters::PreLoadFilter), renders the
//! referenced rule bodies and registers the survivors by reference id.
//! Only an empty or unreadable tree is fatal; every per-file problem is
//! recorded and skipped.

mod core;
mod error;


pub use self::core::{LoadStats, LoadedRule, RuleLoader, RuleSet};
pub use self::error::{LoadError, LoadResult, LoadStatus, RejectReason};
