//! Rule metadata as stored next to each rule body on disk.

use serde::{Deserialize, Serialize};

use iacguard_core::Severity;

/// Suffix marking candidate metadata files inside a policy directory.
pub const METADATA_FILE_SUFFIX: &str = ".json";

/// Template argument injected with the rule name when the metadata omits it.
pub const RESERVED_NAME_ARG: &str = "name";

/// Metadata describing one policy rule: identity, targeting, severity and
/// the arguments its body template is rendered with.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RuleDescriptor {
    /// Unique rule name. Also the module name handed to the backend, so it
    /// must not contain `.`.
    pub name: String,
    /// Rule body file, relative to the metadata file's directory.
    pub file: String,
    #[serde(default)]
    pub template_args: serde_json::Map<String, serde_json::Value>,
    pub severity: Severity,
    #[serde(default)]
    pub description: String,
    /// Legacy identifier; key of the active rule map.
    pub reference_id: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub version: u32,
    /// Canonical identifier.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub policy_type: String,
}

impl RuleDescriptor {
    /// Parse a metadata file's contents.
    pub fn from_json(contents: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(contents)
    }

    /// Names may not contain `.`; the backend query path is `base.name`.
    pub fn has_reserved_name(&self) -> bool {
        self.name.contains('.')
    }

    /// Add `template_args["name"] = name` unless the metadata already sets it.
    pub fn inject_reserved_args(&mut self) {
        if !self.template_args.contains_key(RESERVED_NAME_ARG) {
            self.template_args.insert(
                RESERVED_NAME_ARG.to_string(),
                serde_json::Value::String(self.name.clone()),
            );
        }
    }
}
