//! Canonical, IaC-agnostic resource graph handed to the policy engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::severity::{Severity, SeverityCap};

/// Per-resource directive suppressing one rule for that resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRule {
    pub rule: String,
    #[serde(default)]
    pub comment: String,
}

/// A single normalized resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceConfig {
    /// `Type.Name`.
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub resource_type: String,
    /// File the resource was translated from.
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub line: usize,
    #[serde(default)]
    pub config: serde_json::Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skip_rules: Vec<SkipRule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_severity: Option<Severity>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_severity: Option<SeverityCap>,
}

impl ResourceConfig {
    /// Resource with the conventional `Type.Name` id and an empty config.
    pub fn new(resource_type: impl Into<String>, name: impl Into<String>) -> Self {
        let resource_type = resource_type.into();
        let name = name.into();
        Self {
            id: format!("{}.{}", resource_type, name),
            name,
            resource_type,
            source: String::new(),
            line: 0,
            config: serde_json::Value::Null,
            skip_rules: Vec::new(),
            min_severity: None,
            max_severity: None,
        }
    }

    /// Same name, same source and same config.
    fn same_config(&self, other: &ResourceConfig) -> bool {
        self.name == other.name && self.source == other.source && self.config == other.config
    }
}

/// Read access to a normalized resource graph.
pub trait ResourceGraph {
    /// Resource types present in the graph. May be empty.
    fn resource_types(&self) -> Vec<String>;

    /// Every resource carrying `id`. Duplicates across source files are all returned.
    fn find_all_by_id(&self, id: &str) -> Result<Vec<ResourceConfig>, CoreError>;

    /// The document handed to the policy backend as evaluation input.
    fn input_document(&self) -> Result<serde_json::Value, CoreError>;
}

/// Resources grouped by type, the shape translators emit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AllResourceConfigs(BTreeMap<String, Vec<ResourceConfig>>);

impl AllResourceConfigs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, resource_type: &str) -> Option<&[ResourceConfig]> {
        self.0.get(resource_type).map(Vec::as_slice)
    }

    /// Add resources under `resource_type`, skipping any whose name, source
    /// and config are already present.
    pub fn add_resources(
        &mut self,
        resource_type: &str,
        resources: impl IntoIterator<Item = ResourceConfig>,
    ) {
        let list = self.0.entry(resource_type.to_string()).or_default();
        for res in resources {
            if !list.iter().any(|r| r.same_config(&res)) {
                list.push(res);
            }
        }
    }

    /// Total number of resources across all types.
    pub fn resource_count(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl ResourceGraph for AllResourceConfigs {
    fn resource_types(&self) -> Vec<String> {
        self.0.keys().cloned().collect()
    }

    fn find_all_by_id(&self, id: &str) -> Result<Vec<ResourceConfig>, CoreError> {
        let (resource_type, name) = id
            .split_once('.')
            .ok_or_else(|| CoreError::InvalidResourceId(id.to_string()))?;
        if resource_type.is_empty() || name.is_empty() {
            return Err(CoreError::InvalidResourceId(id.to_string()));
        }

        Ok(self
            .0
            .get(resource_type)
            .map(|list| list.iter().filter(|r| r.id == id).cloned().collect())
            .unwrap_or_default())
    }

    fn input_document(&self) -> Result<serde_json::Value, CoreError> {
        Ok(serde_json::to_value(&self.0)?)
    }
}
