//! Engines document parsing.
//!
//! Loads the list of engines from a YAML file (`engines.yaml`). Each entry
//! names a pipeline `class`; the manager attaches pipelines by that name.

use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;

use crate::ManagerError;

/// One engine entry of the engines document
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct EngineSpec {
    /// Engine identifier (e.g., "stable-diffusion-v1-5")
    pub id: String,

    /// Display name
    #[serde(default)]
    pub name: String,

    /// Free-form description
    #[serde(default)]
    pub description: String,

    /// Pipeline class that serves this engine
    pub class: String,

    /// Hub model reference
    #[serde(default)]
    pub model: Option<String>,

    /// Local model path, preferred over `model` when set
    #[serde(default)]
    pub local_model: Option<String>,

    /// Disabled engines are listed but never run
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Invisible engines are hidden from listings but still addressable
    #[serde(default = "default_true")]
    pub visible: bool,

    /// Requests without an engine id land on the default engine
    #[serde(default)]
    pub default: bool,
}

fn default_true() -> bool {
    true
}

impl EngineSpec {
    /// Create an enabled, visible spec for testing and programmatic setup
    pub fn new(id: impl Into<String>, class: impl Into<String>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            description: String::new(),
            class: class.into(),
            model: None,
            local_model: None,
            enabled: true,
            visible: true,
            default: false,
        }
    }

    /// Mark the spec as the default engine
    pub fn as_default(mut self) -> Self {
        self.default = true;
        self
    }

    /// Where the pipeline should load weights from
    pub fn model_source(&self) -> Option<&str> {
        self.local_model.as_deref().or(self.model.as_deref())
    }
}

/// Parse an engines document from YAML text
pub fn parse_engines(yaml: &str) -> Result<Vec<EngineSpec>, ManagerError> {
    let specs: Vec<EngineSpec> = serde_yaml::from_str(yaml)?;
    validate_engines(&specs)?;
    Ok(specs)
}

/// Load an engines document from a file
pub fn load_engines<P: AsRef<Path>>(path: P) -> Result<Vec<EngineSpec>, ManagerError> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|source| ManagerError::FileRead {
        path: path.display().to_string(),
        source,
    })?;
    parse_engines(&contents)
}

/// Check ids are unique and at most one engine is marked default
pub fn validate_engines(specs: &[EngineSpec]) -> Result<(), ManagerError> {
    let mut seen = HashSet::new();
    for spec in specs {
        if spec.id.trim().is_empty() {
            return Err(ManagerError::InvalidEngine("engine id must not be empty".to_string()));
        }
        if !seen.insert(spec.id.as_str()) {
            return Err(ManagerError::DuplicateEngine(spec.id.clone()));
        }
    }

    let defaults: Vec<&str> = specs
        .iter()
        .filter(|s| s.default)
        .map(|s| s.id.as_str())
        .collect();
    if defaults.len() > 1 {
        return Err(ManagerError::MultipleDefaults(defaults.join(", ")));
    }

    Ok(())
}
