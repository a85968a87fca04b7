//! Indexed code: entities and package manifests.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::string_enum;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Function,
    Class,
    Route,
    Type,
    Config,
}

string_enum!(EntityType {
    Function => "function",
    Class => "class",
    Route => "route",
    Type => "type",
    Config => "config",
});

/// A named piece of code known to the codebase index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeEntity {
    pub id: String,
    pub repo_id: String,
    pub file_path: String,
    pub start_line: u32,
    pub end_line: u32,
    pub entity_type: EntityType,
    pub name: String,
    #[serde(default)]
    pub signature: Option<String>,
    #[serde(default)]
    pub raw_code: Option<String>,
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl CodeEntity {
    pub fn new(
        id: impl Into<String>,
        repo_id: impl Into<String>,
        file_path: impl Into<String>,
        entity_type: EntityType,
        name: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            repo_id: repo_id.into(),
            file_path: file_path.into(),
            start_line: 1,
            end_line: 1,
            entity_type,
            name: name.into(),
            signature: None,
            raw_code: None,
            embedding: None,
        }
    }

    pub fn with_lines(mut self, start: u32, end: u32) -> Self {
        self.start_line = start;
        self.end_line = end.max(start);
        self
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = Some(signature.into());
        self
    }

    pub fn with_raw_code(mut self, raw_code: impl Into<String>) -> Self {
        self.raw_code = Some(raw_code.into());
        self
    }

    pub fn with_embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }
}

/// A parsed package manifest (`package.json`, `Cargo.toml`, ...).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepoManifest {
    pub file_path: String,
    pub name: Option<String>,
    pub version: Option<String>,
    pub dependencies: BTreeMap<String, String>,
    pub dev_dependencies: BTreeMap<String, String>,
    pub scripts: BTreeMap<String, String>,
    /// Runtime constraints, e.g. `node = ">=18"`.
    pub engines: BTreeMap<String, String>,
}

impl RepoManifest {
    /// Declared version spec for a package across dependency tables.
    pub fn dependency(&self, package: &str) -> Option<&str> {
        self.dependencies
            .get(package)
            .or_else(|| self.dev_dependencies.get(package))
            .map(String::as_str)
    }
}
