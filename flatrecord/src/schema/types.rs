use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Top-level schema parsed from schema.yaml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaDefinition {
    #[serde(default)]
    pub models: HashMap<String, ModelConfig>,
}

/// Configuration of a single model as written in schema.yaml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    pub path: String,
    #[serde(default)]
    pub storage: Storage,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
}

/// A field is either a bare name (structured field) or a full definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldConfig {
    Name(String),
    Detailed(FieldSpec),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(default)]
    pub kind: FieldKindConfig,
    #[serde(rename = "type", default)]
    pub field_type: Option<FieldType>,
    #[serde(default)]
    pub default: Option<serde_yaml::Value>,
    #[serde(default)]
    pub in_filepath: Option<usize>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKindConfig {
    #[default]
    Field,
    Text,
    Virtual,
}

/// How entries are laid out in files
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Storage {
    /// One entry per file, YAML block optionally followed by text segments
    #[default]
    Entry,
    /// Several entries per file, stored as a YAML sequence
    List,
}

/// Value type a field is coerced to on read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Integer,
    Float,
    Date,
    Time,
}
