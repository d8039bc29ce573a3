use crate::error::{FlatRecordError, Result};
use super::model::{FieldDefinition, ModelDefinition};
use super::types::{FieldConfig, FieldKindConfig, ModelConfig, SchemaDefinition};
use std::path::Path;

/// Parse a schema.yaml file into a SchemaDefinition
pub fn parse_schema(path: &Path) -> Result<SchemaDefinition> {
    let content = std::fs::read_to_string(path)?;
    parse_schema_str(&content)
}

/// Parse a schema YAML string into a SchemaDefinition
pub fn parse_schema_str(content: &str) -> Result<SchemaDefinition> {
    let schema: SchemaDefinition = serde_yaml::from_str(content)?;
    Ok(schema)
}

impl SchemaDefinition {
    /// Convert every configured model into a definition, sorted by name.
    pub fn model_definitions(&self) -> Result<Vec<(String, ModelDefinition)>> {
        let mut names: Vec<&String> = self.models.keys().collect();
        names.sort();
        names
            .into_iter()
            .map(|name| {
                let definition = self.models[name].to_definition().map_err(|e| match e {
                    FlatRecordError::Schema(msg) => {
                        FlatRecordError::Schema(format!("model '{name}': {msg}"))
                    }
                    other => other,
                })?;
                Ok((name.clone(), definition))
            })
            .collect()
    }
}

impl ModelConfig {
    pub fn to_definition(&self) -> Result<ModelDefinition> {
        let mut definition = ModelDefinition::new(self.storage, &self.path);

        for field in &self.fields {
            let detail = match field {
                FieldConfig::Name(name) => {
                    definition = definition.field(name);
                    continue;
                }
                FieldConfig::Detailed(detail) => detail,
            };

            let mut field_def = match (detail.kind, detail.in_filepath) {
                (FieldKindConfig::Virtual, Some(index)) => {
                    FieldDefinition::filepath(&detail.name, index)
                }
                (FieldKindConfig::Virtual, None) => {
                    return Err(FlatRecordError::Schema(format!(
                        "virtual field '{}' needs in_filepath",
                        detail.name
                    )));
                }
                (_, Some(_)) => {
                    return Err(FlatRecordError::Schema(format!(
                        "filepath field '{}' must be virtual",
                        detail.name
                    )));
                }
                (FieldKindConfig::Field, None) => FieldDefinition::structured(&detail.name),
                (FieldKindConfig::Text, None) => {
                    FieldDefinition::text(&detail.name, definition.text_count())
                }
            };

            if let Some(field_type) = detail.field_type {
                field_def = field_def.with_type(field_type);
            }
            if let Some(default) = &detail.default {
                field_def = field_def.with_default(default.clone());
            }
            definition = definition.with_field(field_def);
        }

        Ok(definition)
    }
}
