mod model;
mod parser;
mod types;

pub use model::{ComputeFn, FieldDefinition, FieldKind, ModelDefinition};
pub use parser::{parse_schema, parse_schema_str};
pub use types::{
    FieldConfig, FieldKindConfig, FieldSpec, FieldType, ModelConfig, SchemaDefinition, Storage,
};
