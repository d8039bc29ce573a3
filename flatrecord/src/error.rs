use thiserror::Error;

#[derive(Error, Debug)]
pub enum FlatRecordError {
    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Unknown model: {0}")]
    UnknownModel(String),

    #[error("Entry not found: {model}/{id}")]
    NotFound { model: String, id: String },

    #[error("Decode error in {path}: {message}")]
    Decode { path: String, message: String },

    #[error("Ambiguous path for {model}: {path} still contains wildcards")]
    AmbiguousPath { model: String, path: String },

    #[error("Model {model} does not support {capability}")]
    MissingCapability { model: String, capability: String },

    #[error("Cannot coerce field '{field}': {message}")]
    Coercion { field: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Invalid pattern: {0}")]
    Regex(#[from] regex::Error),

    #[error("Invalid glob: {0}")]
    Glob(#[from] glob::PatternError),

    #[error("Failed to persist file: {0}")]
    Persist(#[from] tempfile::PersistError),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, FlatRecordError>;
