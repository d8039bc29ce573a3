pub mod cache;
pub mod document;
pub mod entry;
pub mod error;
pub mod hooks;
pub mod path_template;
pub mod query;
pub mod schema;
pub mod store;

pub use entry::{Entry, EntryId};
pub use error::{FlatRecordError, Result};
pub use hooks::Hooks;
pub use path_template::PathPattern;
pub use query::{Matcher, Matchers};
pub use schema::{FieldDefinition, FieldKind, FieldType, ModelDefinition, SchemaDefinition, Storage};
pub use store::{Model, Store};
