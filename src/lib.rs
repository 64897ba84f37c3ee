// RustyQuery - declare a SELECT template once, compile many requests against it
// This is the library root that exposes the public API

pub mod definition;
pub mod emit;
pub mod error;
pub mod query;
pub mod value;

// Re-export commonly used types for convenience
pub use definition::{FieldDef, QueryDefinition, SchemaExtractor, ValueType};
pub use emit::{DefinitionSink, JsonSink};
pub use error::{Error, Result};
pub use query::{compile, Criteria, FilterExpr, Operand, QueryAndParams, Sort};
pub use value::Value;
