// Error types
// Every failure names the identifier or text that caused it

use crate::query::expr_parser::ParseError;
use sqlparser::parser::ParserError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    // Definition build errors
    #[error("unsupported statement: {0}")]
    UnsupportedStatement(String),

    #[error("select item `{expression}` has no alias")]
    MissingAlias { expression: String },

    #[error("unsupported type tag: {tag}")]
    UnsupportedType { tag: String },

    #[error("duplicate field alias: {alias}")]
    DuplicateAlias { alias: String },

    #[error("template SQL parsing error: {0}")]
    TemplateSyntax(#[from] ParserError),

    // Filter text errors
    #[error(transparent)]
    Parse(#[from] ParseError),

    // Compile errors
    #[error("unknown field: {alias}")]
    UnknownField { alias: String },

    #[error("no value bound for parameter :{name}")]
    ParameterBinding { name: String },

    #[error("filter nested deeper than {limit} levels")]
    FilterTooDeep { limit: usize },

    // Emission errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
