// Query module - per-request criteria and their compilation to SQL
pub mod compiler;
pub mod criteria;
pub mod expr_parser;
pub mod filter;

pub use compiler::{compile, compile_filter, QueryAndParams};
pub use criteria::{Condition, Criteria, Direction, Sort};
pub use expr_parser::ParseError;
pub use filter::{CompareOp, FieldCondition, FilterExpr, Operand};
