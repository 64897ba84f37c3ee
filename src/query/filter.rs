// Filter expression tree
// Built by the expression parser or by hand with the builder methods below

use crate::error::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leaf of a comparison
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Operand {
    /// Bound as a `?` placeholder
    Literal(Value),
    /// Named parameter, resolved from the criteria's bindings
    Param(String),
    /// Field alias, resolved against the definition at compile time
    Field(String),
}

impl Operand {
    pub fn param(name: impl Into<String>) -> Self {
        Operand::Param(name.into())
    }

    pub fn field(alias: impl Into<String>) -> Self {
        Operand::Field(alias.into())
    }
}

impl From<Value> for Operand {
    fn from(v: Value) -> Self {
        Operand::Literal(v)
    }
}

macro_rules! literal_operand {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Operand {
                fn from(v: $ty) -> Self {
                    Operand::Literal(v.into())
                }
            }
        )*
    };
}

literal_operand!(i32, i64, f64, bool, &str, String);

/// Binary comparison operators
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    NotEq,
    Gt,
    GtEq,
    Lt,
    LtEq,
    Like,
    NotLike,
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CompareOp::Eq => "=",
            CompareOp::NotEq => "!=",
            CompareOp::Gt => ">",
            CompareOp::GtEq => ">=",
            CompareOp::Lt => "<",
            CompareOp::LtEq => "<=",
            CompareOp::Like => "LIKE",
            CompareOp::NotLike => "NOT LIKE",
        };
        f.write_str(s)
    }
}

/// A filter predicate
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum FilterExpr {
    Compare {
        left: Operand,
        op: CompareOp,
        right: Operand,
    },
    In {
        operand: Operand,
        list: Vec<Operand>,
        negated: bool,
    },
    IsNull {
        operand: Operand,
        negated: bool,
    },
    And(Box<FilterExpr>, Box<FilterExpr>),
    Or(Box<FilterExpr>, Box<FilterExpr>),
    Not(Box<FilterExpr>),
}

impl FilterExpr {
    /// Parse filter text, e.g. `age > :minAge AND name LIKE 'A%'`
    pub fn parse(text: &str) -> Result<Self> {
        Ok(super::expr_parser::parse(text)?)
    }

    /// Start a condition on a field
    pub fn field(alias: impl Into<String>) -> FieldCondition {
        FieldCondition(Operand::Field(alias.into()))
    }

    pub fn and(self, other: FilterExpr) -> Self {
        FilterExpr::And(Box::new(self), Box::new(other))
    }

    pub fn or(self, other: FilterExpr) -> Self {
        FilterExpr::Or(Box::new(self), Box::new(other))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(self) -> Self {
        FilterExpr::Not(Box::new(self))
    }

    /// Left-leaning AND of every expression; `None` when empty
    pub fn all(exprs: impl IntoIterator<Item = FilterExpr>) -> Option<Self> {
        exprs.into_iter().reduce(FilterExpr::and)
    }

    /// Left-leaning OR of every expression; `None` when empty
    pub fn any(exprs: impl IntoIterator<Item = FilterExpr>) -> Option<Self> {
        exprs.into_iter().reduce(FilterExpr::or)
    }
}

/// Builder returned by [`FilterExpr::field`]
#[derive(Debug, Clone)]
pub struct FieldCondition(Operand);

impl FieldCondition {
    fn compare(self, op: CompareOp, right: impl Into<Operand>) -> FilterExpr {
        FilterExpr::Compare {
            left: self.0,
            op,
            right: right.into(),
        }
    }

    pub fn eq(self, right: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Eq, right)
    }

    pub fn ne(self, right: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::NotEq, right)
    }

    pub fn gt(self, right: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Gt, right)
    }

    pub fn ge(self, right: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::GtEq, right)
    }

    pub fn lt(self, right: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Lt, right)
    }

    pub fn le(self, right: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::LtEq, right)
    }

    pub fn like(self, right: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::Like, right)
    }

    pub fn not_like(self, right: impl Into<Operand>) -> FilterExpr {
        self.compare(CompareOp::NotLike, right)
    }

    pub fn in_list<I, T>(self, list: I) -> FilterExpr
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        FilterExpr::In {
            operand: self.0,
            list: list.into_iter().map(Into::into).collect(),
            negated: false,
        }
    }

    pub fn not_in<I, T>(self, list: I) -> FilterExpr
    where
        I: IntoIterator<Item = T>,
        T: Into<Operand>,
    {
        match self.in_list(list) {
            FilterExpr::In { operand, list, .. } => FilterExpr::In {
                operand,
                list,
                negated: true,
            },
            other => other,
        }
    }

    pub fn is_null(self) -> FilterExpr {
        FilterExpr::IsNull {
            operand: self.0,
            negated: false,
        }
    }

    pub fn is_not_null(self) -> FilterExpr {
        FilterExpr::IsNull {
            operand: self.0,
            negated: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_shapes() {
        let expr = FilterExpr::field("age")
            .gt(Operand::param("minAge"))
            .and(FilterExpr::field("name").eq("x"));

        assert_eq!(
            expr,
            FilterExpr::And(
                Box::new(FilterExpr::Compare {
                    left: Operand::Field("age".to_string()),
                    op: CompareOp::Gt,
                    right: Operand::Param("minAge".to_string()),
                }),
                Box::new(FilterExpr::Compare {
                    left: Operand::Field("name".to_string()),
                    op: CompareOp::Eq,
                    right: Operand::Literal(Value::Text("x".to_string())),
                }),
            )
        );
    }

    #[test]
    fn test_field_operand_on_right() {
        let expr = FilterExpr::field("shipped").gt(Operand::field("ordered"));
        assert!(matches!(
            expr,
            FilterExpr::Compare { right: Operand::Field(ref f), .. } if f == "ordered"
        ));
    }

    #[test]
    fn test_all_and_any() {
        assert_eq!(FilterExpr::all(Vec::new()), None);

        let a = FilterExpr::field("a").is_null();
        let b = FilterExpr::field("b").is_not_null();
        let c = FilterExpr::field("c").in_list([1, 2]);

        let all = FilterExpr::all([a.clone(), b.clone(), c.clone()]).unwrap();
        assert_eq!(all, a.clone().and(b.clone()).and(c.clone()));

        let any = FilterExpr::any([a.clone(), b.clone()]).unwrap();
        assert_eq!(any, a.or(b));
    }

    #[test]
    fn test_not_in() {
        let expr = FilterExpr::field("status").not_in(["closed", "void"]);
        assert!(matches!(expr, FilterExpr::In { negated: true, ref list, .. } if list.len() == 2));
    }
}
