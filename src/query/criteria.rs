// Criteria - one request against a query definition
// A Criteria is never modified in place: every builder method returns a new value,
// so a base criteria can be shared between threads and branched freely

use super::expr_parser::ParseError;
use super::filter::FilterExpr;
use crate::error::Result;
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

pub const DEFAULT_LIMIT: u64 = 50;

/// One filter condition; all conditions of a criteria are ANDed
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Expr(FilterExpr),
    /// Filter text, parsed when the criteria is compiled
    Text(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Asc => f.write_str("ASC"),
            Direction::Desc => f.write_str("DESC"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Sort {
    pub field: String,
    pub direction: Direction,
}

impl Sort {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: Direction::Desc,
        }
    }

    /// Parse a sort list such as `name desc, age`
    /// A missing direction means ascending
    pub fn parse(text: &str) -> Result<Vec<Sort>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let mut sorts = Vec::new();
        let mut offset = 0;

        for segment in text.split(',') {
            let error = |message: &str| ParseError {
                position: offset,
                remainder: text[offset..].to_string(),
                message: message.to_string(),
            };

            let words: Vec<&str> = segment.split_whitespace().collect();
            let sort = match words.as_slice() {
                [field] => Sort::asc(*field),
                [field, dir] if dir.eq_ignore_ascii_case("asc") => Sort::asc(*field),
                [field, dir] if dir.eq_ignore_ascii_case("desc") => Sort::desc(*field),
                [] => return Err(error("expected a field to sort by").into()),
                _ => return Err(error("expected `<field> [asc|desc]`").into()),
            };

            sorts.push(sort);
            offset += segment.len() + 1;
        }

        Ok(sorts)
    }
}

/// A query request: projection, filters, sorting, paging and parameter bindings
#[derive(Debug, Clone, PartialEq)]
pub struct Criteria {
    columns: Vec<String>,
    conditions: Vec<Condition>,
    sorts: Vec<Sort>,
    offset: u64,
    limit: u64,
    count: bool,
    params: BTreeMap<String, Value>,
}

impl Default for Criteria {
    fn default() -> Self {
        Self {
            columns: Vec::new(),
            conditions: Vec::new(),
            sorts: Vec::new(),
            offset: 0,
            limit: DEFAULT_LIMIT,
            count: false,
            params: BTreeMap::new(),
        }
    }
}

impl Criteria {
    /// Every field of the definition, in definition order
    pub fn select_all() -> Self {
        Self::default()
    }

    /// Only the given aliases, in the given order
    pub fn select<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::default().add_select(columns)
    }

    /// A row count instead of rows
    pub fn select_count() -> Self {
        Self::default().count()
    }

    #[must_use]
    pub fn add_select<I, S>(&self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut next = self.clone();
        next.columns.extend(columns.into_iter().map(Into::into));
        next
    }

    /// Add a condition; conditions are ANDed together
    #[must_use]
    pub fn where_expr(&self, expr: FilterExpr) -> Self {
        let mut next = self.clone();
        next.conditions.push(Condition::Expr(expr));
        next
    }

    /// Add a condition written as filter text
    /// The text is parsed when the criteria is compiled
    #[must_use]
    pub fn where_text(&self, text: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.conditions.push(Condition::Text(text.into()));
        next
    }

    #[must_use]
    pub fn order_by(&self, sort: Sort) -> Self {
        let mut next = self.clone();
        next.sorts.push(sort);
        next
    }

    /// Append sorts parsed from text like `name desc, age`
    pub fn order_by_text(&self, text: &str) -> Result<Self> {
        let mut next = self.clone();
        next.sorts.extend(Sort::parse(text)?);
        Ok(next)
    }

    #[must_use]
    pub fn offset(&self, offset: u64) -> Self {
        let mut next = self.clone();
        next.offset = offset;
        next
    }

    /// # Panics
    ///
    /// Panics if `limit` is zero
    #[must_use]
    pub fn limit(&self, limit: u64) -> Self {
        if limit == 0 {
            panic!("limit must be at least 1");
        }

        let mut next = self.clone();
        next.limit = limit;
        next
    }

    #[must_use]
    pub fn limit_offset(&self, limit: u64, offset: u64) -> Self {
        self.limit(limit).offset(offset)
    }

    #[must_use]
    pub fn count(&self) -> Self {
        let mut next = self.clone();
        next.count = true;
        next
    }

    /// Bind a named parameter; a leading `:` on the name is ignored
    #[must_use]
    pub fn set_param(&self, name: &str, value: impl Into<Value>) -> Self {
        let mut next = self.clone();
        next.params
            .insert(name.trim_start_matches(':').to_string(), value.into());
        next
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn sorts(&self) -> &[Sort] {
        &self.sorts
    }

    pub fn get_offset(&self) -> u64 {
        self.offset
    }

    pub fn get_limit(&self) -> u64 {
        self.limit
    }

    pub fn is_count(&self) -> bool {
        self.count
    }

    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.get(name)
    }

    pub fn params(&self) -> &BTreeMap<String, Value> {
        &self.params
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_defaults() {
        let c = Criteria::select_all();
        assert!(c.columns().is_empty());
        assert!(c.conditions().is_empty());
        assert!(c.sorts().is_empty());
        assert_eq!(c.get_offset(), 0);
        assert_eq!(c.get_limit(), 50);
        assert!(!c.is_count());
    }

    #[test]
    fn test_mutators_leave_receiver_unchanged() {
        let c1 = Criteria::select_all();
        let c2 = c1.limit(10);
        assert_eq!(c1.get_limit(), 50);
        assert_eq!(c2.get_limit(), 10);

        let c3 = c2
            .offset(20)
            .count()
            .add_select(["name"])
            .where_text("age > 1")
            .order_by(Sort::desc("age"))
            .set_param("minAge", 18);
        assert_eq!(c2, Criteria::select_all().limit(10));
        assert_eq!(c3.get_offset(), 20);
        assert!(c3.is_count());
        assert_eq!(c3.columns(), ["name".to_string()]);
        assert_eq!(c3.conditions().len(), 1);
        assert_eq!(c3.sorts(), [Sort::desc("age")]);
        assert_eq!(c3.param("minAge"), Some(&Value::Integer(18)));
    }

    #[test]
    fn test_branching() {
        let base = Criteria::select(["name", "age"]).where_text("age > 18");
        let page1 = base.limit_offset(10, 0);
        let page2 = base.limit_offset(10, 10);
        assert_eq!(base.get_limit(), 50);
        assert_eq!(page1.get_offset(), 0);
        assert_eq!(page2.get_offset(), 10);
        assert_eq!(page1.conditions(), base.conditions());
    }

    #[test]
    fn test_set_param_strips_sigil() {
        let c = Criteria::select_all().set_param(":city", "Kampala");
        assert_eq!(c.param("city"), Some(&Value::from("Kampala")));
    }

    #[test]
    #[should_panic(expected = "limit must be at least 1")]
    fn test_zero_limit_panics() {
        let _ = Criteria::select_all().limit(0);
    }

    #[test]
    fn test_sort_parse() {
        assert_eq!(
            Sort::parse("name desc, age").unwrap(),
            vec![Sort::desc("name"), Sort::asc("age")]
        );
        assert_eq!(Sort::parse("  ").unwrap(), Vec::<Sort>::new());

        let c = Criteria::select_all()
            .order_by(Sort::asc("id"))
            .order_by_text("total DESC")
            .unwrap();
        assert_eq!(c.sorts(), [Sort::asc("id"), Sort::desc("total")]);
    }

    #[test]
    fn test_sort_parse_errors() {
        let err = Sort::parse("name, age sideways").unwrap_err();
        match err {
            Error::Parse(e) => {
                assert_eq!(e.position, 5);
                assert_eq!(e.remainder, " age sideways");
            }
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(Sort::parse("name,").is_err());
    }
}
