// Definition module - the compiled shape of a template SELECT
// A QueryDefinition is built once and then shared by every request compiled against it

pub mod extractor;
pub mod types;

use crate::error::{Error, Result};
use crate::query::{compiler, Criteria, QueryAndParams};
use serde::{Deserialize, Serialize};

pub use extractor::SchemaExtractor;
pub use types::ValueType;

/// One output column of a query
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldDef {
    /// Source fragment, reproduced as-is in SELECT, WHERE and ORDER BY
    pub sql_expression: String,
    pub alias: String,
    pub value_type: ValueType,
}

impl FieldDef {
    pub fn new(
        sql_expression: impl Into<String>,
        alias: impl Into<String>,
        value_type: ValueType,
    ) -> Self {
        Self {
            sql_expression: sql_expression.into(),
            alias: alias.into(),
            value_type,
        }
    }
}

/// Immutable representation of a template SELECT
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryDefinition {
    fields: Vec<FieldDef>,
    schema_clause: String,
    base_where: Option<String>,
    base_order_by: Option<String>,
}

impl QueryDefinition {
    /// Extract a definition from template SQL
    pub fn from_sql(sql: &str) -> Result<Self> {
        SchemaExtractor::extract(sql)
    }

    /// Assemble a definition from already known parts
    /// Fails if a field has an empty alias or two fields share one
    pub fn from_parts(
        fields: Vec<FieldDef>,
        schema_clause: impl Into<String>,
        base_where: Option<String>,
        base_order_by: Option<String>,
    ) -> Result<Self> {
        for (i, field) in fields.iter().enumerate() {
            if field.alias.is_empty() {
                return Err(Error::MissingAlias {
                    expression: field.sql_expression.clone(),
                });
            }
            if fields[..i].iter().any(|f| f.alias == field.alias) {
                return Err(Error::DuplicateAlias {
                    alias: field.alias.clone(),
                });
            }
        }

        Ok(Self {
            fields,
            schema_clause: schema_clause.into(),
            base_where,
            base_order_by,
        })
    }

    /// Fields in declaration order
    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    /// Raw FROM + JOIN text
    pub fn schema(&self) -> &str {
        &self.schema_clause
    }

    pub fn where_clause(&self) -> Option<&str> {
        self.base_where.as_deref()
    }

    pub fn order_by_clause(&self) -> Option<&str> {
        self.base_order_by.as_deref()
    }

    /// Find a field by its alias
    pub fn field(&self, alias: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.alias == alias)
    }

    /// Compile a request against this definition
    pub fn query(&self, criteria: &Criteria) -> Result<QueryAndParams> {
        compiler::compile(self, criteria)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_rejects_duplicate_alias() {
        let fields = vec![
            FieldDef::new("c.id", "id", ValueType::Long),
            FieldDef::new("o.id", "id", ValueType::Long),
        ];
        let err = QueryDefinition::from_parts(fields, "customers c", None, None).unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias { ref alias } if alias == "id"));
    }

    #[test]
    fn test_from_parts_rejects_empty_alias() {
        let fields = vec![FieldDef::new("c.id", "", ValueType::Long)];
        let err = QueryDefinition::from_parts(fields, "customers c", None, None).unwrap_err();
        assert!(matches!(err, Error::MissingAlias { ref expression } if expression == "c.id"));
    }

    #[test]
    fn test_field_lookup() {
        let def = QueryDefinition::from_parts(
            vec![FieldDef::new("c.name", "name", ValueType::String)],
            "customers c",
            Some("c.active = 1".to_string()),
            None,
        )
        .unwrap();

        assert_eq!(def.field("name").unwrap().sql_expression, "c.name");
        assert!(def.field("missing").is_none());
        assert_eq!(def.schema(), "customers c");
        assert_eq!(def.where_clause(), Some("c.active = 1"));
        assert_eq!(def.order_by_clause(), None);
    }
}
