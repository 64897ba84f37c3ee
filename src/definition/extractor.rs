// Schema extractor
// Turns a template SELECT into a QueryDefinition
// We use the sqlparser crate to split the statement into its clauses; the clause
// contents themselves are kept as opaque text

use super::{FieldDef, QueryDefinition, ValueType};
use crate::error::{Error, Result};
use sqlparser::ast::{GroupByExpr, Query, Select, SelectItem, SetExpr, Statement, TableWithJoins};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;
use tracing::{debug, warn};

/// Type tag used when an alias carries no `_<tag>` suffix
const DEFAULT_TYPE_TAG: &str = "object";

/// The schema extractor
pub struct SchemaExtractor;

impl SchemaExtractor {
    /// Parse template SQL into a QueryDefinition
    /// Nothing is returned unless every select item is valid
    pub fn extract(sql: &str) -> Result<QueryDefinition> {
        let dialect = GenericDialect {};
        let ast = Parser::parse_sql(&dialect, sql)?;

        if ast.len() != 1 {
            return Err(Error::UnsupportedStatement(format!(
                "expected a single SELECT statement, found {} statements",
                ast.len()
            )));
        }

        let query = match &ast[0] {
            Statement::Query(query) => query,
            other => {
                return Err(Error::UnsupportedStatement(format!(
                    "only SELECT is supported: {}",
                    other
                )))
            }
        };

        let select = Self::plain_select(query)?;

        let fields = select
            .projection
            .iter()
            .map(Self::to_field)
            .collect::<Result<Vec<_>>>()?;

        let schema_clause = Self::schema_clause(&select.from)?;
        let base_where = select.selection.as_ref().map(|expr| expr.to_string());
        let base_order_by = query.order_by.as_ref().and_then(|order_by| {
            if order_by.exprs.is_empty() {
                None
            } else {
                Some(
                    order_by
                        .exprs
                        .iter()
                        .map(|e| e.to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                )
            }
        });

        if query.limit.is_some() || query.offset.is_some() {
            warn!("ignoring LIMIT/OFFSET in query template; pagination comes from the criteria");
        }

        let definition =
            QueryDefinition::from_parts(fields, schema_clause, base_where, base_order_by)?;
        debug!(
            fields = definition.fields().len(),
            has_where = definition.where_clause().is_some(),
            has_order_by = definition.order_by_clause().is_some(),
            "built query definition"
        );
        Ok(definition)
    }

    /// Unwrap the plain SELECT body, rejecting anything we can't reproduce
    fn plain_select(query: &Query) -> Result<&Select> {
        if query.with.is_some() {
            return Err(Error::UnsupportedStatement(
                "WITH clauses are not supported in query templates".to_string(),
            ));
        }

        let select = match query.body.as_ref() {
            SetExpr::Select(select) => select.as_ref(),
            SetExpr::SetOperation { op, .. } => {
                return Err(Error::UnsupportedStatement(format!(
                    "set operation {} is not supported",
                    op
                )))
            }
            other => {
                return Err(Error::UnsupportedStatement(format!(
                    "only plain SELECT is supported: {}",
                    other
                )))
            }
        };

        // DISTINCT, TOP and grouping would all change what COUNT(*) and pagination mean
        if select.distinct.is_some() || select.top.is_some() {
            return Err(Error::UnsupportedStatement(
                "DISTINCT/TOP is not supported in query templates".to_string(),
            ));
        }

        let grouped = match &select.group_by {
            GroupByExpr::Expressions(exprs, ..) => !exprs.is_empty(),
            GroupByExpr::All(..) => true,
        };
        if grouped || select.having.is_some() {
            return Err(Error::UnsupportedStatement(
                "GROUP BY/HAVING is not supported in query templates".to_string(),
            ));
        }

        Ok(select)
    }

    /// Convert one select item into a field
    fn to_field(item: &SelectItem) -> Result<FieldDef> {
        match item {
            SelectItem::ExprWithAlias { expr, alias } => {
                let (name, value_type) = decode_alias(&alias.value)?;
                Ok(FieldDef::new(expr.to_string(), name, value_type))
            }
            other => Err(Error::MissingAlias {
                expression: other.to_string(),
            }),
        }
    }

    /// FROM item followed by its joins, one per line
    fn schema_clause(from: &[TableWithJoins]) -> Result<String> {
        if from.is_empty() {
            return Err(Error::UnsupportedStatement(
                "query template has no FROM clause".to_string(),
            ));
        }

        let groups: Vec<String> = from
            .iter()
            .map(|table| {
                let mut lines = vec![table.relation.to_string()];
                lines.extend(table.joins.iter().map(|j| j.to_string().trim().to_string()));
                lines.join("\n")
            })
            .collect();

        Ok(groups.join(",\n"))
    }
}

/// Split `<name>_<tag>` on its last underscore and resolve the tag
/// An alias without an underscore is an untyped `object` column
pub fn decode_alias(raw: &str) -> Result<(String, ValueType)> {
    let alias = unquote(raw);

    let (name, tag) = match alias.rsplit_once('_') {
        Some((name, tag)) => (name, tag),
        None => (alias, DEFAULT_TYPE_TAG),
    };

    let value_type = ValueType::from_tag(tag)?;
    Ok((unquote(name).to_string(), value_type))
}

fn unquote(s: &str) -> &str {
    s.trim_matches(|c| c == '"' || c == '\'' || c == '`')
}

#[cfg(test)]
mod tests {
    use super::*;

    const CUSTOMER_REPS: &str = "SELECT c.customerName AS customerName_string, \
         e.employeeNumber AS employeeRep_int, \
         o.addressLine1 AS employeeOffice, \
         o.country AS \"employeeCountry_string\" \
         FROM offices AS o \
         LEFT JOIN employees AS e ON o.officeCode = e.officeCode \
         LEFT JOIN customers AS c ON e.employeeNumber = c.salesRepEmployeeNumber \
         WHERE o.country = 'UG' \
         ORDER BY c.customerName, o.country DESC";

    #[test]
    fn test_decode_alias() {
        assert_eq!(
            decode_alias("total_int").unwrap(),
            ("total".to_string(), ValueType::Int)
        );
        assert_eq!(
            decode_alias("description").unwrap(),
            ("description".to_string(), ValueType::Object)
        );
        assert_eq!(
            decode_alias("first_name_string").unwrap(),
            ("first_name".to_string(), ValueType::String)
        );
        assert_eq!(
            decode_alias("\"price_decimal\"").unwrap(),
            ("price".to_string(), ValueType::Decimal)
        );
    }

    #[test]
    fn test_decode_alias_unknown_tag() {
        let err = decode_alias("first_name").unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { ref tag } if tag == "name"));
    }

    #[test]
    fn test_extract_fields_in_source_order() {
        let def = SchemaExtractor::extract(CUSTOMER_REPS).unwrap();

        let aliases: Vec<&str> = def.fields().iter().map(|f| f.alias.as_str()).collect();
        assert_eq!(
            aliases,
            vec!["customerName", "employeeRep", "employeeOffice", "employeeCountry"]
        );

        let types: Vec<ValueType> = def.fields().iter().map(|f| f.value_type).collect();
        assert_eq!(
            types,
            vec![
                ValueType::String,
                ValueType::Int,
                ValueType::Object,
                ValueType::String
            ]
        );

        assert_eq!(def.fields()[0].sql_expression, "c.customerName");
        assert_eq!(def.fields()[3].sql_expression, "o.country");
    }

    #[test]
    fn test_extract_clauses() {
        let def = SchemaExtractor::extract(CUSTOMER_REPS).unwrap();

        assert_eq!(
            def.schema(),
            "offices AS o\n\
             LEFT JOIN employees AS e ON o.officeCode = e.officeCode\n\
             LEFT JOIN customers AS c ON e.employeeNumber = c.salesRepEmployeeNumber"
        );
        assert_eq!(def.where_clause(), Some("o.country = 'UG'"));
        assert_eq!(def.order_by_clause(), Some("c.customerName, o.country DESC"));
    }

    #[test]
    fn test_extract_without_where_or_order() {
        let def = SchemaExtractor::extract("SELECT id AS id_long FROM users").unwrap();
        assert_eq!(def.fields().len(), 1);
        assert_eq!(def.schema(), "users");
        assert_eq!(def.where_clause(), None);
        assert_eq!(def.order_by_clause(), None);
    }

    #[test]
    fn test_function_expression_preserved() {
        let def = SchemaExtractor::extract(
            "SELECT COUNT(o.id) AS orders_long, UPPER(c.name) AS name_string \
             FROM customers c JOIN orders o ON o.customer_id = c.id",
        )
        .unwrap();
        assert_eq!(def.fields()[0].sql_expression, "COUNT(o.id)");
        assert_eq!(def.fields()[1].sql_expression, "UPPER(c.name)");
    }

    #[test]
    fn test_missing_alias() {
        let err = SchemaExtractor::extract("SELECT id AS id_int, name FROM users").unwrap_err();
        assert!(matches!(err, Error::MissingAlias { ref expression } if expression == "name"));

        let err = SchemaExtractor::extract("SELECT * FROM users").unwrap_err();
        assert!(matches!(err, Error::MissingAlias { .. }));
    }

    #[test]
    fn test_empty_field_name() {
        let err = SchemaExtractor::extract("SELECT c.id AS _int FROM customers c").unwrap_err();
        assert!(matches!(err, Error::MissingAlias { ref expression } if expression == "c.id"));
    }

    #[test]
    fn test_unsupported_type_aborts_extraction() {
        let err = SchemaExtractor::extract("SELECT id AS id_uuid FROM users").unwrap_err();
        assert!(matches!(err, Error::UnsupportedType { ref tag } if tag == "uuid"));
    }

    #[test]
    fn test_duplicate_alias() {
        let err =
            SchemaExtractor::extract("SELECT a.id AS id_int, b.id AS id_long FROM a, b").unwrap_err();
        assert!(matches!(err, Error::DuplicateAlias { ref alias } if alias == "id"));
    }

    #[test]
    fn test_unsupported_statements() {
        let cases = [
            "INSERT INTO users VALUES (1, 'Alice')",
            "SELECT id AS id_int FROM a; SELECT id AS id_int FROM b",
            "SELECT id AS id_int FROM a UNION SELECT id AS id_int FROM b",
            "SELECT status AS status_string FROM orders GROUP BY status",
            "SELECT DISTINCT c.country AS country_string FROM customers c",
        ];

        for sql in cases {
            let err = SchemaExtractor::extract(sql).unwrap_err();
            assert!(
                matches!(err, Error::UnsupportedStatement(_)),
                "{} should be rejected, got {:?}",
                sql,
                err
            );
        }
    }

    #[test]
    fn test_syntax_error() {
        let err = SchemaExtractor::extract("SELEKT id AS id_int FROM users").unwrap_err();
        assert!(matches!(err, Error::TemplateSyntax(_)));
    }
}
