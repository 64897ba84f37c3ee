// Criteria compiler
// Combines a QueryDefinition and a Criteria into final SQL text and the ordered
// list of values for its `?` placeholders

use super::criteria::{Condition, Criteria};
use super::filter::{FilterExpr, Operand};
use crate::definition::{FieldDef, QueryDefinition};
use crate::error::{Error, Result};
use crate::value::Value;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::debug;

const COUNT_PROJECTION: &str = "COUNT(*)";

/// Deepest filter tree the writer will walk
pub const MAX_FILTER_DEPTH: usize = 256;

/// Compiled SQL plus its parameters
/// `params[i]` binds the i-th `?` of `sql`, counting from the left
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryAndParams {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compile a request against a definition
/// Either the whole statement is produced or an error is returned
pub fn compile(definition: &QueryDefinition, criteria: &Criteria) -> Result<QueryAndParams> {
    let fields = definition.fields();

    // Projection, in the caller's order when columns were requested
    let projection: Vec<&FieldDef> = if criteria.columns().is_empty() {
        fields.iter().collect()
    } else {
        criteria
            .columns()
            .iter()
            .map(|alias| resolve_field(fields, alias))
            .collect::<Result<_>>()?
    };

    let select_clause = if criteria.is_count() {
        COUNT_PROJECTION.to_string()
    } else {
        projection
            .iter()
            .map(|f| format!("{} AS {}", f.sql_expression, f.alias))
            .collect::<Vec<_>>()
            .join(", ")
    };

    // Conditions are ANDed left to right
    let conditions = criteria
        .conditions()
        .iter()
        .map(|condition| match condition {
            Condition::Expr(expr) => Ok(expr.clone()),
            Condition::Text(text) => FilterExpr::parse(text),
        })
        .collect::<Result<Vec<_>>>()?;

    let mut writer = FilterWriter::new(fields, criteria.params());
    let extra = match FilterExpr::all(conditions) {
        Some(expr) => {
            writer.write_expr(&expr)?;
            Some(writer.sql)
        }
        None => None,
    };
    let params = writer.params;

    let predicate = match (definition.where_clause(), extra) {
        (Some(base), Some(extra)) => Some(format!("({}) AND ({})", base, extra)),
        (Some(base), None) => Some(base.to_string()),
        (None, Some(extra)) => Some(extra),
        (None, None) => None,
    };

    let mut clauses = vec![
        format!("SELECT {}", select_clause),
        format!("FROM {}", definition.schema()),
    ];

    if let Some(predicate) = predicate {
        clauses.push(format!("WHERE {}", predicate));
    }

    if !criteria.is_count() {
        // Explicit sorts replace the template's ORDER BY entirely
        let order_by = if criteria.sorts().is_empty() {
            definition.order_by_clause().map(str::to_string)
        } else {
            let sorts = criteria
                .sorts()
                .iter()
                .map(|sort| {
                    let field = resolve_field(fields, &sort.field)?;
                    Ok(format!("{} {}", field.sql_expression, sort.direction))
                })
                .collect::<Result<Vec<_>>>()?;
            Some(sorts.join(", "))
        };

        if let Some(order_by) = order_by {
            clauses.push(format!("ORDER BY {}", order_by));
        }

        clauses.push(format!(
            "LIMIT {} OFFSET {}",
            criteria.get_limit(),
            criteria.get_offset()
        ));
    }

    let compiled = QueryAndParams {
        sql: clauses.join("\n"),
        params,
    };

    debug!(
        params = compiled.params.len(),
        count = criteria.is_count(),
        "compiled criteria"
    );
    Ok(compiled)
}

/// Compile standalone filter text against a field list
/// The result holds only the predicate, without SELECT or FROM
pub fn compile_filter(
    fields: &[FieldDef],
    text: &str,
    bindings: &BTreeMap<String, Value>,
) -> Result<QueryAndParams> {
    let expr = FilterExpr::parse(text)?;
    let mut writer = FilterWriter::new(fields, bindings);
    writer.write_expr(&expr)?;

    Ok(QueryAndParams {
        sql: writer.sql,
        params: writer.params,
    })
}

fn resolve_field<'a>(fields: &'a [FieldDef], alias: &str) -> Result<&'a FieldDef> {
    fields
        .iter()
        .find(|f| f.alias == alias)
        .ok_or_else(|| Error::UnknownField {
            alias: alias.to_string(),
        })
}

/// Which logical combinator a node is, for deciding on parentheses
#[derive(Clone, Copy, PartialEq, Eq)]
enum Combinator {
    And,
    Or,
}

fn combinator(expr: &FilterExpr) -> Option<Combinator> {
    match expr {
        FilterExpr::And(..) => Some(Combinator::And),
        FilterExpr::Or(..) => Some(Combinator::Or),
        _ => None,
    }
}

/// Writes a filter tree as SQL, collecting parameters in placeholder order
struct FilterWriter<'a> {
    fields: &'a [FieldDef],
    bindings: &'a BTreeMap<String, Value>,
    sql: String,
    params: Vec<Value>,
    depth: usize,
}

impl<'a> FilterWriter<'a> {
    fn new(fields: &'a [FieldDef], bindings: &'a BTreeMap<String, Value>) -> Self {
        Self {
            fields,
            bindings,
            sql: String::new(),
            params: Vec::new(),
            depth: 0,
        }
    }

    fn write_expr(&mut self, expr: &FilterExpr) -> Result<()> {
        if self.depth >= MAX_FILTER_DEPTH {
            return Err(Error::FilterTooDeep {
                limit: MAX_FILTER_DEPTH,
            });
        }
        self.depth += 1;
        self.write_node(expr)?;
        self.depth -= 1;
        Ok(())
    }

    fn write_node(&mut self, expr: &FilterExpr) -> Result<()> {
        match expr {
            FilterExpr::Compare { left, op, right } => {
                self.write_operand(left)?;
                self.sql.push_str(&format!(" {} ", op));
                self.write_operand(right)?;
            }
            FilterExpr::In {
                operand,
                list,
                negated,
            } if list.is_empty() => {
                // Nothing is in an empty list; the operand is still checked
                if let Operand::Field(alias) = operand {
                    resolve_field(self.fields, alias)?;
                }
                self.sql.push_str(if *negated { "1 = 1" } else { "1 = 0" });
            }
            FilterExpr::In {
                operand,
                list,
                negated,
            } => {
                self.write_operand(operand)?;
                self.sql.push_str(if *negated { " NOT IN (" } else { " IN (" });
                for (i, item) in list.iter().enumerate() {
                    if i > 0 {
                        self.sql.push_str(", ");
                    }
                    self.write_operand(item)?;
                }
                self.sql.push(')');
            }
            FilterExpr::IsNull { operand, negated } => {
                self.write_operand(operand)?;
                self.sql
                    .push_str(if *negated { " IS NOT NULL" } else { " IS NULL" });
            }
            FilterExpr::And(left, right) => self.write_binary(left, right, Combinator::And)?,
            FilterExpr::Or(left, right) => self.write_binary(left, right, Combinator::Or)?,
            FilterExpr::Not(inner) => {
                self.sql.push_str("NOT (");
                self.write_expr(inner)?;
                self.sql.push(')');
            }
        }
        Ok(())
    }

    fn write_binary(
        &mut self,
        left: &FilterExpr,
        right: &FilterExpr,
        parent: Combinator,
    ) -> Result<()> {
        // AND binds tighter than OR, and both chain to the left
        let wrap_left = parent == Combinator::And && combinator(left) == Some(Combinator::Or);
        let wrap_right = match combinator(right) {
            Some(child) => child == parent || child == Combinator::Or,
            None => false,
        };

        self.write_child(left, wrap_left)?;
        self.sql.push_str(match parent {
            Combinator::And => " AND ",
            Combinator::Or => " OR ",
        });
        self.write_child(right, wrap_right)
    }

    fn write_child(&mut self, expr: &FilterExpr, wrap: bool) -> Result<()> {
        if wrap {
            self.sql.push('(');
            self.write_expr(expr)?;
            self.sql.push(')');
            Ok(())
        } else {
            self.write_expr(expr)
        }
    }

    fn write_operand(&mut self, operand: &Operand) -> Result<()> {
        match operand {
            Operand::Literal(value) => {
                self.sql.push('?');
                self.params.push(value.clone());
            }
            Operand::Param(name) => {
                let value = self
                    .bindings
                    .get(name)
                    .ok_or_else(|| Error::ParameterBinding { name: name.clone() })?;
                self.sql.push('?');
                self.params.push(value.clone());
            }
            Operand::Field(alias) => {
                let field = resolve_field(self.fields, alias)?;
                self.sql.push_str(&field.sql_expression);
            }
        }
        Ok(())
    }
}
