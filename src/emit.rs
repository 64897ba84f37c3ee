// Definition sinks
// A sink receives a finished QueryDefinition and renders it for some consumer,
// e.g. a code generator. The crate ships a JSON sink.

use crate::definition::QueryDefinition;
use crate::error::Result;
use serde::Serialize;

/// Receives named query definitions
pub trait DefinitionSink {
    type Output;

    fn emit(&mut self, name: &str, definition: &QueryDefinition) -> Result<Self::Output>;
}

/// Renders a definition as a JSON document
#[derive(Debug, Default, Clone)]
pub struct JsonSink {
    pub pretty: bool,
}

#[derive(Serialize)]
struct Document<'a> {
    name: &'a str,
    #[serde(flatten)]
    definition: &'a QueryDefinition,
}

impl JsonSink {
    pub fn pretty() -> Self {
        Self { pretty: true }
    }
}

impl DefinitionSink for JsonSink {
    type Output = String;

    fn emit(&mut self, name: &str, definition: &QueryDefinition) -> Result<String> {
        let document = Document { name, definition };
        let json = if self.pretty {
            serde_json::to_string_pretty(&document)?
        } else {
            serde_json::to_string(&document)?
        };
        Ok(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_sink() {
        let def = QueryDefinition::from_sql(
            "SELECT o.id AS id_long, o.total AS total_decimal FROM orders AS o WHERE o.total > 0",
        )
        .unwrap();

        let json = JsonSink::default().emit("Orders", &def).unwrap();
        let doc: serde_json::Value = serde_json::from_str(&json).unwrap();

        assert_eq!(doc["name"], "Orders");
        assert_eq!(doc["schema_clause"], "orders AS o");
        assert_eq!(doc["base_where"], "o.total > 0");
        assert!(doc["base_order_by"].is_null());
        assert_eq!(doc["fields"][1]["alias"], "total");
        assert_eq!(doc["fields"][1]["value_type"], "decimal");
        assert_eq!(doc["fields"][1]["sql_expression"], "o.total");
    }
}
