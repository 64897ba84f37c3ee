// Example: declare a query template once and compile several requests against it
// Run with: cargo run --example basic_usage

use rustyquery::{Criteria, FilterExpr, Operand, QueryDefinition, Sort};

fn main() -> anyhow::Result<()> {
    println!("=== RustyQuery Basic Usage Example ===\n");

    // 1. Build the definition once
    println!("1. Extracting the definition from a template...");
    let definition = QueryDefinition::from_sql(
        "SELECT c.customerNumber AS id_long, \
                c.customerName AS name_string, \
                c.creditLimit AS creditLimit_decimal, \
                o.country AS country_string \
         FROM customers AS c \
         LEFT JOIN offices AS o ON o.officeCode = c.officeCode \
         WHERE c.active = 1 \
         ORDER BY c.customerName",
    )?;
    for field in definition.fields() {
        println!("  {} ({}) <- {}", field.alias, field.value_type, field.sql_expression);
    }
    println!();

    // 2. Everything, first page
    println!("2. Selecting all fields...");
    let query = definition.query(&Criteria::select_all())?;
    println!("{}\n-- params: {:?}\n", query.sql, query.params);

    // 3. A projection with a text filter and a named parameter
    println!("3. Selecting two columns with a filter...");
    let criteria = Criteria::select(["name", "creditLimit"])
        .where_text("creditLimit >= :minCredit AND country IN ('UG', 'KE')")
        .set_param("minCredit", 5000)
        .order_by(Sort::desc("creditLimit"))
        .limit_offset(10, 20);
    let query = definition.query(&criteria)?;
    println!("{}\n-- params: {:?}\n", query.sql, query.params);

    // 4. The same filter built by hand, counted
    println!("4. Counting with a programmatic filter...");
    let filter = FilterExpr::field("creditLimit")
        .ge(Operand::param("minCredit"))
        .and(FilterExpr::field("country").in_list(["UG", "KE"]));
    let count = Criteria::select_count()
        .where_expr(filter)
        .set_param("minCredit", 5000);
    let query = definition.query(&count)?;
    println!("{}\n-- params: {:?}\n", query.sql, query.params);

    // 5. Errors are reported per request; the definition stays usable
    println!("5. Referencing an unknown field...");
    match definition.query(&Criteria::select(["email"])) {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("Error: {}\n", e),
    }

    println!("=== Example Complete ===");
    Ok(())
}
