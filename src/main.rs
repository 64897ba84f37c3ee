// Main entry point for the RustyQuery CLI
// Loads a query template, then prints its definition, compiles one request,
// or opens an interactive shell that compiles filter text line by line

use anyhow::{anyhow, Context, Result};
use clap::Parser as ClapParser;
use rustyquery::{Criteria, DefinitionSink, JsonSink, QueryAndParams, QueryDefinition, Value};
use std::io::{self, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// RustyQuery - compile query requests against a SELECT template
#[derive(ClapParser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a .sql file holding the query template
    template: Option<PathBuf>,

    /// Inline query template, instead of a file
    #[arg(long, conflicts_with = "template")]
    sql: Option<String>,

    /// Print the extracted definition as JSON and exit
    #[arg(short, long)]
    definition: bool,

    /// Start an interactive shell that compiles filter text
    #[arg(short, long)]
    interactive: bool,

    /// Columns to select, comma separated (default: all)
    #[arg(long, value_delimiter = ',')]
    select: Vec<String>,

    /// Filter expression; repeat to AND several together
    #[arg(short, long = "where")]
    filters: Vec<String>,

    /// Sort list, e.g. "name desc, age"
    #[arg(long)]
    order_by: Option<String>,

    /// Maximum number of rows
    #[arg(long, default_value_t = 50, value_parser = clap::value_parser!(u64).range(1..))]
    limit: u64,

    /// Number of rows to skip
    #[arg(long, default_value_t = 0)]
    offset: u64,

    /// Count matching rows instead of selecting them
    #[arg(long)]
    count: bool,

    /// Named parameter binding, e.g. --param minAge=18
    #[arg(short, long = "param", value_parser = parse_param)]
    params: Vec<(String, Value)>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let (name, template) = load_template(&args)?;
    let definition = QueryDefinition::from_sql(&template)
        .with_context(|| format!("invalid query template '{}'", name))?;

    if args.definition {
        println!("{}", JsonSink::pretty().emit(&name, &definition)?);
        return Ok(());
    }

    let criteria = build_criteria(&args)?;

    if args.interactive {
        println!("╔════════════════════════════════════════════╗");
        println!("║        RustyQuery Interactive Shell        ║");
        println!("╚════════════════════════════════════════════╝");
        println!();
        println!("Template '{}' with {} field(s)", name, definition.fields().len());
        println!("Type a filter expression or '.help' for help");
        println!("Type '.exit' to quit");
        println!();

        return repl(&definition, |filter| {
            execute_filter(&definition, &criteria, filter)
        });
    }

    print_query(&definition.query(&criteria)?)
}

/// Read the template from the file argument or --sql
fn load_template(args: &Args) -> Result<(String, String)> {
    match (&args.template, &args.sql) {
        (Some(path), _) => {
            let sql = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "query".to_string());
            Ok((name, sql))
        }
        (None, Some(sql)) => Ok(("query".to_string(), sql.clone())),
        (None, None) => Err(anyhow!("a template file or --sql is required")),
    }
}

/// Build the request described by the command-line flags
fn build_criteria(args: &Args) -> Result<Criteria> {
    let mut criteria = Criteria::select(args.select.iter().map(|s| s.trim()))
        .limit_offset(args.limit, args.offset);

    for filter in &args.filters {
        criteria = criteria.where_text(filter.as_str());
    }

    if let Some(order_by) = &args.order_by {
        criteria = criteria.order_by_text(order_by)?;
    }

    for (name, value) in &args.params {
        criteria = criteria.set_param(name, value.clone());
    }

    if args.count {
        criteria = criteria.count();
    }

    Ok(criteria)
}

/// Parse `name=value`, inferring the value's type
fn parse_param(raw: &str) -> std::result::Result<(String, Value), String> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected name=value, got '{}'", raw))?;
    Ok((name.trim().to_string(), Value::infer(value.trim())))
}

/// REPL (Read-Eval-Print Loop) over filter expressions
fn repl<F>(definition: &QueryDefinition, mut execute_fn: F) -> Result<()>
where
    F: FnMut(&str) -> Result<()>,
{
    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("rustyquery> ");
        stdout.flush()?;

        let mut input = String::new();
        if stdin.read_line(&mut input)? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        if input.starts_with('.') {
            match input {
                ".exit" | ".quit" => {
                    println!("Goodbye!");
                    break;
                }
                ".help" => print_help(),
                ".fields" => print_fields(definition),
                _ => {
                    println!("Unknown command: {}", input);
                    println!("Type '.help' for help");
                }
            }
            continue;
        }

        if let Err(e) = execute_fn(input) {
            eprintln!("Error: {}", e);
        }
    }

    Ok(())
}

/// Compile the base request plus one filter typed in the shell
fn execute_filter(definition: &QueryDefinition, criteria: &Criteria, filter: &str) -> Result<()> {
    let compiled = definition.query(&criteria.where_text(filter))?;
    print_query(&compiled)
}

fn print_query(compiled: &QueryAndParams) -> Result<()> {
    println!("{}", compiled.sql);
    println!("-- params: {}", serde_json::to_string(&compiled.params)?);
    Ok(())
}

fn print_fields(definition: &QueryDefinition) {
    for field in definition.fields() {
        println!(
            "  {:<20} {:<8} {}",
            field.alias, field.value_type, field.sql_expression
        );
    }
}

/// Print help information
fn print_help() {
    println!("Special Commands:");
    println!("  .help              Show this help message");
    println!("  .fields            List the template's fields");
    println!("  .exit, .quit       Exit the shell");
    println!();
    println!("Filter expressions:");
    println!("  age > 18");
    println!("  name LIKE 'A%' AND (city = :city OR city IS NULL)");
    println!("  status NOT IN ('closed', 'void')");
    println!();
    println!("Notes:");
    println!("  - Keywords are case-insensitive");
    println!("  - Field names are the template aliases without their type suffix");
    println!("  - :name parameters are bound with --param name=value");
    println!();
}
