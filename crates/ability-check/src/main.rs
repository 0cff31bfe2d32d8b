//! Ability Check
//!
//! Loads a JSON rule document and answers one query against it: the decision
//! for an instance, or the compiled SQL predicate and joins for a type.
//!
//! # Usage
//!
//! ```bash
//! ability-check rules.json read Article --table articles
//! ability-check rules.json destroy Article --instance '{"locked": true}'
//! ```

use std::path::PathBuf;

use ability::{Ability, AnsiSqlEscaper, Joins, Record, Subject};
use clap::Parser;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "ability-check")]
#[command(about = "Evaluate a query against an Ability rule document")]
struct Args {
    /// Path to the JSON rule document
    rules: PathBuf,

    /// Action to check, e.g. "read"
    action: String,

    /// Subject type, or "all"
    subject: String,

    /// JSON object describing an instance of the subject type
    #[arg(short, long)]
    instance: Option<String>,

    /// Table qualifying top-level columns in the rendered SQL
    #[arg(short, long)]
    table: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let filter = if args.verbose {
        "ability_check=trace,ability=trace"
    } else {
        "ability_check=info,ability=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let document: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&args.rules)?)?;
    let ability = Ability::from_json(&document)?;
    info!(rules = ability.ruleset().len(), path = %args.rules.display(), "loaded rules");

    match &args.instance {
        Some(instance) => {
            let record = Record::from_json(&args.subject, &serde_json::from_str(instance)?)?;
            debug!(?record, "checking instance");
            let allowed = ability.allows(&args.action, &record)?;
            println!("{}", if allowed { "allowed" } else { "denied" });
        }
        None => {
            let subject = Subject::from(args.subject.as_str());
            let escaper = match &args.table {
                Some(table) => AnsiSqlEscaper::new(table.as_str()),
                None => AnsiSqlEscaper::unqualified(),
            };
            println!("allowed: {}", ability.allows(&args.action, subject)?);
            if ability.has_predicate(&args.action, subject) {
                println!("sql: <undeterminable: predicate rule>");
                return Ok(());
            }
            match ability.sql_conditions(&args.action, subject, &escaper)? {
                Some(sql) => println!("sql: {sql}"),
                None => println!("sql: <no relevant rules>"),
            }
            if let Some(joins) = ability.association_joins(&args.action, subject)? {
                println!("joins: {}", render_joins(&joins));
            }
        }
    }

    Ok(())
}

/// Renders joins as `a(b, c), d`.
fn render_joins(joins: &Joins) -> String {
    joins
        .relations()
        .map(|(relation, nested)| {
            if nested.is_empty() {
                relation.to_string()
            } else {
                format!("{relation}({})", render_joins(nested))
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}
