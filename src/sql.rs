//! Rendering compiled predicates into SQL.
//!
//! The engine never writes SQL itself. It hands every leaf condition tree and
//! the two boolean constants to an [`Escaper`] supplied by the host, and
//! only glues the resulting fragments together.

use std::collections::BTreeMap;

use crate::conditions::{Condition, Conditions};
use crate::value::Value;

/// Escapes structured conditions into a backend's native expression syntax.
pub trait Escaper {
    /// Renders one condition tree. Relation keys have already been renamed
    /// with [`Escaper::table_name`].
    fn escape_conditions(&self, conditions: &Conditions) -> String;

    /// Renders the constant `TRUE` or `FALSE` expression.
    fn escape_literal(&self, value: bool) -> String;

    /// Maps a relation name to the table it is stored in.
    fn table_name(&self, relation: &str) -> String {
        relation.to_string()
    }
}

/// A reference [`Escaper`] producing ANSI SQL.
///
/// # Example
///
/// ```
/// use ability::{AnsiSqlEscaper, Conditions, Escaper};
///
/// let escaper = AnsiSqlEscaper::new("articles");
/// let sql = escaper.escape_conditions(&Conditions::new().equal("author_id", 3));
/// assert_eq!(sql, r#""articles"."author_id" = 3"#);
/// assert_eq!(escaper.escape_literal(false), "'t'='f'");
/// ```
#[derive(Debug, Clone, Default)]
pub struct AnsiSqlEscaper {
    table: Option<String>,
    table_names: BTreeMap<String, String>,
}

impl AnsiSqlEscaper {
    /// Creates an escaper qualifying top-level columns with `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: Some(table.into()),
            table_names: BTreeMap::new(),
        }
    }

    /// Creates an escaper emitting unqualified top-level columns.
    pub fn unqualified() -> Self {
        Self::default()
    }

    /// Stores `relation` in `table` instead of a table of the same name.
    pub fn with_table_name(
        mut self,
        relation: impl Into<String>,
        table: impl Into<String>,
    ) -> Self {
        self.table_names.insert(relation.into(), table.into());
        self
    }

    fn render(&self, table: Option<&str>, conditions: &Conditions, out: &mut Vec<String>) {
        for (name, condition) in conditions {
            let column = match table {
                Some(table) => format!("{}.{}", quote_ident(table), quote_ident(name)),
                None => quote_ident(name),
            };
            match condition {
                Condition::Eq(Value::Null) => out.push(format!("{column} IS NULL")),
                Condition::Eq(value) => out.push(format!("{column} = {}", quote_value(value))),
                Condition::OneOf(values) if values.is_empty() => out.push("1=0".to_string()),
                Condition::OneOf(values) => {
                    let list: Vec<String> = values.iter().map(quote_value).collect();
                    out.push(format!("{column} IN ({})", list.join(", ")));
                }
                Condition::Nested(nested) => self.render(Some(name.as_str()), nested, out),
            }
        }
    }
}

impl Escaper for AnsiSqlEscaper {
    fn escape_conditions(&self, conditions: &Conditions) -> String {
        let mut parts = Vec::new();
        self.render(self.table.as_deref(), conditions, &mut parts);
        if parts.is_empty() {
            return self.escape_literal(true);
        }
        parts.join(" AND ")
    }

    fn escape_literal(&self, value: bool) -> String {
        if value {
            "'t'='t'".to_string()
        } else {
            "'t'='f'".to_string()
        }
    }

    fn table_name(&self, relation: &str) -> String {
        self.table_names
            .get(relation)
            .cloned()
            .unwrap_or_else(|| relation.to_string())
    }
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn quote_value(value: &Value) -> String {
    match value {
        Value::Null => "NULL".to_string(),
        Value::Bool(true) => "TRUE".to_string(),
        Value::Bool(false) => "FALSE".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
    }
}
