//! Ability: a rule-based authorization engine.
//!
//! An [`Ability`] holds an ordered list of **rules**, each allowing or
//! denying some actions on some resource types, optionally guarded by
//! conditions on the resource's attributes or by a predicate. Queries ask
//! whether an action is allowed on an instance, or compile the relevant rules
//! into a predicate that a storage backend can filter by.
//!
//! # Example
//!
//! ```
//! use ability::{Ability, AnsiSqlEscaper, Conditions, Record, Rule};
//!
//! let mut ability = Ability::new();
//! // Everyone may read articles...
//! ability.can(["read"], ["Article"]);
//! // ...except secret ones.
//! ability.add_rule(
//!     Rule::cannot(["read"], ["Article"]).when(Conditions::new().equal("secret", true)),
//! );
//!
//! let public = Record::new("Article").with("secret", false);
//! let secret = Record::new("Article").with("secret", true);
//! assert!(ability.allows("show", &public)?);
//! assert!(!ability.allows("show", &secret)?);
//! assert!(!ability.allows("destroy", &public)?);
//!
//! let sql = ability.sql_conditions("index", "Article", &AnsiSqlEscaper::new("articles"))?;
//! assert_eq!(sql.as_deref(), Some(r#"not ("articles"."secret" = TRUE)"#));
//! # Ok::<(), ability::Error>(())
//! ```

mod ability;
mod alias;
mod conditions;
mod error;
mod expression;
mod matcher;
mod resource;
mod rule;
mod ruleset;
mod sql;
mod value;

#[cfg(feature = "json")]
mod json;

pub use ability::{Ability, DEFAULT_UNAUTHORIZED_MESSAGE, POISONED_ACTION, POISONED_SUBJECT};
pub use alias::{AliasTable, MANAGE};
pub use conditions::{Condition, Conditions, Joins};
pub use error::{Error, Result};
pub use expression::Expression;
pub use matcher::matches_conditions;
pub use resource::{ALL, Record, Resource, Subject, SubjectType};
pub use rule::{Guard, Invocation, Predicate, Rule};
pub use ruleset::Ruleset;
pub use sql::{AnsiSqlEscaper, Escaper};
pub use value::Value;
