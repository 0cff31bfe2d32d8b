//! Compilation of allow/deny rules into a single boolean expression.

use tracing::debug;

use crate::conditions::{Conditions, Joins};
use crate::matcher::matches_conditions;
use crate::resource::Resource;
use crate::sql::Escaper;

/// A compiled predicate over condition trees.
///
/// Produced by [`Ability::compile_predicate`](crate::Ability::compile_predicate).
/// Leaves are condition trees; the engine only builds the boolean skeleton
/// around them. Rendering into a backend query goes through an [`Escaper`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expression {
    True,
    False,
    Conditions(Conditions),
    Not(Box<Expression>),
    And(Box<Expression>, Box<Expression>),
    Or(Box<Expression>, Box<Expression>),
}

impl Expression {
    /// Folds `(behavior, conditions)` pairs, given newest first, into one expression.
    ///
    /// A single allow rule is returned as its bare tree. Otherwise the pairs
    /// are applied oldest first, each wrapping the result so far, so the
    /// newest rule ends up outermost. Unconditional rules collapse the
    /// accumulator to a constant.
    pub fn fold(pairs: &[(bool, Conditions)]) -> Expression {
        if let [(true, conditions)] = pairs {
            return Expression::from_conditions(conditions);
        }
        let compiled = pairs
            .iter()
            .rev()
            .fold(Expression::False, |acc, (allow, conditions)| {
                acc.apply(*allow, conditions)
            });
        debug!(rules = pairs.len(), "folded rules into predicate");
        compiled
    }

    fn from_conditions(conditions: &Conditions) -> Expression {
        if conditions.is_empty() {
            Expression::True
        } else {
            Expression::Conditions(conditions.clone())
        }
    }

    fn apply(self, allow: bool, conditions: &Conditions) -> Expression {
        if conditions.is_empty() {
            return if allow { Expression::True } else { Expression::False };
        }
        let leaf = Expression::Conditions(conditions.clone());
        match (self, allow) {
            (Expression::True, true) => Expression::True,
            (Expression::True, false) => Expression::Not(Box::new(leaf)),
            (Expression::False, true) => leaf,
            (Expression::False, false) => Expression::False,
            (acc, true) => Expression::Or(Box::new(leaf), Box::new(acc)),
            (acc, false) => {
                Expression::And(Box::new(Expression::Not(Box::new(leaf))), Box::new(acc))
            }
        }
    }

    /// Returns `true` for the two constant expressions.
    pub fn is_constant(&self) -> bool {
        matches!(self, Expression::True | Expression::False)
    }

    /// Evaluates the expression against one instance.
    pub fn evaluate(&self, instance: &dyn Resource) -> bool {
        match self {
            Expression::True => true,
            Expression::False => false,
            Expression::Conditions(c) => matches_conditions(instance, c),
            Expression::Not(e) => !e.evaluate(instance),
            Expression::And(l, r) => l.evaluate(instance) && r.evaluate(instance),
            Expression::Or(l, r) => l.evaluate(instance) || r.evaluate(instance),
        }
    }

    /// Renders the expression, delegating leaves and constants to `escaper`.
    pub fn to_sql(&self, escaper: &dyn Escaper) -> String {
        match self {
            Expression::True => escaper.escape_literal(true),
            Expression::False => escaper.escape_literal(false),
            Expression::Conditions(c) => escaper.escape_conditions(c),
            Expression::Not(e) => format!("not ({})", e.to_sql(escaper)),
            Expression::And(l, r) => format!("{} AND ({})", l.to_sql(escaper), r.to_sql(escaper)),
            Expression::Or(l, r) => format!("({}) OR ({})", l.to_sql(escaper), r.to_sql(escaper)),
        }
    }

    /// The relation paths referenced anywhere in the expression.
    pub fn joins(&self) -> Option<Joins> {
        match self {
            Expression::True | Expression::False => None,
            Expression::Conditions(c) => c.joins(),
            Expression::Not(e) => e.joins(),
            Expression::And(l, r) | Expression::Or(l, r) => match (l.joins(), r.joins()) {
                (Some(mut joins), Some(more)) => {
                    joins.merge(more);
                    Some(joins)
                }
                (joins, None) | (None, joins) => joins,
            },
        }
    }
}
