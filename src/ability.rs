use std::collections::BTreeMap;

use tracing::debug;

use crate::conditions::{Conditions, Joins};
use crate::error::{Error, Result};
use crate::expression::Expression;
use crate::resource::{Subject, SubjectType};
use crate::rule::Rule;
use crate::ruleset::Ruleset;
use crate::sql::Escaper;
use crate::value::Value;

/// The action of the sentinel query rejected by [`Ability::allows`].
pub const POISONED_ACTION: &str = "has";

/// The subject type of the sentinel query rejected by [`Ability::allows`].
pub const POISONED_SUBJECT: &str = "forbidden";

/// The message carried by [`Error::AccessDenied`] unless overridden.
pub const DEFAULT_UNAUTHORIZED_MESSAGE: &str = "You are not authorized to access this page.";

/// The authorization engine: register rules, then ask what is allowed.
///
/// # Example
///
/// ```
/// use ability::{Ability, Conditions, Record, Rule};
///
/// let mut ability = Ability::new();
/// ability.can(["read"], ["Doc"]);
/// ability.add_rule(Rule::cannot(["read"], ["Doc"]).when(Conditions::new().equal("owner_id", 2)));
///
/// let mine = Record::new("Doc").with("owner_id", 1);
/// let theirs = Record::new("Doc").with("owner_id", 2);
/// assert!(ability.allows("show", &mine)?);
/// assert!(ability.forbids("show", &theirs)?);
/// # Ok::<(), ability::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Ability {
    ruleset: Ruleset,
    unauthorized_message: String,
}

impl Ability {
    /// Creates an engine with no rules and the default aliases.
    pub fn new() -> Self {
        Self {
            ruleset: Ruleset::new(),
            unauthorized_message: DEFAULT_UNAUTHORIZED_MESSAGE.to_string(),
        }
    }

    /// Overrides the message returned by [`Ability::authorize`].
    pub fn with_unauthorized_message(mut self, message: impl Into<String>) -> Self {
        self.unauthorized_message = message.into();
        self
    }

    pub fn ruleset(&self) -> &Ruleset {
        &self.ruleset
    }

    // ---- registration ----

    /// Registers a rule. Rules added later take precedence.
    pub fn add_rule(&mut self, rule: Rule) -> &mut Self {
        self.ruleset.add_rule(rule);
        self
    }

    /// Allows `actions` on `subjects` unconditionally.
    pub fn can<A, S>(&mut self, actions: A, subjects: S) -> &mut Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<SubjectType>,
    {
        self.add_rule(Rule::can(actions, subjects))
    }

    /// Denies `actions` on `subjects` unconditionally.
    pub fn cannot<A, S>(&mut self, actions: A, subjects: S) -> &mut Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<SubjectType>,
    {
        self.add_rule(Rule::cannot(actions, subjects))
    }

    /// Makes each of `sources` an alias of `target`.
    ///
    /// Fails with [`Error::CyclicAlias`] if the alias would loop.
    pub fn alias_action<I, S>(&mut self, sources: I, target: &str) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ruleset.alias_action(sources, target)
    }

    /// Removes every alias, the built-in ones included.
    pub fn clear_aliased_actions(&mut self) {
        self.ruleset.clear_aliased_actions();
    }

    /// The registered aliases, keyed by target action.
    pub fn aliased_actions(&self) -> &BTreeMap<String, Vec<String>> {
        self.ruleset.aliases().aliases()
    }

    /// Expands `actions` through the alias table.
    pub fn expand_actions<S: AsRef<str>>(&self, actions: &[S]) -> Vec<String> {
        self.ruleset.aliases().expand_all(actions)
    }

    // ---- instance queries ----

    /// Returns whether `action` is allowed on `subject`.
    pub fn allows<'a>(&self, action: &str, subject: impl Into<Subject<'a>>) -> Result<bool> {
        self.allows_with(action, subject, &[])
    }

    /// Like [`Ability::allows`], passing `extra` arguments to rule predicates.
    ///
    /// The newest relevant rule whose guard holds decides. Without one the
    /// answer is `false`.
    pub fn allows_with<'a>(
        &self,
        action: &str,
        subject: impl Into<Subject<'a>>,
        extra: &[Value],
    ) -> Result<bool> {
        let subject = subject.into();
        if action == POISONED_ACTION && matches!(subject, Subject::Type(POISONED_SUBJECT)) {
            return Err(Error::PoisonedQuery {
                action: action.to_string(),
                subject: subject.to_string(),
            });
        }

        let decision = self
            .ruleset
            .relevant_rules(action, &subject)
            .into_iter()
            .find(|rule| rule.matches_guard(action, &subject, extra));

        match decision {
            Some(rule) => {
                debug!(
                    action,
                    %subject,
                    rule = rule.insertion_index(),
                    allowed = rule.behavior(),
                    "rule decided"
                );
                Ok(rule.behavior())
            }
            None => {
                debug!(action, %subject, "no rule matched, denying");
                Ok(false)
            }
        }
    }

    /// The negation of [`Ability::allows`].
    pub fn forbids<'a>(&self, action: &str, subject: impl Into<Subject<'a>>) -> Result<bool> {
        self.forbids_with(action, subject, &[])
    }

    /// The negation of [`Ability::allows_with`].
    pub fn forbids_with<'a>(
        &self,
        action: &str,
        subject: impl Into<Subject<'a>>,
        extra: &[Value],
    ) -> Result<bool> {
        self.allows_with(action, subject, extra).map(|allowed| !allowed)
    }

    /// Fails with [`Error::AccessDenied`] unless `action` is allowed on `subject`.
    pub fn authorize<'a>(&self, action: &str, subject: impl Into<Subject<'a>>) -> Result<()> {
        self.authorize_with(action, subject, &[])
    }

    /// Like [`Ability::authorize`], passing `extra` arguments to rule predicates.
    pub fn authorize_with<'a>(
        &self,
        action: &str,
        subject: impl Into<Subject<'a>>,
        extra: &[Value],
    ) -> Result<()> {
        let subject = subject.into();
        if self.allows_with(action, subject, extra)? {
            return Ok(());
        }
        Err(Error::AccessDenied {
            action: action.to_string(),
            subject: subject.to_string(),
            message: self.unauthorized_message.clone(),
        })
    }

    // ---- bulk queries ----

    /// Returns `true` if a rule relevant to the query is guarded by a predicate,
    /// in which case conditions and joins cannot be determined.
    pub fn has_predicate<'a>(&self, action: &str, subject: impl Into<Subject<'a>>) -> bool {
        self.ruleset
            .relevant_rules(action, &subject.into())
            .iter()
            .any(|rule| rule.is_predicate_only())
    }

    /// The `(behavior, conditions)` pairs of the relevant rules, newest first.
    ///
    /// Unconditional rules contribute an empty tree. Returns `Ok(None)` when
    /// no rule is relevant, which means "undetermined" rather than "denied".
    pub fn conditions<'a>(
        &self,
        action: &str,
        subject: impl Into<Subject<'a>>,
    ) -> Result<Option<Vec<(bool, Conditions)>>> {
        let subject = subject.into();
        let relevant = self.ruleset.relevant_rules(action, &subject);
        if relevant.is_empty() {
            return Ok(None);
        }
        relevant
            .iter()
            .map(|rule| {
                rule.conditions()
                    .map(|conditions| (rule.behavior(), conditions))
                    .ok_or_else(|| Error::UndeterminableConditions {
                        action: action.to_string(),
                        subject: subject.to_string(),
                    })
            })
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }

    /// Compiles the relevant rules into one expression.
    ///
    /// Returns `Ok(None)` when no rule is relevant.
    ///
    /// # Example
    ///
    /// ```
    /// use ability::{Ability, Conditions, Expression, Rule};
    ///
    /// let mut ability = Ability::new();
    /// ability.can(["manage"], ["Doc"]);
    /// assert_eq!(ability.compile_predicate("read", "Doc")?, Some(Expression::True));
    ///
    /// ability.add_rule(Rule::cannot(["destroy"], ["Doc"]).when(Conditions::new().equal("locked", true)));
    /// let expr = ability.compile_predicate("destroy", "Doc")?.unwrap();
    /// assert!(matches!(expr, Expression::Not(_)));
    /// # Ok::<(), ability::Error>(())
    /// ```
    pub fn compile_predicate<'a>(
        &self,
        action: &str,
        subject: impl Into<Subject<'a>>,
    ) -> Result<Option<Expression>> {
        let compiled = self
            .conditions(action, subject)?
            .map(|pairs| Expression::fold(&pairs));
        Ok(compiled)
    }

    /// Compiles the relevant rules and renders them with `escaper`.
    ///
    /// Relation keys are renamed with [`Escaper::table_name`] first. Fails
    /// with [`Error::ConflictingTableConditions`] if two relations sharing a
    /// table constrain the same column differently.
    pub fn sql_conditions<'a>(
        &self,
        action: &str,
        subject: impl Into<Subject<'a>>,
        escaper: &dyn Escaper,
    ) -> Result<Option<String>> {
        let Some(pairs) = self.conditions(action, subject)? else {
            return Ok(None);
        };
        let tableized = pairs
            .into_iter()
            .map(|(allow, c)| -> Result<(bool, Conditions)> {
                Ok((allow, c.tableize(&|relation| escaper.table_name(relation))?))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Some(Expression::fold(&tableized).to_sql(escaper)))
    }

    /// The merged relation paths of every relevant rule.
    ///
    /// Returns `Ok(None)` when no rule is relevant or none references a relation.
    pub fn association_joins<'a>(
        &self,
        action: &str,
        subject: impl Into<Subject<'a>>,
    ) -> Result<Option<Joins>> {
        let subject = subject.into();
        let relevant = self.ruleset.relevant_rules(action, &subject);
        if relevant.iter().any(|rule| rule.is_predicate_only()) {
            return Err(Error::UndeterminableJoins {
                action: action.to_string(),
                subject: subject.to_string(),
            });
        }
        let mut joins = Joins::new();
        for rule in relevant {
            if let Some(rule_joins) = rule.conditions().and_then(|c| c.joins()) {
                joins.merge(rule_joins);
            }
        }
        Ok(if joins.is_empty() { None } else { Some(joins) })
    }

    /// Attribute values implied by the relevant allow rules.
    ///
    /// Only top-level equality conditions count; sets and nested trees are
    /// skipped. When rules disagree the oldest one wins.
    pub fn attributes_for<'a>(
        &self,
        action: &str,
        subject: impl Into<Subject<'a>>,
    ) -> BTreeMap<String, Value> {
        let mut attributes = BTreeMap::new();
        for rule in self.ruleset.relevant_rules(action, &subject.into()) {
            if !rule.behavior() {
                continue;
            }
            if let Some(conditions) = rule.conditions() {
                for (name, value) in conditions.scalar_attributes() {
                    attributes.insert(name.to_string(), value.clone());
                }
            }
        }
        attributes
    }
}

impl Default for Ability {
    fn default() -> Self {
        Self::new()
    }
}
