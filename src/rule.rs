use std::fmt;
use std::sync::Arc;

use crate::alias::{AliasTable, MANAGE};
use crate::conditions::Conditions;
use crate::matcher;
use crate::resource::{Resource, Subject, SubjectType};
use crate::value::Value;

/// A host callback deciding whether a rule applies.
pub type Predicate = Arc<dyn Fn(&Invocation<'_>) -> bool + Send + Sync>;

/// What a [`Predicate`] is called with.
#[derive(Debug, Clone, Copy)]
pub struct Invocation<'a> {
    /// The queried action. Only set when the rule covers `manage`, so a
    /// wildcard rule can branch on the action that triggered it.
    pub action: Option<&'a str>,
    /// The queried subject: an instance, or a type when no instance is given.
    pub subject: Subject<'a>,
    /// Extra arguments passed to the query.
    pub extra: &'a [Value],
}

impl<'a> Invocation<'a> {
    /// The instance being checked, or `None` for type-level queries.
    pub fn instance(&self) -> Option<&'a dyn Resource> {
        self.subject.instance()
    }
}

/// What, beyond action and subject, has to hold for a rule to apply.
#[derive(Clone, Default)]
pub enum Guard {
    /// Applies to every matching subject.
    #[default]
    Always,
    /// Applies to instances whose attributes satisfy the tree.
    Conditions(Conditions),
    /// Applies when the host callback returns `true`.
    Predicate(Predicate),
}

impl fmt::Debug for Guard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Guard::Always => f.write_str("Always"),
            Guard::Conditions(c) => f.debug_tuple("Conditions").field(c).finish(),
            Guard::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// A rule grants (`can`) or denies (`cannot`) actions on subjects.
///
/// Rules are built with [`Rule::can`] or [`Rule::cannot`], optionally
/// narrowed with [`Rule::when`] or [`Rule::when_fn`], and become immutable
/// once added to an [`Ability`](crate::Ability).
#[derive(Debug, Clone)]
pub struct Rule {
    behavior: bool,
    actions: Vec<String>,
    subjects: Vec<SubjectType>,
    guard: Guard,
    insertion_index: usize,
}

impl Rule {
    /// Creates a rule allowing `actions` on `subjects`.
    ///
    /// # Example
    ///
    /// ```
    /// use ability::{Conditions, Rule};
    ///
    /// let rule = Rule::can(["read", "update"], ["Article"])
    ///     .when(Conditions::new().equal("published", true));
    /// assert!(rule.behavior());
    /// ```
    pub fn can<A, S>(actions: A, subjects: S) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<SubjectType>,
    {
        Self::new(true, actions, subjects)
    }

    /// Creates a rule denying `actions` on `subjects`.
    pub fn cannot<A, S>(actions: A, subjects: S) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<SubjectType>,
    {
        Self::new(false, actions, subjects)
    }

    fn new<A, S>(behavior: bool, actions: A, subjects: S) -> Self
    where
        A: IntoIterator,
        A::Item: Into<String>,
        S: IntoIterator,
        S::Item: Into<SubjectType>,
    {
        Self {
            behavior,
            actions: actions.into_iter().map(Into::into).collect(),
            subjects: subjects.into_iter().map(Into::into).collect(),
            guard: Guard::Always,
            insertion_index: 0,
        }
    }

    /// Restricts the rule to instances matching `conditions`.
    pub fn when(mut self, conditions: Conditions) -> Self {
        self.guard = Guard::Conditions(conditions);
        self
    }

    /// Restricts the rule with a host callback.
    ///
    /// Rules with a callback cannot be compiled into conditions or joins.
    pub fn when_fn<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&Invocation<'_>) -> bool + Send + Sync + 'static,
    {
        self.guard = Guard::Predicate(Arc::new(predicate));
        self
    }

    /// `true` for `can` rules, `false` for `cannot` rules.
    pub fn behavior(&self) -> bool {
        self.behavior
    }

    pub fn actions(&self) -> &[String] {
        &self.actions
    }

    pub fn subjects(&self) -> &[SubjectType] {
        &self.subjects
    }

    pub fn guard(&self) -> &Guard {
        &self.guard
    }

    /// The rule's position in registration order.
    pub fn insertion_index(&self) -> usize {
        self.insertion_index
    }

    pub(crate) fn with_insertion_index(mut self, index: usize) -> Self {
        self.insertion_index = index;
        self
    }

    /// Returns `true` if the rule is guarded by a callback only.
    pub fn is_predicate_only(&self) -> bool {
        matches!(self.guard, Guard::Predicate(_))
    }

    /// The rule's condition tree; empty for unconditional rules.
    ///
    /// Returns `None` for predicate-only rules.
    pub fn conditions(&self) -> Option<Conditions> {
        match &self.guard {
            Guard::Always => Some(Conditions::new()),
            Guard::Conditions(c) => Some(c.clone()),
            Guard::Predicate(_) => None,
        }
    }

    fn covers_manage(&self) -> bool {
        self.actions.iter().any(|a| a == MANAGE)
    }

    /// Tests whether the rule is about `action`, after alias expansion.
    pub fn matches_action(&self, action: &str, aliases: &AliasTable) -> bool {
        self.covers_manage()
            || aliases
                .expand_all(self.actions.as_slice())
                .iter()
                .any(|a| a == action)
    }

    /// Tests whether the rule is about `subject`.
    pub fn matches_subject(&self, subject: &Subject<'_>) -> bool {
        self.subjects.iter().any(|s| s.matches(subject))
    }

    /// Evaluates the rule's guard against a query.
    ///
    /// Condition trees only constrain instances: a type-level query passes
    /// them, since some instance of the type may satisfy them.
    pub fn matches_guard(&self, action: &str, subject: &Subject<'_>, extra: &[Value]) -> bool {
        match &self.guard {
            Guard::Always => true,
            Guard::Conditions(conditions) => match subject.instance() {
                Some(instance) => matcher::matches_conditions(instance, conditions),
                None => true,
            },
            Guard::Predicate(predicate) => predicate(&Invocation {
                action: self.covers_manage().then_some(action),
                subject: *subject,
                extra,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Record;

    #[test]
    fn test_rule_matches_action_through_aliases() {
        let rule = Rule::can(["read"], ["Post"]);
        let aliases = AliasTable::new();

        assert!(rule.matches_action("read", &aliases));
        assert!(rule.matches_action("show", &aliases));
        assert!(rule.matches_action("index", &aliases));
        assert!(!rule.matches_action("update", &aliases));
    }

    #[test]
    fn test_manage_matches_every_action() {
        let rule = Rule::can(["manage"], ["Post"]);
        let aliases = AliasTable::new();
        assert!(rule.matches_action("anything", &aliases));
    }

    #[test]
    fn test_rule_no_subject_match() {
        let rule = Rule::can(["read"], ["Post"]);
        let user = Record::new("User");
        assert!(!rule.matches_subject(&Subject::from(&user)));
        assert!(rule.matches_subject(&Subject::Type("Post")));
    }

    #[test]
    fn test_conditions_pass_for_type_queries() {
        let rule = Rule::cannot(["read"], ["Post"]).when(Conditions::new().equal("secret", true));
        let post = Record::new("Post").with("secret", false);

        assert!(rule.matches_guard("read", &Subject::Type("Post"), &[]));
        assert!(!rule.matches_guard("read", &Subject::from(&post), &[]));
    }

    #[test]
    fn test_predicate_receives_action_only_for_manage() {
        let wildcard = Rule::can(["manage"], ["Post"]).when_fn(|call| call.action == Some("publish"));
        let plain = Rule::can(["publish"], ["Post"]).when_fn(|call| call.action.is_none());

        let post = Record::new("Post");
        assert!(wildcard.matches_guard("publish", &Subject::from(&post), &[]));
        assert!(!wildcard.matches_guard("read", &Subject::from(&post), &[]));
        assert!(plain.matches_guard("publish", &Subject::from(&post), &[]));
    }

    #[test]
    fn test_predicate_sees_missing_instance_and_extra_args() {
        let rule = Rule::can(["read"], ["all"]).when_fn(|call| {
            call.instance().is_none() && call.extra.first() == Some(&Value::Int(5))
        });
        assert!(rule.matches_guard("read", &Subject::Type("Post"), &[Value::Int(5)]));
        assert!(!rule.matches_guard("read", &Subject::Type("Post"), &[]));
    }

    #[test]
    fn test_conditions_accessor() {
        assert_eq!(Rule::can(["read"], ["Post"]).conditions(), Some(Conditions::new()));
        assert!(Rule::can(["read"], ["Post"]).when_fn(|_| true).conditions().is_none());
        assert!(Rule::can(["read"], ["Post"]).when_fn(|_| true).is_predicate_only());
    }
}
