use tracing::trace;

use crate::alias::AliasTable;
use crate::error::Result;
use crate::resource::Subject;
use crate::rule::Rule;

/// A ruleset is an append-only, ordered list of rules plus the alias table
/// used to interpret their actions.
///
/// Later rules take precedence: [`Ruleset::relevant_rules`] yields the most
/// recently added rule first.
#[derive(Debug, Clone, Default)]
pub struct Ruleset {
    rules: Vec<Rule>,
    aliases: AliasTable,
}

impl Ruleset {
    /// Creates an empty ruleset with the default aliases.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule, assigning it the next insertion index.
    pub fn add_rule(&mut self, rule: Rule) {
        let rule = rule.with_insertion_index(self.rules.len());
        trace!(
            index = rule.insertion_index(),
            behavior = rule.behavior(),
            actions = ?rule.actions(),
            "registered rule"
        );
        self.rules.push(rule);
    }

    /// Returns the rules in insertion order.
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn aliases(&self) -> &AliasTable {
        &self.aliases
    }

    /// Makes each of `sources` an alias of `target`.
    pub fn alias_action<I, S>(&mut self, sources: I, target: &str) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.aliases.register(sources, target)
    }

    /// Removes every alias, the defaults included.
    pub fn clear_aliased_actions(&mut self) {
        self.aliases.clear();
    }

    /// Returns the rules about `action` on `subject`, newest first.
    ///
    /// A rule is relevant when one of its alias-expanded actions is `action`
    /// (or it covers `manage`) and one of its subjects matches.
    pub fn relevant_rules<'r>(&'r self, action: &str, subject: &Subject<'_>) -> Vec<&'r Rule> {
        let relevant: Vec<&Rule> = self
            .rules
            .iter()
            .rev()
            .filter(|rule| rule.matches_action(action, &self.aliases))
            .filter(|rule| rule.matches_subject(subject))
            .collect();
        trace!(
            action,
            %subject,
            count = relevant.len(),
            "selected relevant rules"
        );
        relevant
    }
}
