use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};

/// The wildcard action that matches every action.
pub const MANAGE: &str = "manage";

/// Maps an action to the actions it stands for.
///
/// `read` stands for `index` and `show`, so a rule granting `read` also
/// answers queries for `index` and `show`. Aliases are one-directional and
/// may chain: an alias target can itself be aliased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    aliases: BTreeMap<String, Vec<String>>,
}

impl AliasTable {
    /// Creates a table seeded with the default aliases.
    pub fn new() -> Self {
        let mut table = Self::empty();
        for (target, sources) in [
            ("read", &["index", "show"][..]),
            ("create", &["new"][..]),
            ("update", &["edit"][..]),
        ] {
            table
                .aliases
                .insert(target.to_string(), sources.iter().map(|s| s.to_string()).collect());
        }
        table
    }

    /// Creates a table without any aliases.
    pub fn empty() -> Self {
        Self {
            aliases: BTreeMap::new(),
        }
    }

    /// Makes each of `sources` an alias of `target`.
    ///
    /// Registration that would create a cycle is rejected and leaves the
    /// table unchanged.
    pub fn register<I, S>(&mut self, sources: I, target: &str) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let sources: Vec<String> = sources.into_iter().map(Into::into).collect();
        for source in &sources {
            if source == target || self.expand(source).iter().any(|a| a == target) {
                return Err(Error::CyclicAlias {
                    alias: source.clone(),
                    target: target.to_string(),
                });
            }
        }
        self.aliases
            .entry(target.to_string())
            .or_default()
            .extend(sources);
        Ok(())
    }

    /// Returns `action` followed by everything it stands for, recursively.
    ///
    /// Each action appears once, at its first occurrence.
    pub fn expand(&self, action: &str) -> Vec<String> {
        self.expand_all(&[action])
    }

    /// Expands every action in `actions`, concatenating the results without
    /// repeats.
    pub fn expand_all<S: AsRef<str>>(&self, actions: &[S]) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut expanded = Vec::new();
        for action in actions {
            self.expand_into(action.as_ref(), &mut seen, &mut expanded);
        }
        expanded
    }

    fn expand_into<'t>(
        &'t self,
        action: &'t str,
        seen: &mut BTreeSet<&'t str>,
        expanded: &mut Vec<String>,
    ) {
        if !seen.insert(action) {
            return;
        }
        expanded.push(action.to_string());
        if let Some(sources) = self.aliases.get(action) {
            for source in sources {
                self.expand_into(source, seen, expanded);
            }
        }
    }

    /// Returns the registered aliases, keyed by target.
    pub fn aliases(&self) -> &BTreeMap<String, Vec<String>> {
        &self.aliases
    }

    /// Removes every alias, the defaults included.
    pub fn clear(&mut self) {
        self.aliases.clear();
    }
}

impl Default for AliasTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_aliases() {
        let table = AliasTable::new();
        assert_eq!(table.expand("read"), vec!["read", "index", "show"]);
        assert_eq!(table.expand("create"), vec!["create", "new"]);
        assert_eq!(table.expand("update"), vec!["update", "edit"]);
        assert_eq!(table.expand("destroy"), vec!["destroy"]);
    }

    #[test]
    fn test_register_appends_to_existing_target() {
        let mut table = AliasTable::new();
        table.register(["list"], "read").unwrap();
        assert_eq!(table.expand("read"), vec!["read", "index", "show", "list"]);
    }

    #[test]
    fn test_expansion_is_recursive() {
        let mut table = AliasTable::new();
        table.register(["update", "destroy"], "modify").unwrap();
        assert_eq!(
            table.expand("modify"),
            vec!["modify", "update", "edit", "destroy"]
        );
    }

    #[test]
    fn test_expansion_is_one_directional() {
        let mut table = AliasTable::new();
        table.register(["update"], "modify").unwrap();
        assert!(!table.expand("update").iter().any(|a| a == "modify"));
    }

    #[test]
    fn test_expand_all_concatenates() {
        let table = AliasTable::new();
        assert_eq!(
            table.expand_all(&["read", "update"]),
            vec!["read", "index", "show", "update", "edit"]
        );
    }

    #[test]
    fn test_expansion_visits_shared_sources_once() {
        let mut table = AliasTable::empty();
        table.register(["a", "b"], "top").unwrap();
        table.register(["c"], "a").unwrap();
        table.register(["c"], "b").unwrap();
        table.register(["d", "e"], "c").unwrap();

        assert_eq!(table.expand("top"), vec!["top", "a", "c", "d", "e", "b"]);
        assert_eq!(table.expand_all(&["a", "b"]), vec!["a", "c", "d", "e", "b"]);
    }

    #[test]
    fn test_wide_diamonds_stay_linear() {
        let mut table = AliasTable::empty();
        for level in 0..40 {
            let next = format!("n{}", level + 1);
            table
                .register([format!("l{level}"), format!("r{level}")], &format!("n{level}"))
                .unwrap();
            table.register([next.clone()], &format!("l{level}")).unwrap();
            table.register([next], &format!("r{level}")).unwrap();
        }
        assert_eq!(table.expand("n0").len(), 40 * 3 + 1);
    }

    #[test]
    fn test_clear_removes_defaults() {
        let mut table = AliasTable::new();
        table.clear();
        assert_eq!(table.expand("read"), vec!["read"]);
        assert!(table.aliases().is_empty());
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut table = AliasTable::new();
        table.register(["update"], "modify").unwrap();

        let err = table.register(["modify"], "edit").unwrap_err();
        assert_eq!(
            err,
            Error::CyclicAlias {
                alias: "modify".into(),
                target: "edit".into()
            }
        );
        assert!(table.register(["read"], "read").is_err());
        // Rejected registrations leave the table untouched.
        assert_eq!(table.expand("edit"), vec!["edit"]);
    }
}
