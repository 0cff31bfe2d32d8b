use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::error::{Error, Result};
use crate::value::Value;

/// The expectation placed on a single attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    /// The attribute must equal this literal.
    Eq(Value),
    /// The attribute must be one of these literals.
    OneOf(Vec<Value>),
    /// The related object must satisfy this nested tree.
    Nested(Conditions),
}

impl From<Value> for Condition {
    fn from(v: Value) -> Self {
        Condition::Eq(v)
    }
}

impl From<Conditions> for Condition {
    fn from(c: Conditions) -> Self {
        Condition::Nested(c)
    }
}

/// An attribute condition tree.
///
/// Keys are attribute names (or relation names, for [`Condition::Nested`]).
/// Every key must hold for the tree to match. Keys are kept sorted, so two
/// trees with the same content always render the same way.
///
/// # Example
///
/// ```
/// use ability::Conditions;
///
/// let conditions = Conditions::new()
///     .equal("published", true)
///     .one_of("state", ["draft", "review"])
///     .nested("author", Conditions::new().equal("id", 7));
///
/// assert_eq!(conditions.len(), 3);
/// assert!(conditions.joins().is_some());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Conditions(BTreeMap<String, Condition>);

impl Conditions {
    /// Creates an empty tree, which matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requires `name` to equal `value`.
    pub fn equal(self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(name, Condition::Eq(value.into()))
    }

    /// Requires `name` to be one of `values`.
    pub fn one_of<I, V>(self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.insert(name, Condition::OneOf(values))
    }

    /// Requires the object related through `relation` to match `conditions`.
    pub fn nested(self, relation: impl Into<String>, conditions: Conditions) -> Self {
        self.insert(relation, Condition::Nested(conditions))
    }

    /// Inserts an arbitrary condition, replacing any previous one for `name`.
    pub fn insert(mut self, name: impl Into<String>, condition: Condition) -> Self {
        self.0.insert(name.into(), condition);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Condition> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Renames every relation key with `table_name`, recursively.
    ///
    /// Query builders address related objects by table rather than by
    /// relation name. Attribute keys are left untouched. Relations landing on
    /// the same table have their trees merged; if they constrain one key
    /// differently the rename fails with
    /// [`Error::ConflictingTableConditions`].
    pub fn tableize(&self, table_name: &dyn Fn(&str) -> String) -> Result<Conditions> {
        let mut renamed = BTreeMap::new();
        for (name, condition) in &self.0 {
            let (key, condition) = match condition {
                Condition::Nested(nested) => (
                    table_name(name),
                    Condition::Nested(nested.tableize(table_name)?),
                ),
                other => (name.clone(), other.clone()),
            };
            merge_entry(&mut renamed, key, condition)?;
        }
        Ok(Conditions(renamed))
    }

    /// Scalar equality conditions at the top level of the tree.
    pub fn scalar_attributes(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().filter_map(|(name, condition)| match condition {
            Condition::Eq(value) => Some((name.as_str(), value)),
            _ => None,
        })
    }

    /// The relation paths this tree traverses, or `None` if it has none.
    pub fn joins(&self) -> Option<Joins> {
        let mut joins = Joins::new();
        for (name, condition) in &self.0 {
            if let Condition::Nested(nested) = condition {
                joins.0.insert(name.clone(), nested.joins().unwrap_or_default());
            }
        }
        if joins.is_empty() { None } else { Some(joins) }
    }
}

impl<'a> IntoIterator for &'a Conditions {
    type Item = (&'a String, &'a Condition);
    type IntoIter = std::collections::btree_map::Iter<'a, String, Condition>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

fn merge_entry(
    entries: &mut BTreeMap<String, Condition>,
    key: String,
    condition: Condition,
) -> Result<()> {
    match entries.entry(key) {
        Entry::Vacant(slot) => {
            slot.insert(condition);
            Ok(())
        }
        Entry::Occupied(mut slot) => {
            let key = slot.key().clone();
            match (slot.get_mut(), condition) {
                (Condition::Nested(existing), Condition::Nested(incoming)) => {
                    for (name, nested) in incoming.0 {
                        merge_entry(&mut existing.0, name, nested)?;
                    }
                    Ok(())
                }
                (existing, incoming) if *existing == incoming => Ok(()),
                _ => Err(Error::ConflictingTableConditions { key }),
            }
        }
    }
}

/// A tree of relation names a query builder has to join.
///
/// An empty nested tree marks a leaf relation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Joins(BTreeMap<String, Joins>);

impl Joins {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a relation with its nested joins.
    pub fn with(mut self, relation: impl Into<String>, nested: Joins) -> Self {
        self.merge(Joins(BTreeMap::from([(relation.into(), nested)])));
        self
    }

    /// Adds a leaf relation.
    pub fn leaf(self, relation: impl Into<String>) -> Self {
        self.with(relation, Joins::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn get(&self, relation: &str) -> Option<&Joins> {
        self.0.get(relation)
    }

    pub fn relations(&self) -> impl Iterator<Item = (&str, &Joins)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Unions `other` into `self`, merging shared relations recursively.
    pub fn merge(&mut self, other: Joins) {
        for (relation, nested) in other.0 {
            self.0.entry(relation).or_default().merge(nested);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_replaces_duplicate_keys() {
        let c = Conditions::new().equal("a", 1).equal("a", 2);
        assert_eq!(c.len(), 1);
        assert_eq!(c.get("a"), Some(&Condition::Eq(Value::Int(2))));
    }

    #[test]
    fn test_joins_of_flat_tree_is_none() {
        let c = Conditions::new().equal("a", 1).one_of("b", [1, 2]);
        assert_eq!(c.joins(), None);
    }

    #[test]
    fn test_joins_follow_nested_trees() {
        let c = Conditions::new().equal("x", 1).nested(
            "project",
            Conditions::new()
                .equal("public", true)
                .nested("owner", Conditions::new().equal("id", 1)),
        );
        let expected = Joins::new().with("project", Joins::new().leaf("owner"));
        assert_eq!(c.joins(), Some(expected));
    }

    #[test]
    fn test_joins_merge_is_set_like() {
        let mut joins = Joins::new().with("a", Joins::new().leaf("b"));
        joins.merge(Joins::new().with("a", Joins::new().leaf("c")));
        joins.merge(Joins::new().with("a", Joins::new().leaf("b")));

        let expected = Joins::new().with("a", Joins::new().leaf("b").leaf("c"));
        assert_eq!(joins, expected);
        assert_eq!(joins.get("a").map(|j| j.relations().count()), Some(2));
    }

    #[test]
    fn test_tableize_renames_relations_only() {
        let c = Conditions::new()
            .equal("kind", "news")
            .nested("category", Conditions::new().equal("id", 1))
            .nested("author", Conditions::new().nested("team", Conditions::new()));
        let renamed = c.tableize(&|name| format!("{name}s")).unwrap();

        assert!(renamed.get("categorys").is_some());
        let Some(Condition::Nested(author)) = renamed.get("authors") else {
            panic!("expected nested authors");
        };
        assert!(author.get("teams").is_some());
    }

    #[test]
    fn test_tableize_merges_relations_sharing_a_table() {
        let c = Conditions::new()
            .nested("author", Conditions::new().equal("id", 1))
            .nested("editor", Conditions::new().equal("active", true));
        let renamed = c.tableize(&|_| "users".to_string()).unwrap();

        let users = Conditions::new().equal("active", true).equal("id", 1);
        assert_eq!(renamed, Conditions::new().nested("users", users));
    }

    #[test]
    fn test_tableize_rejects_conflicting_relations() {
        let c = Conditions::new()
            .nested("author", Conditions::new().equal("id", 1))
            .nested("editor", Conditions::new().equal("id", 2));
        assert_eq!(
            c.tableize(&|_| "users".to_string()),
            Err(Error::ConflictingTableConditions { key: "id".into() })
        );

        // A relation renamed onto an attribute key is a conflict too.
        let c = Conditions::new()
            .equal("users", 1)
            .nested("author", Conditions::new().equal("id", 1));
        assert!(c.tableize(&|_| "users".to_string()).is_err());
    }

    #[test]
    fn test_scalar_attributes_skip_sets_and_nested() {
        let c = Conditions::new()
            .equal("owner_id", 3)
            .one_of("state", ["a"])
            .nested("team", Conditions::new().equal("id", 1));
        let scalars: Vec<_> = c.scalar_attributes().collect();
        assert_eq!(scalars, vec![("owner_id", &Value::Int(3))]);
    }
}
