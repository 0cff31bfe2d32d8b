//! Instance-level condition matching.

use crate::conditions::{Condition, Conditions};
use crate::resource::Resource;
use crate::value::Value;

/// Tests whether `instance` satisfies every key of `conditions`.
///
/// - A nested tree is checked against the related object. A missing related
///   object fails; for a to-many relation one matching object is enough.
/// - A set passes if the attribute is one of its members.
/// - A literal passes on equality. Missing attributes compare as `Null`.
///
/// An empty tree matches everything.
pub fn matches_conditions(instance: &dyn Resource, conditions: &Conditions) -> bool {
    conditions
        .iter()
        .all(|(name, condition)| matches_condition(instance, name, condition))
}

fn matches_condition(instance: &dyn Resource, name: &str, condition: &Condition) -> bool {
    match condition {
        Condition::Nested(nested) => instance
            .associated(name)
            .into_iter()
            .any(|related| matches_conditions(related, nested)),
        Condition::OneOf(values) => values.contains(&attribute(instance, name)),
        Condition::Eq(expected) => attribute(instance, name) == *expected,
    }
}

fn attribute(instance: &dyn Resource, name: &str) -> Value {
    instance.attribute(name).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Record;

    fn project(owner_id: i64) -> Record {
        Record::new("Project")
            .with("public", true)
            .with_one("owner", Record::new("User").with("id", owner_id))
    }

    #[test]
    fn test_empty_conditions_match() {
        assert!(matches_conditions(&project(1), &Conditions::new()));
    }

    #[test]
    fn test_scalar_equality() {
        let c = Conditions::new().equal("public", true);
        assert!(matches_conditions(&project(1), &c));

        let c = Conditions::new().equal("public", false);
        assert!(!matches_conditions(&project(1), &c));
    }

    #[test]
    fn test_all_keys_must_pass() {
        let c = Conditions::new()
            .equal("public", true)
            .nested("owner", Conditions::new().equal("id", 2));
        assert!(!matches_conditions(&project(1), &c));
        assert!(matches_conditions(&project(2), &c));
    }

    #[test]
    fn test_one_of() {
        let c = Conditions::new().one_of("state", ["draft", "review"]);
        assert!(matches_conditions(&Record::new("Doc").with("state", "draft"), &c));
        assert!(!matches_conditions(&Record::new("Doc").with("state", "live"), &c));
        assert!(!matches_conditions(&Record::new("Doc"), &c));
    }

    #[test]
    fn test_missing_attribute_is_null() {
        let c = Conditions::new().equal("deleted_at", Value::Null);
        assert!(matches_conditions(&Record::new("Doc"), &c));
    }

    #[test]
    fn test_missing_related_object_fails() {
        let c = Conditions::new().nested("owner", Conditions::new());
        assert!(!matches_conditions(&Record::new("Project"), &c));
        assert!(matches_conditions(&project(1), &c));
    }

    #[test]
    fn test_to_many_relation_needs_one_match() {
        let team = Record::new("Team").with_many(
            "members",
            vec![Record::new("User").with("id", 1), Record::new("User").with("id", 2)],
        );
        let c = |id: i64| Conditions::new().nested("members", Conditions::new().equal("id", id));

        assert!(matches_conditions(&team, &c(2)));
        assert!(!matches_conditions(&team, &c(3)));
    }

    #[test]
    fn test_deeply_nested() {
        let task = Record::new("Task").with_one("project", project(4));
        let c = Conditions::new().nested(
            "project",
            Conditions::new().nested("owner", Conditions::new().equal("id", 4)),
        );
        assert!(matches_conditions(&task, &c));
    }
}
