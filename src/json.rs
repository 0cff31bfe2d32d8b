//! JSON conversions.
//!
//! Lets hosts keep rules and sample records in JSON documents instead of
//! building them in code.
//!
//! A rule document looks like:
//!
//! ```json
//! {
//!   "aliases": { "modify": ["update", "destroy"] },
//!   "rules": [
//!     { "behavior": "can", "actions": ["read"], "subjects": ["Article"] },
//!     { "behavior": "cannot", "actions": ["read"], "subjects": ["Article"],
//!       "conditions": { "secret": true, "author": { "banned": true } } }
//!   ]
//! }
//! ```
//!
//! In `conditions`, arrays mean "one of" and objects are nested trees for a
//! related object. Predicate rules cannot be expressed in JSON.

use serde_json::Value as Json;

use crate::ability::Ability;
use crate::conditions::{Condition, Conditions};
use crate::error::{Error, Result};
use crate::resource::{Record, SubjectType};
use crate::rule::Rule;
use crate::value::Value;

impl TryFrom<&Json> for Value {
    type Error = Error;

    fn try_from(json: &Json) -> Result<Self> {
        match json {
            Json::Null => Ok(Value::Null),
            Json::Bool(b) => Ok(Value::Bool(*b)),
            Json::Number(n) => n
                .as_i64()
                .map(Value::Int)
                .ok_or_else(|| Error::InvalidJson(format!("unsupported number `{n}`"))),
            Json::String(s) => Ok(Value::Str(s.clone())),
            other => Err(Error::InvalidJson(format!("expected a literal, got `{other}`"))),
        }
    }
}

impl Conditions {
    /// Builds a condition tree from a JSON object.
    pub fn from_json(json: &Json) -> Result<Conditions> {
        let object = json.as_object().ok_or_else(|| {
            Error::InvalidJson(format!("conditions must be an object, got `{json}`"))
        })?;

        let mut conditions = Conditions::new();
        for (name, expected) in object {
            let condition = match expected {
                Json::Object(_) => Condition::Nested(Conditions::from_json(expected)?),
                Json::Array(items) => Condition::OneOf(
                    items.iter().map(Value::try_from).collect::<Result<Vec<_>>>()?,
                ),
                literal => Condition::Eq(Value::try_from(literal)?),
            };
            conditions = conditions.insert(name.as_str(), condition);
        }
        Ok(conditions)
    }
}

impl Record {
    /// Builds a record from a JSON object.
    ///
    /// Scalars become attributes, objects to-one relations and arrays of
    /// objects to-many relations. Related records take their relation name as
    /// type unless they carry a `"_type"` string. `"_extends"` names one
    /// supertype or lists several.
    pub fn from_json(type_name: &str, json: &Json) -> Result<Record> {
        let object = json.as_object().ok_or_else(|| {
            Error::InvalidJson(format!("record must be an object, got `{json}`"))
        })?;

        let type_name =
            extract_string_field(json, "_type").unwrap_or_else(|| type_name.to_string());
        let mut record = Record::new(type_name);

        for (name, value) in object {
            record = match (name.as_str(), value) {
                ("_type", _) => record,
                ("_extends", ancestors) => string_list(ancestors, "_extends")?
                    .into_iter()
                    .fold(record, |record, ancestor| record.extends(ancestor)),
                (_, Json::Object(_)) => {
                    record.with_one(name.as_str(), Record::from_json(name, value)?)
                }
                (_, Json::Array(items)) if items.iter().all(Json::is_object) => {
                    let related = items
                        .iter()
                        .map(|item| Record::from_json(name, item))
                        .collect::<Result<Vec<_>>>()?;
                    record.with_many(name.as_str(), related)
                }
                (_, literal) => record.with(name.as_str(), Value::try_from(literal)?),
            };
        }
        Ok(record)
    }
}

impl Rule {
    /// Builds a rule from a JSON object.
    pub fn from_json(json: &Json) -> Result<Rule> {
        let behavior = match extract_string_field(json, "behavior").as_deref() {
            Some("can") => true,
            Some("cannot") => false,
            other => {
                return Err(Error::InvalidJson(format!(
                    "rule behavior must be \"can\" or \"cannot\", got {other:?}"
                )));
            }
        };
        let actions = extract_string_list(json, "actions")?;
        let subjects: Vec<SubjectType> = extract_string_list(json, "subjects")?
            .into_iter()
            .map(SubjectType::from)
            .collect();

        let rule = if behavior {
            Rule::can(actions, subjects)
        } else {
            Rule::cannot(actions, subjects)
        };
        match json.get("conditions") {
            None | Some(Json::Null) => Ok(rule),
            Some(conditions) => Ok(rule.when(Conditions::from_json(conditions)?)),
        }
    }
}

impl Ability {
    /// Builds an engine from a rule document.
    ///
    /// Aliases are registered before rules. Rules keep their document order,
    /// so later entries take precedence.
    pub fn from_json(json: &Json) -> Result<Ability> {
        let mut ability = Ability::new();

        if let Some(aliases) = json.get("aliases") {
            let aliases = aliases
                .as_object()
                .ok_or_else(|| Error::InvalidJson("`aliases` must be an object".into()))?;
            for (target, sources) in aliases {
                ability.alias_action(string_list(sources, target)?, target)?;
            }
        }

        let rules = match json {
            Json::Array(rules) => rules,
            _ => json
                .get("rules")
                .and_then(Json::as_array)
                .ok_or_else(|| Error::InvalidJson("expected a `rules` array".into()))?,
        };
        for rule in rules {
            ability.add_rule(Rule::from_json(rule)?);
        }
        Ok(ability)
    }
}

/// Extracts a string field from a JSON object.
fn extract_string_field(input: &Json, field: &str) -> Option<String> {
    input.as_object()?.get(field)?.as_str().map(|s| s.to_string())
}

/// Extracts a list of strings, accepting a bare string as a one-element list.
fn extract_string_list(input: &Json, field: &str) -> Result<Vec<String>> {
    let value = input
        .get(field)
        .ok_or_else(|| Error::InvalidJson(format!("missing `{field}`")))?;
    string_list(value, field)
}

fn string_list(value: &Json, field: &str) -> Result<Vec<String>> {
    match value {
        Json::String(s) => Ok(vec![s.clone()]),
        Json::Array(items) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.to_string())
                    .ok_or_else(|| Error::InvalidJson(format!("`{field}` must contain strings")))
            })
            .collect(),
        _ => Err(Error::InvalidJson(format!(
            "`{field}` must be a string or a list of strings"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use serde_json::json;

    #[test]
    fn test_conditions_from_json() {
        let c = Conditions::from_json(&json!({
            "published": true,
            "state": ["draft", "review"],
            "author": { "id": 7 }
        }))
        .unwrap();

        let expected = Conditions::new()
            .equal("published", true)
            .one_of("state", ["draft", "review"])
            .nested("author", Conditions::new().equal("id", 7));
        assert_eq!(c, expected);
    }

    #[test]
    fn test_conditions_reject_floats() {
        assert!(matches!(
            Conditions::from_json(&json!({ "score": 1.5 })),
            Err(Error::InvalidJson(_))
        ));
        assert!(Conditions::from_json(&json!([1])).is_err());
    }

    #[test]
    fn test_record_from_json() {
        let record = Record::from_json(
            "Article",
            &json!({
                "_extends": ["Content"],
                "title": "hi",
                "author": { "_type": "User", "id": 7 },
                "tags": [{ "name": "rust" }, { "name": "auth" }]
            }),
        )
        .unwrap();

        assert!(record.is_kind_of("Content"));
        assert_eq!(record.attribute("title"), Some(Value::from("hi")));
        let author = record.associated("author");
        assert_eq!(author[0].type_name(), "User");
        assert_eq!(record.associated("tags").len(), 2);
        assert_eq!(record.associated("tags")[0].type_name(), "tags");
    }

    #[test]
    fn test_record_extends_accepts_a_single_supertype() {
        let record = Record::from_json("Article", &json!({ "_extends": "Content" })).unwrap();
        assert!(record.is_kind_of("Content"));
        assert_eq!(record.attribute("_extends"), None);

        let err = Record::from_json("Article", &json!({ "_extends": 3 })).unwrap_err();
        assert!(matches!(err, Error::InvalidJson(_)));
    }

    #[test]
    fn test_ability_from_json() {
        let ability = Ability::from_json(&json!({
            "aliases": { "modify": ["update", "destroy"] },
            "rules": [
                { "behavior": "can", "actions": "modify", "subjects": ["Article"] },
                { "behavior": "cannot", "actions": ["destroy"], "subjects": ["Article"],
                  "conditions": { "locked": true } }
            ]
        }))
        .unwrap();

        let open = Record::new("Article").with("locked", false);
        let locked = Record::new("Article").with("locked", true);
        assert!(ability.allows("edit", &open).unwrap());
        assert!(ability.allows("destroy", &open).unwrap());
        assert!(!ability.allows("destroy", &locked).unwrap());
    }

    #[test]
    fn test_bare_rule_array() {
        let ability = Ability::from_json(&json!([
            { "behavior": "can", "actions": ["read"], "subjects": ["all"] }
        ]))
        .unwrap();
        assert!(ability.allows("read", "Anything").unwrap());
    }

    #[test]
    fn test_invalid_behavior() {
        let err = Rule::from_json(&json!({ "behavior": "maybe", "actions": [], "subjects": [] }))
            .unwrap_err();
        assert!(matches!(err, Error::InvalidJson(_)));
    }
}
