use std::collections::BTreeMap;
use std::fmt;

use crate::value::Value;

/// The wildcard subject descriptor that matches every type.
pub const ALL: &str = "all";

/// The capability an instance exposes so conditions can be checked against it.
///
/// Implement this for your model types. Attribute lookups return `None` for
/// unknown attributes, which compare like [`Value::Null`].
pub trait Resource {
    /// The concrete type tag of this instance, e.g. `"Article"`.
    fn type_name(&self) -> &str;

    /// Returns `true` if this instance is of type `type_name` or one of its subtypes.
    fn is_kind_of(&self, type_name: &str) -> bool {
        self.type_name() == type_name
    }

    /// Resolves an attribute name to its value.
    fn attribute(&self, name: &str) -> Option<Value>;

    /// Resolves a relation name to the related objects.
    ///
    /// A to-one relation yields zero or one object, a to-many relation any
    /// number. An empty result means the related object is missing.
    fn associated(&self, _name: &str) -> Vec<&dyn Resource> {
        Vec::new()
    }
}

/// The subject of a query: a concrete instance, a bare type, or `all`.
#[derive(Clone, Copy)]
pub enum Subject<'a> {
    Instance(&'a dyn Resource),
    Type(&'a str),
    All,
}

impl<'a> Subject<'a> {
    /// Returns the instance, if this subject is one.
    pub fn instance(&self) -> Option<&'a dyn Resource> {
        match *self {
            Subject::Instance(r) => Some(r),
            _ => None,
        }
    }

    /// Returns the type the query is about.
    pub fn type_name(&self) -> &'a str {
        match *self {
            Subject::Instance(r) => r.type_name(),
            Subject::Type(t) => t,
            Subject::All => ALL,
        }
    }

    /// Returns `true` unless this subject is a concrete instance.
    pub fn is_type(&self) -> bool {
        !matches!(self, Subject::Instance(_))
    }
}

impl fmt::Debug for Subject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Instance(r) => write!(f, "Instance({})", r.type_name()),
            Subject::Type(t) => write!(f, "Type({t})"),
            Subject::All => f.write_str("All"),
        }
    }
}

impl fmt::Display for Subject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subject::Instance(r) => write!(f, "#<{}>", r.type_name()),
            _ => f.write_str(self.type_name()),
        }
    }
}

impl<'a, R: Resource> From<&'a R> for Subject<'a> {
    fn from(r: &'a R) -> Self {
        Subject::Instance(r)
    }
}

impl<'a> From<&'a dyn Resource> for Subject<'a> {
    fn from(r: &'a dyn Resource) -> Self {
        Subject::Instance(r)
    }
}

impl<'a> From<&'a str> for Subject<'a> {
    fn from(t: &'a str) -> Self {
        if t == ALL { Subject::All } else { Subject::Type(t) }
    }
}

/// The subject side of a rule: a type name or the `all` wildcard.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SubjectType {
    All,
    Named(String),
}

impl SubjectType {
    /// Tests whether a rule declared for this subject type applies to `subject`.
    pub fn matches(&self, subject: &Subject<'_>) -> bool {
        match (self, subject) {
            (SubjectType::All, _) => true,
            (SubjectType::Named(name), Subject::Instance(r)) => r.is_kind_of(name),
            (SubjectType::Named(name), Subject::Type(t)) => name == t,
            (SubjectType::Named(_), Subject::All) => false,
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubjectType::All => f.write_str(ALL),
            SubjectType::Named(name) => f.write_str(name),
        }
    }
}

impl From<&str> for SubjectType {
    fn from(s: &str) -> Self {
        if s == ALL {
            SubjectType::All
        } else {
            SubjectType::Named(s.to_string())
        }
    }
}

impl From<String> for SubjectType {
    fn from(s: String) -> Self {
        if s == ALL { SubjectType::All } else { SubjectType::Named(s) }
    }
}

/// A generic [`Resource`] built from plain data.
///
/// Useful for hosts whose models are not Rust types (rows, JSON documents)
/// and for tests.
///
/// # Example
///
/// ```
/// use ability::{Record, Resource, Value};
///
/// let author = Record::new("User").with("id", 7);
/// let post = Record::new("Post")
///     .extends("Content")
///     .with("title", "hello")
///     .with_one("author", author);
///
/// assert!(post.is_kind_of("Content"));
/// assert_eq!(post.attribute("title"), Some(Value::from("hello")));
/// assert_eq!(post.associated("author").len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    type_name: String,
    ancestors: Vec<String>,
    attributes: BTreeMap<String, Value>,
    associations: BTreeMap<String, Vec<Record>>,
}

impl Record {
    /// Creates an empty record of the given type.
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            ..Self::default()
        }
    }

    /// Declares a supertype, so rules on `ancestor` apply to this record.
    pub fn extends(mut self, ancestor: impl Into<String>) -> Self {
        self.ancestors.push(ancestor.into());
        self
    }

    /// Sets an attribute.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Sets a to-one relation.
    pub fn with_one(mut self, name: impl Into<String>, related: Record) -> Self {
        self.associations.insert(name.into(), vec![related]);
        self
    }

    /// Sets a to-many relation.
    pub fn with_many(mut self, name: impl Into<String>, related: Vec<Record>) -> Self {
        self.associations.insert(name.into(), related);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }
}

impl Resource for Record {
    fn type_name(&self) -> &str {
        &self.type_name
    }

    fn is_kind_of(&self, type_name: &str) -> bool {
        self.type_name == type_name || self.ancestors.iter().any(|a| a == type_name)
    }

    fn attribute(&self, name: &str) -> Option<Value> {
        self.attributes.get(name).cloned()
    }

    fn associated(&self, name: &str) -> Vec<&dyn Resource> {
        self.associations
            .get(name)
            .map(|related| related.iter().map(|r| r as &dyn Resource).collect())
            .unwrap_or_default()
    }
}
