use thiserror::Error;

/// Errors raised by [`Ability`](crate::Ability) queries and registration.
///
/// None of these are transient. Each one is a contract violation the host
/// either avoids or handles.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// The fixed sentinel query, rejected regardless of the registered rules.
    #[error("poisoned query: `{action}` on `{subject}` is always rejected")]
    PoisonedQuery { action: String, subject: String },

    /// A relevant rule only has a predicate, so no condition tree exists.
    #[error("cannot determine conditions from a predicate rule for `{action}` on `{subject}`")]
    UndeterminableConditions { action: String, subject: String },

    /// A relevant rule only has a predicate, so no join paths can be derived.
    #[error("cannot determine association joins from a predicate rule for `{action}` on `{subject}`")]
    UndeterminableJoins { action: String, subject: String },

    /// Registering the alias would make action expansion loop forever.
    #[error("aliasing `{alias}` to `{target}` would create an alias cycle")]
    CyclicAlias { alias: String, target: String },

    /// Relations renamed onto the same table constrain the same key differently.
    #[error("relations mapped to one table disagree on `{key}`")]
    ConflictingTableConditions { key: String },

    /// Returned by [`Ability::authorize`](crate::Ability::authorize).
    #[error("{message}")]
    AccessDenied {
        action: String,
        subject: String,
        message: String,
    },

    /// A JSON document could not be converted.
    #[cfg(feature = "json")]
    #[error("invalid JSON: {0}")]
    InvalidJson(String),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
