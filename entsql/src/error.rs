//! Error type shared by every stage of the pipeline.
//!
//! All errors are local and synchronous: they describe a programming or
//! configuration defect (bad mapping, malformed filter, missing key, value
//! that cannot be coerced) and are never retried by this crate.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while resolving, composing, binding or materializing.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// Two properties of the same entity resolve to the same column.
    #[error(
        "Ambiguous mapping on '{entity}': properties '{first}' and '{second}' both map to column '{column}'"
    )]
    AmbiguousMapping {
        entity: String,
        column: String,
        first: String,
        second: String,
    },

    /// An explicit override names a property the entity does not have.
    #[error("Entity '{entity}' has no property named '{property}'")]
    UnknownProperty { entity: String, property: String },

    /// The table name is empty or whitespace.
    #[error("Table name must not be empty or whitespace")]
    EmptyTableName,

    /// A required collection was empty (IN list, order fields, field list).
    #[error("{context} must not be empty")]
    Empty { context: String },

    /// A filter predicate whose operation does not fit its value.
    #[error("Malformed filter on '{field}' ({operation}): {reason}")]
    MalformedFilter {
        field: String,
        operation: String,
        reason: String,
    },

    /// An operation needs a primary or identity column that is not available.
    #[error("No primary or identity field found on '{table}' ({context})")]
    PrimaryFieldNotFound { table: String, context: String },

    /// A value could not be coerced into the requested type.
    #[error("Cannot convert {from} to {to}{}", context_suffix(.context))]
    Conversion {
        from: String,
        to: String,
        context: Option<String>,
    },

    /// Declared mapping metadata contradicts the physical schema or a config file is invalid.
    #[error("Invalid configuration for '{table}.{field}': {reason}")]
    InvalidConfiguration {
        table: String,
        field: String,
        reason: String,
    },

    /// A numeric or structural argument is out of range (zero batch size, missing row).
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument { name: String, reason: String },

    /// The dialect does not support the requested feature.
    #[error("{dialect} does not support {feature}")]
    Unsupported {
        dialect: &'static str,
        feature: &'static str,
    },
}

fn context_suffix(context: &Option<String>) -> String {
    context
        .as_ref()
        .map_or_else(String::new, |ctx| format!(" ({ctx})"))
}

impl Error {
    /// Build a conversion error from a source description and target type.
    pub fn conversion(from: impl fmt::Display, to: impl fmt::Display) -> Self {
        Self::Conversion {
            from: from.to_string(),
            to: to.to_string(),
            context: None,
        }
    }

    /// Build an `Empty` error.
    pub fn empty(context: impl Into<String>) -> Self {
        Self::Empty {
            context: context.into(),
        }
    }

    /// Build an `InvalidArgument` error.
    pub fn invalid_argument(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            name: name.into(),
            reason: reason.into(),
        }
    }

    /// Attach context to a conversion error. Other variants pass through unchanged.
    #[must_use]
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        match self {
            Self::Conversion { from, to, context } => {
                let ctx = ctx.into();
                let context = Some(match context {
                    Some(inner) => format!("{ctx}: {inner}"),
                    None => ctx,
                });
                Self::Conversion { from, to, context }
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversion_message_includes_context() {
        let err = Error::conversion("String(\"abc\")", "I32").with_context("Customer.age");
        assert_eq!(
            err.to_string(),
            "Cannot convert String(\"abc\") to I32 (Customer.age)"
        );
    }

    #[test]
    fn nested_context_is_prefixed() {
        let err = Error::conversion("Int(300)", "U8")
            .with_context("column 'Level'")
            .with_context("row 4");
        assert!(err.to_string().contains("(row 4: column 'Level')"));
    }

    #[test]
    fn with_context_ignores_other_variants() {
        let err = Error::EmptyTableName.with_context("ignored");
        assert_eq!(err, Error::EmptyTableName);
    }
}
