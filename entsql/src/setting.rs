//! Per-database constants: quoting, parameter prefix, paging and feature flags.
//!
//! A [`DbSetting`] is pure data. Presets exist for every built-in dialect and
//! can be tweaked through [`crate::config::Config`] before composition starts;
//! after that the setting is shared read-only.

use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// How a dialect limits and pages result sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PagingStyle {
    /// `TOP (n)` for plain limits, `ROW_NUMBER() OVER (ORDER BY ..)` windows for pages.
    RowNumberWindow,
    /// Trailing `LIMIT n OFFSET m`.
    LimitOffset,
}

/// Dialect configuration consumed by every composer call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbSetting {
    /// Opening identifier quote, e.g. `[` or `"`.
    pub opening_quote: Cow<'static, str>,
    /// Closing identifier quote, e.g. `]` or `"`.
    pub closing_quote: Cow<'static, str>,
    /// Prefix of named parameters, e.g. `@`.
    pub parameter_prefix: Cow<'static, str>,
    /// Separator between schema and table, usually `.`.
    pub schema_separator: Cow<'static, str>,
    /// Paging strategy.
    pub paging: PagingStyle,
    /// Native upsert (`MERGE` / `ON CONFLICT`). When false the composer emits a fallback.
    pub is_upsert_supported: bool,
    /// Several `;`-separated statements may be sent in one command.
    pub is_multi_statement_executable: bool,
    /// Parameters carry a direction (input/output).
    pub is_direction_supported: bool,
    /// Parameters carry precision and scale.
    pub is_precision_supported: bool,
    /// Table hints such as `WITH (NOLOCK)` are accepted.
    pub are_table_hints_supported: bool,
    /// Provider cap on parameters per command.
    pub max_parameters: Option<usize>,
}

impl DbSetting {
    /// Bracket-quoted reference dialect.
    pub const SQL_SERVER: Self = Self {
        opening_quote: Cow::Borrowed("["),
        closing_quote: Cow::Borrowed("]"),
        parameter_prefix: Cow::Borrowed("@"),
        schema_separator: Cow::Borrowed("."),
        paging: PagingStyle::RowNumberWindow,
        is_upsert_supported: true,
        is_multi_statement_executable: true,
        is_direction_supported: true,
        is_precision_supported: true,
        are_table_hints_supported: true,
        max_parameters: Some(2100),
    };

    /// PostgreSQL preset.
    pub const POSTGRES: Self = Self {
        opening_quote: Cow::Borrowed("\""),
        closing_quote: Cow::Borrowed("\""),
        parameter_prefix: Cow::Borrowed("@"),
        schema_separator: Cow::Borrowed("."),
        paging: PagingStyle::LimitOffset,
        is_upsert_supported: true,
        is_multi_statement_executable: true,
        is_direction_supported: false,
        is_precision_supported: true,
        are_table_hints_supported: false,
        max_parameters: Some(32767),
    };

    /// `SQLite` preset.
    pub const SQLITE: Self = Self {
        opening_quote: Cow::Borrowed("\""),
        closing_quote: Cow::Borrowed("\""),
        parameter_prefix: Cow::Borrowed("@"),
        schema_separator: Cow::Borrowed("."),
        paging: PagingStyle::LimitOffset,
        is_upsert_supported: true,
        is_multi_statement_executable: true,
        is_direction_supported: false,
        is_precision_supported: false,
        are_table_hints_supported: false,
        max_parameters: Some(32766),
    };

    /// Text between this dialect's quotes, when `name` is one properly quoted
    /// identifier. Embedded closing quotes must be doubled.
    fn quoted_inner<'a>(&self, name: &'a str) -> Option<&'a str> {
        let close = &*self.closing_quote;
        let inner = name
            .strip_prefix(&*self.opening_quote)?
            .strip_suffix(close)?;
        let doubled = close.repeat(2);
        (!inner.replace(&doubled, "").contains(close)).then_some(inner)
    }

    /// Whether `name` is already one identifier wrapped in this dialect's quotes.
    pub fn is_quoted(&self, name: &str) -> bool {
        self.quoted_inner(name).is_some()
    }

    /// Quote a single identifier. Already-quoted input is returned unchanged;
    /// a closing quote inside the name is doubled.
    pub fn quote(&self, name: &str) -> String {
        let name = name.trim();
        if self.is_quoted(name) {
            return name.to_string();
        }
        let close = &*self.closing_quote;
        format!(
            "{}{}{close}",
            self.opening_quote,
            name.replace(close, &close.repeat(2))
        )
    }

    /// Remove this dialect's quotes, if present. Doubled quotes stay doubled.
    pub fn unquote<'a>(&self, name: &'a str) -> &'a str {
        let name = name.trim();
        self.quoted_inner(name).unwrap_or(name)
    }

    /// Quote a possibly schema-qualified table name.
    ///
    /// `Table` becomes `[Table]`, `dbo.Table` becomes `[dbo].[Table]` and a
    /// fully quoted `[dbo].[Table]` is passed through unchanged.
    pub fn quote_table(&self, name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::EmptyTableName);
        }
        if self.is_quoted(name) {
            return Ok(name.to_string());
        }

        let parts: Vec<String> = name
            .split(&*self.schema_separator)
            .map(|part| self.quote(part))
            .collect();
        if parts.iter().any(|part| self.unquote(part).is_empty()) {
            return Err(Error::EmptyTableName);
        }
        Ok(parts.join(&self.schema_separator))
    }

    /// Parameter-safe form of a name: quotes stripped, every character outside
    /// `[A-Za-z0-9_]` replaced with `_`.
    pub fn parameter_name(&self, name: &str) -> String {
        let name = self.unquote(name);
        let name = name.strip_prefix(&*self.parameter_prefix).unwrap_or(name);
        name.chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
            .collect()
    }

    /// Placeholder text for a (sanitized) parameter name.
    pub fn placeholder(&self, name: &str) -> String {
        if name.starts_with(&*self.parameter_prefix) {
            name.to_string()
        } else {
            format!("{}{name}", self.parameter_prefix)
        }
    }
}
