//! Configuration: dialect choice, batch size and setting overrides.
//!
//! Loaded from TOML, then optionally overridden from an environment
//! snapshot:
//!
//! ```toml
//! dialect = "postgres"
//! batch_size = 50
//!
//! [setting]
//! parameter_prefix = "@"
//! max_parameters = 1000
//! is_upsert_supported = false
//! ```
//!
//! | Variable | Field |
//! |----------|-------|
//! | `ENTSQL_DIALECT` | `dialect` |
//! | `ENTSQL_BATCH_SIZE` | `batch_size` |
//! | `ENTSQL_PARAMETER_PREFIX` | `setting.parameter_prefix` |
//! | `ENTSQL_MAX_PARAMETERS` | `setting.max_parameters` |
//! | `ENTSQL_UPSERT` | `setting.is_upsert_supported` |
//! | `ENTSQL_MULTI_STATEMENT` | `setting.is_multi_statement_executable` |

use std::borrow::Cow;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::dialect::{AnyDialect, Dialect};
use crate::env;
use crate::error::{Error, Result};
use crate::mapper::Mapper;
use crate::mapping::MappingLookup;
use crate::setting::DbSetting;

/// Rows per batch statement when nothing is configured.
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Per-field overrides applied on top of the dialect preset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingOverrides {
    /// Parameter prefix, e.g. `@` or `:`.
    pub parameter_prefix: Option<String>,
    /// Provider cap on parameters per command.
    pub max_parameters: Option<usize>,
    /// Native upsert on or off.
    pub is_upsert_supported: Option<bool>,
    /// Multi-statement commands on or off.
    pub is_multi_statement_executable: Option<bool>,
    /// Table hints on or off.
    pub are_table_hints_supported: Option<bool>,
}

/// Resolved configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Target dialect.
    pub dialect: AnyDialect,
    /// Rows per batch statement.
    pub batch_size: usize,
    /// Overrides of the dialect preset.
    pub setting: SettingOverrides,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            dialect: AnyDialect::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            setting: SettingOverrides::default(),
        }
    }
}

impl Config {
    /// Parse TOML text. Missing keys keep their defaults.
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::InvalidConfiguration {
            table: "config".to_string(),
            field: "*".to_string(),
            reason: e.message().to_string(),
        })?;
        if config.batch_size == 0 {
            return Err(Error::InvalidConfiguration {
                table: "config".to_string(),
                field: "batch_size".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }
        if config.setting.parameter_prefix.as_deref().is_some_and(str::is_empty) {
            return Err(Error::InvalidConfiguration {
                table: "config".to_string(),
                field: "setting.parameter_prefix".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        Ok(config)
    }

    /// Apply `ENTSQL_*` overrides. Malformed values are logged and ignored.
    #[must_use]
    pub fn with_env(mut self, vars: &[(String, String)]) -> Self {
        if let Some(raw) = env::get(vars, "ENTSQL_DIALECT") {
            match AnyDialect::parse(&raw) {
                Some(dialect) => self.dialect = dialect,
                None => warn!(value = %raw, "ignoring unknown ENTSQL_DIALECT"),
            }
        }
        match env::usize(vars, "ENTSQL_BATCH_SIZE") {
            Some(Ok(n)) if n > 0 => self.batch_size = n,
            Some(Ok(_) | Err(_)) => {
                warn!(value = ?env::get(vars, "ENTSQL_BATCH_SIZE"), "ignoring invalid ENTSQL_BATCH_SIZE");
            },
            None => {},
        }
        if let Some(prefix) = env::get(vars, "ENTSQL_PARAMETER_PREFIX") {
            if prefix.trim().is_empty() {
                warn!("ignoring empty ENTSQL_PARAMETER_PREFIX");
            } else {
                self.setting.parameter_prefix = Some(prefix.trim().to_string());
            }
        }
        match env::usize(vars, "ENTSQL_MAX_PARAMETERS") {
            Some(Ok(n)) if n > 0 => self.setting.max_parameters = Some(n),
            Some(Ok(_) | Err(_)) => {
                warn!(value = ?env::get(vars, "ENTSQL_MAX_PARAMETERS"), "ignoring invalid ENTSQL_MAX_PARAMETERS");
            },
            None => {},
        }
        if env::get(vars, "ENTSQL_UPSERT").is_some() {
            self.setting.is_upsert_supported = Some(env::bool(vars, "ENTSQL_UPSERT", true));
        }
        if env::get(vars, "ENTSQL_MULTI_STATEMENT").is_some() {
            self.setting.is_multi_statement_executable =
                Some(env::bool(vars, "ENTSQL_MULTI_STATEMENT", true));
        }
        debug!(dialect = self.dialect.name(), batch_size = self.batch_size, "configuration resolved");
        self
    }

    /// Dialect preset with the overrides applied.
    pub fn setting(&self) -> DbSetting {
        let mut setting = self.dialect.setting();
        let o = &self.setting;
        if let Some(prefix) = &o.parameter_prefix {
            setting.parameter_prefix = Cow::Owned(prefix.clone());
        }
        if let Some(max) = o.max_parameters {
            setting.max_parameters = Some(max);
        }
        if let Some(flag) = o.is_upsert_supported {
            setting.is_upsert_supported = flag;
        }
        if let Some(flag) = o.is_multi_statement_executable {
            setting.is_multi_statement_executable = flag;
        }
        if let Some(flag) = o.are_table_hints_supported {
            setting.are_table_hints_supported = flag;
        }
        setting
    }

    /// Facade over this configuration.
    pub fn mapper<'l>(&self, lookup: &'l dyn MappingLookup) -> Mapper<'l, AnyDialect> {
        Mapper::with_setting(self.dialect, self.setting(), lookup).batch_size(self.batch_size)
    }
}
