//! SQL dialect implementations for SQL Server, Postgres and `SQLite`.
//!
//! Most syntax differences are data and live in [`DbSetting`]. The trait
//! covers the rest: type names for casts, the count function, identity
//! retrieval and the native upsert form.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::setting::DbSetting;
use crate::value::ClientType;

/// How the generated identity of an inserted row is read back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityRetrieval {
    /// A scalar function evaluated after the insert, e.g. `SCOPE_IDENTITY()`.
    Function(&'static str),
    /// `RETURNING <column>` on the insert itself.
    Returning,
}

/// Native upsert statement form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertStyle {
    /// `MERGE ... USING ... WHEN MATCHED ... WHEN NOT MATCHED ...`.
    Merge,
    /// `INSERT ... ON CONFLICT (...) DO UPDATE SET ...`.
    OnConflict,
}

/// SQL dialect trait for database-specific syntax.
pub trait Dialect: Clone + Copy + fmt::Debug + Send + Sync + 'static {
    /// Display name used in errors and logs.
    fn name(&self) -> &'static str;

    /// Default setting for this dialect.
    fn setting(&self) -> DbSetting;

    /// Database type name used in casts.
    fn type_name(&self, ty: ClientType) -> &'static str;

    /// Wrap `expr` in a conversion to `ty`.
    fn convert(&self, expr: &str, ty: ClientType) -> String {
        format!("CAST({expr} AS {})", self.type_name(ty))
    }

    /// Function used by `COUNT` statements.
    fn count_function(&self) -> &'static str {
        "COUNT"
    }

    /// Floating type averages are cast to.
    fn average_type(&self) -> ClientType {
        ClientType::F64
    }

    /// How inserted identities are read back.
    fn identity_retrieval(&self) -> IdentityRetrieval {
        IdentityRetrieval::Returning
    }

    /// Native upsert form, used when the setting enables upserts.
    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::OnConflict
    }

    /// Whether `TRUNCATE TABLE` exists. Otherwise truncation is `DELETE FROM`.
    fn supports_truncate(&self) -> bool {
        true
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SQL SERVER
// ═══════════════════════════════════════════════════════════════════════════

/// SQL Server dialect. The reference dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqlServer;

impl Dialect for SqlServer {
    #[inline]
    fn name(&self) -> &'static str {
        "SqlServer"
    }

    fn setting(&self) -> DbSetting {
        DbSetting::SQL_SERVER
    }

    fn type_name(&self, ty: ClientType) -> &'static str {
        match ty {
            ClientType::Bool => "BIT",
            ClientType::U8 => "TINYINT",
            ClientType::I8 | ClientType::I16 => "SMALLINT",
            ClientType::I32 | ClientType::U16 => "INT",
            ClientType::I64 | ClientType::U32 => "BIGINT",
            ClientType::F32 => "REAL",
            ClientType::F64 => "FLOAT",
            ClientType::String | ClientType::Json | ClientType::Enum(_) => "NVARCHAR(MAX)",
            ClientType::Bytes => "VARBINARY(MAX)",
            ClientType::Uuid => "UNIQUEIDENTIFIER",
            ClientType::Date => "DATE",
            ClientType::Time => "TIME",
            ClientType::DateTime => "DATETIME2",
        }
    }

    fn convert(&self, expr: &str, ty: ClientType) -> String {
        format!("CONVERT({}, {expr})", self.type_name(ty))
    }

    #[inline]
    fn count_function(&self) -> &'static str {
        "COUNT_BIG"
    }

    #[inline]
    fn identity_retrieval(&self) -> IdentityRetrieval {
        IdentityRetrieval::Function("SCOPE_IDENTITY()")
    }

    #[inline]
    fn upsert_style(&self) -> UpsertStyle {
        UpsertStyle::Merge
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// POSTGRES
// ═══════════════════════════════════════════════════════════════════════════

/// Postgres dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Postgres;

impl Dialect for Postgres {
    #[inline]
    fn name(&self) -> &'static str {
        "Postgres"
    }

    fn setting(&self) -> DbSetting {
        DbSetting::POSTGRES
    }

    fn type_name(&self, ty: ClientType) -> &'static str {
        match ty {
            ClientType::Bool => "BOOLEAN",
            ClientType::I8 | ClientType::I16 | ClientType::U8 => "SMALLINT",
            ClientType::I32 | ClientType::U16 => "INTEGER",
            ClientType::I64 | ClientType::U32 => "BIGINT",
            ClientType::F32 => "REAL",
            ClientType::F64 => "DOUBLE PRECISION",
            ClientType::String | ClientType::Enum(_) => "TEXT",
            ClientType::Bytes => "BYTEA",
            ClientType::Uuid => "UUID",
            ClientType::Date => "DATE",
            ClientType::Time => "TIME",
            ClientType::DateTime => "TIMESTAMP",
            ClientType::Json => "JSONB",
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// SQLITE
// ═══════════════════════════════════════════════════════════════════════════

/// `SQLite` dialect.
#[derive(Debug, Clone, Copy, Default)]
pub struct Sqlite;

impl Dialect for Sqlite {
    #[inline]
    fn name(&self) -> &'static str {
        "Sqlite"
    }

    fn setting(&self) -> DbSetting {
        DbSetting::SQLITE
    }

    fn type_name(&self, ty: ClientType) -> &'static str {
        // SQLite only has storage classes
        match ty {
            ClientType::Bool
            | ClientType::I8
            | ClientType::I16
            | ClientType::I32
            | ClientType::I64
            | ClientType::U8
            | ClientType::U16
            | ClientType::U32 => "INTEGER",
            ClientType::F32 | ClientType::F64 => "REAL",
            ClientType::Bytes => "BLOB",
            ClientType::String
            | ClientType::Uuid
            | ClientType::Date
            | ClientType::Time
            | ClientType::DateTime
            | ClientType::Json
            | ClientType::Enum(_) => "TEXT",
        }
    }

    #[inline]
    fn supports_truncate(&self) -> bool {
        false
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RUNTIME SELECTION
// ═══════════════════════════════════════════════════════════════════════════

/// Dialect chosen at runtime, e.g. from a config file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnyDialect {
    /// [`SqlServer`].
    #[default]
    SqlServer,
    /// [`Postgres`].
    Postgres,
    /// [`Sqlite`].
    Sqlite,
}

impl AnyDialect {
    /// Parse a dialect name (`sql_server`/`sqlserver`/`mssql`, `postgres`/`postgresql`, `sqlite`).
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "sql_server" | "sqlserver" | "mssql" => Some(Self::SqlServer),
            "postgres" | "postgresql" | "pg" => Some(Self::Postgres),
            "sqlite" => Some(Self::Sqlite),
            _ => None,
        }
    }
}

macro_rules! delegate {
    ($self:ident, $d:ident => $body:expr) => {
        match $self {
            AnyDialect::SqlServer => {
                let $d = SqlServer;
                $body
            },
            AnyDialect::Postgres => {
                let $d = Postgres;
                $body
            },
            AnyDialect::Sqlite => {
                let $d = Sqlite;
                $body
            },
        }
    };
}

impl Dialect for AnyDialect {
    fn name(&self) -> &'static str {
        delegate!(self, d => d.name())
    }

    fn setting(&self) -> DbSetting {
        delegate!(self, d => d.setting())
    }

    fn type_name(&self, ty: ClientType) -> &'static str {
        delegate!(self, d => d.type_name(ty))
    }

    fn convert(&self, expr: &str, ty: ClientType) -> String {
        delegate!(self, d => d.convert(expr, ty))
    }

    fn count_function(&self) -> &'static str {
        delegate!(self, d => d.count_function())
    }

    fn average_type(&self) -> ClientType {
        delegate!(self, d => d.average_type())
    }

    fn identity_retrieval(&self) -> IdentityRetrieval {
        delegate!(self, d => d.identity_retrieval())
    }

    fn upsert_style(&self) -> UpsertStyle {
        delegate!(self, d => d.upsert_style())
    }

    fn supports_truncate(&self) -> bool {
        delegate!(self, d => d.supports_truncate())
    }
}
