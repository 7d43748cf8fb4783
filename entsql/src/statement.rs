//! Composed statements and their parameter slots.

use std::fmt;

use crate::value::{ClientType, DbType, Value};

/// Operation a statement was composed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatementKind {
    Query,
    QueryAll,
    BatchQuery,
    Count,
    CountAll,
    Exists,
    Sum,
    Average,
    Min,
    Max,
    Insert,
    InsertAll,
    Update,
    UpdateAll,
    Delete,
    DeleteAll,
    Truncate,
    Merge,
    MergeAll,
}

impl fmt::Display for StatementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Parameter direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Input,
    Output,
    InputOutput,
}

/// Where a parameter's value comes from at bind time.
#[derive(Debug, Clone, PartialEq)]
pub enum ParameterSource {
    /// A filter operand captured at composition time.
    Literal(Value),
    /// Column `column` of the entity at position `row` in the batch.
    Column { column: String, row: usize },
    /// Output slot filled by the database.
    Output,
}

/// One parameter slot of a composed statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    /// Name without the dialect prefix.
    pub name: String,
    /// Value source.
    pub source: ParameterSource,
    /// Expected client type, when known.
    pub client_type: Option<ClientType>,
    /// Declared database type, when known.
    pub db_type: Option<DbType>,
    /// Declared size.
    pub size: Option<u32>,
    /// Declared precision.
    pub precision: Option<u8>,
    /// Declared scale.
    pub scale: Option<u8>,
    /// Direction.
    pub direction: Direction,
}

impl Parameter {
    /// Input parameter with a literal value.
    pub fn literal(name: impl Into<String>, value: Value) -> Self {
        Self::with_source(name, ParameterSource::Literal(value), Direction::Input)
    }

    /// Input parameter reading `column` from batch row `row`.
    pub fn column(name: impl Into<String>, column: impl Into<String>, row: usize) -> Self {
        Self::with_source(
            name,
            ParameterSource::Column {
                column: column.into(),
                row,
            },
            Direction::Input,
        )
    }

    /// Output parameter.
    pub fn output(name: impl Into<String>) -> Self {
        Self::with_source(name, ParameterSource::Output, Direction::Output)
    }

    fn with_source(name: impl Into<String>, source: ParameterSource, direction: Direction) -> Self {
        Self {
            name: name.into(),
            source,
            client_type: None,
            db_type: None,
            size: None,
            precision: None,
            scale: None,
            direction,
        }
    }

    /// Set the client type.
    #[must_use]
    pub const fn typed(mut self, client_type: Option<ClientType>) -> Self {
        self.client_type = client_type;
        self
    }
}

/// SQL text plus its ordered parameter slots.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    /// Operation kind.
    pub kind: StatementKind,
    /// SQL text.
    pub sql: String,
    /// Parameters in first-appearance order, names unique.
    pub parameters: Vec<Parameter>,
}

impl Statement {
    /// Names of every parameter, without prefix.
    pub fn parameter_names(&self) -> Vec<&str> {
        self.parameters.iter().map(|p| p.name.as_str()).collect()
    }

    /// Find a parameter by name (case-insensitive).
    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.sql)
    }
}
