//! Read statements: query, batch query, count, exists and aggregates.

use super::{Composer, Params, SqlWriter};
use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::field::{Field, OrderField};
use crate::query::QueryGroup;
use crate::setting::PagingStyle;
use crate::statement::{Statement, StatementKind};
use crate::translate::ParameterNames;

fn order_by(composer: &Composer<impl Dialect>, order: &[OrderField]) -> String {
    order
        .iter()
        .map(|o| o.render(composer.setting()))
        .collect::<Vec<_>>()
        .join(", ")
}

// ═══════════════════════════════════════════════════════════════════════════
// QUERY
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for `SELECT` statements.
#[derive(Debug)]
#[must_use = "call .build() to compose the statement"]
pub struct QueryBuilder<'a, D: Dialect> {
    composer: &'a Composer<D>,
    table: &'a str,
    fields: &'a [Field],
    filter: Option<&'a QueryGroup>,
    order: &'a [OrderField],
    top: Option<u32>,
    hints: Option<&'a str>,
}

impl<'a, D: Dialect> QueryBuilder<'a, D> {
    pub(super) const fn new(composer: &'a Composer<D>, table: &'a str) -> Self {
        Self {
            composer,
            table,
            fields: &[],
            filter: None,
            order: &[],
            top: None,
            hints: None,
        }
    }

    /// Projected fields.
    pub const fn fields(mut self, fields: &'a [Field]) -> Self {
        self.fields = fields;
        self
    }

    /// Filter tree.
    pub const fn filter(mut self, filter: &'a QueryGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sort keys, primary first.
    pub const fn order(mut self, order: &'a [OrderField]) -> Self {
        self.order = order;
        self
    }

    /// Row limit. Zero means no limit.
    pub const fn top(mut self, top: u32) -> Self {
        self.top = if top == 0 { None } else { Some(top) };
        self
    }

    /// Table hints, e.g. `WITH (NOLOCK)`.
    pub const fn hints(mut self, hints: &'a str) -> Self {
        self.hints = Some(hints);
        self
    }

    /// Compose the statement.
    pub fn build(self) -> Result<Statement> {
        self.build_as(StatementKind::Query)
    }

    pub(super) fn build_as(self, kind: StatementKind) -> Result<Statement> {
        let c = self.composer;
        let setting = c.setting();
        if self.fields.is_empty() {
            return Err(Error::empty("Query fields"));
        }
        let table = setting.quote_table(self.table)?;
        let hints = c.check_hints(self.hints)?;
        let mut names = ParameterNames::new();
        let clause = c.where_clause(self.filter, &mut names)?;

        let row_number = setting.paging == PagingStyle::RowNumberWindow;
        let mut w = SqlWriter::new();
        w.push("SELECT");
        if let (Some(top), true) = (self.top, row_number) {
            w.push(format!("TOP ({top})"));
        }
        w.push(c.field_list(self.fields))
            .push("FROM")
            .push(table)
            .push(hints.unwrap_or_default());
        let mut params = Params::default();
        if let Some(clause) = clause {
            w.push("WHERE").push(clause.text);
            params.extend(clause.parameters)?;
        }
        if !self.order.is_empty() {
            w.push("ORDER BY").push(order_by(c, self.order));
        }
        if let (Some(top), false) = (self.top, row_number) {
            w.push(format!("LIMIT {top}"));
        }
        w.end();
        Ok(c.finish(kind, self.table, w, params.into_vec()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// BATCH QUERY
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for paged queries.
#[derive(Debug)]
#[must_use = "call .build() to compose the statement"]
pub struct BatchQueryBuilder<'a, D: Dialect> {
    composer: &'a Composer<D>,
    table: &'a str,
    fields: &'a [Field],
    filter: Option<&'a QueryGroup>,
    order: &'a [OrderField],
    page: u32,
    rows_per_batch: u32,
    hints: Option<&'a str>,
}

impl<'a, D: Dialect> BatchQueryBuilder<'a, D> {
    pub(super) const fn new(composer: &'a Composer<D>, table: &'a str) -> Self {
        Self {
            composer,
            table,
            fields: &[],
            filter: None,
            order: &[],
            page: 0,
            rows_per_batch: 0,
            hints: None,
        }
    }

    /// Projected fields.
    pub const fn fields(mut self, fields: &'a [Field]) -> Self {
        self.fields = fields;
        self
    }

    /// Filter tree.
    pub const fn filter(mut self, filter: &'a QueryGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Sort keys. At least one is required.
    pub const fn order(mut self, order: &'a [OrderField]) -> Self {
        self.order = order;
        self
    }

    /// Zero-based page and page size.
    pub const fn page(mut self, page: u32, rows_per_batch: u32) -> Self {
        self.page = page;
        self.rows_per_batch = rows_per_batch;
        self
    }

    /// Table hints.
    pub const fn hints(mut self, hints: &'a str) -> Self {
        self.hints = Some(hints);
        self
    }

    /// Compose the statement.
    pub fn build(self) -> Result<Statement> {
        let c = self.composer;
        let setting = c.setting();
        if self.fields.is_empty() {
            return Err(Error::empty("Query fields"));
        }
        if self.order.is_empty() {
            return Err(Error::empty("Order fields"));
        }
        if self.rows_per_batch == 0 {
            return Err(Error::invalid_argument(
                "rows_per_batch",
                "must be greater than zero",
            ));
        }
        let table = setting.quote_table(self.table)?;
        let hints = c.check_hints(self.hints)?;
        let mut names = ParameterNames::new();
        let clause = c.where_clause(self.filter, &mut names)?;

        let fields = c.field_list(self.fields);
        let order = order_by(c, self.order);
        let offset = u64::from(self.page) * u64::from(self.rows_per_batch);
        let mut params = Params::default();
        let mut w = SqlWriter::new();

        match setting.paging {
            PagingStyle::RowNumberWindow => {
                w.push("WITH CTE AS ( SELECT ROW_NUMBER() OVER ( ORDER BY")
                    .push(&order)
                    .push(")")
                    .push(format!("AS {}, {fields}", setting.quote("RowNumber")))
                    .push("FROM")
                    .push(table)
                    .push(hints.unwrap_or_default());
                if let Some(clause) = clause {
                    w.push("WHERE").push(clause.text);
                    params.extend(clause.parameters)?;
                }
                w.push(") SELECT")
                    .push(&fields)
                    .push("FROM CTE WHERE (")
                    .push(setting.quote("RowNumber"))
                    .push(format!(
                        "BETWEEN {} AND {}",
                        offset + 1,
                        offset + u64::from(self.rows_per_batch)
                    ))
                    .push(") ORDER BY")
                    .push(&order);
            },
            PagingStyle::LimitOffset => {
                w.push("SELECT")
                    .push(&fields)
                    .push("FROM")
                    .push(table)
                    .push(hints.unwrap_or_default());
                if let Some(clause) = clause {
                    w.push("WHERE").push(clause.text);
                    params.extend(clause.parameters)?;
                }
                w.push("ORDER BY")
                    .push(&order)
                    .push(format!("LIMIT {} OFFSET {offset}", self.rows_per_batch));
            },
        }
        w.end();
        Ok(c.finish(StatementKind::BatchQuery, self.table, w, params.into_vec()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// AGGREGATES
// ═══════════════════════════════════════════════════════════════════════════

/// Aggregate function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// `COUNT(1)` / `COUNT_BIG(1)`
    Count,
    /// One row when anything matches.
    Exists,
    /// `SUM(field)`
    Sum,
    /// `AVG(field)`, integral columns cast to floating point first
    Average,
    /// `MIN(field)`
    Min,
    /// `MAX(field)`
    Max,
}

impl Aggregate {
    /// Alias of the single result column.
    pub const fn alias(self) -> &'static str {
        match self {
            Self::Count => "CountValue",
            Self::Exists => "ExistsValue",
            Self::Sum => "SumValue",
            Self::Average => "AverageValue",
            Self::Min => "MinValue",
            Self::Max => "MaxValue",
        }
    }

    const fn kind(self) -> StatementKind {
        match self {
            Self::Count => StatementKind::Count,
            Self::Exists => StatementKind::Exists,
            Self::Sum => StatementKind::Sum,
            Self::Average => StatementKind::Average,
            Self::Min => StatementKind::Min,
            Self::Max => StatementKind::Max,
        }
    }
}

/// Builder for count, exists and field aggregates.
#[derive(Debug)]
#[must_use = "call .build() to compose the statement"]
pub struct AggregateBuilder<'a, D: Dialect> {
    composer: &'a Composer<D>,
    table: &'a str,
    function: Aggregate,
    field: Option<&'a Field>,
    filter: Option<&'a QueryGroup>,
    hints: Option<&'a str>,
}

impl<'a, D: Dialect> AggregateBuilder<'a, D> {
    pub(super) const fn new(composer: &'a Composer<D>, table: &'a str, function: Aggregate) -> Self {
        Self {
            composer,
            table,
            function,
            field: None,
            filter: None,
            hints: None,
        }
    }

    /// Aggregated field (required for sum, average, min and max).
    pub const fn field(mut self, field: &'a Field) -> Self {
        self.field = Some(field);
        self
    }

    /// Filter tree.
    pub const fn filter(mut self, filter: &'a QueryGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Table hints.
    pub const fn hints(mut self, hints: &'a str) -> Self {
        self.hints = Some(hints);
        self
    }

    /// Compose the statement.
    pub fn build(self) -> Result<Statement> {
        let kind = self.function.kind();
        self.build_as(kind)
    }

    /// Average operand: integral columns cast to the dialect's floating
    /// type, floating columns as they are, anything else cast to its own
    /// type name.
    fn average_operand(&self, field: &Field) -> String {
        let c = self.composer;
        let column = c.setting().quote(&field.name);
        match field.client_type {
            None => column,
            Some(ty) if ty.is_floating() => column,
            Some(ty) if ty.is_integral() => c.dialect().convert(&column, c.dialect().average_type()),
            Some(ty) => c.dialect().convert(&column, ty),
        }
    }

    pub(super) fn build_as(self, kind: StatementKind) -> Result<Statement> {
        let c = self.composer;
        let setting = c.setting();
        let table = setting.quote_table(self.table)?;
        let hints = c.check_hints(self.hints)?;
        let alias = setting.quote(self.function.alias());
        let row_number = setting.paging == PagingStyle::RowNumberWindow;

        let expression = match self.function {
            Aggregate::Count => format!("{} (1)", c.dialect().count_function()),
            Aggregate::Exists => "1".to_string(),
            function => {
                let field = self
                    .field
                    .ok_or_else(|| Error::empty(format!("{function:?} field")))?;
                let operand = match function {
                    Aggregate::Average => self.average_operand(field),
                    _ => setting.quote(&field.name),
                };
                let name = match function {
                    Aggregate::Sum => "SUM",
                    Aggregate::Average => "AVG",
                    Aggregate::Min => "MIN",
                    _ => "MAX",
                };
                format!("{name} ({operand})")
            },
        };

        let mut names = ParameterNames::new();
        let clause = c.where_clause(self.filter, &mut names)?;
        let exists = self.function == Aggregate::Exists;

        let mut w = SqlWriter::new();
        w.push("SELECT")
            .push_if(exists && row_number, "TOP (1)")
            .push(expression)
            .push("AS")
            .push(alias)
            .push("FROM")
            .push(table)
            .push(hints.unwrap_or_default());
        let mut params = Params::default();
        if let Some(clause) = clause {
            w.push("WHERE").push(clause.text);
            params.extend(clause.parameters)?;
        }
        w.push_if(exists && !row_number, "LIMIT 1").end();
        Ok(c.finish(kind, self.table, w, params.into_vec()))
    }
}
