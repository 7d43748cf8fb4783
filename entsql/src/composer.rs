//! Statement composition.
//!
//! [`Composer`] turns a table name, resolved fields, an optional filter tree
//! and ordering into a [`Statement`]. Every call is a pure function of its
//! inputs: composing twice yields byte-identical SQL.
//!
//! Output is a sequence of space-separated tokens terminated by ` ;`, e.g.
//! `SELECT COUNT_BIG (1) AS [CountValue] FROM [Table] ;`.

mod merge;
mod modify;
mod select;

pub use merge::MergeBuilder;
pub use modify::{DeleteBuilder, InsertBuilder, UpdateAllBuilder, UpdateBuilder};
pub use select::{Aggregate, AggregateBuilder, BatchQueryBuilder, QueryBuilder};

use std::collections::HashMap;

use tracing::debug;

use crate::dialect::Dialect;
use crate::error::{Error, Result};
use crate::field::{DbField, Field, find_field};
use crate::query::QueryGroup;
use crate::setting::DbSetting;
use crate::statement::{Parameter, Statement, StatementKind};
use crate::translate::{ParameterNames, WhereClause, translate};

/// Composes SQL statements for one dialect.
#[derive(Debug, Clone)]
pub struct Composer<D: Dialect> {
    dialect: D,
    setting: DbSetting,
}

impl<D: Dialect> Composer<D> {
    /// Composer using the dialect's default setting.
    pub fn new(dialect: D) -> Self {
        Self {
            setting: dialect.setting(),
            dialect,
        }
    }

    /// Composer with a customized setting.
    pub const fn with_setting(dialect: D, setting: DbSetting) -> Self {
        Self { dialect, setting }
    }

    /// The dialect.
    pub const fn dialect(&self) -> D {
        self.dialect
    }

    /// The setting.
    pub const fn setting(&self) -> &DbSetting {
        &self.setting
    }

    /// `SELECT` with optional filter, ordering, row limit and hints.
    pub fn query<'a>(&'a self, table: &'a str) -> QueryBuilder<'a, D> {
        QueryBuilder::new(self, table)
    }

    /// Page of rows ordered by at least one field.
    pub fn batch_query<'a>(&'a self, table: &'a str) -> BatchQueryBuilder<'a, D> {
        BatchQueryBuilder::new(self, table)
    }

    /// `SELECT COUNT`.
    pub fn count<'a>(&'a self, table: &'a str) -> AggregateBuilder<'a, D> {
        AggregateBuilder::new(self, table, Aggregate::Count)
    }

    /// Existence check returning one row when any row matches.
    pub fn exists<'a>(&'a self, table: &'a str) -> AggregateBuilder<'a, D> {
        AggregateBuilder::new(self, table, Aggregate::Exists)
    }

    /// `SUM`, `AVG`, `MIN` or `MAX` over `field`.
    pub fn aggregate<'a>(
        &'a self,
        table: &'a str,
        function: Aggregate,
        field: &'a Field,
    ) -> AggregateBuilder<'a, D> {
        AggregateBuilder::new(self, table, function).field(field)
    }

    /// Single-row `INSERT` returning the new key.
    pub fn insert<'a>(&'a self, table: &'a str) -> InsertBuilder<'a, D> {
        InsertBuilder::new(self, table, None)
    }

    /// Multi-row `INSERT`, one statement per row, row-suffixed parameters.
    pub fn insert_all<'a>(&'a self, table: &'a str) -> InsertBuilder<'a, D> {
        InsertBuilder::new(self, table, Some(1))
    }

    /// `UPDATE` filtered explicitly or by key.
    pub fn update<'a>(&'a self, table: &'a str) -> UpdateBuilder<'a, D> {
        UpdateBuilder::new(self, table)
    }

    /// Multi-row `UPDATE` keyed by qualifier fields.
    pub fn update_all<'a>(&'a self, table: &'a str) -> UpdateAllBuilder<'a, D> {
        UpdateAllBuilder::new(self, table)
    }

    /// `DELETE` with an optional filter.
    pub fn delete<'a>(&'a self, table: &'a str) -> DeleteBuilder<'a, D> {
        DeleteBuilder::new(self, table)
    }

    /// Upsert of one row.
    pub fn merge<'a>(&'a self, table: &'a str) -> MergeBuilder<'a, D> {
        MergeBuilder::new(self, table, None)
    }

    /// Upsert of several rows.
    pub fn merge_all<'a>(&'a self, table: &'a str) -> MergeBuilder<'a, D> {
        MergeBuilder::new(self, table, Some(1))
    }

    /// Unfiltered `SELECT`.
    pub fn create_query_all(
        &self,
        table: &str,
        fields: &[Field],
        order: &[crate::field::OrderField],
        hints: Option<&str>,
    ) -> Result<Statement> {
        let mut builder = self.query(table).fields(fields).order(order);
        if let Some(hints) = hints {
            builder = builder.hints(hints);
        }
        builder.build_as(StatementKind::QueryAll)
    }

    /// Unfiltered `SELECT COUNT`.
    pub fn create_count_all(&self, table: &str, hints: Option<&str>) -> Result<Statement> {
        let mut builder = self.count(table);
        if let Some(hints) = hints {
            builder = builder.hints(hints);
        }
        builder.build_as(StatementKind::CountAll)
    }

    /// `DELETE FROM [Table] ;`.
    pub fn create_delete_all(&self, table: &str) -> Result<Statement> {
        let mut w = SqlWriter::new();
        w.push("DELETE FROM").push(self.setting.quote_table(table)?).end();
        Ok(self.finish(StatementKind::DeleteAll, table, w, Vec::new()))
    }

    /// `TRUNCATE TABLE [Table] ;`, or `DELETE FROM` where truncation does not exist.
    pub fn create_truncate(&self, table: &str) -> Result<Statement> {
        let mut w = SqlWriter::new();
        let keyword = if self.dialect.supports_truncate() {
            "TRUNCATE TABLE"
        } else {
            "DELETE FROM"
        };
        w.push(keyword).push(self.setting.quote_table(table)?).end();
        Ok(self.finish(StatementKind::Truncate, table, w, Vec::new()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // SHARED HELPERS
    // ═══════════════════════════════════════════════════════════════════════

    fn finish(
        &self,
        kind: StatementKind,
        table: &str,
        w: SqlWriter,
        parameters: Vec<Parameter>,
    ) -> Statement {
        let sql = w.finish();
        debug!(
            dialect = self.dialect.name(),
            kind = %kind,
            table,
            parameters = parameters.len(),
            "statement composed"
        );
        Statement {
            kind,
            sql,
            parameters,
        }
    }

    fn check_hints(&self, hints: Option<&str>) -> Result<Option<String>> {
        match hints.map(str::trim).filter(|h| !h.is_empty()) {
            None => Ok(None),
            Some(_) if !self.setting.are_table_hints_supported => Err(Error::Unsupported {
                dialect: self.dialect.name(),
                feature: "table hints",
            }),
            Some(h) => Ok(Some(h.to_string())),
        }
    }

    fn check_batch(&self, batch_size: usize) -> Result<()> {
        if batch_size == 0 {
            return Err(Error::invalid_argument("batch_size", "must be greater than zero"));
        }
        if batch_size > 1 && !self.setting.is_multi_statement_executable {
            return Err(Error::Unsupported {
                dialect: self.dialect.name(),
                feature: "multi-statement batches",
            });
        }
        Ok(())
    }

    /// Translate an optional filter; empty groups mean no filter.
    fn where_clause(
        &self,
        filter: Option<&QueryGroup>,
        names: &mut ParameterNames,
    ) -> Result<Option<WhereClause>> {
        match filter {
            Some(group) if !group.is_empty() => translate(group, &self.setting, names).map(Some),
            _ => Ok(None),
        }
    }

    fn field_list(&self, fields: &[Field]) -> String {
        fields
            .iter()
            .map(|f| self.setting.quote(&f.name))
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Parameter bound to `field` of batch row `row`, carrying schema metadata.
    fn column_param(
        &self,
        field: &Field,
        db_fields: &[DbField],
        row: usize,
        params: &mut Params,
    ) -> Parameter {
        let db = db_fields
            .iter()
            .find(|d| d.name.eq_ignore_ascii_case(&field.name));
        let name = params.slot(&self.setting, &field.name, row);
        let mut param = Parameter::column(name, &field.name, row);
        param.client_type = field.client_type.or_else(|| db.and_then(|d| d.client_type));
        param.db_type = field.db_type;
        if let Some(db) = db {
            param.size = db.size;
            param.precision = db.precision;
            param.scale = db.scale;
        }
        param
    }

    /// `([A] = @A AND [B] = @B)` over key or qualifier fields for one row.
    fn key_condition(
        &self,
        keys: &[&Field],
        db_fields: &[DbField],
        row: usize,
        params: &mut Params,
    ) -> Result<String> {
        let mut parts = Vec::with_capacity(keys.len());
        for field in keys {
            let param = self.column_param(field, db_fields, row, params);
            parts.push(format!(
                "{} = {}",
                self.setting.quote(&field.name),
                self.setting.placeholder(&param.name)
            ));
            params.add(param)?;
        }
        Ok(format!("({})", parts.join(" AND ")))
    }

    /// Resolve qualifier fields: explicit names must be in `fields`; none
    /// supplied means the primary key, then the identity.
    fn qualifiers<'f>(
        &self,
        table: &str,
        fields: &'f [Field],
        qualifiers: &[Field],
        keys: &crate::resolver::Keys,
        context: &str,
    ) -> Result<Vec<&'f Field>> {
        if qualifiers.is_empty() {
            let key = keys
                .key()
                .and_then(|k| find_field(fields, &k.name))
                .ok_or_else(|| Error::PrimaryFieldNotFound {
                    table: table.to_string(),
                    context: context.to_string(),
                })?;
            return Ok(vec![key]);
        }

        qualifiers
            .iter()
            .map(|q| {
                find_field(fields, &q.name).ok_or_else(|| Error::InvalidConfiguration {
                    table: table.to_string(),
                    field: q.name.clone(),
                    reason: "qualifier is not part of the field list".to_string(),
                })
            })
            .collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// TOKEN WRITER
// ═══════════════════════════════════════════════════════════════════════════

/// Joins SQL tokens with single spaces.
#[derive(Debug, Default)]
pub(crate) struct SqlWriter {
    sql: String,
}

impl SqlWriter {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, token: impl AsRef<str>) -> &mut Self {
        let token = token.as_ref();
        if token.is_empty() {
            return self;
        }
        if !self.sql.is_empty() {
            self.sql.push(' ');
        }
        self.sql.push_str(token);
        self
    }

    pub(crate) fn push_if(&mut self, cond: bool, token: impl AsRef<str>) -> &mut Self {
        if cond {
            self.push(token);
        }
        self
    }

    /// Statement terminator.
    pub(crate) fn end(&mut self) -> &mut Self {
        self.push(";")
    }

    pub(crate) fn finish(self) -> String {
        self.sql
    }
}

/// Ordered parameter list with unique names.
///
/// Owns the statement's name scope: column slots and filter operands draw
/// from the same [`ParameterNames`], so no two sources share a name.
#[derive(Debug, Default)]
pub(crate) struct Params {
    list: Vec<Parameter>,
    index: HashMap<String, usize>,
    names: ParameterNames,
    slots: HashMap<(String, usize), String>,
}

impl Params {
    /// Name of `column` in batch row `row`. Allocated on first use, reused after.
    pub(crate) fn slot(&mut self, setting: &DbSetting, column: &str, row: usize) -> String {
        let key = (column.to_string(), row);
        if let Some(name) = self.slots.get(&key) {
            return name.clone();
        }
        let base = setting.parameter_name(column);
        let wanted = if row == 0 { base } else { format!("{base}_{row}") };
        let name = self.names.allocate(&wanted);
        self.slots.insert(key, name.clone());
        name
    }

    pub(crate) fn names_mut(&mut self) -> &mut ParameterNames {
        &mut self.names
    }

    /// Append `param`. A repeat of the same slot is skipped; a different
    /// source under a taken name is an error.
    pub(crate) fn add(&mut self, param: Parameter) -> Result<()> {
        let key = param.name.to_ascii_lowercase();
        if let Some(&at) = self.index.get(&key) {
            if self.list.get(at).is_some_and(|p| p.source == param.source) {
                return Ok(());
            }
            return Err(Error::invalid_argument(
                "parameters",
                format!("duplicate parameter name '{}'", param.name),
            ));
        }
        self.names.reserve(&param.name);
        self.index.insert(key, self.list.len());
        self.list.push(param);
        Ok(())
    }

    pub(crate) fn extend(&mut self, params: impl IntoIterator<Item = Parameter>) -> Result<()> {
        for param in params {
            self.add(param)?;
        }
        Ok(())
    }

    pub(crate) fn into_vec(self) -> Vec<Parameter> {
        self.list
    }
}
