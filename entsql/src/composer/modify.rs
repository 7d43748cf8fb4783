//! Write statements: insert, insert-all, update, update-all and delete.

use super::{Composer, Params, SqlWriter};
use crate::dialect::{Dialect, IdentityRetrieval};
use crate::error::{Error, Result};
use crate::field::{DbField, Field, find_field};
use crate::query::QueryGroup;
use crate::resolver::{Key, Keys, reconcile_keys};
use crate::statement::{Parameter, Statement, StatementKind};
use crate::value::ClientType;

/// Width used for identities whose type is unknown.
const DEFAULT_IDENTITY_TYPE: ClientType = ClientType::I64;

impl<D: Dialect> Composer<D> {
    /// `( [A], [B] ) VALUES ( @A_r, @B_r )` for one row.
    pub(super) fn values_clause(
        &self,
        w: &mut SqlWriter,
        fields: &[&Field],
        db_fields: &[DbField],
        row: usize,
        params: &mut Params,
    ) -> Result<()> {
        let columns: Vec<String> = fields.iter().map(|f| self.setting.quote(&f.name)).collect();
        let mut values = Vec::with_capacity(fields.len());
        for field in fields {
            let param = self.column_param(field, db_fields, row, params);
            values.push(self.setting.placeholder(&param.name));
            params.add(param)?;
        }
        w.push("(")
            .push(columns.join(", "))
            .push(")")
            .push("VALUES")
            .push("(")
            .push(values.join(", "))
            .push(")");
        Ok(())
    }

    /// `[A] = @A_r, [B] = @B_r`.
    pub(super) fn set_clause(
        &self,
        fields: &[&Field],
        db_fields: &[DbField],
        row: usize,
        params: &mut Params,
    ) -> Result<String> {
        let mut parts = Vec::with_capacity(fields.len());
        for field in fields {
            let param = self.column_param(field, db_fields, row, params);
            parts.push(format!(
                "{} = {}",
                self.setting.quote(&field.name),
                self.setting.placeholder(&param.name)
            ));
            params.add(param)?;
        }
        Ok(parts.join(", "))
    }

    /// Expression reading back the key of a freshly inserted row.
    pub(super) fn returning_expression(&self, keys: &Keys) -> Option<String> {
        if let Some(identity) = &keys.identity {
            let ty = identity.client_type.unwrap_or(DEFAULT_IDENTITY_TYPE);
            return Some(self.dialect.convert(&self.setting.quote(&identity.name), ty));
        }
        keys.primary
            .as_ref()
            .map(|primary| self.setting.quote(&primary.name))
    }

    pub(super) fn identity_expression(&self, function: &str, identity: &Key) -> String {
        let ty = identity.client_type.unwrap_or(DEFAULT_IDENTITY_TYPE);
        self.dialect.convert(function, ty)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// INSERT
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for `INSERT` statements.
#[derive(Debug)]
#[must_use = "call .build() to compose the statement"]
pub struct InsertBuilder<'a, D: Dialect> {
    composer: &'a Composer<D>,
    table: &'a str,
    fields: &'a [Field],
    db_fields: &'a [DbField],
    batch: Option<usize>,
}

impl<'a, D: Dialect> InsertBuilder<'a, D> {
    pub(super) const fn new(composer: &'a Composer<D>, table: &'a str, batch: Option<usize>) -> Self {
        Self {
            composer,
            table,
            fields: &[],
            db_fields: &[],
            batch,
        }
    }

    /// Fields to insert. Identity columns are skipped.
    pub const fn fields(mut self, fields: &'a [Field]) -> Self {
        self.fields = fields;
        self
    }

    /// Physical schema of the table.
    pub const fn db_fields(mut self, db_fields: &'a [DbField]) -> Self {
        self.db_fields = db_fields;
        self
    }

    /// Rows per statement. Turns the builder into an insert-all.
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch = Some(batch_size);
        self
    }

    /// Compose the statement.
    pub fn build(self) -> Result<Statement> {
        let c = self.composer;
        if self.fields.is_empty() {
            return Err(Error::empty("Insert fields"));
        }
        let table = c.setting.quote_table(self.table)?;
        let keys = reconcile_keys(self.table, self.fields, self.db_fields)?;
        let insertable: Vec<&Field> = self
            .fields
            .iter()
            .filter(|f| !keys.is_identity(&f.name))
            .collect();
        if insertable.is_empty() {
            return Err(Error::empty("Insertable fields"));
        }

        let mut params = Params::default();
        let mut w = SqlWriter::new();

        let Some(batch_size) = self.batch else {
            w.push("INSERT INTO").push(&table);
            c.values_clause(&mut w, &insertable, self.db_fields, 0, &mut params)?;
            let result = c.setting.quote("Result");
            match c.dialect.identity_retrieval() {
                IdentityRetrieval::Function(function) => {
                    let expression = match (&keys.identity, &keys.primary) {
                        (Some(identity), _) => c.identity_expression(function, identity),
                        (None, Some(primary)) if primary.in_fields => c
                            .setting
                            .placeholder(&params.slot(&c.setting, &primary.name, 0)),
                        _ => "NULL".to_string(),
                    };
                    w.end().push("SELECT").push(expression).push("AS").push(result);
                },
                IdentityRetrieval::Returning => {
                    let expression = c
                        .returning_expression(&keys)
                        .unwrap_or_else(|| "NULL".to_string());
                    w.push("RETURNING").push(expression).push("AS").push(result);
                },
            }
            w.end();
            return Ok(c.finish(StatementKind::Insert, self.table, w, params.into_vec()));
        };

        c.check_batch(batch_size)?;
        if let Some(identity) = &keys.identity
            && !identity.in_fields
        {
            return Err(Error::PrimaryFieldNotFound {
                table: self.table.to_string(),
                context: format!("identity '{}' is not part of the inserted fields", identity.name),
            });
        }

        for row in 0..batch_size {
            w.push("INSERT INTO").push(&table);
            c.values_clause(&mut w, &insertable, self.db_fields, row, &mut params)?;
            match (c.dialect.identity_retrieval(), &keys.identity) {
                (IdentityRetrieval::Function(function), Some(identity)) => {
                    let name = params.slot(&c.setting, &identity.name, row);
                    w.end()
                        .push("SET")
                        .push(c.setting.placeholder(&name))
                        .push("=")
                        .push(c.identity_expression(function, identity));
                    params.add(Parameter::output(name).typed(identity.client_type))?;
                },
                (IdentityRetrieval::Returning, Some(_)) => {
                    let expression = c.returning_expression(&keys).unwrap_or_default();
                    w.push("RETURNING")
                        .push(expression)
                        .push("AS")
                        .push(c.setting.quote("Result"));
                },
                (_, None) => {},
            }
            w.end();
        }
        Ok(c.finish(StatementKind::InsertAll, self.table, w, params.into_vec()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// UPDATE
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for single-statement `UPDATE`.
#[derive(Debug)]
#[must_use = "call .build() to compose the statement"]
pub struct UpdateBuilder<'a, D: Dialect> {
    composer: &'a Composer<D>,
    table: &'a str,
    fields: &'a [Field],
    db_fields: &'a [DbField],
    filter: Option<&'a QueryGroup>,
}

impl<'a, D: Dialect> UpdateBuilder<'a, D> {
    pub(super) const fn new(composer: &'a Composer<D>, table: &'a str) -> Self {
        Self {
            composer,
            table,
            fields: &[],
            db_fields: &[],
            filter: None,
        }
    }

    /// Fields to update, including the key when no filter is given.
    pub const fn fields(mut self, fields: &'a [Field]) -> Self {
        self.fields = fields;
        self
    }

    /// Physical schema of the table.
    pub const fn db_fields(mut self, db_fields: &'a [DbField]) -> Self {
        self.db_fields = db_fields;
        self
    }

    /// Explicit filter. Without one the key column is matched.
    pub const fn filter(mut self, filter: &'a QueryGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Compose the statement.
    pub fn build(self) -> Result<Statement> {
        let c = self.composer;
        if self.fields.is_empty() {
            return Err(Error::empty("Update fields"));
        }
        let table = c.setting.quote_table(self.table)?;
        let keys = reconcile_keys(self.table, self.fields, self.db_fields)?;

        let filter = self.filter.filter(|g| !g.is_empty());
        let fallback_key = match filter {
            Some(_) => None,
            None => Some(
                keys.key()
                    .and_then(|k| find_field(self.fields, &k.name))
                    .ok_or_else(|| Error::PrimaryFieldNotFound {
                        table: self.table.to_string(),
                        context: "update without a filter".to_string(),
                    })?,
            ),
        };
        let referenced: Vec<String> = match (filter, fallback_key) {
            (Some(group), _) => group.fields().iter().map(|qf| qf.field.name.clone()).collect(),
            (None, Some(key)) => vec![key.name.clone()],
            (None, None) => Vec::new(),
        };

        let updatable: Vec<&Field> = self
            .fields
            .iter()
            .filter(|f| !keys.is_identity(&f.name))
            .filter(|f| !(keys.is_key(&f.name) && referenced.iter().any(|r| f.is(r))))
            .collect();
        if updatable.is_empty() {
            return Err(Error::empty("Updatable fields"));
        }

        let mut params = Params::default();
        let set = c.set_clause(&updatable, self.db_fields, 0, &mut params)?;

        let condition = if let Some(key) = fallback_key {
            c.key_condition(&[key], self.db_fields, 0, &mut params)?
        } else {
            let clause = c
                .where_clause(filter, params.names_mut())?
                .ok_or_else(|| Error::empty("Update filter"))?;
            params.extend(clause.parameters)?;
            clause.text
        };

        let mut w = SqlWriter::new();
        w.push("UPDATE")
            .push(table)
            .push("SET")
            .push(set)
            .push("WHERE")
            .push(condition)
            .end();
        Ok(c.finish(StatementKind::Update, self.table, w, params.into_vec()))
    }
}

/// Builder for multi-row `UPDATE` keyed by qualifier fields.
#[derive(Debug)]
#[must_use = "call .build() to compose the statement"]
pub struct UpdateAllBuilder<'a, D: Dialect> {
    composer: &'a Composer<D>,
    table: &'a str,
    fields: &'a [Field],
    db_fields: &'a [DbField],
    qualifiers: &'a [Field],
    batch_size: usize,
}

impl<'a, D: Dialect> UpdateAllBuilder<'a, D> {
    pub(super) const fn new(composer: &'a Composer<D>, table: &'a str) -> Self {
        Self {
            composer,
            table,
            fields: &[],
            db_fields: &[],
            qualifiers: &[],
            batch_size: 1,
        }
    }

    /// Fields of every row.
    pub const fn fields(mut self, fields: &'a [Field]) -> Self {
        self.fields = fields;
        self
    }

    /// Physical schema of the table.
    pub const fn db_fields(mut self, db_fields: &'a [DbField]) -> Self {
        self.db_fields = db_fields;
        self
    }

    /// Match columns. Defaults to the primary key, then the identity.
    pub const fn qualifiers(mut self, qualifiers: &'a [Field]) -> Self {
        self.qualifiers = qualifiers;
        self
    }

    /// Rows per statement.
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Compose the statement.
    pub fn build(self) -> Result<Statement> {
        let c = self.composer;
        if self.fields.is_empty() {
            return Err(Error::empty("Update fields"));
        }
        let table = c.setting.quote_table(self.table)?;
        c.check_batch(self.batch_size)?;
        let keys = reconcile_keys(self.table, self.fields, self.db_fields)?;
        let qualifiers = c.qualifiers(
            self.table,
            self.fields,
            self.qualifiers,
            &keys,
            "update-all without qualifiers",
        )?;

        let updatable: Vec<&Field> = self
            .fields
            .iter()
            .filter(|f| !keys.is_identity(&f.name))
            .filter(|f| !qualifiers.iter().any(|q| q.is(&f.name)))
            .collect();
        if updatable.is_empty() {
            return Err(Error::empty("Updatable fields"));
        }

        let mut params = Params::default();
        let mut w = SqlWriter::new();
        for row in 0..self.batch_size {
            let set = c.set_clause(&updatable, self.db_fields, row, &mut params)?;
            let condition = c.key_condition(&qualifiers, self.db_fields, row, &mut params)?;
            w.push("UPDATE")
                .push(&table)
                .push("SET")
                .push(set)
                .push("WHERE")
                .push(condition)
                .end();
        }
        Ok(c.finish(StatementKind::UpdateAll, self.table, w, params.into_vec()))
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// DELETE
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for `DELETE` statements.
#[derive(Debug)]
#[must_use = "call .build() to compose the statement"]
pub struct DeleteBuilder<'a, D: Dialect> {
    composer: &'a Composer<D>,
    table: &'a str,
    filter: Option<&'a QueryGroup>,
}

impl<'a, D: Dialect> DeleteBuilder<'a, D> {
    pub(super) const fn new(composer: &'a Composer<D>, table: &'a str) -> Self {
        Self {
            composer,
            table,
            filter: None,
        }
    }

    /// Filter tree.
    pub const fn filter(mut self, filter: &'a QueryGroup) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Compose the statement.
    pub fn build(self) -> Result<Statement> {
        let c = self.composer;
        let table = c.setting.quote_table(self.table)?;
        let mut params = Params::default();
        let mut w = SqlWriter::new();
        w.push("DELETE FROM").push(table);
        if let Some(clause) = c.where_clause(self.filter, params.names_mut())? {
            w.push("WHERE").push(clause.text);
            params.extend(clause.parameters)?;
        }
        w.end();
        Ok(c.finish(StatementKind::Delete, self.table, w, params.into_vec()))
    }
}

#[cfg(test)]
mod tests {
    use crate::composer::Composer;
    use crate::dialect::{Postgres, SqlServer, Sqlite};
    use crate::error::Error;
    use crate::field::{DbField, Field};
    use crate::query::{Operation, QueryField, QueryGroup};
    use crate::statement::{Direction, ParameterSource};
    use crate::value::ClientType;

    fn f123() -> Vec<Field> {
        vec![
            Field::new("F1").identity().with_type(ClientType::I32),
            Field::new("F2"),
            Field::new("F3"),
        ]
    }

    #[test]
    fn test_insert_all_scenario() {
        let c = Composer::new(SqlServer);
        let fields = f123();
        let stmt = c.insert_all("Table").fields(&fields).batch_size(1).build().unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO [Table] ( [F2], [F3] ) VALUES ( @F2, @F3 ) ; SET @F1 = CONVERT(INT, SCOPE_IDENTITY()) ;"
        );
        let output = stmt.parameter("F1").unwrap();
        assert_eq!(output.direction, Direction::Output);
    }

    #[test]
    fn test_insert_all_suffixes_rows_after_first() {
        let c = Composer::new(SqlServer);
        let fields = f123();
        let stmt = c.insert_all("Table").fields(&fields).batch_size(3).build().unwrap();
        assert!(stmt.sql.contains("VALUES ( @F2_1, @F3_1 ) ; SET @F1_1 ="));
        assert!(stmt.sql.contains("VALUES ( @F2_2, @F3_2 ) ; SET @F1_2 ="));
        assert_eq!(
            stmt.parameters
                .iter()
                .filter(|p| matches!(p.source, ParameterSource::Column { .. }))
                .count(),
            6
        );
    }

    #[test]
    fn test_insert_all_row_suffix_never_shadows_a_column() {
        let c = Composer::new(SqlServer);
        let fields = Field::from_names(&["Name", "Name_1"]);
        let stmt = c.insert_all("T").fields(&fields).batch_size(2).build().unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO [T] ( [Name], [Name_1] ) VALUES ( @Name, @Name_1 ) ; \
             INSERT INTO [T] ( [Name], [Name_1] ) VALUES ( @Name_1_1, @Name_1_1_1 ) ;"
        );
        let sources: Vec<(&str, &ParameterSource)> = stmt
            .parameters
            .iter()
            .map(|p| (p.name.as_str(), &p.source))
            .collect();
        assert_eq!(sources.len(), 4);
        assert_eq!(
            sources[1],
            ("Name_1", &ParameterSource::Column { column: "Name_1".into(), row: 0 })
        );
        assert_eq!(
            sources[2],
            ("Name_1_1", &ParameterSource::Column { column: "Name".into(), row: 1 })
        );
    }

    #[test]
    fn test_insert_sanitized_names_stay_distinct() {
        let c = Composer::new(SqlServer);
        let fields = Field::from_names(&["First Name", "First_Name"]);
        let stmt = c.insert("T").fields(&fields).build().unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO [T] ( [First Name], [First_Name] ) VALUES ( @First_Name, @First_Name_1 ) ; SELECT NULL AS [Result] ;"
        );
        assert_eq!(stmt.parameters.len(), 2);
        assert_eq!(
            stmt.parameters[1].source,
            ParameterSource::Column { column: "First_Name".into(), row: 0 }
        );
    }

    #[test]
    fn test_insert_all_identity_from_schema_uses_its_width() {
        let c = Composer::new(SqlServer);
        let fields = Field::from_names(&["Id", "Name"]);
        let db = [DbField::new("Id").identity().with_type(ClientType::I64), DbField::new("Name")];
        let stmt = c.insert_all("T").fields(&fields).db_fields(&db).build().unwrap();
        assert_eq!(
            stmt.sql,
            "INSERT INTO [T] ( [Name] ) VALUES ( @Name ) ; SET @Id = CONVERT(BIGINT, SCOPE_IDENTITY()) ;"
        );
    }

    #[test]
    fn test_insert_all_identity_must_be_in_fields() {
        let c = Composer::new(SqlServer);
        let fields = Field::from_names(&["Name"]);
        let db = [DbField::new("Id").identity(), DbField::new("Name")];
        let err = c.insert_all("T").fields(&fields).db_fields(&db).build().unwrap_err();
        assert!(matches!(err, Error::PrimaryFieldNotFound { .. }));
    }

    #[test]
    fn test_insert_result_selection() {
        let c = Composer::new(SqlServer);
        let identity = f123();
        assert_eq!(
            c.insert("T").fields(&identity).build().unwrap().sql,
            "INSERT INTO [T] ( [F2], [F3] ) VALUES ( @F2, @F3 ) ; SELECT CONVERT(INT, SCOPE_IDENTITY()) AS [Result] ;"
        );

        let primary = vec![Field::new("Code").primary(), Field::new("Name")];
        assert_eq!(
            c.insert("T").fields(&primary).build().unwrap().sql,
            "INSERT INTO [T] ( [Code], [Name] ) VALUES ( @Code, @Name ) ; SELECT @Code AS [Result] ;"
        );

        let none = Field::from_names(&["A"]);
        assert_eq!(
            c.insert("T").fields(&none).build().unwrap().sql,
            "INSERT INTO [T] ( [A] ) VALUES ( @A ) ; SELECT NULL AS [Result] ;"
        );
    }

    #[test]
    fn test_insert_returning_on_sqlite() {
        let c = Composer::new(Sqlite);
        let fields = f123();
        assert_eq!(
            c.insert("T").fields(&fields).build().unwrap().sql,
            "INSERT INTO \"T\" ( \"F2\", \"F3\" ) VALUES ( @F2, @F3 ) RETURNING CAST(\"F1\" AS INTEGER) AS \"Result\" ;"
        );
    }

    #[test]
    fn test_update_falls_back_to_key() {
        let c = Composer::new(SqlServer);
        let fields = f123();
        let stmt = c.update("Table").fields(&fields).build().unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE [Table] SET [F2] = @F2, [F3] = @F3 WHERE ([F1] = @F1) ;"
        );
    }

    #[test]
    fn test_update_without_key_fails() {
        let c = Composer::new(SqlServer);
        let fields = Field::from_names(&["A", "B"]);
        let err = c.update("T").fields(&fields).build().unwrap_err();
        assert!(matches!(err, Error::PrimaryFieldNotFound { .. }));
    }

    #[test]
    fn test_update_filter_parameters_avoid_set_names() {
        let c = Composer::new(SqlServer);
        let fields = vec![Field::new("Id").primary(), Field::new("Name")];
        let filter = QueryGroup::from(QueryField::new("Name", Operation::Equal, "old"));
        let stmt = c.update("T").fields(&fields).filter(&filter).build().unwrap();
        // primary not referenced by the filter stays in SET
        assert_eq!(
            stmt.sql,
            "UPDATE [T] SET [Id] = @Id, [Name] = @Name WHERE ([Name] = @Name_1) ;"
        );
    }

    #[test]
    fn test_update_excludes_key_referenced_in_filter() {
        let c = Composer::new(Postgres);
        let fields = vec![Field::new("Id").primary(), Field::new("Name")];
        let filter = QueryGroup::from(QueryField::new("Id", Operation::Equal, 1));
        let stmt = c.update("T").fields(&fields).filter(&filter).build().unwrap();
        assert_eq!(stmt.sql, "UPDATE \"T\" SET \"Name\" = @Name WHERE (\"Id\" = @Id) ;");
    }

    #[test]
    fn test_update_all_batches_by_qualifier() {
        let c = Composer::new(SqlServer);
        let fields = vec![Field::new("Id").primary(), Field::new("Name")];
        let stmt = c.update_all("T").fields(&fields).batch_size(2).build().unwrap();
        assert_eq!(
            stmt.sql,
            "UPDATE [T] SET [Name] = @Name WHERE ([Id] = @Id) ; UPDATE [T] SET [Name] = @Name_1 WHERE ([Id] = @Id_1) ;"
        );
        assert_eq!(stmt.parameters.len(), 4);
    }

    #[test]
    fn test_update_all_unknown_qualifier() {
        let c = Composer::new(SqlServer);
        let fields = Field::from_names(&["A", "B"]);
        let qualifiers = Field::from_names(&["C"]);
        let err = c
            .update_all("T")
            .fields(&fields)
            .qualifiers(&qualifiers)
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_delete() {
        let c = Composer::new(SqlServer);
        let filter = QueryGroup::from(QueryField::new("Id", Operation::In, crate::Value::array([1, 2])));
        assert_eq!(
            c.delete("T").filter(&filter).build().unwrap().sql,
            "DELETE FROM [T] WHERE ([Id] IN (@Id_In_0, @Id_In_1)) ;"
        );
        assert_eq!(c.delete("T").build().unwrap().sql, "DELETE FROM [T] ;");
    }

    #[test]
    fn test_zero_batch_size_fails() {
        let c = Composer::new(SqlServer);
        let fields = f123();
        let err = c.insert_all("T").fields(&fields).batch_size(0).build().unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }));
    }
}
