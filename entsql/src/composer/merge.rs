//! Upserts: native `MERGE`, `ON CONFLICT`, and the multi-statement fallbacks
//! used when the native form is switched off.

use super::{Composer, Params, SqlWriter};
use crate::dialect::{Dialect, UpsertStyle};
use crate::error::{Error, Result};
use crate::field::{DbField, Field};
use crate::resolver::{Keys, reconcile_keys};
use crate::statement::{Statement, StatementKind};

/// Builder for `merge` and `merge_all`.
#[derive(Debug)]
#[must_use = "call .build() to compose the statement"]
pub struct MergeBuilder<'a, D: Dialect> {
    composer: &'a Composer<D>,
    table: &'a str,
    fields: &'a [Field],
    db_fields: &'a [DbField],
    qualifiers: &'a [Field],
    batch: Option<usize>,
}

/// Columns of one upsert, split by role.
struct Plan<'f> {
    table: String,
    keys: Keys,
    qualifiers: Vec<&'f Field>,
    insert: Vec<&'f Field>,
    update: Vec<&'f Field>,
}

impl<'a, D: Dialect> MergeBuilder<'a, D> {
    pub(super) const fn new(composer: &'a Composer<D>, table: &'a str, batch: Option<usize>) -> Self {
        Self {
            composer,
            table,
            fields: &[],
            db_fields: &[],
            qualifiers: &[],
            batch,
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

    /// Rows per statement. Turns the builder into a merge-all.
    pub const fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch = Some(batch_size);
        self
    }

    fn plan(&self, identity_insertable: bool) -> Result<Plan<'a>> {
        let c = self.composer;
        let table = c.setting.quote_table(self.table)?;
        let keys = reconcile_keys(self.table, self.fields, self.db_fields)?;
        let qualifiers = c.qualifiers(
            self.table,
            self.fields,
            self.qualifiers,
            &keys,
            "merge without qualifiers",
        )?;

        let is_qualifier = |f: &Field| qualifiers.iter().any(|q| q.is(&f.name));
        let insert: Vec<&Field> = self
            .fields
            .iter()
            .filter(|f| !keys.is_identity(&f.name) || (identity_insertable && is_qualifier(f)))
            .collect();
        let update: Vec<&Field> = self
            .fields
            .iter()
            .filter(|f| !keys.is_key(&f.name) && !is_qualifier(f))
            .collect();
        if insert.is_empty() {
            return Err(Error::empty("Insertable fields"));
        }

        Ok(Plan {
            table,
            keys,
            qualifiers,
            insert,
            update,
        })
    }

    /// Compose the statement.
    pub fn build(self) -> Result<Statement> {
        let c = self.composer;
        if self.fields.is_empty() {
            return Err(Error::empty("Merge fields"));
        }
        let rows = self.batch.unwrap_or(1);
        c.check_batch(rows)?;
        let kind = if self.batch.is_some() {
            StatementKind::MergeAll
        } else {
            StatementKind::Merge
        };

        let native = c.setting.is_upsert_supported;
        let style = c.dialect.upsert_style();
        if !native && !c.setting.is_multi_statement_executable {
            return Err(Error::Unsupported {
                dialect: c.dialect.name(),
                feature: "upsert without native support",
            });
        }

        let plan = self.plan(style == UpsertStyle::OnConflict)?;
        let mut params = Params::default();
        let mut w = SqlWriter::new();
        for row in 0..rows {
            match (native, style) {
                (true, UpsertStyle::Merge) => self.native_merge(&mut w, &plan, row, &mut params)?,
                (true, UpsertStyle::OnConflict) => self.on_conflict(&mut w, &plan, row, &mut params)?,
                (false, UpsertStyle::Merge) => self.if_exists(&mut w, &plan, row, &mut params)?,
                (false, UpsertStyle::OnConflict) => {
                    self.update_then_insert(&mut w, &plan, row, &mut params)?;
                },
            }
        }
        Ok(c.finish(kind, self.table, w, params.into_vec()))
    }

    // ═══════════════════════════════════════════════════════════════════════
    // FORMS
    // ═══════════════════════════════════════════════════════════════════════

    fn quoted(&self, fields: &[&Field], prefix: &str) -> Vec<String> {
        let setting = &self.composer.setting;
        fields
            .iter()
            .map(|f| format!("{prefix}{}", setting.quote(&f.name)))
            .collect()
    }

    /// `MERGE [T] AS T USING ( SELECT @A AS [A], ... ) AS S ON ( ... ) ...`
    fn native_merge(
        &self,
        w: &mut SqlWriter,
        plan: &Plan<'_>,
        row: usize,
        params: &mut Params,
    ) -> Result<()> {
        let c = self.composer;
        let mut source = Vec::with_capacity(self.fields.len());
        for field in self.fields {
            let param = c.column_param(field, self.db_fields, row, params);
            source.push(format!(
                "{} AS {}",
                c.setting.placeholder(&param.name),
                c.setting.quote(&field.name)
            ));
            params.add(param)?;
        }
        let on: Vec<String> = plan
            .qualifiers
            .iter()
            .map(|q| {
                let column = c.setting.quote(&q.name);
                format!("S.{column} = T.{column}")
            })
            .collect();

        w.push("MERGE")
            .push(&plan.table)
            .push("AS T USING (")
            .push("SELECT")
            .push(source.join(", "))
            .push(") AS S ON (")
            .push(on.join(" AND "))
            .push(")")
            .push("WHEN NOT MATCHED THEN INSERT (")
            .push(self.quoted(&plan.insert, "").join(", "))
            .push(") VALUES (")
            .push(self.quoted(&plan.insert, "S.").join(", "))
            .push(")");

        if !plan.update.is_empty() {
            let set: Vec<String> = plan
                .update
                .iter()
                .map(|f| {
                    let column = c.setting.quote(&f.name);
                    format!("{column} = S.{column}")
                })
                .collect();
            w.push("WHEN MATCHED THEN UPDATE SET").push(set.join(", "));
        }
        if let Some(key) = plan.keys.identity.as_ref().or(plan.keys.primary.as_ref()) {
            w.push("OUTPUT")
                .push(format!("INSERTED.{}", c.setting.quote(&key.name)))
                .push("AS")
                .push(c.setting.quote("Result"));
        }
        w.end();
        Ok(())
    }

    /// `INSERT ... ON CONFLICT ( ... ) DO UPDATE SET ... RETURNING ...`
    fn on_conflict(
        &self,
        w: &mut SqlWriter,
        plan: &Plan<'_>,
        row: usize,
        params: &mut Params,
    ) -> Result<()> {
        let c = self.composer;
        w.push("INSERT INTO").push(&plan.table);
        c.values_clause(w, &plan.insert, self.db_fields, row, params)?;
        w.push("ON CONFLICT (")
            .push(self.quoted(&plan.qualifiers, "").join(", "))
            .push(")");
        if plan.update.is_empty() {
            w.push("DO NOTHING");
        } else {
            let set: Vec<String> = plan
                .update
                .iter()
                .map(|f| {
                    let column = c.setting.quote(&f.name);
                    format!("{column} = EXCLUDED.{column}")
                })
                .collect();
            w.push("DO UPDATE SET").push(set.join(", "));
        }
        if let Some(expression) = c.returning_expression(&plan.keys) {
            w.push("RETURNING")
                .push(expression)
                .push("AS")
                .push(c.setting.quote("Result"));
        }
        w.end();
        Ok(())
    }

    /// `IF EXISTS ( ... ) BEGIN UPDATE ... ; END ELSE BEGIN INSERT ... ; END ;`
    fn if_exists(
        &self,
        w: &mut SqlWriter,
        plan: &Plan<'_>,
        row: usize,
        params: &mut Params,
    ) -> Result<()> {
        let c = self.composer;
        let condition = c.key_condition(&plan.qualifiers, self.db_fields, row, params)?;
        let guard = if plan.update.is_empty() {
            "IF NOT EXISTS"
        } else {
            "IF EXISTS"
        };
        w.push(guard)
            .push("( SELECT 1 FROM")
            .push(&plan.table)
            .push("WHERE")
            .push(&condition)
            .push(")")
            .push("BEGIN");
        if !plan.update.is_empty() {
            let set = c.set_clause(&plan.update, self.db_fields, row, params)?;
            w.push("UPDATE")
                .push(&plan.table)
                .push("SET")
                .push(set)
                .push("WHERE")
                .push(&condition)
                .end()
                .push("END ELSE BEGIN");
        }
        w.push("INSERT INTO").push(&plan.table);
        c.values_clause(w, &plan.insert, self.db_fields, row, params)?;
        w.end().push("END").end();
        Ok(())
    }

    /// `UPDATE ... ; INSERT INTO ... SELECT ... WHERE NOT EXISTS ( ... ) ;`
    fn update_then_insert(
        &self,
        w: &mut SqlWriter,
        plan: &Plan<'_>,
        row: usize,
        params: &mut Params,
    ) -> Result<()> {
        let c = self.composer;
        let condition = c.key_condition(&plan.qualifiers, self.db_fields, row, params)?;
        if !plan.update.is_empty() {
            let set = c.set_clause(&plan.update, self.db_fields, row, params)?;
            w.push("UPDATE")
                .push(&plan.table)
                .push("SET")
                .push(set)
                .push("WHERE")
                .push(&condition)
                .end();
        }
        let mut values = Vec::with_capacity(plan.insert.len());
        for field in &plan.insert {
            let param = c.column_param(field, self.db_fields, row, params);
            values.push(c.setting.placeholder(&param.name));
            params.add(param)?;
        }
        w.push("INSERT INTO")
            .push(&plan.table)
            .push("(")
            .push(self.quoted(&plan.insert, "").join(", "))
            .push(")")
            .push("SELECT")
            .push(values.join(", "))
            .push("WHERE NOT EXISTS ( SELECT 1 FROM")
            .push(&plan.table)
            .push("WHERE")
            .push(&condition)
            .push(")")
            .end();
        Ok(())
    }
}
