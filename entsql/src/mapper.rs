//! High-level facade: typed entity operations to ready-to-execute commands.
//!
//! [`Mapper`] resolves the entity, maps property names in filters and
//! ordering onto columns, composes the statement and binds the entity
//! values. Execution stays with the caller.
//!
//! ```ignore
//! let mapper = Mapper::new(SqlServer, MappingRegistry::global());
//! let cmd = mapper.query::<Customer>(Some(&filter), &[], None)?;
//! // hand cmd.text and cmd.parameters to the driver, then:
//! let rows: Vec<Customer> = mapper.materialize(cursor).collect::<Result<_>>()?;
//! ```

use tracing::debug;

use crate::binder::DbCommand;
use crate::composer::{Aggregate, Composer};
use crate::cursor::Cursor;
use crate::dialect::Dialect;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::field::{Field, FieldBag, OrderField, OrderedFieldList};
use crate::mapping::MappingLookup;
use crate::materialize::{Rows, materialize};
use crate::query::QueryGroup;
use crate::resolver::{EntitySource, FieldResolver, to_field_bag};
use crate::setting::DbSetting;
use crate::statement::Statement;

/// Entity-level operations for one dialect.
pub struct Mapper<'l, D: Dialect> {
    composer: Composer<D>,
    lookup: &'l dyn MappingLookup,
    batch_size: usize,
}

impl<'l, D: Dialect> Mapper<'l, D> {
    /// Mapper with the dialect's default setting.
    pub fn new(dialect: D, lookup: &'l dyn MappingLookup) -> Self {
        Self {
            composer: Composer::new(dialect),
            lookup,
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
        }
    }

    /// Mapper with a customized setting.
    pub fn with_setting(dialect: D, setting: DbSetting, lookup: &'l dyn MappingLookup) -> Self {
        Self {
            composer: Composer::with_setting(dialect, setting),
            lookup,
            batch_size: crate::config::DEFAULT_BATCH_SIZE,
        }
    }

    /// Rows per batch statement for `insert_all`, `update_all` and `merge_all`.
    /// Zero is treated as one.
    #[must_use]
    pub fn batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Configured rows per batch statement.
    pub const fn batch(&self) -> usize {
        self.batch_size
    }

    /// Underlying composer.
    pub const fn composer(&self) -> &Composer<D> {
        &self.composer
    }

    /// Active setting.
    pub const fn setting(&self) -> &DbSetting {
        self.composer.setting()
    }

    /// Resolved table and fields of `T`.
    pub fn resolve<T: Entity>(&self) -> Result<OrderedFieldList> {
        FieldResolver::new(self.lookup).resolve_entity::<T>(None, &[])
    }

    fn bind(&self, statement: &Statement, rows: &[FieldBag]) -> Result<DbCommand> {
        DbCommand::from_statement(statement, rows, self.composer.setting())
    }

    fn bags<T: Entity>(&self, entities: &[T], list: &OrderedFieldList) -> Result<Vec<FieldBag>> {
        entities
            .iter()
            .map(|e| to_field_bag(e, list, self.lookup))
            .collect()
    }

    // ═══════════════════════════════════════════════════════════════════════
    // READS
    // ═══════════════════════════════════════════════════════════════════════

    /// `SELECT` of every mapped column of `T`.
    pub fn query<T: Entity>(
        &self,
        filter: Option<&QueryGroup>,
        order: &[OrderField],
        top: Option<u32>,
    ) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let filter = filter.map(|f| map_filter(f, &list));
        let order = map_order(order, &list);
        let mut builder = self.composer.query(&list.table).fields(&list.fields).order(&order);
        if let Some(filter) = &filter {
            builder = builder.filter(filter);
        }
        if let Some(top) = top {
            builder = builder.top(top);
        }
        self.bind(&builder.build()?, &[])
    }

    /// Unfiltered `SELECT`.
    pub fn query_all<T: Entity>(&self, order: &[OrderField]) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let order = map_order(order, &list);
        let statement = self
            .composer
            .create_query_all(&list.table, &list.fields, &order, None)?;
        self.bind(&statement, &[])
    }

    /// One page of rows. `page` is zero-based.
    pub fn batch_query<T: Entity>(
        &self,
        filter: Option<&QueryGroup>,
        order: &[OrderField],
        page: u32,
        rows_per_batch: u32,
    ) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let filter = filter.map(|f| map_filter(f, &list));
        let order = map_order(order, &list);
        let mut builder = self
            .composer
            .batch_query(&list.table)
            .fields(&list.fields)
            .order(&order)
            .page(page, rows_per_batch);
        if let Some(filter) = &filter {
            builder = builder.filter(filter);
        }
        self.bind(&builder.build()?, &[])
    }

    /// Row count, optionally filtered.
    pub fn count<T: Entity>(&self, filter: Option<&QueryGroup>) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let filter = filter.map(|f| map_filter(f, &list));
        let statement = match &filter {
            Some(filter) => self.composer.count(&list.table).filter(filter).build()?,
            None => self.composer.create_count_all(&list.table, None)?,
        };
        self.bind(&statement, &[])
    }

    /// Existence check.
    pub fn exists<T: Entity>(&self, filter: Option<&QueryGroup>) -> Result<DbCommand> {
        self.aggregate_command::<T>(Aggregate::Exists, None, filter)
    }

    /// `SUM(property)`.
    pub fn sum<T: Entity>(&self, property: &str, filter: Option<&QueryGroup>) -> Result<DbCommand> {
        self.aggregate_command::<T>(Aggregate::Sum, Some(property), filter)
    }

    /// `AVG(property)`, cast to a floating type for integral columns.
    pub fn average<T: Entity>(&self, property: &str, filter: Option<&QueryGroup>) -> Result<DbCommand> {
        self.aggregate_command::<T>(Aggregate::Average, Some(property), filter)
    }

    /// `MIN(property)`.
    pub fn min<T: Entity>(&self, property: &str, filter: Option<&QueryGroup>) -> Result<DbCommand> {
        self.aggregate_command::<T>(Aggregate::Min, Some(property), filter)
    }

    /// `MAX(property)`.
    pub fn max<T: Entity>(&self, property: &str, filter: Option<&QueryGroup>) -> Result<DbCommand> {
        self.aggregate_command::<T>(Aggregate::Max, Some(property), filter)
    }

    fn aggregate_command<T: Entity>(
        &self,
        function: Aggregate,
        property: Option<&str>,
        filter: Option<&QueryGroup>,
    ) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let field = property
            .map(|p| {
                list.by_property(p).ok_or_else(|| Error::UnknownProperty {
                    entity: list.entity.clone(),
                    property: p.to_string(),
                })
            })
            .transpose()?;
        let filter = filter.map(|f| map_filter(f, &list));

        let mut builder = match function {
            Aggregate::Count => self.composer.count(&list.table),
            Aggregate::Exists => self.composer.exists(&list.table),
            _ => {
                let field = field.ok_or_else(|| Error::empty("Aggregate field"))?;
                self.composer.aggregate(&list.table, function, field)
            },
        };
        if let Some(filter) = &filter {
            builder = builder.filter(filter);
        }
        self.bind(&builder.build()?, &[])
    }

    /// Lazily materialize `T` from a result cursor.
    pub fn materialize<T: Entity + Default, C: Cursor>(&self, cursor: C) -> Rows<'l, C, T> {
        materialize(cursor, self.lookup)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // WRITES
    // ═══════════════════════════════════════════════════════════════════════

    /// Insert one entity, returning its key.
    pub fn insert<T: Entity>(&self, entity: &T) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let rows = self.bags(std::slice::from_ref(entity), &list)?;
        let statement = self.composer.insert(&list.table).fields(&list.fields).build()?;
        self.bind(&statement, &rows)
    }

    /// Insert a dynamic field bag into `table`.
    pub fn insert_bag(&self, table: &str, bag: &FieldBag) -> Result<DbCommand> {
        let list = FieldResolver::new(self.lookup).resolve(
            EntitySource::Dynamic { table, bag },
            None,
            &[],
        )?;
        let statement = self.composer.insert(&list.table).fields(&list.fields).build()?;
        self.bind(&statement, std::slice::from_ref(bag))
    }

    /// Insert many entities, one command per chunk.
    pub fn insert_all<T: Entity>(&self, entities: &[T]) -> Result<Vec<DbCommand>> {
        let list = self.resolve::<T>()?;
        let per_row = list.fields.len();
        self.chunked(entities, &list, per_row, |size| {
            self.composer
                .insert_all(&list.table)
                .fields(&list.fields)
                .batch_size(size)
                .build()
        })
    }

    /// Update one entity by key, or by `filter` when given.
    pub fn update<T: Entity>(&self, entity: &T, filter: Option<&QueryGroup>) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let rows = self.bags(std::slice::from_ref(entity), &list)?;
        let filter = filter.map(|f| map_filter(f, &list));
        let mut builder = self.composer.update(&list.table).fields(&list.fields);
        if let Some(filter) = &filter {
            builder = builder.filter(filter);
        }
        self.bind(&builder.build()?, &rows)
    }

    /// Update a dynamic field bag in `table`, matched by `filter`.
    pub fn update_bag(&self, table: &str, bag: &FieldBag, filter: &QueryGroup) -> Result<DbCommand> {
        let list = FieldResolver::new(self.lookup).resolve(
            EntitySource::Dynamic { table, bag },
            None,
            &[],
        )?;
        let statement = self
            .composer
            .update(&list.table)
            .fields(&list.fields)
            .filter(filter)
            .build()?;
        self.bind(&statement, std::slice::from_ref(bag))
    }

    /// Update many entities matched by `qualifiers` (property names; the key
    /// when empty), one command per chunk.
    pub fn update_all<T: Entity>(&self, entities: &[T], qualifiers: &[&str]) -> Result<Vec<DbCommand>> {
        let list = self.resolve::<T>()?;
        let qualifiers = map_qualifiers(qualifiers, &list)?;
        self.chunked(entities, &list, list.fields.len(), |size| {
            self.composer
                .update_all(&list.table)
                .fields(&list.fields)
                .qualifiers(&qualifiers)
                .batch_size(size)
                .build()
        })
    }

    /// Delete rows matching `filter`.
    pub fn delete<T: Entity>(&self, filter: &QueryGroup) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let filter = map_filter(filter, &list);
        let statement = self.composer.delete(&list.table).filter(&filter).build()?;
        self.bind(&statement, &[])
    }

    /// Delete every row.
    pub fn delete_all<T: Entity>(&self) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        self.bind(&self.composer.create_delete_all(&list.table)?, &[])
    }

    /// Truncate the table.
    pub fn truncate<T: Entity>(&self) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        self.bind(&self.composer.create_truncate(&list.table)?, &[])
    }

    /// Upsert one entity matched by `qualifiers` (the key when empty).
    pub fn merge<T: Entity>(&self, entity: &T, qualifiers: &[&str]) -> Result<DbCommand> {
        let list = self.resolve::<T>()?;
        let qualifiers = map_qualifiers(qualifiers, &list)?;
        let rows = self.bags(std::slice::from_ref(entity), &list)?;
        let statement = self
            .composer
            .merge(&list.table)
            .fields(&list.fields)
            .qualifiers(&qualifiers)
            .build()?;
        self.bind(&statement, &rows)
    }

    /// Upsert many entities, one command per chunk.
    pub fn merge_all<T: Entity>(&self, entities: &[T], qualifiers: &[&str]) -> Result<Vec<DbCommand>> {
        let list = self.resolve::<T>()?;
        let qualifiers = map_qualifiers(qualifiers, &list)?;
        self.chunked(entities, &list, list.fields.len(), |size| {
            self.composer
                .merge_all(&list.table)
                .fields(&list.fields)
                .qualifiers(&qualifiers)
                .batch_size(size)
                .build()
        })
    }

    /// Rows per command: the configured batch size, capped by the provider's
    /// parameter limit and by single-statement dialects.
    fn chunk_size(&self, per_row: usize) -> usize {
        let setting = self.composer.setting();
        if !setting.is_multi_statement_executable {
            return 1;
        }
        let by_parameters = setting
            .max_parameters
            .map_or(usize::MAX, |max| (max / per_row.max(1)).max(1));
        self.batch_size.min(by_parameters)
    }

    fn chunked<T: Entity>(
        &self,
        entities: &[T],
        list: &OrderedFieldList,
        per_row: usize,
        compose: impl Fn(usize) -> Result<Statement>,
    ) -> Result<Vec<DbCommand>> {
        if entities.is_empty() {
            return Ok(Vec::new());
        }
        let size = self.chunk_size(per_row);
        debug!(
            entity = %list.entity,
            rows = entities.len(),
            chunk = size,
            commands = entities.len().div_ceil(size),
            "batch chunked"
        );

        let mut commands = Vec::with_capacity(entities.len().div_ceil(size));
        let mut cached: Option<(usize, Statement)> = None;
        for chunk in entities.chunks(size) {
            let statement = match cached.take() {
                Some((n, statement)) if n == chunk.len() => statement,
                _ => compose(chunk.len())?,
            };
            let rows = self.bags(chunk, list)?;
            commands.push(self.bind(&statement, &rows)?);
            cached = Some((chunk.len(), statement));
        }
        Ok(commands)
    }
}

/// Rewrite predicate fields named by property onto their resolved columns.
fn map_filter(filter: &QueryGroup, list: &OrderedFieldList) -> QueryGroup {
    filter.map_fields(&|field: &Field| match list.by_property(&field.name) {
        Some(resolved) => Field {
            name: resolved.name.clone(),
            property: resolved.property.clone(),
            client_type: field.client_type.or(resolved.client_type),
            db_type: field.db_type.or(resolved.db_type),
            ..field.clone()
        },
        None => field.clone(),
    })
}

fn map_order(order: &[OrderField], list: &OrderedFieldList) -> Vec<OrderField> {
    order
        .iter()
        .map(|o| OrderField {
            name: list
                .by_property(&o.name)
                .map_or_else(|| o.name.clone(), |f| f.name.clone()),
            order: o.order,
        })
        .collect()
}

fn map_qualifiers(qualifiers: &[&str], list: &OrderedFieldList) -> Result<Vec<Field>> {
    qualifiers
        .iter()
        .map(|q| {
            list.by_property(q)
                .cloned()
                .ok_or_else(|| Error::UnknownProperty {
                    entity: list.entity.clone(),
                    property: (*q).to_string(),
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursor;
    use crate::dialect::{SqlServer, Sqlite};
    use crate::mapping::{MappingRegistry, NoMapping};
    use crate::query::{Operation, QueryField};
    use crate::statement::StatementKind;
    use crate::value::Value;

    #[derive(crate::Entity, Default, Debug, Clone, PartialEq)]
    #[entity(table = "Customers")]
    pub struct Customer {
        #[column(primary, identity)]
        pub id: i32,
        #[column(name = "FullName")]
        pub name: String,
        pub age: Option<i32>,
    }

    fn customer(n: i32) -> Customer {
        Customer {
            id: 0,
            name: format!("c{n}"),
            age: Some(n),
        }
    }

    #[test]
    fn test_query_maps_properties_to_columns() {
        let mapper = Mapper::new(SqlServer, &NoMapping);
        let filter = QueryGroup::from(QueryField::new("name", Operation::Like, "A%"));
        let cmd = mapper
            .query::<Customer>(Some(&filter), &[OrderField::desc("age")], Some(5))
            .unwrap();
        assert_eq!(
            cmd.text,
            "SELECT TOP (5) [id], [FullName], [age] FROM [Customers] WHERE ([FullName] LIKE @FullName) ORDER BY [age] DESC ;"
        );
        assert_eq!(cmd.parameters[0].name, "@FullName");
    }

    #[test]
    fn test_insert_binds_entity_values() {
        let mapper = Mapper::new(SqlServer, &NoMapping);
        let cmd = mapper.insert(&customer(30)).unwrap();
        assert_eq!(cmd.kind, StatementKind::Insert);
        assert_eq!(
            cmd.text,
            "INSERT INTO [Customers] ( [FullName], [age] ) VALUES ( @FullName, @age ) ; SELECT CONVERT(INT, SCOPE_IDENTITY()) AS [Result] ;"
        );
        assert_eq!(cmd.parameter("FullName").unwrap().value, Value::from("c30"));
        assert_eq!(cmd.parameter("age").unwrap().value, Value::Int(30));
    }

    #[test]
    fn test_insert_all_chunks_by_batch_size() {
        let mapper = Mapper::new(SqlServer, &NoMapping).batch_size(2);
        let entities: Vec<_> = (1..=5).map(customer).collect();
        let commands = mapper.insert_all(&entities).unwrap();
        assert_eq!(commands.len(), 3);
        assert_eq!(commands[0].text.matches("INSERT INTO").count(), 2);
        assert_eq!(commands[2].text.matches("INSERT INTO").count(), 1);
        assert_eq!(commands[1].parameter("FullName_1").unwrap().value, Value::from("c4"));
    }

    #[test]
    fn test_insert_all_respects_parameter_cap() {
        let setting = DbSetting {
            max_parameters: Some(7),
            ..DbSetting::SQL_SERVER
        };
        let mapper = Mapper::with_setting(SqlServer, setting, &NoMapping).batch_size(100);
        let entities: Vec<_> = (1..=5).map(customer).collect();
        let commands = mapper.insert_all(&entities).unwrap();
        // three parameters per row (two columns plus the identity output)
        assert_eq!(commands.len(), 3);
        assert!(commands.iter().all(|c| c.parameters.len() <= 7));
    }

    #[test]
    fn test_insert_all_of_nothing() {
        let mapper = Mapper::new(SqlServer, &NoMapping);
        assert!(mapper.insert_all::<Customer>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_update_by_key() {
        let mapper = Mapper::new(Sqlite, &NoMapping);
        let mut entity = customer(40);
        entity.id = 9;
        let cmd = mapper.update(&entity, None).unwrap();
        assert_eq!(
            cmd.text,
            "UPDATE \"Customers\" SET \"FullName\" = @FullName, \"age\" = @age WHERE (\"id\" = @id) ;"
        );
        assert_eq!(cmd.parameter("id").unwrap().value, Value::Int(9));
    }

    #[test]
    fn test_unknown_qualifier_property() {
        let mapper = Mapper::new(SqlServer, &NoMapping);
        let err = mapper.merge(&customer(1), &["nope"]).unwrap_err();
        assert!(matches!(err, Error::UnknownProperty { .. }));
    }

    #[test]
    fn test_fluent_table_and_column() {
        let registry = MappingRegistry::new();
        registry
            .entity::<Customer>()
            .table("crm.Clients")
            .unwrap()
            .column("age", "Years")
            .unwrap();
        let mapper = Mapper::new(SqlServer, &registry);
        let cmd = mapper.average::<Customer>("age", None).unwrap();
        assert_eq!(
            cmd.text,
            "SELECT AVG (CONVERT(FLOAT, [Years])) AS [AverageValue] FROM [crm].[Clients] ;"
        );
    }

    #[test]
    fn test_delete_all_and_truncate() {
        let mapper = Mapper::new(Sqlite, &NoMapping);
        assert_eq!(mapper.delete_all::<Customer>().unwrap().text, "DELETE FROM \"Customers\" ;");
        assert_eq!(mapper.truncate::<Customer>().unwrap().text, "DELETE FROM \"Customers\" ;");
    }

    #[test]
    fn test_insert_bag() {
        let mapper = Mapper::new(SqlServer, &NoMapping);
        let mut bag = FieldBag::new();
        bag.insert("Code".to_string(), Value::from("X1"));
        bag.insert("Qty".to_string(), Value::Int(3));
        let cmd = mapper.insert_bag("dbo.Stock", &bag).unwrap();
        assert_eq!(
            cmd.text,
            "INSERT INTO [dbo].[Stock] ( [Code], [Qty] ) VALUES ( @Code, @Qty ) ; SELECT NULL AS [Result] ;"
        );
        assert_eq!(cmd.parameters.len(), 2);
    }

    #[test]
    fn test_insert_bag_keys_cannot_break_out_of_quotes() {
        let mapper = Mapper::new(SqlServer, &NoMapping);
        let mut bag = FieldBag::new();
        bag.insert("Name] ) VALUES ( 1 ) ; DROP TABLE [Users] ; --".to_string(), Value::from("x"));
        let cmd = mapper.insert_bag("T", &bag).unwrap();
        assert!(cmd.text.starts_with(
            "INSERT INTO [T] ( [Name]] ) VALUES ( 1 ) ; DROP TABLE [Users]] ; --] ) VALUES ( @"
        ));
        assert_eq!(cmd.parameters.len(), 1);
        assert_eq!(cmd.parameters[0].value, Value::from("x"));
        assert!(cmd.parameters[0].name.chars().all(|c| c == '@' || c == '_' || c.is_ascii_alphanumeric()));

        let mut blank = FieldBag::new();
        blank.insert("  ".to_string(), Value::Int(1));
        let err = mapper.insert_bag("T", &blank).unwrap_err();
        assert!(matches!(err, Error::InvalidConfiguration { .. }), "{err}");
    }

    #[test]
    fn test_materialize_through_mapper() {
        let mapper = Mapper::new(SqlServer, &NoMapping);
        let cursor = MemoryCursor::new(
            ["id", "FullName", "age"],
            vec![vec![Value::Int(1), Value::from("Ada"), Value::Null]],
        );
        let rows: Vec<Customer> = mapper.materialize(cursor).collect::<Result<_>>().unwrap();
        assert_eq!(
            rows,
            [Customer {
                id: 1,
                name: "Ada".into(),
                age: None
            }]
        );
    }
}
