//! Scenario tests for the mapper facade: resolution precedence, fluent
//! registrations, handlers, batching and binding, end to end from a
//! derived entity to a bound command.

use entsql::{
    Composer, Config, DbCommand, DbType, Direction, Entity, Error, Mapper, MappingRegistry,
    MemoryCursor, NoMapping, ProjectionCache, PropertyHandler, Result, SqlServer, Statement,
    StatementKind, Value, collect,
};
use static_assertions::assert_impl_all;

assert_impl_all!(Composer<SqlServer>: Send, Sync, Clone);
assert_impl_all!(MappingRegistry: Send, Sync);
assert_impl_all!(ProjectionCache: Send, Sync);
assert_impl_all!(Statement: Send, Sync, Clone);
assert_impl_all!(DbCommand: Send, Sync, Clone);
assert_impl_all!(Error: Send, Sync, std::error::Error);

#[derive(Entity, Debug, Default, Clone, PartialEq)]
#[entity(table = "Orders")]
pub struct Order {
    #[column(primary)]
    pub id: i64,
    #[column(name = "Total")]
    pub amount: f64,
    pub note: Option<String>,
}

fn order(id: i64, amount: f64, note: Option<&str>) -> Order {
    Order {
        id,
        amount,
        note: note.map(str::to_string),
    }
}

fn registry() -> MappingRegistry {
    let registry = MappingRegistry::new();
    registry
        .entity::<Order>()
        .table("sales.Orders")
        .unwrap()
        .column("amount", "GrandTotal")
        .unwrap();
    registry
}

#[derive(Debug)]
struct Upper;

impl PropertyHandler for Upper {
    fn get(&self, value: Value) -> Result<Value> {
        Ok(match value {
            Value::String(s) => Value::String(s.to_lowercase()),
            other => other,
        })
    }

    fn set(&self, value: Value) -> Result<Value> {
        Ok(match value {
            Value::String(s) => Value::String(s.to_uppercase()),
            other => other,
        })
    }
}

// =============================================================================
// Resolution
// =============================================================================

#[test]
fn attribute_mapping_without_registrations() {
    let mapper = Mapper::new(SqlServer, &NoMapping);
    let command = mapper.query::<Order>(None, &[], None).unwrap();
    assert_eq!(command.text, "SELECT [id], [Total], [note] FROM [Orders] ;");
    assert_eq!(command.kind, StatementKind::Query);
}

#[test]
fn fluent_registrations_win_over_attributes() {
    let registry = registry();
    let mapper = Mapper::new(SqlServer, &registry);
    let command = mapper.query::<Order>(None, &[], None).unwrap();
    assert_eq!(command.text, "SELECT [id], [GrandTotal], [note] FROM [sales].[Orders] ;");
}

#[test]
fn duplicate_registration_fails_unless_forced() {
    let registry = registry();
    let err = registry.entity::<Order>().table("Other").err().unwrap();
    assert!(matches!(err, Error::InvalidConfiguration { .. }));

    registry.entity::<Order>().force().table("archive.Orders").unwrap();
    let mapper = Mapper::new(SqlServer, &registry);
    let command = mapper.count::<Order>(None).unwrap();
    assert_eq!(command.text, "SELECT COUNT_BIG (1) AS [CountValue] FROM [archive].[Orders] ;");
}

#[test]
fn fluent_registration_of_unknown_property_fails() {
    let registry = MappingRegistry::new();
    let err = registry.entity::<Order>().column("missing", "X").err().unwrap();
    assert!(matches!(err, Error::UnknownProperty { .. }));
}

// =============================================================================
// Binding
// =============================================================================

#[test]
fn insert_binds_values_and_types() {
    let registry = registry();
    let mapper = Mapper::new(SqlServer, &registry);
    let command = mapper.insert(&order(5, 9.5, None)).unwrap();

    assert_eq!(
        command.text,
        "INSERT INTO [sales].[Orders] ( [id], [GrandTotal], [note] ) VALUES ( @id, @GrandTotal, @note ) ; SELECT @id AS [Result] ;"
    );
    let id = command.parameter("@id").unwrap();
    assert_eq!(id.value, Value::Int(5));
    assert_eq!(id.db_type, Some(DbType::Int64));
    assert_eq!(id.direction, Some(Direction::Input));

    let total = command.parameter("GrandTotal").unwrap();
    assert_eq!(total.value, Value::Float(9.5));
    assert_eq!(total.db_type, Some(DbType::Double));

    let note = command.parameter("note").unwrap();
    assert_eq!(note.value, Value::Null);
    assert_eq!(note.db_type, Some(DbType::String));
}

#[test]
fn declared_db_type_coerces_before_binding() {
    let registry = registry();
    registry
        .entity::<Order>()
        .db_type("amount", DbType::String)
        .unwrap();
    let mapper = Mapper::new(SqlServer, &registry);
    let command = mapper.insert(&order(1, 2.5, None)).unwrap();
    let total = command.parameter("GrandTotal").unwrap();
    assert_eq!(total.value, Value::String("2.5".into()));
    assert_eq!(total.db_type, Some(DbType::String));
}

#[test]
fn property_handler_applies_in_both_directions() {
    let registry = registry();
    registry.entity::<Order>().handler("note", Upper).unwrap();
    let mapper = Mapper::new(SqlServer, &registry);

    let command = mapper.insert(&order(1, 1.0, Some("rush"))).unwrap();
    assert_eq!(
        command.parameter("note").unwrap().value,
        Value::String("RUSH".into())
    );

    let cursor = MemoryCursor::new(
        ["id", "GrandTotal", "note"],
        vec![vec![Value::Int(1), Value::Float(1.0), Value::from("RUSH")]],
    );
    let rows: Vec<Order> = collect(cursor, &registry).unwrap();
    assert_eq!(rows, [order(1, 1.0, Some("rush"))]);
}

#[test]
fn type_handler_applies_to_every_matching_property() {
    let registry = MappingRegistry::new();
    registry.type_handler::<Option<String>>(Upper, false).unwrap();
    assert!(registry.type_handler::<Option<String>>(Upper, false).is_err());

    let mapper = Mapper::new(SqlServer, &registry);
    let command = mapper.insert(&order(1, 1.0, Some("gift"))).unwrap();
    assert_eq!(
        command.parameter("note").unwrap().value,
        Value::String("GIFT".into())
    );
}

// =============================================================================
// Batching
// =============================================================================

#[test]
fn config_driven_batches_reuse_statements() {
    let config = Config::from_toml("dialect = \"postgres\"\nbatch_size = 2").unwrap();
    let registry = registry();
    let mapper = config.mapper(&registry);
    let orders = [
        order(1, 1.0, None),
        order(2, 2.0, None),
        order(3, 3.0, None),
        order(4, 4.0, None),
        order(5, 5.0, Some("last")),
    ];

    let commands = mapper.insert_all(&orders).unwrap();
    assert_eq!(commands.len(), 3);
    assert_eq!(commands[0].text, commands[1].text);
    assert_eq!(
        commands[0].text,
        "INSERT INTO \"sales\".\"Orders\" ( \"id\", \"GrandTotal\", \"note\" ) VALUES ( @id, @GrandTotal, @note ) ; \
         INSERT INTO \"sales\".\"Orders\" ( \"id\", \"GrandTotal\", \"note\" ) VALUES ( @id_1, @GrandTotal_1, @note_1 ) ;"
    );
    assert_eq!(commands[1].parameter("id_1").unwrap().value, Value::Int(4));
    assert_eq!(commands[2].parameters.len(), 3);
    assert_eq!(
        commands[2].parameter("note").unwrap().value,
        Value::String("last".into())
    );
    // Postgres parameters carry no direction
    assert!(commands[2].parameters.iter().all(|p| p.direction.is_none()));
}

#[test]
fn update_all_with_property_qualifier() {
    let registry = registry();
    let mapper = Mapper::new(SqlServer, &registry).batch_size(10);
    let orders = [order(1, 10.0, Some("a")), order(2, 20.0, Some("b"))];
    let commands = mapper.update_all(&orders, &["amount"]).unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(
        commands[0].text,
        "UPDATE [sales].[Orders] SET [id] = @id, [note] = @note WHERE ([GrandTotal] = @GrandTotal) ; \
         UPDATE [sales].[Orders] SET [id] = @id_1, [note] = @note_1 WHERE ([GrandTotal] = @GrandTotal_1) ;"
    );
    assert_eq!(commands[0].parameters.len(), 6);
}

#[test]
fn merge_all_chunks_by_parameter_cap() {
    let config = Config::from_toml("batch_size = 100\n[setting]\nmax_parameters = 6").unwrap();
    let registry = registry();
    let mapper = config.mapper(&registry);
    let orders: Vec<Order> = (1..=5).map(|i| order(i, 1.0, None)).collect();
    let commands = mapper.merge_all(&orders, &[]).unwrap();
    // 3 parameters per row, 6 per command
    assert_eq!(commands.len(), 3);
    assert!(commands.iter().all(|c| c.kind == StatementKind::MergeAll));
    assert_eq!(commands[0].text.matches("MERGE [sales].[Orders]").count(), 2);
}

#[test]
fn sql_server_default_cap_bounds_every_command() {
    let mapper = Mapper::new(SqlServer, &NoMapping).batch_size(1000);
    assert_eq!(mapper.setting().max_parameters, Some(2100));
    let orders: Vec<Order> = (1..=1500).map(|i| order(i, 1.0, None)).collect();

    let commands = mapper.insert_all(&orders).unwrap();
    // 3 parameters per row: 700 rows fit under 2100
    assert_eq!(commands.len(), 3);
    assert!(commands.iter().all(|c| c.parameters.len() <= 2100));
    assert_eq!(commands[0].parameters.len(), 2100);
    assert_eq!(commands[1].parameters.len(), 2100);
    assert_eq!(commands[2].parameters.len(), 300);
    assert_eq!(commands[0].text.matches("INSERT INTO [Orders]").count(), 700);
    assert_eq!(commands[1].parameter("id_699").unwrap().value, Value::Int(1400));
    assert_eq!(commands[2].parameter("id_99").unwrap().value, Value::Int(1500));
}

#[test]
fn empty_batches_produce_no_commands() {
    let mapper = Mapper::new(SqlServer, &NoMapping);
    assert!(mapper.insert_all::<Order>(&[]).unwrap().is_empty());
}

// =============================================================================
// Failure modes
// =============================================================================

#[test]
fn unknown_aggregate_property_fails() {
    let mapper = Mapper::new(SqlServer, &NoMapping);
    let err = mapper.sum::<Order>("missing", None).unwrap_err();
    assert_eq!(
        err,
        Error::UnknownProperty {
            entity: "Order".into(),
            property: "missing".into(),
        }
    );
}

#[test]
fn errors_render_readable_messages() {
    let registry = MappingRegistry::new();
    let err = registry.entity::<Order>().table("   ").err().unwrap();
    assert_eq!(err, Error::EmptyTableName);
    assert_eq!(err.to_string(), "Table name must not be empty or whitespace");
}
