//! Snapshot tests for SQL statement composition.
//!
//! These tests use insta inline snapshots to capture the generated SQL and
//! detect unexpected changes in statement output across dialects.
//!
//! Run with: cargo test -p entsql --test snapshots_sql
//! Update snapshots: cargo insta review

use entsql::query::{and, field, not, or};
use entsql::{
    Aggregate, ClientType, Composer, DbField, DbSetting, Field, Operation, OrderField, Postgres,
    QueryGroup, QueryItem, SqlServer, Sqlite, Value,
};
use insta::assert_snapshot;

fn people() -> Vec<Field> {
    vec![
        Field::new("Id").identity().with_type(ClientType::I32),
        Field::new("Name").with_type(ClientType::String),
        Field::new("Age").with_type(ClientType::I32),
    ]
}

fn nested_filter() -> QueryGroup {
    and(vec![
        field("Age", Operation::GreaterThanOrEqual, 18),
        QueryItem::from(or(vec![
            field("Name", Operation::Like, "A%"),
            field("Name", Operation::Like, "B%"),
        ])),
        QueryItem::from(not(field("Deleted", Operation::Equal, true))),
    ])
}

// =============================================================================
// Query Snapshots
// =============================================================================

#[test]
fn snapshot_query_nested_filter_sql_server() {
    let c = Composer::new(SqlServer);
    let fields = people();
    let filter = nested_filter();
    let stmt = c.query("People").fields(&fields).filter(&filter).build().unwrap();
    assert_snapshot!(
        stmt.sql,
        @"SELECT [Id], [Name], [Age] FROM [People] WHERE ([Age] >= @Age AND ([Name] LIKE @Name OR [Name] LIKE @Name_1) AND NOT ([Deleted] = @Deleted)) ;"
    );
    assert_eq!(stmt.parameter_names(), ["Age", "Name", "Name_1", "Deleted"]);
}

#[test]
fn snapshot_query_nested_filter_postgres() {
    let c = Composer::new(Postgres);
    let fields = people();
    let filter = nested_filter();
    let order = [OrderField::desc("Age"), OrderField::asc("Name")];
    let stmt = c
        .query("app.People")
        .fields(&fields)
        .filter(&filter)
        .order(&order)
        .top(50)
        .build()
        .unwrap();
    assert_snapshot!(
        stmt.sql,
        @r#"SELECT "Id", "Name", "Age" FROM "app"."People" WHERE ("Age" >= @Age AND ("Name" LIKE @Name OR "Name" LIKE @Name_1) AND NOT ("Deleted" = @Deleted)) ORDER BY "Age" DESC, "Name" ASC LIMIT 50 ;"#
    );
}

#[test]
fn snapshot_count_between_in_null() {
    let c = Composer::new(Postgres);
    let filter = and(vec![
        field("Age", Operation::Between, Value::array([18, 65])),
        field("Status", Operation::In, Value::array(["active", "trial"])),
        field("Email", Operation::Equal, Value::Null),
    ]);
    let stmt = c.count("People").filter(&filter).build().unwrap();
    assert_snapshot!(
        stmt.sql,
        @r#"SELECT COUNT (1) AS "CountValue" FROM "People" WHERE ("Age" BETWEEN @Age_Left AND @Age_Right AND "Status" IN (@Status_In_0, @Status_In_1) AND "Email" IS NULL) ;"#
    );
    assert_eq!(
        stmt.parameter_names(),
        ["Age_Left", "Age_Right", "Status_In_0", "Status_In_1"]
    );
}

#[test]
fn snapshot_batch_query_postgres() {
    let c = Composer::new(Postgres);
    let fields = people();
    let filter = QueryGroup::from(entsql::QueryField::new("Name", Operation::Like, "A%"));
    let order = [OrderField::asc("Id")];
    let stmt = c
        .batch_query("People")
        .fields(&fields)
        .filter(&filter)
        .order(&order)
        .page(2, 10)
        .build()
        .unwrap();
    assert_snapshot!(
        stmt.sql,
        @r#"SELECT "Id", "Name", "Age" FROM "People" WHERE ("Name" LIKE @Name) ORDER BY "Id" ASC LIMIT 10 OFFSET 20 ;"#
    );
}

#[test]
fn snapshot_batch_query_sql_server_with_hints() {
    let c = Composer::new(SqlServer);
    let fields = people();
    let order = [OrderField::desc("Age")];
    let stmt = c
        .batch_query("People")
        .fields(&fields)
        .order(&order)
        .page(0, 25)
        .hints("WITH (NOLOCK)")
        .build()
        .unwrap();
    assert_snapshot!(
        stmt.sql,
        @"WITH CTE AS ( SELECT ROW_NUMBER() OVER ( ORDER BY [Age] DESC ) AS [RowNumber], [Id], [Name], [Age] FROM [People] WITH (NOLOCK) ) SELECT [Id], [Name], [Age] FROM CTE WHERE ( [RowNumber] BETWEEN 1 AND 25 ) ORDER BY [Age] DESC ;"
    );
}

#[test]
fn snapshot_aggregates() {
    let c = Composer::new(SqlServer);
    let age = Field::new("Age").with_type(ClientType::I32);
    let avg = c.aggregate("People", Aggregate::Average, &age).build().unwrap();
    assert_snapshot!(avg.sql, @"SELECT AVG (CONVERT(FLOAT, [Age])) AS [AverageValue] FROM [People] ;");

    let pg = Composer::new(Postgres);
    let avg = pg.aggregate("People", Aggregate::Average, &age).build().unwrap();
    assert_snapshot!(avg.sql, @r#"SELECT AVG (CAST("Age" AS DOUBLE PRECISION)) AS "AverageValue" FROM "People" ;"#);

    let min = Composer::new(Sqlite)
        .aggregate("People", Aggregate::Min, &age)
        .build()
        .unwrap();
    assert_snapshot!(min.sql, @r#"SELECT MIN ("Age") AS "MinValue" FROM "People" ;"#);
}

// =============================================================================
// Write Snapshots
// =============================================================================

#[test]
fn snapshot_insert_per_dialect() {
    let fields = people();
    let sql_server = Composer::new(SqlServer).insert("People").fields(&fields).build().unwrap();
    assert_snapshot!(
        sql_server.sql,
        @"INSERT INTO [People] ( [Name], [Age] ) VALUES ( @Name, @Age ) ; SELECT CONVERT(INT, SCOPE_IDENTITY()) AS [Result] ;"
    );

    let postgres = Composer::new(Postgres).insert("People").fields(&fields).build().unwrap();
    assert_snapshot!(
        postgres.sql,
        @r#"INSERT INTO "People" ( "Name", "Age" ) VALUES ( @Name, @Age ) RETURNING CAST("Id" AS INTEGER) AS "Result" ;"#
    );
}

#[test]
fn snapshot_insert_all_sql_server() {
    let fields = people();
    let stmt = Composer::new(SqlServer)
        .insert_all("People")
        .fields(&fields)
        .batch_size(2)
        .build()
        .unwrap();
    assert_snapshot!(
        stmt.sql,
        @"INSERT INTO [People] ( [Name], [Age] ) VALUES ( @Name, @Age ) ; SET @Id = CONVERT(INT, SCOPE_IDENTITY()) ; INSERT INTO [People] ( [Name], [Age] ) VALUES ( @Name_1, @Age_1 ) ; SET @Id_1 = CONVERT(INT, SCOPE_IDENTITY()) ;"
    );
    assert_eq!(
        stmt.parameter_names(),
        ["Name", "Age", "Id", "Name_1", "Age_1", "Id_1"]
    );
}

#[test]
fn snapshot_update_by_key() {
    let fields = people();
    let stmt = Composer::new(SqlServer).update("People").fields(&fields).build().unwrap();
    assert_snapshot!(stmt.sql, @"UPDATE [People] SET [Name] = @Name, [Age] = @Age WHERE ([Id] = @Id) ;");
}

#[test]
fn snapshot_update_with_schema_precision() {
    let fields = Field::from_names(&["Code", "Price"]);
    let db = [
        DbField::new("Code").primary().with_size(16),
        DbField::new("Price").with_type(ClientType::F64).with_precision(18, 2),
    ];
    let stmt = Composer::new(Postgres)
        .update("Products")
        .fields(&fields)
        .db_fields(&db)
        .build()
        .unwrap();
    assert_snapshot!(stmt.sql, @r#"UPDATE "Products" SET "Price" = @Price WHERE ("Code" = @Code) ;"#);
    let price = stmt.parameter("Price").unwrap();
    assert_eq!((price.precision, price.scale), (Some(18), Some(2)));
    assert_eq!(stmt.parameter("Code").unwrap().size, Some(16));
}

#[test]
fn snapshot_delete_sqlite() {
    let filter = and(vec![field("Id", Operation::In, Value::array([1, 2, 3]))]);
    let stmt = Composer::new(Sqlite).delete("People").filter(&filter).build().unwrap();
    assert_snapshot!(
        stmt.sql,
        @r#"DELETE FROM "People" WHERE ("Id" IN (@Id_In_0, @Id_In_1, @Id_In_2)) ;"#
    );
}

#[test]
fn snapshot_merge_sql_server_explicit_qualifier() {
    let fields = people();
    let qualifiers = Field::from_names(&["Name"]);
    let stmt = Composer::new(SqlServer)
        .merge("People")
        .fields(&fields)
        .qualifiers(&qualifiers)
        .build()
        .unwrap();
    assert_snapshot!(
        stmt.sql,
        @"MERGE [People] AS T USING ( SELECT @Id AS [Id], @Name AS [Name], @Age AS [Age] ) AS S ON ( S.[Name] = T.[Name] ) WHEN NOT MATCHED THEN INSERT ( [Name], [Age] ) VALUES ( S.[Name], S.[Age] ) WHEN MATCHED THEN UPDATE SET [Age] = S.[Age] OUTPUT INSERTED.[Id] AS [Result] ;"
    );
}

#[test]
fn snapshot_merge_sqlite_fallback() {
    let setting = DbSetting {
        is_upsert_supported: false,
        ..DbSetting::SQLITE
    };
    let fields = vec![Field::new("Code").primary(), Field::new("Label")];
    let stmt = Composer::with_setting(Sqlite, setting)
        .merge("Codes")
        .fields(&fields)
        .build()
        .unwrap();
    assert_snapshot!(
        stmt.sql,
        @r#"UPDATE "Codes" SET "Label" = @Label WHERE ("Code" = @Code) ; INSERT INTO "Codes" ( "Code", "Label" ) SELECT @Code, @Label WHERE NOT EXISTS ( SELECT 1 FROM "Codes" WHERE ("Code" = @Code) ) ;"#
    );
}

#[test]
fn snapshot_truncate_and_delete_all() {
    let sql_server = Composer::new(SqlServer);
    assert_snapshot!(sql_server.create_truncate("dbo.People").unwrap().sql, @"TRUNCATE TABLE [dbo].[People] ;");
    let sqlite = Composer::new(Sqlite);
    assert_snapshot!(sqlite.create_truncate("People").unwrap().sql, @r#"DELETE FROM "People" ;"#);
}
