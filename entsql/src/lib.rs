//! # entsql - entity metadata to parameterized SQL and back
//!
//! Describes entity types with explicit metadata, composes dialect-aware SQL
//! statements with named parameters, binds values onto commands and
//! materializes tabular results back into entities.
//!
//! ## Pipeline
//!
//! ```text
//! #[derive(Entity)] ──► FieldResolver ──► Composer<D> ──► Statement
//!                                                            │
//!                            rows ◄── materialize ◄── Cursor ◄── DbCommand (bind)
//! ```
//!
//! | Stage | Module | Output |
//! |-------|--------|--------|
//! | Metadata | [`entity`], [`mapping`] | descriptors, fluent overrides |
//! | Resolution | [`resolver`] | ordered field lists, keys |
//! | Composition | [`composer`], [`translate`] | [`Statement`] |
//! | Binding | [`binder`], [`convert`] | [`DbCommand`] |
//! | Materialization | [`cursor`], [`materialize`] | entities, bags, scalars |
//!
//! ## Example
//!
//! ```ignore
//! use entsql::{Entity, Mapper, MappingRegistry, SqlServer, query};
//!
//! #[derive(Entity, Default)]
//! #[entity(table = "Customers")]
//! pub struct Customer {
//!     #[column(primary, identity)]
//!     pub id: i64,
//!     pub name: String,
//! }
//!
//! let registry = MappingRegistry::new();
//! let mapper = Mapper::new(SqlServer, &registry);
//! let filter = query::and(vec![query::field("name", entsql::Operation::Like, "A%")]);
//! let command = mapper.query::<Customer>(Some(&filter), &[], Some(10))?;
//! // SELECT TOP (10) [id], [name] FROM [Customers] WHERE ([name] LIKE @name) ;
//! ```
//!
//! Statements are plain data: nothing here talks to a database. Execution
//! is the caller's business; [`Cursor`] is the seam results come back
//! through.

// Derive expansions name `::entsql`, including inside this crate's tests.
extern crate self as entsql;

pub mod binder;
pub mod composer;
pub mod config;
pub mod convert;
pub mod cursor;
pub mod dialect;
pub mod entity;
pub mod env;
pub mod error;
pub mod field;
pub mod mapper;
pub mod mapping;
pub mod materialize;
pub mod query;
pub mod resolver;
pub mod setting;
pub mod statement;
pub mod translate;
pub mod value;

pub use entsql_macros::{Entity, SqlEnum};

pub use binder::{DbCommand, DbParameter, ParameterSink, bind};
pub use composer::{
    Aggregate, AggregateBuilder, BatchQueryBuilder, Composer, DeleteBuilder, InsertBuilder,
    MergeBuilder, QueryBuilder, UpdateAllBuilder, UpdateBuilder,
};
pub use config::{Config, DEFAULT_BATCH_SIZE, SettingOverrides};
pub use convert::coerce;
pub use cursor::{Cursor, MemoryCursor};
pub use dialect::{AnyDialect, Dialect, IdentityRetrieval, Postgres, SqlServer, Sqlite, UpsertStyle};
pub use entity::{EntityDescriptor, PropertyDescriptor};
pub use error::{Error, Result};
pub use field::{DbField, Field, FieldBag, FieldSource, Order, OrderField, OrderedFieldList};
pub use mapper::Mapper;
pub use mapping::{FluentMapper, MappingLookup, MappingRegistry, NoMapping, PropertyHandler};
pub use materialize::{Projection, ProjectionCache, Rows, collect, materialize, materialize_bags, scalar};
pub use query::{Conjunction, Operation, QueryField, QueryGroup, QueryItem};
pub use resolver::{EntitySource, FieldResolver, Key, Keys};
pub use setting::{DbSetting, PagingStyle};
pub use statement::{Direction, Parameter, ParameterSource, Statement, StatementKind};
pub use translate::{ParameterNames, WhereClause, translate};
pub use value::{ClientType, DbType, EnumInfo, FromValue, SqlType, ToValue, Value, enum_from_value};

// Traits share their names with the derives; macros and types live in
// separate namespaces.
pub use entity::Entity;
pub use value::SqlEnum;
