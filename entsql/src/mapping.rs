//! Fluent mapping registrations.
//!
//! A write-once, read-mostly store keyed by entity type (and property name).
//! The resolver, binder and materializer only see it through the
//! [`MappingLookup`] trait, so tests can pass an isolated registry or
//! [`NoMapping`] instead of the process-wide instance.

use std::any::TypeId;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::debug;

use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::value::{DbType, Value};

/// Value transform applied to one property (or every property of one type).
pub trait PropertyHandler: Send + Sync + fmt::Debug {
    /// Database value to property value, applied during materialization.
    fn get(&self, value: Value) -> Result<Value>;

    /// Property value to database value, applied before binding.
    fn set(&self, value: Value) -> Result<Value>;
}

/// Read access to mapping registrations.
pub trait MappingLookup: Send + Sync {
    /// Registered table name for an entity.
    fn table(&self, entity: TypeId) -> Option<String>;

    /// Registered column name for a property.
    fn column(&self, entity: TypeId, property: &str) -> Option<String>;

    /// Registered primary key property.
    fn primary(&self, entity: TypeId) -> Option<String>;

    /// Registered identity property.
    fn identity(&self, entity: TypeId) -> Option<String>;

    /// Registered database type for a property.
    fn db_type(&self, entity: TypeId, property: &str) -> Option<DbType>;

    /// Handler registered for a property.
    fn property_handler(&self, entity: TypeId, property: &str) -> Option<Arc<dyn PropertyHandler>>;

    /// Handler registered for every property of a Rust type.
    fn type_handler(&self, ty: TypeId) -> Option<Arc<dyn PropertyHandler>>;

    /// Property handler first, then type handler.
    fn handler(
        &self,
        entity: TypeId,
        property: &str,
        ty: TypeId,
    ) -> Option<Arc<dyn PropertyHandler>> {
        self.property_handler(entity, property)
            .or_else(|| self.type_handler(ty))
    }
}

/// Lookup with no registrations.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoMapping;

impl MappingLookup for NoMapping {
    fn table(&self, _: TypeId) -> Option<String> {
        None
    }

    fn column(&self, _: TypeId, _: &str) -> Option<String> {
        None
    }

    fn primary(&self, _: TypeId) -> Option<String> {
        None
    }

    fn identity(&self, _: TypeId) -> Option<String> {
        None
    }

    fn db_type(&self, _: TypeId, _: &str) -> Option<DbType> {
        None
    }

    fn property_handler(&self, _: TypeId, _: &str) -> Option<Arc<dyn PropertyHandler>> {
        None
    }

    fn type_handler(&self, _: TypeId) -> Option<Arc<dyn PropertyHandler>> {
        None
    }
}

type PropertyKey = (TypeId, String);

#[derive(Debug, Default)]
struct Registrations {
    tables: HashMap<TypeId, String>,
    columns: HashMap<PropertyKey, String>,
    primaries: HashMap<TypeId, String>,
    identities: HashMap<TypeId, String>,
    db_types: HashMap<PropertyKey, DbType>,
    property_handlers: HashMap<PropertyKey, Arc<dyn PropertyHandler>>,
    type_handlers: HashMap<TypeId, Arc<dyn PropertyHandler>>,
}

/// Store of fluent registrations.
#[derive(Debug, Default)]
pub struct MappingRegistry {
    inner: RwLock<Registrations>,
}

static GLOBAL: OnceLock<MappingRegistry> = OnceLock::new();

impl MappingRegistry {
    /// Empty, independent registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Process-wide registry.
    pub fn global() -> &'static Self {
        GLOBAL.get_or_init(Self::new)
    }

    /// Drop every registration. Intended for test teardown.
    pub fn clear(&self) {
        *self.inner.write() = Registrations::default();
        debug!("mapping registry cleared");
    }

    /// Start registering mappings for `T`. Existing registrations are kept
    /// and re-registering one fails.
    pub fn entity<T: Entity>(&self) -> FluentMapper<'_, T> {
        FluentMapper {
            registry: self,
            force: false,
            _entity: PhantomData,
        }
    }

    /// Register a handler for every property whose Rust type is `P`.
    pub fn type_handler<P: 'static>(
        &self,
        handler: impl PropertyHandler + 'static,
        force: bool,
    ) -> Result<()> {
        let mut inner = self.inner.write();
        let key = TypeId::of::<P>();
        if !force && inner.type_handlers.contains_key(&key) {
            return Err(exists(std::any::type_name::<P>(), "*", "type handler"));
        }
        inner.type_handlers.insert(key, Arc::new(handler));
        debug!(ty = std::any::type_name::<P>(), "type handler registered");
        Ok(())
    }
}

fn exists(table: &str, field: &str, what: &str) -> Error {
    Error::InvalidConfiguration {
        table: table.to_string(),
        field: field.to_string(),
        reason: format!("{what} is already registered"),
    }
}

impl MappingLookup for MappingRegistry {
    fn table(&self, entity: TypeId) -> Option<String> {
        self.inner.read().tables.get(&entity).cloned()
    }

    fn column(&self, entity: TypeId, property: &str) -> Option<String> {
        self.inner
            .read()
            .columns
            .get(&(entity, property.to_string()))
            .cloned()
    }

    fn primary(&self, entity: TypeId) -> Option<String> {
        self.inner.read().primaries.get(&entity).cloned()
    }

    fn identity(&self, entity: TypeId) -> Option<String> {
        self.inner.read().identities.get(&entity).cloned()
    }

    fn db_type(&self, entity: TypeId, property: &str) -> Option<DbType> {
        self.inner
            .read()
            .db_types
            .get(&(entity, property.to_string()))
            .copied()
    }

    fn property_handler(&self, entity: TypeId, property: &str) -> Option<Arc<dyn PropertyHandler>> {
        self.inner
            .read()
            .property_handlers
            .get(&(entity, property.to_string()))
            .cloned()
    }

    fn type_handler(&self, ty: TypeId) -> Option<Arc<dyn PropertyHandler>> {
        self.inner.read().type_handlers.get(&ty).cloned()
    }
}

/// Builder registering mappings for one entity type.
///
/// ```ignore
/// registry
///     .entity::<Customer>()
///     .table("sales.Customers")?
///     .column("name", "FullName")?
///     .primary("id")?;
/// ```
pub struct FluentMapper<'r, T> {
    registry: &'r MappingRegistry,
    force: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<T: Entity> FluentMapper<'_, T> {
    /// Overwrite existing registrations instead of failing.
    #[must_use]
    pub const fn force(mut self) -> Self {
        self.force = true;
        self
    }

    fn entity_name() -> &'static str {
        T::descriptor().name
    }

    fn property(property: &str) -> Result<String> {
        T::descriptor()
            .property(property)
            .map(|(_, p)| p.name.to_string())
            .ok_or_else(|| Error::UnknownProperty {
                entity: Self::entity_name().to_string(),
                property: property.to_string(),
            })
    }

    /// Table name.
    pub fn table(self, table: impl Into<String>) -> Result<Self> {
        let table = table.into();
        if table.trim().is_empty() {
            return Err(Error::EmptyTableName);
        }
        {
            let mut inner = self.registry.inner.write();
            let key = TypeId::of::<T>();
            if !self.force && inner.tables.contains_key(&key) {
                return Err(exists(Self::entity_name(), "*", "table mapping"));
            }
            debug!(entity = Self::entity_name(), table = %table, "table mapping registered");
            inner.tables.insert(key, table);
        }
        Ok(self)
    }

    /// Column name for a property.
    pub fn column(self, property: &str, column: impl Into<String>) -> Result<Self> {
        let property = Self::property(property)?;
        let column = column.into();
        {
            let mut inner = self.registry.inner.write();
            let key = (TypeId::of::<T>(), property.clone());
            if !self.force && inner.columns.contains_key(&key) {
                return Err(exists(Self::entity_name(), &property, "column mapping"));
            }
            debug!(entity = Self::entity_name(), property = %property, column = %column, "column mapping registered");
            inner.columns.insert(key, column);
        }
        Ok(self)
    }

    /// Primary key property. Replaces attribute markers for this entity.
    pub fn primary(self, property: &str) -> Result<Self> {
        let property = Self::property(property)?;
        {
            let mut inner = self.registry.inner.write();
            let key = TypeId::of::<T>();
            if !self.force && inner.primaries.contains_key(&key) {
                return Err(exists(Self::entity_name(), &property, "primary mapping"));
            }
            debug!(entity = Self::entity_name(), property = %property, "primary mapping registered");
            inner.primaries.insert(key, property);
        }
        Ok(self)
    }

    /// Identity property. Replaces attribute markers for this entity.
    pub fn identity(self, property: &str) -> Result<Self> {
        let property = Self::property(property)?;
        {
            let mut inner = self.registry.inner.write();
            let key = TypeId::of::<T>();
            if !self.force && inner.identities.contains_key(&key) {
                return Err(exists(Self::entity_name(), &property, "identity mapping"));
            }
            debug!(entity = Self::entity_name(), property = %property, "identity mapping registered");
            inner.identities.insert(key, property);
        }
        Ok(self)
    }

    /// Database type for a property.
    pub fn db_type(self, property: &str, ty: DbType) -> Result<Self> {
        let property = Self::property(property)?;
        {
            let mut inner = self.registry.inner.write();
            let key = (TypeId::of::<T>(), property.clone());
            if !self.force && inner.db_types.contains_key(&key) {
                return Err(exists(Self::entity_name(), &property, "db type mapping"));
            }
            debug!(entity = Self::entity_name(), property = %property, ?ty, "db type mapping registered");
            inner.db_types.insert(key, ty);
        }
        Ok(self)
    }

    /// Value handler for a property.
    pub fn handler(self, property: &str, handler: impl PropertyHandler + 'static) -> Result<Self> {
        let property = Self::property(property)?;
        {
            let mut inner = self.registry.inner.write();
            let key = (TypeId::of::<T>(), property.clone());
            if !self.force && inner.property_handlers.contains_key(&key) {
                return Err(exists(Self::entity_name(), &property, "property handler"));
            }
            debug!(entity = Self::entity_name(), property = %property, "property handler registered");
            inner.property_handlers.insert(key, Arc::new(handler));
        }
        Ok(self)
    }
}
