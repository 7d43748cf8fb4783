//! Explicit entity metadata, generated by `#[derive(Entity)]`.
//!
//! Resolution reads this plain data instead of inspecting types at runtime.

use std::any::TypeId;

use crate::error::Result;
use crate::value::{ClientType, DbType, SqlType, Value};

/// Metadata for one property of an entity.
#[derive(Debug, Clone)]
pub struct PropertyDescriptor {
    /// Rust field name.
    pub name: &'static str,
    /// `#[column(name = "...")]` override.
    pub column: Option<&'static str>,
    /// Client type of the field.
    pub client_type: Option<ClientType>,
    /// `Option<_>` field.
    pub nullable: bool,
    /// `#[column(primary)]`.
    pub primary: bool,
    /// `#[column(identity)]`.
    pub identity: bool,
    /// `#[column(db_type = "...")]`.
    pub db_type: Option<DbType>,
    /// `#[column(skip)]`.
    pub not_mapped: bool,
    /// Publicly accessible field. Private fields are not persisted.
    pub accessible: bool,
    /// Rust type of the field, for type-level handlers.
    pub type_id: fn() -> TypeId,
}

impl PropertyDescriptor {
    /// Mapped, public property of type `T`.
    pub fn of<T: SqlType + 'static>(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            client_type: Some(T::CLIENT_TYPE),
            nullable: T::NULLABLE,
            primary: false,
            identity: false,
            db_type: None,
            not_mapped: false,
            accessible: true,
            type_id: TypeId::of::<T>,
        }
    }

    /// Property that is never persisted.
    pub fn unmapped(name: &'static str) -> Self {
        Self {
            name,
            column: None,
            client_type: None,
            nullable: true,
            primary: false,
            identity: false,
            db_type: None,
            not_mapped: true,
            accessible: true,
            type_id: TypeId::of::<()>,
        }
    }

    /// Column name override.
    #[must_use]
    pub const fn column(mut self, column: &'static str) -> Self {
        self.column = Some(column);
        self
    }

    /// Primary key marker.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    /// Identity marker.
    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.identity = true;
        self
    }

    /// Declared database type.
    #[must_use]
    pub const fn db_type(mut self, ty: DbType) -> Self {
        self.db_type = Some(ty);
        self
    }

    /// Non-public field.
    #[must_use]
    pub const fn private(mut self) -> Self {
        self.accessible = false;
        self
    }

    /// Whether the property takes part in persistence.
    pub const fn is_persisted(&self) -> bool {
        self.accessible && !self.not_mapped
    }
}

/// Metadata for an entity type.
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    /// Rust type.
    pub type_id: TypeId,
    /// Rust type name.
    pub name: &'static str,
    /// `#[entity(table = "...")]`.
    pub table: Option<&'static str>,
    /// `#[entity(schema = "...")]`, combined with `table`.
    pub schema: Option<&'static str>,
    /// `#[entity(map = "...")]`.
    pub map: Option<&'static str>,
    /// Every field in declaration order, persisted or not.
    pub properties: Vec<PropertyDescriptor>,
}

impl EntityDescriptor {
    /// Descriptor for `T` with no table markers.
    pub fn new<T: 'static>(name: &'static str, properties: Vec<PropertyDescriptor>) -> Self {
        Self {
            type_id: TypeId::of::<T>(),
            name,
            table: None,
            schema: None,
            map: None,
            properties,
        }
    }

    /// Find a property by name: exact first, then case-insensitive.
    pub fn property(&self, name: &str) -> Option<(usize, &PropertyDescriptor)> {
        self.properties
            .iter()
            .enumerate()
            .find(|(_, p)| p.name == name)
            .or_else(|| {
                self.properties
                    .iter()
                    .enumerate()
                    .find(|(_, p)| p.name.eq_ignore_ascii_case(name))
            })
    }
}

/// A type with a static metadata description.
///
/// `values()` and `assign()` index into `descriptor().properties`.
pub trait Entity: Sized + 'static {
    /// Static metadata.
    fn descriptor() -> &'static EntityDescriptor;

    /// One value per property, in descriptor order. Unmapped properties yield `Null`.
    fn values(&self) -> Vec<Value>;

    /// Assign the property at `index`. Unmapped properties ignore the call.
    fn assign(&mut self, index: usize, value: Value) -> Result<()>;
}
