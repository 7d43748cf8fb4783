//! Field descriptors: resolved fields, physical schema fields and sort keys.

use std::fmt;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::setting::DbSetting;
use crate::value::{ClientType, DbType, Value};

/// Dynamic row: column name to value, in insertion order.
pub type FieldBag = IndexMap<String, Value>;

/// Look a column up in a bag: exact name first, then case-insensitive.
pub fn bag_get<'a>(bag: &'a FieldBag, column: &str) -> Option<&'a Value> {
    bag.get(column).or_else(|| {
        bag.iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value)
    })
}

/// Which layer decided a field's column name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// Caller-supplied override for this call.
    Explicit,
    /// Fluent registration in a [`crate::MappingRegistry`].
    Fluent,
    /// `#[column(name = "...")]` on the property.
    Attribute,
    /// The property name unchanged.
    Convention,
    /// Key of a dynamic field bag.
    Dynamic,
}

/// A resolved, persisted field. Immutable once resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Column name (unquoted).
    pub name: String,
    /// Property the column came from, for typed entities.
    pub property: Option<String>,
    /// Expected language-level type.
    pub client_type: Option<ClientType>,
    /// Declared database type.
    pub db_type: Option<DbType>,
    /// Declared nullability.
    pub is_nullable: bool,
    /// Declared primary key marker.
    pub is_primary: bool,
    /// Declared identity marker.
    pub is_identity: bool,
    /// Layer the column name came from.
    pub source: FieldSource,
    pub(crate) index: Option<usize>,
}

impl Field {
    /// A field known only by its column name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            property: None,
            client_type: None,
            db_type: None,
            is_nullable: true,
            is_primary: false,
            is_identity: false,
            source: FieldSource::Explicit,
            index: None,
        }
    }

    /// Fields for a list of column names.
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Vec<Self> {
        names.iter().map(|name| Self::new(name.as_ref())).collect()
    }

    /// Set the client type.
    #[must_use]
    pub const fn with_type(mut self, ty: ClientType) -> Self {
        self.client_type = Some(ty);
        self
    }

    /// Set the database type.
    #[must_use]
    pub const fn with_db_type(mut self, ty: DbType) -> Self {
        self.db_type = Some(ty);
        self
    }

    /// Mark as primary key.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.is_primary = true;
        self.is_nullable = false;
        self
    }

    /// Mark as identity.
    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.is_identity = true;
        self.is_nullable = false;
        self
    }

    /// Case-insensitive name comparison.
    pub fn is(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// Position of the property inside its entity descriptor.
    pub const fn property_index(&self) -> Option<usize> {
        self.index
    }
}

/// Find a field by name: exact match first, then case-insensitive.
pub fn find_field<'a>(fields: &'a [Field], name: &str) -> Option<&'a Field> {
    fields
        .iter()
        .find(|f| f.name == name)
        .or_else(|| fields.iter().find(|f| f.is(name)))
}

/// Physical column descriptor, as reported by the database schema.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DbField {
    /// Column name.
    pub name: String,
    /// Part of the primary key.
    pub is_primary: bool,
    /// Generated by the database on insert.
    pub is_identity: bool,
    /// Accepts NULL.
    pub is_nullable: bool,
    /// Client type the driver maps this column to.
    pub client_type: Option<ClientType>,
    /// Maximum length for text and binary columns.
    pub size: Option<u32>,
    /// Numeric precision.
    pub precision: Option<u8>,
    /// Numeric scale.
    pub scale: Option<u8>,
}

impl DbField {
    /// Nullable, non-key column.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            is_nullable: true,
            ..Self::default()
        }
    }

    /// Mark as primary key.
    #[must_use]
    pub const fn primary(mut self) -> Self {
        self.is_primary = true;
        self.is_nullable = false;
        self
    }

    /// Mark as identity.
    #[must_use]
    pub const fn identity(mut self) -> Self {
        self.is_identity = true;
        self.is_nullable = false;
        self
    }

    /// Set the client type.
    #[must_use]
    pub const fn with_type(mut self, ty: ClientType) -> Self {
        self.client_type = Some(ty);
        self
    }

    /// Set the size.
    #[must_use]
    pub const fn with_size(mut self, size: u32) -> Self {
        self.size = Some(size);
        self
    }

    /// Set precision and scale.
    #[must_use]
    pub const fn with_precision(mut self, precision: u8, scale: u8) -> Self {
        self.precision = Some(precision);
        self.scale = Some(scale);
        self
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
    /// Ascending order.
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

impl Order {
    /// SQL keyword.
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Ascending => "ASC",
            Self::Descending => "DESC",
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderField {
    /// Column name.
    pub name: String,
    /// Direction.
    pub order: Order,
}

impl OrderField {
    /// Ascending sort on `name`.
    pub fn asc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: Order::Ascending,
        }
    }

    /// Descending sort on `name`.
    pub fn desc(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            order: Order::Descending,
        }
    }

    /// Parse a sort string like `"name,-created_at,+id"`.
    ///
    /// A leading `-` sorts descending; `+` or nothing sorts ascending.
    pub fn parse_list(sort: &str) -> Result<Vec<Self>> {
        let mut result = Vec::new();
        for part in sort.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let (name, order) = if let Some(name) = part.strip_prefix('-') {
                (name.trim(), Order::Descending)
            } else if let Some(name) = part.strip_prefix('+') {
                (name.trim(), Order::Ascending)
            } else {
                (part, Order::Ascending)
            };
            if name.is_empty() {
                return Err(Error::empty("Sort field name"));
            }
            result.push(Self {
                name: name.to_string(),
                order,
            });
        }
        Ok(result)
    }

    /// `[Name] ASC`.
    pub fn render(&self, setting: &DbSetting) -> String {
        format!("{} {}", setting.quote(&self.name), self.order.keyword())
    }
}

impl fmt::Display for OrderField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.order.keyword())
    }
}

/// Result of field resolution: the table and its ordered persisted fields.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedFieldList {
    /// Entity type name, or the table name for dynamic inputs.
    pub entity: String,
    /// Unquoted table name.
    pub table: String,
    /// Persisted fields in declaration order.
    pub fields: Vec<Field>,
}

impl OrderedFieldList {
    /// Find a field by column name.
    pub fn get(&self, name: &str) -> Option<&Field> {
        find_field(&self.fields, name)
    }

    /// Find a field by property name, falling back to column name.
    pub fn by_property(&self, property: &str) -> Option<&Field> {
        self.fields
            .iter()
            .find(|f| f.property.as_deref() == Some(property))
            .or_else(|| {
                self.fields.iter().find(|f| {
                    f.property
                        .as_deref()
                        .is_some_and(|p| p.eq_ignore_ascii_case(property))
                })
            })
            .or_else(|| self.get(property))
    }

    /// Column names in order.
    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}
