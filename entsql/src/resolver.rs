//! Field resolution: entity metadata to an ordered list of persisted columns.
//!
//! Column precedence per property, highest first: explicit override for the
//! call, fluent registration, `#[column(name)]`, property name. Table
//! precedence: explicit, fluent, `map` marker, `table` marker (with schema),
//! type name.

use crate::entity::{Entity, EntityDescriptor};
use crate::error::{Error, Result};
use crate::field::{DbField, Field, FieldBag, FieldSource, OrderedFieldList, find_field};
use crate::mapping::MappingLookup;
use crate::value::{ClientType, DbType, Value};

/// Boundary variant for entity inputs: a typed entity or a dynamic bag.
///
/// Both resolve to the same [`OrderedFieldList`] shape.
#[derive(Debug, Clone, Copy)]
pub enum EntitySource<'a> {
    /// Statically described entity type.
    Typed(&'static EntityDescriptor),
    /// Dynamic field bag bound to a table.
    Dynamic {
        /// Table name.
        table: &'a str,
        /// Column values; only the keys matter for resolution.
        bag: &'a FieldBag,
    },
}

/// Resolves tables and fields against a mapping lookup.
#[derive(Clone, Copy)]
pub struct FieldResolver<'l> {
    lookup: &'l dyn MappingLookup,
}

impl<'l> FieldResolver<'l> {
    /// Resolver reading fluent registrations from `lookup`.
    pub fn new(lookup: &'l dyn MappingLookup) -> Self {
        Self { lookup }
    }

    /// The lookup this resolver reads.
    pub fn lookup(&self) -> &'l dyn MappingLookup {
        self.lookup
    }

    /// Unquoted table name for an entity.
    pub fn resolve_table(&self, desc: &EntityDescriptor, explicit: Option<&str>) -> Result<String> {
        let table = if let Some(explicit) = explicit {
            explicit.to_string()
        } else if let Some(fluent) = self.lookup.table(desc.type_id) {
            fluent
        } else if let Some(map) = desc.map {
            // map wins over table even when both are declared
            map.to_string()
        } else if let Some(table) = desc.table {
            match desc.schema {
                Some(schema) => format!("{schema}.{table}"),
                None => table.to_string(),
            }
        } else {
            desc.name.to_string()
        };

        if table.trim().is_empty() {
            return Err(Error::EmptyTableName);
        }
        Ok(table)
    }

    /// Persisted fields of an entity in declaration order.
    ///
    /// `overrides` are `(property, column)` pairs for this call only.
    pub fn resolve_fields(
        &self,
        desc: &EntityDescriptor,
        overrides: &[(&str, &str)],
    ) -> Result<Vec<Field>> {
        for (property, _) in overrides {
            let persisted = desc
                .property(property)
                .is_some_and(|(_, p)| p.is_persisted());
            if !persisted {
                return Err(Error::UnknownProperty {
                    entity: desc.name.to_string(),
                    property: (*property).to_string(),
                });
            }
        }

        let fluent_primary = self.lookup.primary(desc.type_id);
        let fluent_identity = self.lookup.identity(desc.type_id);

        let mut fields: Vec<Field> = Vec::with_capacity(desc.properties.len());
        for (index, prop) in desc.properties.iter().enumerate() {
            if !prop.is_persisted() {
                continue;
            }

            let explicit = overrides
                .iter()
                .find(|(p, _)| *p == prop.name)
                .or_else(|| overrides.iter().find(|(p, _)| p.eq_ignore_ascii_case(prop.name)));
            let (name, source) = if let Some((_, column)) = explicit {
                ((*column).to_string(), FieldSource::Explicit)
            } else if let Some(column) = self.lookup.column(desc.type_id, prop.name) {
                (column, FieldSource::Fluent)
            } else if let Some(column) = prop.column {
                (column.to_string(), FieldSource::Attribute)
            } else {
                (prop.name.to_string(), FieldSource::Convention)
            };

            if let Some(existing) = fields.iter().find(|f| f.is(&name)) {
                return Err(Error::AmbiguousMapping {
                    entity: desc.name.to_string(),
                    column: name,
                    first: existing.property.clone().unwrap_or_default(),
                    second: prop.name.to_string(),
                });
            }

            let is_primary = fluent_primary
                .as_deref()
                .map_or(prop.primary, |p| p == prop.name);
            let is_identity = fluent_identity
                .as_deref()
                .map_or(prop.identity, |p| p == prop.name);

            fields.push(Field {
                name,
                property: Some(prop.name.to_string()),
                client_type: prop.client_type,
                db_type: self
                    .lookup
                    .db_type(desc.type_id, prop.name)
                    .or(prop.db_type),
                is_nullable: prop.nullable && !is_primary && !is_identity,
                is_primary,
                is_identity,
                source,
                index: Some(index),
            });
        }
        Ok(fields)
    }

    /// Table and fields for any entity source.
    pub fn resolve(
        &self,
        source: EntitySource<'_>,
        table: Option<&str>,
        overrides: &[(&str, &str)],
    ) -> Result<OrderedFieldList> {
        match source {
            EntitySource::Typed(desc) => Ok(OrderedFieldList {
                entity: desc.name.to_string(),
                table: self.resolve_table(desc, table)?,
                fields: self.resolve_fields(desc, overrides)?,
            }),
            EntitySource::Dynamic { table: bag_table, bag } => {
                describe_bag(table.unwrap_or(bag_table), bag)
            },
        }
    }

    /// Table and fields for `T`.
    pub fn resolve_entity<T: Entity>(
        &self,
        table: Option<&str>,
        overrides: &[(&str, &str)],
    ) -> Result<OrderedFieldList> {
        self.resolve(EntitySource::Typed(T::descriptor()), table, overrides)
    }
}

/// Field list of a dynamic bag: one field per key, typed from its value.
pub fn describe_bag(table: &str, bag: &FieldBag) -> Result<OrderedFieldList> {
    if table.trim().is_empty() {
        return Err(Error::EmptyTableName);
    }

    let mut fields: Vec<Field> = Vec::with_capacity(bag.len());
    for (name, value) in bag {
        if name.trim().is_empty() {
            return Err(Error::InvalidConfiguration {
                table: table.to_string(),
                field: name.clone(),
                reason: "column name must not be empty".to_string(),
            });
        }
        if let Some(existing) = fields.iter().find(|f| f.is(name)) {
            return Err(Error::AmbiguousMapping {
                entity: table.to_string(),
                column: name.clone(),
                first: existing.name.clone(),
                second: name.clone(),
            });
        }
        let mut field = Field::new(name.as_str());
        field.client_type = DbType::of(value).map(DbType::client_type);
        field.source = FieldSource::Dynamic;
        fields.push(field);
    }

    Ok(OrderedFieldList {
        entity: table.to_string(),
        table: table.to_string(),
        fields,
    })
}

/// A primary or identity column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Key {
    /// Column name, as spelled in the field list when present there.
    pub name: String,
    /// Client type, from the field list or the schema.
    pub client_type: Option<ClientType>,
    /// Whether the column is part of the resolved field list.
    pub in_fields: bool,
}

/// Primary and identity columns of a table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Keys {
    /// Primary key column (first one for composite keys).
    pub primary: Option<Key>,
    /// Identity column.
    pub identity: Option<Key>,
}

impl Keys {
    /// Primary key, falling back to identity.
    pub fn key(&self) -> Option<&Key> {
        self.primary.as_ref().or(self.identity.as_ref())
    }

    /// Whether `name` is the identity column.
    pub fn is_identity(&self, name: &str) -> bool {
        self.identity
            .as_ref()
            .is_some_and(|k| k.name.eq_ignore_ascii_case(name))
    }

    /// Whether `name` is the primary or identity column.
    pub fn is_key(&self, name: &str) -> bool {
        self.is_identity(name)
            || self
                .primary
                .as_ref()
                .is_some_and(|k| k.name.eq_ignore_ascii_case(name))
    }
}

/// Decide primary and identity columns.
///
/// Physical schema metadata wins when present; declared markers are used
/// otherwise. A declared marker on a column the schema reports as a plain
/// column fails with `InvalidConfiguration`.
pub fn reconcile_keys(table: &str, fields: &[Field], db_fields: &[DbField]) -> Result<Keys> {
    if db_fields.is_empty() {
        let key = |f: &Field| Key {
            name: f.name.clone(),
            client_type: f.client_type,
            in_fields: true,
        };
        return Ok(Keys {
            primary: fields.iter().find(|f| f.is_primary).map(key),
            identity: fields.iter().find(|f| f.is_identity).map(key),
        });
    }

    for field in fields {
        let Some(db) = db_fields.iter().find(|d| d.name.eq_ignore_ascii_case(&field.name)) else {
            continue;
        };
        if field.is_primary && !db.is_primary {
            return Err(mismatch(
                table,
                &field.name,
                "declared primary but the column is not a primary key",
            ));
        }
        if field.is_identity && !db.is_identity {
            return Err(mismatch(
                table,
                &field.name,
                "declared identity but the column is not an identity",
            ));
        }
    }

    let key = |db: &DbField| {
        let field = find_field(fields, &db.name);
        Key {
            name: field.map_or_else(|| db.name.clone(), |f| f.name.clone()),
            client_type: field.and_then(|f| f.client_type).or(db.client_type),
            in_fields: field.is_some(),
        }
    };
    Ok(Keys {
        primary: db_fields.iter().find(|d| d.is_primary).map(key),
        identity: db_fields.iter().find(|d| d.is_identity).map(key),
    })
}

fn mismatch(table: &str, field: &str, reason: &str) -> Error {
    Error::InvalidConfiguration {
        table: table.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

/// Column values of a typed entity, keyed by resolved column name.
///
/// Outbound property and type handlers are applied here.
pub fn to_field_bag<T: Entity>(
    entity: &T,
    list: &OrderedFieldList,
    lookup: &dyn MappingLookup,
) -> Result<FieldBag> {
    let desc = T::descriptor();
    let mut values = entity.values();
    let mut bag = FieldBag::with_capacity(list.fields.len());

    for field in &list.fields {
        let Some(index) = field.index else { continue };
        let (Some(prop), Some(slot)) = (desc.properties.get(index), values.get_mut(index)) else {
            continue;
        };
        let mut value = std::mem::replace(slot, Value::Null);
        if let Some(handler) = lookup.handler(desc.type_id, prop.name, (prop.type_id)()) {
            value = handler
                .set(value)
                .map_err(|e| e.with_context(format!("{}.{}", desc.name, prop.name)))?;
        }
        bag.insert(field.name.clone(), value);
    }
    Ok(bag)
}
