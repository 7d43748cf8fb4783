//! Result materialization: cursor rows to entities or field bags.
//!
//! A [`Projection`] is compiled from the first row's column shape and the
//! target type, then reused for every following row. It records, per bound
//! property, the column ordinal and the optional value handler; conversion
//! itself is the property type's [`crate::FromValue`].
//!
//! Unmatched properties keep their `Default` value. Unmatched columns are
//! ignored.

use std::any::TypeId;
use std::marker::PhantomData;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use crate::cursor::Cursor;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::field::FieldBag;
use crate::mapping::{MappingLookup, PropertyHandler};
use crate::resolver::FieldResolver;
use crate::value::FromValue;

/// One bound property of a projection.
#[derive(Debug, Clone)]
struct Slot {
    ordinal: usize,
    property: usize,
    column: String,
    handler: Option<Arc<dyn PropertyHandler>>,
}

/// Compiled column-to-property mapping for one entity type and column shape.
#[derive(Debug, Clone)]
pub struct Projection {
    entity: &'static str,
    type_id: TypeId,
    columns: Vec<String>,
    slots: Vec<Slot>,
}

impl Projection {
    /// Match `columns` against the resolved fields of `T`.
    ///
    /// Column names match exactly first, then case-insensitively.
    pub fn compile<T: Entity>(columns: &[String], lookup: &dyn MappingLookup) -> Result<Self> {
        let desc = T::descriptor();
        let fields = FieldResolver::new(lookup).resolve_fields(desc, &[])?;

        let mut slots = Vec::with_capacity(fields.len());
        for field in &fields {
            let Some(index) = field.property_index() else {
                continue;
            };
            let ordinal = columns
                .iter()
                .position(|c| *c == field.name)
                .or_else(|| columns.iter().position(|c| c.eq_ignore_ascii_case(&field.name)));
            let (Some(ordinal), Some(prop)) = (ordinal, desc.properties.get(index)) else {
                continue;
            };
            slots.push(Slot {
                ordinal,
                property: index,
                column: field.name.clone(),
                handler: lookup.handler(desc.type_id, prop.name, (prop.type_id)()),
            });
        }

        trace!(
            entity = desc.name,
            columns = columns.len(),
            bound = slots.len(),
            "projection compiled"
        );
        Ok(Self {
            entity: desc.name,
            type_id: desc.type_id,
            columns: columns.to_vec(),
            slots,
        })
    }

    /// Number of bound properties.
    pub fn bound(&self) -> usize {
        self.slots.len()
    }

    /// Whether this projection was compiled for `T` and `columns`.
    pub fn fits<T: Entity>(&self, columns: &[String]) -> bool {
        self.type_id == TypeId::of::<T>() && self.columns == columns
    }

    /// Build one entity from the cursor's current row.
    pub fn apply<T: Entity + Default>(&self, cursor: &impl Cursor, row: usize) -> Result<T> {
        let desc = T::descriptor();
        let mut entity = T::default();
        for slot in &self.slots {
            let context = || {
                let property = desc
                    .properties
                    .get(slot.property)
                    .map_or("?", |p| p.name);
                format!("{}.{property}, column '{}', row {row}", self.entity, slot.column)
            };
            let mut value = cursor.value(slot.ordinal)?;
            if let Some(handler) = &slot.handler {
                value = handler.get(value).map_err(|e| e.with_context(context()))?;
            }
            entity
                .assign(slot.property, value)
                .map_err(|e| e.with_context(context()))?;
        }
        Ok(entity)
    }
}

/// Process-wide projection cache keyed by entity type and column shape.
///
/// Population is insert-if-absent; two threads compiling the same shape
/// concurrently both succeed and one result is kept.
#[derive(Debug, Default)]
pub struct ProjectionCache {
    entries: DashMap<(TypeId, Vec<String>), Arc<Projection>>,
}

impl ProjectionCache {
    /// Empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached projection for `T` and `columns`, compiling it on first use.
    pub fn get_or_compile<T: Entity>(
        &self,
        columns: &[String],
        lookup: &dyn MappingLookup,
    ) -> Result<Arc<Projection>> {
        let key = (TypeId::of::<T>(), columns.to_vec());
        if let Some(hit) = self.entries.get(&key) {
            trace!(entity = T::descriptor().name, "projection reused");
            return Ok(Arc::clone(hit.value()));
        }
        let compiled = Arc::new(Projection::compile::<T>(columns, lookup)?);
        Ok(Arc::clone(self.entries.entry(key).or_insert(compiled).value()))
    }

    /// Number of cached projections.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every cached projection.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ROW ITERATORS
// ═══════════════════════════════════════════════════════════════════════════

/// Lazy sequence of entities read from a cursor.
///
/// Single pass: the cursor is advanced once per `next()` call. Iteration
/// stops after the first error.
pub struct Rows<'l, C, T> {
    cursor: C,
    lookup: &'l dyn MappingLookup,
    cache: Option<&'l ProjectionCache>,
    projection: Option<Arc<Projection>>,
    row: usize,
    done: bool,
    _entity: PhantomData<fn() -> T>,
}

impl<'l, C: Cursor, T: Entity + Default> Rows<'l, C, T> {
    /// Share compiled projections through `cache`.
    #[must_use]
    pub fn cached(mut self, cache: &'l ProjectionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    fn projection(&mut self) -> Result<Arc<Projection>> {
        if let Some(projection) = &self.projection {
            return Ok(Arc::clone(projection));
        }
        let columns = self.cursor.names();
        let projection = match self.cache {
            Some(cache) => cache.get_or_compile::<T>(&columns, self.lookup)?,
            None => Arc::new(Projection::compile::<T>(&columns, self.lookup)?),
        };
        self.projection = Some(Arc::clone(&projection));
        Ok(projection)
    }

    fn read(&mut self) -> Option<Result<T>> {
        match self.cursor.advance() {
            Ok(true) => {},
            Ok(false) => return None,
            Err(e) => return Some(Err(e)),
        }
        let projection = match self.projection() {
            Ok(projection) => projection,
            Err(e) => return Some(Err(e)),
        };
        let entity = projection.apply::<T>(&self.cursor, self.row);
        self.row += 1;
        Some(entity)
    }
}

impl<C: Cursor, T: Entity + Default> Iterator for Rows<'_, C, T> {
    type Item = Result<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Read typed entities from `cursor`.
pub fn materialize<'l, T, C>(cursor: C, lookup: &'l dyn MappingLookup) -> Rows<'l, C, T>
where
    T: Entity + Default,
    C: Cursor,
{
    Rows {
        cursor,
        lookup,
        cache: None,
        projection: None,
        row: 0,
        done: false,
        _entity: PhantomData,
    }
}

/// Lazy sequence of dynamic rows. Every column is copied verbatim by name.
pub struct BagRows<C> {
    cursor: C,
    columns: Option<Vec<String>>,
    done: bool,
}

impl<C: Cursor> BagRows<C> {
    fn read(&mut self) -> Option<Result<FieldBag>> {
        match self.cursor.advance() {
            Ok(true) => {},
            Ok(false) => return None,
            Err(e) => return Some(Err(e)),
        }
        let cursor = &self.cursor;
        let columns = self.columns.get_or_insert_with(|| cursor.names());
        let mut bag = FieldBag::with_capacity(columns.len());
        for (ordinal, name) in columns.iter().enumerate() {
            match self.cursor.value(ordinal) {
                Ok(value) => {
                    bag.insert(name.clone(), value);
                },
                Err(e) => return Some(Err(e)),
            }
        }
        Some(Ok(bag))
    }
}

impl<C: Cursor> Iterator for BagRows<C> {
    type Item = Result<FieldBag>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let item = self.read();
        if !matches!(item, Some(Ok(_))) {
            self.done = true;
        }
        item
    }
}

/// Read dynamic rows from `cursor`.
pub fn materialize_bags<C: Cursor>(cursor: C) -> BagRows<C> {
    BagRows {
        cursor,
        columns: None,
        done: false,
    }
}

/// First column of the first row, or `None` when there are no rows.
///
/// Used for count, aggregate, exists and identity results. A null cell
/// reads as `Option::None` when `T` is an `Option`.
pub fn scalar<T: FromValue>(mut cursor: impl Cursor) -> Result<Option<T>> {
    if !cursor.advance()? {
        return Ok(None);
    }
    if cursor.field_count() == 0 {
        return Err(Error::empty("Scalar result columns"));
    }
    let column = cursor.name(0).unwrap_or_default().to_string();
    T::from_value(cursor.value(0)?)
        .map(Some)
        .map_err(|e| e.with_context(format!("scalar column '{column}'")))
}

/// Convenience for `materialize(..).collect()`.
pub fn collect<T, C>(cursor: C, lookup: &dyn MappingLookup) -> Result<Vec<T>>
where
    T: Entity + Default,
    C: Cursor,
{
    materialize(cursor, lookup).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cursor::MemoryCursor;
    use crate::mapping::{MappingRegistry, NoMapping};
    use crate::value::Value;

    #[derive(crate::Entity, Default, Debug, PartialEq)]
    pub struct Person {
        pub id: i32,
        pub name: String,
        pub extra: bool,
    }

    #[derive(crate::Entity, Default, Debug, PartialEq)]
    pub struct Renamed {
        pub id: i64,
        #[column(name = "FullName")]
        pub name: Option<String>,
    }

    #[derive(Debug)]
    struct Upper;

    impl PropertyHandler for Upper {
        fn get(&self, value: Value) -> Result<Value> {
            Ok(match value {
                Value::String(s) => Value::String(s.to_uppercase()),
                other => other,
            })
        }

        fn set(&self, value: Value) -> Result<Value> {
            Ok(value)
        }
    }

    fn people() -> MemoryCursor {
        MemoryCursor::new(
            ["Id", "Name"],
            vec![
                vec![Value::Int(1), Value::from("Ada")],
                vec![Value::Int(2), Value::from("Grace")],
            ],
        )
    }

    #[test]
    fn test_unmatched_property_keeps_default() {
        let people: Vec<Person> = collect(people(), &NoMapping).unwrap();
        assert_eq!(
            people,
            [
                Person { id: 1, name: "Ada".into(), extra: false },
                Person { id: 2, name: "Grace".into(), extra: false },
            ]
        );
    }

    #[test]
    fn test_column_overrides_and_nulls() {
        let cursor = MemoryCursor::new(
            ["fullname", "id", "Ignored"],
            vec![vec![Value::Null, Value::Int(7), Value::from("x")]],
        );
        let rows: Vec<Renamed> = collect(cursor, &NoMapping).unwrap();
        assert_eq!(rows, [Renamed { id: 7, name: None }]);
    }

    #[test]
    fn test_conversion_error_names_property_and_row() {
        let cursor = MemoryCursor::new(
            ["Id", "Name"],
            vec![
                vec![Value::Int(1), Value::from("ok")],
                vec![Value::from("nope"), Value::from("bad")],
            ],
        );
        let mut rows = materialize::<Person, _>(cursor, &NoMapping);
        assert!(rows.next().unwrap().is_ok());
        let err = rows.next().unwrap().unwrap_err();
        assert!(matches!(err, Error::Conversion { .. }));
        let message = err.to_string();
        assert!(message.contains("Person.id"), "{message}");
        assert!(message.contains("row 1"), "{message}");
        assert!(rows.next().is_none());
    }

    #[test]
    fn test_property_handler_applies_on_read() {
        let registry = MappingRegistry::new();
        registry.entity::<Person>().handler("name", Upper).unwrap();
        let people: Vec<Person> = collect(people(), &registry).unwrap();
        assert_eq!(people[1].name, "GRACE");
    }

    #[test]
    fn test_cache_reuses_projection_per_shape() {
        let cache = ProjectionCache::new();
        for _ in 0..3 {
            let rows: Vec<Person> = materialize(people(), &NoMapping)
                .cached(&cache)
                .collect::<Result<_>>()
                .unwrap();
            assert_eq!(rows.len(), 2);
        }
        assert_eq!(cache.len(), 1);

        let other = MemoryCursor::new(["Id"], vec![vec![Value::Int(1)]]);
        let rows: Vec<Person> = materialize(other, &NoMapping)
            .cached(&cache)
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(rows[0].id, 1);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_bags_copy_every_column() {
        let bags: Vec<FieldBag> = materialize_bags(people()).collect::<Result<_>>().unwrap();
        assert_eq!(bags.len(), 2);
        assert_eq!(bags[0].get("Name"), Some(&Value::from("Ada")));
        assert_eq!(bags[1].keys().collect::<Vec<_>>(), ["Id", "Name"]);
    }

    #[test]
    fn test_scalar() {
        let count = MemoryCursor::new(["CountValue"], vec![vec![Value::Int(42)]]);
        assert_eq!(scalar::<i64>(count).unwrap(), Some(42));

        let empty = MemoryCursor::new(["ExistsValue"], vec![]);
        assert_eq!(scalar::<i32>(empty).unwrap(), None);

        let null = MemoryCursor::new(["Result"], vec![vec![Value::Null]]);
        assert_eq!(scalar::<Option<i64>>(null).unwrap(), Some(None));
    }

    #[test]
    fn test_projection_fits_shape() {
        let columns = vec!["Id".to_string(), "Name".to_string()];
        let projection = Projection::compile::<Person>(&columns, &NoMapping).unwrap();
        assert_eq!(projection.bound(), 2);
        assert!(projection.fits::<Person>(&columns));
        assert!(!projection.fits::<Renamed>(&columns));
    }
}
