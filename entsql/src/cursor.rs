//! Forward-only tabular cursor consumed by the materializer.

use crate::error::{Error, Result};
use crate::value::{ClientType, FromValue, Value};

/// Sequential, forward-only access to a result set.
///
/// `advance` may block on the underlying driver; the materializer calls it
/// once per row and never buffers ahead.
pub trait Cursor {
    /// Number of columns.
    fn field_count(&self) -> usize;

    /// Column name at `ordinal`.
    fn name(&self, ordinal: usize) -> Option<&str>;

    /// Column type reported by the driver, if any.
    fn column_type(&self, _ordinal: usize) -> Option<ClientType> {
        None
    }

    /// Move to the next row. `Ok(false)` once exhausted.
    fn advance(&mut self) -> Result<bool>;

    /// Cell of the current row. `Value::Null` is the null sentinel.
    fn value(&self, ordinal: usize) -> Result<Value>;

    /// Whether the cell of the current row is null.
    fn is_null(&self, ordinal: usize) -> Result<bool> {
        Ok(self.value(ordinal)?.is_null())
    }

    /// Typed getter.
    fn get<T: FromValue>(&self, ordinal: usize) -> Result<T>
    where
        Self: Sized,
    {
        T::from_value(self.value(ordinal)?)
    }

    /// Every column name, in ordinal order.
    fn names(&self) -> Vec<String> {
        (0..self.field_count())
            .map(|i| self.name(i).unwrap_or_default().to_string())
            .collect()
    }
}

impl<C: Cursor + ?Sized> Cursor for &mut C {
    fn field_count(&self) -> usize {
        (**self).field_count()
    }

    fn name(&self, ordinal: usize) -> Option<&str> {
        (**self).name(ordinal)
    }

    fn column_type(&self, ordinal: usize) -> Option<ClientType> {
        (**self).column_type(ordinal)
    }

    fn advance(&mut self) -> Result<bool> {
        (**self).advance()
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        (**self).value(ordinal)
    }
}

/// Cursor over rows that are already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryCursor {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
    position: Option<usize>,
}

impl MemoryCursor {
    /// Cursor positioned before the first row.
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows,
            position: None,
        }
    }

    /// Number of rows, read or not.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// True when there are no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    fn current(&self) -> Result<&[Value]> {
        self.position
            .and_then(|p| self.rows.get(p))
            .map(Vec::as_slice)
            .ok_or_else(|| Error::invalid_argument("cursor", "not positioned on a row"))
    }
}

impl Cursor for MemoryCursor {
    fn field_count(&self) -> usize {
        self.columns.len()
    }

    fn name(&self, ordinal: usize) -> Option<&str> {
        self.columns.get(ordinal).map(String::as_str)
    }

    fn advance(&mut self) -> Result<bool> {
        let next = self.position.map_or(0, |p| p + 1);
        self.position = Some(next.min(self.rows.len()));
        Ok(next < self.rows.len())
    }

    fn value(&self, ordinal: usize) -> Result<Value> {
        let row = self.current()?;
        row.get(ordinal).cloned().ok_or_else(|| {
            Error::invalid_argument(
                "ordinal",
                format!("{ordinal} is out of range for {} columns", row.len()),
            )
        })
    }
}
