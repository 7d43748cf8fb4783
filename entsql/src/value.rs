//! Parameter and cell values, client types and database types.

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::convert::coerce;
use crate::error::{Error, Result};

/// A SQL parameter or result cell value.
///
/// `Null` doubles as the cursor's DBNull sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Bytes(Vec<u8>),
    Uuid(Uuid),
    Date(NaiveDate),
    Time(NaiveTime),
    DateTime(NaiveDateTime),
    Json(serde_json::Value),
    /// Operand list for `In`/`NotIn`/`Between`. Never bound directly.
    Array(Vec<Value>),
}

impl Value {
    /// Short name of the variant, used in error messages.
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Null => "Null",
            Self::Bool(_) => "Bool",
            Self::Int(_) => "Int",
            Self::Float(_) => "Float",
            Self::String(_) => "String",
            Self::Bytes(_) => "Bytes",
            Self::Uuid(_) => "Uuid",
            Self::Date(_) => "Date",
            Self::Time(_) => "Time",
            Self::DateTime(_) => "DateTime",
            Self::Json(_) => "Json",
            Self::Array(_) => "Array",
        }
    }

    /// Build an operand list for `In`/`NotIn`/`Between`.
    pub fn array<T: Into<Self>>(items: impl IntoIterator<Item = T>) -> Self {
        Self::Array(items.into_iter().map(Into::into).collect())
    }

    /// True for the null sentinel.
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// A bounded, human readable rendering for error messages.
    pub(crate) fn describe(&self) -> String {
        let mut rendered = format!("{self:?}");
        if rendered.len() > 64 {
            let cut = (0..=61)
                .rev()
                .find(|idx| rendered.is_char_boundary(*idx))
                .unwrap_or(0);
            rendered.truncate(cut);
            rendered.push_str("...");
        }
        rendered
    }
}

/// Description of an enum that is stored by member name.
#[derive(Debug, PartialEq, Eq)]
pub struct EnumInfo {
    /// Rust type name of the enum.
    pub name: &'static str,
    /// `(member name, discriminant)` pairs in declaration order.
    pub members: &'static [(&'static str, i64)],
}

impl EnumInfo {
    /// Find a member by exact (case-sensitive) name.
    pub fn by_name(&self, name: &str) -> Option<&'static str> {
        self.members
            .iter()
            .find(|(member, _)| *member == name)
            .map(|(member, _)| *member)
    }

    /// Find a member by discriminant.
    pub fn by_discriminant(&self, value: i64) -> Option<&'static str> {
        self.members
            .iter()
            .find(|(_, discriminant)| *discriminant == value)
            .map(|(member, _)| *member)
    }
}

/// The language-level type a field is expected to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    F32,
    F64,
    String,
    Bytes,
    Uuid,
    Date,
    Time,
    DateTime,
    Json,
    Enum(&'static EnumInfo),
}

impl ClientType {
    /// Integral numeric types.
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::I8 | Self::I16 | Self::I32 | Self::I64 | Self::U8 | Self::U16 | Self::U32
        )
    }

    /// Floating point types.
    pub const fn is_floating(self) -> bool {
        matches!(self, Self::F32 | Self::F64)
    }

    /// Default database type used when none is declared.
    pub const fn db_type(self) -> DbType {
        match self {
            Self::Bool => DbType::Boolean,
            Self::U8 => DbType::Byte,
            Self::I8 | Self::I16 => DbType::Int16,
            Self::I32 | Self::U16 => DbType::Int32,
            Self::I64 | Self::U32 => DbType::Int64,
            Self::F32 => DbType::Single,
            Self::F64 => DbType::Double,
            Self::String | Self::Enum(_) => DbType::String,
            Self::Bytes => DbType::Binary,
            Self::Uuid => DbType::Guid,
            Self::Date => DbType::Date,
            Self::Time => DbType::Time,
            Self::DateTime => DbType::DateTime2,
            Self::Json => DbType::Json,
        }
    }
}

impl fmt::Display for ClientType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Enum(info) => write!(f, "enum {}", info.name),
            other => write!(f, "{other:?}"),
        }
    }
}

/// Target database type of a parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Deserialize, serde::Serialize)]
pub enum DbType {
    Boolean,
    Byte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    AnsiString,
    Binary,
    Guid,
    Date,
    Time,
    DateTime2,
    Json,
}

impl DbType {
    /// Parse a database type name as written in `#[column(db_type = "...")]`.
    pub fn parse(name: &str) -> Option<Self> {
        let ty = match name {
            "Boolean" => Self::Boolean,
            "Byte" => Self::Byte,
            "Int16" => Self::Int16,
            "Int32" => Self::Int32,
            "Int64" => Self::Int64,
            "Single" => Self::Single,
            "Double" => Self::Double,
            "Decimal" => Self::Decimal,
            "String" => Self::String,
            "AnsiString" => Self::AnsiString,
            "Binary" => Self::Binary,
            "Guid" => Self::Guid,
            "Date" => Self::Date,
            "Time" => Self::Time,
            "DateTime2" => Self::DateTime2,
            "Json" => Self::Json,
            _ => return None,
        };
        Some(ty)
    }

    /// Client type a value must be coerced to before binding with this type.
    pub const fn client_type(self) -> ClientType {
        match self {
            Self::Boolean => ClientType::Bool,
            Self::Byte => ClientType::U8,
            Self::Int16 => ClientType::I16,
            Self::Int32 => ClientType::I32,
            Self::Int64 => ClientType::I64,
            Self::Single => ClientType::F32,
            Self::Double | Self::Decimal => ClientType::F64,
            Self::String | Self::AnsiString => ClientType::String,
            Self::Binary => ClientType::Bytes,
            Self::Guid => ClientType::Uuid,
            Self::Date => ClientType::Date,
            Self::Time => ClientType::Time,
            Self::DateTime2 => ClientType::DateTime,
            Self::Json => ClientType::Json,
        }
    }

    /// Database type inferred from a runtime value, if it has one.
    pub const fn of(value: &Value) -> Option<Self> {
        let ty = match value {
            Value::Bool(_) => Self::Boolean,
            Value::Int(_) => Self::Int64,
            Value::Float(_) => Self::Double,
            Value::String(_) => Self::String,
            Value::Bytes(_) => Self::Binary,
            Value::Uuid(_) => Self::Guid,
            Value::Date(_) => Self::Date,
            Value::Time(_) => Self::Time,
            Value::DateTime(_) => Self::DateTime2,
            Value::Json(_) => Self::Json,
            Value::Null | Value::Array(_) => return None,
        };
        Some(ty)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// RUST TYPE <-> VALUE
// ═══════════════════════════════════════════════════════════════════════════

/// Rust types that map onto a column.
pub trait SqlType {
    /// Client type of the column.
    const CLIENT_TYPE: ClientType;
    /// Whether the column accepts NULL.
    const NULLABLE: bool = false;
}

/// Outbound conversion, entity field to parameter value.
pub trait ToValue {
    /// Convert to a [`Value`].
    fn to_value(&self) -> Value;
}

/// Inbound conversion, cell value to entity field.
pub trait FromValue: Sized {
    /// Convert from a [`Value`] already coerced to this type's client type.
    fn from_value(value: Value) -> Result<Self>;
}

macro_rules! int_type {
    ($($ty:ty => $client:ident),* $(,)?) => {
        $(
            impl SqlType for $ty {
                const CLIENT_TYPE: ClientType = ClientType::$client;
            }

            impl ToValue for $ty {
                fn to_value(&self) -> Value {
                    Value::Int(i64::from(*self))
                }
            }

            impl FromValue for $ty {
                fn from_value(value: Value) -> Result<Self> {
                    match coerce(value, ClientType::$client)? {
                        Value::Int(v) => <$ty>::try_from(v)
                            .map_err(|_| Error::conversion(format!("Int({v})"), stringify!($ty))),
                        other => Err(Error::conversion(other.describe(), stringify!($ty))),
                    }
                }
            }

            impl From<$ty> for Value {
                fn from(v: $ty) -> Self {
                    Self::Int(i64::from(v))
                }
            }
        )*
    };
}

int_type! {
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
}

macro_rules! simple_type {
    ($ty:ty, $client:ident, $variant:ident) => {
        impl SqlType for $ty {
            const CLIENT_TYPE: ClientType = ClientType::$client;
        }

        impl ToValue for $ty {
            fn to_value(&self) -> Value {
                Value::$variant(self.clone())
            }
        }

        impl FromValue for $ty {
            fn from_value(value: Value) -> Result<Self> {
                match coerce(value, ClientType::$client)? {
                    Value::$variant(v) => Ok(v),
                    other => Err(Error::conversion(other.describe(), stringify!($ty))),
                }
            }
        }

        impl From<$ty> for Value {
            fn from(v: $ty) -> Self {
                Self::$variant(v)
            }
        }
    };
}

simple_type!(bool, Bool, Bool);
simple_type!(String, String, String);
simple_type!(Vec<u8>, Bytes, Bytes);
simple_type!(Uuid, Uuid, Uuid);
simple_type!(NaiveDate, Date, Date);
simple_type!(NaiveTime, Time, Time);
simple_type!(NaiveDateTime, DateTime, DateTime);
simple_type!(serde_json::Value, Json, Json);

impl SqlType for f64 {
    const CLIENT_TYPE: ClientType = ClientType::F64;
}

impl ToValue for f64 {
    fn to_value(&self) -> Value {
        Value::Float(*self)
    }
}

impl FromValue for f64 {
    fn from_value(value: Value) -> Result<Self> {
        match coerce(value, ClientType::F64)? {
            Value::Float(v) => Ok(v),
            other => Err(Error::conversion(other.describe(), "f64")),
        }
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl SqlType for f32 {
    const CLIENT_TYPE: ClientType = ClientType::F32;
}

impl ToValue for f32 {
    fn to_value(&self) -> Value {
        Value::Float(f64::from(*self))
    }
}

impl FromValue for f32 {
    #[allow(clippy::cast_possible_truncation)] // range checked by coerce
    fn from_value(value: Value) -> Result<Self> {
        match coerce(value, ClientType::F32)? {
            Value::Float(v) => Ok(v as Self),
            other => Err(Error::conversion(other.describe(), "f32")),
        }
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl<T: SqlType> SqlType for Option<T> {
    const CLIENT_TYPE: ClientType = T::CLIENT_TYPE;
    const NULLABLE: bool = true;
}

impl<T: ToValue> ToValue for Option<T> {
    fn to_value(&self) -> Value {
        self.as_ref().map_or(Value::Null, ToValue::to_value)
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self> {
        if value.is_null() {
            Ok(None)
        } else {
            T::from_value(value).map(Some)
        }
    }
}

impl<T: Into<Self>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Self::Null, Into::into)
    }
}

/// Enums stored by member name. Implemented by `#[derive(SqlEnum)]`.
pub trait SqlEnum: Sized + 'static {
    /// Member table of the enum.
    const INFO: &'static EnumInfo;

    /// Member name of this value.
    fn member_name(&self) -> &'static str;

    /// Value for a member name (exact match).
    fn from_member_name(name: &str) -> Option<Self>;
}

/// Helper used by `#[derive(SqlEnum)]` to implement [`FromValue`].
pub fn enum_from_value<T: SqlEnum>(value: Value) -> Result<T> {
    match coerce(value, ClientType::Enum(T::INFO))? {
        Value::String(name) => T::from_member_name(&name)
            .ok_or_else(|| Error::conversion(format!("String({name:?})"), T::INFO.name)),
        other => Err(Error::conversion(other.describe(), T::INFO.name)),
    }
}
