//! Value coercion between runtime values and client types.
//!
//! Used on the way in (materializer: cell value to property type) and on
//! the way out (binder: property value to declared database type). `Null`
//! always passes through; nullability is enforced by the target type.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::value::{ClientType, Value};

const DATE_FORMAT: &str = "%Y-%m-%d";
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
const TIME_FORMAT: &str = "%H:%M:%S%.f";

/// Coerce `value` so that it can be assigned to a field of type `target`.
///
/// Numeric values widen freely and narrow only when in range; floats narrow
/// to integers only when they have no fractional part. Text parses into
/// numbers, UUIDs, dates and enum members.
pub fn coerce(value: Value, target: ClientType) -> Result<Value> {
    if value.is_null() {
        return Ok(Value::Null);
    }

    match target {
        ClientType::Bool => to_bool(value),
        ClientType::I8 => to_int(value, i64::from(i8::MIN), i64::from(i8::MAX), target),
        ClientType::I16 => to_int(value, i64::from(i16::MIN), i64::from(i16::MAX), target),
        ClientType::I32 => to_int(value, i64::from(i32::MIN), i64::from(i32::MAX), target),
        ClientType::I64 => to_int(value, i64::MIN, i64::MAX, target),
        ClientType::U8 => to_int(value, 0, i64::from(u8::MAX), target),
        ClientType::U16 => to_int(value, 0, i64::from(u16::MAX), target),
        ClientType::U32 => to_int(value, 0, i64::from(u32::MAX), target),
        ClientType::F32 => to_float(value, true),
        ClientType::F64 => to_float(value, false),
        ClientType::String => to_string(value),
        ClientType::Bytes => match value {
            Value::Bytes(b) => Ok(Value::Bytes(b)),
            Value::String(s) => Ok(Value::Bytes(s.into_bytes())),
            other => Err(mismatch(&other, target)),
        },
        ClientType::Uuid => match value {
            Value::Uuid(u) => Ok(Value::Uuid(u)),
            Value::String(s) => Uuid::parse_str(s.trim())
                .map(Value::Uuid)
                .map_err(|_| mismatch(&Value::String(s), target)),
            Value::Bytes(b) => Uuid::from_slice(&b)
                .map(Value::Uuid)
                .map_err(|_| mismatch(&Value::Bytes(b), target)),
            other => Err(mismatch(&other, target)),
        },
        ClientType::Date => match value {
            Value::Date(d) => Ok(Value::Date(d)),
            Value::DateTime(dt) => Ok(Value::Date(dt.date())),
            Value::String(s) => parse_date(&s).ok_or_else(|| mismatch(&Value::String(s), target)),
            other => Err(mismatch(&other, target)),
        },
        ClientType::Time => match value {
            Value::Time(t) => Ok(Value::Time(t)),
            Value::DateTime(dt) => Ok(Value::Time(dt.time())),
            Value::String(s) => NaiveTime::parse_from_str(s.trim(), TIME_FORMAT)
                .map(Value::Time)
                .map_err(|_| mismatch(&Value::String(s), target)),
            other => Err(mismatch(&other, target)),
        },
        ClientType::DateTime => match value {
            Value::DateTime(dt) => Ok(Value::DateTime(dt)),
            Value::Date(d) => Ok(Value::DateTime(d.and_time(NaiveTime::MIN))),
            Value::String(s) => {
                parse_datetime(&s).ok_or_else(|| mismatch(&Value::String(s), target))
            },
            other => Err(mismatch(&other, target)),
        },
        ClientType::Json => match value {
            Value::Json(j) => Ok(Value::Json(j)),
            Value::String(s) => serde_json::from_str(&s)
                .map(Value::Json)
                .map_err(|_| mismatch(&Value::String(s), target)),
            Value::Bytes(b) => serde_json::from_slice(&b)
                .map(Value::Json)
                .map_err(|_| mismatch(&Value::Bytes(b), target)),
            other => Err(mismatch(&other, target)),
        },
        ClientType::Enum(info) => match value {
            // Member names first (case-sensitive), then the underlying integer.
            Value::String(s) => {
                if let Some(member) = info.by_name(&s) {
                    return Ok(Value::String(member.to_string()));
                }
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .and_then(|n| info.by_discriminant(n))
                    .map(|member| Value::String(member.to_string()))
                    .ok_or_else(|| mismatch(&Value::String(s), target))
            },
            Value::Int(n) => info
                .by_discriminant(n)
                .map(|member| Value::String(member.to_string()))
                .ok_or_else(|| mismatch(&Value::Int(n), target)),
            other => Err(mismatch(&other, target)),
        },
    }
}

fn mismatch(value: &Value, target: ClientType) -> Error {
    Error::conversion(value.describe(), target)
}

fn to_bool(value: Value) -> Result<Value> {
    match value {
        Value::Bool(b) => Ok(Value::Bool(b)),
        Value::Int(0) => Ok(Value::Bool(false)),
        Value::Int(1) => Ok(Value::Bool(true)),
        Value::String(ref s) => match s.trim() {
            "true" | "True" | "TRUE" | "1" => Ok(Value::Bool(true)),
            "false" | "False" | "FALSE" | "0" => Ok(Value::Bool(false)),
            _ => Err(mismatch(&value, ClientType::Bool)),
        },
        other => Err(mismatch(&other, ClientType::Bool)),
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)] // bounds are checked first
fn to_int(value: Value, min: i64, max: i64, target: ClientType) -> Result<Value> {
    let n = match value {
        Value::Int(n) => n,
        Value::Bool(b) => i64::from(b),
        Value::Float(f) => {
            // exclusive upper bound: i64::MAX as f64 already rounds up to 2^63
            if f.fract() != 0.0 || !f.is_finite() || f < min as f64 || f >= max as f64 + 1.0 {
                return Err(mismatch(&Value::Float(f), target));
            }
            f as i64
        },
        Value::String(ref s) => match s.trim().parse::<i64>() {
            Ok(n) => n,
            Err(_) => return Err(mismatch(&value, target)),
        },
        other => return Err(mismatch(&other, target)),
    };

    if n < min || n > max {
        return Err(mismatch(&Value::Int(n), target));
    }
    Ok(Value::Int(n))
}

#[allow(clippy::cast_precision_loss)] // i64 to f64 widening is the documented behavior
fn to_float(value: Value, single: bool) -> Result<Value> {
    let target = if single {
        ClientType::F32
    } else {
        ClientType::F64
    };
    let f = match value {
        Value::Float(f) => f,
        Value::Int(n) => n as f64,
        Value::String(ref s) => match s.trim().parse::<f64>() {
            Ok(f) => f,
            Err(_) => return Err(mismatch(&value, target)),
        },
        other => return Err(mismatch(&other, target)),
    };

    if single && f.is_finite() && f.abs() > f64::from(f32::MAX) {
        return Err(mismatch(&Value::Float(f), target));
    }
    Ok(Value::Float(f))
}

fn to_string(value: Value) -> Result<Value> {
    let s = match value {
        Value::String(s) => s,
        Value::Bool(b) => b.to_string(),
        Value::Int(n) => n.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Uuid(u) => u.to_string(),
        Value::Date(d) => d.format(DATE_FORMAT).to_string(),
        Value::Time(t) => t.to_string(),
        Value::DateTime(dt) => dt.to_string(),
        Value::Json(j) => j.to_string(),
        other => return Err(mismatch(&other, ClientType::String)),
    };
    Ok(Value::String(s))
}

fn parse_date(s: &str) -> Option<Value> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, DATE_FORMAT)
        .ok()
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
                .map(|dt| dt.date())
        })
        .map(Value::Date)
}

fn parse_datetime(s: &str) -> Option<Value> {
    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, DATE_FORMAT)
                .ok()
                .map(|d| d.and_time(NaiveTime::MIN))
        })
        .map(Value::DateTime)
}
