use crate::schema::SqlType;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use std::fmt;
use std::str::FromStr;

/// A single cell moving between the warehouse and the pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Int(i32),
    BigInt(i64),
    Decimal(Decimal),
    Double(f64),
    Text(String),
}

pub type Row = Vec<Value>;

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Reads a JSON scalar the way the bulk copy does. Nested values are kept
    /// as their JSON text.
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Text(b.to_string()),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => Value::BigInt(v),
                None => Value::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }

    /// Converts the value into the representation stored in a column of type
    /// `sql_type`. Empty strings become null in numeric columns.
    pub fn coerce(self, sql_type: SqlType) -> Result<Value, String> {
        if self.is_null() {
            return Ok(Value::Null);
        }
        if sql_type.is_numeric() {
            if let Value::Text(ref s) = self {
                if s.trim().is_empty() {
                    return Ok(Value::Null);
                }
            }
        }

        match sql_type {
            SqlType::Int => {
                let v = self.to_i64()?;
                i32::try_from(v)
                    .map(Value::Int)
                    .map_err(|_| format!("value {} out of range for int", v))
            }
            SqlType::BigInt => self.to_i64().map(Value::BigInt),
            SqlType::Decimal { precision, scale } => {
                let mut d = self
                    .to_decimal()?
                    .round_dp_with_strategy(scale as u32, RoundingStrategy::MidpointAwayFromZero);
                d.rescale(scale as u32);
                let integer_digits = precision.saturating_sub(scale) as u32;
                let limit = 10_i128
                    .checked_pow(integer_digits)
                    .and_then(|limit| Decimal::try_from_i128_with_scale(limit, 0).ok());
                if limit.is_some_and(|limit| d.abs() >= limit) {
                    return Err(format!(
                        "value {} overflows decimal({},{})",
                        d, precision, scale
                    ));
                }
                Ok(Value::Decimal(d))
            }
            SqlType::Varchar => Ok(match self {
                Value::Text(s) => Value::Text(s),
                other => Value::Text(other.to_string()),
            }),
        }
    }

    fn to_i64(&self) -> Result<i64, String> {
        match self {
            Value::Int(v) => Ok(*v as i64),
            Value::BigInt(v) => Ok(*v),
            Value::Decimal(d) if d.fract().is_zero() => d
                .to_i64()
                .ok_or_else(|| format!("value {} out of range for bigint", d)),
            Value::Double(f) if f.fract() == 0.0 && f.is_finite() => {
                if *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                    Ok(*f as i64)
                } else {
                    Err(format!("value {} out of range for bigint", f))
                }
            }
            Value::Text(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| format!("invalid integer {:?}", s)),
            other => Err(format!("expected an integer, got {}", other)),
        }
    }

    fn to_decimal(&self) -> Result<Decimal, String> {
        match self {
            Value::Int(v) => Ok(Decimal::from(*v)),
            Value::BigInt(v) => Ok(Decimal::from(*v)),
            Value::Decimal(d) => Ok(*d),
            Value::Double(f) => Decimal::from_str(&f.to_string())
                .or_else(|_| Decimal::try_from(*f))
                .map_err(|_| format!("invalid decimal {}", f)),
            Value::Text(s) => Decimal::from_str(s.trim())
                .or_else(|_| Decimal::from_scientific(s.trim()))
                .map_err(|_| format!("invalid decimal {:?}", s)),
            Value::Null => Err("unexpected null".to_string()),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Int(v) => write!(f, "{}", v),
            Value::BigInt(v) => write!(f, "{}", v),
            Value::Decimal(d) => write!(f, "{}", d),
            Value::Double(v) => write!(f, "{}", v),
            Value::Text(s) => f.write_str(s),
        }
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::BigInt(v)
    }
}

impl From<Decimal> for Value {
    fn from(v: Decimal) -> Self {
        Value::Decimal(v)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Decoding of a query result cell into a record field.
pub trait FromValue: Sized {
    fn from_value(value: Value) -> Result<Self, String>;
}

impl FromValue for i32 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value.coerce(SqlType::Int)? {
            Value::Int(v) => Ok(v),
            _ => Err("unexpected null".to_string()),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: Value) -> Result<Self, String> {
        match value.coerce(SqlType::BigInt)? {
            Value::BigInt(v) => Ok(v),
            _ => Err("unexpected null".to_string()),
        }
    }
}

impl FromValue for Decimal {
    fn from_value(value: Value) -> Result<Self, String> {
        value.to_decimal()
    }
}

impl FromValue for String {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Err("unexpected null".to_string()),
            Value::Text(s) => Ok(s),
            other => Ok(other.to_string()),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    fn from_value(value: Value) -> Result<Self, String> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Walks the cells of a result row in column order.
pub struct RowReader {
    cells: std::vec::IntoIter<Value>,
}

impl RowReader {
    pub fn new(row: Row) -> Self {
        Self {
            cells: row.into_iter(),
        }
    }

    pub fn next<T: FromValue>(&mut self, column: &str) -> Result<T, String> {
        let value = self
            .cells
            .next()
            .ok_or_else(|| format!("missing column {}", column))?;
        T::from_value(value).map_err(|e| format!("column {}: {}", column, e))
    }
}
