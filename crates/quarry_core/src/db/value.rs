//! Row and parameter value helpers.

use super::{DbError, DbResult};
use rusqlite::types::{FromSql, Value, ValueRef};

/// One materialized result row: ordered column names with their values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Record {
    pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
        debug_assert_eq!(columns.len(), values.len());
        Self { columns, values }
    }

    /// Builds a record from `(column, value)` pairs, keeping their order.
    pub fn from_pairs<I, K>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, Value)>,
        K: Into<String>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(column, value)| (column.into(), value))
            .unzip();
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Raw value lookup by column name.
    pub fn value(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .position(|name| name == column)
            .and_then(|index| self.values.get(index))
    }

    /// Raw value lookup by zero-based column index.
    pub fn value_at(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Typed lookup by column name.
    ///
    /// # Errors
    /// - `DbError::MissingColumn` when the row has no such column.
    /// - `DbError::Decode` when the stored value does not convert to `T`.
    pub fn get<T: FromSql>(&self, column: &str) -> DbResult<T> {
        let value = self.value(column).ok_or_else(|| DbError::MissingColumn {
            column: column.to_string(),
        })?;
        decode_value(column, value)
    }

    pub fn into_pairs(self) -> impl Iterator<Item = (String, Value)> {
        self.columns.into_iter().zip(self.values)
    }
}

/// Converts one stored value into a Rust type, naming the column on failure.
pub fn decode_value<T: FromSql>(column: &str, value: &Value) -> DbResult<T> {
    T::column_result(ValueRef::from(value)).map_err(|err| DbError::Decode {
        column: column.to_string(),
        message: err.to_string(),
    })
}

/// Conversion into a bindable SQL value.
///
/// Covers the scalar types entities and builders bind in practice, including
/// borrowed strings which `rusqlite::types::Value` has no `From` impl for.
pub trait IntoValue {
    fn into_value(self) -> Value;
}

impl IntoValue for Value {
    fn into_value(self) -> Value {
        self
    }
}

impl IntoValue for &Value {
    fn into_value(self) -> Value {
        self.clone()
    }
}

impl IntoValue for &str {
    fn into_value(self) -> Value {
        Value::Text(self.to_string())
    }
}

impl IntoValue for String {
    fn into_value(self) -> Value {
        Value::Text(self)
    }
}

impl IntoValue for &String {
    fn into_value(self) -> Value {
        Value::Text(self.clone())
    }
}

impl IntoValue for bool {
    fn into_value(self) -> Value {
        Value::Integer(i64::from(self))
    }
}

impl IntoValue for f64 {
    fn into_value(self) -> Value {
        Value::Real(self)
    }
}

impl IntoValue for Vec<u8> {
    fn into_value(self) -> Value {
        Value::Blob(self)
    }
}

macro_rules! integer_into_value {
    ($($ty:ty),*) => {
        $(
            impl IntoValue for $ty {
                fn into_value(self) -> Value {
                    Value::Integer(i64::from(self))
                }
            }
        )*
    };
}

integer_into_value!(i8, i16, i32, i64, u8, u16, u32);

impl<T: IntoValue> IntoValue for Option<T> {
    fn into_value(self) -> Value {
        match self {
            Some(value) => value.into_value(),
            None => Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{IntoValue, Record};
    use crate::db::DbError;
    use rusqlite::types::Value;

    fn sample() -> Record {
        Record::from_pairs([
            ("id", Value::Integer(7)),
            ("name", Value::Text("ada".to_string())),
            ("email", Value::Null),
        ])
    }

    #[test]
    fn typed_lookup_decodes_values() {
        let record = sample();
        assert_eq!(record.get::<i64>("id").unwrap(), 7);
        assert_eq!(record.get::<String>("name").unwrap(), "ada");
        assert_eq!(record.get::<Option<String>>("email").unwrap(), None);
    }

    #[test]
    fn missing_column_is_reported_by_name() {
        let err = sample().get::<i64>("age").unwrap_err();
        assert!(matches!(err, DbError::MissingColumn { column } if column == "age"));
    }

    #[test]
    fn type_mismatch_is_a_decode_error() {
        let err = sample().get::<i64>("name").unwrap_err();
        assert!(matches!(err, DbError::Decode { column, .. } if column == "name"));
    }

    #[test]
    fn option_and_bool_convert_to_sql_values() {
        assert_eq!(None::<i64>.into_value(), Value::Null);
        assert_eq!(Some("x").into_value(), Value::Text("x".to_string()));
        assert_eq!(true.into_value(), Value::Integer(1));
    }
}
