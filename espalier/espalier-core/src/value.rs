//! Nested value representation used at the ingestion boundary.
//!
//! A [`Value`] tree mirrors a [`TypeDecl`](crate::TypeDecl) tree: builders
//! consume values and scatter them into flat arrays, and proxies can
//! snapshot themselves back into values for display and debugging. The
//! engine itself never stores values; they exist only at the edges.

use crate::scalar::Scalar;

/// One nested value. Record fields are positional, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absent instance of a nullable pointer.
    Null,
    Scalar(Scalar),
    List(Vec<Value>),
    Record(Vec<Value>),
    /// A union instance: which variant, and its value.
    Union { tag: usize, value: Box<Value> },
    /// An explicit pointer instance, by target index.
    Ref(i64),
}

impl Value {
    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Value::List(items.into_iter().collect())
    }

    pub fn record(fields: impl IntoIterator<Item = Value>) -> Self {
        Value::Record(fields.into_iter().collect())
    }

    pub fn union(tag: usize, value: Value) -> Self {
        Value::Union {
            tag,
            value: Box::new(value),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Scalar(_) => "scalar",
            Value::List(_) => "list",
            Value::Record(_) => "record",
            Value::Union { .. } => "union",
            Value::Ref(_) => "ref",
        }
    }

    pub fn as_scalar(&self) -> Option<Scalar> {
        match self {
            Value::Scalar(s) => Some(*s),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&[Value]> {
        match self {
            Value::Record(fields) => Some(fields),
            _ => None,
        }
    }
}

impl From<Scalar> for Value {
    fn from(s: Scalar) -> Self {
        Value::Scalar(s)
    }
}

macro_rules! value_from {
    ($($T:ty),* $(,)?) => {
        $(
            impl From<$T> for Value {
                fn from(v: $T) -> Self {
                    Value::Scalar(Scalar::from(v))
                }
            }
        )*
    };
}

value_from!(bool, i8, i16, i32, i64, u8, u16, u32, u64, f32, f64);
