//! Fixed-width primitive types and the scalar values read from array handles.

use std::fmt;

use crate::error::ScalarTypeError;

/// Element type of a flat array handle.
///
/// Array handles hold fixed-width values only; nesting, nullability, and
/// indirection live in the schema layer, not here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PrimitiveType {
    Bool,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl PrimitiveType {
    pub fn type_name(&self) -> &'static str {
        match self {
            PrimitiveType::Bool => "bool",
            PrimitiveType::I8 => "i8",
            PrimitiveType::I16 => "i16",
            PrimitiveType::I32 => "i32",
            PrimitiveType::I64 => "i64",
            PrimitiveType::U8 => "u8",
            PrimitiveType::U16 => "u16",
            PrimitiveType::U32 => "u32",
            PrimitiveType::U64 => "u64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
        }
    }

    /// Width of one element in a serialized flat array, in bytes.
    /// Bools are stored as one byte.
    pub fn byte_width(&self) -> usize {
        match self {
            PrimitiveType::Bool | PrimitiveType::I8 | PrimitiveType::U8 => 1,
            PrimitiveType::I16 | PrimitiveType::U16 => 2,
            PrimitiveType::I32 | PrimitiveType::U32 | PrimitiveType::F32 => 4,
            PrimitiveType::I64 | PrimitiveType::U64 | PrimitiveType::F64 => 8,
        }
    }

    pub fn is_integer(&self) -> bool {
        !matches!(
            self,
            PrimitiveType::Bool | PrimitiveType::F32 | PrimitiveType::F64
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, PrimitiveType::F32 | PrimitiveType::F64)
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name())
    }
}

/// A single value read from (or destined for) a flat array.
/// All types are explicit; no lossy conversions happen implicitly.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Bool(bool),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
}

impl Scalar {
    pub fn dtype(&self) -> PrimitiveType {
        match self {
            Scalar::Bool(_) => PrimitiveType::Bool,
            Scalar::I8(_) => PrimitiveType::I8,
            Scalar::I16(_) => PrimitiveType::I16,
            Scalar::I32(_) => PrimitiveType::I32,
            Scalar::I64(_) => PrimitiveType::I64,
            Scalar::U8(_) => PrimitiveType::U8,
            Scalar::U16(_) => PrimitiveType::U16,
            Scalar::U32(_) => PrimitiveType::U32,
            Scalar::U64(_) => PrimitiveType::U64,
            Scalar::F32(_) => PrimitiveType::F32,
            Scalar::F64(_) => PrimitiveType::F64,
        }
    }

    pub fn try_bool(&self) -> Result<bool, ScalarTypeError> {
        match self {
            Scalar::Bool(v) => Ok(*v),
            _ => Err(self.type_mismatch("Bool")),
        }
    }

    pub fn try_i8(&self) -> Result<i8, ScalarTypeError> {
        match self {
            Scalar::I8(v) => Ok(*v),
            _ => Err(self.type_mismatch("I8")),
        }
    }

    pub fn try_i16(&self) -> Result<i16, ScalarTypeError> {
        match self {
            Scalar::I16(v) => Ok(*v),
            _ => Err(self.type_mismatch("I16")),
        }
    }

    pub fn try_i32(&self) -> Result<i32, ScalarTypeError> {
        match self {
            Scalar::I32(v) => Ok(*v),
            _ => Err(self.type_mismatch("I32")),
        }
    }

    pub fn try_i64(&self) -> Result<i64, ScalarTypeError> {
        match self {
            Scalar::I64(v) => Ok(*v),
            _ => Err(self.type_mismatch("I64")),
        }
    }

    pub fn try_u8(&self) -> Result<u8, ScalarTypeError> {
        match self {
            Scalar::U8(v) => Ok(*v),
            _ => Err(self.type_mismatch("U8")),
        }
    }

    pub fn try_u16(&self) -> Result<u16, ScalarTypeError> {
        match self {
            Scalar::U16(v) => Ok(*v),
            _ => Err(self.type_mismatch("U16")),
        }
    }

    pub fn try_u32(&self) -> Result<u32, ScalarTypeError> {
        match self {
            Scalar::U32(v) => Ok(*v),
            _ => Err(self.type_mismatch("U32")),
        }
    }

    pub fn try_u64(&self) -> Result<u64, ScalarTypeError> {
        match self {
            Scalar::U64(v) => Ok(*v),
            _ => Err(self.type_mismatch("U64")),
        }
    }

    pub fn try_f32(&self) -> Result<f32, ScalarTypeError> {
        match self {
            Scalar::F32(v) => Ok(*v),
            _ => Err(self.type_mismatch("F32")),
        }
    }

    pub fn try_f64(&self) -> Result<f64, ScalarTypeError> {
        match self {
            Scalar::F64(v) => Ok(*v),
            _ => Err(self.type_mismatch("F64")),
        }
    }

    /// Widen any numeric scalar to `f64`. Integer values above 2^53 lose
    /// precision, as usual for float widening. Fails for `Bool`.
    pub fn to_f64_lossy(&self) -> Result<f64, ScalarTypeError> {
        match *self {
            Scalar::I8(v) => Ok(v as f64),
            Scalar::I16(v) => Ok(v as f64),
            Scalar::I32(v) => Ok(v as f64),
            Scalar::I64(v) => Ok(v as f64),
            Scalar::U8(v) => Ok(v as f64),
            Scalar::U16(v) => Ok(v as f64),
            Scalar::U32(v) => Ok(v as f64),
            Scalar::U64(v) => Ok(v as f64),
            Scalar::F32(v) => Ok(v as f64),
            Scalar::F64(v) => Ok(v),
            Scalar::Bool(_) => Err(self.type_mismatch("numeric")),
        }
    }

    /// Convert an integer scalar to `i64` without loss.
    /// Fails for floats, bools, and `U64` values above `i64::MAX`.
    pub fn to_i64_exact(&self) -> Result<i64, ScalarTypeError> {
        match *self {
            Scalar::I8(v) => Ok(v as i64),
            Scalar::I16(v) => Ok(v as i64),
            Scalar::I32(v) => Ok(v as i64),
            Scalar::I64(v) => Ok(v),
            Scalar::U8(v) => Ok(v as i64),
            Scalar::U16(v) => Ok(v as i64),
            Scalar::U32(v) => Ok(v as i64),
            Scalar::U64(v) => i64::try_from(v).map_err(|_| self.type_mismatch("I64")),
            _ => Err(self.type_mismatch("integer")),
        }
    }

    pub fn type_mismatch(&self, expected: impl Into<String>) -> ScalarTypeError {
        ScalarTypeError::new(expected, self.variant_name())
    }

    fn variant_name(&self) -> &'static str {
        match self {
            Scalar::Bool(_) => "Bool",
            Scalar::I8(_) => "I8",
            Scalar::I16(_) => "I16",
            Scalar::I32(_) => "I32",
            Scalar::I64(_) => "I64",
            Scalar::U8(_) => "U8",
            Scalar::U16(_) => "U16",
            Scalar::U32(_) => "U32",
            Scalar::U64(_) => "U64",
            Scalar::F32(_) => "F32",
            Scalar::F64(_) => "F64",
        }
    }
}

macro_rules! scalar_from {
    ($($T:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$T> for Scalar {
                fn from(v: $T) -> Self {
                    Scalar::$variant(v)
                }
            }
        )*
    };
}

scalar_from!(
    bool => Bool,
    i8 => I8,
    i16 => I16,
    i32 => I32,
    i64 => I64,
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f32 => F32,
    f64 => F64,
);
