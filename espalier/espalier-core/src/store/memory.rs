//! In-memory arrays: shared typed buffers, push-builders, and the
//! [`MemoryBackend`].

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{ScalarTypeError, StoreError};
use crate::scalar::{PrimitiveType, Scalar};
use crate::store::{ArrayBackend, ArrayId};

/// One immutable flat array held in memory. Cloning shares the buffer.
#[derive(Debug, Clone)]
pub enum PrimitiveArray {
    Bool(Arc<[bool]>),
    I8(Arc<[i8]>),
    I16(Arc<[i16]>),
    I32(Arc<[i32]>),
    I64(Arc<[i64]>),
    U8(Arc<[u8]>),
    U16(Arc<[u16]>),
    U32(Arc<[u32]>),
    U64(Arc<[u64]>),
    F32(Arc<[f32]>),
    F64(Arc<[f64]>),
}

impl PrimitiveArray {
    pub fn dtype(&self) -> PrimitiveType {
        match self {
            PrimitiveArray::Bool(_) => PrimitiveType::Bool,
            PrimitiveArray::I8(_) => PrimitiveType::I8,
            PrimitiveArray::I16(_) => PrimitiveType::I16,
            PrimitiveArray::I32(_) => PrimitiveType::I32,
            PrimitiveArray::I64(_) => PrimitiveType::I64,
            PrimitiveArray::U8(_) => PrimitiveType::U8,
            PrimitiveArray::U16(_) => PrimitiveType::U16,
            PrimitiveArray::U32(_) => PrimitiveType::U32,
            PrimitiveArray::U64(_) => PrimitiveType::U64,
            PrimitiveArray::F32(_) => PrimitiveType::F32,
            PrimitiveArray::F64(_) => PrimitiveType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimitiveArray::Bool(v) => v.len(),
            PrimitiveArray::I8(v) => v.len(),
            PrimitiveArray::I16(v) => v.len(),
            PrimitiveArray::I32(v) => v.len(),
            PrimitiveArray::I64(v) => v.len(),
            PrimitiveArray::U8(v) => v.len(),
            PrimitiveArray::U16(v) => v.len(),
            PrimitiveArray::U32(v) => v.len(),
            PrimitiveArray::U64(v) => v.len(),
            PrimitiveArray::F32(v) => v.len(),
            PrimitiveArray::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<Scalar> {
        if index >= self.len() {
            return None;
        }
        Some(match self {
            PrimitiveArray::Bool(v) => Scalar::Bool(v[index]),
            PrimitiveArray::I8(v) => Scalar::I8(v[index]),
            PrimitiveArray::I16(v) => Scalar::I16(v[index]),
            PrimitiveArray::I32(v) => Scalar::I32(v[index]),
            PrimitiveArray::I64(v) => Scalar::I64(v[index]),
            PrimitiveArray::U8(v) => Scalar::U8(v[index]),
            PrimitiveArray::U16(v) => Scalar::U16(v[index]),
            PrimitiveArray::U32(v) => Scalar::U32(v[index]),
            PrimitiveArray::U64(v) => Scalar::U64(v[index]),
            PrimitiveArray::F32(v) => Scalar::F32(v[index]),
            PrimitiveArray::F64(v) => Scalar::F64(v[index]),
        })
    }
}

macro_rules! primitive_array_from_vec {
    ($($T:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$T>> for PrimitiveArray {
                fn from(values: Vec<$T>) -> Self {
                    PrimitiveArray::$variant(Arc::from(values))
                }
            }
        )*
    };
}

primitive_array_from_vec!(
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

/// Push-style builder for one typed array.
#[derive(Debug)]
pub enum PrimitiveBuilder {
    Bool(Vec<bool>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl PrimitiveBuilder {
    pub fn new(dtype: PrimitiveType) -> Self {
        match dtype {
            PrimitiveType::Bool => PrimitiveBuilder::Bool(Vec::new()),
            PrimitiveType::I8 => PrimitiveBuilder::I8(Vec::new()),
            PrimitiveType::I16 => PrimitiveBuilder::I16(Vec::new()),
            PrimitiveType::I32 => PrimitiveBuilder::I32(Vec::new()),
            PrimitiveType::I64 => PrimitiveBuilder::I64(Vec::new()),
            PrimitiveType::U8 => PrimitiveBuilder::U8(Vec::new()),
            PrimitiveType::U16 => PrimitiveBuilder::U16(Vec::new()),
            PrimitiveType::U32 => PrimitiveBuilder::U32(Vec::new()),
            PrimitiveType::U64 => PrimitiveBuilder::U64(Vec::new()),
            PrimitiveType::F32 => PrimitiveBuilder::F32(Vec::new()),
            PrimitiveType::F64 => PrimitiveBuilder::F64(Vec::new()),
        }
    }

    pub fn dtype(&self) -> PrimitiveType {
        match self {
            PrimitiveBuilder::Bool(_) => PrimitiveType::Bool,
            PrimitiveBuilder::I8(_) => PrimitiveType::I8,
            PrimitiveBuilder::I16(_) => PrimitiveType::I16,
            PrimitiveBuilder::I32(_) => PrimitiveType::I32,
            PrimitiveBuilder::I64(_) => PrimitiveType::I64,
            PrimitiveBuilder::U8(_) => PrimitiveType::U8,
            PrimitiveBuilder::U16(_) => PrimitiveType::U16,
            PrimitiveBuilder::U32(_) => PrimitiveType::U32,
            PrimitiveBuilder::U64(_) => PrimitiveType::U64,
            PrimitiveBuilder::F32(_) => PrimitiveType::F32,
            PrimitiveBuilder::F64(_) => PrimitiveType::F64,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PrimitiveBuilder::Bool(v) => v.len(),
            PrimitiveBuilder::I8(v) => v.len(),
            PrimitiveBuilder::I16(v) => v.len(),
            PrimitiveBuilder::I32(v) => v.len(),
            PrimitiveBuilder::I64(v) => v.len(),
            PrimitiveBuilder::U8(v) => v.len(),
            PrimitiveBuilder::U16(v) => v.len(),
            PrimitiveBuilder::U32(v) => v.len(),
            PrimitiveBuilder::U64(v) => v.len(),
            PrimitiveBuilder::F32(v) => v.len(),
            PrimitiveBuilder::F64(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Append one scalar. The scalar's variant must match the builder dtype.
    pub fn push(&mut self, value: Scalar) -> Result<(), ScalarTypeError> {
        match (self, value) {
            (PrimitiveBuilder::Bool(v), Scalar::Bool(x)) => v.push(x),
            (PrimitiveBuilder::I8(v), Scalar::I8(x)) => v.push(x),
            (PrimitiveBuilder::I16(v), Scalar::I16(x)) => v.push(x),
            (PrimitiveBuilder::I32(v), Scalar::I32(x)) => v.push(x),
            (PrimitiveBuilder::I64(v), Scalar::I64(x)) => v.push(x),
            (PrimitiveBuilder::U8(v), Scalar::U8(x)) => v.push(x),
            (PrimitiveBuilder::U16(v), Scalar::U16(x)) => v.push(x),
            (PrimitiveBuilder::U32(v), Scalar::U32(x)) => v.push(x),
            (PrimitiveBuilder::U64(v), Scalar::U64(x)) => v.push(x),
            (PrimitiveBuilder::F32(v), Scalar::F32(x)) => v.push(x),
            (PrimitiveBuilder::F64(v), Scalar::F64(x)) => v.push(x),
            (builder, value) => {
                return Err(value.type_mismatch(builder.dtype().type_name()));
            }
        }
        Ok(())
    }

    pub fn finish(self) -> PrimitiveArray {
        match self {
            PrimitiveBuilder::Bool(v) => PrimitiveArray::Bool(Arc::from(v)),
            PrimitiveBuilder::I8(v) => PrimitiveArray::I8(Arc::from(v)),
            PrimitiveBuilder::I16(v) => PrimitiveArray::I16(Arc::from(v)),
            PrimitiveBuilder::I32(v) => PrimitiveArray::I32(Arc::from(v)),
            PrimitiveBuilder::I64(v) => PrimitiveArray::I64(Arc::from(v)),
            PrimitiveBuilder::U8(v) => PrimitiveArray::U8(Arc::from(v)),
            PrimitiveBuilder::U16(v) => PrimitiveArray::U16(Arc::from(v)),
            PrimitiveBuilder::U32(v) => PrimitiveArray::U32(Arc::from(v)),
            PrimitiveBuilder::U64(v) => PrimitiveArray::U64(Arc::from(v)),
            PrimitiveBuilder::F32(v) => PrimitiveArray::F32(Arc::from(v)),
            PrimitiveBuilder::F64(v) => PrimitiveArray::F64(Arc::from(v)),
        }
    }
}

/// Backend serving arrays held in process memory.
///
/// This is both the simplest adapter and the landing place for every array
/// a transform materializes. Needs no internal caching.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    arrays: HashMap<ArrayId, PrimitiveArray>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an array under `id`, replacing any previous one.
    pub fn insert(&mut self, id: impl Into<ArrayId>, array: impl Into<PrimitiveArray>) {
        self.arrays.insert(id.into(), array.into());
    }

    pub fn ids(&self) -> impl Iterator<Item = &ArrayId> {
        self.arrays.keys()
    }

    fn get(&self, id: &ArrayId) -> Result<&PrimitiveArray, StoreError> {
        self.arrays
            .get(id)
            .ok_or_else(|| StoreError::UnknownArray { id: id.clone() })
    }
}

impl ArrayBackend for MemoryBackend {
    fn len(&self, id: &ArrayId) -> Result<usize, StoreError> {
        Ok(self.get(id)?.len())
    }

    fn dtype(&self, id: &ArrayId) -> Result<PrimitiveType, StoreError> {
        Ok(self.get(id)?.dtype())
    }

    fn read(&self, id: &ArrayId, index: usize) -> Result<Scalar, StoreError> {
        let array = self.get(id)?;
        array.get(index).ok_or_else(|| StoreError::OutOfBounds {
            id: id.clone(),
            index,
            len: array.len(),
        })
    }

    fn contains(&self, id: &ArrayId) -> bool {
        self.arrays.contains_key(id)
    }
}
