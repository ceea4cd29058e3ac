//! Array handles, the backend capability contract, and the layered store.
//!
//! The core depends on a deliberately narrow backend contract: random
//! access reads plus length/type queries. Range reads for variable-length
//! containers are derived on top of it by [`ArrayStore::read_range`].

mod memory;

pub use memory::{MemoryBackend, PrimitiveArray, PrimitiveBuilder};

use std::fmt;
use std::sync::Arc;

use crate::error::StoreError;
use crate::scalar::{PrimitiveType, Scalar};

/// Name of one flat array. Cheap to clone, compared by content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct ArrayId(Arc<str>);

impl ArrayId {
    pub fn new(name: impl AsRef<str>) -> Self {
        Self(Arc::from(name.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ArrayId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ArrayId {
    fn from(s: String) -> Self {
        Self(Arc::from(s))
    }
}

impl fmt::Display for ArrayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability contract implemented by every array storage system.
///
/// Implementations serve a set of named flat arrays. Reads may block on
/// I/O (page fault, remote fetch); faults propagate verbatim as
/// [`StoreError::Backend`], with no retries at this layer.
pub trait ArrayBackend: Send + Sync {
    /// Number of elements in the array.
    fn len(&self, id: &ArrayId) -> Result<usize, StoreError>;

    /// Element type of the array.
    fn dtype(&self, id: &ArrayId) -> Result<PrimitiveType, StoreError>;

    /// Random-access read of one element.
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownArray`] for absent ids,
    /// [`StoreError::OutOfBounds`] when `index >= len` (never clamped).
    fn read(&self, id: &ArrayId, index: usize) -> Result<Scalar, StoreError>;

    /// Whether the backend serves an array with this id.
    fn contains(&self, id: &ArrayId) -> bool;
}

/// Ordered overlay of backends, newest layer first.
///
/// Derivations never mutate existing layers; they add a fresh in-memory
/// layer holding only the new arrays, so every dataset sharing the older
/// layers stays valid. Cloning shares all layers.
#[derive(Clone)]
pub struct ArrayStore {
    layers: Arc<[Arc<dyn ArrayBackend>]>,
}

impl ArrayStore {
    pub fn new(backend: Arc<dyn ArrayBackend>) -> Self {
        Self {
            layers: Arc::from(vec![backend]),
        }
    }

    /// A new store with `backend` layered over the existing arrays.
    /// Lookups hit the newest layer first.
    pub fn with_overlay(&self, backend: Arc<dyn ArrayBackend>) -> Self {
        let mut layers = Vec::with_capacity(self.layers.len() + 1);
        layers.push(backend);
        layers.extend(self.layers.iter().cloned());
        Self {
            layers: Arc::from(layers),
        }
    }

    /// Number of overlay layers. Used to derive unique names for new arrays.
    pub fn depth(&self) -> usize {
        self.layers.len()
    }

    /// Whether two stores share the same layer stack.
    pub fn ptr_eq(&self, other: &ArrayStore) -> bool {
        Arc::ptr_eq(&self.layers, &other.layers)
    }

    fn layer_for(&self, id: &ArrayId) -> Result<&Arc<dyn ArrayBackend>, StoreError> {
        self.layers
            .iter()
            .find(|layer| layer.contains(id))
            .ok_or_else(|| StoreError::UnknownArray { id: id.clone() })
    }

    pub fn contains(&self, id: &ArrayId) -> bool {
        self.layers.iter().any(|layer| layer.contains(id))
    }

    pub fn len(&self, id: &ArrayId) -> Result<usize, StoreError> {
        self.layer_for(id)?.len(id)
    }

    pub fn dtype(&self, id: &ArrayId) -> Result<PrimitiveType, StoreError> {
        self.layer_for(id)?.dtype(id)
    }

    pub fn read(&self, id: &ArrayId, index: usize) -> Result<Scalar, StoreError> {
        self.layer_for(id)?.read(id, index)
    }

    /// Read one element of an index array (`starts`, `stops`, `offsets`,
    /// `positions`) as a non-negative `usize`.
    pub fn read_index(&self, id: &ArrayId, index: usize) -> Result<usize, StoreError> {
        let raw = self
            .read(id, index)?
            .to_i64_exact()
            .map_err(|e| StoreError::Backend {
                id: id.clone(),
                source: Box::new(e),
            })?;
        usize::try_from(raw).map_err(|_| StoreError::BadIndexValue {
            id: id.clone(),
            index,
            value: raw,
        })
    }

    /// Resolve the `[start, stop)` window of a variable-length container
    /// from its parallel starts/stops arrays.
    ///
    /// # Errors
    ///
    /// [`StoreError::InvalidRange`] when `stop < start`.
    pub fn read_range(
        &self,
        starts: &ArrayId,
        stops: &ArrayId,
        index: usize,
    ) -> Result<(usize, usize), StoreError> {
        let start = self.read_index(starts, index)?;
        let stop = self.read_index(stops, index)?;
        if stop < start {
            return Err(StoreError::InvalidRange {
                starts: starts.clone(),
                stops: stops.clone(),
                index,
                start: start as i64,
                stop: stop as i64,
            });
        }
        Ok((start, stop))
    }
}

impl fmt::Debug for ArrayStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ArrayStore")
            .field("layers", &self.layers.len())
            .finish()
    }
}

impl From<MemoryBackend> for ArrayStore {
    fn from(backend: MemoryBackend) -> Self {
        Self::new(Arc::new(backend))
    }
}
