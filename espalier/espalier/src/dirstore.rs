//! Directory persistence: one manifest plus one raw file per array.
//!
//! Layout: `schema.json` holds the schema tree and the array catalog,
//! and `arrays/<id>.bin` holds each array's elements little-endian
//! with no header. Arrays are written before the manifest, so a crash
//! mid-save leaves a directory without a manifest rather than a
//! manifest naming absent arrays.

use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use memmap2::Mmap;

use espalier_core::{
    ArrayBackend, ArrayId, ArrayStore, PrimitiveType, Scalar, SchemaNode, StoreError,
};

use crate::dataset::Dataset;
use crate::error::DatasetError;

const MANIFEST_FILE: &str = "schema.json";
const ARRAYS_DIR: &str = "arrays";

#[derive(serde::Serialize, serde::Deserialize)]
struct Manifest {
    root: Arc<SchemaNode>,
    arrays: Vec<ManifestEntry>,
}

#[derive(serde::Serialize, serde::Deserialize)]
struct ManifestEntry {
    id: ArrayId,
    dtype: PrimitiveType,
    len: u64,
}

impl Dataset {
    /// Persist into the new directory `dir`.
    ///
    /// Only arrays the schema still references are written, so the
    /// intermediates of a transform chain are not carried along. The
    /// entry window is stored in the root window arrays like any other
    /// data.
    ///
    /// # Errors
    ///
    /// [`DatasetError::AlreadyExists`] when `dir` exists; saving never
    /// overwrites.
    pub fn save(&self, dir: impl AsRef<Path>) -> Result<(), DatasetError> {
        let dir = dir.as_ref();
        if dir.exists() {
            return Err(DatasetError::AlreadyExists {
                path: dir.display().to_string(),
            });
        }
        let arrays_dir = dir.join(ARRAYS_DIR);
        fs::create_dir_all(&arrays_dir)?;

        let mut entries = Vec::new();
        for (id, _) in self.root.arrays() {
            if id.as_str().contains(['/', '\\']) {
                return Err(DatasetError::Corrupt {
                    detail: format!("array id '{id}' cannot name a file"),
                });
            }
            let dtype = self.store.dtype(&id)?;
            let len = self.store.len(&id)?;
            let file = File::create(array_file(&arrays_dir, &id))?;
            let mut out = BufWriter::new(file);
            for index in 0..len {
                write_scalar(&mut out, self.store.read(&id, index)?)?;
            }
            out.flush()?;
            entries.push(ManifestEntry {
                id,
                dtype,
                len: len as u64,
            });
        }

        let manifest = Manifest {
            root: Arc::clone(&self.root),
            arrays: entries,
        };
        let file = File::create(dir.join(MANIFEST_FILE))?;
        let mut out = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut out, &manifest)?;
        out.flush()?;
        Ok(())
    }

    /// Open a directory written by [`save`](Self::save).
    ///
    /// Array files are checked against the manifest sizes up front and
    /// memory-mapped on first read. Index arrays are read eagerly here
    /// so every offset is verified before the dataset is used; data
    /// arrays stay untouched until something accesses them.
    pub fn open(dir: impl AsRef<Path>) -> Result<Dataset, DatasetError> {
        let dir = dir.as_ref();
        let manifest = read_manifest(dir)?;
        let backend = MmapBackend::from_manifest(dir, &manifest)?;

        for (id, expected) in manifest.root.arrays() {
            match backend.metas.get(&id) {
                None => return Err(DatasetError::MissingArray { id }),
                Some(meta) if meta.dtype != expected => {
                    return Err(DatasetError::Store(StoreError::TypeMismatch {
                        id,
                        expected,
                        found: meta.dtype,
                    }));
                }
                Some(_) => {}
            }
        }

        let dataset = Dataset::from_parts(
            Arc::clone(&manifest.root),
            ArrayStore::new(Arc::new(backend)),
        )?;
        dataset.check_offsets()?;
        Ok(dataset)
    }
}

/// Read-only backend serving the array files of a saved dataset
/// through memory maps, created on first touch and shared for the
/// life of the backend.
#[derive(Debug)]
pub struct MmapBackend {
    dir: PathBuf,
    metas: HashMap<ArrayId, ArrayMeta>,
    maps: Mutex<HashMap<ArrayId, Arc<Mmap>>>,
}

#[derive(Debug, Clone, Copy)]
struct ArrayMeta {
    dtype: PrimitiveType,
    len: usize,
}

impl MmapBackend {
    /// Open the array files under a dataset directory, checking every
    /// file's size against the manifest before anything is mapped.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, DatasetError> {
        let dir = dir.as_ref();
        let manifest = read_manifest(dir)?;
        Self::from_manifest(dir, &manifest)
    }

    fn from_manifest(dir: &Path, manifest: &Manifest) -> Result<Self, DatasetError> {
        let arrays_dir = dir.join(ARRAYS_DIR);
        let mut metas = HashMap::with_capacity(manifest.arrays.len());
        for entry in &manifest.arrays {
            let path = array_file(&arrays_dir, &entry.id);
            let metadata = fs::metadata(&path).map_err(|err| {
                if err.kind() == io::ErrorKind::NotFound {
                    DatasetError::MissingArray {
                        id: entry.id.clone(),
                    }
                } else {
                    DatasetError::Io(err)
                }
            })?;
            let expected = entry.len * entry.dtype.byte_width() as u64;
            if metadata.len() != expected {
                return Err(DatasetError::LengthMismatch {
                    id: entry.id.clone(),
                    expected,
                    found: metadata.len(),
                });
            }
            let len = usize::try_from(entry.len).map_err(|_| DatasetError::Corrupt {
                detail: format!("array '{}' is too large for this platform", entry.id),
            })?;
            metas.insert(
                entry.id.clone(),
                ArrayMeta {
                    dtype: entry.dtype,
                    len,
                },
            );
        }
        Ok(Self {
            dir: arrays_dir,
            metas,
            maps: Mutex::new(HashMap::new()),
        })
    }

    fn meta(&self, id: &ArrayId) -> Result<ArrayMeta, StoreError> {
        self.metas
            .get(id)
            .copied()
            .ok_or_else(|| StoreError::UnknownArray { id: id.clone() })
    }

    fn map_for(&self, id: &ArrayId) -> Result<Arc<Mmap>, StoreError> {
        let mut maps = self
            .maps
            .lock()
            .map_err(|_| backend_err(id, io::Error::other("mmap cache lock poisoned")))?;
        if let Some(map) = maps.get(id) {
            return Ok(Arc::clone(map));
        }
        let file = File::open(array_file(&self.dir, id)).map_err(|err| backend_err(id, err))?;
        // The mapping is only sound while no other process truncates
        // the file underneath us.
        let map = unsafe { Mmap::map(&file) }.map_err(|err| backend_err(id, err))?;
        let map = Arc::new(map);
        maps.insert(id.clone(), Arc::clone(&map));
        Ok(map)
    }
}

impl ArrayBackend for MmapBackend {
    fn len(&self, id: &ArrayId) -> Result<usize, StoreError> {
        Ok(self.meta(id)?.len)
    }

    fn dtype(&self, id: &ArrayId) -> Result<PrimitiveType, StoreError> {
        Ok(self.meta(id)?.dtype)
    }

    fn read(&self, id: &ArrayId, index: usize) -> Result<Scalar, StoreError> {
        let meta = self.meta(id)?;
        if index >= meta.len {
            return Err(StoreError::OutOfBounds {
                id: id.clone(),
                index,
                len: meta.len,
            });
        }
        let map = self.map_for(id)?;
        let width = meta.dtype.byte_width();
        let offset = index * width;
        let bytes = map.get(offset..offset + width).ok_or_else(|| {
            backend_err(
                id,
                io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "mapped file shorter than expected",
                ),
            )
        })?;
        Ok(decode_scalar(meta.dtype, bytes))
    }

    fn contains(&self, id: &ArrayId) -> bool {
        self.metas.contains_key(id)
    }
}

fn read_manifest(dir: &Path) -> Result<Manifest, DatasetError> {
    let file = File::open(dir.join(MANIFEST_FILE))?;
    Ok(serde_json::from_reader(BufReader::new(file))?)
}

fn array_file(arrays_dir: &Path, id: &ArrayId) -> PathBuf {
    arrays_dir.join(format!("{id}.bin"))
}

fn backend_err(id: &ArrayId, err: io::Error) -> StoreError {
    StoreError::Backend {
        id: id.clone(),
        source: Box::new(err),
    }
}

fn write_scalar(out: &mut impl Write, value: Scalar) -> io::Result<()> {
    match value {
        Scalar::Bool(v) => out.write_all(&[u8::from(v)]),
        Scalar::I8(v) => out.write_all(&v.to_le_bytes()),
        Scalar::I16(v) => out.write_all(&v.to_le_bytes()),
        Scalar::I32(v) => out.write_all(&v.to_le_bytes()),
        Scalar::I64(v) => out.write_all(&v.to_le_bytes()),
        Scalar::U8(v) => out.write_all(&v.to_le_bytes()),
        Scalar::U16(v) => out.write_all(&v.to_le_bytes()),
        Scalar::U32(v) => out.write_all(&v.to_le_bytes()),
        Scalar::U64(v) => out.write_all(&v.to_le_bytes()),
        Scalar::F32(v) => out.write_all(&v.to_le_bytes()),
        Scalar::F64(v) => out.write_all(&v.to_le_bytes()),
    }
}

/// Decode one element from exactly `byte_width` little-endian bytes.
fn decode_scalar(dtype: PrimitiveType, bytes: &[u8]) -> Scalar {
    macro_rules! decode {
        ($T:ty, $variant:ident) => {{
            let mut buf = [0u8; std::mem::size_of::<$T>()];
            buf.copy_from_slice(bytes);
            Scalar::$variant(<$T>::from_le_bytes(buf))
        }};
    }
    match dtype {
        PrimitiveType::Bool => Scalar::Bool(bytes[0] != 0),
        PrimitiveType::I8 => decode!(i8, I8),
        PrimitiveType::I16 => decode!(i16, I16),
        PrimitiveType::I32 => decode!(i32, I32),
        PrimitiveType::I64 => decode!(i64, I64),
        PrimitiveType::U8 => decode!(u8, U8),
        PrimitiveType::U16 => decode!(u16, U16),
        PrimitiveType::U32 => decode!(u32, U32),
        PrimitiveType::U64 => decode!(u64, U64),
        PrimitiveType::F32 => decode!(f32, F32),
        PrimitiveType::F64 => decode!(f64, F64),
    }
}
