//! Exact nearest-neighbor index under squared Euclidean distance.
//!
//! Vectors are stored row-major in one flat buffer and searched by brute
//! force. Knowledge bases are small, so exact search costs little and keeps
//! results deterministic.
//!
//! # On-disk format
//!
//! ```text
//! magic  "SDVI"          4 bytes
//! version u32 LE         4 bytes
//! dims    u32 LE         4 bytes
//! rows    u64 LE         8 bytes
//! data    f32 LE × rows × dims
//! ```

use std::path::{Path, PathBuf};

use crate::error::{RagError, Result};

const MAGIC: &[u8; 4] = b"SDVI";
const FORMAT_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dims: usize,
    rows: usize,
    data: Vec<f32>,
}

impl VectorIndex {
    /// An index with no rows. Every search returns nothing.
    pub fn empty() -> Self {
        Self {
            dims: 0,
            rows: 0,
            data: Vec::new(),
        }
    }

    /// Build an index over `vectors`; row `i` is `vectors[i]`.
    ///
    /// All vectors must have the same non-zero dimension.
    pub fn build(vectors: &[Vec<f32>]) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Ok(Self::empty());
        };
        let dims = first.len();
        if dims == 0 {
            return Err(RagError::Embedding(
                "embedder returned zero-length vectors".to_string(),
            ));
        }

        let mut data = Vec::with_capacity(dims * vectors.len());
        for v in vectors {
            if v.len() != dims {
                return Err(RagError::DimensionMismatch {
                    expected: dims,
                    actual: v.len(),
                });
            }
            data.extend_from_slice(v);
        }

        Ok(Self {
            dims,
            rows: vectors.len(),
            data,
        })
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    fn row(&self, i: usize) -> &[f32] {
        &self.data[i * self.dims..(i + 1) * self.dims]
    }

    /// The `k` rows closest to `query`, as `(row, squared distance)`.
    ///
    /// Results are ascending by distance with ties broken by row index.
    /// Returns `min(k, len())` entries; nothing is padded.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if k == 0 || self.is_empty() {
            return Ok(Vec::new());
        }
        if query.len() != self.dims {
            return Err(RagError::DimensionMismatch {
                expected: self.dims,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(usize, f32)> = (0..self.rows)
            .map(|i| (i, squared_l2(query, self.row(i))))
            .collect();

        let by_distance_then_row =
            |a: &(usize, f32), b: &(usize, f32)| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0));

        if k < scored.len() {
            scored.select_nth_unstable_by(k - 1, by_distance_then_row);
            scored.truncate(k);
        }
        scored.sort_by(by_distance_then_row);
        Ok(scored)
    }

    /// Write the index to `path`, creating parent directories.
    pub fn persist(&self, path: &Path) -> Result<()> {
        let dims = u32::try_from(self.dims).map_err(|_| {
            RagError::Embedding(format!("dimension {} too large to persist", self.dims))
        })?;

        let mut bytes = Vec::with_capacity(HEADER_LEN + self.data.len() * 4);
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&dims.to_le_bytes());
        bytes.extend_from_slice(&(self.rows as u64).to_le_bytes());
        bytes.extend_from_slice(&vec_to_blob(&self.data));

        write_atomic(path, &bytes)
    }

    /// Read an index written by [`persist`](Self::persist).
    ///
    /// Any structural problem is reported as [`RagError::IndexCorruption`].
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path).map_err(|e| RagError::io(path, e))?;
        let corrupt =
            |why: &str| RagError::IndexCorruption(format!("{}: {}", path.display(), why));

        if bytes.len() < HEADER_LEN || &bytes[0..4] != MAGIC {
            return Err(corrupt("not a vector index file"));
        }
        let version = u32::from_le_bytes([bytes[4], bytes[5], bytes[6], bytes[7]]);
        if version != FORMAT_VERSION {
            return Err(corrupt(&format!("unsupported format version {}", version)));
        }
        let dims = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]) as usize;
        let mut rows_bytes = [0u8; 8];
        rows_bytes.copy_from_slice(&bytes[12..20]);
        let rows = usize::try_from(u64::from_le_bytes(rows_bytes))
            .map_err(|_| corrupt("row count overflows usize"))?;

        let expected = rows
            .checked_mul(dims)
            .and_then(|n| n.checked_mul(4))
            .ok_or_else(|| corrupt("header sizes overflow"))?;
        let payload = &bytes[HEADER_LEN..];
        if payload.len() != expected {
            return Err(corrupt(&format!(
                "expected {} bytes of vector data for {} rows × {} dims, found {}",
                expected,
                rows,
                dims,
                payload.len()
            )));
        }
        if rows > 0 && dims == 0 {
            return Err(corrupt("rows present with zero dimension"));
        }

        Ok(Self {
            dims,
            rows,
            data: blob_to_vec(payload),
        })
    }
}

/// Write `bytes` to a sibling temp file, then rename it over `path`.
///
/// Readers see either the previous file or the complete new one. Parent
/// directories are created as needed.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| RagError::io(parent, e))?;
        }
    }

    let tmp = temp_path(path);
    std::fs::write(&tmp, bytes).map_err(|e| RagError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        RagError::io(path, e)
    })
}

/// `<path>.tmp`, the staging file used by [`write_atomic`].
pub(crate) fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

/// Encode floats as little-endian bytes, 4 per value.
pub fn vec_to_blob(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for &v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

/// Reverse of [`vec_to_blob`]. Trailing bytes that do not fill a float are ignored.
pub fn blob_to_vec(blob: &[u8]) -> Vec<f32> {
    blob.chunks_exact(4)
        .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
        .collect()
}
