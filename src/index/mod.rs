
use tracing::warn;

use crate::{RagError, Result};

/// File identifier for the persisted vector blob.
const INDEX_MAGIC: [u8; 4] = *b"MRIX";
const INDEX_FORMAT_VERSION: u16 = 1;
const HEADER_LEN: usize = 4 + 2 + 4 + 4;

/// Dense in-memory vector table searched by brute-force scan.
///
/// Vectors are stored row-major in insertion order; the ordinal returned by
/// [`FlatIndex::search`] is the position the vector was added at, which is the
/// join key into the document list persisted alongside the index.
#[derive(Debug, Clone, PartialEq)]
pub struct FlatIndex {
    dimension: usize,
    vectors: Vec<f32>,
}

impl FlatIndex {
    /// Build an index from one batch of embedding vectors.
    ///
    /// Fails on an empty batch and on non-uniform dimensions; the index is
    /// never mutated after construction, rebuilds replace it wholesale.
    #[inline]
    pub fn from_vectors(vectors: Vec<Vec<f32>>) -> Result<Self> {
        let Some(first) = vectors.first() else {
            return Err(RagError::EmptyDocumentSet);
        };

        let dimension = first.len();
        if dimension == 0 {
            return Err(RagError::Index(
                "Embedding vectors must have a non-zero dimension".to_string(),
            ));
        }
        if dimension > u32::MAX as usize || vectors.len() > u32::MAX as usize {
            return Err(RagError::Index(format!(
                "Index too large to persist: {} vectors of dimension {}",
                vectors.len(),
                dimension
            )));
        }

        let mut flat = Vec::with_capacity(dimension * vectors.len());
        for (ordinal, vector) in vectors.iter().enumerate() {
            if vector.len() != dimension {
                return Err(RagError::Index(format!(
                    "Non-uniform embedding dimensions: vector {} has dimension {}, expected {}",
                    ordinal,
                    vector.len(),
                    dimension
                )));
            }
            flat.extend_from_slice(vector);
        }

        Ok(Self {
            dimension,
            vectors: flat,
        })
    }

    /// Number of stored vectors.
    #[inline]
    pub fn len(&self) -> usize {
        self.vectors.len() / self.dimension
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The stored vector at `ordinal`, if in range.
    #[inline]
    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let start = ordinal.checked_mul(self.dimension)?;
        self.vectors.get(start..start + self.dimension)
    }

    /// k-nearest-neighbor scan by squared Euclidean distance.
    ///
    /// Returns `(ordinal, distance)` pairs sorted ascending by distance,
    /// at most `min(k, len)` of them. A query of the wrong dimension matches
    /// nothing.
    #[inline]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(usize, f32)> {
        if query.len() != self.dimension {
            warn!(
                "Query dimension {} does not match index dimension {}",
                query.len(),
                self.dimension
            );
            return Vec::new();
        }
        if k == 0 {
            return Vec::new();
        }

        let mut results: Vec<(usize, f32)> = self
            .vectors
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(ordinal, vector)| (ordinal, squared_distance(query, vector)))
            .collect();

        results.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));
        results.truncate(k);
        results
    }

    /// Encode to the persisted binary format: a fixed header followed by the
    /// raw little-endian f32 payload. Exact round-trip with [`FlatIndex::decode`].
    #[inline]
    pub fn encode(&self) -> Vec<u8> {
        let count = self.len();
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.vectors.len() * 4);
        bytes.extend_from_slice(&INDEX_MAGIC);
        bytes.extend_from_slice(&INDEX_FORMAT_VERSION.to_le_bytes());
        bytes.extend_from_slice(&(self.dimension as u32).to_le_bytes());
        bytes.extend_from_slice(&(count as u32).to_le_bytes());
        for value in &self.vectors {
            bytes.extend_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Decode a persisted blob, validating the header and payload length.
    #[inline]
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            return Err(RagError::Index(format!(
                "Index blob truncated: {} bytes, header needs {}",
                bytes.len(),
                HEADER_LEN
            )));
        }

        let (magic, rest) = bytes.split_at(4);
        if magic != INDEX_MAGIC {
            return Err(RagError::Index(
                "Index blob has an unrecognized file header".to_string(),
            ));
        }

        let (version_bytes, rest) = rest.split_at(2);
        let version = u16::from_le_bytes([version_bytes[0], version_bytes[1]]);
        if version != INDEX_FORMAT_VERSION {
            return Err(RagError::Index(format!(
                "Unsupported index format version {}, expected {}",
                version, INDEX_FORMAT_VERSION
            )));
        }

        let (dim_bytes, rest) = rest.split_at(4);
        let dimension =
            u32::from_le_bytes([dim_bytes[0], dim_bytes[1], dim_bytes[2], dim_bytes[3]]) as usize;
        let (count_bytes, payload) = rest.split_at(4);
        let count = u32::from_le_bytes([
            count_bytes[0],
            count_bytes[1],
            count_bytes[2],
            count_bytes[3],
        ]) as usize;

        if dimension == 0 {
            return Err(RagError::Index(
                "Index blob declares a zero dimension".to_string(),
            ));
        }
        if count == 0 {
            // Builds refuse empty batches, so an empty blob is corruption.
            return Err(RagError::Index(
                "Index blob contains no vectors".to_string(),
            ));
        }

        let expected_floats = dimension.checked_mul(count).ok_or_else(|| {
            RagError::Index(format!(
                "Index blob declares an implausible size: {} x {}",
                count, dimension
            ))
        })?;
        let expected_bytes = expected_floats.checked_mul(4).ok_or_else(|| {
            RagError::Index(format!(
                "Index blob declares an implausible size: {} x {}",
                count, dimension
            ))
        })?;
        if payload.len() != expected_bytes {
            return Err(RagError::Index(format!(
                "Index blob payload is {} bytes, expected {} for {} vectors of dimension {}",
                payload.len(),
                expected_bytes,
                count,
                dimension
            )));
        }

        let vectors = payload
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect();

        Ok(Self { dimension, vectors })
    }
}

fn squared_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}
