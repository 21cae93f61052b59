//! Exact nearest-neighbour search over a flat, append-only vector array.
//!
//! Vectors live in one contiguous row-major `Vec<f32>`. Search scans every row
//! and ranks by squared Euclidean distance; the metric is fixed.

use crate::error::IndexError;
use std::cmp::Ordering;

/// A search hit: the vector's insertion position and its squared L2 distance to the query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// Append-only flat index.
///
/// The dimension is fixed by the first non-empty `add` and never changes afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl FlatIndex {
    /// Create an empty index whose dimension is set by the first `add`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty index that only accepts `dimension`-d vectors.
    pub fn with_dimension(dimension: usize) -> Result<Self, IndexError> {
        if dimension == 0 {
            return Err(IndexError::ZeroDimension);
        }
        Ok(Self {
            dimension: Some(dimension),
            data: Vec::new(),
        })
    }

    /// Rebuild an index from row-major data, as read back from disk.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self, IndexError> {
        if dimension == 0 {
            return if data.is_empty() {
                Ok(Self::new())
            } else {
                Err(IndexError::ZeroDimension)
            };
        }
        if data.len() % dimension != 0 {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: data.len() % dimension,
            });
        }
        Ok(Self {
            dimension: Some(dimension),
            data,
        })
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        match self.dimension {
            Some(d) => self.data.len() / d,
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The established dimension, if any vector (or an explicit dimension) has fixed it.
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    /// Row-major view of every stored component.
    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }

    /// The vector stored at `position`.
    pub fn vector(&self, position: usize) -> Result<&[f32], IndexError> {
        let len = self.len();
        match self.dimension {
            Some(d) if position < len => Ok(&self.data[position * d..(position + 1) * d]),
            _ => Err(IndexError::OutOfRange { position, len }),
        }
    }

    /// Check that every vector in `vectors` could be added, without adding any.
    pub fn check_batch(&self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let expected = self.dimension.unwrap_or(first.len());
        if expected == 0 {
            return Err(IndexError::ZeroDimension);
        }
        for vector in vectors {
            if vector.len() != expected {
                return Err(IndexError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }

    /// Append `vectors`. The whole batch is rejected if any vector has the wrong dimension.
    pub fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), IndexError> {
        self.check_batch(vectors)?;
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let dimension = *self.dimension.get_or_insert(first.len());

        self.data.reserve(vectors.len() * dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Return up to `k` nearest vectors, closest first.
    ///
    /// Equal distances are ordered by insertion position, earliest first. An empty
    /// index returns no neighbours rather than an error.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, IndexError> {
        let Some(dimension) = self.dimension else {
            return Ok(Vec::new());
        };
        if self.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != dimension {
            return Err(IndexError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(position, row)| Neighbor {
                position,
                distance: squared_l2(row, query),
            })
            .collect();

        let k = k.min(neighbors.len());
        if k < neighbors.len() {
            neighbors.select_nth_unstable_by(k - 1, compare_neighbors);
            neighbors.truncate(k);
        }
        neighbors.sort_unstable_by(compare_neighbors);
        Ok(neighbors)
    }

    /// Build a new index holding only the vectors at `positions`, in the given order.
    ///
    /// Position `i` of the returned index corresponds to `positions[i]` here.
    pub fn subset(&self, positions: &[usize]) -> Result<FlatIndex, IndexError> {
        let mut subset = match self.dimension {
            Some(d) => FlatIndex::with_dimension(d)?,
            None => FlatIndex::new(),
        };
        for &position in positions {
            let row = self.vector(position)?;
            subset.data.extend_from_slice(row);
        }
        Ok(subset)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let diff = x - y;
            diff * diff
        })
        .sum()
}

// Total order: distance ascending (NaN last), then insertion position.
fn compare_neighbors(a: &Neighbor, b: &Neighbor) -> Ordering {
    a.distance
        .total_cmp(&b.distance)
        .then(a.position.cmp(&b.position))
}
