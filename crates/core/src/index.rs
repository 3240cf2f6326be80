use crate::error::RetrievalError;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub ordinal: usize,
    pub distance: f32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorIndex {
    dimension: Option<usize>,
    data: Vec<f32>,
}

impl VectorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }

    pub fn len(&self) -> usize {
        match self.dimension {
            Some(dimension) if dimension > 0 => self.data.len() / dimension,
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn vector(&self, ordinal: usize) -> Option<&[f32]> {
        let dimension = self.dimension?;
        let start = ordinal.checked_mul(dimension)?;
        self.data.get(start..start + dimension)
    }

    pub fn validate(&self, vectors: &[Vec<f32>]) -> Result<(), RetrievalError> {
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        let expected = self.dimension.unwrap_or(first.len());
        if expected == 0 {
            return Err(RetrievalError::InvalidArgument(
                "vectors must have at least one component".to_string(),
            ));
        }
        for vector in vectors {
            if vector.len() != expected {
                return Err(RetrievalError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }

    pub(crate) fn add(&mut self, vectors: &[Vec<f32>]) -> Result<(), RetrievalError> {
        self.validate(vectors)?;
        let Some(first) = vectors.first() else {
            return Ok(());
        };
        self.dimension.get_or_insert(first.len());
        self.data.reserve(vectors.len() * first.len());
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(())
    }

    /// Returns the `k` closest vectors, nearest first. Equal distances are
    /// ordered by ordinal. `k` larger than the index is clamped.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>, RetrievalError> {
        let dimension = match self.dimension {
            Some(dimension) if !self.data.is_empty() => dimension,
            _ => return Err(RetrievalError::IndexEmpty),
        };
        if k == 0 {
            return Err(RetrievalError::InvalidArgument(
                "k must be at least 1".to_string(),
            ));
        }
        if query.len() != dimension {
            return Err(RetrievalError::DimensionMismatch {
                expected: dimension,
                actual: query.len(),
            });
        }

        let mut neighbors: Vec<Neighbor> = self
            .data
            .chunks_exact(dimension)
            .enumerate()
            .map(|(ordinal, row)| Neighbor {
                ordinal,
                distance: squared_euclidean(row, query),
            })
            .collect();

        neighbors.sort_by(compare_neighbors);
        neighbors.truncate(k);
        Ok(neighbors)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, RetrievalError> {
        Ok(bincode::serialize(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RetrievalError> {
        let index: Self = bincode::deserialize(bytes)?;
        match index.dimension {
            Some(0) => Err(RetrievalError::IncompatibleSnapshot(
                "index has zero dimension".to_string(),
            )),
            Some(dimension) if index.data.len() % dimension != 0 => {
                Err(RetrievalError::IncompatibleSnapshot(format!(
                    "index buffer of {} values is not a multiple of dimension {dimension}",
                    index.data.len()
                )))
            }
            None if !index.data.is_empty() => Err(RetrievalError::IncompatibleSnapshot(
                "index has data but no dimension".to_string(),
            )),
            _ => Ok(index),
        }
    }
}

pub fn squared_euclidean(left: &[f32], right: &[f32]) -> f32 {
    left.iter()
        .zip(right)
        .map(|(a, b)| {
            let delta = a - b;
            delta * delta
        })
        .sum()
}

fn compare_neighbors(left: &Neighbor, right: &Neighbor) -> Ordering {
    left.distance
        .total_cmp(&right.distance)
        .then(left.ordinal.cmp(&right.ordinal))
}
