//! Flat nearest-neighbor index and the chunk store aligned with it

use std::collections::HashSet;
use std::ops::Range;

use ka_core::{Chunk, Error, Result};

/// Exhaustive squared-Euclidean index over fixed-dimension vectors.
///
/// Rows are dense and assigned in append order; row `i` of the index pairs with
/// row `i` of the [`ChunkStore`].
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    /// Rebuild an index from row-major vector data.
    pub fn from_raw(dimension: usize, data: Vec<f32>) -> Result<Self> {
        if dimension == 0 || data.len() % dimension != 0 {
            return Err(Error::InvalidInput(format!(
                "{} values cannot form rows of dimension {}",
                data.len(),
                dimension
            )));
        }
        Ok(Self { dimension, data })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn size(&self) -> usize {
        self.data.len().checked_div(self.dimension).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub(crate) fn raw(&self) -> &[f32] {
        &self.data
    }

    /// Append vectors, returning the row ids they were given.
    ///
    /// Either every vector is appended or, if any has the wrong dimension, none is.
    pub fn append(&mut self, vectors: &[Vec<f32>]) -> Result<Range<usize>> {
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dimension) {
            return Err(Error::InvalidResponse(format!(
                "vector has dimension {}, index expects {}",
                bad.len(),
                self.dimension
            )));
        }

        let first = self.size();
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(vector);
        }
        Ok(first..self.size())
    }

    /// The `k` nearest rows to `query` as `(row_id, squared_distance)`,
    /// ascending by distance with ties broken by row id.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<(usize, f32)>> {
        if query.len() != self.dimension {
            return Err(Error::InvalidResponse(format!(
                "query vector has dimension {}, index expects {}",
                query.len(),
                self.dimension
            )));
        }

        if self.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .data
            .chunks_exact(self.dimension)
            .enumerate()
            .map(|(row, vector)| (row, squared_l2(query, vector)))
            .collect();

        scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        Ok(scored)
    }

    /// Drop every row from `len` on.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dimension);
    }
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

/// Chunk metadata in row order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkStore {
    chunks: Vec<Chunk>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_chunks(chunks: Vec<Chunk>) -> Self {
        Self { chunks }
    }

    pub fn append(&mut self, chunk: Chunk) -> usize {
        self.chunks.push(chunk);
        self.chunks.len() - 1
    }

    pub fn get(&self, row_id: usize) -> Result<&Chunk> {
        self.chunks
            .get(row_id)
            .ok_or_else(|| Error::NotFound(format!("no chunk at row {}", row_id)))
    }

    pub fn size(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// Number of distinct documents with at least one chunk.
    pub fn document_count(&self) -> usize {
        self.chunks
            .iter()
            .map(|c| c.document_id.as_str())
            .collect::<HashSet<_>>()
            .len()
    }

    pub(crate) fn truncate(&mut self, len: usize) {
        self.chunks.truncate(len);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(document_id: &str, chunk_index: usize) -> Chunk {
        Chunk {
            document_id: document_id.to_string(),
            filename: format!("{}.txt", document_id),
            chunk_index,
            content: format!("{} part {}", document_id, chunk_index),
        }
    }

    #[test]
    fn test_append_assigns_contiguous_rows() {
        let mut index = FlatL2Index::new(2);
        assert_eq!(index.append(&[vec![0.0, 0.0], vec![1.0, 1.0]]).unwrap(), 0..2);
        assert_eq!(index.append(&[vec![2.0, 2.0]]).unwrap(), 2..3);
        assert_eq!(index.size(), 3);
    }

    #[test]
    fn test_append_rejects_whole_batch_on_bad_dimension() {
        let mut index = FlatL2Index::new(2);
        index.append(&[vec![0.0, 0.0]]).unwrap();

        let err = index.append(&[vec![1.0, 1.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, Error::InvalidResponse(_)));
        assert_eq!(index.size(), 1);
    }

    #[test]
    fn test_search_orders_by_distance() {
        let mut index = FlatL2Index::new(2);
        index
            .append(&[vec![5.0, 5.0], vec![1.0, 0.0], vec![0.0, 3.0]])
            .unwrap();

        let results = index.search(&[0.0, 0.0], 10).unwrap();
        assert_eq!(results, vec![(1, 1.0), (2, 9.0), (0, 50.0)]);
    }

    #[test]
    fn test_search_limits_to_k_and_size() {
        let mut index = FlatL2Index::new(1);
        index.append(&[vec![1.0], vec![2.0], vec![3.0]]).unwrap();

        assert_eq!(index.search(&[0.0], 2).unwrap().len(), 2);
        assert_eq!(index.search(&[0.0], 10).unwrap().len(), 3);
        assert!(FlatL2Index::new(1).search(&[0.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_search_breaks_ties_by_row() {
        let mut index = FlatL2Index::new(1);
        index.append(&[vec![1.0], vec![-1.0], vec![1.0]]).unwrap();

        let rows: Vec<usize> = index.search(&[0.0], 3).unwrap().into_iter().map(|r| r.0).collect();
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn test_search_rejects_wrong_query_dimension() {
        let index = FlatL2Index::new(3);
        assert!(matches!(
            index.search(&[0.0], 1),
            Err(Error::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_from_raw_validates_shape() {
        assert_eq!(FlatL2Index::from_raw(2, vec![0.0; 6]).unwrap().size(), 3);
        assert!(FlatL2Index::from_raw(4, vec![0.0; 6]).is_err());
        assert!(FlatL2Index::from_raw(0, vec![]).is_err());
    }

    #[test]
    fn test_chunk_store_get_and_not_found() {
        let mut store = ChunkStore::new();
        assert_eq!(store.append(chunk("a", 0)), 0);
        assert_eq!(store.append(chunk("a", 1)), 1);
        assert_eq!(store.append(chunk("b", 0)), 2);

        assert_eq!(store.get(2).unwrap().document_id, "b");
        assert!(matches!(store.get(3), Err(Error::NotFound(_))));
        assert_eq!(store.document_count(), 2);
    }

    #[test]
    fn test_truncate_restores_previous_length() {
        let mut index = FlatL2Index::new(1);
        let mut store = ChunkStore::new();
        index.append(&[vec![1.0]]).unwrap();
        store.append(chunk("a", 0));

        index.append(&[vec![2.0], vec![3.0]]).unwrap();
        store.append(chunk("b", 0));
        store.append(chunk("b", 1));

        index.truncate(1);
        store.truncate(1);
        assert_eq!(index.size(), 1);
        assert_eq!(store.size(), 1);
        assert_eq!(index.raw(), &[1.0]);
    }
}
