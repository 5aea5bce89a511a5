//! HNSW search implementation.

use hnsw_rs::api::AnnT;

use crate::index::IndexResult;
use crate::rdf2vec::RDF2VEC_DIM;

use super::{AnnIndex, EF_SEARCH};

impl AnnIndex {
    /// Nearest-neighbor search. `query` is an RDF2Vec embedding of the same
    /// dimensionality the index was built with.
    pub fn search(&self, query: &[f32], k: usize) -> Vec<IndexResult> {
        if self.id_map.is_empty() {
            return Vec::new();
        }

        if query.len() != RDF2VEC_DIM {
            tracing::warn!(
                "Query dimension mismatch: expected {}, got {}",
                RDF2VEC_DIM,
                query.len()
            );
            return Vec::new();
        }

        let index_size = self.id_map.len();
        let ef_search = EF_SEARCH.max(k * 2).min(index_size.max(EF_SEARCH));

        let neighbors = self.inner.hnsw().search_neighbours(query, k, ef_search);

        neighbors
            .into_iter()
            .filter_map(|n| {
                let idx = n.d_id;
                if idx < self.id_map.len() {
                    if !n.distance.is_finite() {
                        tracing::warn!(idx, distance = n.distance, "non-finite ANN distance, skipping");
                        return None;
                    }
                    Some(IndexResult {
                        id: self.id_map[idx].clone(),
                        distance: n.distance,
                    })
                } else {
                    tracing::warn!("invalid index {} in ANN result", idx);
                    None
                }
            })
            .collect()
    }
}
