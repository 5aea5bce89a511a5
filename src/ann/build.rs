//! HNSW index construction from RDF2Vec embeddings.

use hnsw_rs::anndists::dist::distances::DistCosine;
use hnsw_rs::api::AnnT;
use hnsw_rs::hnsw::Hnsw;

use crate::rdf2vec::RDF2VEC_DIM;

use super::{AnnError, AnnIndex, HnswInner, EF_CONSTRUCTION, MAX_LAYER, MAX_NB_CONNECTION};

impl AnnIndex {
    /// Build a new HNSW index from `(uri, embedding)` pairs.
    pub fn build(embeddings: Vec<(String, Vec<f32>)>) -> Result<Self, AnnError> {
        if embeddings.is_empty() {
            let hnsw = Hnsw::new(MAX_NB_CONNECTION, 1, MAX_LAYER, EF_CONSTRUCTION, DistCosine);
            return Ok(Self {
                inner: HnswInner::Owned(hnsw),
                id_map: Vec::new(),
            });
        }

        for (uri, emb) in &embeddings {
            if emb.len() != RDF2VEC_DIM {
                return Err(AnnError::DimensionMismatch {
                    expected: RDF2VEC_DIM,
                    actual: emb.len(),
                });
            }
            tracing::trace!("Adding {} to ANN index", uri);
        }

        let nb_elem = embeddings.len();
        tracing::info!("Building ANN index with {} vectors", nb_elem);

        let mut hnsw = Hnsw::new(MAX_NB_CONNECTION, nb_elem, MAX_LAYER, EF_CONSTRUCTION, DistCosine);

        let mut id_map = Vec::with_capacity(nb_elem);
        let mut data_for_insert: Vec<(&Vec<f32>, usize)> = Vec::with_capacity(nb_elem);

        for (idx, (uri, embedding)) in embeddings.iter().enumerate() {
            id_map.push(uri.clone());
            data_for_insert.push((embedding, idx));
        }

        hnsw.parallel_insert_data(&data_for_insert);

        tracing::info!("ANN index built successfully");

        Ok(Self {
            inner: HnswInner::Owned(hnsw),
            id_map,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ann::make_test_embedding;

    #[test]
    fn test_build_and_search() {
        let embeddings = vec![
            ("uri1".to_string(), make_test_embedding(1)),
            ("uri2".to_string(), make_test_embedding(2)),
            ("uri3".to_string(), make_test_embedding(3)),
        ];

        let index = AnnIndex::build(embeddings).unwrap();
        assert_eq!(index.len(), 3);

        let query = make_test_embedding(1);
        let results = index.search(&query, 3);

        assert!(!results.is_empty());
        assert_eq!(results[0].id, "uri1");
        assert!(results[0].distance < 0.1);
    }

    #[test]
    fn test_empty_index() {
        let index = AnnIndex::build(vec![]).unwrap();
        assert!(index.is_empty());

        let query = make_test_embedding(1);
        let results = index.search(&query, 5);
        assert!(results.is_empty());
    }
}
