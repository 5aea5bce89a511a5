//! Vector index trait for nearest neighbor search.
//!
//! Abstracts over different index implementations (HNSW and whatever else
//! might back it) so the rdf2vec resolver doesn't care which one is loaded.

/// Result from a vector index search: a node URI plus a distance.
#[derive(Debug, Clone)]
pub struct IndexResult {
    /// Node URI (matches the `rdf2vec_index` table's `uri` column).
    pub id: String,
    /// Cosine distance (0.0 = identical, higher is farther apart).
    pub distance: f32,
}

/// Trait for vector similarity search indexes.
///
/// Implementations must be thread-safe (`Send + Sync`).
pub trait VectorIndex: Send + Sync {
    /// Search for nearest neighbors to `query` (an RDF2Vec embedding).
    ///
    /// Results are sorted by ascending distance.
    fn search(&self, query: &[f32], k: usize) -> Vec<IndexResult>;

    /// Number of vectors in the index
    fn len(&self) -> usize;

    /// Check if the index is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Index type name (e.g., "HNSW", "CAGRA")
    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Mock VectorIndex for testing trait behavior
    struct MockIndex {
        results: Vec<IndexResult>,
        size: usize,
    }

    impl MockIndex {
        fn new(size: usize) -> Self {
            Self {
                results: Vec::new(),
                size,
            }
        }

        fn with_results(results: Vec<IndexResult>) -> Self {
            let size = results.len();
            Self { results, size }
        }
    }

    impl VectorIndex for MockIndex {
        fn search(&self, _query: &[f32], k: usize) -> Vec<IndexResult> {
            self.results.iter().take(k).cloned().collect()
        }

        fn len(&self) -> usize {
            self.size
        }

        fn name(&self) -> &'static str {
            "Mock"
        }
    }

    #[test]
    fn test_index_result_fields() {
        let result = IndexResult {
            id: "chunk_1".to_string(),
            distance: 0.05,
        };
        assert_eq!(result.id, "chunk_1");
        assert!((result.distance - 0.05).abs() < f32::EPSILON);
    }

    #[test]
    fn test_default_is_empty() {
        let empty = MockIndex::new(0);
        assert!(empty.is_empty());

        let nonempty = MockIndex::new(5);
        assert!(!nonempty.is_empty());
    }

    #[test]
    fn test_mock_search() {
        let index = MockIndex::with_results(vec![
            IndexResult {
                id: "a".into(),
                distance: 0.1,
            },
            IndexResult {
                id: "b".into(),
                distance: 0.2,
            },
            IndexResult {
                id: "c".into(),
                distance: 0.3,
            },
        ]);
        let query = vec![0.0; crate::rdf2vec::RDF2VEC_DIM];
        let results = index.search(&query, 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].id, "a");
        assert_eq!(results[1].id, "b");
    }

    #[test]
    fn test_trait_object_dispatch() {
        let index: Box<dyn VectorIndex> = Box::new(MockIndex::new(42));
        assert_eq!(index.len(), 42);
        assert!(!index.is_empty());
        assert_eq!(index.name(), "Mock");
    }
}
