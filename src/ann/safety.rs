//! Safety tests for the LoadedHnsw self-referential pattern.

#[cfg(test)]
mod tests {
    use std::mem::size_of;
    use std::sync::Arc;
    use std::thread;
    use tempfile::TempDir;

    use crate::ann::{make_test_embedding, AnnIndex, LoadedHnsw};
    use crate::rdf2vec::RDF2VEC_DIM;

    fn well_separated_embedding(seed: u32) -> Vec<f32> {
        let mut v = vec![0.01f32; RDF2VEC_DIM];
        let idx = (seed as usize) % RDF2VEC_DIM;
        v[idx] = 1.0;
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        for val in &mut v {
            *val /= norm;
        }
        v
    }

    #[test]
    fn test_loaded_index_multiple_searches() {
        let tmp = TempDir::new().unwrap();

        let embeddings: Vec<_> = (1..=10)
            .map(|i| (format!("uri{}", i), well_separated_embedding(i)))
            .collect();
        let index = AnnIndex::build(embeddings).unwrap();
        index.save(tmp.path(), "safety_test").unwrap();

        let loaded = AnnIndex::load(tmp.path(), "safety_test").unwrap();
        assert_eq!(loaded.len(), 10);

        for i in 1..=10 {
            let query = well_separated_embedding(i);
            let results = loaded.search(&query, 5);
            assert!(!results.is_empty(), "search {} should return results", i);
            assert_eq!(results[0].id, format!("uri{}", i));
            assert!(results[0].distance < 0.1);
        }
    }

    #[test]
    fn test_loaded_index_threaded_access() {
        let tmp = TempDir::new().unwrap();

        let embeddings: Vec<_> = (1..=20)
            .map(|i| (format!("item{}", i), make_test_embedding(i)))
            .collect();
        AnnIndex::build(embeddings).unwrap().save(tmp.path(), "threaded").unwrap();

        let loaded = Arc::new(AnnIndex::load(tmp.path(), "threaded").unwrap());

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let index = Arc::clone(&loaded);
                thread::spawn(move || {
                    for i in 1..=20 {
                        let query = make_test_embedding(i);
                        let results = index.search(&query, 3);
                        assert!(!results.is_empty(), "thread {} search {} failed", t, i);
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().expect("thread panicked");
        }
    }

    #[test]
    fn test_layout_invariants() {
        let loaded_size = size_of::<LoadedHnsw>();
        assert!(loaded_size < 1024, "LoadedHnsw unexpectedly large: {} bytes", loaded_size);
    }

    #[test]
    fn test_loaded_minimal_index() {
        let tmp = TempDir::new().unwrap();

        let index = AnnIndex::build(vec![("only".to_string(), make_test_embedding(42))]).unwrap();
        index.save(tmp.path(), "minimal").unwrap();

        let loaded = AnnIndex::load(tmp.path(), "minimal").unwrap();
        assert_eq!(loaded.len(), 1);

        let results = loaded.search(&make_test_embedding(42), 5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].id, "only");
    }
}
