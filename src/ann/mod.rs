//! HNSW (Hierarchical Navigable Small World) index for approximate nearest
//! neighbor search over RDF2Vec node embeddings.
//!
//! ## Security
//!
//! The underlying hnsw_rs library uses bincode for serialization, which is
//! unmaintained (RUSTSEC-2025-0141). To mitigate deserialization risks, we
//! compute and verify blake3 checksums on save/load.
//!
//! ## Memory Management
//!
//! When loading an index from disk, hnsw_rs returns `Hnsw<'a>` borrowing from
//! `HnswIo`. We use `LoadedHnsw` to manage this self-referential pattern:
//! - HnswIo is heap-allocated, we hold a raw pointer
//! - Hnsw lifetime is transmuted to 'static (safe because HnswIo outlives it)
//! - Custom Drop ensures HnswIo is freed after Hnsw is dropped
//!
//! ## CRITICAL: hnsw_rs Version Dependency
//!
//! The `LoadedHnsw` struct uses `std::mem::transmute` to extend a borrowed
//! lifetime. This is sound ONLY because:
//!
//! 1. `HnswIo::load_hnsw()` returns `Hnsw<'a>` borrowing from `&'a mut HnswIo`
//! 2. The `Hnsw` only reads data owned by `HnswIo` (no interior mutation)
//! 3. We control drop order via `ManuallyDrop` (Hnsw dropped before HnswIo)

mod build;
mod persist;
mod safety;
mod search;

use std::mem::ManuallyDrop;

use hnsw_rs::anndists::dist::distances::DistCosine;
use hnsw_rs::api::AnnT;
use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::hnswio::HnswIo;
use thiserror::Error;

use crate::index::{IndexResult, VectorIndex};
use crate::rdf2vec::RDF2VEC_DIM;

// Tuned for per-subject graphs in the tens-of-thousands of nodes range.
pub(crate) const MAX_NB_CONNECTION: usize = 24;
pub(crate) const MAX_LAYER: usize = 16;
pub(crate) const EF_CONSTRUCTION: usize = 200;
pub(crate) const EF_SEARCH: usize = 100;

#[derive(Error, Debug)]
pub enum AnnError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("ANN index not found at {0}")]
    NotFound(String),
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    #[error("ANN error: {0}")]
    Internal(String),
    #[error("checksum mismatch for {file}: expected {expected}, got {actual}. Index may be corrupted.")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },
}

pub(crate) struct LoadedHnsw {
    pub(crate) io_ptr: *mut HnswIo,
    pub(crate) hnsw: ManuallyDrop<Hnsw<'static, f32, DistCosine>>,
}

impl Drop for LoadedHnsw {
    fn drop(&mut self) {
        // SAFETY: drop order is Hnsw first, then HnswIo, matching the borrow.
        unsafe {
            ManuallyDrop::drop(&mut self.hnsw);
            drop(Box::from_raw(self.io_ptr));
        }
    }
}

// SAFETY: io_ptr only owns file-backed buffers; Hnsw<f32, DistCosine> is
// internally thread-safe. Mutation happens only during build, never after.
unsafe impl Send for LoadedHnsw {}
unsafe impl Sync for LoadedHnsw {}

/// HNSW index wrapper over RDF2Vec node embeddings.
pub struct AnnIndex {
    pub(crate) inner: HnswInner,
    /// Maps internal HNSW ids to node URIs.
    pub(crate) id_map: Vec<String>,
}

pub(crate) enum HnswInner {
    Owned(Hnsw<'static, f32, DistCosine>),
    Loaded(LoadedHnsw),
}

impl HnswInner {
    pub(crate) fn hnsw(&self) -> &Hnsw<'static, f32, DistCosine> {
        match self {
            HnswInner::Owned(hnsw) => hnsw,
            HnswInner::Loaded(loaded) => &loaded.hnsw,
        }
    }
}

impl AnnIndex {
    pub fn len(&self) -> usize {
        self.id_map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.id_map.is_empty()
    }
}

impl VectorIndex for AnnIndex {
    fn search(&self, query: &[f32], k: usize) -> Vec<IndexResult> {
        self.search(query, k)
    }

    fn len(&self) -> usize {
        self.len()
    }

    fn is_empty(&self) -> bool {
        self.is_empty()
    }

    fn name(&self) -> &'static str {
        "HNSW"
    }
}

#[cfg(test)]
pub(crate) fn make_test_embedding(seed: u32) -> Vec<f32> {
    let mut v = vec![0.0f32; RDF2VEC_DIM];
    for (i, val) in v.iter_mut().enumerate() {
        *val = ((seed as f32 * 0.1) + (i as f32 * 0.001)).sin();
    }
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for val in &mut v {
            *val /= norm;
        }
    }
    v
}

#[cfg(test)]
mod send_sync_tests {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn test_ann_index_is_send_sync() {
        assert_send::<AnnIndex>();
        assert_sync::<AnnIndex>();
    }

    #[test]
    fn test_loaded_hnsw_is_send_sync() {
        assert_send::<LoadedHnsw>();
        assert_sync::<LoadedHnsw>();
    }
}
