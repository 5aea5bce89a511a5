//! ANN index persistence (save/load).

use std::mem::ManuallyDrop;
use std::path::Path;

use hnsw_rs::anndists::dist::distances::DistCosine;
use hnsw_rs::api::AnnT;
use hnsw_rs::hnsw::Hnsw;
use hnsw_rs::hnswio::HnswIo;

use crate::index::VectorIndex;

use super::{AnnError, AnnIndex, HnswInner, LoadedHnsw};

const HNSW_EXTENSIONS: &[&str] = &["hnsw.graph", "hnsw.data", "hnsw.ids"];

fn verify_checksums(dir: &Path, basename: &str) -> Result<(), AnnError> {
    let checksum_path = dir.join(format!("{}.hnsw.checksum", basename));

    if !checksum_path.exists() {
        tracing::warn!("no checksum file for ANN index at {}", dir.display());
        return Ok(());
    }

    let checksum_content = std::fs::read_to_string(&checksum_path)
        .map_err(|e| AnnError::Internal(format!("failed to read {}: {}", checksum_path.display(), e)))?;
    for line in checksum_content.lines() {
        if let Some((ext, expected)) = line.split_once(':') {
            if !HNSW_EXTENSIONS.contains(&ext) {
                tracing::warn!("ignoring unknown extension in checksum file: {}", ext);
                continue;
            }
            let path = dir.join(format!("{}.{}", basename, ext));
            if path.exists() {
                let file = std::fs::File::open(&path)
                    .map_err(|e| AnnError::Internal(format!("failed to open {} for checksum: {}", path.display(), e)))?;
                let mut hasher = blake3::Hasher::new();
                std::io::copy(&mut std::io::BufReader::new(file), &mut hasher)
                    .map_err(|e| AnnError::Internal(format!("failed to read {} for checksum: {}", path.display(), e)))?;
                let actual = hasher.finalize().to_hex().to_string();
                if actual != expected {
                    return Err(AnnError::ChecksumMismatch {
                        file: path.display().to_string(),
                        expected: expected.to_string(),
                        actual,
                    });
                }
            }
        }
    }
    Ok(())
}

impl AnnIndex {
    /// Save the index under `dir/{basename}.hnsw.{graph,data,ids,checksum}`,
    /// atomically via a temp-dir-then-rename.
    pub fn save(&self, dir: &Path, basename: &str) -> Result<(), AnnError> {
        tracing::info!("saving ANN index to {}/{}", dir.display(), basename);

        let hnsw_count = self.inner.hnsw().get_nb_point();
        if hnsw_count != self.id_map.len() {
            return Err(AnnError::Internal(format!(
                "HNSW/id map count mismatch on save: HNSW has {} vectors but id_map has {}",
                hnsw_count,
                self.id_map.len()
            )));
        }

        std::fs::create_dir_all(dir)
            .map_err(|e| AnnError::Internal(format!("failed to create directory {}: {}", dir.display(), e)))?;

        let temp_dir = dir.join(format!(".{}.tmp", basename));
        if temp_dir.exists() {
            std::fs::remove_dir_all(&temp_dir)
                .map_err(|e| AnnError::Internal(format!("failed to clean up temp dir {}: {}", temp_dir.display(), e)))?;
        }
        std::fs::create_dir_all(&temp_dir)
            .map_err(|e| AnnError::Internal(format!("failed to create temp dir {}: {}", temp_dir.display(), e)))?;

        self.inner
            .hnsw()
            .file_dump(&temp_dir, basename)
            .map_err(|e| AnnError::Internal(format!("failed to dump HNSW to {}/{}: {}", temp_dir.display(), basename, e)))?;

        let id_map_json = serde_json::to_string(&self.id_map)
            .map_err(|e| AnnError::Internal(format!("failed to serialize id map: {}", e)))?;
        let id_map_temp = temp_dir.join(format!("{}.hnsw.ids", basename));
        std::fs::write(&id_map_temp, &id_map_json)
            .map_err(|e| AnnError::Internal(format!("failed to write {}: {}", id_map_temp.display(), e)))?;

        let ids_hash = blake3::hash(id_map_json.as_bytes());
        let mut checksums = vec![format!("hnsw.ids:{}", ids_hash.to_hex())];
        for ext in &["hnsw.graph", "hnsw.data"] {
            let path = temp_dir.join(format!("{}.{}", basename, ext));
            if path.exists() {
                let file = std::fs::File::open(&path)
                    .map_err(|e| AnnError::Internal(format!("failed to open {} for checksum: {}", path.display(), e)))?;
                let mut hasher = blake3::Hasher::new();
                hasher
                    .update_reader(file)
                    .map_err(|e| AnnError::Internal(format!("failed to read {} for checksum: {}", path.display(), e)))?;
                checksums.push(format!("{}:{}", ext, hasher.finalize().to_hex()));
            }
        }

        let checksum_temp = temp_dir.join(format!("{}.hnsw.checksum", basename));
        std::fs::write(&checksum_temp, checksums.join("\n"))
            .map_err(|e| AnnError::Internal(format!("failed to write {}: {}", checksum_temp.display(), e)))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let restrictive = std::fs::Permissions::from_mode(0o600);
            for ext in &["hnsw.ids", "hnsw.graph", "hnsw.data", "hnsw.checksum"] {
                let path = temp_dir.join(format!("{}.{}", basename, ext));
                if path.exists() {
                    let _ = std::fs::set_permissions(&path, restrictive.clone());
                }
            }
        }

        for ext in &["hnsw.graph", "hnsw.data", "hnsw.ids", "hnsw.checksum"] {
            let temp_path = temp_dir.join(format!("{}.{}", basename, ext));
            let final_path = dir.join(format!("{}.{}", basename, ext));
            if temp_path.exists() {
                std::fs::rename(&temp_path, &final_path).map_err(|e| {
                    AnnError::Internal(format!(
                        "failed to rename {} to {}: {}",
                        temp_path.display(),
                        final_path.display(),
                        e
                    ))
                })?;
            }
        }

        let _ = std::fs::remove_dir(&temp_dir);

        tracing::info!("ANN index saved: {} vectors", self.id_map.len());
        Ok(())
    }

    /// Load an index from disk, verifying checksums first.
    pub fn load(dir: &Path, basename: &str) -> Result<Self, AnnError> {
        let graph_path = dir.join(format!("{}.hnsw.graph", basename));
        let data_path = dir.join(format!("{}.hnsw.data", basename));
        let id_map_path = dir.join(format!("{}.hnsw.ids", basename));

        if !graph_path.exists() || !data_path.exists() || !id_map_path.exists() {
            return Err(AnnError::NotFound(dir.display().to_string()));
        }

        verify_checksums(dir, basename)?;

        const MAX_ID_MAP_SIZE: u64 = 500 * 1024 * 1024;
        let id_map_size = std::fs::metadata(&id_map_path)
            .map_err(|e| AnnError::Internal(format!("failed to stat id map {}: {}", id_map_path.display(), e)))?
            .len();
        if id_map_size > MAX_ID_MAP_SIZE {
            return Err(AnnError::Internal(format!(
                "id map too large: {}MB > {}MB limit",
                id_map_size / (1024 * 1024),
                MAX_ID_MAP_SIZE / (1024 * 1024)
            )));
        }

        let id_map_json = std::fs::read_to_string(&id_map_path)
            .map_err(|e| AnnError::Internal(format!("failed to read id map {}: {}", id_map_path.display(), e)))?;
        let id_map: Vec<String> =
            serde_json::from_str(&id_map_json).map_err(|e| AnnError::Internal(format!("failed to parse id map: {}", e)))?;

        let hnsw_io = Box::new(HnswIo::new(dir, basename));
        let io_ptr = Box::into_raw(hnsw_io);

        // SAFETY: io_ptr is valid, freshly created above.
        let hnsw: Hnsw<'_, f32, DistCosine> = unsafe { &mut *io_ptr }.load_hnsw().map_err(|e| {
            // SAFETY: io_ptr was created from Box::into_raw above; safe to reclaim on this error path.
            unsafe {
                drop(Box::from_raw(io_ptr));
            }
            AnnError::Internal(format!("failed to load HNSW: {}", e))
        })?;

        // SAFETY: io_ptr outlives hnsw for the lifetime of LoadedHnsw, whose Drop
        // order (hnsw first, then io_ptr) upholds the borrow hnsw_rs returned.
        let hnsw: Hnsw<'static, f32, DistCosine> = unsafe { std::mem::transmute(hnsw) };

        let hnsw_count = hnsw.get_nb_point();
        if hnsw_count != id_map.len() {
            // SAFETY: io_ptr was created from Box::into_raw above; safe to reclaim.
            unsafe {
                drop(Box::from_raw(io_ptr));
            }
            return Err(AnnError::Internal(format!(
                "id map size mismatch: HNSW has {} vectors but id_map has {}",
                hnsw_count,
                id_map.len()
            )));
        }

        let loaded = LoadedHnsw {
            io_ptr,
            hnsw: ManuallyDrop::new(hnsw),
        };

        tracing::info!("ANN index loaded: {} vectors", id_map.len());

        Ok(Self {
            inner: HnswInner::Loaded(loaded),
            id_map,
        })
    }

    pub fn exists(dir: &Path, basename: &str) -> bool {
        dir.join(format!("{}.hnsw.graph", basename)).exists()
            && dir.join(format!("{}.hnsw.data", basename)).exists()
            && dir.join(format!("{}.hnsw.ids", basename)).exists()
    }

    /// Load the index if present, wrapped as a `VectorIndex` trait object.
    pub fn try_load(dir: &Path, basename: &str) -> Option<Box<dyn VectorIndex>> {
        if Self::exists(dir, basename) {
            match Self::load(dir, basename) {
                Ok(index) => {
                    tracing::info!("ANN index loaded ({} vectors)", index.len());
                    Some(Box::new(index))
                }
                Err(e) => {
                    tracing::warn!("failed to load ANN index: {}", e);
                    None
                }
            }
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ann::make_test_embedding;
    use tempfile::TempDir;

    #[test]
    fn test_save_and_load() {
        let tmp = TempDir::new().unwrap();

        let embeddings = vec![
            ("uri1".to_string(), make_test_embedding(1)),
            ("uri2".to_string(), make_test_embedding(2)),
        ];

        let index = AnnIndex::build(embeddings).unwrap();
        index.save(tmp.path(), "index").unwrap();

        assert!(AnnIndex::exists(tmp.path(), "index"));

        let loaded = AnnIndex::load(tmp.path(), "index").unwrap();
        assert_eq!(loaded.len(), 2);

        let query = make_test_embedding(1);
        let results = loaded.search(&query, 2);
        assert_eq!(results[0].id, "uri1");
    }
}
