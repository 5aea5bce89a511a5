//! Bloom-filter membership resolver: "is this value a known instance of
//! class C" without materializing every instance's full URI list in memory.
//!
//! One filter is built per `rdf:type` class seen during ingestion, sized for
//! the class's instance count at a fixed target false-positive rate. The
//! hash fed to the filter is derived from SHA-256 so it is reproducible
//! across machines and Rust versions (the filter crate's own internal
//! SipHash keys are fixed rather than random for the same reason).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use bloomfilter::Bloom;
use sha2::{Digest, Sha256};
use sqlx::Row;
use thiserror::Error;

use crate::nt::NtFileReader;
use crate::triple::{Triple, RDF_TYPE};

const TARGET_FALSE_POSITIVE_RATE: f64 = 0.005;
/// Fixed SipHash keys so two builds of the same data produce byte-identical
/// filters; `bloomfilter` otherwise seeds them from the OS RNG.
const SIP_KEYS: [(u64, u64); 2] = [(0x5be0_cd19_1372_5206, 0x9b05_688c_2b3e_6c1f), (0x5103_4d55_2d7d_d94b, 0x1f83_d9ab_fb41_bd6b)];

#[derive(Error, Debug)]
pub enum BloomtyperError {
    #[error("failed to open Bloomtyper database: {0}")]
    Open(#[from] crate::sqlite::SqliteOpenError),
    #[error("schema setup failed: {0}")]
    Schema(#[source] sqlx::Error),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: crate::nt::NtReaderError,
    },
    #[error("write failed: {0}")]
    Write(#[source] sqlx::Error),
    #[error("serialization failed: {0}")]
    Serialize(#[source] bincode::Error),
}

/// SHA-256 the term, take the leading 16 bytes, interpret as a big-endian
/// signed 128-bit integer. This is the value handed to the Bloom filter,
/// not a replacement for its own internal hashing.
fn term_hash(term: &str) -> i128 {
    let digest = Sha256::digest(term.as_bytes());
    let mut buf = [0u8; 16];
    buf.copy_from_slice(&digest[..16]);
    i128::from_be_bytes(buf)
}

/// Build-time index: class IRI -> bloom filter over its instances' hashes.
pub fn build(path: &Path, files: &[PathBuf]) -> Result<(), BloomtyperError> {
    let mut members: HashMap<String, Vec<String>> = HashMap::new();

    for file in files {
        let reader = NtFileReader::open(file).map_err(|source| BloomtyperError::Read {
            path: file.clone(),
            source,
        })?;
        for triple in reader {
            let triple: Triple = triple.map_err(|source| BloomtyperError::Read {
                path: file.clone(),
                source,
            })?;
            if triple.predicate == RDF_TYPE && Triple::is_iri(&triple.object) {
                members.entry(triple.object.clone()).or_default().push(triple.subject);
            }
        }
    }

    let handle = crate::sqlite::SqliteHandle::open_rw(path)?;
    handle.rt.block_on(create_schema(&handle)).map_err(BloomtyperError::Schema)?;

    handle.rt.block_on(async {
        let mut tx = handle.pool.begin().await.map_err(BloomtyperError::Write)?;
        for (class, instances) in &members {
            let item_count = instances.len().max(1);
            let bitmap_size = Bloom::<i128>::compute_bitmap_size(item_count, TARGET_FALSE_POSITIVE_RATE);
            let mut filter = Bloom::<i128>::new_with_seed(bitmap_size, item_count, sip_keys());
            for instance in instances {
                filter.set(&term_hash(instance));
            }
            let blob = bincode::serialize(&filter).map_err(BloomtyperError::Serialize)?;

            sqlx::query(
                "INSERT INTO bloomtyper_index (class, size, blob) VALUES (?, ?, ?)
                 ON CONFLICT(class) DO UPDATE SET size = excluded.size, blob = excluded.blob",
            )
            .bind(class)
            .bind(instances.len() as i64)
            .bind(blob)
            .execute(&mut *tx)
            .await
            .map_err(BloomtyperError::Write)?;
        }
        tx.commit().await.map_err(BloomtyperError::Write)?;
        Ok::<(), BloomtyperError>(())
    })?;

    tracing::info!(classes = members.len(), "Bloomtyper index built");
    Ok(())
}

fn sip_keys() -> [(u64, u64); 2] {
    SIP_KEYS
}

async fn create_schema(handle: &crate::sqlite::SqliteHandle) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS bloomtyper_index (
            class TEXT PRIMARY KEY,
            size INTEGER NOT NULL,
            blob BLOB NOT NULL
        )",
    )
    .execute(&handle.pool)
    .await?;
    sqlx::query("CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)")
        .execute(&handle.pool)
        .await?;
    sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', '1')")
        .execute(&handle.pool)
        .await?;
    Ok(())
}

/// Query-time checker. Loads only `(class, size)` pairs eagerly; each
/// class's filter blob is fetched and cached on first access.
pub struct BloomtyperChecker {
    handle: crate::sqlite::SqliteHandle,
    sizes: HashMap<String, u64>,
    loaded: std::sync::Mutex<HashMap<String, Bloom<i128>>>,
}

impl BloomtyperChecker {
    pub fn open(path: &Path) -> Result<Self, BloomtyperError> {
        let handle = crate::sqlite::SqliteHandle::open_ro(path)?;
        let rows = handle
            .rt
            .block_on(sqlx::query("SELECT class, size FROM bloomtyper_index").fetch_all(&handle.pool))
            .map_err(BloomtyperError::Write)?;
        let sizes = rows
            .into_iter()
            .map(|row| (row.get::<String, _>("class"), row.get::<i64, _>("size") as u64))
            .collect();
        Ok(Self {
            handle,
            sizes,
            loaded: std::sync::Mutex::new(HashMap::new()),
        })
    }

    pub fn size(&self, class: &str) -> Option<u64> {
        self.sizes.get(class).copied()
    }

    fn with_filter<T>(&self, class: &str, f: impl FnOnce(&Bloom<i128>) -> T) -> Option<T> {
        if !self.sizes.contains_key(class) {
            return None;
        }
        let mut loaded = self.loaded.lock().unwrap();
        if !loaded.contains_key(class) {
            let row = self
                .handle
                .rt
                .block_on(
                    sqlx::query("SELECT blob FROM bloomtyper_index WHERE class = ?")
                        .bind(class)
                        .fetch_optional(&self.handle.pool),
                )
                .ok()
                .flatten()?;
            let blob: Vec<u8> = row.get("blob");
            let filter: Bloom<i128> = bincode::deserialize(&blob).ok()?;
            loaded.insert(class.to_string(), filter);
        }
        loaded.get(class).map(f)
    }

    /// Is `value` (a full term, IRI or literal) in class `class`?
    pub fn check(&self, class: &str, value: &str) -> bool {
        self.with_filter(class, |filter| filter.check(&term_hash(value)))
            .unwrap_or(false)
    }

    /// Every known class `value` might belong to (possible false positives).
    pub fn classes_of(&self, value: &str) -> Vec<String> {
        let hash = term_hash(value);
        self.sizes
            .keys()
            .filter(|class| {
                self.with_filter(class, |filter| filter.check(&hash)).unwrap_or(false)
            })
            .cloned()
            .collect()
    }
}
