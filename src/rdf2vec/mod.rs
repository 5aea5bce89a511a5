//! Graph-embedding similarity resolver.
//!
//! Builds one `f32` vector per entity URI from random walks over the triple
//! graph (the RDF2Vec construction), indexes those vectors with the shared
//! `ann` HNSW wrapper, and resolves a query URI to its nearest neighbours.

mod graph;
mod train;

use std::path::{Path, PathBuf};

use sqlx::Row;
use thiserror::Error;

use crate::ann::AnnIndex;
use crate::index::VectorIndex;
use crate::registry::ResolverResult;
use crate::sqlite::{SqliteHandle, SqliteOpenError};
use crate::triple::Triple;

pub use train::VECTOR_SIZE as RDF2VEC_DIM;

#[derive(Error, Debug)]
pub enum Rdf2VecError {
    #[error("failed to open RDF2Vec database: {0}")]
    Open(#[from] SqliteOpenError),
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
    #[error("ANN index error: {0}")]
    Ann(#[from] crate::ann::AnnError),
}

fn ann_location(sqlite_path: &Path) -> (PathBuf, String) {
    let dir = sqlite_path.parent().map(Path::to_path_buf).unwrap_or_else(|| PathBuf::from("."));
    let basename = sqlite_path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("rdf2vec")
        .to_string();
    (dir, basename)
}

fn encode_vector(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

/// Build a fresh RDF2Vec index: construct the entity graph, generate random
/// walks, train embeddings, persist them to `rdf2vec_index`, and build the
/// companion ANN index alongside the database file.
pub fn build(path: &Path, files: &[PathBuf]) -> Result<(), Rdf2VecError> {
    let entity_graph = graph::build_graph(files)?;
    let walks = graph::random_walks(&entity_graph);
    let embeddings = train::train(&walks);

    // Only node URIs (not predicate tokens) are resolvable query targets.
    let node_embeddings: Vec<(String, Vec<f32>)> = entity_graph
        .nodemap
        .keys()
        .filter_map(|uri| embeddings.get(uri).map(|v| (uri.clone(), v.clone())))
        .collect();

    let handle = SqliteHandle::open_rw(path)?;
    handle.rt.block_on(create_schema(&handle)).map_err(Rdf2VecError::Schema)?;

    handle.rt.block_on(async {
        let mut tx = handle.pool.begin().await.map_err(Rdf2VecError::Write)?;
        sqlx::query("DELETE FROM rdf2vec_index").execute(&mut *tx).await.map_err(Rdf2VecError::Write)?;
        for (uri, vector) in &node_embeddings {
            sqlx::query("INSERT INTO rdf2vec_index (uri, vector) VALUES (?, ?)")
                .bind(uri)
                .bind(encode_vector(vector))
                .execute(&mut *tx)
                .await
                .map_err(Rdf2VecError::Write)?;
        }
        tx.commit().await.map_err(Rdf2VecError::Write)?;
        Ok::<(), Rdf2VecError>(())
    })?;

    let (dir, basename) = ann_location(path);
    let ann = AnnIndex::build(node_embeddings)?;
    ann.save(&dir, &basename)?;

    tracing::info!(nodes = entity_graph.nodemap.len(), walks = walks.len(), "RDF2Vec index built");
    Ok(())
}

async fn create_schema(handle: &SqliteHandle) -> Result<(), sqlx::Error> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS rdf2vec_index (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            uri TEXT NOT NULL,
            vector BLOB NOT NULL
        )",
    )
    .execute(&handle.pool)
    .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS rdf2vec_index_uri ON rdf2vec_index(uri)")
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

/// Query-time index: the `rdf2vec_index` table (for looking up a query URI's
/// own vector) plus the ANN graph (for nearest-neighbour search).
pub struct Rdf2VecIndex {
    handle: SqliteHandle,
    ann: Box<dyn VectorIndex>,
}

impl Rdf2VecIndex {
    pub fn open(path: &Path) -> Result<Self, Rdf2VecError> {
        let handle = SqliteHandle::open_ro(path)?;
        let (dir, basename) = ann_location(path);

        let ann: Box<dyn VectorIndex> = match AnnIndex::try_load(&dir, &basename) {
            Some(index) => index,
            None => {
                let rows = handle
                    .rt
                    .block_on(sqlx::query("SELECT uri, vector FROM rdf2vec_index").fetch_all(&handle.pool))
                    .map_err(Rdf2VecError::Write)?;
                let embeddings: Vec<(String, Vec<f32>)> = rows
                    .into_iter()
                    .map(|row| {
                        let uri: String = row.get("uri");
                        let blob: Vec<u8> = row.get("vector");
                        (uri, decode_vector(&blob))
                    })
                    .collect();
                Box::new(AnnIndex::build(embeddings)?)
            }
        };

        Ok(Self { handle, ann })
    }

    fn vector_for(&self, uri: &str) -> Option<Vec<f32>> {
        self.handle
            .rt
            .block_on(
                sqlx::query("SELECT vector FROM rdf2vec_index WHERE uri = ? LIMIT 1")
                    .bind(uri)
                    .fetch_optional(&self.handle.pool),
            )
            .ok()
            .flatten()
            .map(|row| decode_vector(&row.get::<Vec<u8>, _>("vector")))
    }

    /// Search resolver: find entities whose embedding is nearest to the
    /// query URI's embedding. `object` is the bracketed IRI of the reference
    /// entity; `limit` caps the number of neighbours returned. The query
    /// entity itself is included, its own nearest neighbour at distance 0.
    pub fn search(&self, var: &str, object: &str, limit: usize) -> ResolverResult {
        let vars = vec![var.to_string(), format!("{}Score", var)];

        if !Triple::is_iri(object) {
            return ResolverResult::empty(vars);
        }
        let Some(query_vector) = self.vector_for(object) else {
            return ResolverResult::empty(vars);
        };

        let results = self
            .ann
            .search(&query_vector, limit)
            .into_iter()
            .map(|r| vec![r.id, format!("\"{}\"^^xsd:decimal", r.distance)])
            .collect();

        ResolverResult { results, vars }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(dir: &Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("fixture.nt");
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn vector_codec_round_trips() {
        let v = vec![0.5f32, -1.25, 3.0];
        assert_eq!(decode_vector(&encode_vector(&v)), v);
    }

    #[test]
    fn builds_and_searches_index() {
        let dir = tempfile::tempdir().unwrap();
        let nt = write_fixture(
            dir.path(),
            &[
                r#"<http://ex/A> <http://ex/near> <http://ex/B> ."#,
                r#"<http://ex/B> <http://ex/near> <http://ex/C> ."#,
                r#"<http://ex/C> <http://ex/near> <http://ex/A> ."#,
            ],
        );
        let db_path = dir.path().join("rdf2vec.sqlite");
        build(&db_path, &[nt]).unwrap();

        let index = Rdf2VecIndex::open(&db_path).unwrap();
        let result = index.search("?similar", "<http://ex/A>", 5);
        assert_eq!(result.vars, vec!["?similar", "?similarScore"]);
        assert!(!result.results.is_empty());
        // The query entity is its own nearest neighbour, at distance ~0.
        assert_eq!(result.results[0][0], "<http://ex/A>");
        let self_distance: f32 = result.results[0][1]
            .trim_start_matches('"')
            .split('"')
            .next()
            .unwrap()
            .parse()
            .unwrap();
        assert!(self_distance < 0.01, "expected ~0 self-distance, got {}", self_distance);
    }

    #[test]
    fn unknown_uri_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("rdf2vec.sqlite");
        build(&db_path, &[]).unwrap();
        let index = Rdf2VecIndex::open(&db_path).unwrap();
        let result = index.search("?similar", "<http://ex/Nobody>", 5);
        assert!(result.results.is_empty());
    }
}
