use std::path::PathBuf;

use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

use fizzquery::ingest::{ingest, IngestTargets};

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let root = std::env::var("INPUT_FILEPATH").map(PathBuf::from).unwrap_or_else(|_| PathBuf::from("."));

    let targets = IngestTargets {
        fts_path: std::env::var("FTS_SQLITE_PATH").ok().map(PathBuf::from),
        bloomtyper_path: std::env::var("BLOOMTYPER_INDEX_PATH").ok().map(PathBuf::from),
        rdf2vec_path: std::env::var("RDF2VEC_INDEX_PATH").ok().map(PathBuf::from),
    };

    if targets.is_empty() {
        bail!("no index target set: set at least one of FTS_SQLITE_PATH, BLOOMTYPER_INDEX_PATH, RDF2VEC_INDEX_PATH");
    }

    ingest(&root, &targets)?;
    Ok(())
}
