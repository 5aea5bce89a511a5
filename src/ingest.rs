//! Directory-walk dispatcher: enumerate N-Triples files under a root and
//! feed them to every enabled index builder.

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;
use thiserror::Error;

use crate::{bloomtyper, fts, rdf2vec};

#[derive(Error, Debug)]
pub enum IngestError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("FTS build failed: {0}")]
    Fts(#[from] fts::FtsError),
    #[error("bloomtyper build failed: {0}")]
    Bloomtyper(#[from] bloomtyper::BloomtyperError),
    #[error("RDF2Vec build failed: {0}")]
    Rdf2Vec(#[from] rdf2vec::Rdf2VecError),
}

/// Targets to build. Each field is the destination path for that index, or
/// `None` to skip building it.
#[derive(Debug, Clone, Default)]
pub struct IngestTargets {
    pub fts_path: Option<PathBuf>,
    pub bloomtyper_path: Option<PathBuf>,
    pub rdf2vec_path: Option<PathBuf>,
}

impl IngestTargets {
    pub fn is_empty(&self) -> bool {
        self.fts_path.is_none() && self.bloomtyper_path.is_none() && self.rdf2vec_path.is_none()
    }
}

fn is_nt_file(path: &Path) -> bool {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(n) => n,
        None => return false,
    };
    name.ends_with(".nt") || name.ends_with(".nt.gz")
}

/// Recursively enumerate `*.nt` / `*.nt.gz` files under `root`, respecting
/// `.gitignore`/hidden-file conventions the way a checked-out dataset repo
/// would expect.
fn enumerate_nt_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let walker = WalkBuilder::new(root).hidden(true).git_ignore(true).git_global(true).git_exclude(true).build();

    for entry in walker.flatten() {
        let path = entry.path();
        if path.is_file() && is_nt_file(path) {
            files.push(path.to_path_buf());
        }
    }
    files
}

/// Walk `root` for N-Triples input and build every index named in `targets`.
/// Each builder consumes its own independent pass over the same file list,
/// so only the builders actually requested do any work.
pub fn ingest(root: &Path, targets: &IngestTargets) -> Result<(), IngestError> {
    if targets.is_empty() {
        return Err(IngestError::InvalidInput("no index target paths were configured".into()));
    }
    if !root.is_dir() {
        return Err(IngestError::InvalidInput(format!("{} is not a directory", root.display())));
    }

    let files = enumerate_nt_files(root);
    tracing::info!(root = %root.display(), files = files.len(), "enumerated N-Triples input");

    if let Some(path) = &targets.fts_path {
        tracing::info!(path = %path.display(), "building FTS index");
        fts::FtsIndex::build(path, &files)?;
    }
    if let Some(path) = &targets.bloomtyper_path {
        tracing::info!(path = %path.display(), "building bloomtyper index");
        bloomtyper::build(path, &files)?;
    }
    if let Some(path) = &targets.rdf2vec_path {
        tracing::info!(path = %path.display(), "building RDF2Vec index");
        rdf2vec::build(path, &files)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_file(dir: &Path, name: &str, lines: &[&str]) {
        let mut f = std::fs::File::create(dir.join(name)).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
    }

    #[test]
    fn rejects_empty_targets() {
        let dir = tempfile::tempdir().unwrap();
        let err = ingest(dir.path(), &IngestTargets::default()).unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
    }

    #[test]
    fn rejects_non_directory_input() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("not_a_dir.nt");
        std::fs::write(&file_path, "").unwrap();
        let targets = IngestTargets {
            fts_path: Some(dir.path().join("fts.sqlite")),
            ..Default::default()
        };
        let err = ingest(&file_path, &targets).unwrap_err();
        assert!(matches!(err, IngestError::InvalidInput(_)));
    }

    #[test]
    fn enumerates_only_nt_files() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "data.nt", &[r#"<http://ex/A> <http://ex/name> "x" ."#]);
        write_file(dir.path(), "notes.txt", &["irrelevant"]);
        let files = enumerate_nt_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].ends_with("data.nt"));
    }

    #[test]
    fn builds_fts_index_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        write_file(dir.path(), "data.nt", &[r#"<http://ex/A> <http://ex/name> "hello" ."#]);
        let fts_path = dir.path().join("fts.sqlite");
        let targets = IngestTargets {
            fts_path: Some(fts_path.clone()),
            ..Default::default()
        };
        ingest(dir.path(), &targets).unwrap();
        assert!(fts_path.exists());
    }
}
