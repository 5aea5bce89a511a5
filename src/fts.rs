//! Full-text literal index: build from an N-Triples stream, search as a
//! resolver returning ranked `(subject, literal, rank)` bindings.

use std::path::{Path, PathBuf};

use sqlx::Row;
use thiserror::Error;

use crate::literal::literal_to_parts;
use crate::nt::{decode_unicode_escapes, NtFileReader};
use crate::registry::ResolverResult;
use crate::sqlite::{SqliteHandle, SqliteOpenError};

const MAX_LITERAL_DISPLAY_LEN: usize = 999;
const DEFAULT_LIMIT: i64 = 999;

#[derive(Error, Debug)]
pub enum FtsError {
    #[error("failed to open FTS database: {0}")]
    Open(#[from] SqliteOpenError),
    #[error("schema setup failed: {0}")]
    Schema(#[source] sqlx::Error),
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: crate::nt::NtReaderError,
    },
    #[error("insert failed: {0}")]
    Insert(#[source] sqlx::Error),
}

pub struct FtsIndex {
    handle: SqliteHandle,
}

impl FtsIndex {
    /// Build a fresh FTS index at `path` from the given `.nt`/`.nt.gz` files.
    /// Commits once per input file.
    pub fn build(path: &Path, files: &[PathBuf]) -> Result<Self, FtsError> {
        let handle = SqliteHandle::open_rw(path)?;
        handle.rt.block_on(create_schema(&handle))?;

        for file in files {
            let mut reader = NtFileReader::open(file).map_err(|source| FtsError::Read {
                path: file.clone(),
                source,
            })?;

            let mut tx = handle
                .rt
                .block_on(handle.pool.begin())
                .map_err(FtsError::Insert)?;

            while let Some(triple) = reader.next() {
                let triple = triple.map_err(|source| FtsError::Read {
                    path: file.clone(),
                    source,
                })?;
                let parts = literal_to_parts(&triple.object);
                if parts.is_null() {
                    continue;
                }
                handle
                    .rt
                    .block_on(
                        sqlx::query(
                            "INSERT INTO literal_index (subject, predicate, object, language, datatype) VALUES (?, ?, ?, ?, ?)",
                        )
                        .bind(&triple.subject)
                        .bind(&triple.predicate)
                        .bind(parts.value.unwrap_or_default())
                        .bind(parts.language)
                        .bind(parts.datatype)
                        .execute(&mut *tx),
                    )
                    .map_err(FtsError::Insert)?;
            }

            handle.rt.block_on(tx.commit()).map_err(FtsError::Insert)?;
            tracing::info!(file = %file.display(), "FTS index: committed file");
        }

        Ok(Self { handle })
    }

    pub fn open(path: &Path) -> Result<Self, FtsError> {
        Ok(Self {
            handle: SqliteHandle::open_ro(path)?,
        })
    }

    /// Search resolver: `{var, literal query, language-filter flag, limit}`.
    pub fn search(&self, var: &str, object_literal: &str, use_language: bool, limit: i64) -> ResolverResult {
        let vars = vec![
            var.to_string(),
            format!("{}Literal", var),
            format!("{}Rank", var),
        ];

        let parts = literal_to_parts(object_literal);
        let Some(value) = parts.value else {
            return ResolverResult::empty(vars);
        };
        let limit = if limit > 0 { limit } else { DEFAULT_LIMIT };

        let rows = self
            .handle
            .rt
            .block_on(run_match(&self.handle, &value, use_language.then(|| parts.language.clone()).flatten().as_deref(), limit));

        let rows = match rows {
            Ok(rows) => rows,
            Err(e) if is_no_such_column(&e) => {
                let phrase = format!("\"{}\"", value);
                match self.handle.rt.block_on(run_match(
                    &self.handle,
                    &phrase,
                    use_language.then(|| parts.language.clone()).flatten().as_deref(),
                    limit,
                )) {
                    Ok(rows) => rows,
                    Err(e) => {
                        tracing::warn!(error = %e, "FTS quoted-phrase retry failed");
                        return ResolverResult::empty(vars);
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "FTS search failed");
                return ResolverResult::empty(vars);
            }
        };

        let results = rows
            .into_iter()
            .map(|(subject, object, language, rank)| {
                let decoded = decode_unicode_escapes(&object);
                let truncated = truncate_with_ellipsis(&decoded, MAX_LITERAL_DISPLAY_LEN);
                let literal_term = match language {
                    Some(lang) if !lang.is_empty() => format!("\"{}\"@{}", truncated, lang),
                    _ => format!("\"{}\"", truncated),
                };
                vec![
                    subject,
                    literal_term,
                    format!("\"{}\"^^xsd:decimal", rank),
                ]
            })
            .collect();

        ResolverResult { results, vars }
    }
}

fn truncate_with_ellipsis(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
    }
}

fn is_no_such_column(e: &sqlx::Error) -> bool {
    e.to_string().contains("no such column")
}

async fn create_schema(handle: &SqliteHandle) -> Result<(), FtsError> {
    sqlx::query(
        "CREATE VIRTUAL TABLE IF NOT EXISTS literal_index USING fts5(
            subject UNINDEXED, predicate UNINDEXED, object, language UNINDEXED, datatype UNINDEXED
        )",
    )
    .execute(&handle.pool)
    .await
    .map_err(FtsError::Schema)?;

    // Best-effort: vocab/spellfix virtual tables depend on extensions that
    // may not be loadable in every environment; their absence degrades
    // spellfix-assisted matching without failing the build (§6).
    let _ = sqlx::query(
        "CREATE VIRTUAL TABLE IF NOT EXISTS literal_index_vocab USING fts5vocab(literal_index, 'row')",
    )
    .execute(&handle.pool)
    .await;

    let _ = sqlx::query(
        "CREATE VIRTUAL TABLE IF NOT EXISTS literal_index_spellfix USING spellfix1",
    )
    .execute(&handle.pool)
    .await;

    sqlx::query(
        "CREATE TABLE IF NOT EXISTS metadata (key TEXT PRIMARY KEY, value TEXT NOT NULL)",
    )
    .execute(&handle.pool)
    .await
    .map_err(FtsError::Schema)?;

    sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES ('schema_version', '1')")
        .execute(&handle.pool)
        .await
        .map_err(FtsError::Schema)?;

    Ok(())
}

type Row4 = (String, String, Option<String>, f64);

async fn run_match(
    handle: &SqliteHandle,
    match_expr: &str,
    language: Option<&str>,
    limit: i64,
) -> Result<Vec<Row4>, sqlx::Error> {
    let rows = if let Some(lang) = language {
        sqlx::query(
            "SELECT subject, object, language, rank FROM literal_index
             WHERE object MATCH ? AND language = ?
             ORDER BY rank LIMIT ?",
        )
        .bind(match_expr)
        .bind(lang)
        .bind(limit)
        .fetch_all(&handle.pool)
        .await?
    } else {
        sqlx::query(
            "SELECT subject, object, language, rank FROM literal_index
             WHERE object MATCH ?
             ORDER BY rank LIMIT ?",
        )
        .bind(match_expr)
        .bind(limit)
        .fetch_all(&handle.pool)
        .await?
    };

    Ok(rows
        .into_iter()
        .map(|row| {
            (
                row.get::<String, _>("subject"),
                row.get::<String, _>("object"),
                row.get::<Option<String>, _>("language"),
                row.get::<f64, _>("rank"),
            )
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn builds_and_searches_literal() {
        let dir = tempfile::tempdir().unwrap();
        let nt = write_fixture(
            dir.path(),
            "fixture.nt",
            &[r#"<http://ex/CheeseyPizza> <http://ex/name> "PizzaComQueijo"@pt ."#],
        );
        let db_path = dir.path().join("fts.sqlite");
        let index = FtsIndex::build(&db_path, &[nt]).unwrap();

        let result = index.search("?var", "\"PizzaComQueijo\"", false, 999);
        assert_eq!(result.vars, vec!["?var", "?varLiteral", "?varRank"]);
        assert_eq!(result.results.len(), 1);
        assert_eq!(result.results[0][0], "<http://ex/CheeseyPizza>");
        assert!(result.results[0][1].contains("PizzaComQueijo"));
        assert!(result.results[0][1].ends_with("@pt"));
    }

    #[test]
    fn language_mismatch_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let nt = write_fixture(
            dir.path(),
            "fixture.nt",
            &[r#"<http://ex/CheeseyPizza> <http://ex/name> "PizzaComQueijo"@pt ."#],
        );
        let db_path = dir.path().join("fts.sqlite");
        let index = FtsIndex::build(&db_path, &[nt]).unwrap();

        let result = index.search("?var", "\"PizzaComQueijo\"@gr", true, 999);
        assert!(result.results.is_empty());
    }

    #[test]
    fn non_literal_query_yields_empty() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("fts.sqlite");
        let index = FtsIndex::build(&db_path, &[]).unwrap();
        let result = index.search("?var", "not a literal", false, 999);
        assert!(result.results.is_empty());
    }
}
