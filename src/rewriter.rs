//! SPARQL query rewriting: locate triple patterns whose predicate is
//! registered, invoke the matching resolver, and splice the resulting
//! bindings back into the query text as a `VALUES` block.

use std::fmt;

use once_cell::sync::OnceCell;
use thiserror::Error;
use tree_sitter::StreamingIterator;

use crate::registry::{PredicateRegistry, ResolverResult};

/// Node kinds follow the W3C SPARQL 1.1 grammar's own rule names, which
/// `tree-sitter-sparql` keeps verbatim as its CST node kinds.
const CAPTURE_QUERY: &str = r#"
(_
  (TriplesSameSubjectPath
    (Var) @var
    (PropertyListPathNotEmpty
      (VerbPath
        (Path
          (PathPrimary
            [
              (iri) @predicate
              (PrefixedName) @predicate_prefix
            ])))
      (ObjectListPath
        (ObjectPath
          (GraphNodePath
            (VarOrTerm
              (GraphTerm
                [
                  (RDFLiteral) @q_object_literal
                  (iri) @q_object_iri
                ])))))))
  @tss
  "."? @tss_dot)
"#;

#[derive(Error, Debug)]
pub enum RewriterError {
    #[error("failed to attach SPARQL grammar: {0}")]
    Grammar(#[source] tree_sitter::LanguageError),
    #[error("failed to compile capture query: {0}")]
    QueryCompile(#[source] tree_sitter::QueryError),
    #[error("failed to parse query text")]
    ParseFailed,
    #[error("rewritten query is not valid UTF-8")]
    InvalidOutput,
}

/// The kind of top-level SPARQL query form, or `Null` if none was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Construct,
    Ask,
    Describe,
    Null,
}

impl fmt::Display for QueryType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            QueryType::Select => "select",
            QueryType::Construct => "construct",
            QueryType::Ask => "ask",
            QueryType::Describe => "describe",
            QueryType::Null => "null",
        };
        f.write_str(s)
    }
}

/// Output of one rewrite call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RewriteResult {
    pub query: String,
    pub rewritten: String,
    pub comments: Vec<String>,
    pub query_type: QueryType,
}

struct MatchRecord {
    start: usize,
    end: usize,
    var: String,
    predicate: String,
    object: String,
}

/// Parses SPARQL queries with a tree-sitter grammar loaded once at
/// construction; safe to share by reference across requests (read-only
/// after construction, mirroring the corpus's `Parser`).
pub struct Rewriter {
    language: tree_sitter::Language,
    query: OnceCell<tree_sitter::Query>,
}

impl Rewriter {
    pub fn new() -> Result<Self, RewriterError> {
        let language = tree_sitter::Language::from(tree_sitter_sparql::LANGUAGE);
        Ok(Self {
            language,
            query: OnceCell::new(),
        })
    }

    fn get_query(&self) -> Result<&tree_sitter::Query, RewriterError> {
        self.query
            .get_or_try_init(|| tree_sitter::Query::new(&self.language, CAPTURE_QUERY).map_err(RewriterError::QueryCompile))
    }

    /// Parse `query`, find every triple pattern whose predicate is a key in
    /// `registry`, and replace each matched byte range with a `VALUES`
    /// block built from the resolver's output. Bytes outside matched
    /// ranges are copied verbatim.
    pub fn rewrite(&self, query: &str, registry: &PredicateRegistry) -> Result<RewriteResult, RewriterError> {
        let mut parser = tree_sitter::Parser::new();
        parser.set_language(&self.language).map_err(RewriterError::Grammar)?;
        let tree = parser.parse(query, None).ok_or(RewriterError::ParseFailed)?;
        let root = tree.root_node();
        let source = query.as_bytes();

        let query_type = classify_query_type(root);
        let comments = collect_comments(root, source);

        let ts_query = self.get_query()?;
        let capture_names = ts_query.capture_names();
        let mut cursor = tree_sitter::QueryCursor::new();
        let mut matches = cursor.matches(ts_query, root, source);

        let mut records = Vec::new();
        while let Some(m) = matches.next() {
            if let Some(record) = build_record(m, capture_names, source) {
                records.push(record);
            }
        }
        // Cursor order across alternated/quantified captures is not
        // guaranteed to follow byte order; sort defensively so splicing
        // always walks the query left to right.
        records.sort_by_key(|r| r.start);

        let mut rewritten: Vec<u8> = Vec::with_capacity(source.len());
        let mut pos = 0usize;
        for record in &records {
            let Some(resolver) = registry.get(&record.predicate) else {
                continue;
            };
            if record.start < pos {
                continue;
            }
            rewritten.extend_from_slice(&source[pos..record.start]);
            let result = resolver.resolve(&record.var, &record.object);
            rewritten.extend_from_slice(values_block(&result).as_bytes());
            pos = record.end;
        }
        rewritten.extend_from_slice(&source[pos..]);

        let rewritten = String::from_utf8(rewritten).map_err(|_| RewriterError::InvalidOutput)?;

        Ok(RewriteResult {
            query: query.to_string(),
            rewritten,
            comments,
            query_type,
        })
    }
}

fn build_record(m: &tree_sitter::QueryMatch, names: &[&str], source: &[u8]) -> Option<MatchRecord> {
    let mut start = None;
    let mut end = None;
    let mut var = None;
    let mut predicate = None;
    let mut object = None;

    for capture in m.captures {
        let name = names[capture.index as usize];
        let node = capture.node;
        let text = node.utf8_text(source).ok()?;
        match name {
            "tss" => {
                start = Some(node.start_byte());
                end = Some(node.end_byte());
            }
            "tss_dot" => end = Some(node.end_byte()),
            "var" => var = Some(text.to_string()),
            "predicate" => predicate = Some(text.trim_start_matches('<').trim_end_matches('>').to_string()),
            "predicate_prefix" => predicate = Some(text.to_string()),
            "q_object_literal" | "q_object_iri" => object = Some(text.to_string()),
            _ => {}
        }
    }

    Some(MatchRecord {
        start: start?,
        end: end?,
        var: var?,
        predicate: predicate?,
        object: object?,
    })
}

fn classify_query_type(root: tree_sitter::Node) -> QueryType {
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        let kind = node.kind();
        if kind.eq_ignore_ascii_case("SelectQuery") {
            return QueryType::Select;
        } else if kind.eq_ignore_ascii_case("ConstructQuery") {
            return QueryType::Construct;
        } else if kind.eq_ignore_ascii_case("AskQuery") {
            return QueryType::Ask;
        } else if kind.eq_ignore_ascii_case("DescribeQuery") {
            return QueryType::Describe;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    QueryType::Null
}

fn collect_comments(root: tree_sitter::Node, source: &[u8]) -> Vec<String> {
    let mut found: Vec<(usize, String)> = Vec::new();
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.kind().eq_ignore_ascii_case("comment") {
            if let Ok(text) = node.utf8_text(source) {
                let trimmed = text.trim_start_matches('#').trim_start().trim_end().to_string();
                found.push((node.start_byte(), trimmed));
            }
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    found.sort_by_key(|(start, _)| *start);
    found.into_iter().map(|(_, text)| text).collect()
}

/// Build the `VALUES` block for one matched pattern. Blank-node tokens are
/// filtered out of each row individually (the remaining terms still render,
/// just without the blank node), while a resolver returning a tuple of the
/// wrong arity degrades the whole match to an empty binding set rather than
/// emitting a malformed query.
fn values_block(result: &ResolverResult) -> String {
    let vars = &result.vars;

    let degraded = result.results.iter().any(|row| row.len() != vars.len());
    if degraded {
        tracing::warn!(expected = vars.len(), "resolver returned a tuple with mismatched arity, degrading match to empty bindings");
    }

    let rows: Vec<Vec<String>> = if degraded {
        Vec::new()
    } else {
        result
            .results
            .iter()
            .map(|row| row.iter().filter(|term| !term.starts_with("_:")).cloned().collect())
            .collect()
    };

    let mut out = String::new();
    if vars.len() == 1 {
        out.push_str(&format!("VALUES {} {{\n", vars[0]));
        for row in &rows {
            out.push_str(&row.join(" "));
            out.push('\n');
        }
        out.push('}');
    } else {
        out.push_str(&format!("VALUES ({})\n{{", vars.join(" ")));
        if rows.is_empty() {
            out.push('\n');
        } else {
            for row in &rows {
                out.push('(');
                out.push_str(&row.join(" "));
                out.push_str(")\n");
            }
        }
        out.push('}');
    }
    out
}
