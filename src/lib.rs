//! # fizzquery
//!
//! Rewrites SPARQL triple patterns that use non-standard "virtual"
//! predicates into standard `VALUES` blocks, by dispatching each matched
//! pattern to a pluggable resolver.
//!
//! Three resolvers ship with the crate: a full-text literal search over an
//! FTS5 index ([`fts`]), an approximate `rdf:type` membership check backed
//! by per-class Bloom filters ([`bloomtyper`]), and a graph-embedding
//! nearest-neighbour search ([`rdf2vec`]). A query is never executed by this
//! crate — only rewritten; the caller hands the rewritten text to its own
//! triple store.
//!
//! ## Quick start
//!
//! ```no_run
//! use fizzquery::registry::{PredicateRegistry, Resolver};
//! use fizzquery::rewriter::Rewriter;
//! use fizzquery::fts::FtsIndex;
//! use std::sync::Arc;
//!
//! # fn main() -> anyhow::Result<()> {
//! let fts = Arc::new(FtsIndex::open(std::path::Path::new("fts.sqlite"))?);
//! let mut registry = PredicateRegistry::new();
//! registry.register("fizzy:fts", Resolver::Literal(fts));
//!
//! let rewriter = Rewriter::new()?;
//! let result = rewriter.rewrite(
//!     r#"SELECT ?s WHERE { ?s <fizzy:fts> "pizza" . }"#,
//!     &registry,
//! )?;
//! println!("{}", result.rewritten);
//! # Ok(())
//! # }
//! ```

pub mod ann;
pub mod bloomtyper;
pub mod fts;
pub mod index;
pub mod ingest;
pub mod literal;
pub(crate) mod math;
pub mod nt;
pub mod rdf2vec;
pub mod registry;
pub mod rewriter;
pub mod sqlite;
pub mod triple;

pub use index::{IndexResult, VectorIndex};
pub use ingest::{ingest, IngestError, IngestTargets};
pub use registry::{PredicateRegistry, Resolver, ResolverResult};
pub use rewriter::{QueryType, RewriteResult, Rewriter, RewriterError};
pub use triple::Triple;
