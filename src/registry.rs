//! The resolver capability contract and the predicate registry that maps
//! virtual-predicate tokens to resolver instances.
//!
//! The registry is built by the caller and passed by reference into each
//! `Rewriter::rewrite` call — it is never held as global state (see
//! DESIGN.md, "Global state → dependency injection").

use std::collections::HashMap;
use std::sync::Arc;

use crate::bloomtyper::BloomtyperChecker;
use crate::fts::FtsIndex;
use crate::rdf2vec::Rdf2VecIndex;

/// Output of a resolver call: one row per binding, each row having exactly
/// `vars.len()` SPARQL-syntactically-valid terms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolverResult {
    pub results: Vec<Vec<String>>,
    pub vars: Vec<String>,
}

impl ResolverResult {
    pub fn empty(vars: Vec<String>) -> Self {
        Self {
            results: Vec::new(),
            vars,
        }
    }
}

/// The `(var_name, object) -> {results, vars}` capability, modeled as a sum
/// type over the three built-in resolver kinds plus a generic escape hatch
/// for ad-hoc callers (see SPEC_FULL.md §6 resolver contract / §9 "capability
/// contract").
#[derive(Clone)]
pub enum Resolver {
    Literal(Arc<FtsIndex>),
    Vector(Arc<Rdf2VecIndex>),
    Membership(Arc<BloomtyperChecker>),
    External(Arc<dyn Fn(&str, &str) -> ResolverResult + Send + Sync>),
}

impl Resolver {
    /// Invoke the resolver. Never returns an `Err` — engine/resolver errors
    /// degrade to an empty `ResolverResult` per the error-handling design;
    /// callers that need to distinguish "empty because no match" from
    /// "empty because of an error" should consult the component's own logs.
    pub fn resolve(&self, var: &str, object: &str) -> ResolverResult {
        match self {
            Resolver::Literal(fts) => fts.search(var, object, false, 999),
            Resolver::Vector(rdf2vec) => rdf2vec.search(var, object, 20),
            Resolver::Membership(checker) => {
                let classes = checker.classes_of(object);
                ResolverResult {
                    results: classes.into_iter().map(|c| vec![c]).collect(),
                    vars: vec![var.to_string()],
                }
            }
            Resolver::External(f) => f(var, object),
        }
    }
}

/// Maps a bare predicate token (no angle brackets; may be a prefixed name
/// like `fizzy:fts` or a full IRI) to the resolver invoked for patterns
/// using that predicate.
#[derive(Clone, Default)]
pub struct PredicateRegistry {
    resolvers: HashMap<String, Resolver>,
}

impl PredicateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, predicate: impl Into<String>, resolver: Resolver) -> &mut Self {
        self.resolvers.insert(predicate.into(), resolver);
        self
    }

    pub fn get(&self, predicate: &str) -> Option<&Resolver> {
        self.resolvers.get(predicate)
    }

    pub fn is_empty(&self) -> bool {
        self.resolvers.is_empty()
    }

    pub fn len(&self) -> usize {
        self.resolvers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn external_resolver_round_trips() {
        let mut registry = PredicateRegistry::new();
        registry.register(
            "fizzy:echo",
            Resolver::External(Arc::new(|var, object| ResolverResult {
                results: vec![vec![object.to_string()]],
                vars: vec![var.to_string()],
            })),
        );

        let resolver = registry.get("fizzy:echo").unwrap();
        let result = resolver.resolve("?s", "<http://ex/Foo>");
        assert_eq!(result.vars, vec!["?s".to_string()]);
        assert_eq!(result.results, vec![vec!["<http://ex/Foo>".to_string()]]);
    }

    #[test]
    fn unregistered_predicate_is_absent() {
        let registry = PredicateRegistry::new();
        assert!(registry.get("fizzy:fts").is_none());
        assert!(registry.is_empty());
    }
}
