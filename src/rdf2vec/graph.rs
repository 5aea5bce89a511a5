//! Graph construction and random-walk generation over the triple store.

use std::collections::HashMap;
use std::path::PathBuf;

use petgraph::graph::{NodeIndex, UnGraph};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use xxhash_rust::xxh3::xxh3_64;

use crate::nt::NtFileReader;
use crate::triple::Triple;

use super::Rdf2VecError;

pub const WALKS_PER_NODE: usize = 100;
pub const WALK_LENGTH: usize = 15;

/// Undirected entity graph: nodes are subject/object URIs, edge weights are
/// predicate IRIs. Blank nodes and literal objects never become nodes.
pub struct EntityGraph {
    pub graph: UnGraph<String, String>,
    /// Dense node id, assigned in first-seen order across the input.
    pub nodemap: HashMap<String, NodeIndex>,
}

/// A stable per-node hash, used only to seed that node's walk RNG so walk
/// generation is reproducible across runs regardless of hash-map iteration
/// order.
pub fn node_hash(uri: &str) -> u64 {
    xxh3_64(uri.as_bytes())
}

pub fn build_graph(files: &[PathBuf]) -> Result<EntityGraph, Rdf2VecError> {
    let mut graph = UnGraph::<String, String>::new_undirected();
    let mut nodemap: HashMap<String, NodeIndex> = HashMap::new();

    let mut get_or_insert = |graph: &mut UnGraph<String, String>, nodemap: &mut HashMap<String, NodeIndex>, uri: &str| -> NodeIndex {
        if let Some(&idx) = nodemap.get(uri) {
            idx
        } else {
            let idx = graph.add_node(uri.to_string());
            nodemap.insert(uri.to_string(), idx);
            idx
        }
    };

    for file in files {
        let reader = NtFileReader::open(file).map_err(|source| Rdf2VecError::Read {
            path: file.clone(),
            source,
        })?;
        for triple in reader {
            let triple: Triple = triple.map_err(|source| Rdf2VecError::Read {
                path: file.clone(),
                source,
            })?;
            if !Triple::is_iri(&triple.object) {
                continue;
            }
            let s = get_or_insert(&mut graph, &mut nodemap, &triple.subject);
            let o = get_or_insert(&mut graph, &mut nodemap, &triple.object);
            graph.add_edge(s, o, triple.predicate);
        }
    }

    Ok(EntityGraph { graph, nodemap })
}

/// Generate `WALKS_PER_NODE` walks of up to `WALK_LENGTH` node-tokens from
/// every node that has at least one edge. Each walk alternates node URI and
/// traversed predicate IRI, the standard RDF2Vec "sentence" shape fed to the
/// skip-gram trainer.
pub fn random_walks(entity_graph: &EntityGraph) -> Vec<Vec<String>> {
    let EntityGraph { graph, nodemap } = entity_graph;
    let mut walks = Vec::new();

    for (uri, &start) in nodemap {
        if graph.neighbors(start).next().is_none() {
            continue;
        }
        let mut rng = StdRng::seed_from_u64(node_hash(uri));
        for _ in 0..WALKS_PER_NODE {
            walks.push(walk_from(graph, start, WALK_LENGTH, &mut rng));
        }
    }

    walks
}

fn walk_from(graph: &UnGraph<String, String>, start: NodeIndex, length: usize, rng: &mut StdRng) -> Vec<String> {
    let mut walk = Vec::with_capacity(length * 2);
    walk.push(graph[start].clone());

    let mut current = start;
    for _ in 0..length {
        let edges: Vec<_> = graph.edges(current).collect();
        if edges.is_empty() {
            break;
        }
        let chosen = &edges[rng.gen_range(0..edges.len())];
        walk.push(chosen.weight().clone());
        let next = chosen.target();
        walk.push(graph[next].clone());
        current = next;
    }

    walk
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_fixture(dir: &std::path::Path, lines: &[&str]) -> PathBuf {
        let path = dir.join("fixture.nt");
        let mut f = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(f, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn builds_graph_from_type_triples() {
        let dir = tempfile::tempdir().unwrap();
        let nt = write_fixture(
            dir.path(),
            &[
                r#"<http://ex/A> <http://ex/near> <http://ex/B> ."#,
                r#"<http://ex/B> <http://ex/near> <http://ex/C> ."#,
                r#"<http://ex/A> <http://ex/name> "literal, not a node" ."#,
            ],
        );
        let entity_graph = build_graph(&[nt]).unwrap();
        assert_eq!(entity_graph.nodemap.len(), 3);
        assert_eq!(entity_graph.graph.edge_count(), 2);
    }

    #[test]
    fn walks_are_reproducible_for_same_node() {
        let dir = tempfile::tempdir().unwrap();
        let nt = write_fixture(
            dir.path(),
            &[
                r#"<http://ex/A> <http://ex/near> <http://ex/B> ."#,
                r#"<http://ex/B> <http://ex/near> <http://ex/C> ."#,
                r#"<http://ex/C> <http://ex/near> <http://ex/A> ."#,
            ],
        );
        let entity_graph = build_graph(&[nt]).unwrap();
        let walks_a = random_walks(&entity_graph);
        let walks_b = random_walks(&entity_graph);
        assert_eq!(walks_a, walks_b);
        assert!(!walks_a.is_empty());
        for walk in &walks_a {
            assert!(walk.len() <= WALK_LENGTH * 2 + 1);
        }
    }

    #[test]
    fn isolated_node_has_no_walks_beyond_itself() {
        let dir = tempfile::tempdir().unwrap();
        let nt = write_fixture(dir.path(), &[r#"<http://ex/A> <http://ex/name> "solo" ."#]);
        let entity_graph = build_graph(&[nt]).unwrap();
        // "solo" is a literal, not a node, so A has no edges and produces no walks.
        let walks = random_walks(&entity_graph);
        assert!(walks.is_empty());
    }
}
