//! Skip-gram-with-negative-sampling embedding trainer.
//!
//! No crate in the corpus provides word2vec-style training, so this is
//! hand-rolled: a shared embedding table with one `RwLock` per vocabulary
//! entry lets `rayon` update disjoint words concurrently without a single
//! global lock serializing every gradient step.

use std::collections::HashMap;
use std::sync::RwLock;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

pub const VECTOR_SIZE: usize = 100;
pub const WINDOW: usize = 5;
pub const MIN_COUNT: usize = 1;
const NEGATIVE_SAMPLES: usize = 5;
const EPOCHS: usize = 5;
const LEARNING_RATE: f32 = 0.025;

/// Train embeddings for every distinct token seen in `walks` (at least
/// `MIN_COUNT` times) and return the `target`-side vectors, keyed by token.
pub fn train(walks: &[Vec<String>]) -> HashMap<String, Vec<f32>> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for walk in walks {
        for token in walk {
            *counts.entry(token.as_str()).or_insert(0) += 1;
        }
    }

    let vocab: Vec<String> = counts
        .into_iter()
        .filter(|(_, count)| *count >= MIN_COUNT)
        .map(|(token, _)| token.to_string())
        .collect();
    if vocab.is_empty() {
        return HashMap::new();
    }

    let vocab_index: HashMap<&str, usize> = vocab.iter().enumerate().map(|(i, t)| (t.as_str(), i)).collect();

    let target_vectors: Vec<RwLock<Vec<f32>>> = (0..vocab.len())
        .map(|i| RwLock::new(init_vector(i as u64)))
        .collect();
    let context_vectors: Vec<RwLock<Vec<f32>>> = (0..vocab.len())
        .map(|i| RwLock::new(init_vector(i as u64 + 0x9E37_79B9)))
        .collect();

    // Pre-resolve each walk to vocabulary indices once; skip tokens that
    // didn't meet MIN_COUNT (never happens with MIN_COUNT=1, but the lookup
    // stays honest for other thresholds).
    let encoded_walks: Vec<Vec<usize>> = walks
        .iter()
        .map(|walk| walk.iter().filter_map(|t| vocab_index.get(t.as_str()).copied()).collect())
        .collect();

    for epoch in 0..EPOCHS {
        encoded_walks.par_iter().enumerate().for_each(|(walk_idx, indices)| {
            let mut rng = StdRng::seed_from_u64((epoch as u64) << 32 | walk_idx as u64);
            for (pos, &target) in indices.iter().enumerate() {
                let window_start = pos.saturating_sub(WINDOW);
                let window_end = (pos + WINDOW + 1).min(indices.len());
                for &context in &indices[window_start..window_end] {
                    if context == target {
                        continue;
                    }
                    train_pair(target, context, &target_vectors, &context_vectors, vocab.len(), &mut rng);
                }
            }
        });
        tracing::debug!(epoch, vocab_size = vocab.len(), walks = walks.len(), "rdf2vec training epoch complete");
    }

    vocab
        .into_iter()
        .zip(target_vectors.into_iter())
        .map(|(token, lock)| (token, lock.into_inner().unwrap()))
        .collect()
}

fn init_vector(seed: u64) -> Vec<f32> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..VECTOR_SIZE).map(|_| (rng.gen::<f32>() - 0.5) / VECTOR_SIZE as f32).collect()
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

fn train_pair(
    target: usize,
    context: usize,
    target_vectors: &[RwLock<Vec<f32>>],
    context_vectors: &[RwLock<Vec<f32>>],
    vocab_size: usize,
    rng: &mut StdRng,
) {
    let mut target_grad = vec![0.0f32; VECTOR_SIZE];

    {
        let target_vec = target_vectors[target].read().unwrap();
        let mut ctx_vec = context_vectors[context].write().unwrap();
        update_pair(&target_vec, &mut ctx_vec, &mut target_grad, 1.0);
        drop(target_vec);
        drop(ctx_vec);
    }

    for _ in 0..NEGATIVE_SAMPLES {
        let negative = rng.gen_range(0..vocab_size);
        if negative == target || negative == context {
            continue;
        }
        let target_vec = target_vectors[target].read().unwrap();
        let mut neg_vec = context_vectors[negative].write().unwrap();
        update_pair(&target_vec, &mut neg_vec, &mut target_grad, 0.0);
    }

    let mut target_vec = target_vectors[target].write().unwrap();
    for (v, g) in target_vec.iter_mut().zip(target_grad.iter()) {
        *v += g;
    }
}

/// One negative-sampling update: nudges `other_vec` toward/away from
/// `target_vec` per `label` (1.0 = positive pair, 0.0 = negative sample),
/// accumulating the corresponding gradient for the target vector itself.
fn update_pair(target_vec: &[f32], other_vec: &mut [f32], target_grad: &mut [f32], label: f32) {
    let dot: f32 = target_vec.iter().zip(other_vec.iter()).map(|(a, b)| a * b).sum();
    let error = (label - sigmoid(dot)) * LEARNING_RATE;
    for i in 0..VECTOR_SIZE {
        target_grad[i] += error * other_vec[i];
        other_vec[i] += error * target_vec[i];
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trains_embeddings_for_every_token() {
        let walks = vec![
            vec!["A".to_string(), "p".to_string(), "B".to_string()],
            vec!["B".to_string(), "p".to_string(), "C".to_string()],
            vec!["C".to_string(), "p".to_string(), "A".to_string()],
        ];
        let embeddings = train(&walks);
        assert_eq!(embeddings.len(), 4); // A, B, C, p
        for vector in embeddings.values() {
            assert_eq!(vector.len(), VECTOR_SIZE);
            assert!(vector.iter().all(|v| v.is_finite()));
        }
    }

    #[test]
    fn empty_walks_yield_empty_vocab() {
        let embeddings = train(&[]);
        assert!(embeddings.is_empty());
    }
}
