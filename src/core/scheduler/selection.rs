//! Selection strategies over the eligible set
//!
//! Every function takes a non-empty candidate slice; the scheduler
//! guarantees non-emptiness before dispatching here.

use crate::core::registry::NodeRuntime;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Smallest in-flight count; ties broken by highest health score, then
/// lowest observed recent latency
pub fn least_loaded(candidates: &[Arc<NodeRuntime>]) -> Arc<NodeRuntime> {
    let selected = candidates
        .iter()
        .min_by(|a, b| {
            let (an, bn) = (a.snapshot(), b.snapshot());
            a.in_flight()
                .cmp(&b.in_flight())
                .then(bn.health_score.cmp(&an.health_score))
                .then(a.recent_latency_ms().cmp(&b.recent_latency_ms()))
        })
        .expect("non-empty candidate set")
        .clone();
    debug!(
        node = %selected.snapshot().id,
        in_flight = selected.in_flight(),
        "least-loaded selection"
    );
    selected
}

/// Per-model rotating index, sampled modulo the set size at decision time
pub fn round_robin(candidates: &[Arc<NodeRuntime>], counter: &AtomicUsize) -> Arc<NodeRuntime> {
    let index = counter.fetch_add(1, Ordering::Relaxed) % candidates.len();
    debug!(index, "round-robin selection");
    candidates[index].clone()
}

/// Probability proportional to 1 / (observed_latency_ms + epsilon)
pub fn weighted_latency(candidates: &[Arc<NodeRuntime>]) -> Arc<NodeRuntime> {
    const EPSILON: f64 = 1.0;

    let weights: Vec<f64> = candidates
        .iter()
        .map(|rt| 1.0 / (rt.recent_latency_ms() as f64 + EPSILON))
        .collect();
    let total: f64 = weights.iter().sum();

    use rand::Rng;
    let mut rng = rand::thread_rng();
    let mut roll = rng.gen_range(0.0..1.0) * total;

    for (candidate, weight) in candidates.iter().zip(&weights) {
        roll -= weight;
        if roll <= 0.0 {
            debug!(node = %candidate.snapshot().id, weight, "weighted-latency selection");
            return candidate.clone();
        }
    }
    candidates[candidates.len() - 1].clone()
}

/// Uniform random
pub fn random(candidates: &[Arc<NodeRuntime>]) -> Arc<NodeRuntime> {
    use rand::Rng;
    let index = rand::thread_rng().gen_range(0..candidates.len());
    candidates[index].clone()
}
