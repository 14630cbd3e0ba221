//! Pair enumeration and greedy disjoint selection.
//!
//! Used by the bandit on UCB scores and by the simulation oracle on true
//! means, so both sides of a regret comparison run the same selection rule.

use knexa_core::{ParticipantPair, ScoredPair};
use ndarray::{Array1, ArrayView1};

/// All unordered pairs `(i, j)` with `i < j < n`, in lexicographic order.
pub fn enumerate_pairs(n: usize) -> impl Iterator<Item = ParticipantPair> {
    (0..n).flat_map(move |i| ((i + 1)..n).map(move |j| ParticipantPair::new(i, j)))
}

/// Number of candidate pairs for `n` participants.
pub fn pair_count(n: usize) -> usize {
    n * n.saturating_sub(1) / 2
}

/// Concatenated pair feature vector `[a, b]`.
pub fn concat_pair(a: ArrayView1<f64>, b: ArrayView1<f64>) -> Array1<f64> {
    a.iter().chain(b.iter()).copied().collect()
}

/// Stable sort by `ucb`, highest first. Equal scores keep their input order.
pub fn rank_descending(candidates: &mut [ScoredPair]) {
    candidates.sort_by(|a, b| b.ucb.total_cmp(&a.ucb));
}

/// Walk `ranked` in order and keep each pair whose participants are both
/// still free, stopping after `k` pairs.
pub fn greedy_disjoint<I>(ranked: I, k: usize) -> Vec<ParticipantPair>
where
    I: IntoIterator<Item = ParticipantPair>,
{
    // `k` is caller-supplied and may far exceed the participants available.
    let mut chosen: Vec<ParticipantPair> = Vec::new();
    if k == 0 {
        return chosen;
    }

    let mut used: Vec<bool> = Vec::new();
    for pair in ranked {
        let hi = pair.i.max(pair.j);
        if used.len() <= hi {
            used.resize(hi + 1, false);
        }
        if pair.i == pair.j || used[pair.i] || used[pair.j] {
            continue;
        }
        used[pair.i] = true;
        used[pair.j] = true;
        chosen.push(pair);
        if chosen.len() >= k {
            break;
        }
    }
    chosen
}

/// True when no participant index appears in more than one pair.
pub fn is_disjoint(pairs: &[ParticipantPair]) -> bool {
    let mut seen = std::collections::HashSet::new();
    pairs
        .iter()
        .all(|p| p.i != p.j && seen.insert(p.i) && seen.insert(p.j))
}
