//! Random matching baseline. A fixed policy: it never learns.

use knexa_core::ParticipantPair;
use rand::seq::SliceRandom;
use rand::Rng;

/// Shuffle participant indices and pair consecutive entries, giving
/// `min(k, n / 2)` disjoint pairs.
pub fn random_matching<R: Rng>(
    num_participants: usize,
    k: usize,
    rng: &mut R,
) -> Vec<ParticipantPair> {
    let mut perm: Vec<usize> = (0..num_participants).collect();
    perm.shuffle(rng);
    perm.chunks_exact(2)
        .take(k)
        .map(|c| ParticipantPair::new(c[0], c[1]))
        .collect()
}
