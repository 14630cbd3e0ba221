//! Synthetic ground truth: fixed participant contexts and a hidden unit-norm
//! weight vector `w*` over concatenated pair features.

use knexa_core::{KnexaError, KnexaResult, ParticipantPair, ScoredPair};
use knexa_cpm::matching::{concat_pair, enumerate_pairs, greedy_disjoint, rank_descending};
use ndarray::{Array1, Array2, ArrayView2, Axis};
use rand::Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Amplitude of the per-participant sinusoidal structure.
const SINE_AMPLITUDE: f64 = 0.25;
/// Guards the per-participant standardization against zero variance.
const STD_EPSILON: f64 = 1e-6;

/// Greedy disjoint matching on true means; the regret reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OracleMatching {
    pub pairs: Vec<ParticipantPair>,
    pub value: f64,
}

#[derive(Debug, Clone)]
pub struct SyntheticWorld {
    w_star: Array1<f64>,
    contexts: Array2<f64>,
}

impl SyntheticWorld {
    /// Draw `w*` first, then the `n × d` context matrix, from the same RNG.
    pub fn generate<R: Rng>(
        num_participants: usize,
        participant_dim: usize,
        rng: &mut R,
    ) -> KnexaResult<Self> {
        if participant_dim == 0 {
            return Err(KnexaError::Config(
                "participant_dim must be at least 1".to_string(),
            ));
        }

        let mut w_star: Array1<f64> =
            (0..2 * participant_dim).map(|_| rng.sample(StandardNormal)).collect();
        let norm = w_star.dot(&w_star).sqrt();
        if norm > 0.0 {
            w_star /= norm;
        }

        let mut contexts = Array2::<f64>::zeros((num_participants, participant_dim));
        for v in contexts.iter_mut() {
            *v = rng.sample(StandardNormal);
        }

        let step = if participant_dim > 1 {
            2.0 * std::f64::consts::PI / (participant_dim - 1) as f64
        } else {
            0.0
        };
        for (i, mut row) in contexts.axis_iter_mut(Axis(0)).enumerate() {
            for (t, v) in row.iter_mut().enumerate() {
                *v += SINE_AMPLITUDE * (step * t as f64 + i as f64).sin();
            }
            let mean = row.mean().unwrap_or(0.0);
            let std = row.std(0.0);
            row.mapv_inplace(|v| (v - mean) / (std + STD_EPSILON));
        }

        Ok(Self { w_star, contexts })
    }

    /// Build a world from explicit parts.
    pub fn from_parts(w_star: Array1<f64>, contexts: Array2<f64>) -> KnexaResult<Self> {
        KnexaError::check_dim(2 * contexts.ncols(), w_star.len())?;
        Ok(Self { w_star, contexts })
    }

    pub fn num_participants(&self) -> usize {
        self.contexts.nrows()
    }

    pub fn participant_dim(&self) -> usize {
        self.contexts.ncols()
    }

    pub fn contexts(&self) -> ArrayView2<'_, f64> {
        self.contexts.view()
    }

    pub fn w_star(&self) -> &Array1<f64> {
        &self.w_star
    }

    pub fn pair_vector(&self, pair: ParticipantPair) -> Array1<f64> {
        concat_pair(self.contexts.row(pair.i), self.contexts.row(pair.j))
    }

    /// Expected reward `w*ᵀ[ctx_i, ctx_j]`.
    pub fn true_mean(&self, pair: ParticipantPair) -> f64 {
        self.w_star.dot(&self.pair_vector(pair))
    }

    /// Sum of true means over `pairs`.
    pub fn matching_value(&self, pairs: &[ParticipantPair]) -> f64 {
        pairs.iter().map(|&p| self.true_mean(p)).sum()
    }

    pub fn oracle(&self, k: usize) -> OracleMatching {
        let mut ranked: Vec<ScoredPair> = enumerate_pairs(self.num_participants())
            .map(|pair| {
                let mean = self.true_mean(pair);
                ScoredPair {
                    pair,
                    mean,
                    bonus: 0.0,
                    ucb: mean,
                }
            })
            .collect();
        rank_descending(&mut ranked);
        let pairs = greedy_disjoint(ranked.iter().map(|s| s.pair), k);
        let value = self.matching_value(&pairs);
        OracleMatching { pairs, value }
    }
}
