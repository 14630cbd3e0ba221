//! Contextual matchmaking bandit — LinUCB over concatenated pair features.
//!
//! One ridge-regression model is shared by every pair. A candidate `(i, j)`
//! is scored on `x = [ctx_i, ctx_j]` as `θᵀx + β·√(xᵀA⁻¹x)` with
//! `β = β₀ / √round`, and a round's matching is the greedy disjoint walk over
//! candidates ranked by that score.

use knexa_core::config::BanditConfig;
use knexa_core::{KnexaError, KnexaResult, ParticipantPair, ScoredPair};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::linalg::Cholesky;
use crate::matching::{concat_pair, enumerate_pairs, greedy_disjoint, pair_count, rank_descending};

/// Which half of the pair vector a model coordinate belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairSide {
    First,
    Second,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureWeight {
    pub side: PairSide,
    /// Coordinate within the participant feature vector.
    pub feature: usize,
    pub weight: f64,
    /// `|weight|` as a share of the total absolute weight.
    pub importance: f64,
}

/// Ridge state `(A, b)` for the pair reward model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairLinUcb {
    participant_dim: usize,
    lambda: f64,
    beta0: f64,
    a: Array2<f64>,
    b: Array1<f64>,
    observations: u64,
}

impl PairLinUcb {
    /// `A = λI`, `b = 0`. Rejects `λ ≤ 0` with `SingularMatrix`.
    pub fn new(config: &BanditConfig) -> KnexaResult<Self> {
        config.validate()?;
        let d = config.pair_dim();
        Ok(Self {
            participant_dim: config.participant_dim,
            lambda: config.lambda,
            beta0: config.beta0,
            a: Array2::eye(d) * config.lambda,
            b: Array1::zeros(d),
            observations: 0,
        })
    }

    /// Pair vector dimension `d`.
    pub fn dim(&self) -> usize {
        self.b.len()
    }

    pub fn participant_dim(&self) -> usize {
        self.participant_dim
    }

    pub fn lambda(&self) -> f64 {
        self.lambda
    }

    pub fn beta0(&self) -> f64 {
        self.beta0
    }

    /// Number of `update` calls applied so far.
    pub fn observations(&self) -> u64 {
        self.observations
    }

    pub fn design_matrix(&self) -> &Array2<f64> {
        &self.a
    }

    pub fn reward_vector(&self) -> &Array1<f64> {
        &self.b
    }

    /// Exploration scale for `round`; rounds below 1 count as 1.
    pub fn beta(&self, round: u32) -> f64 {
        self.beta0 / f64::from(round.max(1)).sqrt()
    }

    fn factor(&self) -> KnexaResult<Cholesky> {
        Cholesky::factor(&self.a)
    }

    /// Point estimate `θ = A⁻¹b`.
    pub fn theta(&self) -> KnexaResult<Array1<f64>> {
        Ok(self.factor()?.solve(self.b.view()))
    }

    /// `ln det A`. Finite for every reachable state since `A` stays positive
    /// definite.
    pub fn log_det(&self) -> KnexaResult<f64> {
        Ok(self.factor()?.log_det())
    }

    /// `(θᵀx, β·√(xᵀA⁻¹x))`
    fn mean_and_bonus(
        chol: &Cholesky,
        theta: &Array1<f64>,
        x: ArrayView1<f64>,
        beta: f64,
    ) -> (f64, f64) {
        (theta.dot(&x), beta * chol.inv_quad_form(x).sqrt())
    }

    fn check_contexts(&self, contexts: &ArrayView2<f64>) -> KnexaResult<()> {
        KnexaError::check_dim(self.participant_dim, contexts.ncols())?;
        if contexts.iter().any(|v| !v.is_finite()) {
            return Err(KnexaError::NonFinite(
                "participant context contains NaN or infinity".to_string(),
            ));
        }
        Ok(())
    }

    /// Score every unordered pair of rows in `contexts` and return them ranked
    /// by UCB, highest first. Ties keep enumeration order.
    pub fn score_candidates(
        &self,
        contexts: ArrayView2<f64>,
        round: u32,
    ) -> KnexaResult<Vec<ScoredPair>> {
        let n = contexts.nrows();
        if n < 2 {
            return Ok(Vec::new());
        }
        self.check_contexts(&contexts)?;

        let chol = self.factor()?;
        let theta = chol.solve(self.b.view());
        let beta = self.beta(round);

        let mut candidates = Vec::with_capacity(pair_count(n));
        for pair in enumerate_pairs(n) {
            let x = concat_pair(contexts.row(pair.i), contexts.row(pair.j));
            let (mean, bonus) = Self::mean_and_bonus(&chol, &theta, x.view(), beta);
            candidates.push(ScoredPair {
                pair,
                mean,
                bonus,
                ucb: mean + bonus,
            });
        }
        rank_descending(&mut candidates);
        Ok(candidates)
    }

    /// Pick up to `k` disjoint pairs of participants (rows of `contexts`).
    ///
    /// Fewer than two participants yields an empty selection. The result can
    /// hold fewer than `k` pairs when participants run out.
    pub fn select_pairs(
        &self,
        contexts: ArrayView2<f64>,
        k: usize,
        round: u32,
    ) -> KnexaResult<Vec<ParticipantPair>> {
        if contexts.nrows() < 2 {
            debug!(
                participants = contexts.nrows(),
                "Fewer than two participants, nothing to match"
            );
            return Ok(Vec::new());
        }

        let candidates = self.score_candidates(contexts, round)?;
        let pairs = greedy_disjoint(candidates.iter().map(|c| c.pair), k);

        debug!(
            participants = contexts.nrows(),
            candidates = candidates.len(),
            k,
            round,
            selected = pairs.len(),
            beta = self.beta(round),
            "Selected matchmaking pairs"
        );
        Ok(pairs)
    }

    /// Rank-1 ridge update: `A += xxᵀ`, `b += reward·x`.
    pub fn update(&mut self, context: ArrayView1<f64>, reward: f64) -> KnexaResult<()> {
        KnexaError::check_dim(self.dim(), context.len())?;
        if !reward.is_finite() {
            return Err(KnexaError::NonFinite(format!("reward {reward}")));
        }
        if context.iter().any(|v| !v.is_finite()) {
            return Err(KnexaError::NonFinite(
                "pair context contains NaN or infinity".to_string(),
            ));
        }

        let d = self.dim();
        for r in 0..d {
            let xr = context[r];
            if xr == 0.0 {
                continue;
            }
            for c in 0..d {
                self.a[[r, c]] += xr * context[c];
            }
        }
        self.b.scaled_add(reward, &context);
        self.observations += 1;

        debug!(
            reward,
            observations = self.observations,
            "Applied pair reward update"
        );
        Ok(())
    }

    /// Update on the concatenated features of `pair` taken from `contexts`.
    pub fn update_pair(
        &mut self,
        contexts: ArrayView2<f64>,
        pair: ParticipantPair,
        reward: f64,
    ) -> KnexaResult<()> {
        let n = contexts.nrows();
        if pair.i == pair.j || pair.i >= n || pair.j >= n {
            return Err(KnexaError::InvalidPair {
                i: pair.i,
                j: pair.j,
                n,
            });
        }
        KnexaError::check_dim(self.participant_dim, contexts.ncols())?;
        let x = concat_pair(contexts.row(pair.i), contexts.row(pair.j));
        self.update(x.view(), reward)
    }

    /// UCB of a single pair vector of length `d`.
    pub fn score(&self, context: ArrayView1<f64>, round: u32) -> KnexaResult<f64> {
        KnexaError::check_dim(self.dim(), context.len())?;
        let chol = self.factor()?;
        let theta = chol.solve(self.b.view());
        let (mean, bonus) = Self::mean_and_bonus(&chol, &theta, context, self.beta(round));
        Ok(mean + bonus)
    }

    /// [`score`](Self::score) at round 1.
    pub fn score_default(&self, context: ArrayView1<f64>) -> KnexaResult<f64> {
        self.score(context, 1)
    }

    /// Per-coordinate view of `θ`, split by pair side.
    pub fn feature_importance(&self) -> KnexaResult<Vec<FeatureWeight>> {
        let theta = self.theta()?;
        let total: f64 = theta.iter().map(|w| w.abs()).sum();
        Ok(theta
            .iter()
            .enumerate()
            .map(|(idx, &weight)| {
                let (side, feature) = if idx < self.participant_dim {
                    (PairSide::First, idx)
                } else {
                    (PairSide::Second, idx - self.participant_dim)
                };
                FeatureWeight {
                    side,
                    feature,
                    weight,
                    importance: if total > 0.0 { weight.abs() / total } else { 0.0 },
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::is_disjoint;
    use ndarray::{array, Array2};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn bandit(participant_dim: usize, lambda: f64, beta0: f64) -> PairLinUcb {
        PairLinUcb::new(&BanditConfig {
            participant_dim,
            lambda,
            beta0,
        })
        .unwrap()
    }

    fn random_contexts(rng: &mut StdRng, n: usize, d: usize) -> Array2<f64> {
        Array2::from_shape_fn((n, d), |_| rng.gen_range(-1.0..1.0))
    }

    #[test]
    fn test_initial_state() {
        let b = bandit(3, 2.0, 1.0);
        assert_eq!(b.dim(), 6);
        assert_eq!(b.design_matrix(), &(Array2::<f64>::eye(6) * 2.0));
        assert!(b.reward_vector().iter().all(|&v| v == 0.0));
        assert_eq!(b.observations(), 0);
        assert!(b.theta().unwrap().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_non_positive_lambda_rejected() {
        let err = PairLinUcb::new(&BanditConfig {
            participant_dim: 2,
            lambda: 0.0,
            beta0: 1.0,
        })
        .unwrap_err();
        assert!(matches!(err, KnexaError::SingularMatrix(_)));
    }

    #[test]
    fn test_concrete_three_participant_scenario() {
        let b = bandit(1, 1.0, 1.0);
        let contexts = array![[1.0], [0.0], [0.5]];

        let candidates = b.score_candidates(contexts.view(), 1).unwrap();
        assert_eq!(candidates.len(), 3);
        assert!(candidates.iter().all(|c| c.mean == 0.0));
        // With A = I the bonus is the norm of the pair vector.
        assert_eq!(candidates[0].pair, ParticipantPair::new(0, 2));
        assert!((candidates[0].bonus - 1.25f64.sqrt()).abs() < 1e-12);
        assert_eq!(candidates[1].pair, ParticipantPair::new(0, 1));
        assert_eq!(candidates[2].pair, ParticipantPair::new(1, 2));

        let pairs = b.select_pairs(contexts.view(), 1, 1).unwrap();
        assert_eq!(pairs, vec![ParticipantPair::new(0, 2)]);
    }

    #[test]
    fn test_huge_k_returns_at_most_half_the_participants() {
        let b = bandit(1, 1.0, 1.0);
        let contexts = array![[1.0], [0.0], [0.5], [0.2], [0.9]];
        for k in [usize::MAX, 1_000_000_000_000, 100] {
            let pairs = b.select_pairs(contexts.view(), k, 0).unwrap();
            assert_eq!(pairs.len(), 2);
            assert!(is_disjoint(&pairs));
        }
        let pairs = b.select_pairs(contexts.view(), usize::MAX, 1).unwrap();
        assert_eq!(
            pairs,
            vec![ParticipantPair::new(0, 4), ParticipantPair::new(2, 3)]
        );
    }

    #[test]
    fn test_ties_keep_enumeration_order() {
        let b = bandit(1, 1.0, 1.0);
        let contexts = array![[1.0], [1.0], [1.0], [1.0]];
        let pairs = b.select_pairs(contexts.view(), 2, 1).unwrap();
        assert_eq!(pairs, vec![ParticipantPair::new(0, 1), ParticipantPair::new(2, 3)]);
    }

    #[test]
    fn test_fewer_than_two_participants_is_empty() {
        let b = bandit(2, 1.0, 1.0);
        let one = array![[0.1, 0.2]];
        assert!(b.select_pairs(one.view(), 3, 1).unwrap().is_empty());
        let none = Array2::<f64>::zeros((0, 2));
        assert!(b.select_pairs(none.view(), 3, 1).unwrap().is_empty());
    }

    #[test]
    fn test_dimension_mismatch() {
        let mut b = bandit(2, 1.0, 1.0);
        let contexts = array![[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]];
        assert!(matches!(
            b.select_pairs(contexts.view(), 1, 1),
            Err(KnexaError::DimensionMismatch {
                expected: 2,
                actual: 3
            })
        ));
        assert!(matches!(
            b.update(array![1.0, 2.0].view(), 1.0),
            Err(KnexaError::DimensionMismatch {
                expected: 4,
                actual: 2
            })
        ));
        assert!(matches!(
            b.score(array![1.0].view(), 1),
            Err(KnexaError::DimensionMismatch { .. })
        ));
        // Failed updates leave the state untouched.
        assert_eq!(b.observations(), 0);
    }

    #[test]
    fn test_non_finite_update_rejected() {
        let mut b = bandit(1, 1.0, 1.0);
        assert!(matches!(
            b.update(array![1.0, 0.0].view(), f64::NAN),
            Err(KnexaError::NonFinite(_))
        ));
        assert!(matches!(
            b.update(array![f64::INFINITY, 0.0].view(), 1.0),
            Err(KnexaError::NonFinite(_))
        ));
        assert_eq!(b.observations(), 0);
    }

    #[test]
    fn test_selection_is_disjoint_and_bounded() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut b = bandit(4, 1.0, 1.0);
        for n in [2usize, 3, 5, 8, 11] {
            let contexts = random_contexts(&mut rng, n, 4);
            for k in [1usize, 2, 4, 10] {
                let pairs = b.select_pairs(contexts.view(), k, 3).unwrap();
                assert!(is_disjoint(&pairs));
                assert!(pairs.len() <= k);
                assert!(pairs.len() <= n / 2);
                assert_eq!(pairs.len(), k.min(n / 2));
            }
            let first = b.select_pairs(contexts.view(), 1, 1).unwrap()[0];
            b.update_pair(contexts.view(), first, rng.gen_range(-1.0..1.0))
                .unwrap();
        }
    }

    #[test]
    fn test_selection_is_deterministic() {
        let mut rng = StdRng::seed_from_u64(11);
        let mut b = bandit(3, 1.0, 1.25);
        let contexts = random_contexts(&mut rng, 9, 3);
        for _ in 0..5 {
            let x = random_contexts(&mut rng, 1, 6);
            b.update(x.row(0), rng.gen_range(-1.0..1.0)).unwrap();
        }
        let first = b.select_pairs(contexts.view(), 4, 2).unwrap();
        for _ in 0..10 {
            assert_eq!(b.select_pairs(contexts.view(), 4, 2).unwrap(), first);
        }
    }

    #[test]
    fn test_bonus_decays_with_round() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut b = bandit(2, 1.0, 1.0);
        let contexts = random_contexts(&mut rng, 6, 2);
        b.update_pair(contexts.view(), ParticipantPair::new(0, 1), 0.4)
            .unwrap();

        let bonus_at = |round: u32| -> Vec<(ParticipantPair, f64)> {
            let mut c = b.score_candidates(contexts.view(), round).unwrap();
            c.sort_by_key(|s| (s.pair.i, s.pair.j));
            c.into_iter().map(|s| (s.pair, s.bonus)).collect()
        };

        let mut prev = bonus_at(1);
        for round in [2u32, 4, 9, 100] {
            let next = bonus_at(round);
            for ((p0, b0), (p1, b1)) in prev.iter().zip(next.iter()) {
                assert_eq!(p0, p1);
                assert!(b1 < b0, "bonus for {p0} did not shrink at round {round}");
            }
            prev = next;
        }

        // Round 0 is clamped to round 1.
        assert_eq!(b.beta(0), b.beta(1));
        assert!((b.beta(4) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_zero_beta0_has_no_bonus() {
        let b = bandit(1, 1.0, 0.0);
        let contexts = array![[1.0], [0.0], [0.5]];
        let candidates = b.score_candidates(contexts.view(), 1).unwrap();
        assert!(candidates.iter().all(|c| c.bonus == 0.0));
    }

    #[test]
    fn test_update_is_exact_rank_one() {
        let mut b = bandit(2, 1.5, 1.0);
        let x = array![0.5, -1.0, 2.0, 0.25];
        let a_old = b.design_matrix().clone();
        let b_old = b.reward_vector().clone();

        b.update(x.view(), 0.8).unwrap();

        let outer = Array2::from_shape_fn((4, 4), |(r, c)| x[r] * x[c]);
        let want_a = &a_old + &outer;
        let want_b = &b_old + &(&x * 0.8);
        for (got, want) in b.design_matrix().iter().zip(want_a.iter()) {
            assert!((got - want).abs() < 1e-12);
        }
        for (got, want) in b.reward_vector().iter().zip(want_b.iter()) {
            assert!((got - want).abs() < 1e-12);
        }
        assert_eq!(b.observations(), 1);
    }

    #[test]
    fn test_design_matrix_stays_positive_definite() {
        let mut rng = StdRng::seed_from_u64(99);
        let mut b = bandit(3, 0.01, 1.0);
        let mut prev = b.log_det().unwrap();
        for _ in 0..200 {
            let x = random_contexts(&mut rng, 1, 6);
            b.update(x.row(0), rng.gen_range(-2.0..2.0)).unwrap();
            let ld = b.log_det().unwrap();
            assert!(ld.is_finite());
            // det(A + xxᵀ) = det(A)(1 + xᵀA⁻¹x) never shrinks.
            assert!(ld >= prev - 1e-9);
            prev = ld;
        }
        let a = b.design_matrix();
        for r in 0..6 {
            for c in 0..6 {
                assert!((a[[r, c]] - a[[c, r]]).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn test_update_then_score_reflects_reward() {
        let mut b = bandit(1, 1.0, 0.0);
        let x = array![1.0, 1.0];
        assert_eq!(b.score_default(x.view()).unwrap(), 0.0);

        b.update(x.view(), 2.0).unwrap();
        // θ = (I + xxᵀ)⁻¹·2x = 2x / (1 + ‖x‖²), so θᵀx = 2·2/3.
        let s = b.score_default(x.view()).unwrap();
        assert!((s - 4.0 / 3.0).abs() < 1e-12);

        let mut neg = bandit(1, 1.0, 0.0);
        neg.update(x.view(), -2.0).unwrap();
        assert!(neg.score_default(x.view()).unwrap() < 0.0);
    }

    #[test]
    fn test_penalized_pair_not_selected() {
        let mut b = bandit(1, 1.0, 0.1);
        let contexts = array![[1.0], [-1.0], [0.2], [0.3]];
        for _ in 0..20 {
            b.update_pair(contexts.view(), ParticipantPair::new(2, 3), 1.0)
                .unwrap();
            b.update_pair(contexts.view(), ParticipantPair::new(0, 1), -1.0)
                .unwrap();
        }
        let pairs = b.select_pairs(contexts.view(), 1, 50).unwrap();
        assert!(!pairs.contains(&ParticipantPair::new(0, 1)));
    }

    #[test]
    fn test_update_pair_rejects_bad_indices() {
        let mut b = bandit(1, 1.0, 1.0);
        let contexts = array![[1.0], [0.0]];
        assert!(matches!(
            b.update_pair(contexts.view(), ParticipantPair::new(0, 0), 1.0),
            Err(KnexaError::InvalidPair { .. })
        ));
        assert!(matches!(
            b.update_pair(contexts.view(), ParticipantPair::new(0, 5), 1.0),
            Err(KnexaError::InvalidPair { i: 0, j: 5, n: 2 })
        ));
    }

    #[test]
    fn test_feature_importance_sums_to_one() {
        let mut b = bandit(2, 1.0, 1.0);
        b.update(array![1.0, 0.0, 0.0, 0.5].view(), 1.0).unwrap();
        let weights = b.feature_importance().unwrap();
        assert_eq!(weights.len(), 4);
        assert_eq!(weights[2].side, PairSide::Second);
        assert_eq!(weights[2].feature, 0);
        let total: f64 = weights.iter().map(|w| w.importance).sum();
        assert!((total - 1.0).abs() < 1e-12);
        assert!(weights[0].weight > weights[3].weight);
    }

    #[test]
    fn test_state_serializes() {
        let mut b = bandit(1, 1.0, 1.0);
        b.update(array![0.5, 1.0].view(), 0.3).unwrap();
        let json = serde_json::to_string(&b).unwrap();
        let restored: PairLinUcb = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.design_matrix(), b.design_matrix());
        assert_eq!(restored.observations(), 1);
    }
}
