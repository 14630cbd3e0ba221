//! Round-based driver: LinUCB pair matching against a random baseline under a
//! synthetic ground truth, with regret measured against the greedy oracle.

use chrono::Utc;
use knexa_core::config::{AppConfig, BanditConfig, SimulationConfig};
use knexa_core::{KnexaError, KnexaResult, ParticipantPair};
use knexa_cpm::PairLinUcb;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::{debug, info};

use crate::baseline::random_matching;
use crate::report::{
    pass1_proxy, Method, MethodRound, RoundOutcome, SimulationReport, SimulationSummary,
};
use crate::world::{OracleMatching, SyntheticWorld};

pub struct SimulationDriver {
    config: SimulationConfig,
    world: SyntheticWorld,
    oracle: OracleMatching,
    bandit: PairLinUcb,
    rng: StdRng,
    noise: Normal<f64>,
    cumulative_regret_linucb: f64,
    cumulative_regret_random: f64,
    rounds_played: u32,
}

impl SimulationDriver {
    /// Seed the RNG, draw the world, and build a fresh bandit sized to it.
    pub fn new(bandit_config: &BanditConfig, config: &SimulationConfig) -> KnexaResult<Self> {
        config.validate()?;
        let bandit = PairLinUcb::new(bandit_config)?;

        let mut rng = StdRng::seed_from_u64(config.seed);
        let world = SyntheticWorld::generate(
            config.num_participants,
            bandit_config.participant_dim,
            &mut rng,
        )?;
        Self::with_world(bandit, world, rng, config)
    }

    /// Drive an existing bandit over a caller-built world.
    pub fn with_world(
        bandit: PairLinUcb,
        world: SyntheticWorld,
        rng: StdRng,
        config: &SimulationConfig,
    ) -> KnexaResult<Self> {
        KnexaError::check_dim(bandit.participant_dim(), world.participant_dim())?;
        let noise = Normal::new(0.0, config.noise_sigma)
            .map_err(|e| KnexaError::Config(format!("noise_sigma: {e}")))?;
        // Contexts never change, so neither does the oracle.
        let oracle = world.oracle(config.pairs_per_round);

        Ok(Self {
            config: config.clone(),
            world,
            oracle,
            bandit,
            rng,
            noise,
            cumulative_regret_linucb: 0.0,
            cumulative_regret_random: 0.0,
            rounds_played: 0,
        })
    }

    pub fn world(&self) -> &SyntheticWorld {
        &self.world
    }

    pub fn bandit(&self) -> &PairLinUcb {
        &self.bandit
    }

    pub fn oracle(&self) -> &OracleMatching {
        &self.oracle
    }

    /// Noisy rewards for `pairs`, drawn in pair order.
    fn observe(&mut self, pairs: &[ParticipantPair]) -> Vec<f64> {
        pairs
            .iter()
            .map(|&pair| self.world.true_mean(pair) + self.noise.sample(&mut self.rng))
            .collect()
    }

    fn method_round(
        &self,
        method: Method,
        pairs: Vec<ParticipantPair>,
        rewards: Vec<f64>,
        cumulative_regret: &mut f64,
    ) -> MethodRound {
        let value = self.world.matching_value(&pairs);
        let regret = (self.oracle.value - value).max(0.0);
        *cumulative_regret += regret;
        MethodRound {
            method,
            mean_pass1: pass1_proxy(&rewards, self.config.pass1_scale, self.config.pass1_offset),
            pairs,
            value,
            rewards,
            regret,
            cumulative_regret: *cumulative_regret,
        }
    }

    /// Play the next round. Rounds are numbered from 1.
    pub fn step(&mut self) -> KnexaResult<RoundOutcome> {
        let round = self.rounds_played + 1;
        let k = self.config.pairs_per_round;

        let lin_pairs = self.bandit.select_pairs(self.world.contexts(), k, round)?;
        let lin_rewards = self.observe(&lin_pairs);
        for (&pair, &reward) in lin_pairs.iter().zip(lin_rewards.iter()) {
            let x = self.world.pair_vector(pair);
            self.bandit.update(x.view(), reward)?;
        }

        let rnd_pairs = random_matching(self.world.num_participants(), k, &mut self.rng);
        let rnd_rewards = self.observe(&rnd_pairs);

        let mut lin_cum = self.cumulative_regret_linucb;
        let mut rnd_cum = self.cumulative_regret_random;
        let linucb = self.method_round(Method::LinUcb, lin_pairs, lin_rewards, &mut lin_cum);
        let random = self.method_round(Method::Random, rnd_pairs, rnd_rewards, &mut rnd_cum);
        self.cumulative_regret_linucb = lin_cum;
        self.cumulative_regret_random = rnd_cum;
        self.rounds_played = round;

        debug!(
            round,
            oracle_value = self.oracle.value,
            linucb_value = linucb.value,
            random_value = random.value,
            linucb_regret = lin_cum,
            random_regret = rnd_cum,
            "Simulation round complete"
        );

        Ok(RoundOutcome {
            round,
            oracle_value: self.oracle.value,
            linucb,
            random,
        })
    }

    /// Play all configured rounds and assemble the report.
    pub fn run(mut self) -> KnexaResult<SimulationReport> {
        info!(
            seed = self.config.seed,
            participants = self.world.num_participants(),
            participant_dim = self.world.participant_dim(),
            pairs_per_round = self.config.pairs_per_round,
            rounds = self.config.num_rounds,
            "Starting matchmaking simulation"
        );

        let mut rounds = Vec::with_capacity(self.config.num_rounds as usize);
        for _ in 0..self.config.num_rounds {
            let outcome = self.step()?;
            if outcome.round % 10 == 0 {
                info!(
                    round = outcome.round,
                    linucb_regret = outcome.linucb.cumulative_regret,
                    random_regret = outcome.random.cumulative_regret,
                    "Simulation progress"
                );
            }
            rounds.push(outcome);
        }

        let mean_pass1 = |method: Method| -> f64 {
            if rounds.is_empty() {
                0.0
            } else {
                let total: f64 = rounds.iter().map(|r| r.method(method).mean_pass1).sum();
                total / rounds.len() as f64
            }
        };

        let summary = SimulationSummary {
            seed: self.config.seed,
            num_participants: self.world.num_participants(),
            participant_dim: self.world.participant_dim(),
            pairs_per_round: self.config.pairs_per_round,
            num_rounds: self.rounds_played,
            oracle_pairs: self.oracle.pairs.clone(),
            oracle_value: self.oracle.value,
            final_regret_linucb: self.cumulative_regret_linucb,
            final_regret_random: self.cumulative_regret_random,
            mean_pass1_linucb: mean_pass1(Method::LinUcb),
            mean_pass1_random: mean_pass1(Method::Random),
            generated_at: Utc::now(),
        };

        info!(
            linucb_regret = summary.final_regret_linucb,
            random_regret = summary.final_regret_random,
            observations = self.bandit.observations(),
            "Simulation finished"
        );

        Ok(SimulationReport { summary, rounds })
    }
}

/// Build a driver from the application config and run it to completion.
pub fn run_simulation(config: &AppConfig) -> KnexaResult<SimulationReport> {
    SimulationDriver::new(&config.bandit, &config.simulation)?.run()
}
