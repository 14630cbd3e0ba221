use serde::{Deserialize, Serialize};

use crate::error::{KnexaError, KnexaResult};

/// Root configuration. Loaded from environment variables with the prefix
/// `KNEXA__` and an optional TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub bandit: BanditConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

/// Linear UCB model over concatenated pair features.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BanditConfig {
    /// Feature dimension of a single participant; the model works on `2 *
    /// participant_dim`.
    #[serde(default = "default_participant_dim")]
    pub participant_dim: usize,
    /// Ridge regularization; `A` starts at `lambda * I`.
    #[serde(default = "default_lambda")]
    pub lambda: f64,
    /// Exploration scale, decayed as `beta0 / sqrt(round)`.
    #[serde(default = "default_beta0")]
    pub beta0: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    #[serde(default = "default_seed")]
    pub seed: u64,
    #[serde(default = "default_num_participants")]
    pub num_participants: usize,
    #[serde(default = "default_num_rounds")]
    pub num_rounds: u32,
    #[serde(default = "default_pairs_per_round")]
    pub pairs_per_round: usize,
    #[serde(default = "default_noise_sigma")]
    pub noise_sigma: f64,
    /// Maps the mean round reward onto the bounded pass@1 proxy.
    #[serde(default = "default_pass1_scale")]
    pub pass1_scale: f64,
    #[serde(default = "default_pass1_offset")]
    pub pass1_offset: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: String,
    #[serde(default = "default_true")]
    pub write_csv: bool,
    #[serde(default = "default_true")]
    pub write_summary: bool,
}

// Default functions
fn default_participant_dim() -> usize {
    16
}
fn default_lambda() -> f64 {
    1.0
}
fn default_beta0() -> f64 {
    1.25
}
fn default_seed() -> u64 {
    42
}
fn default_num_participants() -> usize {
    16
}
fn default_num_rounds() -> u32 {
    100
}
fn default_pairs_per_round() -> usize {
    8
}
fn default_noise_sigma() -> f64 {
    0.15
}
fn default_pass1_scale() -> f64 {
    0.3
}
fn default_pass1_offset() -> f64 {
    0.1
}
fn default_output_dir() -> String {
    "results/simulation".to_string()
}
fn default_true() -> bool {
    true
}

impl Default for BanditConfig {
    fn default() -> Self {
        Self {
            participant_dim: default_participant_dim(),
            lambda: default_lambda(),
            beta0: default_beta0(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            seed: default_seed(),
            num_participants: default_num_participants(),
            num_rounds: default_num_rounds(),
            pairs_per_round: default_pairs_per_round(),
            noise_sigma: default_noise_sigma(),
            pass1_scale: default_pass1_scale(),
            pass1_offset: default_pass1_offset(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
            write_csv: default_true(),
            write_summary: default_true(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bandit: BanditConfig::default(),
            simulation: SimulationConfig::default(),
            output: OutputConfig::default(),
        }
    }
}

impl BanditConfig {
    /// Dimension of a concatenated pair vector.
    pub fn pair_dim(&self) -> usize {
        2 * self.participant_dim
    }

    /// Range checks for the model parameters. A non-positive `lambda` is
    /// reported as a singular design matrix since `lambda * I` would not be
    /// invertible.
    pub fn validate(&self) -> KnexaResult<()> {
        if self.participant_dim == 0 {
            return Err(KnexaError::Config(
                "participant_dim must be at least 1".to_string(),
            ));
        }
        if !self.lambda.is_finite() {
            return Err(KnexaError::Config(format!(
                "lambda must be finite, got {}",
                self.lambda
            )));
        }
        if self.lambda <= 0.0 {
            return Err(KnexaError::SingularMatrix(format!(
                "lambda must be > 0 for an invertible design matrix, got {}",
                self.lambda
            )));
        }
        if !self.beta0.is_finite() || self.beta0 < 0.0 {
            return Err(KnexaError::Config(format!(
                "beta0 must be finite and >= 0, got {}",
                self.beta0
            )));
        }
        Ok(())
    }
}

impl SimulationConfig {
    pub fn validate(&self) -> KnexaResult<()> {
        if self.num_participants < 2 {
            return Err(KnexaError::Config(format!(
                "num_participants must be >= 2, got {}",
                self.num_participants
            )));
        }
        if self.pairs_per_round == 0 {
            return Err(KnexaError::Config(
                "pairs_per_round must be >= 1".to_string(),
            ));
        }
        if !self.noise_sigma.is_finite() || self.noise_sigma < 0.0 {
            return Err(KnexaError::Config(format!(
                "noise_sigma must be finite and >= 0, got {}",
                self.noise_sigma
            )));
        }
        if !self.pass1_scale.is_finite() || !self.pass1_offset.is_finite() {
            return Err(KnexaError::Config(
                "pass1_scale and pass1_offset must be finite".to_string(),
            ));
        }
        Ok(())
    }
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        Self::load_from(None)
    }

    /// Layer an optional TOML file under the `KNEXA__` environment.
    pub fn load_from(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::new(path, config::FileFormat::Toml));
        }
        let builder = builder.add_source(
            config::Environment::with_prefix("KNEXA")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    pub fn validate(&self) -> KnexaResult<()> {
        self.bandit.validate()?;
        self.simulation.validate()?;
        if self.output.dir.trim().is_empty() {
            return Err(KnexaError::Config("output.dir must not be empty".to_string()));
        }
        Ok(())
    }
}
