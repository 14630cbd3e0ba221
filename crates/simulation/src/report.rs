//! Per-round metrics and their CSV / JSON export.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use knexa_core::config::OutputConfig;
use knexa_core::{KnexaResult, ParticipantPair};
use serde::{Deserialize, Serialize};
use tracing::info;

pub const LEARNING_CURVE_FILE: &str = "learning_curve.csv";
pub const REGRET_CURVE_FILE: &str = "regret_curve.csv";
pub const SUMMARY_FILE: &str = "summary.json";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Method {
    LinUcb,
    Random,
}

impl Method {
    pub const ALL: [Method; 2] = [Method::LinUcb, Method::Random];

    /// Label used in exported curves.
    pub fn label(&self) -> &'static str {
        match self {
            Method::LinUcb => "LinUCB",
            Method::Random => "Random",
        }
    }
}

impl std::fmt::Display for Method {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Bounded success proxy: `clip(mean(rewards) * scale + offset, 0, 1)`.
/// An empty round contributes only the offset.
pub fn pass1_proxy(rewards: &[f64], scale: f64, offset: f64) -> f64 {
    let mean = if rewards.is_empty() {
        0.0
    } else {
        rewards.iter().sum::<f64>() / rewards.len() as f64
    };
    (mean * scale + offset).clamp(0.0, 1.0)
}

/// One method's result for one round.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MethodRound {
    pub method: Method,
    pub pairs: Vec<ParticipantPair>,
    /// Sum of true means of the chosen pairs.
    pub value: f64,
    pub rewards: Vec<f64>,
    /// `max(0, oracle_value - value)`.
    pub regret: f64,
    pub cumulative_regret: f64,
    pub mean_pass1: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoundOutcome {
    pub round: u32,
    pub oracle_value: f64,
    pub linucb: MethodRound,
    pub random: MethodRound,
}

impl RoundOutcome {
    pub fn method(&self, method: Method) -> &MethodRound {
        match method {
            Method::LinUcb => &self.linucb,
            Method::Random => &self.random,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSummary {
    pub seed: u64,
    pub num_participants: usize,
    pub participant_dim: usize,
    pub pairs_per_round: usize,
    pub num_rounds: u32,
    pub oracle_pairs: Vec<ParticipantPair>,
    pub oracle_value: f64,
    pub final_regret_linucb: f64,
    pub final_regret_random: f64,
    pub mean_pass1_linucb: f64,
    pub mean_pass1_random: f64,
    pub generated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub summary: SimulationSummary,
    pub rounds: Vec<RoundOutcome>,
}

impl SimulationReport {
    pub fn final_regret(&self, method: Method) -> f64 {
        self.rounds
            .last()
            .map(|r| r.method(method).cumulative_regret)
            .unwrap_or(0.0)
    }

    pub fn regret_curve(&self, method: Method) -> Vec<f64> {
        self.rounds
            .iter()
            .map(|r| r.method(method).cumulative_regret)
            .collect()
    }

    pub fn learning_curve(&self, method: Method) -> Vec<f64> {
        self.rounds
            .iter()
            .map(|r| r.method(method).mean_pass1)
            .collect()
    }

    fn write_curve<W: Write>(
        &self,
        mut out: W,
        column: &str,
        value: impl Fn(&MethodRound) -> f64,
    ) -> KnexaResult<()> {
        writeln!(out, "round,method,{column}")?;
        for method in Method::ALL {
            for round in &self.rounds {
                writeln!(
                    out,
                    "{},{},{:.6}",
                    round.round,
                    method.label(),
                    value(round.method(method))
                )?;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// `round,method,mean_pass1`, LinUCB rows first.
    pub fn write_learning_curve<W: Write>(&self, out: W) -> KnexaResult<()> {
        self.write_curve(out, "mean_pass1", |m| m.mean_pass1)
    }

    /// `round,method,cumulative_regret`, LinUCB rows first.
    pub fn write_regret_curve<W: Write>(&self, out: W) -> KnexaResult<()> {
        self.write_curve(out, "cumulative_regret", |m| m.cumulative_regret)
    }

    pub fn write_summary<W: Write>(&self, out: W) -> KnexaResult<()> {
        serde_json::to_writer_pretty(out, &self.summary)?;
        Ok(())
    }

    /// Write the enabled artifacts into `output.dir`, creating it if needed.
    pub fn write_outputs(&self, output: &OutputConfig) -> KnexaResult<Vec<PathBuf>> {
        let dir = Path::new(&output.dir);
        std::fs::create_dir_all(dir)?;

        let mut written = Vec::new();
        if output.write_csv {
            let path = dir.join(LEARNING_CURVE_FILE);
            self.write_learning_curve(BufWriter::new(File::create(&path)?))?;
            written.push(path);

            let path = dir.join(REGRET_CURVE_FILE);
            self.write_regret_curve(BufWriter::new(File::create(&path)?))?;
            written.push(path);
        }
        if output.write_summary {
            let path = dir.join(SUMMARY_FILE);
            self.write_summary(BufWriter::new(File::create(&path)?))?;
            written.push(path);
        }

        for path in &written {
            info!(path = %path.display(), "Wrote simulation artifact");
        }
        Ok(written)
    }
}
