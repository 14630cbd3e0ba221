//! Synthetic matchmaking simulation: drives the pair bandit against a hidden
//! linear reward and a random baseline, and reports regret and a bounded
//! pass@1 proxy per round.

pub mod baseline;
pub mod driver;
pub mod report;
pub mod world;

pub use driver::{run_simulation, SimulationDriver};
pub use report::{Method, SimulationReport};
pub use world::SyntheticWorld;
