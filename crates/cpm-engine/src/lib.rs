//! Contextual pair matchmaking — a LinUCB model over concatenated participant
//! features, greedy disjoint pair selection, and a registry of independent
//! matchmaking sessions.

pub mod linalg;
pub mod linucb;
pub mod matching;
pub mod sessions;

pub use linucb::PairLinUcb;
pub use matching::{greedy_disjoint, is_disjoint};
pub use sessions::MatchmakingSessions;
