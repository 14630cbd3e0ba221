use serde::{Deserialize, Serialize};

/// An unordered pair of distinct participant indices, stored as enumerated
/// (`i < j` for pairs produced by the engine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ParticipantPair {
    pub i: usize,
    pub j: usize,
}

impl ParticipantPair {
    pub fn new(i: usize, j: usize) -> Self {
        Self { i, j }
    }

    pub fn contains(&self, idx: usize) -> bool {
        self.i == idx || self.j == idx
    }

    pub fn overlaps(&self, other: &ParticipantPair) -> bool {
        self.contains(other.i) || self.contains(other.j)
    }
}

impl From<(usize, usize)> for ParticipantPair {
    fn from((i, j): (usize, usize)) -> Self {
        Self { i, j }
    }
}

impl std::fmt::Display for ParticipantPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.i, self.j)
    }
}

/// A candidate pair with its upper-confidence score broken into parts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoredPair {
    pub pair: ParticipantPair,
    /// Estimated mean reward `θᵀx`.
    pub mean: f64,
    /// Exploration bonus `β·√(xᵀA⁻¹x)`.
    pub bonus: f64,
    pub ucb: f64,
}
