//! Matchmaking sessions — independent bandits keyed by session id.
//!
//! Each session owns its own `PairLinUcb`; nothing is shared between them.
//! Calls on one session are serialized by the map's per-entry lock, so a
//! session can be driven from several threads without external locking.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use knexa_core::config::BanditConfig;
use knexa_core::{KnexaError, KnexaResult, ParticipantPair};
use ndarray::ArrayView2;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::linucb::PairLinUcb;

#[derive(Debug, Clone)]
struct MatchmakingSession {
    bandit: PairLinUcb,
    created_at: DateTime<Utc>,
    rounds_served: u64,
    last_round: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSnapshot {
    pub session_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub rounds_served: u64,
    pub rewards_observed: u64,
    pub last_round: Option<u32>,
    pub lambda: f64,
    pub beta0: f64,
    pub theta: Vec<f64>,
    pub log_det: f64,
}

pub struct MatchmakingSessions {
    sessions: DashMap<Uuid, MatchmakingSession>,
}

impl MatchmakingSessions {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
        }
    }

    pub fn open_session(&self, config: &BanditConfig) -> KnexaResult<Uuid> {
        let bandit = PairLinUcb::new(config)?;
        let id = Uuid::new_v4();
        self.sessions.insert(
            id,
            MatchmakingSession {
                bandit,
                created_at: Utc::now(),
                rounds_served: 0,
                last_round: None,
            },
        );
        info!(
            session_id = %id,
            participant_dim = config.participant_dim,
            lambda = config.lambda,
            beta0 = config.beta0,
            "Opened matchmaking session"
        );
        Ok(id)
    }

    pub fn select(
        &self,
        session_id: &Uuid,
        contexts: ArrayView2<f64>,
        k: usize,
        round: u32,
    ) -> KnexaResult<Vec<ParticipantPair>> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or(KnexaError::SessionNotFound(*session_id))?;
        let pairs = session.bandit.select_pairs(contexts, k, round)?;
        session.rounds_served += 1;
        session.last_round = Some(round);
        Ok(pairs)
    }

    pub fn record_reward(
        &self,
        session_id: &Uuid,
        contexts: ArrayView2<f64>,
        pair: ParticipantPair,
        reward: f64,
    ) -> KnexaResult<()> {
        let mut session = self
            .sessions
            .get_mut(session_id)
            .ok_or(KnexaError::SessionNotFound(*session_id))?;
        session.bandit.update_pair(contexts, pair, reward)
    }

    pub fn snapshot(&self, session_id: &Uuid) -> KnexaResult<SessionSnapshot> {
        let session = self
            .sessions
            .get(session_id)
            .ok_or(KnexaError::SessionNotFound(*session_id))?;
        Self::snapshot_of(*session_id, &session)
    }

    /// Remove a session and return its final state.
    pub fn close_session(&self, session_id: &Uuid) -> KnexaResult<SessionSnapshot> {
        let (id, session) = self
            .sessions
            .remove(session_id)
            .ok_or(KnexaError::SessionNotFound(*session_id))?;
        let snapshot = Self::snapshot_of(id, &session)?;
        info!(
            session_id = %id,
            rounds_served = snapshot.rounds_served,
            rewards_observed = snapshot.rewards_observed,
            "Closed matchmaking session"
        );
        Ok(snapshot)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    fn snapshot_of(id: Uuid, session: &MatchmakingSession) -> KnexaResult<SessionSnapshot> {
        Ok(SessionSnapshot {
            session_id: id,
            created_at: session.created_at,
            rounds_served: session.rounds_served,
            rewards_observed: session.bandit.observations(),
            last_round: session.last_round,
            lambda: session.bandit.lambda(),
            beta0: session.bandit.beta0(),
            theta: session.bandit.theta()?.to_vec(),
            log_det: session.bandit.log_det()?,
        })
    }
}

impl Default for MatchmakingSessions {
    fn default() -> Self {
        Self::new()
    }
}
