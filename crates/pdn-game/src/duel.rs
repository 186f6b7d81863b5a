//! Duel bookkeeping for the quickdraw match flow
//!
//! A [`MatchManager`] tracks at most one match in flight. The handshake
//! states call [`MatchManager::begin`] once both peers have exchanged ids,
//! the duel states feed in reactions and concessions as they happen, and the
//! result state calls [`MatchManager::resolve`] exactly once to settle the
//! outcome. Completed matches queue up until the upload state drains them
//! into persistent history.

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::player::Role;

pub type SharedMatches = Rc<RefCell<MatchManager>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchOutcome {
    Won,
    Lost,
}

/// A match in flight, from handshake to resolution
#[derive(Debug, Clone)]
pub struct Match {
    pub peer: String,
    pub role: Role,
    pub my_reaction_ms: Option<u64>,
    pub peer_reaction_ms: Option<u64>,
    pub peer_conceded: bool,
    pub i_conceded: bool,
    pub outcome: Option<MatchOutcome>,
    window_opened_at: Option<u64>,
}

/// A settled match, as written to history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatchRecord {
    pub peer: String,
    pub role: Role,
    pub outcome: MatchOutcome,
    pub my_reaction_ms: Option<u64>,
    pub peer_reaction_ms: Option<u64>,
    /// Wall-clock stamp, applied when the record reaches storage
    #[serde(default)]
    pub settled_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
pub struct MatchManager {
    current: Option<Match>,
    completed: Vec<MatchRecord>,
}

impl MatchManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a fresh match against `peer`. Discards any unresolved match.
    pub fn begin(&mut self, peer: impl Into<String>, role: Role) {
        if self.current.is_some() {
            warn!("starting a new match with one still unresolved");
        }
        self.current = Some(Match {
            peer: peer.into(),
            role,
            my_reaction_ms: None,
            peer_reaction_ms: None,
            peer_conceded: false,
            i_conceded: false,
            outcome: None,
            window_opened_at: None,
        });
    }

    pub fn current(&self) -> Option<&Match> {
        self.current.as_ref()
    }

    pub fn in_progress(&self) -> bool {
        self.current.is_some()
    }

    /// Mark the moment the draw window opens; reactions are measured from it
    pub fn open_window(&mut self, now_ms: u64) {
        if let Some(m) = self.current.as_mut() {
            m.window_opened_at = Some(now_ms);
        }
    }

    pub fn reaction_since_window(&self, now_ms: u64) -> Option<u64> {
        self.current
            .as_ref()
            .and_then(|m| m.window_opened_at)
            .map(|opened| now_ms.saturating_sub(opened))
    }

    pub fn record_my_reaction(&mut self, reaction_ms: u64) {
        if let Some(m) = self.current.as_mut() {
            m.my_reaction_ms = Some(reaction_ms);
            debug!(reaction_ms, "local reaction recorded");
        }
    }

    pub fn record_peer_reaction(&mut self, reaction_ms: u64) {
        if let Some(m) = self.current.as_mut() {
            m.peer_reaction_ms = Some(reaction_ms);
            debug!(reaction_ms, "peer reaction recorded");
        }
    }

    pub fn record_peer_concede(&mut self) {
        if let Some(m) = self.current.as_mut() {
            m.peer_conceded = true;
        }
    }

    pub fn record_my_concede(&mut self) {
        if let Some(m) = self.current.as_mut() {
            m.i_conceded = true;
        }
    }

    /// Settle the current match. Concessions trump reactions; with both
    /// reactions in, the faster draw wins and a dead tie goes to the hunter.
    pub fn resolve(&mut self) -> Option<MatchOutcome> {
        let m = self.current.as_mut()?;
        let outcome = if m.peer_conceded {
            MatchOutcome::Won
        } else if m.i_conceded {
            MatchOutcome::Lost
        } else {
            match (m.my_reaction_ms, m.peer_reaction_ms) {
                (Some(mine), Some(theirs)) => {
                    if mine < theirs {
                        MatchOutcome::Won
                    } else if theirs < mine {
                        MatchOutcome::Lost
                    } else if m.role == Role::Hunter {
                        MatchOutcome::Won
                    } else {
                        MatchOutcome::Lost
                    }
                }
                (Some(_), None) => MatchOutcome::Won,
                (None, Some(_)) => MatchOutcome::Lost,
                (None, None) => MatchOutcome::Lost,
            }
        };
        m.outcome = Some(outcome);
        debug!(?outcome, peer = %m.peer, "match resolved");
        Some(outcome)
    }

    /// Move the resolved match onto the completed queue
    pub fn complete(&mut self) {
        let Some(m) = self.current.take() else {
            return;
        };
        let Some(outcome) = m.outcome else {
            warn!("completing an unresolved match, dropping it");
            return;
        };
        self.completed.push(MatchRecord {
            peer: m.peer,
            role: m.role,
            outcome,
            my_reaction_ms: m.my_reaction_ms,
            peer_reaction_ms: m.peer_reaction_ms,
            settled_at: None,
        });
    }

    /// Throw away the current match, for disconnects mid-flow
    pub fn abandon(&mut self) {
        if self.current.take().is_some() {
            debug!("match abandoned");
        }
    }

    pub fn drain_completed(&mut self) -> Vec<MatchRecord> {
        std::mem::take(&mut self.completed)
    }

    /// The most recently completed match, for the result screens
    pub fn last_completed(&self) -> Option<&MatchRecord> {
        self.completed.last()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }
}

pub fn shared_matches() -> SharedMatches {
    Rc::new(RefCell::new(MatchManager::new()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager_with_match(role: Role) -> MatchManager {
        let mut mgr = MatchManager::new();
        mgr.begin("peer-1", role);
        mgr
    }

    #[test]
    fn test_faster_reaction_wins() {
        let mut mgr = manager_with_match(Role::Bounty);
        mgr.record_my_reaction(212);
        mgr.record_peer_reaction(305);
        assert_eq!(mgr.resolve(), Some(MatchOutcome::Won));
    }

    #[test]
    fn test_slower_reaction_loses() {
        let mut mgr = manager_with_match(Role::Hunter);
        mgr.record_my_reaction(410);
        mgr.record_peer_reaction(305);
        assert_eq!(mgr.resolve(), Some(MatchOutcome::Lost));
    }

    #[test]
    fn test_tie_goes_to_the_hunter() {
        let mut hunter = manager_with_match(Role::Hunter);
        hunter.record_my_reaction(250);
        hunter.record_peer_reaction(250);
        assert_eq!(hunter.resolve(), Some(MatchOutcome::Won));

        let mut bounty = manager_with_match(Role::Bounty);
        bounty.record_my_reaction(250);
        bounty.record_peer_reaction(250);
        assert_eq!(bounty.resolve(), Some(MatchOutcome::Lost));
    }

    #[test]
    fn test_peer_concession_wins_regardless_of_times() {
        let mut mgr = manager_with_match(Role::Bounty);
        mgr.record_my_reaction(900);
        mgr.record_peer_reaction(100);
        mgr.record_peer_concede();
        assert_eq!(mgr.resolve(), Some(MatchOutcome::Won));
    }

    #[test]
    fn test_own_concession_loses() {
        let mut mgr = manager_with_match(Role::Hunter);
        mgr.record_my_concede();
        assert_eq!(mgr.resolve(), Some(MatchOutcome::Lost));
    }

    #[test]
    fn test_lone_presser_wins() {
        let mut mgr = manager_with_match(Role::Bounty);
        mgr.record_my_reaction(640);
        assert_eq!(mgr.resolve(), Some(MatchOutcome::Won));
    }

    #[test]
    fn test_window_measures_reactions() {
        let mut mgr = manager_with_match(Role::Hunter);
        mgr.open_window(10_000);
        assert_eq!(mgr.reaction_since_window(10_340), Some(340));
    }

    #[test]
    fn test_complete_moves_match_to_history_queue() {
        let mut mgr = manager_with_match(Role::Hunter);
        mgr.record_my_reaction(200);
        mgr.record_peer_reaction(300);
        mgr.resolve();
        mgr.complete();
        assert!(!mgr.in_progress());
        let records = mgr.drain_completed();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].outcome, MatchOutcome::Won);
        assert_eq!(records[0].peer, "peer-1");
        assert!(mgr.drain_completed().is_empty());
    }

    #[test]
    fn test_unresolved_complete_drops_the_match() {
        let mut mgr = manager_with_match(Role::Bounty);
        mgr.complete();
        assert!(!mgr.in_progress());
        assert_eq!(mgr.completed_count(), 0);
    }

    #[test]
    fn test_abandon_clears_without_history() {
        let mut mgr = manager_with_match(Role::Bounty);
        mgr.record_my_reaction(120);
        mgr.abandon();
        assert!(!mgr.in_progress());
        assert_eq!(mgr.completed_count(), 0);
    }
}
