//! Persistence for the player profile and match history
//!
//! Everything keys off the active profile slot so a device can hold more
//! than one identity. The manager holds no storage handle of its own; states
//! pass in the device's [`StorageDriver`] at call time.

use chrono::Utc;
use pdn_device::StorageDriver;
use tracing::{info, warn};

use pdn_core::Result;

use crate::duel::MatchRecord;
use crate::player::Player;

#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressManager {
    profile_slot: u8,
}

impl ProgressManager {
    pub fn new(profile_slot: u8) -> Self {
        Self { profile_slot }
    }

    fn player_key(&self) -> String {
        format!("player_{}", self.profile_slot)
    }

    fn history_key(&self) -> String {
        format!("matches_{}", self.profile_slot)
    }

    pub fn save_player(&self, storage: &StorageDriver, player: &Player) -> Result<()> {
        storage.save(&self.player_key(), player)
    }

    /// None when no profile has been registered in this slot yet
    pub fn load_player(&self, storage: &StorageDriver) -> Option<Player> {
        if !storage.exists(&self.player_key()) {
            return None;
        }
        match storage.load::<Player>(&self.player_key()) {
            Ok(player) => Some(player),
            Err(err) => {
                warn!(%err, "player profile unreadable, treating as unregistered");
                None
            }
        }
    }

    /// Append newly settled matches to the stored history
    pub fn append_matches(
        &self,
        storage: &StorageDriver,
        records: Vec<MatchRecord>,
    ) -> Result<()> {
        if records.is_empty() {
            return Ok(());
        }
        let mut history = self.load_history(storage);
        let added = records.len();
        let now = Utc::now();
        history.extend(records.into_iter().map(|mut record| {
            record.settled_at.get_or_insert(now);
            record
        }));
        storage.save(&self.history_key(), &history)?;
        info!(added, total = history.len(), "match history updated");
        Ok(())
    }

    pub fn load_history(&self, storage: &StorageDriver) -> Vec<MatchRecord> {
        storage.load_or_default(&self.history_key())
    }
}
