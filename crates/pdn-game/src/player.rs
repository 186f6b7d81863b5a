//! The player profile: identity, role, and Konami progression
//!
//! Progression is three 7-bit masks, one bit per minigame: the button earned
//! by a first easy win, the hard-mode unlock earned by an easy replay win,
//! and the boon earned by a hard win. Collecting all seven buttons gates the
//! Konami code encounter.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use pdn_core::{minigame_app_id, StateId, MINIGAME_COUNT};

pub type SharedPlayer = Rc<RefCell<Player>>;

pub const ALL_BUTTONS_MASK: u8 = 0x7F;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Hunter,
    Bounty,
}

impl Role {
    pub fn label(&self) -> &'static str {
        match self {
            Role::Hunter => "HUNTER",
            Role::Bounty => "BOUNTY",
        }
    }
}

/// The seven FDN minigames plus the Konami code encounter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FdnGameType {
    SignalEcho,
    GhostRunner,
    SpikeVector,
    FirewallDecrypt,
    CipherPath,
    ExploitSequencer,
    BreachDefense,
    KonamiCode,
}

impl FdnGameType {
    /// The seven reward-bearing games in FDN-index order
    pub const MINIGAMES: [FdnGameType; 7] = [
        FdnGameType::SignalEcho,
        FdnGameType::GhostRunner,
        FdnGameType::SpikeVector,
        FdnGameType::FirewallDecrypt,
        FdnGameType::CipherPath,
        FdnGameType::ExploitSequencer,
        FdnGameType::BreachDefense,
    ];

    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(FdnGameType::SignalEcho),
            1 => Some(FdnGameType::GhostRunner),
            2 => Some(FdnGameType::SpikeVector),
            3 => Some(FdnGameType::FirewallDecrypt),
            4 => Some(FdnGameType::CipherPath),
            5 => Some(FdnGameType::ExploitSequencer),
            6 => Some(FdnGameType::BreachDefense),
            7 => Some(FdnGameType::KonamiCode),
            _ => None,
        }
    }

    pub fn as_u8(&self) -> u8 {
        match self {
            FdnGameType::SignalEcho => 0,
            FdnGameType::GhostRunner => 1,
            FdnGameType::SpikeVector => 2,
            FdnGameType::FirewallDecrypt => 3,
            FdnGameType::CipherPath => 4,
            FdnGameType::ExploitSequencer => 5,
            FdnGameType::BreachDefense => 6,
            FdnGameType::KonamiCode => 7,
        }
    }

    /// Bit index into the progression masks. The Konami code encounter has
    /// no mask bit of its own.
    pub fn bit_index(&self) -> Option<u8> {
        let value = self.as_u8();
        (value < MINIGAME_COUNT).then_some(value)
    }

    /// The app that hosts this game, for the launch switch
    pub fn app_id(&self) -> Option<StateId> {
        self.bit_index().map(minigame_app_id)
    }

    pub fn name(&self) -> &'static str {
        match self {
            FdnGameType::SignalEcho => "SIGNAL ECHO",
            FdnGameType::GhostRunner => "GHOST RUNNER",
            FdnGameType::SpikeVector => "SPIKE VECTOR",
            FdnGameType::FirewallDecrypt => "FIREWALL DECRYPT",
            FdnGameType::CipherPath => "CIPHER PATH",
            FdnGameType::ExploitSequencer => "EXPLOIT SEQUENCER",
            FdnGameType::BreachDefense => "BREACH DEFENSE",
            FdnGameType::KonamiCode => "KONAMI CODE",
        }
    }
}

/// One detected encounter, recorded by the quickdraw idle loop and read by
/// the metagame router
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FdnEncounter {
    pub game: FdnGameType,
    /// The peer's button mask at broadcast time, shown on the detect screen
    pub peer_buttons: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Player {
    pub device_id: String,
    pub handle: String,
    pub role: Role,
    /// The game this badge carries and advertises when playing bounty
    pub assigned_game: FdnGameType,
    buttons: u8,
    hard_unlocks: u8,
    boons: u8,
    pub active_profile: u8,
    pub wins: u32,
    pub losses: u32,
    pub streak: u32,
    pub recreational: bool,
    pub last_fdn: Option<FdnEncounter>,
}

impl Default for Player {
    fn default() -> Self {
        Self {
            device_id: String::new(),
            handle: "UNNAMED".into(),
            role: Role::Hunter,
            assigned_game: FdnGameType::SignalEcho,
            buttons: 0,
            hard_unlocks: 0,
            boons: 0,
            active_profile: 0,
            wins: 0,
            losses: 0,
            streak: 0,
            recreational: false,
            last_fdn: None,
        }
    }
}

impl Player {
    pub fn new(device_id: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            handle: handle.into(),
            ..Self::default()
        }
    }

    // ── Button mask ─────────────────────────────────────────────────────

    pub fn unlock_button(&mut self, index: u8) {
        if index < MINIGAME_COUNT {
            self.buttons |= 1 << index;
        }
    }

    pub fn has_button(&self, index: u8) -> bool {
        index < MINIGAME_COUNT && self.buttons & (1 << index) != 0
    }

    pub fn has_all_buttons(&self) -> bool {
        self.buttons == ALL_BUTTONS_MASK
    }

    pub fn buttons_mask(&self) -> u8 {
        self.buttons
    }

    // ── Hard-mode unlocks ───────────────────────────────────────────────

    pub fn unlock_hard(&mut self, index: u8) {
        if index < MINIGAME_COUNT {
            self.hard_unlocks |= 1 << index;
        }
    }

    pub fn hard_unlocked(&self, index: u8) -> bool {
        index < MINIGAME_COUNT && self.hard_unlocks & (1 << index) != 0
    }

    // ── Boons (color-profile eligibility) ───────────────────────────────

    pub fn award_boon(&mut self, index: u8) {
        if index < MINIGAME_COUNT {
            self.boons |= 1 << index;
        }
    }

    pub fn has_boon(&self, index: u8) -> bool {
        index < MINIGAME_COUNT && self.boons & (1 << index) != 0
    }

    pub fn boons_mask(&self) -> u8 {
        self.boons
    }

    /// Profiles the player may select: the default plus one per boon
    pub fn unlocked_profiles(&self) -> Vec<u8> {
        let mut profiles = vec![0];
        for index in 0..MINIGAME_COUNT {
            if self.has_boon(index) {
                profiles.push(index + 1);
            }
        }
        profiles
    }

    // ── Match record keeping ────────────────────────────────────────────

    pub fn record_win(&mut self) {
        self.wins += 1;
        self.streak += 1;
    }

    pub fn record_loss(&mut self) {
        self.losses += 1;
        self.streak = 0;
    }
}
