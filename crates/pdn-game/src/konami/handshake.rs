//! Metagame entry routing

use pdn_core::prelude::*;
use pdn_core::{State, StateId};
use pdn_device::DeviceContext;

use crate::player::{FdnGameType, Player, SharedPlayer};

use super::{
    ids, IDX_CODE_ENTRY, IDX_CODE_REJECTED, IDX_EASY_BASE, IDX_GAME_OVER, IDX_HARD_BASE,
    IDX_MASTERY_BASE, IDX_REPLAY_BASE,
};

/// Route the entry by encounter and progression. Mastery outranks the hard
/// unlock, which outranks an earned button; a fresh game starts easy. The
/// code encounter opens only to a full button set.
pub fn calculate_target_state(player: &Player) -> usize {
    let Some(encounter) = player.last_fdn else {
        warn!("metagame entered with no encounter on record");
        return IDX_GAME_OVER;
    };
    if encounter.game == FdnGameType::KonamiCode {
        return if player.has_all_buttons() {
            IDX_CODE_ENTRY
        } else {
            IDX_CODE_REJECTED
        };
    }
    let Some(index) = encounter.game.bit_index() else {
        return IDX_GAME_OVER;
    };
    let offset = usize::from(index);
    if player.has_boon(index) {
        IDX_MASTERY_BASE + offset
    } else if player.hard_unlocked(index) {
        IDX_HARD_BASE + offset
    } else if player.has_button(index) {
        IDX_REPLAY_BASE + offset
    } else {
        IDX_EASY_BASE + offset
    }
}

/// The router itself: one splash frame, then a computed jump
pub struct KonamiHandshakeState {
    id: StateId,
    player: SharedPlayer,
}

impl KonamiHandshakeState {
    pub fn new(player: SharedPlayer) -> Self {
        Self {
            id: ids::HANDSHAKE,
            player,
        }
    }
}

impl State<DeviceContext> for KonamiHandshakeState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        let game_name = self
            .player
            .borrow()
            .last_fdn
            .map(|encounter| encounter.game.name())
            .unwrap_or("UNKNOWN");
        ctx.display.clear();
        ctx.display.draw_centered_text(20, "FDN LINK");
        ctx.display.draw_centered_text(38, game_name);
        ctx.display.render();
    }

    fn on_loop(&mut self, _ctx: &mut DeviceContext) {}

    fn on_dismounted(&mut self, _ctx: &mut DeviceContext) {}

    fn dynamic_target(&mut self, _ctx: &mut DeviceContext) -> Option<usize> {
        let target = calculate_target_state(&self.player.borrow());
        debug!(target, "metagame routed");
        Some(target)
    }
}
