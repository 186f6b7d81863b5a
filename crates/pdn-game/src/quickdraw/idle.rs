//! Idle, the color picker, and the sleep/wake pair

use pdn_core::prelude::*;
use pdn_core::{Flag, State, StateId, StateTransition, Timer};
use pdn_device::drivers::{AnimationConfig, AnimationKind, Button, ButtonInteraction};
use pdn_device::{DeviceContext, Message};

use crate::config::Settings;
use crate::player::{FdnEncounter, FdnGameType, Role, SharedPlayer};
use crate::progress::ProgressManager;

use super::{
    ids, IDX_AWAKEN, IDX_COLOR_PICKER, IDX_FDN_DETECTED, IDX_HANDSHAKE_INITIATE, IDX_IDLE,
    IDX_SLEEP,
};

const PICKER_TIMEOUT_MS: u64 = 10_000;
const AWAKEN_SPLASH_MS: u64 = 1200;

// ─────────────────────────────────────────────────────────────────
// Idle
// ─────────────────────────────────────────────────────────────────

/// Home screen. Bounties beacon their FDN here; hunters listen for one.
///
/// Mounting drains the inbound queue so a beacon left over from an earlier
/// encounter can't re-trigger the detect screen the moment we return.
pub struct IdleState {
    id: StateId,
    player: SharedPlayer,
    beacon_interval_ms: u64,
    sleep_timeout_ms: u64,
    beacon: Timer,
    sleep: Timer,
    to_color_picker: Flag,
    to_fdn_detected: Flag,
    to_handshake: Flag,
    to_sleep: Flag,
    transitions: Vec<StateTransition>,
}

impl IdleState {
    pub fn new(settings: &Settings, player: SharedPlayer) -> Self {
        let to_color_picker = Flag::new();
        let to_fdn_detected = Flag::new();
        let to_handshake = Flag::new();
        let to_sleep = Flag::new();
        let transitions = vec![
            StateTransition::when(&to_color_picker, IDX_COLOR_PICKER),
            StateTransition::when(&to_fdn_detected, IDX_FDN_DETECTED),
            StateTransition::when(&to_handshake, IDX_HANDSHAKE_INITIATE),
            StateTransition::when(&to_sleep, IDX_SLEEP),
        ];
        Self {
            id: ids::IDLE,
            player,
            beacon_interval_ms: settings.handshake.beacon_interval_ms,
            sleep_timeout_ms: settings.sleep.timeout_ms,
            beacon: Timer::new(),
            sleep: Timer::new(),
            to_color_picker,
            to_fdn_detected,
            to_handshake,
            to_sleep,
            transitions,
        }
    }

    fn draw(&self, ctx: &mut DeviceContext) {
        let player = self.player.borrow();
        ctx.display.clear();
        ctx.display.draw_centered_text(8, player.handle.clone());
        ctx.display.draw_centered_text(22, player.role.label());
        ctx.display
            .draw_centered_text(36, format!("W:{} L:{}", player.wins, player.losses));
        ctx.display.draw_centered_text(
            50,
            format!("BTNS {}/7", player.buttons_mask().count_ones()),
        );
        ctx.display.render();
    }
}

impl State<DeviceContext> for IdleState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.to_color_picker.lower();
        self.to_fdn_detected.lower();
        self.to_handshake.lower();
        self.to_sleep.lower();

        ctx.buttons.claim(self.id);

        // flush anything queued while another state held the floor
        let mut flushed = 0;
        while ctx.link.recv().is_some() {
            flushed += 1;
        }
        if flushed > 0 {
            debug!(flushed, "stale link messages dropped on idle entry");
        }

        let now = ctx.now_ms();
        self.beacon.start(now, 0);
        self.sleep.start(now, self.sleep_timeout_ms);

        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Idle));
        self.draw(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        let now = ctx.now_ms();
        let role = self.player.borrow().role;

        while let Some(press) = ctx.buttons.take_press(self.id) {
            self.sleep.start(now, self.sleep_timeout_ms);
            if press.button == Button::Primary
                && press.interaction == ButtonInteraction::LongPress
            {
                self.to_color_picker.raise();
            }
        }

        while let Some(message) = ctx.link.recv() {
            match message {
                Message::Fdn { game, buttons } if role == Role::Hunter => {
                    match FdnGameType::from_u8(game) {
                        Some(game) => {
                            self.player.borrow_mut().last_fdn = Some(FdnEncounter {
                                game,
                                peer_buttons: buttons,
                            });
                            info!(game = game.name(), "FDN beacon heard");
                            self.to_fdn_detected.raise();
                        }
                        None => warn!(game, "beacon carries an unknown game id"),
                    }
                }
                Message::Fack if role == Role::Bounty => {
                    info!("beacon answered, opening handshake");
                    self.to_handshake.raise();
                }
                other => trace!(?other, "message ignored in idle"),
            }
        }

        if role == Role::Bounty && ctx.link.is_connected() && self.beacon.expired(now) {
            let beacon = {
                let player = self.player.borrow();
                Message::Fdn {
                    game: player.assigned_game.as_u8(),
                    buttons: player.buttons_mask(),
                }
            };
            if let Err(err) = ctx.link.send(&beacon) {
                debug!(%err, "beacon send failed");
            }
            self.beacon.start(now, self.beacon_interval_ms);
        }

        // the cable counts as activity
        if ctx.link.is_connected() {
            self.sleep.start(now, self.sleep_timeout_ms);
        }
        if self.sleep.expired(now) {
            self.to_sleep.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
        ctx.lights.stop();
        self.beacon.invalidate();
        self.sleep.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// ColorPicker
// ─────────────────────────────────────────────────────────────────

/// Cycle through the color profiles unlocked by boons. Primary steps,
/// secondary confirms, a quiet timeout backs out without saving.
pub struct ColorPickerState {
    id: StateId,
    player: SharedPlayer,
    progress: ProgressManager,
    profiles: Vec<u8>,
    selection: usize,
    done: Flag,
    timeout: Timer,
    transitions: Vec<StateTransition>,
}

impl ColorPickerState {
    pub fn new(player: SharedPlayer, progress: ProgressManager) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_IDLE)];
        Self {
            id: ids::COLOR_PICKER,
            player,
            progress,
            profiles: Vec::new(),
            selection: 0,
            done,
            timeout: Timer::new(),
            transitions,
        }
    }

    fn draw(&self, ctx: &mut DeviceContext) {
        ctx.display.clear();
        ctx.display.draw_centered_text(10, "COLOR PROFILE");
        let profile = self.profiles.get(self.selection).copied().unwrap_or(0);
        let label = if profile == 0 {
            "< STANDARD >".to_string()
        } else {
            format!("< PROFILE {} >", profile)
        };
        ctx.display.draw_centered_text(30, label);
        if self.player.borrow().active_profile == profile {
            ctx.display.draw_centered_text(44, "(ACTIVE)");
        }
        ctx.display.draw_centered_text(56, "[P] NEXT  [S] SET");
        ctx.display.render();
    }
}

impl State<DeviceContext> for ColorPickerState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();
        ctx.buttons.claim(self.id);

        let player = self.player.borrow();
        self.profiles = player.unlocked_profiles();
        self.selection = self
            .profiles
            .iter()
            .position(|&p| p == player.active_profile)
            .unwrap_or(0);
        drop(player);

        self.timeout.start(ctx.now_ms(), PICKER_TIMEOUT_MS);
        ctx.lights
            .start(AnimationConfig::looped(AnimationKind::Pulse));
        self.draw(ctx);
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        let now = ctx.now_ms();
        let mut redraw = false;

        while let Some(press) = ctx.buttons.take_press(self.id) {
            self.timeout.start(now, PICKER_TIMEOUT_MS);
            match press.button {
                Button::Primary => {
                    if !self.profiles.is_empty() {
                        self.selection = (self.selection + 1) % self.profiles.len();
                        redraw = true;
                    }
                }
                Button::Secondary => {
                    let profile = self.profiles.get(self.selection).copied().unwrap_or(0);
                    self.player.borrow_mut().active_profile = profile;
                    if let Err(err) =
                        self.progress.save_player(&ctx.storage, &self.player.borrow())
                    {
                        warn!(%err, "profile selection not saved");
                    }
                    info!(profile, "color profile set");
                    self.done.raise();
                }
            }
        }

        if redraw {
            self.draw(ctx);
        }
        if self.timeout.expired(now) {
            self.done.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
        ctx.lights.stop();
        self.timeout.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

// ─────────────────────────────────────────────────────────────────
// Sleep / Awaken
// ─────────────────────────────────────────────────────────────────

/// Everything dark until a press or a cable wakes the device
pub struct SleepState {
    id: StateId,
    awaken: Flag,
    transitions: Vec<StateTransition>,
}

impl SleepState {
    pub fn new() -> Self {
        let awaken = Flag::new();
        let transitions = vec![StateTransition::when(&awaken, IDX_AWAKEN)];
        Self {
            id: ids::SLEEP,
            awaken,
            transitions,
        }
    }
}

impl Default for SleepState {
    fn default() -> Self {
        Self::new()
    }
}

impl State<DeviceContext> for SleepState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.awaken.lower();
        ctx.buttons.claim(self.id);
        ctx.display.clear();
        ctx.display.render();
        ctx.lights.clear();
        ctx.haptics.off();
        info!("device sleeping");
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if ctx.buttons.take_press(self.id).is_some() || ctx.link.is_connected() {
            self.awaken.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.buttons.release(self.id);
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}

/// Short wake splash on the way back to idle
pub struct AwakenState {
    id: StateId,
    player: SharedPlayer,
    done: Flag,
    splash: Timer,
    transitions: Vec<StateTransition>,
}

impl AwakenState {
    pub fn new(player: SharedPlayer) -> Self {
        let done = Flag::new();
        let transitions = vec![StateTransition::when(&done, IDX_IDLE)];
        Self {
            id: ids::AWAKEN,
            player,
            done,
            splash: Timer::new(),
            transitions,
        }
    }
}

impl State<DeviceContext> for AwakenState {
    fn id(&self) -> StateId {
        self.id
    }

    fn on_mounted(&mut self, ctx: &mut DeviceContext) {
        self.done.lower();
        self.splash.start(ctx.now_ms(), AWAKEN_SPLASH_MS);
        ctx.lights
            .start(AnimationConfig::new(AnimationKind::VerticalChase));
        ctx.display.clear();
        ctx.display
            .draw_centered_text(28, self.player.borrow().handle.clone());
        ctx.display.render();
    }

    fn on_loop(&mut self, ctx: &mut DeviceContext) {
        if self.splash.expired(ctx.now_ms()) {
            self.done.raise();
        }
    }

    fn on_dismounted(&mut self, ctx: &mut DeviceContext) {
        ctx.lights.stop();
        self.splash.invalidate();
    }

    fn transitions(&self) -> &[StateTransition] {
        &self.transitions
    }
}
