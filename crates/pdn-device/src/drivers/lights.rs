//! LED strip animations
//!
//! The strip runs one animation at a time. Starting a new animation replaces
//! the current one, so states can set their lighting on mount without caring
//! what ran before.

use pdn_core::prelude::*;

/// Built-in animation programs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationKind {
    /// Slow ambient breathing, used on idle screens
    Idle,
    /// Single lit pixel sweeping top to bottom
    VerticalChase,
    /// Whole-strip brightness pulse
    Pulse,
    /// Solid ramp in the hunter accent color
    HunterWin,
    /// Solid ramp in the bounty accent color
    BountyWin,
    /// Fast alternating flash, used on duel countdown
    Strobe,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EaseCurve {
    Linear,
    EaseIn,
    EaseOut,
    EaseInOut,
}

/// Everything needed to start an animation
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnimationConfig {
    pub kind: AnimationKind,
    pub looped: bool,
    /// Playback speed multiplier, 1.0 is authored speed
    pub speed: f32,
    pub curve: EaseCurve,
    /// Pause between loop iterations
    pub loop_delay_ms: u32,
}

impl AnimationConfig {
    pub fn new(kind: AnimationKind) -> Self {
        Self {
            kind,
            looped: false,
            speed: 1.0,
            curve: EaseCurve::Linear,
            loop_delay_ms: 0,
        }
    }

    pub fn looped(kind: AnimationKind) -> Self {
        Self {
            looped: true,
            ..Self::new(kind)
        }
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    pub fn with_curve(mut self, curve: EaseCurve) -> Self {
        self.curve = curve;
        self
    }

    pub fn with_loop_delay(mut self, delay_ms: u32) -> Self {
        self.loop_delay_ms = delay_ms;
        self
    }
}

#[derive(Default)]
pub struct LightManager {
    active: Option<AnimationConfig>,
}

impl LightManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, config: AnimationConfig) {
        trace!(kind = ?config.kind, looped = config.looped, "light animation start");
        self.active = Some(config);
    }

    pub fn stop(&mut self) {
        self.active = None;
    }

    /// Stop and blank the strip
    pub fn clear(&mut self) {
        self.active = None;
    }

    pub fn is_animating(&self) -> bool {
        self.active.is_some()
    }

    pub fn active(&self) -> Option<&AnimationConfig> {
        self.active.as_ref()
    }
}
