//! Difficulty scaling shared by the minigames
//!
//! Each game defines an easy and a hard tuning and interpolates between them.
//! Today only the endpoints are reachable, but keeping the parameter
//! continuous lets a game derive intermediate tunings from the player's
//! streak later without touching its config plumbing.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Difficulty {
    t: f32,
}

impl Difficulty {
    pub fn easy() -> Self {
        Self { t: 0.0 }
    }

    pub fn hard() -> Self {
        Self { t: 1.0 }
    }

    pub fn from_hard_flag(hard: bool) -> Self {
        if hard {
            Self::hard()
        } else {
            Self::easy()
        }
    }

    pub fn new(t: f32) -> Self {
        Self { t: t.clamp(0.0, 1.0) }
    }

    pub fn is_hard(&self) -> bool {
        self.t >= 0.5
    }

    /// Interpolate a count-like value, rounding to nearest
    pub fn lerp_u32(&self, easy: u32, hard: u32) -> u32 {
        let a = easy as f32;
        let b = hard as f32;
        (a + (b - a) * self.t).round() as u32
    }

    /// Interpolate a duration in milliseconds
    pub fn lerp_ms(&self, easy: u64, hard: u64) -> u64 {
        let a = easy as f32;
        let b = hard as f32;
        (a + (b - a) * self.t).round() as u64
    }

    pub fn lerp_usize(&self, easy: usize, hard: usize) -> usize {
        self.lerp_u32(easy as u32, hard as u32) as usize
    }
}
