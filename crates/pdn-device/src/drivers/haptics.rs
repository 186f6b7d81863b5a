//! Vibration motor

use pdn_core::prelude::*;

#[derive(Default)]
pub struct HapticDriver {
    intensity: u8,
}

impl HapticDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0 is off, 255 is full power
    pub fn set_intensity(&mut self, intensity: u8) {
        if intensity != self.intensity {
            trace!(intensity, "haptic intensity change");
        }
        self.intensity = intensity;
    }

    pub fn off(&mut self) {
        self.set_intensity(0);
    }

    pub fn intensity(&self) -> u8 {
        self.intensity
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_off_zeroes_intensity() {
        let mut haptics = HapticDriver::new();
        haptics.set_intensity(200);
        assert_eq!(haptics.intensity(), 200);
        haptics.off();
        assert_eq!(haptics.intensity(), 0);
    }
}
