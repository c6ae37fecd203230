//! [Noise channel](https://www.nesdev.org/wiki/APU_Noise) ($400C–$400F): envelope, 15-bit LFSR,
//! period from $400E, length counter.

use serde::{Deserialize, Serialize};

use crate::apu::units::{Envelope, LengthCounter};
use crate::error::StateError;

/// Noise channel period table (NTSC): 4-bit index from $400E → period in CPU cycles.
pub const NOISE_PERIOD_TABLE: [u16; 16] = [
    4, 8, 16, 32, 64, 96, 128, 160, 202, 254, 380, 508, 762, 1016, 2034, 4068,
];

/// Pseudo-random output from a 15-bit LFSR; short mode taps bit 6 instead of bit 1 (metallic tone).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Noise {
    pub envelope: Envelope,
    pub length: LengthCounter,
    short_mode: bool,
    period: u16,
    timer: u16,
    shift: u16,
}

impl Default for Noise {
    fn default() -> Self {
        Self {
            envelope: Envelope::default(),
            length: LengthCounter::default(),
            short_mode: false,
            period: NOISE_PERIOD_TABLE[0],
            timer: 0,
            shift: 1,
        }
    }
}

impl Noise {
    pub fn write(&mut self, reg: u16, data: u8) {
        match reg & 3 {
            0 => {
                self.length.halt = data & 0x20 != 0;
                self.envelope.write(data);
            }
            1 => {}
            2 => {
                self.short_mode = data & 0x80 != 0;
                self.period = NOISE_PERIOD_TABLE[(data & 0x0F) as usize];
            }
            _ => {
                self.length.load(data);
                self.envelope.start = true;
            }
        }
    }

    pub fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.period;
        let tap = if self.short_mode { 6 } else { 1 };
        let feedback = (self.shift & 1) ^ ((self.shift >> tap) & 1);
        self.shift = (self.shift >> 1) | (feedback << 14);
    }

    pub fn output(&self) -> u8 {
        if !self.length.active() || self.shift & 1 != 0 {
            return 0;
        }
        self.envelope.output()
    }

    /// A zeroed shift register never leaves zero, which would silence the channel for good.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.shift == 0 || self.shift > 0x7FFF {
            return Err(StateError::OutOfRange("noise shift register"));
        }
        if !NOISE_PERIOD_TABLE.contains(&self.period) {
            return Err(StateError::OutOfRange("noise period"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lfsr_never_locks_up() {
        for short_mode in [0x00, 0x80] {
            let mut noise = Noise::default();
            noise.write(2, short_mode);
            for _ in 0..10_000 {
                noise.clock_timer();
                assert_ne!(noise.shift, 0);
            }
        }
    }

    #[test]
    fn validate_rejects_a_stuck_shift_register() {
        assert!(Noise::default().validate().is_ok());
        let noise = Noise {
            shift: 0,
            ..Noise::default()
        };
        assert!(matches!(
            noise.validate(),
            Err(StateError::OutOfRange("noise shift register"))
        ));
    }

    #[test]
    fn long_mode_period_is_32767() {
        let mut noise = Noise::default();
        let start = noise.shift;
        let mut steps = 0;
        loop {
            // period 4: the shift register moves every 5 timer clocks
            for _ in 0..5 {
                noise.clock_timer();
            }
            steps += 1;
            if noise.shift == start {
                break;
            }
        }
        assert_eq!(steps, 32767);
    }
}
