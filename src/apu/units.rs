//! Building blocks shared by the tone channels: [length counter](https://www.nesdev.org/wiki/APU_Length_Counter)
//! and [envelope](https://www.nesdev.org/wiki/APU_Envelope).

use serde::{Deserialize, Serialize};

/// Length counter lookup table: 5-bit index from register → count.
pub const LENGTH_TABLE: [u8; 32] = [
    10, 254, 20, 2, 40, 4, 80, 6, 160, 8, 60, 10, 14, 12, 26, 14, 12, 16, 24, 18, 48, 20, 96, 22,
    192, 24, 72, 26, 16, 28, 32, 30,
];

/// Length counter gated by the channel's $4015 enable bit.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LengthCounter {
    pub enabled: bool,
    pub halt: bool,
    pub value: u8,
}

impl LengthCounter {
    /// Load from the upper five bits of the channel's fourth register. Ignored while disabled.
    pub fn load(&mut self, data: u8) {
        if self.enabled {
            self.value = LENGTH_TABLE[(data >> 3) as usize & 0x1F];
        }
    }

    /// Disabling a channel clears its counter immediately.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.value = 0;
        }
    }

    /// Half-frame clock.
    pub fn clock(&mut self) {
        if !self.halt && self.value > 0 {
            self.value -= 1;
        }
    }

    pub fn active(&self) -> bool {
        self.value > 0
    }
}

/// Envelope generator: constant volume or a 15→0 decay that optionally loops.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub start: bool,
    /// Shares the channel's length-halt bit.
    pub looping: bool,
    pub constant: bool,
    /// Constant volume, or the divider period when decaying.
    pub volume: u8,
    divider: u8,
    decay: u8,
}

impl Envelope {
    /// $4000/$4004/$400C low six bits.
    pub fn write(&mut self, data: u8) {
        self.looping = data & 0x20 != 0;
        self.constant = data & 0x10 != 0;
        self.volume = data & 0x0F;
    }

    /// Quarter-frame clock.
    pub fn clock(&mut self) {
        if self.start {
            self.start = false;
            self.decay = 15;
            self.divider = self.volume;
        } else if self.divider > 0 {
            self.divider -= 1;
        } else {
            self.divider = self.volume;
            if self.decay > 0 {
                self.decay -= 1;
            } else if self.looping {
                self.decay = 15;
            }
        }
    }

    pub fn output(&self) -> u8 {
        if self.constant { self.volume } else { self.decay }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_decays_then_holds() {
        let mut envelope = Envelope::default();
        envelope.write(0x00);
        envelope.start = true;
        envelope.clock();
        assert_eq!(envelope.output(), 15);
        for _ in 0..20 {
            envelope.clock();
        }
        assert_eq!(envelope.output(), 0);
    }

    #[test]
    fn envelope_loops_when_halted() {
        let mut envelope = Envelope::default();
        envelope.write(0x20);
        envelope.start = true;
        envelope.clock();
        for _ in 0..15 {
            envelope.clock();
        }
        assert_eq!(envelope.output(), 0);
        envelope.clock();
        assert_eq!(envelope.output(), 15);
    }

    #[test]
    fn disabled_length_counter_ignores_loads() {
        let mut length = LengthCounter::default();
        length.load(0x08);
        assert_eq!(length.value, 0);
        length.set_enabled(true);
        length.load(0x08);
        assert_eq!(length.value, 254);
        length.set_enabled(false);
        assert!(!length.active());
    }
}
