//! [Triangle channel](https://www.nesdev.org/wiki/APU_Triangle) ($4008–$400B): linear counter
//! (7-bit), length counter, 32-step triangle wave. The timer runs at CPU rate, one octave below a
//! pulse with the same period.

use serde::{Deserialize, Serialize};

use crate::apu::units::LengthCounter;
use crate::error::StateError;

/// 32-step waveform: 15 down to 0, then 0 up to 15. No volume control.
const TRIANGLE_SEQUENCE: [u8; 32] = [
    15, 14, 13, 12, 11, 10, 9, 8, 7, 6, 5, 4, 3, 2, 1, 0, 0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12,
    13, 14, 15,
];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Triangle {
    pub length: LengthCounter,
    /// Bit 7 of $4008: halts the length counter and keeps the linear counter reloading.
    control: bool,
    linear_load: u8,
    linear_counter: u8,
    linear_reload: bool,
    timer_period: u16,
    timer: u16,
    sequencer_step: u8,
}

impl Triangle {
    pub fn write(&mut self, reg: u16, data: u8) {
        match reg & 3 {
            0 => {
                self.control = data & 0x80 != 0;
                self.length.halt = self.control;
                self.linear_load = data & 0x7F;
            }
            1 => {}
            2 => self.timer_period = (self.timer_period & 0x0700) | data as u16,
            _ => {
                self.timer_period = (self.timer_period & 0x00FF) | ((data & 7) as u16) << 8;
                self.length.load(data);
                self.linear_reload = true;
            }
        }
    }

    /// Quarter-frame clock.
    pub fn clock_linear(&mut self) {
        if self.linear_reload {
            self.linear_counter = self.linear_load;
        } else if self.linear_counter > 0 {
            self.linear_counter -= 1;
        }
        if !self.control {
            self.linear_reload = false;
        }
    }

    pub fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.timer_period;
        if self.length.active() && self.linear_counter > 0 {
            self.sequencer_step = (self.sequencer_step + 1) & 31;
        }
    }

    /// Ultrasonic periods (< 2) are silenced instead of aliasing.
    pub fn output(&self) -> u8 {
        if !self.length.active() || self.linear_counter == 0 || self.timer_period < 2 {
            return 0;
        }
        TRIANGLE_SEQUENCE[self.sequencer_step as usize]
    }

    pub fn validate(&self) -> Result<(), StateError> {
        if self.sequencer_step as usize >= TRIANGLE_SEQUENCE.len() {
            return Err(StateError::OutOfRange("triangle sequencer"));
        }
        if self.linear_load > 0x7F || self.timer_period > 0x7FF {
            return Err(StateError::OutOfRange("triangle timer"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequencer_walks_the_whole_wave() {
        let mut triangle = Triangle::default();
        triangle.length.set_enabled(true);
        triangle.write(0, 0x81);
        triangle.write(2, 0x10);
        triangle.write(3, 0x08);
        triangle.clock_linear();

        let mut seen = Vec::new();
        for _ in 0..32 * 0x11 {
            triangle.clock_timer();
            seen.push(triangle.output());
        }
        assert!(seen.contains(&0));
        assert!(seen.contains(&15));
        assert!(triangle.validate().is_ok());
    }

    #[test]
    fn validate_rejects_a_step_past_the_wave() {
        let triangle = Triangle {
            sequencer_step: 32,
            ..Triangle::default()
        };
        assert!(matches!(
            triangle.validate(),
            Err(StateError::OutOfRange("triangle sequencer"))
        ));
    }
}
