//! [Pulse channel](https://www.nesdev.org/wiki/APU_Pulse) ($4000–$4003 = pulse 1, $4004–$4007 = pulse 2).
//!
//! Duty, envelope, sweep, length counter, 11-bit timer. The timer is clocked every 2 CPU cycles.
//! The two channels differ only in how the [sweep](https://www.nesdev.org/wiki/APU_Sweep) negates:
//! pulse 1 adds the one's complement of the change, pulse 2 the two's complement.

use serde::{Deserialize, Serialize};

use crate::apu::units::{Envelope, LengthCounter};
use crate::error::StateError;

/// Pulse channel duty cycles (8 steps). Duty 0=12.5%, 1=25%, 2=50%, 3=25% negated. Sequencer steps
/// 0→7→6→…→1.
const PULSE_DUTY: [[u8; 8]; 4] = [
    [0, 0, 0, 0, 0, 0, 0, 1],
    [0, 0, 0, 0, 0, 0, 1, 1],
    [0, 0, 0, 0, 1, 1, 1, 1],
    [1, 1, 1, 1, 1, 1, 0, 0],
];

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pulse {
    /// Pulse 1 negates with one's complement.
    ones_complement: bool,
    duty: u8,
    sequencer_step: u8,
    pub envelope: Envelope,
    pub length: LengthCounter,
    sweep_enabled: bool,
    sweep_period: u8,
    sweep_negate: bool,
    sweep_shift: u8,
    sweep_reload: bool,
    sweep_divider: u8,
    timer_period: u16,
    timer: u16,
}

impl Pulse {
    pub fn first() -> Self {
        Self {
            ones_complement: true,
            ..Self::default()
        }
    }

    pub fn second() -> Self {
        Self::default()
    }

    /// Register offset 0–3 within the channel's block.
    pub fn write(&mut self, reg: u16, data: u8) {
        match reg & 3 {
            0 => {
                self.duty = (data >> 6) & 3;
                self.length.halt = data & 0x20 != 0;
                self.envelope.write(data);
            }
            1 => {
                self.sweep_enabled = data & 0x80 != 0;
                self.sweep_period = (data >> 4) & 7;
                self.sweep_negate = data & 0x08 != 0;
                self.sweep_shift = data & 7;
                self.sweep_reload = true;
            }
            2 => self.timer_period = (self.timer_period & 0x0700) | data as u16,
            _ => {
                self.timer_period = (self.timer_period & 0x00FF) | ((data & 7) as u16) << 8;
                self.length.load(data);
                self.envelope.start = true;
                self.sequencer_step = 0;
            }
        }
    }

    /// Period the sweep unit would move to, computed continuously.
    fn target_period(&self) -> i32 {
        let period = self.timer_period as i32;
        let change = period >> self.sweep_shift;
        if !self.sweep_negate {
            period + change
        } else if self.ones_complement {
            period - change - 1
        } else {
            period - change
        }
    }

    /// Muted when the period is too short or the sweep target overflows 11 bits, even with the
    /// sweep unit disabled.
    fn muted(&self) -> bool {
        self.timer_period < 8 || self.target_period() > 0x7FF
    }

    /// Timer: every other CPU cycle.
    pub fn clock_timer(&mut self) {
        if self.timer > 0 {
            self.timer -= 1;
        } else {
            self.timer = self.timer_period;
            self.sequencer_step = self.sequencer_step.wrapping_sub(1) & 7;
        }
    }

    /// Half-frame sweep clock.
    pub fn clock_sweep(&mut self) {
        if self.sweep_divider == 0 && self.sweep_enabled && self.sweep_shift > 0 && !self.muted() {
            self.timer_period = self.target_period().max(0) as u16;
        }
        if self.sweep_divider == 0 || self.sweep_reload {
            self.sweep_divider = self.sweep_period;
            self.sweep_reload = false;
        } else {
            self.sweep_divider -= 1;
        }
    }

    pub fn output(&self) -> u8 {
        if !self.length.active()
            || self.muted()
            || PULSE_DUTY[self.duty as usize][self.sequencer_step as usize] == 0
        {
            return 0;
        }
        self.envelope.output()
    }

    pub fn timer_period(&self) -> u16 {
        self.timer_period
    }

    /// Reject snapshots whose duty, sequencer or sweep fields are wider than their registers.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.duty > 3 {
            return Err(StateError::OutOfRange("pulse duty"));
        }
        if self.sequencer_step > 7 {
            return Err(StateError::OutOfRange("pulse sequencer"));
        }
        if self.sweep_shift > 7 || self.sweep_period > 7 || self.sweep_divider > 7 {
            return Err(StateError::OutOfRange("pulse sweep"));
        }
        if self.timer_period > 0x7FF {
            return Err(StateError::OutOfRange("pulse timer"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured(mut pulse: Pulse, period: u16) -> Pulse {
        pulse.length.set_enabled(true);
        pulse.write(0, 0xBF);
        pulse.write(2, (period & 0xFF) as u8);
        pulse.write(3, (period >> 8) as u8);
        pulse
    }

    #[test]
    fn sweep_negate_differs_per_channel() {
        let mut one = configured(Pulse::first(), 0x100);
        let mut two = configured(Pulse::second(), 0x100);
        // Enabled, period 0, negate, shift 1.
        one.write(1, 0x89);
        two.write(1, 0x89);
        one.clock_sweep();
        two.clock_sweep();
        assert_eq!(one.timer_period(), 0x100 - 0x80 - 1);
        assert_eq!(two.timer_period(), 0x100 - 0x80);
    }

    #[test]
    fn overflowing_target_mutes_without_sweep() {
        let pulse = configured(Pulse::second(), 0x7F0);
        assert!(pulse.muted());
        let pulse = configured(Pulse::second(), 0x3FF);
        assert!(!pulse.muted());
    }

    #[test]
    fn validate_rejects_fields_wider_than_their_registers() {
        let pulse = configured(Pulse::first(), 0x100);
        assert!(pulse.validate().is_ok());

        let bad = Pulse { duty: 4, ..pulse.clone() };
        assert!(matches!(bad.validate(), Err(StateError::OutOfRange("pulse duty"))));
        let bad = Pulse { sequencer_step: 8, ..pulse.clone() };
        assert!(matches!(bad.validate(), Err(StateError::OutOfRange("pulse sequencer"))));
        let bad = Pulse { sweep_shift: 32, ..pulse.clone() };
        assert!(matches!(bad.validate(), Err(StateError::OutOfRange("pulse sweep"))));
        let bad = Pulse { timer_period: 0x800, ..pulse };
        assert!(matches!(bad.validate(), Err(StateError::OutOfRange("pulse timer"))));
    }

    #[test]
    fn short_period_mutes() {
        let pulse = configured(Pulse::second(), 7);
        assert_eq!(pulse.output(), 0);
    }
}
