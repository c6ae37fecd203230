//! [DMC channel](https://www.nesdev.org/wiki/APU_DMC) ($4010–$4013): delta modulation, 7-bit
//! output, one-byte sample buffer, CPU stall on fetch.
//!
//! Sample address is `$C000 | value << 6`, length `value << 4 | 1`. The memory reader refills the
//! sample buffer through a [`DmcPort`] as soon as it empties, stalling the CPU 4 cycles per byte.

use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// DMC rate table (NTSC): 4-bit index from $4010 → CPU cycles per output bit.
pub const DMC_RATE_TABLE: [u16; 16] = [
    428, 380, 340, 320, 286, 254, 226, 214, 190, 160, 142, 128, 106, 84, 72, 54,
];

/// CPU cycles the memory reader steals per sample byte.
pub const DMC_STALL_CYCLES: usize = 4;

/// The DMC's window onto the rest of the machine: read CPU address space and steal cycles.
pub trait DmcPort {
    fn read(&mut self, addr: u16) -> u8;
    fn stall(&mut self, cycles: usize);
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Dmc {
    pub irq_enabled: bool,
    pub irq_pending: bool,
    looping: bool,
    rate: u16,
    timer: u16,
    output_level: u8,
    sample_address: u16,
    sample_length: u16,
    current_address: u16,
    bytes_remaining: u16,
    sample_buffer: Option<u8>,
    shift_register: u8,
    bits_remaining: u8,
    silence: bool,
}

impl Default for Dmc {
    fn default() -> Self {
        Self {
            irq_enabled: false,
            irq_pending: false,
            looping: false,
            rate: DMC_RATE_TABLE[0],
            timer: 0,
            output_level: 0,
            sample_address: 0xC000,
            sample_length: 1,
            current_address: 0xC000,
            bytes_remaining: 0,
            sample_buffer: None,
            shift_register: 0,
            bits_remaining: 8,
            silence: true,
        }
    }
}

impl Dmc {
    pub fn write(&mut self, reg: u16, data: u8) {
        match reg & 3 {
            0 => {
                self.irq_enabled = data & 0x80 != 0;
                if !self.irq_enabled {
                    self.irq_pending = false;
                }
                self.looping = data & 0x40 != 0;
                self.rate = DMC_RATE_TABLE[(data & 0x0F) as usize];
            }
            1 => self.output_level = data & 0x7F,
            2 => self.sample_address = 0xC000 | (data as u16) << 6,
            _ => self.sample_length = (data as u16) << 4 | 1,
        }
    }

    /// $4015 bit 4. Disabling drops the remaining bytes; enabling restarts an idle sample.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.irq_pending = false;
        if !enabled {
            self.bytes_remaining = 0;
        } else if self.bytes_remaining == 0 {
            self.restart();
        }
    }

    fn restart(&mut self) {
        self.current_address = self.sample_address;
        self.bytes_remaining = self.sample_length;
    }

    pub fn active(&self) -> bool {
        self.bytes_remaining > 0
    }

    /// One CPU cycle: refill the sample buffer if needed, then run the output unit.
    pub fn step(&mut self, port: &mut impl DmcPort) {
        if self.sample_buffer.is_none() && self.bytes_remaining > 0 {
            self.fetch(port);
        }

        if self.timer > 0 {
            self.timer -= 1;
            return;
        }
        self.timer = self.rate - 1;

        if !self.silence {
            if self.shift_register & 1 != 0 {
                if self.output_level <= 125 {
                    self.output_level += 2;
                }
            } else if self.output_level >= 2 {
                self.output_level -= 2;
            }
        }
        self.shift_register >>= 1;

        self.bits_remaining -= 1;
        if self.bits_remaining == 0 {
            self.bits_remaining = 8;
            match self.sample_buffer.take() {
                Some(byte) => {
                    self.shift_register = byte;
                    self.silence = false;
                }
                None => self.silence = true,
            }
        }
    }

    fn fetch(&mut self, port: &mut impl DmcPort) {
        port.stall(DMC_STALL_CYCLES);
        self.sample_buffer = Some(port.read(self.current_address));
        self.current_address = match self.current_address {
            0xFFFF => 0x8000,
            addr => addr + 1,
        };
        self.bytes_remaining -= 1;
        if self.bytes_remaining == 0 {
            if self.looping {
                self.restart();
            } else if self.irq_enabled {
                self.irq_pending = true;
            }
        }
    }

    pub fn output(&self) -> u8 {
        self.output_level
    }

    /// The rate must come from the rate table and the output shifter holds 1–8 bits.
    pub fn validate(&self) -> Result<(), StateError> {
        if !DMC_RATE_TABLE.contains(&self.rate) {
            return Err(StateError::OutOfRange("dmc rate"));
        }
        if !(1..=8).contains(&self.bits_remaining) {
            return Err(StateError::OutOfRange("dmc shifter"));
        }
        if self.output_level > 0x7F {
            return Err(StateError::OutOfRange("dmc output level"));
        }
        Ok(())
    }
}
