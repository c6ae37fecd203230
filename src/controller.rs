//! NES controller input handling.
//!
//! Implements the standard NES controller shift register protocol: while bit 0 of $4016 is high
//! the controller keeps reloading, so every read returns button A. Once the strobe drops, each read
//! of $4016/$4017 returns the next button (A, B, Select, Start, Up, Down, Left, Right) and then 1
//! for every read until the next strobe.

use serde::{Deserialize, Serialize};

/// Button bits as stored in [`Controller::buttons`].
pub struct Button;

impl Button {
    pub const A: u8 = 1 << 0;
    pub const B: u8 = 1 << 1;
    pub const SELECT: u8 = 1 << 2;
    pub const START: u8 = 1 << 3;
    pub const UP: u8 = 1 << 4;
    pub const DOWN: u8 = 1 << 5;
    pub const LEFT: u8 = 1 << 6;
    pub const RIGHT: u8 = 1 << 7;
}

/// Represents a single NES controller.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    /// Current button states: bit 0 = A, 1 = B, 2 = Select, 3 = Start, 4 = Up, 5 = Down, 6 = Left, 7 = Right.
    pub buttons: u8,
    /// Index of the next button to report; 8 and above report 1.
    index: u8,
    strobe: bool,
}

impl Controller {
    /// Create a new controller with no buttons pressed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read one button bit, OR'd with open bus ($40).
    pub fn read(&mut self) -> u8 {
        let bit = if self.index < 8 {
            (self.buttons >> self.index) & 1
        } else {
            1
        };
        if !self.strobe && self.index < 8 {
            self.index += 1;
        }
        bit | 0x40
    }

    /// Write to $4016. Bit 0 is the strobe; any write with it set rewinds to button A.
    pub fn write(&mut self, data: u8) {
        self.strobe = data & 1 != 0;
        if self.strobe {
            self.index = 0;
        }
    }
}
