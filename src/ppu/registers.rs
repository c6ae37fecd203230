//! PPU register bits and the internal scroll registers.
//!
//! See [PPU registers](https://www.nesdev.org/wiki/PPU_registers) and
//! [PPU scrolling](https://www.nesdev.org/wiki/PPU_scrolling). `v` and `t` share the 15-bit layout
//! `yyy NN YYYYY XXXXX`: fine Y, nametable select, coarse Y, coarse X.

use serde::{Deserialize, Serialize};

// PPUCTRL ($2000)
pub const CTRL_NAMETABLE: u8 = 0x03;
pub const CTRL_INCREMENT_32: u8 = 0x04;
pub const CTRL_SPRITE_TABLE: u8 = 0x08;
pub const CTRL_BG_TABLE: u8 = 0x10;
pub const CTRL_SPRITE_16: u8 = 0x20;
pub const CTRL_NMI: u8 = 0x80;

// PPUMASK ($2001)
pub const MASK_GREYSCALE: u8 = 0x01;
pub const MASK_BG_LEFT: u8 = 0x02;
pub const MASK_SPRITE_LEFT: u8 = 0x04;
pub const MASK_BG: u8 = 0x08;
pub const MASK_SPRITES: u8 = 0x10;
/// Red/green/blue emphasis (bits 5–7). Stored and reported, not applied to palette indices.
pub const MASK_EMPHASIS: u8 = 0xE0;

// PPUSTATUS ($2002)
pub const STATUS_OVERFLOW: u8 = 0x20;
pub const STATUS_SPRITE0: u8 = 0x40;
pub const STATUS_VBLANK: u8 = 0x80;

const COARSE_X: u16 = 0x001F;
const COARSE_Y: u16 = 0x03E0;
const NAMETABLE_X: u16 = 0x0400;
const NAMETABLE_Y: u16 = 0x0800;
const FINE_Y: u16 = 0x7000;

/// Current address `v`, temporary address `t`, fine X scroll, and the shared write toggle `w`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Loopy {
    pub v: u16,
    pub t: u16,
    pub fine_x: u8,
    pub w: bool,
}

impl Loopy {
    /// $2000 write: nametable select goes into `t`.
    pub fn write_ctrl(&mut self, data: u8) {
        self.t = (self.t & !(NAMETABLE_X | NAMETABLE_Y)) | (((data & CTRL_NAMETABLE) as u16) << 10);
    }

    /// $2005: first write coarse/fine X, second write coarse/fine Y.
    pub fn write_scroll(&mut self, data: u8) {
        if !self.w {
            self.t = (self.t & !COARSE_X) | (data >> 3) as u16;
            self.fine_x = data & 0x07;
        } else {
            self.t = (self.t & !(COARSE_Y | FINE_Y))
                | (((data >> 3) as u16) << 5)
                | (((data & 0x07) as u16) << 12);
        }
        self.w = !self.w;
    }

    /// $2006: high byte (bit 14 cleared) then low byte; the second write copies `t` into `v`.
    /// Returns true when `v` changed.
    pub fn write_addr(&mut self, data: u8) -> bool {
        if !self.w {
            self.t = (self.t & 0x00FF) | (((data & 0x3F) as u16) << 8);
        } else {
            self.t = (self.t & 0xFF00) | data as u16;
            self.v = self.t;
        }
        self.w = !self.w;
        !self.w
    }

    /// Coarse X increment with horizontal nametable wrap.
    pub fn increment_x(&mut self) {
        if self.v & COARSE_X == 31 {
            self.v &= !COARSE_X;
            self.v ^= NAMETABLE_X;
        } else {
            self.v += 1;
        }
    }

    /// Fine Y increment, overflowing into coarse Y. Row 29 wraps to the other nametable; rows 30
    /// and 31 (attribute memory) wrap without switching.
    pub fn increment_y(&mut self) {
        if self.v & FINE_Y != FINE_Y {
            self.v += 0x1000;
            return;
        }
        self.v &= !FINE_Y;
        let mut coarse_y = (self.v & COARSE_Y) >> 5;
        match coarse_y {
            29 => {
                coarse_y = 0;
                self.v ^= NAMETABLE_Y;
            }
            31 => coarse_y = 0,
            _ => coarse_y += 1,
        }
        self.v = (self.v & !COARSE_Y) | (coarse_y << 5);
    }

    /// Dot 257: horizontal bits of `t` into `v`.
    pub fn copy_x(&mut self) {
        let mask = COARSE_X | NAMETABLE_X;
        self.v = (self.v & !mask) | (self.t & mask);
    }

    /// Pre-render dots 280–304: vertical bits of `t` into `v`.
    pub fn copy_y(&mut self) {
        let mask = COARSE_Y | NAMETABLE_Y | FINE_Y;
        self.v = (self.v & !mask) | (self.t & mask);
    }

    pub fn fine_y(&self) -> u16 {
        (self.v >> 12) & 0x07
    }

    /// Nametable byte address for the tile at `v`.
    pub fn tile_address(&self) -> u16 {
        0x2000 | (self.v & 0x0FFF)
    }

    /// Attribute byte address for the tile at `v`.
    pub fn attribute_address(&self) -> u16 {
        0x23C0 | (self.v & 0x0C00) | ((self.v >> 4) & 0x38) | ((self.v >> 2) & 0x07)
    }

    /// Bit offset of this tile's quadrant inside its attribute byte.
    pub fn attribute_shift(&self) -> u16 {
        ((self.v >> 4) & 0x04) | (self.v & 0x02)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scroll_and_addr_share_toggle() {
        let mut loopy = Loopy::default();
        loopy.write_ctrl(0x03);
        loopy.write_scroll(0x7D);
        assert_eq!(loopy.fine_x, 5);
        assert_eq!(loopy.t & COARSE_X, 0x0F);
        assert!(loopy.w);
        loopy.write_scroll(0x5E);
        assert_eq!(loopy.t, 0x6D6F);
        assert!(!loopy.w);

        assert!(!loopy.write_addr(0x3D));
        assert!(loopy.write_addr(0xF0));
        assert_eq!(loopy.v, 0x3DF0);
    }

    #[test]
    fn coarse_x_wraps_into_next_nametable() {
        let mut loopy = Loopy {
            v: 0x001F,
            ..Loopy::default()
        };
        loopy.increment_x();
        assert_eq!(loopy.v, NAMETABLE_X);
    }

    #[test]
    fn coarse_y_wraps_at_row_29() {
        let mut loopy = Loopy {
            v: FINE_Y | (29 << 5),
            ..Loopy::default()
        };
        loopy.increment_y();
        assert_eq!(loopy.v, NAMETABLE_Y);

        loopy.v = FINE_Y | (31 << 5);
        loopy.increment_y();
        assert_eq!(loopy.v, 0);
    }

    #[test]
    fn attribute_address_for_tile() {
        let loopy = Loopy {
            v: 0x2000 | (5 << 5) | 6,
            ..Loopy::default()
        };
        assert_eq!(loopy.attribute_address(), 0x23C9);
        assert_eq!(loopy.attribute_shift(), 2);
    }
}
