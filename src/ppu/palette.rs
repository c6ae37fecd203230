//! Palette RAM ($3F00–$3F1F) and the system palette used to turn indices into RGB.
//!
//! See [PPU palettes](https://www.nesdev.org/wiki/PPU_palettes).

use serde::{Deserialize, Serialize};

/// NES 2C02-style 64-color palette (0xRRGGBB).
pub const SYSTEM_PALETTE: [u32; 64] = [
    0x545454, 0x001E74, 0x081090, 0x300088, 0x440064, 0x5C0030, 0x540400, 0x3C1800, 0x202A00,
    0x083A00, 0x004000, 0x003C00, 0x00302C, 0x000000, 0x000000, 0x000000, 0x989698, 0x084CC4,
    0x3032EC, 0x5C1EE4, 0x8814B0, 0xA01464, 0x982220, 0x783C00, 0x545A00, 0x287200, 0x087C00,
    0x007628, 0x006678, 0x000000, 0x000000, 0x000000, 0xECEEEC, 0x3C7EEC, 0x5C5CEC, 0x8844EC,
    0xB02CEC, 0xE028B0, 0xD83C50, 0xC45400, 0xAC7000, 0x808800, 0x409C30, 0x20A458, 0x209A88,
    0x404040, 0x000000, 0x000000, 0xECEEEC, 0xA8BCEC, 0xBCACEC, 0xD4A0EC, 0xEC94EC, 0xEC90D4,
    0xEC9CB4, 0xE4B090, 0xDCC878, 0xD4DC78, 0xB8EC98, 0xA8ECBC, 0xA0E4E4, 0xA0A0A0, 0x000000,
    0x000000,
];

/// RGB for a 6-bit palette index.
pub fn rgb(index: u8) -> u32 {
    SYSTEM_PALETTE[(index & 0x3F) as usize]
}

/// 32 bytes of palette RAM. Entries are 6 bits wide.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PaletteRam {
    data: [u8; 32],
}

impl PaletteRam {
    /// Resolve $3F00–$3FFF to a RAM index. $3F10, $3F14, $3F18, $3F1C mirror $3F00, $3F04, ...
    fn index(addr: u16) -> usize {
        let i = (addr & 0x1F) as usize;
        if i >= 16 && i % 4 == 0 { i - 16 } else { i }
    }

    pub fn read(&self, addr: u16) -> u8 {
        self.data[Self::index(addr)]
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        self.data[Self::index(addr)] = data & 0x3F;
    }

    pub fn bytes(&self) -> [u8; 32] {
        self.data
    }

    pub fn from_bytes(data: [u8; 32]) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sprite_backdrop_entries_mirror_background() {
        let mut palette = PaletteRam::default();
        palette.write(0x3F10, 0x21);
        assert_eq!(palette.read(0x3F00), 0x21);
        palette.write(0x3F04, 0x15);
        assert_eq!(palette.read(0x3F14), 0x15);
        palette.write(0x3F11, 0x30);
        assert_eq!(palette.read(0x3F01), 0x00);
    }

    #[test]
    fn mirrors_every_32_bytes_and_drops_high_bits() {
        let mut palette = PaletteRam::default();
        palette.write(0x3FE2, 0xFF);
        assert_eq!(palette.read(0x3F02), 0x3F);
    }
}
