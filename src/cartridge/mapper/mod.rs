//! NES mappers for PRG/CHR memory mapping.
//!
//! NROM (0), MMC1 (1), UxROM (2), CNROM (3), MMC3 (4), AxROM (7), plus the shared bank memory and
//! nametable mirroring types.

use serde::{Deserialize, Serialize};

use crate::cartridge::cartridge::Rom;
use crate::error::MapperError;

pub mod mapper;
pub mod memory;

pub mod mapper0;
pub mod mapper1;
pub mod mapper2;
pub mod mapper3;
pub mod mapper4;
pub mod mapper7;

use mapper::Mapper;
use mapper0::Mapper0;
use mapper1::Mapper1;
use mapper2::Mapper2;
use mapper3::Mapper3;
use mapper4::{Mapper4, Mmc3Variant};
use mapper7::Mapper7;

/// Nametable mirroring mode for PPU.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mirroring {
    Horizontal,
    Vertical,
    SingleLower,
    SingleUpper,
    FourScreen,
}

impl Mirroring {
    /// Map a PPU nametable address ($2000–$3EFF) to an offset into 4 KiB of nametable RAM.
    /// Only four-screen boards use the upper 2 KiB.
    pub fn nametable_offset(self, addr: u16) -> usize {
        let addr = (addr as usize).wrapping_sub(0x2000) & 0x0FFF;
        let table = addr / 0x400;
        let offset = addr & 0x3FF;
        let physical = match self {
            Mirroring::Horizontal => table >> 1,
            Mirroring::Vertical => table & 1,
            Mirroring::SingleLower => 0,
            Mirroring::SingleUpper => 1,
            Mirroring::FourScreen => table,
        };
        physical * 0x400 + offset
    }
}

/// Construct the board named by the header's mapper number.
pub fn new_mapper(rom: Rom) -> Result<Box<dyn Mapper>, MapperError> {
    let mapper: Box<dyn Mapper> = match rom.header.mapper_id() {
        0 => Box::new(Mapper0::new(rom)),
        1 => Box::new(Mapper1::new(rom)),
        2 => Box::new(Mapper2::new(rom)),
        3 => Box::new(Mapper3::new(rom)),
        4 => {
            let variant = if rom.submapper == 3 {
                Mmc3Variant::McAcc
            } else {
                Mmc3Variant::Sharp
            };
            Box::new(Mapper4::new(rom, variant))
        }
        7 => Box::new(Mapper7::new(rom)),
        id => return Err(MapperError::Unsupported(id)),
    };
    Ok(mapper)
}
