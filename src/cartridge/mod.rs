//! NES cartridge loading and mapper support.
//!
//! - **cartridge**: Parses iNES (.nes) images into a header plus PRG/CHR, and wraps the mapper.
//! - **mapper**: NROM (0), MMC1 (1), UxROM (2), CNROM (3), MMC3 (4), AxROM (7); PRG/CHR bank
//!   switching, SRAM, and nametable mirroring.

pub mod cartridge;
pub mod mapper;
