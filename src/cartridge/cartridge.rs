//! NES cartridge loading from iNES format (.nes files).
//!
//! Implements the [iNES](https://www.nesdev.org/wiki/INES) format: 16-byte header (magic "NES\x1A",
//! PRG size in 16 KiB units, CHR size in 8 KiB units, flags 6–7 for mapper, etc.), then PRG ROM,
//! then CHR ROM. CHR may be ROM or RAM depending on the header. [Mapper](https://www.nesdev.org/wiki/Mapper)
//! implements CPU PRG ($6000–$FFFF) and PPU CHR ($0000–$1FFF) address decoding and bank switching.

use std::fs;
use std::path::Path;

use log::debug;

use crate::cartridge::mapper::mapper::{Mapper, MapperState};
use crate::cartridge::mapper::{Mirroring, new_mapper};
use crate::config::{CHR_CHUNK_SIZE, PRG_CHUNK_SIZE};
use crate::error::{LoadError, RomError, StateError};

pub const HEADER_LEN: usize = 16;
const TRAINER_LEN: usize = 512;
const MAGIC: [u8; 4] = *b"NES\x1A";

/// The 16-byte iNES header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Header {
    pub prg_chunks: u8,
    pub chr_chunks: u8,
    /// Flags 6 and 7.
    pub control: [u8; 2],
}

impl Header {
    /// Build a header for the given board. Used by tests and tools that synthesize images.
    pub fn new(
        prg_chunks: u8,
        chr_chunks: u8,
        mapper_id: u8,
        mirroring: Mirroring,
        battery: bool,
    ) -> Self {
        let mut control = [(mapper_id & 0x0F) << 4, mapper_id & 0xF0];
        match mirroring {
            Mirroring::Vertical => control[0] |= 0x01,
            Mirroring::FourScreen => control[0] |= 0x08,
            _ => {}
        }
        if battery {
            control[0] |= 0x02;
        }
        Self {
            prg_chunks,
            chr_chunks,
            control,
        }
    }

    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        if data.len() < HEADER_LEN {
            return Err(RomError::TooShort(data.len()));
        }
        if data[0..4] != MAGIC {
            return Err(RomError::BadMagic);
        }
        let header = Self {
            prg_chunks: data[4],
            chr_chunks: data[5],
            control: [data[6], data[7]],
        };
        if header.is_nes2() {
            return Err(RomError::Nes2Unsupported);
        }
        Ok(header)
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut bytes = [0; HEADER_LEN];
        bytes[0..4].copy_from_slice(&MAGIC);
        bytes[4] = self.prg_chunks;
        bytes[5] = self.chr_chunks;
        bytes[6] = self.control[0];
        bytes[7] = self.control[1];
        bytes
    }

    /// Mapper number: low nibble from the high half of flags 6, high nibble from flags 7.
    pub fn mapper_id(&self) -> u8 {
        (self.control[1] & 0xF0) | (self.control[0] >> 4)
    }

    /// Four-screen (bit 3) overrides the solder-pad bit (bit 0).
    pub fn mirroring(&self) -> Mirroring {
        if self.control[0] & 0x08 != 0 {
            Mirroring::FourScreen
        } else if self.control[0] & 0x01 != 0 {
            Mirroring::Vertical
        } else {
            Mirroring::Horizontal
        }
    }

    pub fn battery(&self) -> bool {
        self.control[0] & 0x02 != 0
    }

    pub fn has_trainer(&self) -> bool {
        self.control[0] & 0x04 != 0
    }

    /// NES 2.0 identifies itself with bits 2–3 of flags 7 equal to %10.
    pub fn is_nes2(&self) -> bool {
        self.control[1] & 0x0C == 0x08
    }

    pub fn prg_len(&self) -> usize {
        self.prg_chunks as usize * PRG_CHUNK_SIZE
    }

    pub fn chr_len(&self) -> usize {
        self.chr_chunks as usize * CHR_CHUNK_SIZE
    }
}

/// A parsed ROM image: header plus raw PRG and CHR data. CHR is empty for CHR-RAM boards.
#[derive(Clone, Debug)]
pub struct Rom {
    pub header: Header,
    pub prg: Vec<u8>,
    pub chr: Vec<u8>,
    /// Board revision; iNES 1.0 cannot express it so hosts set it explicitly when needed.
    pub submapper: u8,
}

impl Rom {
    pub fn parse(data: &[u8]) -> Result<Self, RomError> {
        let header = Header::parse(data)?;
        if header.prg_chunks == 0 {
            return Err(RomError::NoPrg);
        }

        let mut body = &data[HEADER_LEN..];
        if header.has_trainer() {
            body = body.get(TRAINER_LEN..).unwrap_or(&[]);
        }

        let prg_len = header.prg_len();
        if body.len() < prg_len {
            return Err(RomError::TruncatedPrg {
                expected: prg_len,
                actual: body.len(),
            });
        }
        let (prg, rest) = body.split_at(prg_len);

        let chr_len = header.chr_len();
        if rest.len() < chr_len {
            return Err(RomError::TruncatedChr {
                expected: chr_len,
                actual: rest.len(),
            });
        }

        debug!(
            "Loaded iNES header: mapper={} mirroring={:?} battery={} prg={}x16K chr={}x8K",
            header.mapper_id(),
            header.mirroring(),
            header.battery(),
            header.prg_chunks,
            header.chr_chunks,
        );

        Ok(Self {
            header,
            prg: prg.to_vec(),
            chr: rest[..chr_len].to_vec(),
            submapper: 0,
        })
    }

    /// Assemble an iNES image from parts.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(HEADER_LEN + self.prg.len() + self.chr.len());
        let mut header = self.header;
        header.control[0] &= !0x04;
        bytes.extend_from_slice(&header.to_bytes());
        bytes.extend_from_slice(&self.prg);
        bytes.extend_from_slice(&self.chr);
        bytes
    }
}

/// Saved cartridge state: board registers plus the writable memories.
pub type CartridgeState = MapperState;

/// Cartridge: holds the mapper that owns PRG/CHR/SRAM and implements read/write and mirroring.
/// CPU reads PRG via bus at $6000–$FFFF; PPU reads CHR at $0000–$1FFF (pattern tables).
pub struct Cartridge {
    pub mapper: Box<dyn Mapper>,
    pub mapper_id: u8,
    pub battery: bool,
}

impl Cartridge {
    /// Load cartridge from an iNES file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, LoadError> {
        let data = fs::read(path).map_err(RomError::Io)?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<Self, LoadError> {
        Self::from_rom(Rom::parse(data)?)
    }

    pub fn from_rom(rom: Rom) -> Result<Self, LoadError> {
        let mapper_id = rom.header.mapper_id();
        let battery = rom.header.battery();
        let mapper = new_mapper(rom)?;
        Ok(Self {
            mapper,
            mapper_id,
            battery,
        })
    }

    /// Read: CHR ($0000–$1FFF), SRAM ($6000–$7FFF) or PRG ($8000–$FFFF). Mapper dispatches.
    pub fn read(&self, addr: u16) -> u8 {
        self.mapper.read(addr)
    }

    /// Write: CHR RAM (if present), SRAM, or mapper registers. PRG ROM is R/O.
    pub fn write(&mut self, addr: u16, data: u8) {
        self.mapper.write(addr, data);
    }

    pub fn mirroring(&self) -> Mirroring {
        self.mapper.mirroring()
    }

    /// Advance board logic by one CPU cycle.
    pub fn step(&mut self) {
        self.mapper.step();
    }

    /// Notify mapper of an address placed on the PPU bus (e.g. MMC3 IRQ counter on A12 edge).
    pub fn on_ppu_address(&mut self, addr: u16) {
        self.mapper.on_ppu_address(addr);
    }

    /// Level of the cartridge IRQ line.
    pub fn irq(&self) -> bool {
        self.mapper.irq()
    }

    /// Battery RAM contents for the host to persist.
    pub fn sram(&self) -> &[u8] {
        &self.mapper.memory().sram
    }

    /// Restore battery RAM. Shorter input fills from the start; longer input is truncated.
    pub fn load_sram(&mut self, data: &[u8]) {
        let sram = &mut self.mapper.memory_mut().sram;
        let n = sram.len().min(data.len());
        sram[..n].copy_from_slice(&data[..n]);
    }

    pub fn save_state(&self) -> CartridgeState {
        self.mapper.save_state()
    }

    pub fn load_state(&mut self, state: CartridgeState) -> Result<(), StateError> {
        if state.mapper_id != self.mapper_id {
            return Err(StateError::MapperMismatch {
                found: state.mapper_id,
                expected: self.mapper_id,
            });
        }
        self.mapper.load_state(state)
    }
}
