//! Mapper trait: PRG/CHR memory access, mirroring, IRQ, and saved state.

use serde::{Deserialize, Serialize};

use crate::cartridge::mapper::Mirroring;
use crate::cartridge::mapper::mapper1::Mmc1State;
use crate::cartridge::mapper::mapper4::Mmc3State;
use crate::cartridge::mapper::memory::CartMemory;
use crate::error::StateError;

/// Trait for NES cartridge mappers. CPU/PPU use these for all cartridge address space:
/// `< $2000` CHR, `$6000–$7FFF` SRAM, `>= $8000` PRG.
pub trait Mapper {
    /// Read from CHR ($0000–$1FFF), SRAM ($6000–$7FFF) or PRG ($8000–$FFFF).
    fn read(&self, addr: u16) -> u8;
    /// Write to CHR RAM, SRAM or mapper registers (PRG ROM is read-only).
    fn write(&mut self, addr: u16, data: u8);
    /// Current nametable mirroring for the PPU.
    fn mirroring(&self) -> Mirroring;

    fn memory(&self) -> &CartMemory;
    fn memory_mut(&mut self) -> &mut CartMemory;

    /// Board registers for a save state.
    fn board_state(&self) -> BoardState;
    fn load_board_state(&mut self, state: BoardState) -> Result<(), StateError>;

    fn id(&self) -> u8;

    /// Called once per CPU cycle.
    fn step(&mut self) {}

    /// Called for every address the PPU puts on its bus.
    fn on_ppu_address(&mut self, _addr: u16) {}

    /// Level of the cartridge IRQ line.
    fn irq(&self) -> bool {
        false
    }

    fn save_state(&self) -> MapperState {
        let memory = self.memory();
        MapperState {
            mapper_id: self.id(),
            sram: memory.sram.clone(),
            chr_ram: memory.chr_writable.then(|| memory.chr.clone()),
            board: self.board_state(),
        }
    }

    fn load_state(&mut self, state: MapperState) -> Result<(), StateError> {
        self.memory_mut().restore(state.sram, state.chr_ram)?;
        self.load_board_state(state.board)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MapperState {
    pub mapper_id: u8,
    pub sram: Vec<u8>,
    pub chr_ram: Option<Vec<u8>>,
    pub board: BoardState,
}

/// Per-board register snapshot.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum BoardState {
    Nrom,
    Mmc1(Mmc1State),
    UxRom { prg_bank: u8 },
    CnRom { chr_bank: u8 },
    Mmc3(Mmc3State),
    AxRom { register: u8 },
}

impl BoardState {
    pub(crate) fn mismatch() -> StateError {
        StateError::SizeMismatch("mapper board")
    }
}
