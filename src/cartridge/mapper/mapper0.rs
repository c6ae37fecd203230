//! Mapper 0 (NROM): no bank switching, 16/32KB PRG, 8KB CHR.

use crate::cartridge::cartridge::Rom;
use crate::cartridge::mapper::mapper::{BoardState, Mapper};
use crate::cartridge::mapper::memory::CartMemory;
use crate::cartridge::mapper::Mirroring;
use crate::error::StateError;

/// NROM mapper: fixed PRG and CHR; a 16KB PRG image is mirrored into both halves.
pub struct Mapper0 {
    memory: CartMemory,
    mirroring: Mirroring,
}

impl Mapper0 {
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.header.mirroring();
        Self {
            memory: CartMemory::new(rom),
            mirroring,
        }
    }
}

impl Mapper for Mapper0 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.memory.read_chr(addr as usize),
            0x6000..=0x7FFF => self.memory.read_sram(addr),
            // read_prg wraps, which mirrors NROM-128
            0x8000..=0xFFFF => self.memory.read_prg((addr - 0x8000) as usize),
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x1FFF => self.memory.write_chr(addr as usize, data),
            0x6000..=0x7FFF => self.memory.write_sram(addr, data),
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn memory(&self) -> &CartMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut CartMemory {
        &mut self.memory
    }

    fn board_state(&self) -> BoardState {
        BoardState::Nrom
    }

    fn load_board_state(&mut self, state: BoardState) -> Result<(), StateError> {
        match state {
            BoardState::Nrom => Ok(()),
            _ => Err(BoardState::mismatch()),
        }
    }

    fn id(&self) -> u8 {
        0
    }
}
