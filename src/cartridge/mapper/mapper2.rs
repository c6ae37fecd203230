//! Mapper 2 (UxROM): switchable 16 KiB bank at $8000, last bank fixed at $C000, CHR RAM.

use crate::cartridge::cartridge::Rom;
use crate::cartridge::mapper::mapper::{BoardState, Mapper};
use crate::cartridge::mapper::memory::CartMemory;
use crate::cartridge::mapper::Mirroring;
use crate::error::StateError;

pub struct Mapper2 {
    memory: CartMemory,
    mirroring: Mirroring,
    prg_bank: u8,
}

impl Mapper2 {
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.header.mirroring();
        Self {
            memory: CartMemory::new(rom),
            mirroring,
            prg_bank: 0,
        }
    }
}

impl Mapper for Mapper2 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.memory.read_chr(addr as usize),
            0x6000..=0x7FFF => self.memory.read_sram(addr),
            0x8000..=0xBFFF => {
                let base = self.memory.prg_bank_offset(self.prg_bank as isize, 0x4000);
                self.memory.read_prg(base + (addr as usize & 0x3FFF))
            }
            0xC000..=0xFFFF => {
                let base = self.memory.prg_bank_offset(-1, 0x4000);
                self.memory.read_prg(base + (addr as usize & 0x3FFF))
            }
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x1FFF => self.memory.write_chr(addr as usize, data),
            0x6000..=0x7FFF => self.memory.write_sram(addr, data),
            0x8000..=0xFFFF => self.prg_bank = data,
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
        BoardState::UxRom {
            prg_bank: self.prg_bank,
        }
    }

    fn load_board_state(&mut self, state: BoardState) -> Result<(), StateError> {
        match state {
            BoardState::UxRom { prg_bank } => {
                self.prg_bank = prg_bank;
                Ok(())
            }
            _ => Err(BoardState::mismatch()),
        }
    }

    fn id(&self) -> u8 {
        2
    }
}
