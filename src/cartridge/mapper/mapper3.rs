//! Mapper 3 (CNROM): fixed PRG, switchable 8 KiB CHR bank.

use crate::cartridge::cartridge::Rom;
use crate::cartridge::mapper::mapper::{BoardState, Mapper};
use crate::cartridge::mapper::memory::CartMemory;
use crate::cartridge::mapper::Mirroring;
use crate::error::StateError;

pub struct Mapper3 {
    memory: CartMemory,
    mirroring: Mirroring,
    chr_bank: u8,
}

impl Mapper3 {
    pub fn new(rom: Rom) -> Self {
        let mirroring = rom.header.mirroring();
        Self {
            memory: CartMemory::new(rom),
            mirroring,
            chr_bank: 0,
        }
    }

    fn chr_offset(&self, addr: u16) -> usize {
        self.memory.chr_bank_offset(self.chr_bank as isize, 0x2000) + addr as usize
    }
}

impl Mapper for Mapper3 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.memory.read_chr(self.chr_offset(addr)),
            0x6000..=0x7FFF => self.memory.read_sram(addr),
            0x8000..=0xFFFF => self.memory.read_prg((addr - 0x8000) as usize),
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x1FFF => {
                let offset = self.chr_offset(addr);
                self.memory.write_chr(offset, data);
            }
            0x6000..=0x7FFF => self.memory.write_sram(addr, data),
            0x8000..=0xFFFF => self.chr_bank = data,
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
        BoardState::CnRom {
            chr_bank: self.chr_bank,
        }
    }

    fn load_board_state(&mut self, state: BoardState) -> Result<(), StateError> {
        match state {
            BoardState::CnRom { chr_bank } => {
                self.chr_bank = chr_bank;
                Ok(())
            }
            _ => Err(BoardState::mismatch()),
        }
    }

    fn id(&self) -> u8 {
        3
    }
}
