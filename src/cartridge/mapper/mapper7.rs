//! Mapper 7 (AxROM): 32 KiB PRG banks, single-screen mirroring picked by bit 4.

use crate::cartridge::cartridge::Rom;
use crate::cartridge::mapper::mapper::{BoardState, Mapper};
use crate::cartridge::mapper::memory::CartMemory;
use crate::cartridge::mapper::Mirroring;
use crate::error::StateError;

pub struct Mapper7 {
    memory: CartMemory,
    register: u8,
}

impl Mapper7 {
    pub fn new(rom: Rom) -> Self {
        Self {
            memory: CartMemory::new(rom),
            register: 0,
        }
    }
}

impl Mapper for Mapper7 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.memory.read_chr(addr as usize),
            0x6000..=0x7FFF => self.memory.read_sram(addr),
            0x8000..=0xFFFF => {
                let base = self
                    .memory
                    .prg_bank_offset((self.register & 0x07) as isize, 0x8000);
                self.memory.read_prg(base + (addr as usize & 0x7FFF))
            }
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        match addr {
            0x0000..=0x1FFF => self.memory.write_chr(addr as usize, data),
            0x6000..=0x7FFF => self.memory.write_sram(addr, data),
            0x8000..=0xFFFF => self.register = data,
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        if self.register & 0x10 != 0 {
            Mirroring::SingleUpper
        } else {
            Mirroring::SingleLower
        }
    }

    fn memory(&self) -> &CartMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut CartMemory {
        &mut self.memory
    }

    fn board_state(&self) -> BoardState {
        BoardState::AxRom {
            register: self.register,
        }
    }

    fn load_board_state(&mut self, state: BoardState) -> Result<(), StateError> {
        match state {
            BoardState::AxRom { register } => {
                self.register = register;
                Ok(())
            }
            _ => Err(BoardState::mismatch()),
        }
    }

    fn id(&self) -> u8 {
        7
    }
}
