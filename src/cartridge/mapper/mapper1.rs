//! Mapper 1 (MMC1): bank switching via 5-bit shift register.
//!
//! [MMC1](https://www.nesdev.org/wiki/MMC1): writes to $8000–$9FFF (control), $A000–$BFFF (CHR0),
//! $C000–$DFFF (CHR1), $E000–$FFFF (PRG bank). Any write with bit 7 set resets the shift register.
//! Otherwise bit 0 is shifted in, LSB first; the register starts as `0x10` and the write that
//! pushes that marker bit out to bit 0 is the fifth, which latches the value into the register
//! selected by the address. Control bits 0–1 = mirroring, bits 2–3 = PRG mode, bit 4 = CHR mode.
//!
//! The board ignores the second of two writes on consecutive CPU cycles (the dummy write of a
//! read-modify-write instruction), so a write is only accepted after the mapper has been stepped.

use serde::{Deserialize, Serialize};

use crate::cartridge::cartridge::Rom;
use crate::cartridge::mapper::mapper::{BoardState, Mapper};
use crate::cartridge::mapper::memory::CartMemory;
use crate::cartridge::mapper::Mirroring;
use crate::error::StateError;

const SHIFT_RESET: u8 = 0x10;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mmc1State {
    pub shift: u8,
    pub control: u8,
    pub chr_bank0: u8,
    pub chr_bank1: u8,
    pub prg_bank: u8,
}

pub struct Mapper1 {
    memory: CartMemory,
    shift: u8,
    control: u8,
    chr_bank0: u8,
    chr_bank1: u8,
    prg_bank: u8,
    /// Byte offsets of the two 16 KiB PRG windows.
    prg_offsets: [usize; 2],
    /// Byte offsets of the two 4 KiB CHR windows.
    chr_offsets: [usize; 2],
    /// False until a CPU cycle passes after an accepted write.
    write_ready: bool,
}

impl Mapper1 {
    /// Power-on: shift register empty, control $0C (PRG mode 3: $8000 switchable, $C000 fixed last).
    pub fn new(rom: Rom) -> Self {
        let mut mapper = Self {
            memory: CartMemory::new(rom),
            shift: SHIFT_RESET,
            control: 0x0C,
            chr_bank0: 0,
            chr_bank1: 0,
            prg_bank: 0,
            prg_offsets: [0; 2],
            chr_offsets: [0; 2],
            write_ready: true,
        };
        mapper.update_offsets();
        mapper
    }

    fn load_register(&mut self, addr: u16, data: u8) {
        if data & 0x80 != 0 {
            self.shift = SHIFT_RESET;
            self.control |= 0x0C;
            self.update_offsets();
            return;
        }
        let complete = self.shift & 1 == 1;
        self.shift = (self.shift >> 1) | ((data & 1) << 4);
        if complete {
            let value = self.shift;
            match addr {
                0x8000..=0x9FFF => self.control = value,
                0xA000..=0xBFFF => self.chr_bank0 = value,
                0xC000..=0xDFFF => self.chr_bank1 = value,
                _ => self.prg_bank = value & 0x0F,
            }
            self.shift = SHIFT_RESET;
            self.update_offsets();
        }
    }

    fn prg_mode(&self) -> u8 {
        (self.control >> 2) & 0b11
    }

    fn chr_mode(&self) -> u8 {
        (self.control >> 4) & 1
    }

    /// Recompute bank windows. PRG mode 0/1: one 32 KiB bank (low bit ignored); 2: first bank fixed
    /// at $8000; 3: last bank fixed at $C000. CHR mode 0: one 8 KiB bank; 1: two 4 KiB banks.
    fn update_offsets(&mut self) {
        let bank = self.prg_bank as isize;
        let prg = match self.prg_mode() {
            0 | 1 => [bank & !1, bank | 1],
            2 => [0, bank],
            _ => [bank, -1],
        };
        self.prg_offsets = prg.map(|b| self.memory.prg_bank_offset(b, 0x4000));

        let chr = match self.chr_mode() {
            0 => [self.chr_bank0 as isize & !1, self.chr_bank0 as isize | 1],
            _ => [self.chr_bank0 as isize, self.chr_bank1 as isize],
        };
        self.chr_offsets = chr.map(|b| self.memory.chr_bank_offset(b, 0x1000));
    }

    fn chr_offset(&self, addr: u16) -> usize {
        let window = (addr / 0x1000) as usize;
        self.chr_offsets[window] + (addr as usize & 0x0FFF)
    }
}

impl Mapper for Mapper1 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.memory.read_chr(self.chr_offset(addr)),
            0x6000..=0x7FFF => self.memory.read_sram(addr),
            0x8000..=0xFFFF => {
                let window = ((addr - 0x8000) / 0x4000) as usize;
                self.memory
                    .read_prg(self.prg_offsets[window] + (addr as usize & 0x3FFF))
            }
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
            0x8000..=0xFFFF => {
                if self.write_ready {
                    self.write_ready = false;
                    self.load_register(addr, data);
                }
            }
            _ => {}
        }
    }

    /// Mirroring from control bits 0–1: 0 = one-screen lower, 1 = one-screen upper, 2 = vertical, 3 = horizontal.
    fn mirroring(&self) -> Mirroring {
        match self.control & 0b11 {
            0 => Mirroring::SingleLower,
            1 => Mirroring::SingleUpper,
            2 => Mirroring::Vertical,
            _ => Mirroring::Horizontal,
        }
    }

    fn step(&mut self) {
        self.write_ready = true;
    }

    fn memory(&self) -> &CartMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut CartMemory {
        &mut self.memory
    }

    fn board_state(&self) -> BoardState {
        BoardState::Mmc1(Mmc1State {
            shift: self.shift,
            control: self.control,
            chr_bank0: self.chr_bank0,
            chr_bank1: self.chr_bank1,
            prg_bank: self.prg_bank,
        })
    }

    fn load_board_state(&mut self, state: BoardState) -> Result<(), StateError> {
        let BoardState::Mmc1(state) = state else {
            return Err(BoardState::mismatch());
        };
        self.shift = state.shift;
        self.control = state.control;
        self.chr_bank0 = state.chr_bank0;
        self.chr_bank1 = state.chr_bank1;
        self.prg_bank = state.prg_bank;
        self.write_ready = true;
        self.update_offsets();
        Ok(())
    }

    fn id(&self) -> u8 {
        1
    }
}
