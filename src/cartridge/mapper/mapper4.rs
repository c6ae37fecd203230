//! Mapper 4 (MMC3): bank switching, switchable mirroring, PRG RAM, scanline IRQ.
//!
//! [MMC3](https://www.nesdev.org/wiki/MMC3): Bank select at $8000–$9FFE (even), bank data at
//! $8001–$9FFF (odd). R0/R1 = 2 KiB CHR, R2–R5 = 1 KiB CHR, R6/R7 = 8 KiB PRG. Mirroring at
//! $A000–$BFFE (even), PRG RAM protect at $A001 (odd). IRQ latch $C000, reload $C001, disable
//! $E000, enable $E001.
//!
//! The IRQ counter is clocked by edges of PPU address line A12: rising edges on Sharp boards,
//! falling edges on the MC-ACC clone. After an edge, further edges are ignored until A12 has stayed
//! quiet for [`A12_FILTER_CYCLES`] CPU cycles, so the eight sprite fetches of one scanline clock once.

use serde::{Deserialize, Serialize};

use crate::cartridge::cartridge::Rom;
use crate::cartridge::mapper::mapper::{BoardState, Mapper};
use crate::cartridge::mapper::memory::CartMemory;
use crate::cartridge::mapper::Mirroring;
use crate::error::StateError;

const A12_FILTER_CYCLES: u8 = 16;

/// Which A12 edge clocks the scanline counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mmc3Variant {
    /// Rising edge. Standard Sharp/NEC MMC3 chips.
    Sharp,
    /// Falling edge. Acclaim MC-ACC (submapper 3).
    McAcc,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Mmc3State {
    pub bank_select: u8,
    pub regs: [u8; 8],
    pub mirroring: Mirroring,
    pub prg_ram_protect: u8,
    pub irq_latch: u8,
    pub irq_counter: u8,
    pub irq_reload: bool,
    pub irq_enabled: bool,
    pub irq_pending: bool,
    pub last_a12: bool,
    pub a12_filter: u8,
}

/// MMC3 state: bank registers, mirroring, PRG RAM, IRQ counter/latch/enable.
pub struct Mapper4 {
    memory: CartMemory,
    variant: Mmc3Variant,
    /// Bank select ($8000): bits 0–2 = register index, bit 6 = PRG mode, bit 7 = CHR A12 invert.
    bank_select: u8,
    regs: [u8; 8],
    mirroring: Mirroring,
    four_screen: bool,
    /// $A001; stored, not enforced.
    prg_ram_protect: u8,
    irq_latch: u8,
    irq_counter: u8,
    irq_reload: bool,
    irq_enabled: bool,
    irq_pending: bool,
    last_a12: bool,
    /// CPU cycles left before another A12 edge may clock the counter.
    a12_filter: u8,
    prg_offsets: [usize; 4],
    chr_offsets: [usize; 8],
}

impl Mapper4 {
    pub fn new(rom: Rom, variant: Mmc3Variant) -> Self {
        let header_mirroring = rom.header.mirroring();
        let four_screen = header_mirroring == Mirroring::FourScreen;
        let mut mapper = Self {
            memory: CartMemory::new(rom),
            variant,
            bank_select: 0,
            regs: [0, 2, 4, 5, 6, 7, 0, 1],
            mirroring: header_mirroring,
            four_screen,
            prg_ram_protect: 0,
            irq_latch: 0,
            irq_counter: 0,
            irq_reload: false,
            irq_enabled: false,
            irq_pending: false,
            last_a12: false,
            a12_filter: 0,
            prg_offsets: [0; 4],
            chr_offsets: [0; 8],
        };
        mapper.update_offsets();
        mapper
    }

    fn update_offsets(&mut self) {
        let r6 = (self.regs[6] & 0x3F) as isize;
        let r7 = (self.regs[7] & 0x3F) as isize;
        let prg = if self.bank_select & 0x40 == 0 {
            [r6, r7, -2, -1]
        } else {
            [-2, r7, r6, -1]
        };
        self.prg_offsets = prg.map(|b| self.memory.prg_bank_offset(b, 0x2000));

        let r = self.regs.map(|v| v as isize);
        let chr = if self.bank_select & 0x80 == 0 {
            [r[0] & !1, r[0] | 1, r[1] & !1, r[1] | 1, r[2], r[3], r[4], r[5]]
        } else {
            [r[2], r[3], r[4], r[5], r[0] & !1, r[0] | 1, r[1] & !1, r[1] | 1]
        };
        self.chr_offsets = chr.map(|b| self.memory.chr_bank_offset(b, 0x400));
    }

    fn chr_offset(&self, addr: u16) -> usize {
        self.chr_offsets[(addr / 0x400) as usize] + (addr as usize & 0x3FF)
    }

    /// Reload when zero or when a reload was requested, otherwise decrement; fire at zero.
    fn clock_counter(&mut self) {
        if self.irq_counter == 0 || self.irq_reload {
            self.irq_counter = self.irq_latch;
            self.irq_reload = false;
        } else {
            self.irq_counter -= 1;
        }
        if self.irq_counter == 0 && self.irq_enabled {
            self.irq_pending = true;
        }
    }
}

impl Mapper for Mapper4 {
    fn read(&self, addr: u16) -> u8 {
        match addr {
            0x0000..=0x1FFF => self.memory.read_chr(self.chr_offset(addr)),
            0x6000..=0x7FFF => self.memory.read_sram(addr),
            0x8000..=0xFFFF => {
                let window = ((addr - 0x8000) / 0x2000) as usize;
                self.memory
                    .read_prg(self.prg_offsets[window] + (addr as usize & 0x1FFF))
            }
            _ => 0,
        }
    }

    fn write(&mut self, addr: u16, data: u8) {
        let even = addr & 1 == 0;
        match addr {
            0x0000..=0x1FFF => {
                let offset = self.chr_offset(addr);
                self.memory.write_chr(offset, data);
            }
            0x6000..=0x7FFF => self.memory.write_sram(addr, data),
            0x8000..=0x9FFF if even => {
                self.bank_select = data;
                self.update_offsets();
            }
            0x8000..=0x9FFF => {
                self.regs[(self.bank_select & 7) as usize] = data;
                self.update_offsets();
            }
            0xA000..=0xBFFF if even => {
                if !self.four_screen {
                    self.mirroring = if data & 1 == 0 {
                        Mirroring::Vertical
                    } else {
                        Mirroring::Horizontal
                    };
                }
            }
            0xA000..=0xBFFF => self.prg_ram_protect = data,
            0xC000..=0xDFFF if even => self.irq_latch = data,
            0xC000..=0xDFFF => {
                self.irq_counter = 0;
                self.irq_reload = true;
            }
            0xE000..=0xFFFF if even => {
                self.irq_enabled = false;
                self.irq_pending = false;
            }
            0xE000..=0xFFFF => self.irq_enabled = true,
            _ => {}
        }
    }

    fn mirroring(&self) -> Mirroring {
        self.mirroring
    }

    fn step(&mut self) {
        self.a12_filter = self.a12_filter.saturating_sub(1);
    }

    fn on_ppu_address(&mut self, addr: u16) {
        if addr >= 0x2000 {
            return;
        }
        let a12 = addr & 0x1000 != 0;
        let edge = match self.variant {
            Mmc3Variant::Sharp => a12 && !self.last_a12,
            Mmc3Variant::McAcc => !a12 && self.last_a12,
        };
        self.last_a12 = a12;
        if edge {
            if self.a12_filter == 0 {
                self.clock_counter();
            }
            self.a12_filter = A12_FILTER_CYCLES;
        }
    }

    fn irq(&self) -> bool {
        self.irq_pending
    }

    fn memory(&self) -> &CartMemory {
        &self.memory
    }

    fn memory_mut(&mut self) -> &mut CartMemory {
        &mut self.memory
    }

    fn board_state(&self) -> BoardState {
        BoardState::Mmc3(Mmc3State {
            bank_select: self.bank_select,
            regs: self.regs,
            mirroring: self.mirroring,
            prg_ram_protect: self.prg_ram_protect,
            irq_latch: self.irq_latch,
            irq_counter: self.irq_counter,
            irq_reload: self.irq_reload,
            irq_enabled: self.irq_enabled,
            irq_pending: self.irq_pending,
            last_a12: self.last_a12,
            a12_filter: self.a12_filter,
        })
    }

    fn load_board_state(&mut self, state: BoardState) -> Result<(), StateError> {
        let BoardState::Mmc3(state) = state else {
            return Err(BoardState::mismatch());
        };
        self.bank_select = state.bank_select;
        self.regs = state.regs;
        self.mirroring = state.mirroring;
        self.prg_ram_protect = state.prg_ram_protect;
        self.irq_latch = state.irq_latch;
        self.irq_counter = state.irq_counter;
        self.irq_reload = state.irq_reload;
        self.irq_enabled = state.irq_enabled;
        self.irq_pending = state.irq_pending;
        self.last_a12 = state.last_a12;
        self.a12_filter = state.a12_filter;
        self.update_offsets();
        Ok(())
    }

    fn id(&self) -> u8 {
        4
    }
}
