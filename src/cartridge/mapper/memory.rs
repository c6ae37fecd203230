//! PRG/CHR/SRAM storage shared by every board, with bank-offset arithmetic.
//!
//! Bank indices always resolve modulo the real ROM size, so out-of-range selects wrap like the
//! hardware's unconnected address lines. Negative indices count back from the end (-1 = last bank).

use crate::cartridge::cartridge::Rom;
use crate::config::{CHR_CHUNK_SIZE, SRAM_SIZE};
use crate::error::StateError;

pub struct CartMemory {
    pub prg: Vec<u8>,
    pub chr: Vec<u8>,
    /// True when the board carries CHR RAM instead of CHR ROM.
    pub chr_writable: bool,
    pub sram: Vec<u8>,
}

impl CartMemory {
    pub fn new(rom: Rom) -> Self {
        let chr_writable = rom.chr.is_empty();
        let chr = if chr_writable {
            vec![0; CHR_CHUNK_SIZE]
        } else {
            rom.chr
        };
        Self {
            prg: rom.prg,
            chr,
            chr_writable,
            sram: vec![0; SRAM_SIZE],
        }
    }

    pub fn prg_bank_offset(&self, index: isize, bank_size: usize) -> usize {
        bank_offset(self.prg.len(), index, bank_size)
    }

    pub fn chr_bank_offset(&self, index: isize, bank_size: usize) -> usize {
        bank_offset(self.chr.len(), index, bank_size)
    }

    pub fn read_prg(&self, offset: usize) -> u8 {
        match self.prg.len() {
            0 => 0,
            len => self.prg[offset % len],
        }
    }

    pub fn read_chr(&self, offset: usize) -> u8 {
        match self.chr.len() {
            0 => 0,
            len => self.chr[offset % len],
        }
    }

    /// CHR ROM ignores writes.
    pub fn write_chr(&mut self, offset: usize, data: u8) {
        if self.chr_writable && !self.chr.is_empty() {
            let len = self.chr.len();
            self.chr[offset % len] = data;
        }
    }

    pub fn read_sram(&self, addr: u16) -> u8 {
        self.sram[(addr as usize - 0x6000) % SRAM_SIZE]
    }

    pub fn write_sram(&mut self, addr: u16, data: u8) {
        self.sram[(addr as usize - 0x6000) % SRAM_SIZE] = data;
    }

    /// Restore writable memories from a snapshot, checking sizes first.
    pub fn restore(&mut self, sram: Vec<u8>, chr_ram: Option<Vec<u8>>) -> Result<(), StateError> {
        if sram.len() != self.sram.len() {
            return Err(StateError::SizeMismatch("sram"));
        }
        if let Some(chr) = &chr_ram {
            if !self.chr_writable || chr.len() != self.chr.len() {
                return Err(StateError::SizeMismatch("chr ram"));
            }
        }
        self.sram = sram;
        if let Some(chr) = chr_ram {
            self.chr = chr;
        }
        Ok(())
    }
}

fn bank_offset(len: usize, index: isize, bank_size: usize) -> usize {
    let count = (len / bank_size).max(1) as isize;
    index.rem_euclid(count) as usize * bank_size
}

#[cfg(test)]
mod tests {
    use super::bank_offset;

    #[test]
    fn negative_index_counts_from_end() {
        assert_eq!(bank_offset(0x20000, -1, 0x4000), 7 * 0x4000);
        assert_eq!(bank_offset(0x20000, -2, 0x2000), 14 * 0x2000);
    }

    #[test]
    fn out_of_range_index_wraps() {
        assert_eq!(bank_offset(0x8000, 5, 0x4000), 0x4000);
        assert_eq!(bank_offset(0x2000, 9, 0x400), 0x400);
    }
}
