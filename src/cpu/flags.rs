//! 6502 processor status register (P) flag bits.
//!
//! See [Status flags](https://www.nesdev.org/wiki/Status_flags). B and bit 5 do not exist in the
//! register itself; they only appear in copies pushed to the stack.

pub const FLAG_CARRY: u8 = 1 << 0;
pub const FLAG_ZERO: u8 = 1 << 1;
pub const FLAG_INTERRUPT_DISABLE: u8 = 1 << 2;
/// Settable but ignored: the 2A03 has no decimal mode.
pub const FLAG_DECIMAL: u8 = 1 << 3;
/// Set in the pushed copy by BRK and PHP, clear for NMI and IRQ.
pub const FLAG_BREAK: u8 = 1 << 4;
/// Reads back as 1.
pub const FLAG_UNUSED: u8 = 1 << 5;
pub const FLAG_OVERFLOW: u8 = 1 << 6;
pub const FLAG_NEGATIVE: u8 = 1 << 7;

/// P after power-on, as nestest expects it: I and bit 5.
pub const POWER_ON_STATUS: u8 = FLAG_INTERRUPT_DISABLE | FLAG_UNUSED;
