//! nestest-style instruction trace.
//!
//! One line per instruction, in the column layout of the widely circulated `nestest.log`, so a run
//! can be diffed against it. Operands are resolved with [`Bus::peek`] and never disturb the machine.

use crate::bus::Bus;
use crate::cpu::cpu::CPU;
use crate::cpu::opcodes::{Mnemonic, Mode, OPCODES};

impl<B: Bus> CPU<B> {
    fn peek_word(&self, addr: u16) -> u16 {
        let lo = self.bus.peek(addr) as u16;
        let hi = self.bus.peek(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    fn peek_word_wrapped(&self, addr: u16) -> u16 {
        let lo = self.bus.peek(addr) as u16;
        let hi = self.bus.peek((addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF)) as u16;
        (hi << 8) | lo
    }

    /// Trace line for the instruction at PC, before it executes.
    pub fn trace(&self) -> String {
        let pc = self.pc;
        let op = OPCODES[self.bus.peek(pc) as usize];
        let size = op.mode.size();

        let bytes = (0..size)
            .map(|i| format!("{:02X}", self.bus.peek(pc.wrapping_add(i))))
            .collect::<Vec<_>>()
            .join(" ");
        let mnemonic = format!("{}{}", if op.illegal { "*" } else { "" }, op.mnemonic.name());

        let arg8 = self.bus.peek(pc.wrapping_add(1));
        let arg16 = self.peek_word(pc.wrapping_add(1));
        let operand = match op.mode {
            Mode::Implied => String::new(),
            Mode::Accumulator => "A".to_string(),
            Mode::Immediate => format!("#${arg8:02X}"),
            Mode::ZeroPage => format!("${arg8:02X} = {:02X}", self.bus.peek(arg8 as u16)),
            Mode::ZeroPageX | Mode::ZeroPageY => {
                let (name, index) = if op.mode == Mode::ZeroPageX {
                    ("X", self.x)
                } else {
                    ("Y", self.y)
                };
                let addr = arg8.wrapping_add(index);
                format!("${arg8:02X},{name} @ {addr:02X} = {:02X}", self.bus.peek(addr as u16))
            }
            Mode::Absolute if matches!(op.mnemonic, Mnemonic::Jmp | Mnemonic::Jsr) => {
                format!("${arg16:04X}")
            }
            Mode::Absolute => format!("${arg16:04X} = {:02X}", self.bus.peek(arg16)),
            Mode::AbsoluteX | Mode::AbsoluteY => {
                let (name, index) = if op.mode == Mode::AbsoluteX {
                    ("X", self.x)
                } else {
                    ("Y", self.y)
                };
                let addr = arg16.wrapping_add(index as u16);
                format!("${arg16:04X},{name} @ {addr:04X} = {:02X}", self.bus.peek(addr))
            }
            Mode::Indirect => format!("(${arg16:04X}) = {:04X}", self.peek_word_wrapped(arg16)),
            Mode::IndirectX => {
                let ptr = arg8.wrapping_add(self.x);
                let addr = self.peek_word_wrapped(ptr as u16);
                format!("(${arg8:02X},X) @ {ptr:02X} = {addr:04X} = {:02X}", self.bus.peek(addr))
            }
            Mode::IndirectY => {
                let base = self.peek_word_wrapped(arg8 as u16);
                let addr = base.wrapping_add(self.y as u16);
                format!("(${arg8:02X}),Y = {base:04X} @ {addr:04X} = {:02X}", self.bus.peek(addr))
            }
            Mode::Relative => {
                let target = pc.wrapping_add(2).wrapping_add(arg8 as i8 as u16);
                format!("${target:04X}")
            }
        };

        let (scanline, dot) = self.bus.ppu_position();
        format!(
            "{pc:04X}  {bytes:<8} {mnemonic:>4} {operand:<27} A:{:02X} X:{:02X} Y:{:02X} P:{:02X} SP:{:02X} PPU:{scanline:>3},{dot:>3} CYC:{}",
            self.a, self.x, self.y, self.status, self.sp, self.cycles
        )
    }
}
