//! Ricoh 2A03 CPU core: a 6502 without decimal mode.
//!
//! Table-driven: [`OPCODES`] supplies mnemonic, addressing mode and base cycles for every byte
//! value. An instruction executes in full, then the elapsed cycles are ticked through the bus so
//! PPU, APU and mapper catch up. DMA stalls reported by the bus are ticked right after.
//! See [CPU](https://www.nesdev.org/wiki/CPU), [CPU interrupts](https://www.nesdev.org/wiki/CPU_interrupts).

use log::{Level, log_enabled, trace};
use serde::{Deserialize, Serialize};

use crate::{
    bus::Bus,
    cpu::flags::{
        FLAG_BREAK, FLAG_CARRY, FLAG_DECIMAL, FLAG_INTERRUPT_DISABLE, FLAG_NEGATIVE, FLAG_OVERFLOW,
        FLAG_UNUSED, FLAG_ZERO, POWER_ON_STATUS,
    },
    cpu::opcodes::{Mnemonic, Mode, OPCODES, Opcode},
};

pub const NMI_VECTOR: u16 = 0xFFFA;
pub const RESET_VECTOR: u16 = 0xFFFC;
pub const IRQ_VECTOR: u16 = 0xFFFE;

/// Cycles taken by the reset sequence and by NMI/IRQ entry.
const INTERRUPT_CYCLES: u64 = 7;

/// Constant that XAA and LXA OR into A on the consoles that tests agree on.
const UNSTABLE_MAGIC: u8 = 0xEE;

/// Saved CPU state.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CpuState {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    pub cycles: u64,
    pub halted: bool,
    pub stall: usize,
    pub nmi_pending: bool,
    pub irq_inhibit: bool,
}

pub struct CPU<B: Bus> {
    pub a: u8,
    pub x: u8,
    pub y: u8,
    pub sp: u8,
    pub pc: u16,
    pub status: u8,
    /// CPU cycles since power-on.
    pub cycles: u64,
    pub bus: B,
    /// Set by a JAM opcode; only reset clears it.
    pub halted: bool,
    /// Log a trace line per instruction at `trace` level.
    pub trace_enabled: bool,
    /// Cycles requested by DMA and not yet spent.
    stall: usize,
    /// NMI edge latched and waiting for the next instruction boundary.
    nmi_pending: bool,
    /// Interrupt-disable as seen by the IRQ poll; lags P.I by one instruction after CLI/SEI/PLP.
    irq_inhibit: bool,
}

/// Effective address of an instruction plus whether indexing crossed a page.
struct Operand {
    addr: u16,
    crossed: bool,
}

impl<B: Bus> CPU<B> {
    /// Power-on state. Call [`CPU::reset`] to load PC from the reset vector.
    pub fn new(bus: B) -> Self {
        Self {
            a: 0,
            x: 0,
            y: 0,
            sp: 0,
            pc: 0,
            status: POWER_ON_STATUS,
            cycles: 0,
            bus,
            halted: false,
            trace_enabled: false,
            stall: 0,
            nmi_pending: false,
            irq_inhibit: true,
        }
    }

    /// Reset line: SP drops by 3 without writing, I is set, PC loads from $FFFC; 7 cycles elapse.
    pub fn reset(&mut self) {
        self.sp = self.sp.wrapping_sub(3);
        self.status |= FLAG_INTERRUPT_DISABLE;
        self.irq_inhibit = true;
        self.pc = self.read_word(RESET_VECTOR);
        self.halted = false;
        self.nmi_pending = false;
        self.stall = 0;
        self.cycles += INTERRUPT_CYCLES;
        self.bus.tick(INTERRUPT_CYCLES as usize);
    }

    pub fn read(&mut self, addr: u16) -> u8 {
        self.bus.read(addr)
    }

    pub fn write(&mut self, addr: u16, data: u8) {
        self.bus.write(addr, data);
    }

    /// Latch an NMI edge from outside the bus.
    pub fn request_nmi(&mut self) {
        self.nmi_pending = true;
    }

    /// Add cycles the CPU must sit out before its next instruction.
    pub fn request_stall(&mut self, cycles: usize) {
        self.stall += cycles;
    }

    /// Run one instruction, or enter a pending interrupt. Returns CPU cycles elapsed, stalls
    /// included; 0 once halted.
    pub fn step(&mut self) -> usize {
        if self.halted {
            return 0;
        }
        let start = self.cycles;

        if self.bus.poll_nmi() {
            self.nmi_pending = true;
        }
        if self.nmi_pending {
            self.nmi_pending = false;
            self.interrupt(NMI_VECTOR);
        } else if !self.irq_inhibit && self.bus.irq_line() {
            self.interrupt(IRQ_VECTOR);
        } else {
            if self.trace_enabled && log_enabled!(Level::Trace) {
                trace!("{}", self.trace());
            }
            self.execute();
        }
        self.bus.tick((self.cycles - start) as usize);

        loop {
            let stall = std::mem::take(&mut self.stall) + self.bus.take_stall();
            if stall == 0 {
                break;
            }
            self.cycles += stall as u64;
            self.bus.tick(stall);
        }

        (self.cycles - start) as usize
    }

    /// Hardware interrupt entry: push PC and P (B clear), set I, jump through `vector`.
    fn interrupt(&mut self, vector: u16) {
        self.push_word(self.pc);
        self.push((self.status & !FLAG_BREAK) | FLAG_UNUSED);
        self.status |= FLAG_INTERRUPT_DISABLE;
        self.irq_inhibit = true;
        self.pc = self.read_word(vector);
        self.cycles += INTERRUPT_CYCLES;
    }

    fn fetch_byte(&mut self) -> u8 {
        let byte = self.bus.read(self.pc);
        self.pc = self.pc.wrapping_add(1);
        byte
    }

    fn fetch_word(&mut self) -> u16 {
        let lo = self.fetch_byte() as u16;
        let hi = self.fetch_byte() as u16;
        (hi << 8) | lo
    }

    fn read_word(&mut self, addr: u16) -> u16 {
        let lo = self.bus.read(addr) as u16;
        let hi = self.bus.read(addr.wrapping_add(1)) as u16;
        (hi << 8) | lo
    }

    /// Pointer read that stays inside one page: ($xxFF) takes its high byte from $xx00.
    fn read_word_wrapped(&mut self, addr: u16) -> u16 {
        let lo = self.bus.read(addr) as u16;
        let hi = self.bus.read((addr & 0xFF00) | (addr.wrapping_add(1) & 0x00FF)) as u16;
        (hi << 8) | lo
    }

    fn push(&mut self, value: u8) {
        let addr = 0x0100 | self.sp as u16;
        self.bus.write(addr, value);
        self.sp = self.sp.wrapping_sub(1);
    }

    fn pop(&mut self) -> u8 {
        self.sp = self.sp.wrapping_add(1);
        let addr = 0x0100 | self.sp as u16;
        self.bus.read(addr)
    }

    fn push_word(&mut self, value: u16) {
        self.push((value >> 8) as u8);
        self.push(value as u8);
    }

    fn pop_word(&mut self) -> u16 {
        let lo = self.pop() as u16;
        let hi = self.pop() as u16;
        (hi << 8) | lo
    }

    fn set_flag(&mut self, flag: u8, on: bool) {
        if on {
            self.status |= flag;
        } else {
            self.status &= !flag;
        }
    }

    fn flag(&self, flag: u8) -> bool {
        self.status & flag != 0
    }

    fn update_zero_and_negative_flags(&mut self, value: u8) {
        self.set_flag(FLAG_ZERO, value == 0);
        self.set_flag(FLAG_NEGATIVE, value & 0x80 != 0);
    }

    /// Resolve the operand address. Indexed modes do the 6502's dummy read from the un-carried
    /// address when the page changes, and always for stores and read-modify-writes.
    fn operand(&mut self, op: &Opcode) -> Operand {
        let indexed = |cpu: &mut Self, base: u16, index: u8| {
            let addr = base.wrapping_add(index as u16);
            let crossed = (base & 0xFF00) != (addr & 0xFF00);
            if crossed || op.page_cycles == 0 {
                cpu.bus.read((base & 0xFF00) | (addr & 0x00FF));
            }
            Operand { addr, crossed }
        };
        let direct = |addr: u16| Operand {
            addr,
            crossed: false,
        };

        match op.mode {
            Mode::Implied | Mode::Accumulator => direct(0),
            Mode::Immediate => {
                let addr = self.pc;
                self.pc = self.pc.wrapping_add(1);
                direct(addr)
            }
            Mode::ZeroPage => direct(self.fetch_byte() as u16),
            Mode::ZeroPageX => direct(self.fetch_byte().wrapping_add(self.x) as u16),
            Mode::ZeroPageY => direct(self.fetch_byte().wrapping_add(self.y) as u16),
            Mode::Absolute => direct(self.fetch_word()),
            Mode::AbsoluteX => {
                let (base, x) = (self.fetch_word(), self.x);
                indexed(self, base, x)
            }
            Mode::AbsoluteY => {
                let (base, y) = (self.fetch_word(), self.y);
                indexed(self, base, y)
            }
            Mode::Indirect => {
                let ptr = self.fetch_word();
                direct(self.read_word_wrapped(ptr))
            }
            Mode::IndirectX => {
                let ptr = self.fetch_byte().wrapping_add(self.x) as u16;
                direct(self.read_word_wrapped(ptr))
            }
            Mode::IndirectY => {
                let ptr = self.fetch_byte() as u16;
                let (base, y) = (self.read_word_wrapped(ptr), self.y);
                indexed(self, base, y)
            }
            Mode::Relative => {
                let offset = self.fetch_byte() as i8;
                direct(self.pc.wrapping_add(offset as u16))
            }
        }
    }

    fn execute(&mut self) {
        let opcode = self.fetch_byte();
        let op = OPCODES[opcode as usize];
        let Operand { addr, crossed } = self.operand(&op);
        self.cycles += op.cycles as u64;
        if crossed {
            self.cycles += op.page_cycles as u64;
        }

        let inhibit_before = self.flag(FLAG_INTERRUPT_DISABLE);
        let accumulator = op.mode == Mode::Accumulator;

        match op.mnemonic {
            // Loads and stores
            Mnemonic::Lda => {
                self.a = self.bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Ldx => {
                self.x = self.bus.read(addr);
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Ldy => {
                self.y = self.bus.read(addr);
                self.update_zero_and_negative_flags(self.y);
            }
            Mnemonic::Sta => self.bus.write(addr, self.a),
            Mnemonic::Stx => self.bus.write(addr, self.x),
            Mnemonic::Sty => self.bus.write(addr, self.y),

            // Transfers
            Mnemonic::Tax => {
                self.x = self.a;
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Tay => {
                self.y = self.a;
                self.update_zero_and_negative_flags(self.y);
            }
            Mnemonic::Txa => {
                self.a = self.x;
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Tya => {
                self.a = self.y;
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Tsx => {
                self.x = self.sp;
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Txs => self.sp = self.x,

            // Stack
            Mnemonic::Pha => self.push(self.a),
            Mnemonic::Php => self.push(self.status | FLAG_BREAK | FLAG_UNUSED),
            Mnemonic::Pla => {
                self.a = self.pop();
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Plp => self.status = (self.pop() & !FLAG_BREAK) | FLAG_UNUSED,

            // Logic and arithmetic
            Mnemonic::And => {
                self.a &= self.bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Ora => {
                self.a |= self.bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Eor => {
                self.a ^= self.bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Adc => {
                let value = self.bus.read(addr);
                self.add(value);
            }
            Mnemonic::Sbc => {
                let value = self.bus.read(addr);
                self.add(!value);
            }
            Mnemonic::Cmp => {
                let value = self.bus.read(addr);
                self.compare(self.a, value);
            }
            Mnemonic::Cpx => {
                let value = self.bus.read(addr);
                self.compare(self.x, value);
            }
            Mnemonic::Cpy => {
                let value = self.bus.read(addr);
                self.compare(self.y, value);
            }
            Mnemonic::Bit => {
                let value = self.bus.read(addr);
                self.set_flag(FLAG_ZERO, self.a & value == 0);
                self.set_flag(FLAG_OVERFLOW, value & 0x40 != 0);
                self.set_flag(FLAG_NEGATIVE, value & 0x80 != 0);
            }

            // Increments
            Mnemonic::Inc => {
                self.modify(addr, false, |_, v| v.wrapping_add(1));
            }
            Mnemonic::Dec => {
                self.modify(addr, false, |_, v| v.wrapping_sub(1));
            }
            Mnemonic::Inx => {
                self.x = self.x.wrapping_add(1);
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Iny => {
                self.y = self.y.wrapping_add(1);
                self.update_zero_and_negative_flags(self.y);
            }
            Mnemonic::Dex => {
                self.x = self.x.wrapping_sub(1);
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Dey => {
                self.y = self.y.wrapping_sub(1);
                self.update_zero_and_negative_flags(self.y);
            }

            // Shifts
            Mnemonic::Asl => {
                self.modify(addr, accumulator, Self::asl);
            }
            Mnemonic::Lsr => {
                self.modify(addr, accumulator, Self::lsr);
            }
            Mnemonic::Rol => {
                self.modify(addr, accumulator, Self::rol);
            }
            Mnemonic::Ror => {
                self.modify(addr, accumulator, Self::ror);
            }

            // Jumps and branches
            Mnemonic::Jmp => self.pc = addr,
            Mnemonic::Jsr => {
                self.push_word(self.pc.wrapping_sub(1));
                self.pc = addr;
            }
            Mnemonic::Rts => self.pc = self.pop_word().wrapping_add(1),
            Mnemonic::Rti => {
                self.status = (self.pop() & !FLAG_BREAK) | FLAG_UNUSED;
                self.pc = self.pop_word();
            }
            Mnemonic::Brk => {
                self.pc = self.pc.wrapping_add(1); // padding byte
                self.push_word(self.pc);
                self.push(self.status | FLAG_BREAK | FLAG_UNUSED);
                self.status |= FLAG_INTERRUPT_DISABLE;
                self.pc = self.read_word(IRQ_VECTOR);
            }
            Mnemonic::Bcc => self.branch(!self.flag(FLAG_CARRY), addr),
            Mnemonic::Bcs => self.branch(self.flag(FLAG_CARRY), addr),
            Mnemonic::Bne => self.branch(!self.flag(FLAG_ZERO), addr),
            Mnemonic::Beq => self.branch(self.flag(FLAG_ZERO), addr),
            Mnemonic::Bpl => self.branch(!self.flag(FLAG_NEGATIVE), addr),
            Mnemonic::Bmi => self.branch(self.flag(FLAG_NEGATIVE), addr),
            Mnemonic::Bvc => self.branch(!self.flag(FLAG_OVERFLOW), addr),
            Mnemonic::Bvs => self.branch(self.flag(FLAG_OVERFLOW), addr),

            // Flags
            Mnemonic::Clc => self.set_flag(FLAG_CARRY, false),
            Mnemonic::Sec => self.set_flag(FLAG_CARRY, true),
            Mnemonic::Cli => self.set_flag(FLAG_INTERRUPT_DISABLE, false),
            Mnemonic::Sei => self.set_flag(FLAG_INTERRUPT_DISABLE, true),
            Mnemonic::Cld => self.set_flag(FLAG_DECIMAL, false),
            Mnemonic::Sed => self.set_flag(FLAG_DECIMAL, true),
            Mnemonic::Clv => self.set_flag(FLAG_OVERFLOW, false),

            Mnemonic::Nop => {
                if !matches!(op.mode, Mode::Implied | Mode::Immediate) {
                    self.bus.read(addr);
                }
            }

            // Undocumented combinations
            Mnemonic::Slo => {
                let value = self.modify(addr, false, Self::asl);
                self.a |= value;
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Rla => {
                let value = self.modify(addr, false, Self::rol);
                self.a &= value;
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Sre => {
                let value = self.modify(addr, false, Self::lsr);
                self.a ^= value;
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Rra => {
                let value = self.modify(addr, false, Self::ror);
                self.add(value);
            }
            Mnemonic::Dcp => {
                let value = self.modify(addr, false, |_, v| v.wrapping_sub(1));
                self.compare(self.a, value);
            }
            Mnemonic::Isb => {
                let value = self.modify(addr, false, |_, v| v.wrapping_add(1));
                self.add(!value);
            }
            Mnemonic::Sax => self.bus.write(addr, self.a & self.x),
            Mnemonic::Lax => {
                self.a = self.bus.read(addr);
                self.x = self.a;
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Anc => {
                self.a &= self.bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
                self.set_flag(FLAG_CARRY, self.a & 0x80 != 0);
            }
            Mnemonic::Alr => {
                self.a &= self.bus.read(addr);
                self.a = self.lsr(self.a);
            }
            Mnemonic::Arr => {
                let value = self.a & self.bus.read(addr);
                let carry = if self.flag(FLAG_CARRY) { 0x80 } else { 0 };
                self.a = (value >> 1) | carry;
                self.update_zero_and_negative_flags(self.a);
                self.set_flag(FLAG_CARRY, self.a & 0x40 != 0);
                self.set_flag(FLAG_OVERFLOW, ((self.a >> 6) ^ (self.a >> 5)) & 1 != 0);
            }
            Mnemonic::Xaa => {
                self.a = (self.a | UNSTABLE_MAGIC) & self.x & self.bus.read(addr);
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Lxa => {
                self.a = (self.a | UNSTABLE_MAGIC) & self.bus.read(addr);
                self.x = self.a;
                self.update_zero_and_negative_flags(self.a);
            }
            Mnemonic::Axs => {
                let value = self.bus.read(addr);
                let masked = self.a & self.x;
                self.set_flag(FLAG_CARRY, masked >= value);
                self.x = masked.wrapping_sub(value);
                self.update_zero_and_negative_flags(self.x);
            }
            Mnemonic::Las => {
                let value = self.bus.read(addr) & self.sp;
                self.a = value;
                self.x = value;
                self.sp = value;
                self.update_zero_and_negative_flags(value);
            }
            Mnemonic::Sha => {
                // Both SHA forms index by Y.
                self.store_high_and(addr, self.y, crossed, self.a & self.x);
            }
            Mnemonic::Shx => self.store_high_and(addr, self.y, crossed, self.x),
            Mnemonic::Shy => self.store_high_and(addr, self.x, crossed, self.y),
            Mnemonic::Tas => {
                self.sp = self.a & self.x;
                self.store_high_and(addr, self.y, crossed, self.sp);
            }
            Mnemonic::Jam => {
                self.halted = true;
                self.pc = self.pc.wrapping_sub(1);
            }
        }

        self.irq_inhibit = match op.mnemonic {
            Mnemonic::Cli | Mnemonic::Sei | Mnemonic::Plp => inhibit_before,
            _ => self.flag(FLAG_INTERRUPT_DISABLE),
        };
    }

    /// ADC core; SBC passes the complemented operand.
    fn add(&mut self, value: u8) {
        let carry_in = self.flag(FLAG_CARRY) as u16;
        let sum = self.a as u16 + value as u16 + carry_in;
        let result = sum as u8;
        self.set_flag(FLAG_CARRY, sum > 0xFF);
        self.set_flag(FLAG_OVERFLOW, (value ^ result) & (result ^ self.a) & 0x80 != 0);
        self.a = result;
        self.update_zero_and_negative_flags(self.a);
    }

    fn compare(&mut self, register: u8, value: u8) {
        self.set_flag(FLAG_CARRY, register >= value);
        self.update_zero_and_negative_flags(register.wrapping_sub(value));
    }

    fn branch(&mut self, condition: bool, target: u16) {
        if !condition {
            return;
        }
        self.cycles += 1;
        if (self.pc & 0xFF00) != (target & 0xFF00) {
            self.cycles += 1;
        }
        self.pc = target;
    }

    /// Read-modify-write on A or memory. Memory sees the old value written back before the new one.
    fn modify(&mut self, addr: u16, accumulator: bool, f: impl FnOnce(&mut Self, u8) -> u8) -> u8 {
        if accumulator {
            let value = self.a;
            self.a = f(self, value);
            return self.a;
        }
        let old = self.bus.read(addr);
        self.bus.write(addr, old);
        let new = f(self, old);
        self.bus.write(addr, new);
        // INC/DEC and the shifts set N/Z from the result; the combined opcodes overwrite them.
        self.update_zero_and_negative_flags(new);
        new
    }

    fn asl(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_CARRY, value & 0x80 != 0);
        let result = value << 1;
        self.update_zero_and_negative_flags(result);
        result
    }

    fn lsr(&mut self, value: u8) -> u8 {
        self.set_flag(FLAG_CARRY, value & 0x01 != 0);
        let result = value >> 1;
        self.update_zero_and_negative_flags(result);
        result
    }

    fn rol(&mut self, value: u8) -> u8 {
        let carry_in = self.flag(FLAG_CARRY) as u8;
        self.set_flag(FLAG_CARRY, value & 0x80 != 0);
        let result = (value << 1) | carry_in;
        self.update_zero_and_negative_flags(result);
        result
    }

    fn ror(&mut self, value: u8) -> u8 {
        let carry_in = (self.flag(FLAG_CARRY) as u8) << 7;
        self.set_flag(FLAG_CARRY, value & 0x01 != 0);
        let result = (value >> 1) | carry_in;
        self.update_zero_and_negative_flags(result);
        result
    }

    /// SHA/SHX/SHY/TAS: store `value & (high byte of base + 1)`. A page cross replaces the high
    /// byte of the target with the stored value.
    fn store_high_and(&mut self, addr: u16, index: u8, crossed: bool, value: u8) {
        let base = addr.wrapping_sub(index as u16);
        let high = ((base >> 8) as u8).wrapping_add(1);
        let data = value & high;
        let target = if crossed {
            ((data as u16) << 8) | (addr & 0x00FF)
        } else {
            addr
        };
        self.bus.write(target, data);
    }

    pub fn save_state(&self) -> CpuState {
        CpuState {
            a: self.a,
            x: self.x,
            y: self.y,
            sp: self.sp,
            pc: self.pc,
            status: self.status,
            cycles: self.cycles,
            halted: self.halted,
            stall: self.stall,
            nmi_pending: self.nmi_pending,
            irq_inhibit: self.irq_inhibit,
        }
    }

    pub fn load_state(&mut self, state: CpuState) {
        self.a = state.a;
        self.x = state.x;
        self.y = state.y;
        self.sp = state.sp;
        self.pc = state.pc;
        self.status = state.status;
        self.cycles = state.cycles;
        self.halted = state.halted;
        self.stall = state.stall;
        self.nmi_pending = state.nmi_pending;
        self.irq_inhibit = state.irq_inhibit;
    }
}
