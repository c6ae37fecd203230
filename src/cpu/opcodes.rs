//! The 256-entry 6502 decode table, undocumented opcodes included.
//!
//! See [6502 instructions](https://www.nesdev.org/wiki/Instruction_reference) and
//! [CPU unofficial opcodes](https://www.nesdev.org/wiki/CPU_unofficial_opcodes). Every byte value
//! decodes to something; the twelve JAM codes stop the processor.

/// Instruction mnemonic. The trace prints the upper-case name.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mnemonic {
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc, Cld, Cli, Clv, Cmp, Cpx,
    Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha, Php, Pla,
    Plp, Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa, Txs, Tya,
    // Undocumented
    Alr, Anc, Arr, Axs, Dcp, Isb, Jam, Las, Lax, Lxa, Rla, Rra, Sax, Sha, Shx, Shy, Slo, Sre, Tas,
    Xaa,
}

impl Mnemonic {
    pub fn name(self) -> &'static str {
        use Mnemonic::*;
        match self {
            Adc => "ADC", And => "AND", Asl => "ASL", Bcc => "BCC", Bcs => "BCS", Beq => "BEQ",
            Bit => "BIT", Bmi => "BMI", Bne => "BNE", Bpl => "BPL", Brk => "BRK", Bvc => "BVC",
            Bvs => "BVS", Clc => "CLC", Cld => "CLD", Cli => "CLI", Clv => "CLV", Cmp => "CMP",
            Cpx => "CPX", Cpy => "CPY", Dec => "DEC", Dex => "DEX", Dey => "DEY", Eor => "EOR",
            Inc => "INC", Inx => "INX", Iny => "INY", Jmp => "JMP", Jsr => "JSR", Lda => "LDA",
            Ldx => "LDX", Ldy => "LDY", Lsr => "LSR", Nop => "NOP", Ora => "ORA", Pha => "PHA",
            Php => "PHP", Pla => "PLA", Plp => "PLP", Rol => "ROL", Ror => "ROR", Rti => "RTI",
            Rts => "RTS", Sbc => "SBC", Sec => "SEC", Sed => "SED", Sei => "SEI", Sta => "STA",
            Stx => "STX", Sty => "STY", Tax => "TAX", Tay => "TAY", Tsx => "TSX", Txa => "TXA",
            Txs => "TXS", Tya => "TYA", Alr => "ALR", Anc => "ANC", Arr => "ARR", Axs => "AXS",
            Dcp => "DCP", Isb => "ISB", Jam => "JAM", Las => "LAS", Lax => "LAX", Lxa => "LXA",
            Rla => "RLA", Rra => "RRA", Sax => "SAX", Sha => "SHA", Shx => "SHX", Shy => "SHY",
            Slo => "SLO", Sre => "SRE", Tas => "TAS", Xaa => "XAA",
        }
    }
}

/// Addressing mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Implied,
    Accumulator,
    Immediate,
    ZeroPage,
    ZeroPageX,
    ZeroPageY,
    Absolute,
    AbsoluteX,
    AbsoluteY,
    /// JMP only.
    Indirect,
    /// (zp,X)
    IndirectX,
    /// (zp),Y
    IndirectY,
    Relative,
}

impl Mode {
    /// Instruction length in bytes, opcode included.
    pub fn size(self) -> u16 {
        match self {
            Mode::Implied | Mode::Accumulator => 1,
            Mode::Absolute | Mode::AbsoluteX | Mode::AbsoluteY | Mode::Indirect => 3,
            _ => 2,
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Opcode {
    pub mnemonic: Mnemonic,
    pub mode: Mode,
    /// Base cycle count.
    pub cycles: u8,
    /// Extra cycle when an indexed read crosses a page.
    pub page_cycles: u8,
    /// Undocumented; the trace marks these with `*`.
    pub illegal: bool,
}

const fn op(mnemonic: Mnemonic, mode: Mode, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, cycles, page_cycles: 0, illegal: false }
}

const fn op_p(mnemonic: Mnemonic, mode: Mode, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, cycles, page_cycles: 1, illegal: false }
}

const fn il(mnemonic: Mnemonic, mode: Mode, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, cycles, page_cycles: 0, illegal: true }
}

const fn il_p(mnemonic: Mnemonic, mode: Mode, cycles: u8) -> Opcode {
    Opcode { mnemonic, mode, cycles, page_cycles: 1, illegal: true }
}

use Mnemonic::*;
use Mode::{
    Absolute as Abs, AbsoluteX as Abx, AbsoluteY as Aby, Accumulator as Acc, Immediate as Imm,
    Implied as Imp, Indirect as Ind, IndirectX as Izx, IndirectY as Izy, Relative as Rel,
    ZeroPage as Zp, ZeroPageX as Zpx, ZeroPageY as Zpy,
};

const JAM: Opcode = il(Jam, Imp, 2);

#[rustfmt::skip]
pub static OPCODES: [Opcode; 256] = [
    // 0x00
    op(Brk, Imp, 7),   op(Ora, Izx, 6),   JAM,               il(Slo, Izx, 8),
    il(Nop, Zp, 3),    op(Ora, Zp, 3),    op(Asl, Zp, 5),    il(Slo, Zp, 5),
    op(Php, Imp, 3),   op(Ora, Imm, 2),   op(Asl, Acc, 2),   il(Anc, Imm, 2),
    il(Nop, Abs, 4),   op(Ora, Abs, 4),   op(Asl, Abs, 6),   il(Slo, Abs, 6),
    // 0x10
    op(Bpl, Rel, 2),   op_p(Ora, Izy, 5), JAM,               il(Slo, Izy, 8),
    il(Nop, Zpx, 4),   op(Ora, Zpx, 4),   op(Asl, Zpx, 6),   il(Slo, Zpx, 6),
    op(Clc, Imp, 2),   op_p(Ora, Aby, 4), il(Nop, Imp, 2),   il(Slo, Aby, 7),
    il_p(Nop, Abx, 4), op_p(Ora, Abx, 4), op(Asl, Abx, 7),   il(Slo, Abx, 7),
    // 0x20
    op(Jsr, Abs, 6),   op(And, Izx, 6),   JAM,               il(Rla, Izx, 8),
    op(Bit, Zp, 3),    op(And, Zp, 3),    op(Rol, Zp, 5),    il(Rla, Zp, 5),
    op(Plp, Imp, 4),   op(And, Imm, 2),   op(Rol, Acc, 2),   il(Anc, Imm, 2),
    op(Bit, Abs, 4),   op(And, Abs, 4),   op(Rol, Abs, 6),   il(Rla, Abs, 6),
    // 0x30
    op(Bmi, Rel, 2),   op_p(And, Izy, 5), JAM,               il(Rla, Izy, 8),
    il(Nop, Zpx, 4),   op(And, Zpx, 4),   op(Rol, Zpx, 6),   il(Rla, Zpx, 6),
    op(Sec, Imp, 2),   op_p(And, Aby, 4), il(Nop, Imp, 2),   il(Rla, Aby, 7),
    il_p(Nop, Abx, 4), op_p(And, Abx, 4), op(Rol, Abx, 7),   il(Rla, Abx, 7),
    // 0x40
    op(Rti, Imp, 6),   op(Eor, Izx, 6),   JAM,               il(Sre, Izx, 8),
    il(Nop, Zp, 3),    op(Eor, Zp, 3),    op(Lsr, Zp, 5),    il(Sre, Zp, 5),
    op(Pha, Imp, 3),   op(Eor, Imm, 2),   op(Lsr, Acc, 2),   il(Alr, Imm, 2),
    op(Jmp, Abs, 3),   op(Eor, Abs, 4),   op(Lsr, Abs, 6),   il(Sre, Abs, 6),
    // 0x50
    op(Bvc, Rel, 2),   op_p(Eor, Izy, 5), JAM,               il(Sre, Izy, 8),
    il(Nop, Zpx, 4),   op(Eor, Zpx, 4),   op(Lsr, Zpx, 6),   il(Sre, Zpx, 6),
    op(Cli, Imp, 2),   op_p(Eor, Aby, 4), il(Nop, Imp, 2),   il(Sre, Aby, 7),
    il_p(Nop, Abx, 4), op_p(Eor, Abx, 4), op(Lsr, Abx, 7),   il(Sre, Abx, 7),
    // 0x60
    op(Rts, Imp, 6),   op(Adc, Izx, 6),   JAM,               il(Rra, Izx, 8),
    il(Nop, Zp, 3),    op(Adc, Zp, 3),    op(Ror, Zp, 5),    il(Rra, Zp, 5),
    op(Pla, Imp, 4),   op(Adc, Imm, 2),   op(Ror, Acc, 2),   il(Arr, Imm, 2),
    op(Jmp, Ind, 5),   op(Adc, Abs, 4),   op(Ror, Abs, 6),   il(Rra, Abs, 6),
    // 0x70
    op(Bvs, Rel, 2),   op_p(Adc, Izy, 5), JAM,               il(Rra, Izy, 8),
    il(Nop, Zpx, 4),   op(Adc, Zpx, 4),   op(Ror, Zpx, 6),   il(Rra, Zpx, 6),
    op(Sei, Imp, 2),   op_p(Adc, Aby, 4), il(Nop, Imp, 2),   il(Rra, Aby, 7),
    il_p(Nop, Abx, 4), op_p(Adc, Abx, 4), op(Ror, Abx, 7),   il(Rra, Abx, 7),
    // 0x80
    il(Nop, Imm, 2),   op(Sta, Izx, 6),   il(Nop, Imm, 2),   il(Sax, Izx, 6),
    op(Sty, Zp, 3),    op(Sta, Zp, 3),    op(Stx, Zp, 3),    il(Sax, Zp, 3),
    op(Dey, Imp, 2),   il(Nop, Imm, 2),   op(Txa, Imp, 2),   il(Xaa, Imm, 2),
    op(Sty, Abs, 4),   op(Sta, Abs, 4),   op(Stx, Abs, 4),   il(Sax, Abs, 4),
    // 0x90
    op(Bcc, Rel, 2),   op(Sta, Izy, 6),   JAM,               il(Sha, Izy, 6),
    op(Sty, Zpx, 4),   op(Sta, Zpx, 4),   op(Stx, Zpy, 4),   il(Sax, Zpy, 4),
    op(Tya, Imp, 2),   op(Sta, Aby, 5),   op(Txs, Imp, 2),   il(Tas, Aby, 5),
    il(Shy, Abx, 5),   op(Sta, Abx, 5),   il(Shx, Aby, 5),   il(Sha, Aby, 5),
    // 0xA0
    op(Ldy, Imm, 2),   op(Lda, Izx, 6),   op(Ldx, Imm, 2),   il(Lax, Izx, 6),
    op(Ldy, Zp, 3),    op(Lda, Zp, 3),    op(Ldx, Zp, 3),    il(Lax, Zp, 3),
    op(Tay, Imp, 2),   op(Lda, Imm, 2),   op(Tax, Imp, 2),   il(Lxa, Imm, 2),
    op(Ldy, Abs, 4),   op(Lda, Abs, 4),   op(Ldx, Abs, 4),   il(Lax, Abs, 4),
    // 0xB0
    op(Bcs, Rel, 2),   op_p(Lda, Izy, 5), JAM,               il_p(Lax, Izy, 5),
    op(Ldy, Zpx, 4),   op(Lda, Zpx, 4),   op(Ldx, Zpy, 4),   il(Lax, Zpy, 4),
    op(Clv, Imp, 2),   op_p(Lda, Aby, 4), op(Tsx, Imp, 2),   il_p(Las, Aby, 4),
    op_p(Ldy, Abx, 4), op_p(Lda, Abx, 4), op_p(Ldx, Aby, 4), il_p(Lax, Aby, 4),
    // 0xC0
    op(Cpy, Imm, 2),   op(Cmp, Izx, 6),   il(Nop, Imm, 2),   il(Dcp, Izx, 8),
    op(Cpy, Zp, 3),    op(Cmp, Zp, 3),    op(Dec, Zp, 5),    il(Dcp, Zp, 5),
    op(Iny, Imp, 2),   op(Cmp, Imm, 2),   op(Dex, Imp, 2),   il(Axs, Imm, 2),
    op(Cpy, Abs, 4),   op(Cmp, Abs, 4),   op(Dec, Abs, 6),   il(Dcp, Abs, 6),
    // 0xD0
    op(Bne, Rel, 2),   op_p(Cmp, Izy, 5), JAM,               il(Dcp, Izy, 8),
    il(Nop, Zpx, 4),   op(Cmp, Zpx, 4),   op(Dec, Zpx, 6),   il(Dcp, Zpx, 6),
    op(Cld, Imp, 2),   op_p(Cmp, Aby, 4), il(Nop, Imp, 2),   il(Dcp, Aby, 7),
    il_p(Nop, Abx, 4), op_p(Cmp, Abx, 4), op(Dec, Abx, 7),   il(Dcp, Abx, 7),
    // 0xE0
    op(Cpx, Imm, 2),   op(Sbc, Izx, 6),   il(Nop, Imm, 2),   il(Isb, Izx, 8),
    op(Cpx, Zp, 3),    op(Sbc, Zp, 3),    op(Inc, Zp, 5),    il(Isb, Zp, 5),
    op(Inx, Imp, 2),   op(Sbc, Imm, 2),   op(Nop, Imp, 2),   il(Sbc, Imm, 2),
    op(Cpx, Abs, 4),   op(Sbc, Abs, 4),   op(Inc, Abs, 6),   il(Isb, Abs, 6),
    // 0xF0
    op(Beq, Rel, 2),   op_p(Sbc, Izy, 5), JAM,               il(Isb, Izy, 8),
    il(Nop, Zpx, 4),   op(Sbc, Zpx, 4),   op(Inc, Zpx, 6),   il(Isb, Zpx, 6),
    op(Sed, Imp, 2),   op_p(Sbc, Aby, 4), il(Nop, Imp, 2),   il(Isb, Aby, 7),
    il_p(Nop, Abx, 4), op_p(Sbc, Abx, 4), op(Inc, Abx, 7),   il(Isb, Abx, 7),
];
