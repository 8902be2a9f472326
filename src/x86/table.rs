//! Opcode tables for the 8086..80386 encodings that appear in
//! protected-mode 16-bit modules.
//!
//! Three lookup paths exist: the one-byte map, the `0F`-escaped map, and
//! the ModR/M-extended groups (immediate ALU group, shift group, the
//! `F6/F7/FE/FF` unary groups and the descriptor-table groups). The x87
//! escapes `D8..DF` have their own pair of maps because the second byte
//! selects between a memory form (by `/n`) and a register form (by the
//! whole byte).
//!
//! A `None` from any lookup means the encoding is not known to the
//! table; the decoder then produces a record with an empty mnemonic and
//! the printer writes `?`.

use super::Arg::*;
use super::{
    Arg, Op, NO_SUBCODE, OP_ARG2_CL, OP_ARG2_IMM, OP_ARG2_IMM8, OP_FAR, OP_L, OP_LL, OP_LOCK,
    OP_REPE, OP_REPNE, OP_S, OP_STACK, OP_STRING,
};

const fn op(opcode: u16, name: &'static str, size: u8, arg0: Arg, arg1: Arg, flags: u32) -> Op {
    Op {
        opcode,
        subcode: NO_SUBCODE,
        size,
        name,
        arg0,
        arg1,
        flags,
    }
}

const fn grp(
    opcode: u16,
    subcode: u8,
    name: &'static str,
    size: u8,
    arg0: Arg,
    arg1: Arg,
    flags: u32,
) -> Op {
    Op {
        opcode,
        subcode,
        size,
        name,
        arg0,
        arg1,
        flags,
    }
}

/// Prefix byte decoding: which prefix does this byte set?
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixByte {
    Seg(super::SegOverride),
    Op32,
    Addr32,
    Lock,
    Repne,
    Repe,
}

impl PrefixByte {
    pub fn of(byte: u8) -> Option<PrefixByte> {
        use super::SegOverride::*;
        match byte {
            0x26 => Some(PrefixByte::Seg(Es)),
            0x2E => Some(PrefixByte::Seg(Cs)),
            0x36 => Some(PrefixByte::Seg(Ss)),
            0x3E => Some(PrefixByte::Seg(Ds)),
            0x64 => Some(PrefixByte::Seg(Fs)),
            0x65 => Some(PrefixByte::Seg(Gs)),
            0x66 => Some(PrefixByte::Op32),
            0x67 => Some(PrefixByte::Addr32),
            0xF0 => Some(PrefixByte::Lock),
            0xF2 => Some(PrefixByte::Repne),
            0xF3 => Some(PrefixByte::Repe),
            _ => Option::None,
        }
    }

    /// Pseudo-op used when a prefix is reported as the whole
    /// instruction (doubled prefixes stop the decode).
    pub fn pseudo_op(self, byte: u8) -> Op {
        let name = match self {
            PrefixByte::Seg(s) => s.name(),
            PrefixByte::Op32 => "data32",
            PrefixByte::Addr32 => "addr32",
            PrefixByte::Lock => "lock",
            PrefixByte::Repne => "repne",
            PrefixByte::Repe => "repe",
        };
        op(byte as u16, name, 0, None_, None_, 0)
    }
}

// `None` the variant clashes with `Option::None` inside this file.
use super::Arg::None as None_;

/// Does this one-byte opcode take its mnemonic from a ModR/M group?
pub fn is_group(opcode: u8) -> bool {
    matches!(
        opcode,
        0x80..=0x83 | 0x8F | 0xC0 | 0xC1 | 0xC6 | 0xC7 | 0xD0..=0xD3 | 0xF6 | 0xF7 | 0xFE | 0xFF
    )
}

/// One-byte opcode map. Prefix bytes, the `0F` escape, group bytes and
/// the x87 escapes never reach this function.
pub fn lookup(opcode: u8) -> Option<Op> {
    let o = opcode as u16;
    let entry = match opcode {
        0x00 => op(o, "add", 8, Rm, Reg, OP_LOCK),
        0x01 => op(o, "add", 16, Rm, Reg, OP_LOCK),
        0x02 => op(o, "add", 8, Reg, Rm, 0),
        0x03 => op(o, "add", 16, Reg, Rm, 0),
        0x04 => op(o, "add", 8, Al, Imm, 0),
        0x05 => op(o, "add", 16, Ax, Imm, 0),
        0x06 => op(o, "push", 16, Es, None_, OP_STACK),
        0x07 => op(o, "pop", 16, Es, None_, OP_STACK),
        0x08 => op(o, "or", 8, Rm, Reg, OP_LOCK),
        0x09 => op(o, "or", 16, Rm, Reg, OP_LOCK),
        0x0A => op(o, "or", 8, Reg, Rm, 0),
        0x0B => op(o, "or", 16, Reg, Rm, 0),
        0x0C => op(o, "or", 8, Al, Imm, 0),
        0x0D => op(o, "or", 16, Ax, Imm, 0),
        0x0E => op(o, "push", 16, Cs, None_, OP_STACK),
        0x10 => op(o, "adc", 8, Rm, Reg, OP_LOCK),
        0x11 => op(o, "adc", 16, Rm, Reg, OP_LOCK),
        0x12 => op(o, "adc", 8, Reg, Rm, 0),
        0x13 => op(o, "adc", 16, Reg, Rm, 0),
        0x14 => op(o, "adc", 8, Al, Imm, 0),
        0x15 => op(o, "adc", 16, Ax, Imm, 0),
        0x16 => op(o, "push", 16, Ss, None_, OP_STACK),
        0x17 => op(o, "pop", 16, Ss, None_, OP_STACK),
        0x18 => op(o, "sbb", 8, Rm, Reg, OP_LOCK),
        0x19 => op(o, "sbb", 16, Rm, Reg, OP_LOCK),
        0x1A => op(o, "sbb", 8, Reg, Rm, 0),
        0x1B => op(o, "sbb", 16, Reg, Rm, 0),
        0x1C => op(o, "sbb", 8, Al, Imm, 0),
        0x1D => op(o, "sbb", 16, Ax, Imm, 0),
        0x1E => op(o, "push", 16, Ds, None_, OP_STACK),
        0x1F => op(o, "pop", 16, Ds, None_, OP_STACK),
        0x20 => op(o, "and", 8, Rm, Reg, OP_LOCK),
        0x21 => op(o, "and", 16, Rm, Reg, OP_LOCK),
        0x22 => op(o, "and", 8, Reg, Rm, 0),
        0x23 => op(o, "and", 16, Reg, Rm, 0),
        0x24 => op(o, "and", 8, Al, Imm, 0),
        0x25 => op(o, "and", 16, Ax, Imm, 0),
        0x27 => op(o, "daa", 0, None_, None_, 0),
        0x28 => op(o, "sub", 8, Rm, Reg, OP_LOCK),
        0x29 => op(o, "sub", 16, Rm, Reg, OP_LOCK),
        0x2A => op(o, "sub", 8, Reg, Rm, 0),
        0x2B => op(o, "sub", 16, Reg, Rm, 0),
        0x2C => op(o, "sub", 8, Al, Imm, 0),
        0x2D => op(o, "sub", 16, Ax, Imm, 0),
        0x2F => op(o, "das", 0, None_, None_, 0),
        0x30 => op(o, "xor", 8, Rm, Reg, OP_LOCK),
        0x31 => op(o, "xor", 16, Rm, Reg, OP_LOCK),
        0x32 => op(o, "xor", 8, Reg, Rm, 0),
        0x33 => op(o, "xor", 16, Reg, Rm, 0),
        0x34 => op(o, "xor", 8, Al, Imm, 0),
        0x35 => op(o, "xor", 16, Ax, Imm, 0),
        0x37 => op(o, "aaa", 0, None_, None_, 0),
        0x38 => op(o, "cmp", 8, Rm, Reg, 0),
        0x39 => op(o, "cmp", 16, Rm, Reg, 0),
        0x3A => op(o, "cmp", 8, Reg, Rm, 0),
        0x3B => op(o, "cmp", 16, Reg, Rm, 0),
        0x3C => op(o, "cmp", 8, Al, Imm, 0),
        0x3D => op(o, "cmp", 16, Ax, Imm, 0),
        0x3F => op(o, "aas", 0, None_, None_, 0),
        0x40 => op(o, "inc", 16, Ax, None_, 0),
        0x41 => op(o, "inc", 16, Cx, None_, 0),
        0x42 => op(o, "inc", 16, Dx, None_, 0),
        0x43 => op(o, "inc", 16, Bx, None_, 0),
        0x44 => op(o, "inc", 16, Sp, None_, 0),
        0x45 => op(o, "inc", 16, Bp, None_, 0),
        0x46 => op(o, "inc", 16, Si, None_, 0),
        0x47 => op(o, "inc", 16, Di, None_, 0),
        0x48 => op(o, "dec", 16, Ax, None_, 0),
        0x49 => op(o, "dec", 16, Cx, None_, 0),
        0x4A => op(o, "dec", 16, Dx, None_, 0),
        0x4B => op(o, "dec", 16, Bx, None_, 0),
        0x4C => op(o, "dec", 16, Sp, None_, 0),
        0x4D => op(o, "dec", 16, Bp, None_, 0),
        0x4E => op(o, "dec", 16, Si, None_, 0),
        0x4F => op(o, "dec", 16, Di, None_, 0),
        0x50 => op(o, "push", 16, Ax, None_, OP_STACK),
        0x51 => op(o, "push", 16, Cx, None_, OP_STACK),
        0x52 => op(o, "push", 16, Dx, None_, OP_STACK),
        0x53 => op(o, "push", 16, Bx, None_, OP_STACK),
        0x54 => op(o, "push", 16, Sp, None_, OP_STACK),
        0x55 => op(o, "push", 16, Bp, None_, OP_STACK),
        0x56 => op(o, "push", 16, Si, None_, OP_STACK),
        0x57 => op(o, "push", 16, Di, None_, OP_STACK),
        0x58 => op(o, "pop", 16, Ax, None_, OP_STACK),
        0x59 => op(o, "pop", 16, Cx, None_, OP_STACK),
        0x5A => op(o, "pop", 16, Dx, None_, OP_STACK),
        0x5B => op(o, "pop", 16, Bx, None_, OP_STACK),
        0x5C => op(o, "pop", 16, Sp, None_, OP_STACK),
        0x5D => op(o, "pop", 16, Bp, None_, OP_STACK),
        0x5E => op(o, "pop", 16, Si, None_, OP_STACK),
        0x5F => op(o, "pop", 16, Di, None_, OP_STACK),
        0x60 => op(o, "pusha", 16, None_, None_, OP_STACK),
        0x61 => op(o, "popa", 16, None_, None_, OP_STACK),
        0x62 => op(o, "bound", 16, Reg, Mem, 0),
        0x63 => op(o, "arpl", 16, Rm, Reg, 0),
        0x68 => op(o, "push", 16, Imm, None_, OP_STACK),
        0x69 => op(o, "imul", 16, Reg, Rm, OP_ARG2_IMM),
        0x6A => op(o, "push", 16, Imm8, None_, OP_STACK),
        0x6B => op(o, "imul", 16, Reg, Rm, OP_ARG2_IMM8),
        0x6C => op(o, "ins", 8, EsDi, DxImp, OP_STRING | OP_REPE),
        0x6D => op(o, "ins", 16, EsDi, DxImp, OP_STRING | OP_REPE),
        0x6E => op(o, "outs", 8, DxImp, DsSi, OP_STRING | OP_REPE),
        0x6F => op(o, "outs", 16, DxImp, DsSi, OP_STRING | OP_REPE),
        0x70 => op(o, "jo", 0, Rel8, None_, 0),
        0x71 => op(o, "jno", 0, Rel8, None_, 0),
        0x72 => op(o, "jb", 0, Rel8, None_, 0),
        0x73 => op(o, "jae", 0, Rel8, None_, 0),
        0x74 => op(o, "jz", 0, Rel8, None_, 0),
        0x75 => op(o, "jnz", 0, Rel8, None_, 0),
        0x76 => op(o, "jbe", 0, Rel8, None_, 0),
        0x77 => op(o, "ja", 0, Rel8, None_, 0),
        0x78 => op(o, "js", 0, Rel8, None_, 0),
        0x79 => op(o, "jns", 0, Rel8, None_, 0),
        0x7A => op(o, "jp", 0, Rel8, None_, 0),
        0x7B => op(o, "jnp", 0, Rel8, None_, 0),
        0x7C => op(o, "jl", 0, Rel8, None_, 0),
        0x7D => op(o, "jge", 0, Rel8, None_, 0),
        0x7E => op(o, "jle", 0, Rel8, None_, 0),
        0x7F => op(o, "jg", 0, Rel8, None_, 0),
        0x84 => op(o, "test", 8, Rm, Reg, 0),
        0x85 => op(o, "test", 16, Rm, Reg, 0),
        0x86 => op(o, "xchg", 8, Reg, Rm, OP_LOCK),
        0x87 => op(o, "xchg", 16, Reg, Rm, OP_LOCK),
        0x88 => op(o, "mov", 8, Rm, Reg, 0),
        0x89 => op(o, "mov", 16, Rm, Reg, 0),
        0x8A => op(o, "mov", 8, Reg, Rm, 0),
        0x8B => op(o, "mov", 16, Reg, Rm, 0),
        0x8C => op(o, "mov", 16, Rm, Seg16, 0),
        0x8D => op(o, "lea", 16, Reg, Mem, 0),
        0x8E => op(o, "mov", 16, Seg16, Rm, 0),
        0x90 => op(o, "nop", 0, None_, None_, 0),
        0x91 => op(o, "xchg", 16, Ax, Cx, 0),
        0x92 => op(o, "xchg", 16, Ax, Dx, 0),
        0x93 => op(o, "xchg", 16, Ax, Bx, 0),
        0x94 => op(o, "xchg", 16, Ax, Sp, 0),
        0x95 => op(o, "xchg", 16, Ax, Bp, 0),
        0x96 => op(o, "xchg", 16, Ax, Si, 0),
        0x97 => op(o, "xchg", 16, Ax, Di, 0),
        0x98 => op(o, "cbw", 16, None_, None_, 0),
        0x99 => op(o, "cwd", 16, None_, None_, 0),
        0x9A => op(o, "call", 16, Ptr32, None_, OP_FAR),
        0x9B => op(o, "wait", 0, None_, None_, 0),
        0x9C => op(o, "pushf", 16, None_, None_, OP_STACK),
        0x9D => op(o, "popf", 16, None_, None_, OP_STACK),
        0x9E => op(o, "sahf", 0, None_, None_, 0),
        0x9F => op(o, "lahf", 0, None_, None_, 0),
        0xA0 => op(o, "mov", 8, Al, Moffs16, 0),
        0xA1 => op(o, "mov", 16, Ax, Moffs16, 0),
        0xA2 => op(o, "mov", 8, Moffs16, Al, 0),
        0xA3 => op(o, "mov", 16, Moffs16, Ax, 0),
        0xA4 => op(o, "movs", 8, EsDi, DsSi, OP_STRING | OP_REPE),
        0xA5 => op(o, "movs", 16, EsDi, DsSi, OP_STRING | OP_REPE),
        0xA6 => op(o, "cmps", 8, DsSi, EsDi, OP_STRING | OP_REPE | OP_REPNE),
        0xA7 => op(o, "cmps", 16, DsSi, EsDi, OP_STRING | OP_REPE | OP_REPNE),
        0xA8 => op(o, "test", 8, Al, Imm, 0),
        0xA9 => op(o, "test", 16, Ax, Imm, 0),
        0xAA => op(o, "stos", 8, EsDi, AlImp, OP_STRING | OP_REPE),
        0xAB => op(o, "stos", 16, EsDi, AxImp, OP_STRING | OP_REPE),
        0xAC => op(o, "lods", 8, AlImp, DsSi, OP_STRING | OP_REPE),
        0xAD => op(o, "lods", 16, AxImp, DsSi, OP_STRING | OP_REPE),
        0xAE => op(o, "scas", 8, AlImp, EsDi, OP_STRING | OP_REPE | OP_REPNE),
        0xAF => op(o, "scas", 16, AxImp, EsDi, OP_STRING | OP_REPE | OP_REPNE),
        0xB0 => op(o, "mov", 8, Al, Imm, 0),
        0xB1 => op(o, "mov", 8, Cl, Imm, 0),
        0xB2 => op(o, "mov", 8, Dl, Imm, 0),
        0xB3 => op(o, "mov", 8, Bl, Imm, 0),
        0xB4 => op(o, "mov", 8, Ah, Imm, 0),
        0xB5 => op(o, "mov", 8, Ch, Imm, 0),
        0xB6 => op(o, "mov", 8, Dh, Imm, 0),
        0xB7 => op(o, "mov", 8, Bh, Imm, 0),
        0xB8 => op(o, "mov", 16, Ax, Imm, 0),
        0xB9 => op(o, "mov", 16, Cx, Imm, 0),
        0xBA => op(o, "mov", 16, Dx, Imm, 0),
        0xBB => op(o, "mov", 16, Bx, Imm, 0),
        0xBC => op(o, "mov", 16, Sp, Imm, 0),
        0xBD => op(o, "mov", 16, Bp, Imm, 0),
        0xBE => op(o, "mov", 16, Si, Imm, 0),
        0xBF => op(o, "mov", 16, Di, Imm, 0),
        0xC2 => op(o, "ret", 0, Imm16, None_, 0),
        0xC3 => op(o, "ret", 0, None_, None_, 0),
        0xC4 => op(o, "les", 16, Reg, Mem, 0),
        0xC5 => op(o, "lds", 16, Reg, Mem, 0),
        0xC8 => op(o, "enter", 0, Imm16, Imm8, 0),
        0xC9 => op(o, "leave", 0, None_, None_, 0),
        0xCA => op(o, "retf", 0, Imm16, None_, 0),
        0xCB => op(o, "retf", 0, None_, None_, 0),
        0xCC => op(o, "int3", 0, None_, None_, 0),
        0xCD => op(o, "int", 0, Imm8, None_, 0),
        0xCE => op(o, "into", 0, None_, None_, 0),
        0xCF => op(o, "iret", 0, None_, None_, 0),
        0xD4 => op(o, "aam", 0, Imm8, None_, 0),
        0xD5 => op(o, "aad", 0, Imm8, None_, 0),
        0xD6 => op(o, "salc", 0, None_, None_, 0),
        0xD7 => op(o, "xlat", 8, DsBx, None_, 0),
        0xE0 => op(o, "loopne", 0, Rel8, None_, 0),
        0xE1 => op(o, "loope", 0, Rel8, None_, 0),
        0xE2 => op(o, "loop", 0, Rel8, None_, 0),
        0xE3 => op(o, "jcxz", 0, Rel8, None_, 0),
        0xE4 => op(o, "in", 8, Al, Imm8, 0),
        0xE5 => op(o, "in", 16, Ax, Imm8, 0),
        0xE6 => op(o, "out", 8, Imm8, Al, 0),
        0xE7 => op(o, "out", 16, Imm8, Ax, 0),
        0xE8 => op(o, "call", 0, Rel16, None_, 0),
        0xE9 => op(o, "jmp", 0, Rel16, None_, 0),
        0xEA => op(o, "jmp", 0, Ptr32, None_, OP_FAR),
        0xEB => op(o, "jmp", 0, Rel8, None_, 0),
        0xEC => op(o, "in", 8, Al, Dx, 0),
        0xED => op(o, "in", 16, Ax, Dx, 0),
        0xEE => op(o, "out", 8, Dx, Al, 0),
        0xEF => op(o, "out", 16, Dx, Ax, 0),
        0xF4 => op(o, "hlt", 0, None_, None_, 0),
        0xF5 => op(o, "cmc", 0, None_, None_, 0),
        0xF8 => op(o, "clc", 0, None_, None_, 0),
        0xF9 => op(o, "stc", 0, None_, None_, 0),
        0xFA => op(o, "cli", 0, None_, None_, 0),
        0xFB => op(o, "sti", 0, None_, None_, 0),
        0xFC => op(o, "cld", 0, None_, None_, 0),
        0xFD => op(o, "std", 0, None_, None_, 0),
        _ => return Option::None,
    };
    Some(entry)
}

const SHIFT_NAMES: [&str; 8] = ["rol", "ror", "rcl", "rcr", "shl", "shr", "shl", "sar"];
const ALU_NAMES: [&str; 8] = ["add", "or", "adc", "sbb", "and", "sub", "xor", "cmp"];

/// ModR/M-extended groups of the one-byte map.
pub fn lookup_group(opcode: u8, reg: u8) -> Option<Op> {
    let o = opcode as u16;
    let reg = reg & 7;
    let name = |names: &[&'static str; 8]| names[reg as usize];
    let entry = match opcode {
        0x80 | 0x82 => {
            let lock = if reg == 7 { 0 } else { OP_LOCK };
            grp(o, reg, name(&ALU_NAMES), 8, Rm, Imm, lock)
        }
        0x81 => {
            let lock = if reg == 7 { 0 } else { OP_LOCK };
            grp(o, reg, name(&ALU_NAMES), 16, Rm, Imm, lock)
        }
        0x83 => {
            let lock = if reg == 7 { 0 } else { OP_LOCK };
            grp(o, reg, name(&ALU_NAMES), 16, Rm, Imm8, lock)
        }
        0x8F if reg == 0 => grp(o, 0, "pop", 16, Rm, None_, OP_STACK),
        0xC0 => grp(o, reg, name(&SHIFT_NAMES), 8, Rm, Imm8, 0),
        0xC1 => grp(o, reg, name(&SHIFT_NAMES), 16, Rm, Imm8, 0),
        0xC6 if reg == 0 => grp(o, 0, "mov", 8, Rm, Imm, 0),
        0xC7 if reg == 0 => grp(o, 0, "mov", 16, Rm, Imm, 0),
        0xD0 => grp(o, reg, name(&SHIFT_NAMES), 8, Rm, One, 0),
        0xD1 => grp(o, reg, name(&SHIFT_NAMES), 16, Rm, One, 0),
        0xD2 => grp(o, reg, name(&SHIFT_NAMES), 8, Rm, Cl, 0),
        0xD3 => grp(o, reg, name(&SHIFT_NAMES), 16, Rm, Cl, 0),
        0xF6 => match reg {
            0 => grp(o, 0, "test", 8, Rm, Imm, 0),
            2 => grp(o, 2, "not", 8, Rm, None_, OP_LOCK),
            3 => grp(o, 3, "neg", 8, Rm, None_, OP_LOCK),
            4 => grp(o, 4, "mul", 8, Rm, None_, 0),
            5 => grp(o, 5, "imul", 8, Rm, None_, 0),
            6 => grp(o, 6, "div", 8, Rm, None_, 0),
            7 => grp(o, 7, "idiv", 8, Rm, None_, 0),
            _ => return Option::None,
        },
        0xF7 => match reg {
            0 => grp(o, 0, "test", 16, Rm, Imm, 0),
            2 => grp(o, 2, "not", 16, Rm, None_, OP_LOCK),
            3 => grp(o, 3, "neg", 16, Rm, None_, OP_LOCK),
            4 => grp(o, 4, "mul", 16, Rm, None_, 0),
            5 => grp(o, 5, "imul", 16, Rm, None_, 0),
            6 => grp(o, 6, "div", 16, Rm, None_, 0),
            7 => grp(o, 7, "idiv", 16, Rm, None_, 0),
            _ => return Option::None,
        },
        0xFE => match reg {
            0 => grp(o, 0, "inc", 8, Rm, None_, OP_LOCK),
            1 => grp(o, 1, "dec", 8, Rm, None_, OP_LOCK),
            _ => return Option::None,
        },
        0xFF => match reg {
            0 => grp(o, 0, "inc", 16, Rm, None_, OP_LOCK),
            1 => grp(o, 1, "dec", 16, Rm, None_, OP_LOCK),
            2 => grp(o, 2, "call", 16, Rm, None_, 0),
            3 => grp(o, 3, "call", 16, Mem, None_, OP_FAR),
            4 => grp(o, 4, "jmp", 16, Rm, None_, 0),
            5 => grp(o, 5, "jmp", 16, Mem, None_, OP_FAR),
            6 => grp(o, 6, "push", 16, Rm, None_, OP_STACK),
            _ => return Option::None,
        },
        _ => return Option::None,
    };
    Some(entry)
}

/// Which second bytes of the `0F` map are ModR/M groups.
pub fn is_group_0f(second: u8) -> bool {
    matches!(second, 0x00 | 0x01 | 0xBA)
}

const JCC_0F: [&str; 16] = [
    "jo", "jno", "jb", "jae", "jz", "jnz", "jbe", "ja", "js", "jns", "jp", "jnp", "jl", "jge",
    "jle", "jg",
];

/// Two-byte (`0F`-escaped) opcode map, non-group entries.
pub fn lookup_0f(second: u8) -> Option<Op> {
    let o = 0x0F00 | second as u16;
    let entry = match second {
        0x02 => op(o, "lar", 16, Reg, Rm, 0),
        0x03 => op(o, "lsl", 16, Reg, Rm, 0),
        0x06 => op(o, "clts", 0, None_, None_, 0),
        0x08 => op(o, "invd", 0, None_, None_, 0),
        0x09 => op(o, "wbinvd", 0, None_, None_, 0),
        0x20 => op(o, "mov", 32, Reg32, Cr32, 0),
        0x21 => op(o, "mov", 32, Reg32, Dr32, 0),
        0x22 => op(o, "mov", 32, Cr32, Reg32, 0),
        0x23 => op(o, "mov", 32, Dr32, Reg32, 0),
        0x24 => op(o, "mov", 32, Reg32, Tr32, 0),
        0x26 => op(o, "mov", 32, Tr32, Reg32, 0),
        0x80..=0x8F => op(o, JCC_0F[(second & 0x0F) as usize], 0, Rel16, None_, 0),
        0x90..=0x9F => {
            let names: [&str; 16] = [
                "seto", "setno", "setb", "setae", "setz", "setnz", "setbe", "seta", "sets",
                "setns", "setp", "setnp", "setl", "setge", "setle", "setg",
            ];
            op(o, names[(second & 0x0F) as usize], 8, Rm, None_, 0)
        }
        0xA0 => op(o, "push", 16, Fs, None_, OP_STACK),
        0xA1 => op(o, "pop", 16, Fs, None_, OP_STACK),
        0xA3 => op(o, "bt", 16, Rm, Reg, 0),
        0xA4 => op(o, "shld", 16, Rm, Reg, OP_ARG2_IMM8),
        0xA5 => op(o, "shld", 16, Rm, Reg, OP_ARG2_CL),
        0xA8 => op(o, "push", 16, Gs, None_, OP_STACK),
        0xA9 => op(o, "pop", 16, Gs, None_, OP_STACK),
        0xAB => op(o, "bts", 16, Rm, Reg, OP_LOCK),
        0xAC => op(o, "shrd", 16, Rm, Reg, OP_ARG2_IMM8),
        0xAD => op(o, "shrd", 16, Rm, Reg, OP_ARG2_CL),
        0xAF => op(o, "imul", 16, Reg, Rm, 0),
        0xB2 => op(o, "lss", 16, Reg, Mem, 0),
        0xB3 => op(o, "btr", 16, Rm, Reg, OP_LOCK),
        0xB4 => op(o, "lfs", 16, Reg, Mem, 0),
        0xB5 => op(o, "lgs", 16, Reg, Mem, 0),
        0xB6 => op(o, "movzx", 16, Reg, Rm, 0),
        0xB7 => op(o, "movzx", 16, Reg, Rm, 0),
        0xBB => op(o, "btc", 16, Rm, Reg, OP_LOCK),
        0xBC => op(o, "bsf", 16, Reg, Rm, 0),
        0xBD => op(o, "bsr", 16, Reg, Rm, 0),
        0xBE => op(o, "movsx", 16, Reg, Rm, 0),
        0xBF => op(o, "movsx", 16, Reg, Rm, 0),
        _ => return Option::None,
    };
    Some(entry)
}

/// ModR/M groups of the `0F` map.
pub fn lookup_group_0f(second: u8, reg: u8) -> Option<Op> {
    let o = 0x0F00 | second as u16;
    let reg = reg & 7;
    let entry = match second {
        0x00 => match reg {
            0 => grp(o, 0, "sldt", 16, Rm, None_, 0),
            1 => grp(o, 1, "str", 16, Rm, None_, 0),
            2 => grp(o, 2, "lldt", 16, Rm, None_, 0),
            3 => grp(o, 3, "ltr", 16, Rm, None_, 0),
            4 => grp(o, 4, "verr", 16, Rm, None_, 0),
            5 => grp(o, 5, "verw", 16, Rm, None_, 0),
            _ => return Option::None,
        },
        0x01 => match reg {
            0 => grp(o, 0, "sgdt", 0, Mem, None_, 0),
            1 => grp(o, 1, "sidt", 0, Mem, None_, 0),
            2 => grp(o, 2, "lgdt", 0, Mem, None_, 0),
            3 => grp(o, 3, "lidt", 0, Mem, None_, 0),
            4 => grp(o, 4, "smsw", 16, Rm, None_, 0),
            6 => grp(o, 6, "lmsw", 16, Rm, None_, 0),
            _ => return Option::None,
        },
        0xBA => match reg {
            4 => grp(o, 4, "bt", 16, Rm, Imm8, 0),
            5 => grp(o, 5, "bts", 16, Rm, Imm8, OP_LOCK),
            6 => grp(o, 6, "btr", 16, Rm, Imm8, OP_LOCK),
            7 => grp(o, 7, "btc", 16, Rm, Imm8, OP_LOCK),
            _ => return Option::None,
        },
        _ => return Option::None,
    };
    Some(entry)
}

const FPU_ARITH: [&str; 8] = [
    "fadd", "fmul", "fcom", "fcomp", "fsub", "fsubr", "fdiv", "fdivr",
];
const FPU_IARITH: [&str; 8] = [
    "fiadd", "fimul", "ficom", "ficomp", "fisub", "fisubr", "fidiv", "fidivr",
];

/// x87 escape, memory form (`mod < 3`), selected by the `/n` field.
/// `esc` is the low three bits of the escape opcode (`D8..DF`).
pub fn lookup_fpu_mem(esc: u8, reg: u8) -> Option<Op> {
    let o = 0xD8 | (esc & 7) as u16;
    let reg = reg & 7;
    let entry = match esc & 7 {
        0 => grp(o, reg, FPU_ARITH[reg as usize], 32, Mem, None_, OP_S),
        1 => match reg {
            0 => grp(o, 0, "fld", 32, Mem, None_, OP_S),
            2 => grp(o, 2, "fst", 32, Mem, None_, OP_S),
            3 => grp(o, 3, "fstp", 32, Mem, None_, OP_S),
            4 => grp(o, 4, "fldenv", 0, Mem, None_, 0),
            5 => grp(o, 5, "fldcw", 0, Mem, None_, 0),
            6 => grp(o, 6, "fnstenv", 0, Mem, None_, 0),
            7 => grp(o, 7, "fnstcw", 0, Mem, None_, 0),
            _ => return Option::None,
        },
        2 => grp(o, reg, FPU_IARITH[reg as usize], 32, Mem, None_, OP_L),
        3 => match reg {
            0 => grp(o, 0, "fild", 32, Mem, None_, OP_L),
            2 => grp(o, 2, "fist", 32, Mem, None_, OP_L),
            3 => grp(o, 3, "fistp", 32, Mem, None_, OP_L),
            5 => grp(o, 5, "fld", 80, Mem, None_, 0),
            7 => grp(o, 7, "fstp", 80, Mem, None_, 0),
            _ => return Option::None,
        },
        4 => grp(o, reg, FPU_ARITH[reg as usize], 64, Mem, None_, OP_L),
        5 => match reg {
            0 => grp(o, 0, "fld", 64, Mem, None_, OP_L),
            2 => grp(o, 2, "fst", 64, Mem, None_, OP_L),
            3 => grp(o, 3, "fstp", 64, Mem, None_, OP_L),
            4 => grp(o, 4, "frstor", 0, Mem, None_, 0),
            6 => grp(o, 6, "fnsave", 0, Mem, None_, 0),
            7 => grp(o, 7, "fnstsw", 0, Mem, None_, 0),
            _ => return Option::None,
        },
        6 => grp(o, reg, FPU_IARITH[reg as usize], 16, Mem, None_, OP_S),
        7 => match reg {
            0 => grp(o, 0, "fild", 16, Mem, None_, OP_S),
            2 => grp(o, 2, "fist", 16, Mem, None_, OP_S),
            3 => grp(o, 3, "fistp", 16, Mem, None_, OP_S),
            4 => grp(o, 4, "fbld", 80, Mem, None_, 0),
            5 => grp(o, 5, "fild", 64, Mem, None_, OP_LL),
            6 => grp(o, 6, "fbstp", 80, Mem, None_, 0),
            7 => grp(o, 7, "fistp", 64, Mem, None_, OP_LL),
            _ => return Option::None,
        },
        _ => return Option::None,
    };
    Some(entry)
}

/// x87 escape, register form (`mod = 3`), selected by the whole second
/// byte.
pub fn lookup_fpu_reg(esc: u8, modrm: u8) -> Option<Op> {
    let o = 0xD8 | (esc & 7) as u16;
    let entry = match (esc & 7, modrm) {
        (0, 0xC0..=0xC7) => grp(o, 0, "fadd", 0, St, Stx, 0),
        (0, 0xC8..=0xCF) => grp(o, 1, "fmul", 0, St, Stx, 0),
        (0, 0xD0..=0xD7) => grp(o, 2, "fcom", 0, Stx, None_, 0),
        (0, 0xD8..=0xDF) => grp(o, 3, "fcomp", 0, Stx, None_, 0),
        (0, 0xE0..=0xE7) => grp(o, 4, "fsub", 0, St, Stx, 0),
        (0, 0xE8..=0xEF) => grp(o, 5, "fsubr", 0, St, Stx, 0),
        (0, 0xF0..=0xF7) => grp(o, 6, "fdiv", 0, St, Stx, 0),
        (0, 0xF8..=0xFF) => grp(o, 7, "fdivr", 0, St, Stx, 0),
        (1, 0xC0..=0xC7) => grp(o, 0, "fld", 0, Stx, None_, 0),
        (1, 0xC8..=0xCF) => grp(o, 1, "fxch", 0, Stx, None_, 0),
        (1, 0xD0) => grp(o, 2, "fnop", 0, None_, None_, 0),
        (1, 0xE0) => grp(o, 4, "fchs", 0, None_, None_, 0),
        (1, 0xE1) => grp(o, 4, "fabs", 0, None_, None_, 0),
        (1, 0xE4) => grp(o, 4, "ftst", 0, None_, None_, 0),
        (1, 0xE5) => grp(o, 4, "fxam", 0, None_, None_, 0),
        (1, 0xE8) => grp(o, 5, "fld1", 0, None_, None_, 0),
        (1, 0xE9) => grp(o, 5, "fldl2t", 0, None_, None_, 0),
        (1, 0xEA) => grp(o, 5, "fldl2e", 0, None_, None_, 0),
        (1, 0xEB) => grp(o, 5, "fldpi", 0, None_, None_, 0),
        (1, 0xEC) => grp(o, 5, "fldlg2", 0, None_, None_, 0),
        (1, 0xED) => grp(o, 5, "fldln2", 0, None_, None_, 0),
        (1, 0xEE) => grp(o, 5, "fldz", 0, None_, None_, 0),
        (1, 0xF0) => grp(o, 6, "f2xm1", 0, None_, None_, 0),
        (1, 0xF1) => grp(o, 6, "fyl2x", 0, None_, None_, 0),
        (1, 0xF2) => grp(o, 6, "fptan", 0, None_, None_, 0),
        (1, 0xF3) => grp(o, 6, "fpatan", 0, None_, None_, 0),
        (1, 0xF4) => grp(o, 6, "fxtract", 0, None_, None_, 0),
        (1, 0xF5) => grp(o, 6, "fprem1", 0, None_, None_, 0),
        (1, 0xF6) => grp(o, 6, "fdecstp", 0, None_, None_, 0),
        (1, 0xF7) => grp(o, 6, "fincstp", 0, None_, None_, 0),
        (1, 0xF8) => grp(o, 7, "fprem", 0, None_, None_, 0),
        (1, 0xF9) => grp(o, 7, "fyl2xp1", 0, None_, None_, 0),
        (1, 0xFA) => grp(o, 7, "fsqrt", 0, None_, None_, 0),
        (1, 0xFB) => grp(o, 7, "fsincos", 0, None_, None_, 0),
        (1, 0xFC) => grp(o, 7, "frndint", 0, None_, None_, 0),
        (1, 0xFD) => grp(o, 7, "fscale", 0, None_, None_, 0),
        (1, 0xFE) => grp(o, 7, "fsin", 0, None_, None_, 0),
        (1, 0xFF) => grp(o, 7, "fcos", 0, None_, None_, 0),
        (2, 0xE9) => grp(o, 5, "fucompp", 0, None_, None_, 0),
        (3, 0xE2) => grp(o, 4, "fnclex", 0, None_, None_, 0),
        (3, 0xE3) => grp(o, 4, "fninit", 0, None_, None_, 0),
        (3, 0xE4) => grp(o, 4, "fsetpm", 0, None_, None_, 0),
        (4, 0xC0..=0xC7) => grp(o, 0, "fadd", 0, Stx, St, 0),
        (4, 0xC8..=0xCF) => grp(o, 1, "fmul", 0, Stx, St, 0),
        (4, 0xE0..=0xE7) => grp(o, 4, "fsubr", 0, Stx, St, 0),
        (4, 0xE8..=0xEF) => grp(o, 5, "fsub", 0, Stx, St, 0),
        (4, 0xF0..=0xF7) => grp(o, 6, "fdivr", 0, Stx, St, 0),
        (4, 0xF8..=0xFF) => grp(o, 7, "fdiv", 0, Stx, St, 0),
        (5, 0xC0..=0xC7) => grp(o, 0, "ffree", 0, Stx, None_, 0),
        (5, 0xD0..=0xD7) => grp(o, 2, "fst", 0, Stx, None_, 0),
        (5, 0xD8..=0xDF) => grp(o, 3, "fstp", 0, Stx, None_, 0),
        (5, 0xE0..=0xE7) => grp(o, 4, "fucom", 0, Stx, None_, 0),
        (5, 0xE8..=0xEF) => grp(o, 5, "fucomp", 0, Stx, None_, 0),
        (6, 0xC0..=0xC7) => grp(o, 0, "faddp", 0, Stx, St, 0),
        (6, 0xC8..=0xCF) => grp(o, 1, "fmulp", 0, Stx, St, 0),
        (6, 0xD9) => grp(o, 3, "fcompp", 0, None_, None_, 0),
        (6, 0xE0..=0xE7) => grp(o, 4, "fsubrp", 0, Stx, St, 0),
        (6, 0xE8..=0xEF) => grp(o, 5, "fsubp", 0, Stx, St, 0),
        (6, 0xF0..=0xF7) => grp(o, 6, "fdivrp", 0, Stx, St, 0),
        (6, 0xF8..=0xFF) => grp(o, 7, "fdivp", 0, Stx, St, 0),
        (7, 0xE0) => grp(o, 4, "fnstsw", 0, Ax, None_, 0),
        _ => return Option::None,
    };
    Some(entry)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alu_block_shape() {
        let add = lookup(0x00).unwrap();
        assert_eq!(add.name, "add");
        assert_eq!((add.arg0, add.arg1), (Rm, Reg));
        assert_eq!(add.size, 8);
        let cmp = lookup(0x3D).unwrap();
        assert_eq!(cmp.name, "cmp");
        assert_eq!((cmp.arg0, cmp.arg1), (Ax, Imm));
    }

    #[test]
    fn group_rows() {
        let shl = lookup_group(0xD1, 4).unwrap();
        assert_eq!(shl.name, "shl");
        assert_eq!(shl.arg1, One);
        let push = lookup_group(0xFF, 6).unwrap();
        assert_eq!(push.name, "push");
        assert!(push.flags & OP_STACK != 0);
        assert!(lookup_group(0xC6, 3).is_none());
        assert!(lookup_group(0xFF, 7).is_none());
    }

    #[test]
    fn extended_rows() {
        let movzx = lookup_0f(0xB6).unwrap();
        assert_eq!(movzx.opcode, 0x0FB6);
        assert_eq!((movzx.arg0, movzx.arg1), (Reg, Rm));
        let jz = lookup_0f(0x84).unwrap();
        assert_eq!(jz.name, "jz");
        assert_eq!(jz.arg0, Rel16);
        assert!(lookup_0f(0xFF).is_none());
    }

    #[test]
    fn fpu_rows() {
        let fadd = lookup_fpu_mem(0, 0).unwrap();
        assert_eq!(fadd.name, "fadd");
        assert_eq!(fadd.size, 32);
        let fild64 = lookup_fpu_mem(7, 5).unwrap();
        assert_eq!(fild64.name, "fild");
        assert!(fild64.flags & OP_LL != 0);
        let fld1 = lookup_fpu_reg(1, 0xE8).unwrap();
        assert_eq!(fld1.name, "fld1");
        let faddp = lookup_fpu_reg(6, 0xC1).unwrap();
        assert_eq!((faddp.arg0, faddp.arg1), (Stx, St));
        assert!(lookup_fpu_reg(2, 0xC0).is_none());
    }

    #[test]
    fn prefix_bytes() {
        assert!(matches!(PrefixByte::of(0x2E), Some(PrefixByte::Seg(_))));
        assert_eq!(PrefixByte::of(0x66), Some(PrefixByte::Op32));
        assert_eq!(PrefixByte::of(0x90), Option::None);
        assert_eq!(PrefixByte::of(0xF0).unwrap().pseudo_op(0xF0).name, "lock");
    }
}
