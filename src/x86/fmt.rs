//! Operand and mnemonic rendering under the three assembler syntaxes.
//!
//! GAS wants `%`-prefixed registers, AT&T operand order and size
//! suffixes on the mnemonic; NASM and MASM want Intel order with size
//! keywords on the memory operand. MASM additionally wraps the size in
//! `ptr` and keeps the segment override outside the brackets. Immediates
//! print as `$0x..` for GAS and as capital hex with a trailing `h`
//! otherwise (the capitals keep `0ah`-style values readable next to the
//! `h`).

use super::{Arg, Disp, Instr, OP_FAR, OP_STACK, RM_NO_REG};
use crate::warn::warn_at;

/// Operand syntax selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AsmSyntax {
    Gas,
    #[default]
    Nasm,
    Masm,
}

pub const SEG16: [&str; 6] = ["es", "cs", "ss", "ds", "fs", "gs"];

const REG8: [&str; 8] = ["al", "cl", "dl", "bl", "ah", "ch", "dh", "bh"];
const REG16: [&str; 8] = ["ax", "cx", "dx", "bx", "sp", "bp", "si", "di"];

const MODRM16_GAS: [&str; 8] = [
    "%bx,%si", "%bx,%di", "%bp,%si", "%bp,%di", "%si", "%di", "%bp", "%bx",
];
const MODRM16_INTEL: [&str; 8] = ["bx+si", "bx+di", "bp+si", "bp+di", "si", "di", "bp", "bx"];

fn push_reg8(out: &mut String, syntax: AsmSyntax, reg: u8) {
    if syntax == AsmSyntax::Gas {
        out.push('%');
    }
    out.push_str(REG8[(reg & 7) as usize]);
}

fn push_reg16(out: &mut String, syntax: AsmSyntax, reg: u8, is32: bool) {
    if reg > 7 {
        return;
    }
    if syntax == AsmSyntax::Gas {
        out.push('%');
    }
    if is32 {
        out.push('e');
    }
    out.push_str(REG16[reg as usize]);
}

fn push_seg(out: &mut String, syntax: AsmSyntax, seg: u8) {
    if syntax == AsmSyntax::Gas {
        out.push('%');
    }
    out.push_str(SEG16[(seg as usize) % SEG16.len()]);
}

fn push_seg_override(out: &mut String, instr: &Instr, syntax: AsmSyntax) {
    if let Some(seg) = instr.prefix.seg {
        push_seg(out, syntax, seg.index());
        out.push(':');
    }
}

/// ModR/M operand, register or memory form.
#[allow(clippy::too_many_arguments)]
fn format_modrm(
    out: &mut String,
    value: u32,
    role: Arg,
    instr: &Instr,
    syntax: AsmSyntax,
    usedmem: &mut bool,
    cs: u16,
    ip: u16,
) {
    let rm_size = instr.rm_size();

    if instr.modrm_disp == Disp::Reg {
        if role == Arg::Mem {
            warn_at!(
                cs,
                ip,
                "ModRM byte has mod 3, but opcode only allows accessing memory."
            );
        }
        if rm_size == 8 {
            push_reg8(out, syntax, instr.modrm_reg);
        } else {
            // a 16-bit register when the size is 0
            push_reg16(out, syntax, instr.modrm_reg, rm_size == 32);
        }
        return;
    }

    *usedmem = true;

    if syntax == AsmSyntax::Gas {
        // indirect near/far transfers take a `*`
        if instr.op.opcode == 0xFF && (2..=5).contains(&instr.op.subcode) {
            out.push('*');
        }
        push_seg_override(out, instr, syntax);

        match instr.modrm_disp {
            Disp::D8 => {
                let sv = value as u8 as i8;
                if sv < 0 {
                    out.push_str(&format!("-0x{:02x}", -(sv as i32)));
                } else {
                    out.push_str(&format!("0x{:02x}", sv));
                }
            }
            Disp::D16 if instr.addrsize == 16 => {
                if instr.modrm_reg == RM_NO_REG {
                    // absolute memory is unsigned
                    out.push_str(&format!("0x{:04x}", value));
                    return;
                }
                let sv = value as u16 as i16;
                if sv < 0 {
                    out.push_str(&format!("-0x{:04x}", -(sv as i32)));
                } else {
                    out.push_str(&format!("0x{:04x}", sv));
                }
            }
            Disp::D16 => {
                if instr.modrm_reg == RM_NO_REG {
                    out.push_str(&format!("0x{:08x}", value));
                    if instr.sib_scale == 0 {
                        return;
                    }
                } else {
                    let sv = value as i32;
                    if sv < 0 {
                        out.push_str(&format!("-0x{:08x}", -(sv as i64)));
                    } else {
                        out.push_str(&format!("0x{:08x}", sv));
                    }
                }
            }
            _ => {}
        }

        out.push('(');
        if instr.addrsize == 16 {
            out.push_str(MODRM16_GAS[(instr.modrm_reg & 7) as usize]);
        } else {
            push_reg16(out, syntax, instr.modrm_reg, true);
            if instr.sib_scale != 0 {
                out.push(',');
                push_reg16(out, syntax, instr.sib_index, true);
                out.push_str(&format!(",{}", instr.sib_scale));
            }
        }
        out.push(')');
        return;
    }

    // NASM/MASM
    let has_sib = instr.sib_scale != 0;

    if instr.op.flags & OP_FAR != 0 {
        out.push_str("far ");
    } else if (instr.op.arg0 != Arg::Reg && instr.op.arg1 != Arg::Reg)
        || instr.rm_fixed_size().is_some()
    {
        match rm_size {
            8 => out.push_str("byte "),
            16 => out.push_str("word "),
            32 => out.push_str("dword "),
            64 => out.push_str("qword "),
            80 => out.push_str("tword "),
            _ => {}
        }
        if syntax == AsmSyntax::Masm {
            out.push_str("ptr ");
        }
    }

    if syntax == AsmSyntax::Nasm {
        out.push('[');
    }
    push_seg_override(out, instr, syntax);
    if syntax == AsmSyntax::Masm {
        out.push('[');
    }

    if has_sib {
        push_reg16(out, syntax, instr.sib_index, true);
        out.push_str(&format!("*{}", instr.sib_scale));
    }

    if instr.modrm_reg < 8 {
        if has_sib {
            out.push('+');
        }
        if instr.addrsize == 16 {
            out.push_str(MODRM16_INTEL[instr.modrm_reg as usize]);
        } else {
            push_reg16(out, syntax, instr.modrm_reg, true);
        }
    }

    match instr.modrm_disp {
        Disp::D8 => {
            let sv = value as u8 as i8;
            if sv < 0 {
                out.push_str(&format!("-{:02X}h", -(sv as i32)));
            } else {
                out.push_str(&format!("+{:02X}h", sv));
            }
        }
        Disp::D16 if instr.addrsize == 16 => {
            let sv = value as u16 as i16;
            if instr.modrm_reg == RM_NO_REG && !has_sib {
                out.push_str(&format!("{:04X}h", value));
            } else if sv < 0 {
                out.push_str(&format!("-{:04X}h", -(sv as i32)));
            } else {
                out.push_str(&format!("+{:04X}h", sv));
            }
        }
        Disp::D16 => {
            let sv = value as i32;
            if instr.modrm_reg == RM_NO_REG && !has_sib {
                out.push_str(&format!("{:08X}h", value));
            } else if sv < 0 {
                out.push_str(&format!("-{:08X}h", -(sv as i64)));
            } else {
                out.push_str(&format!("+{:08X}h", sv));
            }
        }
        _ => {}
    }
    out.push(']');
}

/// Append the textual form of one operand.
///
/// `usedmem` records whether a memory operand was produced; the listing
/// needs that to tell a meaningful segment override from a stray one.
#[allow(clippy::too_many_arguments)]
pub fn format_arg(
    out: &mut String,
    value: u32,
    role: Arg,
    instr: &Instr,
    syntax: AsmSyntax,
    usedmem: &mut bool,
    cs: u16,
    ip: u16,
) {
    let gas = syntax == AsmSyntax::Gas;

    if let Some(r) = role.reg8() {
        push_reg8(out, syntax, r);
        return;
    }
    if let Some(r) = role.reg16() {
        push_reg16(out, syntax, r, instr.op.size == 32);
        return;
    }
    if let Some(s) = role.seg() {
        push_seg(out, syntax, s);
        return;
    }

    match role {
        Arg::One => out.push_str(if gas { "$0x1" } else { "1" }),
        Arg::Imm8 => {
            if instr.op.flags & OP_STACK != 0 {
                // push imm8 displays sign-extended to the operand size
                let sv = value as u8 as i8;
                if instr.op.size == 32 {
                    if gas {
                        out.push_str(&format!("$0x{:08x}", sv as i32 as u32));
                    } else {
                        out.push_str(&format!("dword {:08X}h", sv as i32 as u32));
                    }
                } else if gas {
                    out.push_str(&format!("$0x{:04x}", sv as i16 as u16));
                } else {
                    out.push_str(&format!("word {:04X}h", sv as i16 as u16));
                }
            } else if gas {
                out.push_str(&format!("$0x{:02x}", value));
            } else {
                out.push_str(&format!("{:02X}h", value));
            }
        }
        Arg::Imm16 => {
            if gas {
                out.push_str(&format!("$0x{:04x}", value));
            } else {
                out.push_str(&format!("{:04X}h", value));
            }
        }
        Arg::Imm => {
            if instr.op.flags & OP_STACK != 0 {
                if instr.op.size == 32 {
                    if gas {
                        out.push_str(&format!("$0x{:08x}", value));
                    } else {
                        out.push_str(&format!("dword {:08X}h", value));
                    }
                } else if gas {
                    out.push_str(&format!("$0x{:04x}", value));
                } else {
                    out.push_str(&format!("word {:04X}h", value));
                }
            } else {
                match instr.op.size {
                    8 => {
                        if gas {
                            out.push_str(&format!("$0x{:02x}", value));
                        } else {
                            out.push_str(&format!("{:02X}h", value));
                        }
                    }
                    32 => {
                        if gas {
                            out.push_str(&format!("$0x{:08x}", value));
                        } else {
                            out.push_str(&format!("{:08X}h", value));
                        }
                    }
                    _ => {
                        if gas {
                            out.push_str(&format!("$0x{:04x}", value));
                        } else {
                            out.push_str(&format!("{:04X}h", value));
                        }
                    }
                }
            }
        }
        Arg::Rel8 | Arg::Rel16 => out.push_str(&format!("{:04x}", value)),
        Arg::Ptr32 => {
            // carries no printable value of its own; a relocation
            // supplies the symbolic form
        }
        Arg::Moffs16 => {
            if gas {
                out.push_str(&format!("0x{:04x}", value));
            } else {
                out.push_str(&format!("[{:04X}h]", value));
            }
            *usedmem = true;
        }
        Arg::DsBx | Arg::DsSi => {
            if syntax != AsmSyntax::Nasm {
                push_seg_override(out, instr, syntax);
                out.push_str(if gas { "(%" } else { "[" });
                if instr.prefix.addr32 {
                    out.push('e');
                }
                out.push_str(if role == Arg::DsBx { "bx" } else { "si" });
                out.push_str(if gas { ")" } else { "]" });
            }
            *usedmem = true;
        }
        Arg::EsDi => {
            if syntax != AsmSyntax::Nasm {
                out.push_str(if gas { "%es:(%" } else { "es:[" });
                if instr.prefix.addr32 {
                    out.push('e');
                }
                out.push_str("di");
                out.push_str(if gas { ")" } else { "]" });
            }
            *usedmem = true;
        }
        Arg::AlImp => {
            if gas {
                out.push_str("%al");
            }
        }
        Arg::AxImp => {
            if gas {
                out.push_str("%ax");
            }
        }
        Arg::DxImp => {
            if gas {
                out.push_str("(%dx)");
            } else if syntax == AsmSyntax::Masm {
                out.push_str("dx");
            }
        }
        Arg::Rm | Arg::Mem => {
            format_modrm(out, value, role, instr, syntax, usedmem, cs, ip);
        }
        Arg::Reg => {
            if instr.op.size == 8 {
                push_reg8(out, syntax, value as u8);
            } else {
                push_reg16(out, syntax, value as u8, instr.op.size == 32);
            }
        }
        Arg::Reg32 => push_reg16(out, syntax, value as u8, true),
        Arg::Seg16 => {
            if value > 5 {
                warn_at!(cs, ip, "Invalid segment register {}", value);
            }
            push_seg(out, syntax, value as u8);
        }
        Arg::Cr32 => {
            if value == 1 || value > 4 {
                warn_at!(cs, ip, "Invalid control register {}", value);
            }
            if gas {
                out.push('%');
            }
            out.push_str(&format!("cr{}", value & 7));
        }
        Arg::Dr32 => {
            if gas {
                out.push('%');
            }
            out.push_str(&format!("dr{}", value & 7));
        }
        Arg::Tr32 => {
            if value < 3 {
                warn_at!(cs, ip, "Invalid test register {}", value);
            }
            if gas {
                out.push('%');
            }
            out.push_str(&format!("tr{}", value & 7));
        }
        Arg::St => match syntax {
            AsmSyntax::Gas => out.push_str("%st"),
            AsmSyntax::Nasm => out.push_str("st0"),
            AsmSyntax::Masm => out.push_str("st"),
        },
        Arg::Stx => match syntax {
            AsmSyntax::Gas => out.push_str(&format!("%st({})", value & 7)),
            AsmSyntax::Nasm => out.push_str(&format!("st{}", value & 7)),
            AsmSyntax::Masm => out.push_str(&format!("st({})", value & 7)),
        },
        _ => {}
    }
}

/// Build the printable mnemonic from a decoded record, applying every
/// syntax-dependent rename and suffix. Returns the mnemonic plus a flag
/// asking the caller to drop the first operand (`aam`/`aad` with their
/// canonical base-ten immediate).
pub fn mnemonic(instr: &Instr, syntax: AsmSyntax) -> (String, bool) {
    use super::{OP_L, OP_LL, OP_S, OP_STRING};

    let op = &instr.op;
    let base = if op.name.is_empty() { "?" } else { op.name };
    let mut name = String::from(base);
    let mut suppress_arg0 = false;

    if op.flags & OP_STACK != 0 && instr.prefix.op32 {
        if op.size == 16 {
            name.push('w');
        } else if syntax == AsmSyntax::Gas {
            name.push('l');
        } else {
            name.push('d');
        }
    } else if op.flags & OP_STRING != 0 && syntax != AsmSyntax::Gas {
        match op.size {
            8 => name.push('b'),
            16 => name.push('w'),
            32 => name.push('d'),
            _ => {}
        }
    } else if op.opcode == 0x98 && instr.prefix.op32 {
        name = "cwde".into();
    } else if op.opcode == 0x99 && instr.prefix.op32 {
        name = "cdq".into();
    } else if op.opcode == 0xE3 && instr.prefix.addr32 {
        name = "jecxz".into();
    } else if op.opcode == 0xD4 && instr.arg0 == 10 {
        name = "aam".into();
        suppress_arg0 = true;
    } else if op.opcode == 0xD5 && instr.arg0 == 10 {
        name = "aad".into();
        suppress_arg0 = true;
    } else if syntax == AsmSyntax::Gas {
        if op.flags & OP_FAR != 0 {
            name.insert(0, 'l');
        } else if op.opcode == 0x0FB6 {
            name = if op.size == 32 { "movzbl" } else { "movzbw" }.into();
        } else if op.opcode == 0x0FB7 {
            name = if op.size == 32 { "movzwl" } else { "movzww" }.into();
        } else if op.opcode == 0x0FBE {
            name = if op.size == 32 { "movsbl" } else { "movsbw" }.into();
        } else if op.opcode == 0x0FBF {
            name = if op.size == 32 { "movswl" } else { "movsww" }.into();
        } else if op.arg0 != Arg::Reg && op.arg1 != Arg::Reg && instr.modrm_disp != Disp::Reg {
            if op.flags & OP_LL != 0 {
                name.push_str("ll");
            } else if op.flags & OP_S != 0 {
                name.push('s');
            } else if op.flags & OP_L != 0 {
                name.push('l');
            } else {
                match op.size {
                    80 => name.push('t'),
                    8 => name.push('b'),
                    16 => name.push('w'),
                    32 => name.push('l'),
                    _ => {}
                }
            }
        }
    }

    (name, suppress_arg0)
}

#[cfg(test)]
mod tests {
    use super::super::decode::decode;
    use super::super::MAX_INSTR;
    use super::*;

    fn win(bytes: &[u8]) -> [u8; MAX_INSTR] {
        let mut w = [0u8; MAX_INSTR];
        w[..bytes.len()].copy_from_slice(bytes);
        w
    }

    fn arg(bytes: &[u8], pick: u8, syntax: AsmSyntax) -> String {
        let (instr, _) = decode(0, &win(bytes), false);
        let mut out = String::new();
        let mut usedmem = false;
        let (role, value) = if pick == 0 {
            (instr.op.arg0, instr.arg0)
        } else {
            (instr.op.arg1, instr.arg1)
        };
        format_arg(&mut out, value, role, &instr, syntax, &mut usedmem, 1, 0);
        out
    }

    #[test]
    fn immediates_per_syntax() {
        assert_eq!(arg(&[0xB8, 0x34, 0x12], 1, AsmSyntax::Nasm), "1234h");
        assert_eq!(arg(&[0xB8, 0x34, 0x12], 1, AsmSyntax::Masm), "1234h");
        assert_eq!(arg(&[0xB8, 0x34, 0x12], 1, AsmSyntax::Gas), "$0x1234");
        assert_eq!(arg(&[0xB8, 0x34, 0x12], 0, AsmSyntax::Gas), "%ax");
    }

    #[test]
    fn direct_memory_stays_unsigned() {
        assert_eq!(
            arg(&[0xFF, 0x36, 0x04, 0x00], 0, AsmSyntax::Nasm),
            "word [0004h]"
        );
        assert_eq!(
            arg(&[0xFF, 0x36, 0xFE, 0xFF], 0, AsmSyntax::Nasm),
            "word [FFFEh]"
        );
        assert_eq!(arg(&[0xFF, 0x36, 0x04, 0x00], 0, AsmSyntax::Gas), "0x0004");
        // indirect jumps take the GAS `*`
        assert_eq!(arg(&[0xFF, 0x27], 0, AsmSyntax::Gas), "*(%bx)");
    }

    #[test]
    fn signed_displacements() {
        // mov ax, [bx-2]
        assert_eq!(arg(&[0x8B, 0x47, 0xFE], 1, AsmSyntax::Nasm), "[bx-02h]");
        assert_eq!(arg(&[0x8B, 0x47, 0x02], 1, AsmSyntax::Nasm), "[bx+02h]");
        assert_eq!(arg(&[0x8B, 0x47, 0xFE], 1, AsmSyntax::Gas), "-0x02(%bx)");
    }

    #[test]
    fn masm_wraps_size_in_ptr() {
        assert_eq!(
            arg(&[0xFF, 0x36, 0x04, 0x00], 0, AsmSyntax::Masm),
            "word ptr [0004h]"
        );
    }

    #[test]
    fn segment_override_placement() {
        // mov ax, [es:bx]
        assert_eq!(arg(&[0x26, 0x8B, 0x07], 1, AsmSyntax::Nasm), "[es:bx]");
        assert_eq!(arg(&[0x26, 0x8B, 0x07], 1, AsmSyntax::Masm), "es:[bx]");
        assert_eq!(arg(&[0x26, 0x8B, 0x07], 1, AsmSyntax::Gas), "%es:(%bx)");
    }

    #[test]
    fn sib_memory_operand() {
        // mov ax, [eax+ecx*4]
        assert_eq!(
            arg(&[0x67, 0x8B, 0x04, 0x88], 1, AsmSyntax::Nasm),
            "[ecx*4+eax]"
        );
        assert_eq!(
            arg(&[0x67, 0x8B, 0x04, 0x88], 1, AsmSyntax::Gas),
            "(%eax,%ecx,4)"
        );
    }

    #[test]
    fn shift_one_operand() {
        assert_eq!(arg(&[0xD1, 0xE0], 1, AsmSyntax::Nasm), "1");
        assert_eq!(arg(&[0xD1, 0xE0], 1, AsmSyntax::Gas), "$0x1");
        assert_eq!(arg(&[0xD1, 0xE0], 0, AsmSyntax::Nasm), "ax");
    }

    #[test]
    fn movzx_source_keeps_byte_width() {
        // movzx ax, bl
        assert_eq!(arg(&[0x0F, 0xB6, 0xC3], 1, AsmSyntax::Nasm), "bl");
        assert_eq!(arg(&[0x0F, 0xB6, 0xC3], 0, AsmSyntax::Nasm), "ax");
        // movzx ax, byte [bx]
        assert_eq!(arg(&[0x0F, 0xB6, 0x07], 1, AsmSyntax::Nasm), "byte [bx]");
    }

    #[test]
    fn gas_mnemonic_suffixes() {
        let (i, _) = decode(0, &win(&[0xB8, 0x34, 0x12]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Gas).0, "movw");
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "mov");

        let (i, _) = decode(0, &win(&[0x66, 0xB8, 0x78, 0x56, 0x34, 0x12]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Gas).0, "movl");

        // fild qword [bx]
        let (i, _) = decode(0, &win(&[0xDF, 0x2F]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Gas).0, "fildll");
    }

    #[test]
    fn stack_and_string_mnemonics() {
        let (i, _) = decode(0, &win(&[0x66, 0x50]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "pushd");
        assert_eq!(mnemonic(&i, AsmSyntax::Gas).0, "pushl");

        let (i, _) = decode(0, &win(&[0xA5]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "movsw");
        assert_eq!(mnemonic(&i, AsmSyntax::Gas).0, "movsw");

        let (i, _) = decode(0, &win(&[0x66, 0xA5]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "movsd");
    }

    #[test]
    fn conversion_renames_under_op32() {
        let (i, _) = decode(0, &win(&[0x98]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "cbw");
        let (i, _) = decode(0, &win(&[0x66, 0x98]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "cwde");
        let (i, _) = decode(0, &win(&[0x66, 0x99]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "cdq");
        let (i, _) = decode(0, &win(&[0x67, 0xE3, 0x00]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "jecxz");
    }

    #[test]
    fn aam_aad_suppress_canonical_immediate() {
        let (i, _) = decode(0, &win(&[0xD4, 0x0A]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm), ("aam".into(), true));
        let (i, _) = decode(0, &win(&[0xD5, 0x0A]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm), ("aad".into(), true));
        // unusual base stays visible
        let (i, _) = decode(0, &win(&[0xD4, 0x08]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm), ("aam".into(), false));
    }

    #[test]
    fn far_call_gets_l_prefix_in_gas() {
        let (i, _) = decode(0, &win(&[0x9A, 0x34, 0x12, 0x02, 0x00]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Gas).0, "lcall");
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "call");
    }

    #[test]
    fn unknown_renders_question_mark() {
        let (i, _) = decode(0, &win(&[0xF1]), false);
        assert_eq!(mnemonic(&i, AsmSyntax::Nasm).0, "?");
    }
}
