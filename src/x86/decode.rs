//! Byte stream to [`Instr`] record.
//!
//! The decoder never fails. Whatever the sixteen-byte window holds, it
//! produces a record and a consumed length between 1 and [`MAX_INSTR`];
//! encodings the tables do not know come back with an empty mnemonic.
//! Callers are expected to zero-pad the window when a segment ends
//! early, so reads past the supplied bytes see zeros, exactly like an
//! instruction hanging over the end of its segment.

use super::table::{self, PrefixByte};
use super::{Arg, Disp, Instr, Op, PrefixError, MAX_INSTR, NO_SUBCODE, RM_NO_REG, UNKNOWN_OP};

fn byte_at(bytes: &[u8; MAX_INSTR], pos: usize) -> u8 {
    if pos < MAX_INSTR {
        bytes[pos]
    } else {
        0
    }
}

fn read_u8(bytes: &[u8; MAX_INSTR], pos: &mut usize) -> u32 {
    let v = byte_at(bytes, *pos);
    *pos += 1;
    v as u32
}

fn read_u16(bytes: &[u8; MAX_INSTR], pos: &mut usize) -> u32 {
    let lo = read_u8(bytes, pos);
    let hi = read_u8(bytes, pos);
    hi << 8 | lo
}

fn read_u32(bytes: &[u8; MAX_INSTR], pos: &mut usize) -> u32 {
    let lo = read_u16(bytes, pos);
    let hi = read_u16(bytes, pos);
    hi << 16 | lo
}

/// Collect prefix bytes. On a doubled prefix the offending byte is
/// reported as the whole instruction, mirroring how the listing then
/// skips to the next byte.
fn read_prefixes(instr: &mut Instr, bytes: &[u8; MAX_INSTR], pos: &mut usize) -> bool {
    loop {
        let b = byte_at(bytes, *pos);
        let Some(p) = PrefixByte::of(b) else {
            return true;
        };
        let doubled = match p {
            PrefixByte::Seg(s) => {
                if instr.prefix.seg.is_some() {
                    Some(PrefixError::MultipleSegment)
                } else {
                    instr.prefix.seg = Some(s);
                    None
                }
            }
            PrefixByte::Op32 => {
                if instr.prefix.op32 {
                    Some(PrefixError::Doubled)
                } else {
                    instr.prefix.op32 = true;
                    None
                }
            }
            PrefixByte::Addr32 => {
                if instr.prefix.addr32 {
                    Some(PrefixError::Doubled)
                } else {
                    instr.prefix.addr32 = true;
                    None
                }
            }
            PrefixByte::Lock => {
                if instr.prefix.lock {
                    Some(PrefixError::Doubled)
                } else {
                    instr.prefix.lock = true;
                    None
                }
            }
            PrefixByte::Repne => {
                if instr.prefix.repne {
                    Some(PrefixError::Doubled)
                } else {
                    instr.prefix.repne = true;
                    None
                }
            }
            PrefixByte::Repe => {
                if instr.prefix.repe {
                    Some(PrefixError::Doubled)
                } else {
                    instr.prefix.repe = true;
                    None
                }
            }
        };
        *pos += 1;
        if let Some(err) = doubled {
            instr.prefix_err = Some(err);
            instr.op = p.pseudo_op(b);
            return false;
        }
    }
}

/// Parse ModR/M (and SIB) and fill the addressing fields of `instr`.
/// Returns `(reg_field, rm_field, displacement)`.
fn read_modrm(instr: &mut Instr, bytes: &[u8; MAX_INSTR], pos: &mut usize) -> (u8, u8, u32) {
    let modrm = byte_at(bytes, *pos);
    *pos += 1;
    let m = modrm >> 6;
    let reg = (modrm >> 3) & 7;
    let rm = modrm & 7;

    if m == 3 {
        instr.modrm_disp = Disp::Reg;
        instr.modrm_reg = rm;
        return (reg, rm, 0);
    }

    let mut disp = 0;
    if instr.addrsize == 16 {
        match m {
            0 if rm == 6 => {
                instr.modrm_reg = RM_NO_REG;
                instr.modrm_disp = Disp::D16;
                disp = read_u16(bytes, pos);
            }
            0 => {
                instr.modrm_reg = rm;
                instr.modrm_disp = Disp::None;
            }
            1 => {
                instr.modrm_reg = rm;
                instr.modrm_disp = Disp::D8;
                disp = read_u8(bytes, pos);
            }
            _ => {
                instr.modrm_reg = rm;
                instr.modrm_disp = Disp::D16;
                disp = read_u16(bytes, pos);
            }
        }
        return (reg, rm, disp);
    }

    // 32-bit addressing
    let mut base = rm;
    let mut forced_direct = false;
    if rm == 4 {
        let sib = byte_at(bytes, *pos);
        *pos += 1;
        let index = (sib >> 3) & 7;
        if index != 4 {
            instr.sib_scale = 1 << (sib >> 6);
            instr.sib_index = index;
        }
        base = sib & 7;
        if base == 5 && m == 0 {
            // no base register, 32-bit displacement follows
            forced_direct = true;
        }
    }
    if forced_direct || (m == 0 && rm == 5) {
        instr.modrm_reg = RM_NO_REG;
        instr.modrm_disp = Disp::D16;
        disp = read_u32(bytes, pos);
        return (reg, rm, disp);
    }
    instr.modrm_reg = base;
    match m {
        0 => instr.modrm_disp = Disp::None,
        1 => {
            instr.modrm_disp = Disp::D8;
            disp = read_u8(bytes, pos);
        }
        _ => {
            instr.modrm_disp = Disp::D16;
            disp = read_u32(bytes, pos);
        }
    }
    (reg, rm, disp)
}

/// Immediate width in bytes for a full-size immediate at `size`.
fn imm_width(size: u8) -> u8 {
    match size {
        8 => 1,
        32 => 4,
        _ => 2,
    }
}

struct ModrmValues {
    reg: u8,
    rm: u8,
    disp: u32,
}

/// Value for one operand slot. ModR/M-derived roles read nothing here;
/// immediates and relative targets consume bytes in encoding order.
fn arg_value(
    role: Arg,
    instr: &Instr,
    mv: &ModrmValues,
    bytes: &[u8; MAX_INSTR],
    pos: &mut usize,
    ip: u16,
    osize: u8,
) -> u32 {
    match role {
        Arg::Rm | Arg::Mem => mv.disp,
        Arg::Reg | Arg::Reg32 | Arg::Seg16 | Arg::Cr32 | Arg::Dr32 | Arg::Tr32 => mv.reg as u32,
        Arg::Stx => mv.rm as u32,
        Arg::One => 1,
        Arg::Imm => {
            match imm_width(instr.op.size) {
                1 => read_u8(bytes, pos),
                4 => read_u32(bytes, pos),
                _ => read_u16(bytes, pos),
            }
        }
        Arg::Imm8 => read_u8(bytes, pos),
        Arg::Imm16 => read_u16(bytes, pos),
        Arg::Rel8 => {
            let delta = read_u8(bytes, pos) as u8 as i8 as i32;
            (ip as i32 + *pos as i32 + delta) as u32 & 0xFFFF
        }
        Arg::Rel16 => {
            let delta = if osize == 32 {
                read_u32(bytes, pos) as i32
            } else {
                read_u16(bytes, pos) as u16 as i16 as i32
            };
            (ip as i32 + *pos as i32 + delta) as u32 & 0xFFFF
        }
        Arg::Moffs16 => {
            if instr.addrsize == 32 {
                read_u32(bytes, pos)
            } else {
                read_u16(bytes, pos)
            }
        }
        _ => 0,
    }
}

fn unknown(opcode: u16, subcode: u8) -> Op {
    Op {
        opcode,
        subcode,
        ..UNKNOWN_OP
    }
}

/// Decode one instruction at `ip`. `default32` selects the segment's
/// default operand/address size. Returns the record and the number of
/// bytes consumed (always within `1..=MAX_INSTR`).
pub fn decode(ip: u16, bytes: &[u8; MAX_INSTR], default32: bool) -> (Instr, usize) {
    let mut instr = Instr::default();
    let mut pos = 0usize;

    if !read_prefixes(&mut instr, bytes, &mut pos) {
        return (instr, pos.min(MAX_INSTR).max(1));
    }

    let osize: u8 = if default32 != instr.prefix.op32 { 32 } else { 16 };
    instr.addrsize = if default32 != instr.prefix.addr32 { 32 } else { 16 };

    let first = byte_at(bytes, pos);
    pos += 1;

    // opcode lookup across the four table domains
    let looked_up: Option<Op>;
    if first == 0x0F {
        let second = byte_at(bytes, pos);
        pos += 1;
        if table::is_group_0f(second) {
            let reg = (byte_at(bytes, pos) >> 3) & 7;
            looked_up = table::lookup_group_0f(second, reg);
            if looked_up.is_none() {
                pos += 1;
                instr.op = unknown(0x0F00 | second as u16, reg);
                return (instr, pos.min(MAX_INSTR));
            }
        } else {
            looked_up = table::lookup_0f(second);
            if looked_up.is_none() {
                instr.op = unknown(0x0F00 | second as u16, NO_SUBCODE);
                return (instr, pos.min(MAX_INSTR));
            }
        }
    } else if (0xD8..=0xDF).contains(&first) {
        let modrm = byte_at(bytes, pos);
        let esc = first & 7;
        if modrm < 0xC0 {
            looked_up = table::lookup_fpu_mem(esc, (modrm >> 3) & 7);
        } else {
            // register form: the second byte is consumed as a whole
            let entry = table::lookup_fpu_reg(esc, modrm);
            pos += 1;
            instr.modrm_disp = Disp::Reg;
            instr.modrm_reg = modrm & 7;
            let Some(op) = entry else {
                instr.op = unknown(first as u16, (modrm >> 3) & 7);
                return (instr, pos.min(MAX_INSTR));
            };
            instr.op = op;
            if instr.op.arg0 == Arg::Stx {
                instr.arg0 = (modrm & 7) as u32;
            }
            if instr.op.arg1 == Arg::Stx {
                instr.arg1 = (modrm & 7) as u32;
            }
            return (instr, pos.min(MAX_INSTR));
        }
        if looked_up.is_none() {
            pos += 1;
            instr.op = unknown(first as u16, (modrm >> 3) & 7);
            return (instr, pos.min(MAX_INSTR));
        }
    } else if table::is_group(first) {
        let reg = (byte_at(bytes, pos) >> 3) & 7;
        looked_up = table::lookup_group(first, reg);
        if looked_up.is_none() {
            pos += 1;
            instr.op = unknown(first as u16, reg);
            return (instr, pos.min(MAX_INSTR));
        }
    } else {
        looked_up = table::lookup(first);
        if looked_up.is_none() {
            instr.op = unknown(first as u16, NO_SUBCODE);
            return (instr, pos.min(MAX_INSTR));
        }
    }

    // the early returns above guarantee a row here
    let Some(mut op) = looked_up else {
        return (instr, pos.min(MAX_INSTR).max(1));
    };

    // word-sized rows adopt the effective operand size
    if op.size == 16 {
        op.size = osize;
    }
    instr.op = op;

    let mv = if op.arg0.uses_modrm() || op.arg1.uses_modrm() {
        let (reg, rm, disp) = read_modrm(&mut instr, bytes, &mut pos);
        ModrmValues { reg, rm, disp }
    } else {
        ModrmValues {
            reg: 0,
            rm: 0,
            disp: 0,
        }
    };

    if op.arg0 == Arg::Ptr32 {
        // segment:offset pair; the offset width follows the operand size
        instr.arg0 = if osize == 32 {
            read_u32(bytes, &mut pos)
        } else {
            read_u16(bytes, &mut pos)
        };
        instr.arg1 = read_u16(bytes, &mut pos);
    } else {
        instr.arg0 = arg_value(op.arg0, &instr, &mv, bytes, &mut pos, ip, osize);
        instr.arg1 = arg_value(op.arg1, &instr, &mv, bytes, &mut pos, ip, osize);
    }

    if op.flags & super::OP_ARG2_IMM != 0 {
        instr.arg2 = match imm_width(instr.op.size) {
            1 => read_u8(bytes, &mut pos),
            4 => read_u32(bytes, &mut pos),
            _ => read_u16(bytes, &mut pos),
        };
    } else if op.flags & super::OP_ARG2_IMM8 != 0 {
        instr.arg2 = read_u8(bytes, &mut pos);
    }

    (instr, pos.min(MAX_INSTR).max(1))
}

#[cfg(test)]
mod tests {
    use super::super::{Arg, Disp, PrefixError, MAX_INSTR, RM_NO_REG};
    use super::decode;

    fn win(bytes: &[u8]) -> [u8; MAX_INSTR] {
        let mut w = [0u8; MAX_INSTR];
        w[..bytes.len()].copy_from_slice(bytes);
        w
    }

    #[test]
    fn mov_ax_imm16() {
        let (i, len) = decode(0, &win(&[0xB8, 0x34, 0x12]), false);
        assert_eq!(i.op.name, "mov");
        assert_eq!(i.op.size, 16);
        assert_eq!(i.arg1, 0x1234);
        assert_eq!(len, 3);
    }

    #[test]
    fn operand_size_prefix_widens() {
        let (i, len) = decode(0, &win(&[0x66, 0xB8, 0x78, 0x56, 0x34, 0x12]), false);
        assert_eq!(i.op.size, 32);
        assert!(i.prefix.op32);
        assert_eq!(i.arg1, 0x1234_5678);
        assert_eq!(len, 6);
    }

    #[test]
    fn operand_size_prefix_narrows_in_32bit_segment() {
        let (i, len) = decode(0, &win(&[0x66, 0xB8, 0x34, 0x12]), true);
        assert_eq!(i.op.size, 16);
        assert_eq!(len, 4);
    }

    #[test]
    fn group_push_direct_memory() {
        let (i, len) = decode(0, &win(&[0xFF, 0x36, 0x04, 0x00]), false);
        assert_eq!(i.op.name, "push");
        assert_eq!(i.op.subcode, 6);
        assert_eq!(i.modrm_reg, RM_NO_REG);
        assert_eq!(i.modrm_disp, Disp::D16);
        assert_eq!(i.arg0, 4);
        assert_eq!(len, 4);
    }

    #[test]
    fn shift_by_one_register_form() {
        let (i, len) = decode(0, &win(&[0xD1, 0xE0]), false);
        assert_eq!(i.op.name, "shl");
        assert_eq!(i.modrm_disp, Disp::Reg);
        assert_eq!(i.modrm_reg, 0);
        assert_eq!(i.op.arg1, Arg::One);
        assert_eq!(len, 2);
    }

    #[test]
    fn relative_targets_are_absolute() {
        let (i, len) = decode(0, &win(&[0xE8, 0x00, 0x00]), false);
        assert_eq!(i.op.name, "call");
        assert_eq!(i.arg0, 3);
        assert_eq!(len, 3);

        let (i, len) = decode(0, &win(&[0xEB, 0xFE]), false);
        assert_eq!(i.op.name, "jmp");
        assert_eq!(i.arg0, 0);
        assert_eq!(len, 2);

        let (i, _) = decode(0x0100, &win(&[0x74, 0x10]), false);
        assert_eq!(i.arg0, 0x0112);
    }

    #[test]
    fn far_pointer_reads_offset_then_segment() {
        let (i, len) = decode(0, &win(&[0x9A, 0x34, 0x12, 0x02, 0x00]), false);
        assert_eq!(i.op.name, "call");
        assert_eq!(i.arg0, 0x1234);
        assert_eq!(i.arg1, 0x0002);
        assert_eq!(len, 5);
    }

    #[test]
    fn doubled_prefix_stops_decoding() {
        let (i, len) = decode(0, &win(&[0xF3, 0xF3, 0x90]), false);
        assert_eq!(i.prefix_err, Some(PrefixError::Doubled));
        assert_eq!(i.op.name, "repe");
        assert_eq!(len, 2);
    }

    #[test]
    fn second_segment_prefix_stops_decoding() {
        let (i, len) = decode(0, &win(&[0x26, 0x2E, 0x90]), false);
        assert_eq!(i.prefix_err, Some(PrefixError::MultipleSegment));
        assert_eq!(i.op.name, "cs");
        assert_eq!(len, 2);
    }

    #[test]
    fn sib_decoding_under_address_size_prefix() {
        // mov ax, [eax+ecx*4]
        let (i, len) = decode(0, &win(&[0x67, 0x8B, 0x04, 0x88]), false);
        assert_eq!(i.op.name, "mov");
        assert_eq!(i.addrsize, 32);
        assert_eq!(i.modrm_reg, 0);
        assert_eq!(i.sib_index, 1);
        assert_eq!(i.sib_scale, 4);
        assert_eq!(len, 4);
    }

    #[test]
    fn sib_index_esp_means_no_index() {
        // mov ax, [esp+8]
        let (i, _) = decode(0, &win(&[0x67, 0x8B, 0x44, 0x24, 0x08]), false);
        assert_eq!(i.sib_scale, 0);
        assert_eq!(i.modrm_reg, 4);
        assert_eq!(i.modrm_disp, Disp::D8);
    }

    #[test]
    fn unknown_opcode_has_empty_name() {
        let (i, len) = decode(0, &win(&[0xF1]), false);
        assert_eq!(i.op.name, "");
        assert_eq!(len, 1);
        // unknown group member consumes its modrm
        let (i, len) = decode(0, &win(&[0xC6, 0x08, 0x00]), false);
        assert_eq!(i.op.name, "");
        assert_eq!(i.op.subcode, 1);
        assert_eq!(len, 2);
    }

    #[test]
    fn fpu_memory_and_register_forms() {
        // fadd dword [bx+si]
        let (i, len) = decode(0, &win(&[0xD8, 0x00]), false);
        assert_eq!(i.op.name, "fadd");
        assert_eq!(i.op.size, 32);
        assert_eq!(len, 2);
        // faddp st(1), st
        let (i, len) = decode(0, &win(&[0xDE, 0xC1]), false);
        assert_eq!(i.op.name, "faddp");
        assert_eq!(i.arg0, 1);
        assert_eq!(len, 2);
        // fld1
        let (i, _) = decode(0, &win(&[0xD9, 0xE8]), false);
        assert_eq!(i.op.name, "fld1");
    }

    #[test]
    fn aam_keeps_base_ten_immediate() {
        let (i, len) = decode(0, &win(&[0xD4, 0x0A]), false);
        assert_eq!(i.op.name, "aam");
        assert_eq!(i.arg0, 10);
        assert_eq!(len, 2);
    }

    #[test]
    fn consumed_is_bounded() {
        for b in 0u8..=255 {
            let (_, len) = decode(0, &win(&[b, 0, 0, 0, 0, 0, 0, 0]), false);
            assert!(len >= 1 && len <= MAX_INSTR, "opcode {b:02x} len {len}");
        }
    }
}
