//! Formatted listing of a scanned code segment.
//!
//! One line per instruction: position gutter, up to seven raw bytes
//! (a `>` over the pad column flags a jump target, `>>` a far one),
//! prefix keywords, the mnemonic and its operands, and an optional
//! `<name>` comment. Operands covered by a relocation are rewritten to
//! their symbolic form before the line is assembled; the numeric value
//! in the code bytes is whatever the linker left there and means
//! nothing on its own.

use std::io::{self, Write};

use super::reloc::RelocTarget;
use super::{
    CodeSegment, DisassemblyContext, INSTR_FAR, INSTR_FUNC, INSTR_JUMP, INSTR_RELOC, INSTR_VALID,
};
use crate::warn::warn_at;
use crate::x86::decode::decode;
use crate::x86::fmt::{self, AsmSyntax};
use crate::x86::{
    Arg, Instr, PrefixError, OP_ARG2_CL, OP_ARG2_IMM, OP_ARG2_IMM8, OP_LOCK, OP_REPE, OP_REPNE,
    OP_STACK, OP_STRING,
};

/// Print the listing of one code segment.
pub fn print_segment<W: Write>(
    w: &mut W,
    seg: &CodeSegment,
    ctx: &DisassemblyContext,
) -> io::Result<()> {
    let length = seg.length as usize;
    let mut ip = 0usize;

    while ip < length {
        if seg.instr_flags[ip] & INSTR_VALID == 0 {
            if ctx.disassemble_all {
                // even here, runs of zero bytes stay collapsed
                if seg.code[ip] == 0 {
                    writeln!(w, "     ...")?;
                    ip += 1;
                    while ip < length && seg.code[ip] == 0 {
                        ip += 1;
                    }
                }
            } else {
                writeln!(w, "     ...")?;
                while ip < length && seg.instr_flags[ip] & INSTR_VALID == 0 {
                    ip += 1;
                }
            }
            if ip >= length {
                break;
            }
        }

        if seg.instr_flags[ip] & INSTR_FUNC != 0 {
            let name = ctx.entry_name(seg.cs, ip as u16).unwrap_or("no name");
            writeln!(w)?;
            writeln!(w, "{}:{:04x} <{}>:", seg.cs, ip, name)?;
        }

        let mut line = String::new();
        let len = print_instr(&mut line, seg, ip as u16, ctx);
        writeln!(w, "{}", line)?;
        ip += len;
    }
    Ok(())
}

/// Rewrite relocated operands to their symbolic form. Returns the
/// comment the rewrite produced, if any.
fn apply_relocations(
    arg0: &mut String,
    arg1: &mut String,
    instr: &Instr,
    seg: &CodeSegment,
    ip: u16,
    len: usize,
    ctx: &DisassemblyContext,
) -> Option<String> {
    let cs = seg.cs;
    let syntax = ctx.syntax;
    let mut comment = None;

    // far pointers keep their `far` keyword through the rewrite
    let far = |s: String| {
        if syntax == AsmSyntax::Gas {
            s
        } else {
            format!("far {}", s)
        }
    };

    for i in ip as usize..ip as usize + len {
        if i >= seg.instr_flags.len() || seg.instr_flags[i] & INSTR_RELOC == 0 {
            continue;
        }
        let Some(r) = seg.reloc_at(i as u16) else {
            warn_at!(cs, ip, "Byte tagged INSTR_RELOC has no reloc; this is a bug.");
            continue;
        };

        if instr.op.arg0 == Arg::Ptr32 && r.size == 3 {
            // 32-bit relocation on a 32-bit pointer: the whole operand
            // is the relocation's target
            match &r.target {
                RelocTarget::Internal { segment, offset } => {
                    *arg0 = far(format!("{}:{:04x}", segment, offset));
                    comment = r.text.clone();
                }
                RelocTarget::ImportedOrdinal { module, ordinal } => {
                    *arg0 = far(format!(
                        "{}.{}",
                        ctx.module_name(*module).unwrap_or("?"),
                        ordinal
                    ));
                    comment = ctx.imported_name(*module, *ordinal).map(String::from);
                }
                RelocTarget::ImportedName {
                    module,
                    name_offset,
                } => {
                    *arg0 = far(format!(
                        "{}.{}",
                        ctx.module_name(*module).unwrap_or("?"),
                        ctx.import_name_at(*name_offset).unwrap_or_default()
                    ));
                }
                RelocTarget::OsFixup => {
                    warn_at!(
                        cs,
                        ip,
                        "unhandled relocation: size {}, type {}, instruction {:02x} {}",
                        r.size,
                        r.kind_code(),
                        instr.op.opcode,
                        instr.op.name
                    );
                }
            }
        } else if instr.op.arg0 == Arg::Ptr32
            && r.size == 2
            && matches!(r.target, RelocTarget::Internal { .. })
        {
            // segment-only relocation: take the segment from the
            // relocation but keep the decoded offset
            if let RelocTarget::Internal { segment, .. } = &r.target {
                *arg0 = far(format!("{}:{:04x}", segment, instr.arg0));
                comment = ctx.entry_name(*segment, instr.arg0 as u16).map(String::from);
            }
        } else if instr.op.arg0 == Arg::Imm && r.size == 2 {
            comment = rewrite_seg_imm(arg0, r, ctx).or(comment);
        } else if instr.op.arg1 == Arg::Imm && r.size == 2 {
            comment = rewrite_seg_imm(arg1, r, ctx).or(comment);
        } else if instr.op.arg0 == Arg::Imm && r.size == 5 {
            comment = rewrite_off_imm(arg0, r, ctx).or(comment);
        } else if instr.op.arg1 == Arg::Imm && r.size == 5 {
            comment = rewrite_off_imm(arg1, r, ctx).or(comment);
        } else {
            warn_at!(
                cs,
                ip,
                "unhandled relocation: size {}, type {}, instruction {:02x} {}",
                r.size,
                r.kind_code(),
                instr.op.opcode,
                instr.op.name
            );
        }
    }
    comment
}

/// `imm16` referencing a segment directly (`seg` keyword form).
fn rewrite_seg_imm(
    arg: &mut String,
    r: &super::reloc::Relocation,
    ctx: &DisassemblyContext,
) -> Option<String> {
    match &r.target {
        RelocTarget::Internal { segment, .. } => {
            *arg = format!("seg {}", segment);
            None
        }
        RelocTarget::ImportedOrdinal { module, ordinal } => {
            *arg = format!(
                "seg {}.{}",
                ctx.module_name(*module).unwrap_or("?"),
                ordinal
            );
            ctx.imported_name(*module, *ordinal).map(String::from)
        }
        RelocTarget::ImportedName {
            module,
            name_offset,
        } => {
            *arg = format!(
                "seg {}.{}",
                ctx.module_name(*module).unwrap_or("?"),
                ctx.import_name_at(*name_offset).unwrap_or_default()
            );
            None
        }
        RelocTarget::OsFixup => None,
    }
}

/// `imm16` referencing an offset directly.
fn rewrite_off_imm(
    arg: &mut String,
    r: &super::reloc::Relocation,
    ctx: &DisassemblyContext,
) -> Option<String> {
    match &r.target {
        RelocTarget::Internal { offset, .. } => {
            *arg = format!("{:04x}", offset);
            None
        }
        RelocTarget::ImportedOrdinal { module, ordinal } => {
            *arg = format!("{}.{}", ctx.module_name(*module).unwrap_or("?"), ordinal);
            ctx.imported_name(*module, *ordinal).map(String::from)
        }
        RelocTarget::ImportedName {
            module,
            name_offset,
        } => {
            *arg = format!(
                "{}.{}",
                ctx.module_name(*module).unwrap_or("?"),
                ctx.import_name_at(*name_offset).unwrap_or_default()
            );
            None
        }
        RelocTarget::OsFixup => None,
    }
}

/// Format one instruction into `line`. Returns the number of bytes
/// consumed, which is also how far the caller advances.
pub fn print_instr(line: &mut String, seg: &CodeSegment, ip: u16, ctx: &DisassemblyContext) -> usize {
    let cs = seg.cs;
    let syntax = ctx.syntax;
    let window = seg.instr_window(ip);
    let (instr, len) = decode(ip, &window, seg.is_32bit());

    if let Some(err) = instr.prefix_err {
        match err {
            PrefixError::MultipleSegment => warn_at!(
                cs,
                ip,
                "Multiple segment prefixes found: {}, {}. Skipping to next instruction.",
                instr.prefix.seg.map(|s| s.name()).unwrap_or("?"),
                instr.op.name
            ),
            PrefixError::Doubled => warn_at!(
                cs,
                ip,
                "Prefix specified twice: {}. Skipping to next instruction.",
                instr.op.name
            ),
        }
    }

    let mut usedmem = false;
    let mut arg0 = String::new();
    let mut arg1 = String::new();
    let mut arg2 = String::new();
    fmt::format_arg(&mut arg0, instr.arg0, instr.op.arg0, &instr, syntax, &mut usedmem, cs, ip);
    fmt::format_arg(&mut arg1, instr.arg1, instr.op.arg1, &instr, syntax, &mut usedmem, cs, ip);
    if instr.op.flags & OP_ARG2_IMM != 0 {
        fmt::format_arg(&mut arg2, instr.arg2, Arg::Imm, &instr, syntax, &mut usedmem, cs, ip);
    } else if instr.op.flags & OP_ARG2_IMM8 != 0 {
        fmt::format_arg(&mut arg2, instr.arg2, Arg::Imm8, &instr, syntax, &mut usedmem, cs, ip);
    } else if instr.op.flags & OP_ARG2_CL != 0 {
        fmt::format_arg(&mut arg2, instr.arg2, Arg::Cl, &instr, syntax, &mut usedmem, cs, ip);
    }

    let mut comment = apply_relocations(&mut arg0, &mut arg1, &instr, seg, ip, len, ctx);

    // near calls and jumps into a named export get the name shown
    if instr.op.arg0 == Arg::Rel16 && comment.is_none() {
        comment = ctx.entry_name(cs, instr.arg0 as u16).map(String::from);
    }

    if instr.op.name.is_empty() {
        warn_at!(
            cs,
            ip,
            "Unknown opcode {:02X} (extension {})",
            instr.op.opcode,
            instr.op.subcode
        );
    }

    let (name, suppress_arg0) = fmt::mnemonic(&instr, syntax);
    if suppress_arg0 {
        arg0.clear();
    }

    // gutter: position and raw bytes, seven wide
    let mut gutter = format!("{:4}.{:04x}:\t", cs, ip);
    let shown = len.min(7);
    for b in window.iter().take(shown) {
        gutter.push_str(&format!("{:02x} ", b));
    }
    for _ in shown..8 {
        gutter.push_str("   ");
    }
    let byte_flags = seg.instr_flags[ip as usize];
    if byte_flags & INSTR_JUMP != 0 {
        let mut b = gutter.into_bytes();
        let n = b.len();
        b[n - 1] = b'>';
        if byte_flags & INSTR_FAR != 0 {
            b[n - 2] = b'>';
        }
        gutter = String::from_utf8_lossy(&b).into_owned();
    }
    line.push_str(&gutter);

    // prefixes, spelled out when they are invalid for the opcode so
    // the listing round-trips
    if let Some(s) = instr.prefix.seg {
        let cannot_override = !usedmem
            || instr.op.arg0 == Arg::EsDi
            || (instr.op.arg1 == Arg::EsDi && instr.op.arg0 != Arg::DsSi);
        if cannot_override {
            warn_at!(
                cs,
                ip,
                "Segment prefix {} used with opcode 0x{:02x} {}",
                s.name(),
                instr.op.opcode,
                instr.op.name
            );
            line.push_str(s.name());
            line.push(' ');
        }
    }
    if instr.prefix.op32 && instr.op.size != 16 && instr.op.size != 32 {
        warn_at!(
            cs,
            ip,
            "Operand-size override used with opcode {:02X} {}",
            instr.op.opcode,
            instr.op.name
        );
        line.push_str(if syntax == AsmSyntax::Gas { "data32 " } else { "o32 " });
    } else if instr.prefix.op32
        && syntax != AsmSyntax::Gas
        && instr.op.flags & (OP_STACK | OP_STRING) == 0
        && instr.op.opcode != 0x98
        && instr.op.opcode != 0x99
    {
        // GAS spells the size in the mnemonic suffix instead
        line.push_str(if instr.op.size == 32 { "o32 " } else { "o16 " });
    }
    if instr.prefix.addr32 && syntax == AsmSyntax::Nasm && instr.op.flags & OP_STRING != 0 {
        line.push_str("a32 ");
    } else if instr.prefix.addr32 && !usedmem && instr.op.opcode != 0xE3 {
        warn_at!(
            cs,
            ip,
            "Address-size prefix used with opcode 0x{:02x} {}",
            instr.op.opcode,
            instr.op.name
        );
        line.push_str(if syntax == AsmSyntax::Gas { "addr32 " } else { "a32 " });
    }
    if instr.prefix.lock {
        if instr.op.flags & OP_LOCK == 0 {
            warn_at!(
                cs,
                ip,
                "lock prefix used with opcode 0x{:02x} {}",
                instr.op.opcode,
                instr.op.name
            );
        }
        line.push_str("lock ");
    }
    if instr.prefix.repne {
        if instr.op.flags & OP_REPNE == 0 {
            warn_at!(
                cs,
                ip,
                "repne prefix used with opcode 0x{:02x} {}",
                instr.op.opcode,
                instr.op.name
            );
        }
        line.push_str("repne ");
    }
    if instr.prefix.repe {
        if instr.op.flags & OP_REPE == 0 {
            warn_at!(
                cs,
                ip,
                "repe prefix used with opcode 0x{:02x} {}",
                instr.op.opcode,
                instr.op.name
            );
        }
        line.push_str(if instr.op.flags & OP_REPNE != 0 { "repe " } else { "rep " });
    }

    line.push_str(&name);

    if !arg0.is_empty() || !arg1.is_empty() {
        line.push('\t');
    }
    if syntax == AsmSyntax::Gas {
        // AT&T order: source first
        if !arg1.is_empty() {
            line.push_str(&arg1);
            line.push(',');
        }
        line.push_str(&arg0);
        if !arg2.is_empty() {
            line.push(',');
            line.push_str(&arg2);
        }
    } else {
        line.push_str(&arg0);
        if !arg0.is_empty() && !arg1.is_empty() {
            line.push_str(", ");
        }
        line.push_str(&arg1);
        if !arg2.is_empty() {
            line.push_str(", ");
            line.push_str(&arg2);
        }
    }

    if let Some(c) = comment {
        line.push_str(&format!("\t<{}>", ctx.demangled(&c)));
    }

    // more than seven bytes wrap to a continuation line
    if len > 7 {
        if syntax == AsmSyntax::Gas {
            line.push_str(&format!("\n{:4}.{:04x}:\t", cs, ip as usize + 7));
        } else {
            line.push_str("\n\t\t");
        }
        for b in window.iter().take(len).skip(7) {
            line.push_str(&format!("{:02x} ", b));
        }
        line.pop();
    }

    len
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::super::tests::test_segment;
    use super::super::{scan, CodeSegment, DisassemblyContext, Options};
    use super::*;
    use crate::ne::enttab::EntryPoint;
    use crate::ne::segtab::{RawReloc, SegmentData};

    fn ctx(syntax: AsmSyntax) -> DisassemblyContext {
        DisassemblyContext::new(
            Options {
                syntax,
                ..Options::default()
            },
            Vec::new(),
            Vec::new(),
            Vec::new(),
        )
    }

    fn one_line(code: Vec<u8>, syntax: AsmSyntax) -> String {
        let ctx = ctx(syntax);
        let seg = test_segment(1, code, &ctx);
        let mut line = String::new();
        print_instr(&mut line, &seg, 0, &ctx);
        line
    }

    #[test]
    fn mov_immediate_all_syntaxes() {
        assert_eq!(
            one_line(vec![0xB8, 0x34, 0x12], AsmSyntax::Nasm),
            "   1.0000:\tb8 34 12                mov\tax, 1234h"
        );
        assert_eq!(
            one_line(vec![0xB8, 0x34, 0x12], AsmSyntax::Masm),
            "   1.0000:\tb8 34 12                mov\tax, 1234h"
        );
        assert_eq!(
            one_line(vec![0xB8, 0x34, 0x12], AsmSyntax::Gas),
            "   1.0000:\tb8 34 12                movw\t$0x1234,%ax"
        );
    }

    #[test]
    fn operand_size_override_keeps_the_prefix_visible() {
        assert_eq!(
            one_line(vec![0x66, 0xB8, 0x78, 0x56, 0x34, 0x12], AsmSyntax::Nasm),
            "   1.0000:\t66 b8 78 56 34 12       o32 mov\teax, 12345678h"
        );
    }

    #[test]
    fn push_direct_memory() {
        assert_eq!(
            one_line(vec![0xFF, 0x36, 0x04, 0x00], AsmSyntax::Nasm),
            "   1.0000:\tff 36 04 00             push\tword [0004h]"
        );
    }

    #[test]
    fn shift_by_one() {
        assert_eq!(
            one_line(vec![0xD1, 0xE0], AsmSyntax::Nasm),
            "   1.0000:\td1 e0                   shl\tax, 1"
        );
    }

    #[test]
    fn aam_hides_its_canonical_base() {
        assert_eq!(
            one_line(vec![0xD4, 0x0A], AsmSyntax::Nasm),
            "   1.0000:\td4 0a                   aam"
        );
        assert_eq!(
            one_line(vec![0xD5, 0x0A], AsmSyntax::Nasm),
            "   1.0000:\td5 0a                   aad"
        );
    }

    #[test]
    fn unknown_opcode_prints_question_mark() {
        assert_eq!(
            one_line(vec![0xF1], AsmSyntax::Nasm),
            "   1.0000:\tf1                      ?"
        );
    }

    fn far_call_segment(syntax: AsmSyntax) -> (DisassemblyContext, Vec<CodeSegment>) {
        let entries = vec![EntryPoint {
            ordinal: 1,
            flags: 1,
            segment: 2,
            offset: 0x34,
            name: Some("symname".into()),
        }];
        let ctx = DisassemblyContext::new(
            Options {
                syntax,
                ..Options::default()
            },
            entries,
            Vec::new(),
            Vec::new(),
        );
        // segment 1: call far 2:0034 (the stored pointer is ignored in
        // favor of the relocation), then ret
        let mut code = vec![0x9A, 0x34, 0x12, 0x02, 0x00, 0xC3];
        // relocation chain terminator at the patched offset
        code[1] = 0xFB;
        code[2] = 0xFF;
        let data = SegmentData {
            start: 0,
            length: 6,
            flags: 0x0100,
            min_alloc: 6,
            code,
            relocs: vec![RawReloc {
                size: 3,
                kind: 0,
                offset: 1,
                module: 2,
                ordinal: 0x34,
            }],
        };
        // segment 2: the far target
        let target = test_segment(2, vec![0x90, 0x90, 0x90], &ctx);
        let mut segs = vec![CodeSegment::new(1, data, &ctx), target];
        // make the target offset real so the scan can mark it
        segs[1].length = 0x40;
        segs[1].code.resize(0x40, 0x90);
        segs[1].instr_flags.resize(0x40, 0);
        (ctx, segs)
    }

    #[test]
    fn far_call_rewrites_through_the_relocation() {
        let (ctx, segs) = far_call_segment(AsmSyntax::Nasm);
        let mut line = String::new();
        print_instr(&mut line, &segs[0], 0, &ctx);
        assert_eq!(
            line,
            "   1.0000:\t9a fb ff 02 00          call\tfar 2:0034\t<symname>"
        );
    }

    #[test]
    fn far_call_in_gas_gets_lcall() {
        let (ctx, segs) = far_call_segment(AsmSyntax::Gas);
        let mut line = String::new();
        print_instr(&mut line, &segs[0], 0, &ctx);
        assert_eq!(line, "   1.0000:\t9a fb ff 02 00          lcall\t2:0034\t<symname>");
    }

    #[test]
    fn scan_then_listing_end_to_end() {
        let entries = vec![EntryPoint {
            ordinal: 1,
            flags: 1,
            segment: 1,
            offset: 0,
            name: Some("start".into()),
        }];
        let ctx = DisassemblyContext::new(Options::default(), entries, Vec::new(), Vec::new());
        // call 0003; ret; mov ax, 1234h; ret; then unreachable junk
        let code = vec![0xE8, 0x00, 0x00, 0xB8, 0x34, 0x12, 0xC3, 0xAB, 0xCD];
        let mut segs = vec![test_segment(1, code, &ctx)];
        scan::scan_module(&mut segs, &ctx, (0, 0));

        let mut out = Vec::new();
        print_segment(&mut out, &segs[0], &ctx).unwrap();
        let text = String::from_utf8(out).unwrap();
        let expected = "\n\
                        1:0000 <start>:\n   \
                        1.0000:\te8 00 00                call\t0003\n\
                        \n\
                        1:0003 <no name>:\n   \
                        1.0003:\tb8 34 12                mov\tax, 1234h\n   \
                        1.0006:\tc3                      ret\n\
                        \u{20}    ...\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn jump_target_gets_a_marker() {
        let ctx = ctx(AsmSyntax::Nasm);
        // jmp 0003; nop; ret at 3
        let code = vec![0xEB, 0x01, 0x90, 0xC3];
        let mut segs = vec![test_segment(1, code, &ctx)];
        scan::scan_from(&mut segs, 1, 0);
        let mut line = String::new();
        print_instr(&mut line, &segs[0], 3, &ctx);
        assert_eq!(line, "   1.0003:\tc3                     >ret");
    }

    #[test]
    fn disassemble_all_decodes_unreached_bytes() {
        let ctx = DisassemblyContext::new(
            Options {
                disassemble_all: true,
                ..Options::default()
            },
            Vec::new(),
            Vec::new(),
            Vec::new(),
        );
        // nothing scanned: zeros, then an instruction
        let code = vec![0x00, 0x00, 0x40, 0xC3];
        let segs = vec![test_segment(1, code, &ctx)];
        let mut out = Vec::new();
        print_segment(&mut out, &segs[0], &ctx).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("     ...\n"));
        assert!(text.contains("inc\tax"));
        assert!(text.contains("ret"));
    }
}
