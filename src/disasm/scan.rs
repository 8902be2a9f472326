//! Reachability scan over the code segments.
//!
//! Starting from the exported entry points (and the program entry
//! point), the scanner decodes forward, marking every visited byte.
//! Control transfers whose target is knowable statically are followed:
//! near relative jumps and calls stay in the current segment, far
//! pointers go wherever their relocation says. Everything else —
//! indirect jumps, imported targets — just ends or continues the
//! current walk.
//!
//! Real modules bury data in code segments with no marker whatsoever,
//! which is why only exported entries serve as roots: under-scanning
//! beats decoding somebody's string table. The walk itself uses an
//! explicit LIFO worklist; the visit order is not observable, and deep
//! call chains in real binaries would otherwise eat the stack.

use super::{CodeSegment, DisassemblyContext, INSTR_FAR, INSTR_FUNC, INSTR_JUMP, INSTR_RELOC, INSTR_SCANNED, INSTR_VALID};
use crate::ne::enttab::ENTRY_CONSTANT;
use crate::warn::{warn_at, warn_msg};
use crate::x86::decode::decode;
use crate::x86::Arg;
use super::reloc::RelocTarget;

/// Scan every root of the module: exported entries first, then the
/// header's program entry point.
pub fn scan_module(segments: &mut [CodeSegment], ctx: &DisassemblyContext, entry: (u16, u16)) {
    for e in &ctx.entries {
        if e.segment == 0 || e.segment == ENTRY_CONSTANT {
            continue;
        }
        // data hides in code segments without any marker; scanning
        // only exported entries under-scans rather than mis-scans
        if !e.is_exported() {
            continue;
        }
        scan_from(segments, e.segment as u16, e.offset);
    }

    let (cs, ip) = entry;
    if cs == 0 {
        return;
    }
    match segments.get((cs - 1) as usize) {
        Some(seg) if ip >= seg.length => {
            warn_msg!(
                "Entry point {}:{:04x} exceeds segment length ({:04x})",
                cs,
                ip,
                seg.length
            );
        }
        Some(_) => scan_from(segments, cs, ip),
        None => {
            warn_msg!("Entry point {}:{:04x} names a segment that does not exist", cs, ip);
        }
    }
}

/// Scan one root, marking it as a function start when it is in range.
pub fn scan_from(segments: &mut [CodeSegment], cs: u16, ip: u16) {
    if let Some(seg) = segments.get_mut((cs as usize).wrapping_sub(1)) {
        if ip < seg.length {
            seg.instr_flags[ip as usize] |= INSTR_FUNC;
        }
    }

    let mut work = vec![(cs, ip)];
    while let Some((cs, ip)) = work.pop() {
        walk(segments, &mut work, cs, ip);
    }
}

/// Mark a transfer target and queue it. Targets outside the segment
/// (or in a segment that does not exist) warn and are dropped, the way
/// a scan attempt there would.
fn push_target(
    segments: &mut [CodeSegment],
    work: &mut Vec<(u16, u16)>,
    cs: u16,
    ip: u16,
    is_call: bool,
    far: bool,
) {
    let Some(seg) = segments.get_mut((cs as usize).wrapping_sub(1)) else {
        warn_at!(cs, ip, "Transfer target names a segment that does not exist.");
        return;
    };
    if ip >= seg.length {
        warn_at!(cs, ip, "Attempt to scan past end of segment.");
        return;
    }
    let f = &mut seg.instr_flags[ip as usize];
    if far {
        *f |= INSTR_FAR;
    }
    *f |= if is_call { INSTR_FUNC } else { INSTR_JUMP };
    work.push((cs, ip));
}

/// Linear walk from one queued position until the flow ends.
fn walk(segments: &mut [CodeSegment], work: &mut Vec<(u16, u16)>, cs: u16, start: u16) {
    let si = (cs as usize).wrapping_sub(1);
    let Some(seg) = segments.get(si) else {
        warn_at!(cs, start, "Transfer target names a segment that does not exist.");
        return;
    };
    let length = seg.length;
    let default32 = seg.is_32bit();

    if start >= length {
        warn_at!(cs, start, "Attempt to scan past end of segment.");
        return;
    }
    if segments[si].instr_flags[start as usize] & (INSTR_VALID | INSTR_SCANNED) == INSTR_SCANNED {
        warn_at!(cs, start, "Attempt to scan byte that does not begin instruction.");
    }

    let mut ip = start;
    loop {
        if segments[si].instr_flags[ip as usize] & INSTR_SCANNED != 0 {
            return;
        }

        let window = segments[si].instr_window(ip);
        let (instr, len) = decode(ip, &window, default32);

        {
            let flags = &mut segments[si].instr_flags;
            flags[ip as usize] |= INSTR_VALID;
            for i in 0..len {
                // the last instruction may hang over the segment end
                let p = ip as usize + i;
                if p < flags.len() {
                    flags[p] |= INSTR_SCANNED;
                }
            }
        }

        let name = instr.op.name;

        if instr.op.arg0 == Arg::Ptr32 {
            // the real target hides in the relocation on the pointer
            for i in ip as usize..ip as usize + len {
                if i >= segments[si].instr_flags.len() {
                    break;
                }
                if segments[si].instr_flags[i] & INSTR_RELOC == 0 {
                    continue;
                }
                let target = match segments[si].reloc_at(i as u16) {
                    Some(r) => match (&r.target, r.size) {
                        // 32-bit pointer relocation: both halves known
                        (RelocTarget::Internal { segment, offset }, 3) => {
                            Some((*segment, *offset))
                        }
                        // segment-only relocation: the offset is the
                        // decoded immediate
                        (RelocTarget::Internal { segment, .. }, 2) => {
                            Some((*segment, instr.arg0 as u16))
                        }
                        _ => None,
                    },
                    None => {
                        warn_at!(cs, ip, "Byte tagged INSTR_RELOC has no reloc; this is a bug.");
                        None
                    }
                };
                if let Some((tcs, tip)) = target {
                    push_target(segments, work, tcs, tip, name == "call", true);
                }
                break;
            }
            if name == "jmp" {
                return;
            }
        } else if instr.op.arg0 == Arg::Rel8 || instr.op.arg0 == Arg::Rel16 {
            push_target(segments, work, cs, instr.arg0 as u16, name == "call", false);
            if name == "jmp" {
                return;
            }
        } else if name == "jmp" || name == "ret" || name == "retf" || name == "iret" {
            return;
        }

        let next = ip as u32 + len as u32;
        if next >= length as u32 {
            warn_at!(cs, next, "Scan reached the end of segment.");
            return;
        }
        ip = next as u16;
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::test_segment;
    use super::super::{DisassemblyContext, Options, INSTR_FUNC, INSTR_JUMP, INSTR_SCANNED, INSTR_VALID};
    use super::*;

    fn ctx() -> DisassemblyContext {
        DisassemblyContext::new(Options::default(), Vec::new(), Vec::new(), Vec::new())
    }

    #[test]
    fn call_marks_function_and_return_stops() {
        // call 0003; ret; inc ax; ret
        let ctx = ctx();
        let mut segs = vec![test_segment(
            1,
            vec![0xE8, 0x00, 0x00, 0x40, 0xC3, 0x90],
            &ctx,
        )];
        scan_from(&mut segs, 1, 0);
        let f = &segs[0].instr_flags;
        assert!(f[0] & INSTR_FUNC != 0);
        assert!(f[0] & INSTR_VALID != 0);
        assert!(f[3] & INSTR_FUNC != 0);
        assert!(f[3] & INSTR_VALID != 0);
        assert!(f[4] & INSTR_VALID != 0);
        // the nop behind the ret stays unscanned
        assert_eq!(f[5], 0);
    }

    #[test]
    fn backwards_jump_terminates() {
        // jmp 0000 (EB FE jumps to itself)
        let ctx = ctx();
        let mut segs = vec![test_segment(1, vec![0xEB, 0xFE, 0x90], &ctx)];
        scan_from(&mut segs, 1, 0);
        let f = &segs[0].instr_flags;
        assert!(f[0] & INSTR_VALID != 0);
        assert!(f[0] & INSTR_JUMP != 0);
        assert_eq!(f[2], 0);
    }

    #[test]
    fn conditional_branch_scans_both_paths() {
        // jz +1; nop; nop; ret -> both 0x03 and 0x02 reachable
        let ctx = ctx();
        let mut segs = vec![test_segment(1, vec![0x74, 0x01, 0x90, 0x90, 0xC3], &ctx)];
        scan_from(&mut segs, 1, 0);
        let f = &segs[0].instr_flags;
        assert!(f[2] & INSTR_VALID != 0);
        assert!(f[3] & INSTR_VALID != 0);
        assert!(f[3] & INSTR_JUMP != 0);
        assert!(f[4] & INSTR_VALID != 0);
    }

    #[test]
    fn valid_implies_scanned_everywhere() {
        let ctx = ctx();
        let mut segs = vec![test_segment(
            1,
            vec![0x74, 0x02, 0x40, 0x40, 0xE8, 0xF8, 0xFF, 0xC3],
            &ctx,
        )];
        scan_from(&mut segs, 1, 0);
        for b in &segs[0].instr_flags {
            if b & INSTR_VALID != 0 {
                assert!(b & INSTR_SCANNED != 0);
            }
        }
    }

    #[test]
    fn out_of_range_target_is_dropped() {
        // jmp 0100 in a 3-byte segment
        let ctx = ctx();
        let mut segs = vec![test_segment(1, vec![0xE9, 0xFD, 0x00], &ctx)];
        scan_from(&mut segs, 1, 0);
        assert!(segs[0].instr_flags[0] & INSTR_VALID != 0);
    }

    #[test]
    fn exported_entries_are_roots_constants_are_not() {
        use crate::ne::enttab::EntryPoint;
        let entries = vec![
            EntryPoint {
                ordinal: 1,
                flags: 1,
                segment: 1,
                offset: 0,
                name: None,
            },
            EntryPoint {
                ordinal: 2,
                flags: 1,
                segment: 0xFE,
                offset: 2,
                name: None,
            },
            EntryPoint {
                ordinal: 3,
                flags: 0, // private: not a root
                segment: 1,
                offset: 2,
                name: None,
            },
        ];
        let ctx = DisassemblyContext::new(Options::default(), entries, Vec::new(), Vec::new());
        let mut segs = vec![test_segment(1, vec![0xC3, 0x90, 0xC3], &ctx)];
        scan_module(&mut segs, &ctx, (0, 0));
        let f = &segs[0].instr_flags;
        assert!(f[0] & INSTR_FUNC != 0);
        assert_eq!(f[2], 0);
    }

    #[test]
    fn program_entry_past_length_is_skipped() {
        let ctx = ctx();
        let mut segs = vec![test_segment(1, vec![0xC3], &ctx)];
        scan_module(&mut segs, &ctx, (1, 5));
        assert_eq!(segs[0].instr_flags[0], 0);
    }
}
