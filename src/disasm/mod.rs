//! Disassembly of NE code segments.
//!
//! The pipeline has a strict ordering: relocations of every segment are
//! parsed first (the scanner follows cross-segment references, so it
//! needs all of them), then the reachability scan marks instruction
//! starts from the exported entry points, and only then does the
//! listing pass print anything. Everything the passes share lives in a
//! [`DisassemblyContext`] instead of process globals, built once from
//! the loaded module and handed to each component.

pub mod listing;
pub mod reloc;
pub mod scan;

use std::collections::HashMap;
use std::io::{self, Write};

use crate::ne::enttab::EntryPoint;
use crate::ne::modtab::ImportModule;
use crate::ne::segtab::{SegmentData, SEG_32BIT, SEG_DATA};
use crate::ne::NeModule;
use crate::types::PascalString;
use crate::x86::fmt::AsmSyntax;
use crate::x86::MAX_INSTR;
use reloc::Relocation;

// per-byte scan state
/// byte has been scanned
pub const INSTR_SCANNED: u8 = 0x01;
/// byte begins an instruction
pub const INSTR_VALID: u8 = 0x02;
/// instruction is jumped to
pub const INSTR_JUMP: u8 = 0x04;
/// instruction begins a function
pub const INSTR_FUNC: u8 = 0x08;
/// instruction is the target of a far call/jmp
pub const INSTR_FAR: u8 = 0x10;
/// byte starts a relocated field
pub const INSTR_RELOC: u8 = 0x20;

/// External name demangler hook. Returns `None` when the name is not a
/// mangled one.
pub type Demangler = fn(&str) -> Option<String>;

/// User-selectable behavior.
#[derive(Default)]
pub struct Options {
    pub syntax: AsmSyntax,
    /// decode through bytes the scan never reached
    pub disassemble_all: bool,
    /// restrict output to these segment numbers; empty means all
    pub segments: Vec<u16>,
    pub demangler: Option<Demangler>,
}

/// Shared state of one disassembly run.
pub struct DisassemblyContext {
    pub syntax: AsmSyntax,
    pub disassemble_all: bool,
    segment_filter: Vec<u16>,
    demangler: Option<Demangler>,
    pub entries: Vec<EntryPoint>,
    entry_index: HashMap<(u16, u16), usize>,
    modules: Vec<ImportModule>,
    import_names: Vec<u8>,
}

impl DisassemblyContext {
    pub fn new(
        options: Options,
        entries: Vec<EntryPoint>,
        modules: Vec<ImportModule>,
        import_names: Vec<u8>,
    ) -> Self {
        let mut entry_index = HashMap::new();
        for (i, e) in entries.iter().enumerate() {
            if e.segment == 0 {
                continue;
            }
            entry_index
                .entry((e.segment as u16, e.offset))
                .or_insert(i);
        }
        Self {
            syntax: options.syntax,
            disassemble_all: options.disassemble_all,
            segment_filter: options.segments,
            demangler: options.demangler,
            entries,
            entry_index,
            modules,
            import_names,
        }
    }

    pub fn wants_segment(&self, cs: u16) -> bool {
        self.segment_filter.is_empty() || self.segment_filter.contains(&cs)
    }

    /// Name of the entry point at `(cs, ip)`, if one exists and is
    /// named.
    pub fn entry_name(&self, cs: u16, ip: u16) -> Option<&str> {
        let i = *self.entry_index.get(&(cs, ip))?;
        self.entries[i].name.as_deref()
    }

    /// Entry-table record by 1-based ordinal, for relocation records
    /// that point at the table instead of naming a segment.
    pub fn entry_by_ordinal(&self, ordinal: u16) -> Option<&EntryPoint> {
        self.entries.iter().find(|e| e.ordinal == ordinal)
    }

    /// Name of the `module`-th referenced module (1-based).
    pub fn module_name(&self, module: u16) -> Option<&str> {
        let m = self.modules.get((module as usize).checked_sub(1)?)?;
        Some(m.name.as_str())
    }

    /// Export name of an imported ordinal, when a spec file supplied
    /// the module's exports.
    pub fn imported_name(&self, module: u16, ordinal: u16) -> Option<&str> {
        self.modules
            .get((module as usize).checked_sub(1)?)?
            .export_name(ordinal)
    }

    /// Pascal string at `offset` in the imported-name table.
    pub fn import_name_at(&self, offset: u16) -> Option<String> {
        PascalString::from_blob(&self.import_names, offset as usize).map(|s| s.to_string())
    }

    /// Run a comment through the demangler hook, if one is installed.
    pub fn demangled(&self, name: &str) -> String {
        match self.demangler {
            Some(f) => f(name).unwrap_or_else(|| name.to_string()),
            None => name.to_string(),
        }
    }
}

/// One code segment with its scan state and parsed relocations.
pub struct CodeSegment {
    /// 1-based segment number
    pub cs: u16,
    pub start: u64,
    pub length: u16,
    pub min_alloc: u32,
    pub flags: u16,
    pub code: Vec<u8>,
    /// per-byte `INSTR_*` bits; sized past `length` because data (and
    /// the last instruction) may hang over into the allocation
    pub instr_flags: Vec<u8>,
    pub relocs: Vec<Relocation>,
    reloc_index: HashMap<u16, usize>,
}

impl CodeSegment {
    pub fn new(cs: u16, mut data: SegmentData, ctx: &DisassemblyContext) -> Self {
        let flags_len = (data.length as u32).max(data.min_alloc) as usize;
        let mut instr_flags = vec![0u8; flags_len];

        // segments without a file payload still report a length
        data.code.resize(data.length as usize, 0);

        let relocs: Vec<Relocation> = data
            .relocs
            .iter()
            .map(|raw| Relocation::resolve(raw, &data.code, data.length, ctx))
            .collect();

        let mut reloc_index = HashMap::new();
        for (i, r) in relocs.iter().enumerate() {
            for &off in &r.offsets {
                instr_flags[off as usize] |= INSTR_RELOC;
                reloc_index.entry(off).or_insert(i);
            }
        }

        Self {
            cs,
            start: data.start,
            length: data.length,
            min_alloc: data.min_alloc,
            flags: data.flags,
            code: data.code,
            instr_flags,
            relocs,
            reloc_index,
        }
    }

    pub fn is_data(&self) -> bool {
        self.flags & SEG_DATA != 0
    }

    pub fn is_32bit(&self) -> bool {
        self.flags & SEG_32BIT != 0
    }

    /// Relocation whose offset chain covers `offset`.
    pub fn reloc_at(&self, offset: u16) -> Option<&Relocation> {
        self.reloc_index.get(&offset).map(|&i| &self.relocs[i])
    }

    /// Decode window at `ip`, zero-padded past the end of the segment.
    pub fn instr_window(&self, ip: u16) -> [u8; MAX_INSTR] {
        let mut w = [0u8; MAX_INSTR];
        let start = ip as usize;
        if start < self.code.len() {
            let end = (start + MAX_INSTR).min(self.code.len());
            w[..end - start].copy_from_slice(&self.code[start..end]);
        }
        w
    }
}

fn segment_flags_text(flags: u16) -> String {
    let mut s = String::from(if flags & SEG_DATA != 0 { "data" } else { "code" });
    if flags & 0x0002 != 0 {
        s.push_str(", allocated");
    }
    if flags & 0x0004 != 0 {
        s.push_str(", loaded");
    }
    if flags & 0x0008 != 0 {
        s.push_str(", iterated");
    }
    if flags & 0x0010 != 0 {
        s.push_str(", moveable");
    }
    if flags & 0x0020 != 0 {
        s.push_str(", shareable");
    }
    if flags & 0x0040 != 0 {
        s.push_str(", preload");
    }
    if flags & 0x0080 != 0 {
        s.push_str(if flags & SEG_DATA != 0 {
            ", read-only"
        } else {
            ", execute-only"
        });
    }
    if flags & 0x0100 != 0 {
        s.push_str(", has relocation data");
    }
    // 0x0400 appears in many real files with no documented meaning;
    // it passes through without comment
    if flags & 0x0800 != 0 {
        s.push_str(", self-loading");
    }
    if flags & 0x1000 != 0 {
        s.push_str(", discardable");
    }
    if flags & 0x2000 != 0 {
        s.push_str(", 32-bit");
    }
    if flags & 0xC200 != 0 {
        s.push_str(&format!(", (unknown flags 0x{:04x})", flags & 0xC200));
    }
    s
}

/// Disassemble a loaded module to `out`. Warnings go to stderr as they
/// arise.
pub fn disassemble<W: Write>(module: NeModule, options: Options, out: &mut W) -> io::Result<()> {
    let entry_point = module.header.entry_point();
    let ctx = DisassemblyContext::new(
        options,
        module.entry_table.entries,
        module.module_table.modules,
        module.module_table.import_names,
    );

    // relocations of every segment parse before any scan starts
    let mut segments: Vec<CodeSegment> = module
        .segments
        .into_iter()
        .enumerate()
        .map(|(i, data)| CodeSegment::new(i as u16 + 1, data, &ctx))
        .collect();

    scan::scan_module(&mut segments, &ctx, entry_point);

    for seg in &segments {
        if !ctx.wants_segment(seg.cs) {
            continue;
        }
        writeln!(
            out,
            "Segment {} (start = 0x{:x}, length = 0x{:x}, minimum allocation = 0x{:x}):",
            seg.cs, seg.start, seg.length, seg.min_alloc
        )?;
        writeln!(
            out,
            "    Flags: 0x{:04x} ({})",
            seg.flags,
            segment_flags_text(seg.flags)
        )?;

        if !seg.is_data() {
            listing::print_segment(out, seg, &ctx)?;
        }
    }
    Ok(())
}
