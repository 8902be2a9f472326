//! Loader for segmented "New Executable" modules.
//!
//! The format shows up in Windows 1.x through 3.x, 16-bit OS/2 and a
//! few multitasking DOS editions. Everything the disassembler needs is
//! behind one call:
//!
//! ```no_run
//! use nedisasm::ne::NeModule;
//!
//! # fn main() -> std::io::Result<()> {
//! let module = NeModule::load("PROGMAN.EXE")?;
//! println!("{} segments", module.segments.len());
//! # Ok(())
//! # }
//! ```
//!
//! Table layout behind the NE header, in file order:
//!
//! ```text
//! +--------------------+
//! | NE header          | <- e_lfanew; every u16 pointer below is
//! +--------------------+    relative to this position
//! | segment table      | one 8-byte record per segment
//! | resource table     | (not read here)
//! | resident names     | module name @0, then exported names
//! | module references  | word offsets into the imported names
//! | imported names     | Pascal-string pool, indexed by relocations
//! | entry table        | bundled entry points
//! +--------------------+
//! | segment images     | code/data, each followed by its relocation
//! |   ...              | records when flagged
//! +--------------------+
//! | nonresident names  | absolute pointer, ordinal names again
//! +--------------------+
//! ```

pub mod enttab;
pub mod header;
pub mod modtab;
pub mod names;
pub mod segtab;

use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use enttab::EntryTable;
use header::{MzHeader, NeHeader};
use modtab::ModuleTable;
use names::NameTable;
use segtab::SegmentData;

/// A fully loaded module: headers, flattened entry points with their
/// names, referenced modules, the imported-name pool and every
/// segment's payload.
pub struct NeModule {
    pub dos_header: MzHeader,
    pub header: NeHeader,
    pub entry_table: EntryTable,
    pub module_table: ModuleTable,
    pub segments: Vec<SegmentData>,
}

impl NeModule {
    pub fn load<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path)?;
        let mut reader = BufReader::new(file);
        Self::read(&mut reader)
    }

    pub fn read<R: Read + Seek>(reader: &mut R) -> io::Result<Self> {
        let dos_header = MzHeader::read(reader)?;
        if !dos_header.has_valid_magic() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a valid DOS header",
            ));
        }
        if dos_header.e_lfanew == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "not a protected-mode executable",
            ));
        }

        let header = NeHeader::read(reader, dos_header.e_lfanew)?;
        if !header.is_valid_magic() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidData,
                "invalid magic for a segmented executable",
            ));
        }

        // all pointers except e_nres_tab are relative to the header
        let offset = |ptr: u16| ptr as u64 + dos_header.e_lfanew as u64;

        let mut entry_table = EntryTable::read(reader, offset(header.e_ent_tab), header.e_cb_ent)?;

        let resident = NameTable::read(reader, offset(header.e_resn_tab))?;
        entry_table.attach_names(&resident);
        if header.e_nres_tab != 0 {
            let nonresident = NameTable::read(reader, header.e_nres_tab as u64)?;
            entry_table.attach_names(&nonresident);
        }

        // the imported-name pool runs up to the entry table
        let names_len = if header.e_imp_tab == 0 {
            0
        } else {
            header.e_ent_tab.saturating_sub(header.e_imp_tab)
        };
        let module_table = ModuleTable::read(
            reader,
            offset(header.e_mod_tab),
            header.e_cmod,
            offset(header.e_imp_tab),
            names_len,
        )?;

        reader.seek(SeekFrom::Start(offset(header.e_seg_tab)))?;
        let mut segments = Vec::with_capacity(header.e_cseg as usize);
        for _ in 0..header.e_cseg {
            segments.push(SegmentData::read(reader, header.align_shift())?);
        }

        Ok(Self {
            dos_header,
            header,
            entry_table,
            module_table,
            segments,
        })
    }
}
