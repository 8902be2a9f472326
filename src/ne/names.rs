//! Resident and nonresident name tables.
//!
//! Both tables share one record layout: a Pascal string followed by the
//! word ordinal of the entry it names, terminated by a zero length
//! byte. They differ only in where they live (the resident table sits
//! behind a header-relative pointer, the nonresident one behind an
//! absolute pointer) so a single reader covers both.
//!
//! The first record is special: it carries the module name (resident
//! table) or the module description (nonresident table) under the
//! reserved ordinal 0 and never names an entry point.

use crate::types::PascalString;
use std::io::{self, Read, Seek, SeekFrom};

#[derive(Debug, Clone)]
pub struct NameEntry {
    pub name: PascalString,
    pub ordinal: u16,
}

#[derive(Debug, Clone, Default)]
pub struct NameTable {
    pub entries: Vec<NameEntry>,
}

impl NameTable {
    pub fn read<R: Read + Seek>(r: &mut R, table_offset: u64) -> io::Result<Self> {
        r.seek(SeekFrom::Start(table_offset))?;

        let mut entries = Vec::new();
        loop {
            let name = PascalString::read(r)?;
            if name.is_empty() {
                break;
            }
            let ordinal = {
                let mut buf = [0; 2];
                r.read_exact(&mut buf)?;
                u16::from_le_bytes(buf)
            };
            entries.push(NameEntry { name, ordinal });
        }
        Ok(Self { entries })
    }

    /// Module name or description: the reserved ordinal-0 record.
    pub fn module_record(&self) -> Option<&NameEntry> {
        self.entries.iter().find(|e| e.ordinal == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::NameTable;
    use std::io::Cursor;

    #[test]
    fn reads_until_zero_length() {
        // "KERNEL" @0, "EXITPROC" @5, terminator
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"\x06KERNEL\x00\x00");
        bytes.extend_from_slice(b"\x08EXITPROC\x05\x00");
        bytes.push(0);
        let t = NameTable::read(&mut Cursor::new(bytes), 0).unwrap();
        assert_eq!(t.entries.len(), 2);
        assert_eq!(t.module_record().unwrap().name.to_string(), "KERNEL");
        assert_eq!(t.entries[1].ordinal, 5);
        assert_eq!(t.entries[1].name.to_string(), "EXITPROC");
    }
}
