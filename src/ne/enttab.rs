//! Entry table: the exported entry points of the module.
//!
//! ```
//! // +---------------+
//! // | BUNDLE_HEADER <---- [COUNT; SEGMENT]
//! // +---------------+
//! // |+-------------+| <--+ COUNT records of one shape. SEGMENT 0
//! // || @1 entry    ||    | bundles hold unused ordinals, 0xFF
//! // || @2 entry    ||    | bundles hold 6-byte moveable entries,
//! // |+-------------+|    | anything else 3-byte fixed entries.
//! // | BUNDLE_HEADER | <--+
//! // | ...           |
//! ```
//!
//! Ordinals run through every bundle, unused slots included; that is
//! how a module exports @1 and @680 with nothing in between. The reader
//! flattens the bundles into one ordinal-stamped list because both the
//! relocation resolver (entry index lookups) and the scanner (exported
//! roots) want flat access.

use std::io::{self, Read, Seek, SeekFrom};

/// Flag bit: the entry is exported.
pub const ENTRY_EXPORTED: u8 = 0x01;

/// Segment byte of a constant entry; such entries are data, not code.
pub const ENTRY_CONSTANT: u8 = 0xFE;

/// One flattened entry-table record.
#[derive(Debug, Clone, Default)]
pub struct EntryPoint {
    pub ordinal: u16,
    pub flags: u8,
    /// 1-based segment number; 0 for an unused ordinal slot,
    /// [`ENTRY_CONSTANT`] for a constant entry
    pub segment: u8,
    pub offset: u16,
    /// attached later from the resident/nonresident name tables
    pub name: Option<String>,
}

impl EntryPoint {
    pub fn is_exported(&self) -> bool {
        self.flags & ENTRY_EXPORTED != 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct EntryTable {
    pub entries: Vec<EntryPoint>,
}

impl EntryTable {
    pub fn read<R: Read + Seek>(r: &mut R, table_offset: u64, table_len: u16) -> io::Result<Self> {
        r.seek(SeekFrom::Start(table_offset))?;

        let mut entries = Vec::new();
        let mut remaining = table_len;
        let mut ordinal: u16 = 1;

        while remaining >= 2 {
            let mut bundle = [0; 2];
            r.read_exact(&mut bundle)?;
            remaining -= 2;

            let count = bundle[0] as u16;
            let seg_id = bundle[1];
            if count == 0 {
                break;
            }

            if seg_id == 0 {
                // unused ordinals between exports
                ordinal += count;
                continue;
            }

            let record_len: u16 = if seg_id == 0xFF { 6 } else { 3 };
            let bundle_len = count * record_len;
            if bundle_len > remaining {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "entry bundle of {} bytes exceeds the {} remaining",
                        bundle_len, remaining
                    ),
                ));
            }
            remaining -= bundle_len;

            for _ in 0..count {
                let entry = if seg_id == 0xFF {
                    // moveable: flags, int 3Fh magic, segment, offset
                    let mut buf = [0; 6];
                    r.read_exact(&mut buf)?;
                    EntryPoint {
                        ordinal,
                        flags: buf[0],
                        segment: buf[3],
                        offset: u16::from_le_bytes([buf[4], buf[5]]),
                        name: None,
                    }
                } else {
                    // fixed: flags, offset; the segment comes from the
                    // bundle header
                    let mut buf = [0; 3];
                    r.read_exact(&mut buf)?;
                    EntryPoint {
                        ordinal,
                        flags: buf[0],
                        segment: seg_id,
                        offset: u16::from_le_bytes([buf[1], buf[2]]),
                        name: None,
                    }
                };
                entries.push(entry);
                ordinal += 1;
            }
        }

        Ok(Self { entries })
    }

    /// Attach names by ordinal. Existing names win, so the resident
    /// table should be applied before the nonresident one.
    pub fn attach_names(&mut self, names: &super::names::NameTable) {
        for rec in &names.entries {
            if rec.ordinal == 0 {
                continue;
            }
            if let Some(e) = self
                .entries
                .iter_mut()
                .find(|e| e.ordinal == rec.ordinal && e.name.is_none())
            {
                e.name = Some(rec.name.to_string());
            }
        }
    }

    pub fn by_ordinal(&self, ordinal: u16) -> Option<&EntryPoint> {
        self.entries.iter().find(|e| e.ordinal == ordinal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ne::names::NameTable;
    use std::io::Cursor;

    fn sample_table() -> Vec<u8> {
        let mut b = Vec::new();
        // bundle: 2 fixed entries in segment 1
        b.extend_from_slice(&[2, 1]);
        b.extend_from_slice(&[1, 0x10, 0x00]); // @1 exported, 1:0010
        b.extend_from_slice(&[0, 0x20, 0x00]); // @2 private, 1:0020
        // bundle: 3 unused ordinals
        b.extend_from_slice(&[3, 0]);
        // bundle: 1 moveable entry
        b.extend_from_slice(&[1, 0xFF]);
        b.extend_from_slice(&[1, 0xCD, 0x3F, 2, 0x34, 0x12]); // @6, 2:1234
        // terminator
        b.extend_from_slice(&[0, 0]);
        b
    }

    #[test]
    fn flattens_bundles_with_running_ordinals() {
        let len = sample_table().len() as u16;
        let t = EntryTable::read(&mut Cursor::new(sample_table()), 0, len).unwrap();
        assert_eq!(t.entries.len(), 3);
        assert_eq!(t.entries[0].ordinal, 1);
        assert!(t.entries[0].is_exported());
        assert_eq!((t.entries[1].segment, t.entries[1].offset), (1, 0x20));
        assert!(!t.entries[1].is_exported());
        let moveable = &t.entries[2];
        assert_eq!(moveable.ordinal, 6);
        assert_eq!((moveable.segment, moveable.offset), (2, 0x1234));
    }

    #[test]
    fn oversized_bundle_is_rejected() {
        let bytes = vec![9, 1, 0, 0];
        assert!(EntryTable::read(&mut Cursor::new(bytes), 0, 4).is_err());
    }

    #[test]
    fn names_attach_by_ordinal() {
        let len = sample_table().len() as u16;
        let mut t = EntryTable::read(&mut Cursor::new(sample_table()), 0, len).unwrap();
        let mut names = Vec::new();
        names.extend_from_slice(b"\x06MODULE\x00\x00");
        names.extend_from_slice(b"\x04INIT\x01\x00");
        names.push(0);
        let names = NameTable::read(&mut Cursor::new(names), 0).unwrap();
        t.attach_names(&names);
        assert_eq!(t.by_ordinal(1).unwrap().name.as_deref(), Some("INIT"));
        assert!(t.by_ordinal(2).unwrap().name.is_none());
    }
}
