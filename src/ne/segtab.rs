//! Segment table and per-segment payload.
//!
//! Each record is four words: sector base, on-disk length, flags and
//! minimum allocation. The code image lives at `sector_base <<
//! align_shift`; when the relocation flag is set, a word count plus
//! `count` 8-byte relocation records follow the image directly.
//!
//! A zero minimum-allocation word means 65536 bytes, and a zero sector
//! base means the segment has no file payload at all (a .BSS-style
//! allocation).

use bytemuck::{Pod, Zeroable};
use std::io::{self, Read, Seek, SeekFrom};

/// data (1) vs code (0)
pub const SEG_DATA: u16 = 0x0001;
pub const SEG_MOVEABLE: u16 = 0x0010;
pub const SEG_SHAREABLE: u16 = 0x0020;
pub const SEG_PRELOAD: u16 = 0x0040;
/// read-only for data segments, execute-only for code segments
pub const SEG_RDONLY: u16 = 0x0080;
pub const SEG_HAS_RELOCS: u16 = 0x0100;
pub const SEG_SELF_LOADING: u16 = 0x0800;
pub const SEG_DISCARDABLE: u16 = 0x1000;
/// default operand/address size is 32 bits
pub const SEG_32BIT: u16 = 0x2000;

///
/// Raw 8-byte relocation record as stored after the segment image.
/// The interpretation of the last two words depends on the type byte,
/// so they keep neutral names here.
///
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
pub struct RawReloc {
    pub size: u8,
    pub kind: u8,
    pub offset: u16,
    pub module: u16,
    pub ordinal: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
#[repr(C)]
struct SegRecord {
    sector_base: u16,
    length: u16,
    flags: u16,
    min_alloc: u16,
}

/// One loaded segment: header fields plus the raw code bytes and the
/// unparsed relocation records.
#[derive(Debug, Clone)]
pub struct SegmentData {
    pub start: u64,
    pub length: u16,
    pub flags: u16,
    pub min_alloc: u32,
    pub code: Vec<u8>,
    pub relocs: Vec<RawReloc>,
}

impl SegmentData {
    pub fn is_data(&self) -> bool {
        self.flags & SEG_DATA != 0
    }

    pub fn read<R: Read + Seek>(r: &mut R, align_shift: u16) -> io::Result<Self> {
        let mut buf = [0; 8];
        r.read_exact(&mut buf)?;
        let rec: SegRecord = bytemuck::cast(buf);

        let next_record = r.stream_position()?;

        let start = (rec.sector_base as u64) << align_shift;
        let length = rec.length;
        let min_alloc = if rec.min_alloc == 0 {
            0x10000
        } else {
            rec.min_alloc as u32
        };

        let mut code = Vec::new();
        let mut relocs = Vec::new();
        if rec.sector_base != 0 {
            r.seek(SeekFrom::Start(start))?;
            code = vec![0; length as usize];
            r.read_exact(&mut code)?;

            if rec.flags & SEG_HAS_RELOCS != 0 {
                let mut count_buf = [0; 2];
                r.read_exact(&mut count_buf)?;
                let count = u16::from_le_bytes(count_buf);
                relocs.reserve(count as usize);
                for _ in 0..count {
                    let mut rbuf = [0; 8];
                    r.read_exact(&mut rbuf)?;
                    relocs.push(bytemuck::pod_read_unaligned(&rbuf));
                }
            }
        }

        r.seek(SeekFrom::Start(next_record))?;

        Ok(Self {
            start,
            length,
            flags: rec.flags,
            min_alloc,
            code,
            relocs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn reads_record_code_and_relocations() {
        // segment record at 0, image at sector 1 << 4 = 0x10
        let mut bytes = vec![0u8; 0x10];
        bytes[0] = 1; // sector_base
        bytes[2] = 4; // length
        bytes[4] = 0x00;
        bytes[5] = 0x01; // flags: has relocations (0x0100)
        bytes[6] = 0; // min_alloc = 0 -> 65536
        bytes.extend_from_slice(&[0xB8, 0x34, 0x12, 0xC3]); // code
        bytes.extend_from_slice(&[1, 0]); // one relocation
        bytes.extend_from_slice(&[3, 0, 0x01, 0x00, 0x02, 0x00, 0x34, 0x00]);

        let mut c = Cursor::new(bytes);
        let seg = SegmentData::read(&mut c, 4).unwrap();
        assert_eq!(seg.start, 0x10);
        assert_eq!(seg.length, 4);
        assert_eq!(seg.min_alloc, 0x10000);
        assert_eq!(seg.code, vec![0xB8, 0x34, 0x12, 0xC3]);
        assert_eq!(seg.relocs.len(), 1);
        assert_eq!(seg.relocs[0].size, 3);
        assert_eq!(seg.relocs[0].offset, 1);
        assert_eq!((seg.relocs[0].module, seg.relocs[0].ordinal), (2, 0x34));
        // the cursor is back at the next segment record
        assert_eq!(c.position(), 8);
    }

    #[test]
    fn bss_prototype_has_no_payload() {
        let bytes = vec![0u8; 8];
        let seg = SegmentData::read(&mut Cursor::new(bytes), 9).unwrap();
        assert!(seg.code.is_empty());
        assert!(seg.relocs.is_empty());
        assert_eq!(seg.length, 0);
    }
}
