//! Module-reference table and imported-name table.
//!
//! The module-reference table is `e_cmod` words, each an offset into
//! the imported-name table where the referenced module's Pascal string
//! lives. The imported-name table itself doubles as the string pool for
//! by-name imports, so the raw blob is kept around: relocation records
//! point into it by offset at display time.

use crate::types::PascalString;
use std::io::{self, Read, Seek, SeekFrom};

/// One referenced module. Export names become known only when a spec
/// file for the module is supplied, so `exports` may well stay empty;
/// lookups then simply produce no symbolic name.
#[derive(Debug, Clone, Default)]
pub struct ImportModule {
    pub name: String,
    pub exports: Vec<(u16, String)>,
}

impl ImportModule {
    pub fn export_name(&self, ordinal: u16) -> Option<&str> {
        self.exports
            .iter()
            .find(|(o, _)| *o == ordinal)
            .map(|(_, n)| n.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct ModuleTable {
    pub modules: Vec<ImportModule>,
    /// raw imported-name table, indexed by relocation records
    pub import_names: Vec<u8>,
}

impl ModuleTable {
    ///
    /// Reads the module references and the imported-name blob in one
    /// go. `names_len` is the distance from the imported-name table to
    /// the next table; the linker lays them out back to back.
    ///
    pub fn read<R: Read + Seek>(
        r: &mut R,
        mod_tab: u64,
        count: u16,
        imp_tab: u64,
        names_len: u16,
    ) -> io::Result<Self> {
        r.seek(SeekFrom::Start(mod_tab))?;
        let mut offsets = Vec::with_capacity(count as usize);
        let mut buf = [0; 2];
        for _ in 0..count {
            r.read_exact(&mut buf)?;
            offsets.push(u16::from_le_bytes(buf));
        }

        r.seek(SeekFrom::Start(imp_tab))?;
        let mut import_names = vec![0; names_len as usize];
        r.read_exact(&mut import_names)?;

        let modules = offsets
            .into_iter()
            .map(|off| ImportModule {
                name: PascalString::from_blob(&import_names, off as usize)
                    .map(|s| s.to_string())
                    .unwrap_or_default(),
                exports: Vec::new(),
            })
            .collect();

        Ok(Self {
            modules,
            import_names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::ModuleTable;
    use std::io::Cursor;

    #[test]
    fn module_names_resolve_through_the_blob() {
        // module references at 0: offsets 1 and 8
        // imported names at 8: 00 "KERNEL" "GDI"
        let mut bytes = vec![0u8; 8];
        bytes[0] = 1;
        bytes[2] = 8;
        bytes.extend_from_slice(b"\x00\x06KERNEL\x03GDI");
        let blob_len = (bytes.len() - 8) as u16;
        let t = ModuleTable::read(&mut Cursor::new(bytes), 0, 2, 8, blob_len).unwrap();
        assert_eq!(t.modules.len(), 2);
        assert_eq!(t.modules[0].name, "KERNEL");
        assert_eq!(t.modules[1].name, "GDI");
        assert!(t.modules[0].export_name(23).is_none());
    }
}
