//! Disassembler for the code segments of 16-bit segmented
//! "New Executable" modules.
//!
//! NE is the format of Windows 1.x through 3.x programs and libraries,
//! 16-bit OS/2 and a few multitasking DOS editions. Its code lives in
//! numbered segments with per-segment relocation tables, and that is
//! what makes disassembling it different from dumping a flat binary:
//! every far call in the listing is a hole the loader patches at run
//! time, so the interesting control flow sits in the relocation
//! records, not in the code bytes.
//!
//! The crate splits along that line:
//!  - `ne` loads the container (headers, entry points with their
//!    names, referenced modules, segment payloads);
//!  - `x86` decodes and formats single instructions under GAS, NASM or
//!    MASM syntax;
//!  - `disasm` ties the two together: relocation resolution, a
//!    reachability scan rooted at the exported entries, and the
//!    formatted listing with symbolic operands.
//!
//! ```no_run
//! use nedisasm::disasm::{disassemble, Options};
//! use nedisasm::ne::NeModule;
//!
//! # fn main() -> std::io::Result<()> {
//! let module = NeModule::load("CALC.EXE")?;
//! let mut stdout = std::io::stdout();
//! disassemble(module, Options::default(), &mut stdout)?;
//! # Ok(())
//! # }
//! ```
//!
//! Warnings about malformed input (truncated relocation chains, entry
//! points past their segment, unknown opcodes) go to stderr; the
//! listing itself keeps going with best-effort placeholders.

pub mod disasm;
pub mod ne;
/// Support of specific types
pub mod types;
pub(crate) mod warn;
pub mod x86;
