use std::io::{self, Write};
use std::process::ExitCode;

use nedisasm::disasm::{disassemble, Options};
use nedisasm::ne::NeModule;
use nedisasm::x86::fmt::AsmSyntax;

fn usage() -> ExitCode {
    eprintln!("usage: nedisasm [-a] [-s gas|nasm|masm] [-S segment]... <file>");
    ExitCode::from(2)
}

fn main() -> ExitCode {
    let mut options = Options::default();
    let mut path = None;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-a" | "--disassemble-all" => options.disassemble_all = true,
            "-s" | "--syntax" => {
                options.syntax = match args.next().as_deref() {
                    Some("gas") => AsmSyntax::Gas,
                    Some("nasm") => AsmSyntax::Nasm,
                    Some("masm") => AsmSyntax::Masm,
                    _ => return usage(),
                }
            }
            "-S" | "--segment" => match args.next().and_then(|s| s.parse().ok()) {
                Some(cs) => options.segments.push(cs),
                None => return usage(),
            },
            _ if path.is_none() && !arg.starts_with('-') => path = Some(arg),
            _ => return usage(),
        }
    }
    let Some(path) = path else {
        return usage();
    };

    let module = match NeModule::load(&path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}: {}", path, e);
            return ExitCode::FAILURE;
        }
    };

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if let Err(e) = disassemble(module, options, &mut out) {
        let _ = out.flush();
        eprintln!("{}: {}", path, e);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
