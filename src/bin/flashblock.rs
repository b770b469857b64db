//! flashblock: compile a TOML parameter-block manifest into flash image artifacts.
//!
//! Input: one manifest file (`-` reads standard input) plus optional `--modify name=value`
//! overrides. An `@path` argument is replaced by the whitespace-separated arguments in `path`.
//! Output: the selected formats (Intel-hex, C source, GNU-ld include, pyHexDump config)
//! written to the destination directory.

use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use flashblock::writers::{
    CSourceWriter, GnuLdWriter, IntelHexWriter, PyHexDumpWriter, Writer, WriterContext,
};
use flashblock::{compile, parse_override, Manifest, ManifestError};

#[derive(Debug, Parser)]
#[command(name = "flashblock", version, about = "Generate flash parameter block images")]
struct Cli {
    /// Create an Intel-hex file (plus a .crc sidecar)
    #[arg(long)]
    ihex: bool,
    /// Create C header and source files
    #[arg(long)]
    csrc: bool,
    /// Create a GNU linker script include
    #[arg(long)]
    gld: bool,
    /// Create a pyHexDump configuration file
    #[arg(long)]
    pyhexdump: bool,
    /// Output directory for generated files
    #[arg(short = 'o', long = "destdir", value_name = "DIR", default_value = ".")]
    destdir: PathBuf,
    /// Basename of generated files (default: manifest file stem)
    #[arg(short = 'f', long = "filename", value_name = "BASENAME")]
    filename: Option<String>,
    /// Modify a parameter value
    #[arg(short = 'm', long = "modify", value_name = "NAME=VALUE")]
    modify: Vec<String>,
    /// Increase logging level
    #[arg(short, long)]
    verbose: bool,
    /// Manifest file, or - for standard input
    file: PathBuf,
}

/// Process exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok = 0,
    FileNotFound = 1,
    InvalidFormat = 2,
    ValidationFail = 3,
    WriteFail = 4,
    InvalidOption = 5,
}

impl From<Status> for ExitCode {
    fn from(status: Status) -> Self {
        ExitCode::from(status as u8)
    }
}

/// Basename used for manifests read from standard input.
const STDIN_BASENAME: &str = "stdin";

/// Splice the contents of `@file` arguments into the argument list, recursively.
fn expand_args<I>(args: I, depth: usize) -> io::Result<Vec<OsString>>
where
    I: IntoIterator<Item = OsString>,
{
    let mut out = Vec::new();
    for arg in args {
        let Some(path) = arg.to_str().and_then(|a| a.strip_prefix('@')) else {
            out.push(arg);
            continue;
        };
        if depth >= 8 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("@{}: argument files nested too deeply", path),
            ));
        }
        let text = std::fs::read_to_string(path)
            .map_err(|e| io::Error::new(e.kind(), format!("@{}: {}", path, e)))?;
        let nested = text.split_whitespace().map(OsString::from);
        out.extend(expand_args(nested, depth + 1)?);
    }
    Ok(out)
}

fn main() -> ExitCode {
    let args = match expand_args(std::env::args_os(), 0) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            return Status::InvalidOption.into();
        }
    };
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                Status::InvalidOption.into()
            } else {
                Status::Ok.into()
            };
        }
    };

    let level = if cli.verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    run(&cli).into()
}

fn run(cli: &Cli) -> Status {
    let from_stdin = cli.file.as_os_str() == "-";
    let input = if from_stdin {
        "<stdin>".to_string()
    } else {
        cli.file.display().to_string()
    };
    if !from_stdin && !cli.file.is_file() {
        log::error!("file not found: {}", input);
        return Status::FileNotFound;
    }

    let mut overrides = Vec::with_capacity(cli.modify.len());
    for text in &cli.modify {
        match parse_override(text) {
            Ok(pair) => overrides.push(pair),
            Err(e) => {
                log::error!("invalid --modify option: {}", e);
                return Status::InvalidOption;
            }
        }
    }

    let declaration = match load(&cli.file, from_stdin).and_then(Manifest::into_declaration) {
        Ok(declaration) => declaration,
        Err(ManifestError::Io(e)) => {
            log::error!("{}: {}", input, e);
            return Status::FileNotFound;
        }
        Err(e) => {
            log::error!("{}: {}", input, e);
            return Status::InvalidFormat;
        }
    };

    let mut declaration = declaration;
    for (name, value) in overrides {
        if let Err(e) = declaration.modify(&name, value) {
            log::error!("invalid --modify option: {}", e);
            return Status::InvalidOption;
        }
    }

    let layout = match compile(&declaration) {
        Ok(layout) => layout,
        Err(e) => {
            for diagnostic in &e.diagnostics {
                log::error!("{}", diagnostic);
            }
            eprintln!("{}: {}", input, e);
            return Status::ValidationFail;
        }
    };

    let mut writers: Vec<Box<dyn Writer>> = Vec::new();
    if cli.ihex {
        writers.push(Box::new(IntelHexWriter));
    }
    if cli.csrc {
        writers.push(Box::new(CSourceWriter));
    }
    if cli.gld {
        writers.push(Box::new(GnuLdWriter));
    }
    if cli.pyhexdump {
        writers.push(Box::new(PyHexDumpWriter));
    }
    if writers.is_empty() {
        log::warn!("no output format selected, nothing written");
        return Status::Ok;
    }

    if let Err(e) = std::fs::create_dir_all(&cli.destdir) {
        log::error!("{}: {}", cli.destdir.display(), e);
        return Status::WriteFail;
    }
    let basename = match (&cli.filename, from_stdin) {
        (Some(name), _) => name.clone(),
        (None, true) => STDIN_BASENAME.to_string(),
        (None, false) => cli
            .file
            .file_stem()
            .map_or_else(|| "out".to_string(), |s| s.to_string_lossy().into_owned()),
    };
    let ctx = WriterContext {
        tool: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        input,
        basename,
        destdir: cli.destdir.clone(),
    };

    for writer in &writers {
        match writer.emit(&layout, &ctx) {
            Ok(paths) => {
                for path in paths {
                    eprintln!("wrote {}", path.display());
                }
            }
            Err(e) => {
                log::error!("{} writer failed: {}", writer.name(), e);
                return Status::WriteFail;
            }
        }
    }
    Status::Ok
}

fn load(path: &Path, from_stdin: bool) -> Result<Manifest, ManifestError> {
    if from_stdin {
        log::info!("reading manifest from <stdin>");
        io::read_to_string(io::stdin())?.parse()
    } else {
        Manifest::from_path(path)
    }
}
