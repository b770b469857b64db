//! Serializers over a finished [`Layout`].
//!
//! Every writer is a pure function of the image and symbol table; none of them can
//! change the layout.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::codec::CodecError;
use crate::layout::{BlockInfo, Layout};

pub mod csrc;
pub mod gld;
pub mod ihex;
pub mod pyhexdump;

pub use csrc::CSourceWriter;
pub use gld::GnuLdWriter;
pub use ihex::IntelHexWriter;
pub use pyhexdump::PyHexDumpWriter;

/// Errors produced by a writer.
#[derive(Debug, Error)]
pub enum WriterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("symbol {symbol}: {source}")]
    Decode {
        symbol: String,
        #[source]
        source: CodecError,
    },
    #[error("symbol {0} has no bytes in the image")]
    MissingBytes(String),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Run information shared by all writers.
#[derive(Debug, Clone)]
pub struct WriterContext {
    /// Name of the generating tool, shown in banners.
    pub tool: String,
    pub version: String,
    /// Input shown in banners (usually the manifest path).
    pub input: String,
    /// Output file name without extension.
    pub basename: String,
    pub destdir: PathBuf,
}

impl WriterContext {
    /// Output path for the given extension.
    #[must_use]
    pub fn path(&self, extension: &str) -> PathBuf {
        self.destdir.join(format!("{}.{}", self.basename, extension))
    }

    /// File name (without directory) for the given extension.
    #[must_use]
    pub fn file_name(&self, extension: &str) -> String {
        format!("{}.{}", self.basename, extension)
    }
}

/// An output format.
pub trait Writer {
    /// Short name used in log output.
    fn name(&self) -> &'static str;

    /// Extension of the main output file.
    fn extension(&self) -> &str;

    /// Serialize the layout into `out`.
    fn write(
        &self,
        layout: &Layout,
        ctx: &WriterContext,
        out: &mut dyn Write,
    ) -> Result<(), WriterError>;

    /// Write every output file of this format into `ctx.destdir`; returns the paths written.
    fn emit(&self, layout: &Layout, ctx: &WriterContext) -> Result<Vec<PathBuf>, WriterError> {
        let path = ctx.path(self.extension());
        write_file(&path, |out| self.write(layout, ctx, out))?;
        Ok(vec![path])
    }
}

pub(crate) fn write_file<F>(path: &Path, f: F) -> Result<(), WriterError>
where
    F: FnOnce(&mut dyn Write) -> Result<(), WriterError>,
{
    log::info!("writing {}", path.display());
    let mut out = BufWriter::new(File::create(path)?);
    f(&mut out)?;
    out.flush()?;
    Ok(())
}

/// Blocks grouped by container, both in document order.
pub(crate) fn containers(layout: &Layout) -> Vec<(&str, Vec<&BlockInfo>)> {
    let mut groups: Vec<(&str, Vec<&BlockInfo>)> = Vec::new();
    for block in &layout.blocks {
        match groups.last_mut() {
            Some((name, blocks)) if *name == block.container => blocks.push(block),
            _ => groups.push((block.container.as_str(), vec![block])),
        }
    }
    groups
}

/// `/* ... */` banner shared by the text formats.
pub(crate) fn banner(ctx: &WriterContext, extra: &[String]) -> String {
    let mut text = format!("/* AUTOGENERATED by {} {}\n", ctx.tool, ctx.version);
    for line in extra {
        text.push_str(&format!(" * {}\n", line));
    }
    text.push_str(&format!(" * input: {}\n", ctx.input));
    text.push_str(" * !! DO NOT EDIT MANUALLY !!\n */\n\n");
    text
}
