//! GNU linker script include: one `name = address;` assignment per symbol.

use std::io::Write;

use super::{banner, containers, Writer, WriterContext, WriterError};
use crate::image::Symbol;
use crate::layout::Layout;

/// Column the `=` of an assignment is padded to.
const NAME_WIDTH: usize = 40;

#[derive(Debug, Clone, Copy, Default)]
pub struct GnuLdWriter;

impl Writer for GnuLdWriter {
    fn name(&self) -> &'static str {
        "gnu-ld"
    }

    fn extension(&self) -> &str {
        "ld"
    }

    fn write(
        &self,
        layout: &Layout,
        ctx: &WriterContext,
        out: &mut dyn Write,
    ) -> Result<(), WriterError> {
        let include = format!(
            "GNU Linker script definitions - include to main script using 'INCLUDE {}'",
            ctx.file_name(self.extension())
        );
        out.write_all(banner(ctx, &[include]).as_bytes())?;

        for (container, blocks) in containers(layout) {
            write!(out, "/* Begin flash container {} */", container)?;
            for block in blocks {
                writeln!(out)?;
                for symbol in layout.symbols.in_block(&block.name) {
                    write_symbol(out, symbol)?;
                }
            }
            writeln!(out, "/* End flash container {} */", container)?;
        }
        Ok(())
    }
}

fn write_symbol(out: &mut dyn Write, symbol: &Symbol) -> Result<(), WriterError> {
    let lines: Vec<&str> = symbol
        .comment
        .as_deref()
        .map(|c| c.lines().collect())
        .unwrap_or_default();

    if lines.len() > 1 {
        writeln!(out, "/*")?;
        for line in &lines {
            writeln!(out, " * {}", line)?;
        }
        writeln!(out, " */")?;
    }

    write!(
        out,
        "{:<width$} = {:#x};",
        symbol.name,
        symbol.address,
        width = NAME_WIDTH
    )?;
    if let [line] = lines.as_slice() {
        write!(out, " /* {} */", line)?;
    }
    writeln!(out)?;
    Ok(())
}
