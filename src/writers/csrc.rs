//! C header and source: `extern volatile const` declarations in the `.h`, definitions
//! with initializers decoded from the image in the `.c`.

use std::io::Write;
use std::path::PathBuf;

use super::{banner, containers, write_file, Writer, WriterContext, WriterError};
use crate::codec::{self, ValueType};
use crate::format::HEADER_SUFFIX;
use crate::image::{Symbol, SymbolKind};
use crate::layout::{BlockInfo, Layout};
use crate::model::Literal;

/// Initializer values per line in multi-element initializers.
const VALUES_PER_LINE: usize = 4;

const HEADER_TYPEDEF: &str = "typedef struct struct_pargen_header_type
{
    uint16_t id;
    uint16_t major;
    uint16_t minor;
    uint16_t dataver;
    uint32_t reserved;
    uint32_t length;
} pargen_header_type_t;
";

#[derive(Debug, Clone, Copy, Default)]
pub struct CSourceWriter;

impl CSourceWriter {
    /// Write the `.h` companion of [`Writer::write`].
    pub fn write_header(
        &self,
        layout: &Layout,
        ctx: &WriterContext,
        out: &mut dyn Write,
    ) -> Result<(), WriterError> {
        let guard = include_guard(&ctx.basename);
        out.write_all(banner(ctx, &[]).as_bytes())?;
        write!(
            out,
            "#ifndef {guard}\n#define {guard}\n\n#ifdef __cplusplus\nextern \"C\" {{\n#endif\n\n#include <stdint.h>\n\n{}\n",
            HEADER_TYPEDEF
        )?;
        write_blocks(layout, out, Unit::Header)?;
        writeln!(out, "#ifdef __cplusplus\n}}\n#endif\n#endif /* {} */", guard)?;
        Ok(())
    }
}

impl Writer for CSourceWriter {
    fn name(&self) -> &'static str {
        "c-source"
    }

    fn extension(&self) -> &str {
        "c"
    }

    fn write(
        &self,
        layout: &Layout,
        ctx: &WriterContext,
        out: &mut dyn Write,
    ) -> Result<(), WriterError> {
        out.write_all(banner(ctx, &[]).as_bytes())?;
        writeln!(out, "#include \"{}\"\n", ctx.file_name("h"))?;
        write_blocks(layout, out, Unit::Source)
    }

    fn emit(&self, layout: &Layout, ctx: &WriterContext) -> Result<Vec<PathBuf>, WriterError> {
        let header = ctx.path("h");
        write_file(&header, |out| self.write_header(layout, ctx, out))?;
        let source = ctx.path(self.extension());
        write_file(&source, |out| self.write(layout, ctx, out))?;
        Ok(vec![header, source])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Unit {
    Header,
    Source,
}

fn include_guard(basename: &str) -> String {
    let name: String = basename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("PARGEN_{}_H_INCLUDED", name)
}

fn write_blocks(layout: &Layout, out: &mut dyn Write, unit: Unit) -> Result<(), WriterError> {
    for (container, blocks) in containers(layout) {
        for block in blocks {
            write_block(layout, container, block, out, unit)?;
        }
    }
    Ok(())
}

fn write_comment(out: &mut dyn Write, comment: Option<&str>) -> Result<(), WriterError> {
    if let Some(comment) = comment {
        writeln!(out, " *")?;
        for line in comment.lines() {
            writeln!(out, " * {}", line)?;
        }
    }
    writeln!(out, " */")?;
    Ok(())
}

fn write_block(
    layout: &Layout,
    container: &str,
    block: &BlockInfo,
    out: &mut dyn Write,
    unit: Unit,
) -> Result<(), WriterError> {
    writeln!(
        out,
        "/* BEGIN Block {} in container {} @ {:#x}",
        block.name, container, block.address
    )?;
    write_comment(out, block.comment.as_deref())?;

    if let Some(header) = &block.header {
        let name = format!("{}_{}", block.name, HEADER_SUFFIX);
        match unit {
            Unit::Header => writeln!(out, "extern volatile const pargen_header_type_t {};\n", name)?,
            Unit::Source => writeln!(
                out,
                "volatile const pargen_header_type_t {} =\n{{\n    0x{:04X},\n    0x{:04X},\n    0x{:04X},\n    0x{:04X},\n    0x00000000,\n    0x{:08X}\n}};\n",
                name, header.id, header.major, header.minor, header.dataver, block.length
            )?,
        }
    }

    for symbol in layout.symbols.in_block(&block.name) {
        let ty = match symbol.kind {
            SymbolKind::Header => continue,
            SymbolKind::Parameter(ty) => ty,
            SymbolKind::Crc(t) => ValueType::Scalar(t),
        };
        writeln!(out, "/* Parameter {} @ {:#x}", symbol.name, symbol.address)?;
        write_comment(out, symbol.comment.as_deref())?;

        let declaration = declaration(symbol, &ty);
        match unit {
            Unit::Header => writeln!(out, "extern {};\n", declaration)?,
            Unit::Source => {
                let bytes = layout
                    .symbol_bytes(symbol)
                    .ok_or_else(|| WriterError::MissingBytes(symbol.name.clone()))?;
                let value = codec::decode(&ty, bytes, symbol.endianness).map_err(|source| {
                    WriterError::Decode {
                        symbol: symbol.name.clone(),
                        source,
                    }
                })?;
                writeln!(out, "{} = {};\n", declaration, initializer(&value, bytes))?;
            }
        }
    }

    writeln!(out, "/* END Block {}\n */\n", block.name)?;
    Ok(())
}

fn declaration(symbol: &Symbol, ty: &ValueType) -> String {
    match *ty {
        ValueType::Scalar(t) => format!("volatile const {} {}", t.c_type(), symbol.name),
        ValueType::Array(t, n) => format!("volatile const {} {}[{}]", t.c_type(), symbol.name, n),
        ValueType::Utf8(n) => format!("volatile const char {}[{}]", symbol.name, n),
    }
}

fn initializer(value: &Literal, raw: &[u8]) -> String {
    match value {
        Literal::Array(items) => {
            let mut text = String::from("\n{\n    ");
            for (i, item) in items.iter().enumerate() {
                text.push_str(&scalar(item));
                if i + 1 < items.len() {
                    text.push_str(", ");
                    if i % VALUES_PER_LINE == VALUES_PER_LINE - 1 {
                        text.push_str("\n    ");
                    }
                }
            }
            text.push_str("\n}");
            text
        }
        Literal::Str(_) => c_string(raw),
        other => scalar(other),
    }
}

fn scalar(value: &Literal) -> String {
    match value {
        Literal::Int(v) if *v < 0 => v.to_string(),
        Literal::Int(v) => format!("0x{:X}", v),
        Literal::Float(v) => format!("{:.8}", v),
        other => other.to_string(),
    }
}

/// C string literal of the bytes before the NUL padding.
fn c_string(raw: &[u8]) -> String {
    let end = raw.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    let mut text = String::from("\"");
    for &b in &raw[..end] {
        match b {
            b'"' => text.push_str("\\\""),
            b'\\' => text.push_str("\\\\"),
            0x20..=0x7E => text.push(char::from(b)),
            _ => text.push_str(&format!("\\{:03o}", b)),
        }
    }
    text.push('"');
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_c_string_escapes() {
        assert_eq!(c_string(b"a\"b\0\0"), "\"a\\\"b\"");
        assert_eq!(c_string("é".as_bytes()), "\"\\303\\251\"");
    }

    #[test]
    fn test_include_guard() {
        assert_eq!(include_guard("my-params"), "PARGEN_MY_PARAMS_H_INCLUDED");
    }
}
