//! JSON print configuration for the pyHexDump tool: header structures plus one element
//! per symbol.

use std::io::Write;

use serde_json::{json, Value};

use super::{containers, Writer, WriterContext, WriterError};
use crate::codec::ValueType;
use crate::image::{Symbol, SymbolKind};
use crate::layout::Layout;
use crate::model::{Endianness, ScalarType};

#[derive(Debug, Clone, Copy, Default)]
pub struct PyHexDumpWriter;

impl Writer for PyHexDumpWriter {
    fn name(&self) -> &'static str {
        "pyhexdump"
    }

    fn extension(&self) -> &str {
        "pyhexdump"
    }

    fn write(
        &self,
        layout: &Layout,
        ctx: &WriterContext,
        out: &mut dyn Write,
    ) -> Result<(), WriterError> {
        serde_json::to_writer_pretty(&mut *out, &config(layout, ctx))?;
        writeln!(out)?;
        Ok(())
    }
}

/// Build the configuration document.
#[must_use]
pub fn config(layout: &Layout, ctx: &WriterContext) -> Value {
    let mut elements = Vec::new();
    for (_, blocks) in containers(layout) {
        for block in blocks {
            for symbol in layout.symbols.in_block(&block.name) {
                elements.push(element(symbol));
            }
        }
    }
    json!({
        "_comment_": [
            "Configuration file for pyHexDump, see https://github.com/BlueAndi/pyHexDump",
            format!("GENERATED by {} {}", ctx.tool, ctx.version),
            format!("input: {}", ctx.input),
        ],
        "structures": [
            header_structure(Endianness::Little),
            header_structure(Endianness::Big),
        ],
        "elements": elements,
    })
}

fn suffix(endianness: Endianness) -> &'static str {
    match endianness {
        Endianness::Little => "le",
        Endianness::Big => "be",
    }
}

/// `uint32le`, `float64be`, `int8`, ...
#[must_use]
pub fn data_type(ty: ScalarType, endianness: Endianness) -> String {
    if ty.size() == 1 {
        ty.name().to_string()
    } else {
        format!("{}{}", ty.name(), suffix(endianness))
    }
}

fn header_structure(endianness: Endianness) -> Value {
    let fields = [
        ("id", ScalarType::U16),
        ("major", ScalarType::U16),
        ("minor", ScalarType::U16),
        ("dataver", ScalarType::U16),
        ("reserved", ScalarType::U32),
        ("length", ScalarType::U32),
    ];
    json!({
        "name": format!("pargen_header_{}_t", suffix(endianness)),
        "elements": fields
            .iter()
            .map(|(name, ty)| json!({
                "name": name,
                "dataType": data_type(*ty, endianness),
                "count": 1,
            }))
            .collect::<Vec<_>>(),
    })
}

fn element(symbol: &Symbol) -> Value {
    let (kind, count) = match symbol.kind {
        SymbolKind::Header => (format!("pargen_header_{}_t", suffix(symbol.endianness)), 1),
        SymbolKind::Crc(t) => (data_type(t, symbol.endianness), 1),
        SymbolKind::Parameter(ValueType::Utf8(n)) => ("utf8".to_string(), n),
        SymbolKind::Parameter(ty @ (ValueType::Scalar(t) | ValueType::Array(t, _))) => {
            (data_type(t, symbol.endianness), ty.count())
        }
    };
    json!({
        "name": symbol.name,
        "addr": format!("{:#x}", symbol.address),
        "dataType": kind,
        "count": count,
    })
}
