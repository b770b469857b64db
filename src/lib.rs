//! flashblock: generates flash memory images from declarative parameter-block layouts.
//!
//! This crate provides:
//! - **Declaration model** (`model`): containers, blocks, parameters and checksum elements.
//! - **Layout engine** (`layout`): `compile(&Declaration)` resolves addresses, encodes values and
//!   computes checksums into a `MemoryImage` and `SymbolTable`.
//! - **Value codec** (`codec`) and **CRC engine** (`crc`).
//! - **Manifest** (`manifest`, feature `serde`): TOML declarations and `name=value` overrides.
//! - **Writers** (`writers`): Intel-hex, GNU-ld include, C source and pyHexDump configuration.
//! - **Reader** (`reader`): `HexImageReader::open(path)` reads an Intel-hex file back into an image.

pub mod codec;
pub mod crc;
pub mod error;
pub mod format;
pub mod image;
pub mod layout;
#[cfg(feature = "serde")]
pub mod manifest;
pub mod model;
pub mod reader;
pub mod resolve;
pub mod writers;

pub use codec::{CodecError, ValueType};
pub use crc::{Crc, CrcConfig};
pub use error::{CompileError, Diagnostic, ErrorKind, LayoutError};
pub use format::{BlockHeader, HEADER_LEN};
pub use image::{MemoryImage, Symbol, SymbolKind, SymbolTable};
pub use layout::{compile, Assembler, BlockInfo, Layout, Stage};
#[cfg(feature = "serde")]
pub use manifest::{parse_override, Manifest, ManifestError};
pub use model::{
    Block, Container, CrcElement, CrcRange, Declaration, Element, Endianness, Literal, Offset,
    Parameter, RangeEnd, ScalarType, TypeDecl,
};
pub use reader::{HexError, HexImageReader};
pub use writers::{Writer, WriterContext, WriterError};
