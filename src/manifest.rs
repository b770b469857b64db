//! TOML declaration manifest: deserialization and lowering into [`crate::model`].
//!
//! ```toml
//! name = "example"
//!
//! [[container]]
//! name = "flash"
//! at = 0x8000_0000
//!
//! [[container.block]]
//! name = "params"
//! offset = "."
//! length = 0x200
//! fill = 0xAA
//! header = { id = 0xFF01, major = 1, minor = 0, version = 3 }
//!
//! [[container.block.data]]
//! kind = "param"
//! name = "coeffs"
//! offset = 0x10
//! type = "float32[2]"
//! value = [1.0, -2.1]
//!
//! [[container.block.data]]
//! kind = "crc"
//! name = "crc"
//! offset = 0x1FC
//! type = "uint32"
//! memory = { from = 0, to = "." }
//! ```

use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;
use thiserror::Error;

use crate::codec::parse_int;
use crate::crc::CrcConfig;
use crate::format::BlockHeader;
use crate::model::{
    Block, Container, CrcElement, CrcRange, Declaration, Element, Endianness, Literal, Offset,
    Parameter, RangeEnd, ScalarType, TypeDecl,
};

/// Errors produced while loading a manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{context}: {reason}")]
    Invalid { context: String, reason: String },
}

fn invalid(context: impl Into<String>, reason: impl Into<String>) -> ManifestError {
    ManifestError::Invalid {
        context: context.into(),
        reason: reason.into(),
    }
}

/// Integer written as a TOML number or as a decimal/hex string; `"."` where placeholders
/// are allowed.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Number {
    Int(i64),
    Text(String),
}

impl Number {
    fn is_dot(&self) -> bool {
        matches!(self, Number::Text(s) if s.trim() == ".")
    }

    fn value(&self, context: &str) -> Result<i128, ManifestError> {
        match self {
            Number::Int(v) => Ok(i128::from(*v)),
            Number::Text(s) => {
                parse_int(s).ok_or_else(|| invalid(context, format!("not a number: {:?}", s)))
            }
        }
    }

    fn to<T: TryFrom<i128>>(&self, context: &str) -> Result<T, ManifestError> {
        let v = self.value(context)?;
        T::try_from(v).map_err(|_| invalid(context, format!("value {} out of range", v)))
    }

    fn offset(&self, context: &str) -> Result<Offset, ManifestError> {
        if self.is_dot() {
            return Ok(Offset::NextFree);
        }
        Ok(Offset::Explicit(self.to(context)?))
    }

    fn range_end(&self, context: &str) -> Result<RangeEnd, ManifestError> {
        if self.is_dot() {
            return Ok(RangeEnd::EndOfRange);
        }
        Ok(RangeEnd::Explicit(self.to(context)?))
    }
}

fn next_free() -> Number {
    Number::Text(".".to_string())
}

/// Top-level manifest document.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "container")]
    pub containers: Vec<ContainerDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContainerDecl {
    pub name: String,
    pub at: Number,
    #[serde(default, rename = "block")]
    pub blocks: Vec<BlockDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlockDecl {
    pub name: String,
    #[serde(default = "next_free")]
    pub offset: Number,
    pub length: Number,
    pub align: Option<Number>,
    pub fill: Option<Number>,
    pub endianness: Option<String>,
    pub header: Option<HeaderDecl>,
    pub comment: Option<String>,
    #[serde(default)]
    pub data: Vec<ElementDecl>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HeaderDecl {
    pub id: Number,
    pub major: Number,
    pub minor: Number,
    pub version: Number,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ElementDecl {
    Param(ParamDecl),
    Crc(CrcDecl),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamDecl {
    pub name: String,
    #[serde(default = "next_free")]
    pub offset: Number,
    #[serde(rename = "type")]
    pub ty: String,
    pub align: Option<Number>,
    pub value: toml::Value,
    pub endianness: Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrcDecl {
    pub name: String,
    #[serde(default = "next_free")]
    pub offset: Number,
    #[serde(rename = "type")]
    pub ty: String,
    pub align: Option<Number>,
    pub memory: Option<MemoryDecl>,
    pub config: Option<CrcConfigDecl>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MemoryDecl {
    pub from: Option<Number>,
    pub to: Option<Number>,
    pub access: Option<Number>,
    pub swap: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CrcConfigDecl {
    pub polynomial: Option<Number>,
    pub init: Option<Number>,
    pub rev_in: Option<bool>,
    pub rev_out: Option<bool>,
    pub final_xor: Option<bool>,
}

impl FromStr for Manifest {
    type Err = ManifestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(toml::from_str(s)?)
    }
}

impl Manifest {
    /// Read and parse a manifest file.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, ManifestError> {
        let text = std::fs::read_to_string(path)?;
        text.parse()
    }

    /// Lower the manifest into a declaration tree.
    pub fn into_declaration(self) -> Result<Declaration, ManifestError> {
        let containers = self
            .containers
            .into_iter()
            .map(ContainerDecl::lower)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Declaration {
            name: self.name,
            containers,
        })
    }
}

impl ContainerDecl {
    fn lower(self) -> Result<Container, ManifestError> {
        log::info!("loading container definition for {}", self.name);
        let at = self.at.to(&format!("container {}: at", self.name))?;
        let blocks = self
            .blocks
            .into_iter()
            .map(BlockDecl::lower)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Container {
            name: self.name,
            at,
            blocks,
        })
    }
}

fn endianness(value: Option<&str>, context: &str) -> Result<Option<Endianness>, ManifestError> {
    value
        .map(|s| s.parse().map_err(|e: String| invalid(context, e)))
        .transpose()
}

fn alignment(value: Option<&Number>, context: &str) -> Result<u32, ManifestError> {
    value.map_or(Ok(1), |n| n.to(context))
}

impl BlockDecl {
    fn lower(self) -> Result<Block, ManifestError> {
        let ctx = format!("block {}", self.name);
        let header = self
            .header
            .map(|h| -> Result<BlockHeader, ManifestError> {
                Ok(BlockHeader {
                    id: h.id.to(&format!("{}: header id", ctx))?,
                    major: h.major.to(&format!("{}: header major", ctx))?,
                    minor: h.minor.to(&format!("{}: header minor", ctx))?,
                    dataver: h.version.to(&format!("{}: header version", ctx))?,
                })
            })
            .transpose()?;
        let elements = self
            .data
            .into_iter()
            .map(|e| e.lower(&ctx))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Block {
            offset: self.offset.offset(&format!("{}: offset", ctx))?,
            length: self.length.to(&format!("{}: length", ctx))?,
            align: alignment(self.align.as_ref(), &format!("{}: align", ctx))?,
            fill: self
                .fill
                .as_ref()
                .map_or(Ok(0), |f| f.to(&format!("{}: fill", ctx)))?,
            endianness: endianness(self.endianness.as_deref(), &ctx)?.unwrap_or_default(),
            header,
            comment: self.comment,
            elements,
            name: self.name,
        })
    }
}

impl ElementDecl {
    fn lower(self, block_ctx: &str) -> Result<Element, ManifestError> {
        match self {
            ElementDecl::Param(p) => {
                let ctx = format!("{}: parameter {}", block_ctx, p.name);
                let ty: TypeDecl = p.ty.parse().map_err(|e: String| invalid(&ctx, e))?;
                let value = literal(&p.value).map_err(|e| invalid(&ctx, e))?;
                Ok(Element::Parameter(Parameter {
                    offset: p.offset.offset(&ctx)?,
                    align: alignment(p.align.as_ref(), &ctx)?,
                    endianness: endianness(p.endianness.as_deref(), &ctx)?,
                    ty,
                    value,
                    comment: p.comment,
                    name: p.name,
                }))
            }
            ElementDecl::Crc(c) => {
                let ctx = format!("{}: crc {}", block_ctx, c.name);
                let ty: ScalarType = c.ty.parse().map_err(|e: String| invalid(&ctx, e))?;
                let memory = c.memory.unwrap_or_default();
                let defaults = CrcRange::default();
                let range = CrcRange {
                    from: memory.from.as_ref().map_or(Ok(defaults.from), |n| n.to(&ctx))?,
                    to: memory
                        .to
                        .as_ref()
                        .map_or(Ok(defaults.to), |n| n.range_end(&ctx))?,
                    access: memory
                        .access
                        .as_ref()
                        .map_or(Ok(defaults.access), |n| n.to(&ctx))?,
                    swap: memory.swap.unwrap_or(defaults.swap),
                };
                let cfg = c.config.unwrap_or_default();
                let defaults = CrcConfig::default();
                let config = CrcConfig {
                    polynomial: cfg
                        .polynomial
                        .as_ref()
                        .map_or(Ok(defaults.polynomial), |n| n.to(&ctx))?,
                    init: cfg.init.as_ref().map_or(Ok(defaults.init), |n| n.to(&ctx))?,
                    reflect_in: cfg.rev_in.unwrap_or(defaults.reflect_in),
                    reflect_out: cfg.rev_out.unwrap_or(defaults.reflect_out),
                    final_xor: cfg.final_xor.unwrap_or(defaults.final_xor),
                };
                Ok(Element::Crc(CrcElement {
                    offset: c.offset.offset(&ctx)?,
                    align: alignment(c.align.as_ref(), &ctx)?,
                    ty,
                    range,
                    config,
                    comment: c.comment,
                    name: c.name,
                }))
            }
        }
    }
}

/// Convert a TOML value into a literal.
pub fn literal(value: &toml::Value) -> Result<Literal, String> {
    match value {
        toml::Value::Integer(v) => Ok(Literal::Int(i128::from(*v))),
        toml::Value::Float(v) => Ok(Literal::Float(*v)),
        toml::Value::String(s) => Ok(Literal::Str(s.clone())),
        toml::Value::Boolean(b) => Ok(Literal::Int(i128::from(*b))),
        toml::Value::Array(items) => items
            .iter()
            .map(literal)
            .collect::<Result<Vec<_>, _>>()
            .map(Literal::Array),
        other => Err(format!("unsupported value: {}", other)),
    }
}

/// Parse a `name=value` override. The value is read as a TOML value; text that is not
/// valid TOML is taken as a plain string.
pub fn parse_override(text: &str) -> Result<(String, Literal), ManifestError> {
    let (name, value) = text
        .split_once('=')
        .ok_or_else(|| invalid(text, "expected <name>=<value>"))?;
    let name = name.trim();
    if name.is_empty() {
        return Err(invalid(text, "empty parameter name"));
    }
    let value = value.trim();
    let parsed = toml::from_str::<toml::Table>(&format!("v = {}", value))
        .ok()
        .and_then(|table| table.get("v").cloned());
    let lit = match parsed {
        Some(v) => literal(&v).map_err(|e| invalid(text, e))?,
        None => Literal::Str(value.to_string()),
    };
    Ok((name.to_string(), lit))
}
