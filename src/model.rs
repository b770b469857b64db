//! Declaration tree: containers, blocks and the elements placed inside them.
//!
//! This is the input of the layout engine. It is usually produced by
//! [`crate::manifest::Manifest`] but can be built directly in code.

use std::fmt;
use std::str::FromStr;

use crate::crc::CrcConfig;
use crate::error::LayoutError;
use crate::format::BlockHeader;

/// Byte order used when encoding multi-byte values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Endianness {
    #[default]
    Little,
    Big,
}

impl Endianness {
    /// Short manifest spelling ("LE" / "BE").
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Endianness::Little => "LE",
            Endianness::Big => "BE",
        }
    }
}

impl FromStr for Endianness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "LE" | "LITTLE" => Ok(Endianness::Little),
            "BE" | "BIG" => Ok(Endianness::Big),
            _ => Err(format!("endianness must be LE or BE, got: {}", s)),
        }
    }
}

/// Placement of a block inside its container or of an element inside its block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offset {
    /// Relative to the parent's start address.
    Explicit(u32),
    /// First suitably aligned address after the previous sibling (`"."`).
    NextFree,
}

/// Upper bound of a checksum range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    /// Block-relative offset of the last byte covered (inclusive).
    Explicit(u32),
    /// The byte immediately preceding the checksum element itself (`"."`).
    EndOfRange,
}

/// Fixed-width scalar types a parameter can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScalarType {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F32,
    F64,
}

impl ScalarType {
    /// Encoded size in bytes.
    #[must_use]
    pub fn size(self) -> usize {
        match self {
            ScalarType::U8 | ScalarType::I8 => 1,
            ScalarType::U16 | ScalarType::I16 => 2,
            ScalarType::U32 | ScalarType::I32 | ScalarType::F32 => 4,
            ScalarType::U64 | ScalarType::I64 | ScalarType::F64 => 8,
        }
    }

    #[must_use]
    pub fn bits(self) -> u32 {
        self.size() as u32 * 8
    }

    #[must_use]
    pub fn is_signed(self) -> bool {
        matches!(
            self,
            ScalarType::I8 | ScalarType::I16 | ScalarType::I32 | ScalarType::I64
        )
    }

    #[must_use]
    pub fn is_float(self) -> bool {
        matches!(self, ScalarType::F32 | ScalarType::F64)
    }

    #[must_use]
    pub fn is_integer(self) -> bool {
        !self.is_float()
    }

    /// Manifest spelling, e.g. `uint32`.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            ScalarType::U8 => "uint8",
            ScalarType::U16 => "uint16",
            ScalarType::U32 => "uint32",
            ScalarType::U64 => "uint64",
            ScalarType::I8 => "int8",
            ScalarType::I16 => "int16",
            ScalarType::I32 => "int32",
            ScalarType::I64 => "int64",
            ScalarType::F32 => "float32",
            ScalarType::F64 => "float64",
        }
    }

    /// C type used by the source generator.
    #[must_use]
    pub fn c_type(self) -> &'static str {
        match self {
            ScalarType::U8 => "uint8_t",
            ScalarType::U16 => "uint16_t",
            ScalarType::U32 => "uint32_t",
            ScalarType::U64 => "uint64_t",
            ScalarType::I8 => "int8_t",
            ScalarType::I16 => "int16_t",
            ScalarType::I32 => "int32_t",
            ScalarType::I64 => "int64_t",
            ScalarType::F32 => "float",
            ScalarType::F64 => "double",
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ScalarType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "uint8" => ScalarType::U8,
            "uint16" => ScalarType::U16,
            "uint32" => ScalarType::U32,
            "uint64" => ScalarType::U64,
            "int8" => ScalarType::I8,
            "int16" => ScalarType::I16,
            "int32" => ScalarType::I32,
            "int64" => ScalarType::I64,
            "float32" => ScalarType::F32,
            "float64" => ScalarType::F64,
            _ => return Err(format!("unknown scalar type: {}", s)),
        })
    }
}

/// Declared parameter type as written in the declaration.
///
/// A [`TypeDecl::Scalar`] given an array literal becomes an array whose length is taken
/// from the literal; see [`crate::codec::value_type`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeDecl {
    Scalar(ScalarType),
    /// `T[N]`
    Array(ScalarType, usize),
    /// `utf8` (NUL terminated, sized by the literal) or `utf8[N]` (exactly N bytes).
    Utf8(Option<usize>),
}

impl fmt::Display for TypeDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeDecl::Scalar(t) => write!(f, "{}", t),
            TypeDecl::Array(t, n) => write!(f, "{}[{}]", t, n),
            TypeDecl::Utf8(None) => f.write_str("utf8"),
            TypeDecl::Utf8(Some(n)) => write!(f, "utf8[{}]", n),
        }
    }
}

impl FromStr for TypeDecl {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (base, count) = match s.find('[') {
            Some(open) => {
                let inner = s[open + 1..]
                    .strip_suffix(']')
                    .ok_or_else(|| format!("unterminated array type: {}", s))?;
                let n: usize = inner
                    .trim()
                    .parse()
                    .map_err(|_| format!("invalid array length in type: {}", s))?;
                if n == 0 {
                    return Err(format!("array length must be at least 1: {}", s));
                }
                (&s[..open], Some(n))
            }
            None => (s, None),
        };
        if base.trim().eq_ignore_ascii_case("utf8") {
            return Ok(TypeDecl::Utf8(count));
        }
        let scalar: ScalarType = base.parse()?;
        Ok(match count {
            Some(n) => TypeDecl::Array(scalar, n),
            None => TypeDecl::Scalar(scalar),
        })
    }
}

/// A literal value before encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i128),
    Float(f64),
    Str(String),
    Array(Vec<Literal>),
}

impl fmt::Display for Literal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Literal::Int(v) => write!(f, "{}", v),
            Literal::Float(v) => write!(f, "{}", v),
            Literal::Str(s) => write!(f, "{:?}", s),
            Literal::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                f.write_str("]")
            }
        }
    }
}

/// Memory range and read mode of a checksum element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrcRange {
    /// Block-relative offset of the first covered byte.
    pub from: u32,
    pub to: RangeEnd,
    /// Read width in bits (8, 16, 32 or 64).
    pub access: u32,
    /// Reverse the bytes of every `access`-bit word before feeding the CRC.
    pub swap: bool,
}

impl Default for CrcRange {
    fn default() -> Self {
        Self {
            from: 0,
            to: RangeEnd::EndOfRange,
            access: 8,
            swap: false,
        }
    }
}

/// A literal-valued element.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub offset: Offset,
    pub ty: TypeDecl,
    pub align: u32,
    pub value: Literal,
    /// Overrides the block's byte order for this parameter only.
    pub endianness: Option<Endianness>,
    pub comment: Option<String>,
}

/// A checksum element whose value is computed from already placed bytes.
#[derive(Debug, Clone, PartialEq)]
pub struct CrcElement {
    pub name: String,
    pub offset: Offset,
    /// Integer type holding the result; its width is the CRC width.
    pub ty: ScalarType,
    pub align: u32,
    pub range: CrcRange,
    pub config: CrcConfig,
    pub comment: Option<String>,
}

/// An occupant of a block.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Parameter(Parameter),
    Crc(CrcElement),
}

impl Element {
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Element::Parameter(p) => &p.name,
            Element::Crc(c) => &c.name,
        }
    }

    #[must_use]
    pub fn offset(&self) -> Offset {
        match self {
            Element::Parameter(p) => p.offset,
            Element::Crc(c) => c.offset,
        }
    }

    #[must_use]
    pub fn align(&self) -> u32 {
        match self {
            Element::Parameter(p) => p.align,
            Element::Crc(c) => c.align,
        }
    }

    #[must_use]
    pub fn comment(&self) -> Option<&str> {
        match self {
            Element::Parameter(p) => p.comment.as_deref(),
            Element::Crc(c) => c.comment.as_deref(),
        }
    }

    #[must_use]
    pub fn is_crc(&self) -> bool {
        matches!(self, Element::Crc(_))
    }
}

/// A length-bounded memory region holding an optional header and its elements.
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub name: String,
    pub offset: Offset,
    pub length: u32,
    pub align: u32,
    pub fill: u8,
    pub endianness: Endianness,
    pub header: Option<BlockHeader>,
    pub comment: Option<String>,
    pub elements: Vec<Element>,
}

impl Block {
    /// A block with default alignment, fill and byte order and no elements.
    #[must_use]
    pub fn new(name: impl Into<String>, offset: Offset, length: u32) -> Self {
        Self {
            name: name.into(),
            offset,
            length,
            align: 1,
            fill: 0,
            endianness: Endianness::Little,
            header: None,
            comment: None,
            elements: Vec::new(),
        }
    }
}

/// Top-level grouping of blocks anchored at an absolute address.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    pub name: String,
    pub at: u32,
    pub blocks: Vec<Block>,
}

/// The whole input of one compilation run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Declaration {
    pub name: String,
    pub containers: Vec<Container>,
}

impl Declaration {
    /// Replace the literal of every parameter called `name` (or `block.name`).
    ///
    /// Returns the number of parameters changed. The caller recompiles afterwards; the
    /// previous image is never patched.
    pub fn modify(&mut self, name: &str, value: Literal) -> Result<usize, LayoutError> {
        let (block_filter, element_name) = match name.split_once('.') {
            Some((b, e)) => (Some(b), e),
            None => (None, name),
        };

        let mut changed = 0;
        for block in self.containers.iter_mut().flat_map(|c| c.blocks.iter_mut()) {
            if block_filter.is_some_and(|b| b != block.name) {
                continue;
            }
            for element in &mut block.elements {
                match element {
                    Element::Parameter(p) if p.name == element_name => {
                        p.value = value.clone();
                        changed += 1;
                    }
                    Element::Crc(c) if c.name == element_name => {
                        return Err(LayoutError::ComputedValue {
                            element: c.name.clone(),
                        });
                    }
                    _ => {}
                }
            }
        }

        if changed == 0 {
            log::warn!("unable to modify parameter '{}': name is not defined", name);
        }
        Ok(changed)
    }
}
