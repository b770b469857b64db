//! Errors produced while resolving and assembling a declaration.
//!
//! Every [`LayoutError`] falls into one of three classes ([`ErrorKind`]). Failures are
//! collected per block as [`Diagnostic`]s and returned together in a [`CompileError`].

use std::fmt;

use thiserror::Error;

use crate::codec::CodecError;

/// Error class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Overlap, overflow, misalignment, malformed checksum range or access width.
    Structural,
    /// A literal does not fit its declared type.
    ValueRange,
    /// Duplicate names or checksum ranges pointing somewhere they may not.
    Reference,
}

/// A single layout failure, naming the element and the address involved.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LayoutError {
    #[error("'{element}' @ 0x{start:X}..0x{end:X} overlaps '{other}'")]
    Overlap {
        element: String,
        other: String,
        start: u32,
        end: u32,
    },
    #[error("'{element}' @ 0x{address:X} ({size} bytes) exceeds the end of its block at 0x{limit:X}")]
    Overflow {
        element: String,
        address: u32,
        size: u32,
        limit: u32,
    },
    #[error("'{element}' @ 0x{address:X} is not aligned to {align} bytes")]
    Misaligned {
        element: String,
        address: u32,
        align: u32,
    },
    #[error("'{element}' alignment {align} must be a power of two in 1..=16384")]
    InvalidAlignment { element: String, align: u32 },
    #[error("'{element}' address does not fit into 32 bits")]
    AddressOverflow { element: String },
    #[error("block '{block}' @ 0x{start:X}..0x{end:X} overlaps block '{other}'")]
    BlockOverlap {
        block: String,
        other: String,
        start: u32,
        end: u32,
    },
    #[error("checksum '{element}' range 0x{from:X}..=0x{to:X} is malformed: from > to")]
    MalformedRange { element: String, from: u32, to: u32 },
    #[error("checksum '{element}' access width {access} is not one of 8, 16, 32, 64")]
    InvalidAccess { element: String, access: u32 },
    #[error("checksum '{element}' range length {len} is not a multiple of the {access}-bit access width")]
    MisalignedAccess {
        element: String,
        access: u32,
        len: u32,
    },
    #[error("checksum '{element}': {reason}")]
    MalformedChecksum { element: String, reason: String },
    #[error("'{element}' @ 0x{address:X}: {len} bytes do not fit the block image")]
    ImageWrite {
        element: String,
        address: u32,
        len: usize,
    },

    #[error("'{element}' ({ty}): {source}")]
    ValueRange {
        element: String,
        ty: String,
        #[source]
        source: CodecError,
    },

    #[error("name '{name}' already defined @ 0x{first:X}")]
    DuplicateName { name: String, first: u32 },
    #[error("checksum '{element}' range 0x{from:X}..=0x{to:X} leaves its block 0x{start:X}..0x{end:X}")]
    RangeOutsideBlock {
        element: String,
        from: u32,
        to: u32,
        start: u32,
        end: u32,
    },
    #[error("checksum '{element}' @ 0x{address:X}: '.' has no byte before the element")]
    InvalidSelfReference { element: String, address: u32 },
    /// Rejected rather than checksumming the not-yet-written placeholder bytes.
    #[error("checksum '{element}' range covers its own bytes @ 0x{address:X} (not allowed: a checksum cannot include itself, end the range with '.')")]
    SelfCoverage { element: String, address: u32 },
    /// Rejected for the same reason: the later value is unknown when this one is computed.
    #[error("checksum '{element}' range covers checksum '{other}' @ 0x{address:X}, which is computed later (not allowed: only earlier checksums may be covered)")]
    LaterChecksum {
        element: String,
        other: String,
        address: u32,
    },
    #[error("'{element}' is a checksum, its value cannot be set")]
    ComputedValue { element: String },
}

impl LayoutError {
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            LayoutError::Overlap { .. }
            | LayoutError::Overflow { .. }
            | LayoutError::Misaligned { .. }
            | LayoutError::InvalidAlignment { .. }
            | LayoutError::AddressOverflow { .. }
            | LayoutError::BlockOverlap { .. }
            | LayoutError::MalformedRange { .. }
            | LayoutError::InvalidAccess { .. }
            | LayoutError::MisalignedAccess { .. }
            | LayoutError::MalformedChecksum { .. }
            | LayoutError::ImageWrite { .. } => ErrorKind::Structural,
            LayoutError::ValueRange { .. } => ErrorKind::ValueRange,
            LayoutError::DuplicateName { .. }
            | LayoutError::RangeOutsideBlock { .. }
            | LayoutError::InvalidSelfReference { .. }
            | LayoutError::SelfCoverage { .. }
            | LayoutError::LaterChecksum { .. }
            | LayoutError::ComputedValue { .. } => ErrorKind::Reference,
        }
    }
}

/// A [`LayoutError`] together with the container and block it belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub container: String,
    /// `None` for container-level failures such as duplicate block names.
    pub block: Option<String>,
    pub error: LayoutError,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.block {
            Some(block) => write!(f, "{}:{}: {}", self.container, block, self.error),
            None => write!(f, "{}: {}", self.container, self.error),
        }
    }
}

/// Every diagnostic of a rejected compilation. No image is produced alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompileError {
    pub diagnostics: Vec<Diagnostic>,
}

impl CompileError {
    /// Diagnostics of a given class.
    pub fn of_kind(&self, kind: ErrorKind) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics
            .iter()
            .filter(move |d| d.error.kind() == kind)
    }
}

impl fmt::Display for CompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "layout failed with {} error(s)", self.diagnostics.len())?;
        for diag in &self.diagnostics {
            write!(f, "\n  {}", diag)?;
        }
        Ok(())
    }
}

impl std::error::Error for CompileError {}
