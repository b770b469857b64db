//! Layout assembler: resolves addresses, places values and computes checksums.
//!
//! Each block moves through [`Stage`]s in a fixed order:
//!
//! 1. `Empty → AddressesResolved`: every header/element gets its absolute address and size.
//! 2. `AddressesResolved → ValuesPlaced`: the block is filled with its fill byte, then the
//!    header and every parameter are encoded and written.
//! 3. `ValuesPlaced → ChecksummedComplete`: checksum elements are computed in document
//!    order over the bytes placed so far and written in turn, so a later checksum sees the
//!    value of an earlier one.
//!
//! A failing block is dropped from the image and its diagnostics collected; other blocks
//! continue. [`compile`] returns the finished [`Layout`] only if no block failed.

use std::collections::HashMap;

use crate::codec;
use crate::crc::{prepare, Crc, ACCESS_WIDTHS};
use crate::error::{CompileError, Diagnostic, LayoutError};
use crate::format::{BlockHeader, HEADER_LEN, HEADER_SUFFIX};
use crate::image::{MemoryImage, Symbol, SymbolKind, SymbolTable};
use crate::model::{Block, Container, CrcElement, Declaration, Element, Endianness, RangeEnd};
use crate::resolve::{self, Placement};

/// Progress of one block through the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Empty,
    AddressesResolved,
    ValuesPlaced,
    ChecksummedComplete,
}

impl Stage {
    /// The stage that follows this one.
    #[must_use]
    pub fn next(self) -> Option<Stage> {
        match self {
            Stage::Empty => Some(Stage::AddressesResolved),
            Stage::AddressesResolved => Some(Stage::ValuesPlaced),
            Stage::ValuesPlaced => Some(Stage::ChecksummedComplete),
            Stage::ChecksummedComplete => None,
        }
    }
}

/// Resolved facts about a block, kept for serializers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockInfo {
    pub container: String,
    /// Base address of the owning container.
    pub container_at: u32,
    pub name: String,
    pub address: u32,
    pub length: u32,
    pub fill: u8,
    pub endianness: Endianness,
    pub header: Option<BlockHeader>,
    pub comment: Option<String>,
}

impl BlockInfo {
    /// Exclusive end address.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.length)
    }
}

/// Finished, immutable result of a compilation run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layout {
    pub name: String,
    pub image: MemoryImage,
    pub symbols: SymbolTable,
    /// Blocks in document order.
    pub blocks: Vec<BlockInfo>,
}

impl Layout {
    #[must_use]
    pub fn symbol(&self, name: &str) -> Option<&Symbol> {
        self.symbols.get(name)
    }

    /// Image bytes of a symbol.
    #[must_use]
    pub fn symbol_bytes(&self, symbol: &Symbol) -> Option<&[u8]> {
        if symbol.size == 0 {
            return Some(&[]);
        }
        self.image
            .read(symbol.address, symbol.address + (symbol.size - 1))
    }

    /// Blocks of one container, in document order.
    pub fn blocks_in<'a>(&'a self, container: &'a str) -> impl Iterator<Item = &'a BlockInfo> {
        self.blocks.iter().filter(move |b| b.container == container)
    }
}

/// Compile a declaration into a layout. All errors are collected; no partial layout is
/// returned.
pub fn compile(declaration: &Declaration) -> Result<Layout, CompileError> {
    let mut assembler = Assembler::new(&declaration.name);
    for container in &declaration.containers {
        assembler.add_container(container);
    }
    assembler.finish()
}

/// Owns the image, symbol table and diagnostics of one compilation run.
#[derive(Debug)]
pub struct Assembler {
    name: String,
    image: MemoryImage,
    symbols: SymbolTable,
    blocks: Vec<BlockInfo>,
    /// Block name → address of its first definition.
    block_names: HashMap<String, u32>,
    diagnostics: Vec<Diagnostic>,
}

/// Checksum range after validation.
#[derive(Debug, Clone, Copy)]
struct CrcJob {
    /// Position in the block's placement list.
    slot: usize,
    from: u32,
    to: u32,
}

impl Assembler {
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            image: MemoryImage::new(),
            symbols: SymbolTable::new(),
            blocks: Vec::new(),
            block_names: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    /// Resolve and assemble every block of `container`.
    pub fn add_container(&mut self, container: &Container) {
        log::info!(
            "container {} @ 0x{:X} ({} blocks)",
            container.name,
            container.at,
            container.blocks.len()
        );

        let (placed, errors) = resolve::resolve_blocks(container);
        for (index, error) in errors {
            self.report(container, Some(&container.blocks[index]), error);
        }

        for placement in placed {
            let block = &container.blocks[placement.index];
            self.add_block(container, block, placement.address);
        }
    }

    /// Diagnostics collected so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Hand out the layout, or every diagnostic if anything failed.
    pub fn finish(self) -> Result<Layout, CompileError> {
        if !self.diagnostics.is_empty() {
            return Err(CompileError {
                diagnostics: self.diagnostics,
            });
        }
        Ok(Layout {
            name: self.name,
            image: self.image,
            symbols: self.symbols,
            blocks: self.blocks,
        })
    }

    fn report(&mut self, container: &Container, block: Option<&Block>, error: LayoutError) {
        self.diagnostics.push(Diagnostic {
            container: container.name.clone(),
            block: block.map(|b| b.name.clone()),
            error,
        });
    }

    fn add_block(&mut self, container: &Container, block: &Block, address: u32) {
        log::info!(
            "  block {} @ 0x{:X} length 0x{:X}",
            block.name,
            address,
            block.length
        );
        let mut stage = Stage::Empty;
        let mut errors = Vec::new();

        if let Some(&first) = self.block_names.get(&block.name) {
            self.report(
                container,
                Some(block),
                LayoutError::DuplicateName {
                    name: block.name.clone(),
                    first,
                },
            );
            return;
        }
        self.block_names.insert(block.name.clone(), address);

        // Blocks of other containers share the image.
        let end = u64::from(address) + u64::from(block.length);
        if let Some(other) = self
            .blocks
            .iter()
            .find(|b| u64::from(address) < b.end() && u64::from(b.address) < end)
        {
            let error = LayoutError::BlockOverlap {
                block: block.name.clone(),
                other: other.name.clone(),
                start: address,
                end: end.min(u64::from(u32::MAX)) as u32,
            };
            self.report(container, Some(block), error);
            return;
        }

        // 1. addresses
        let (placements, resolve_errors) = resolve::resolve_elements(block, address);
        errors.extend(resolve_errors);
        let crc_jobs = self.check_checksum_ranges(block, address, &placements, &mut errors);
        advance(block, &mut stage, Stage::AddressesResolved);

        // 2. values
        let mut symbols = Vec::with_capacity(placements.len() + 1);
        if !self.image.fill(address, block.length, block.fill) {
            errors.push(LayoutError::ImageWrite {
                element: block.name.clone(),
                address,
                len: block.length as usize,
            });
            for error in errors {
                self.report(container, Some(block), error);
            }
            return;
        }
        if let Some(header) = &block.header {
            if block.length >= HEADER_LEN {
                let bytes = header.to_bytes(block.length, block.endianness);
                place(&mut self.image, &block.name, address, &bytes, &mut errors);
                symbols.push(Symbol {
                    name: format!("{}_{}", block.name, HEADER_SUFFIX),
                    container: container.name.clone(),
                    block: block.name.clone(),
                    element: None,
                    address,
                    size: HEADER_LEN,
                    kind: SymbolKind::Header,
                    endianness: block.endianness,
                    comment: None,
                });
            }
        }
        for placement in &placements {
            let Element::Parameter(param) = &block.elements[placement.index] else {
                continue;
            };
            let SymbolKind::Parameter(ty) = placement.kind else {
                continue;
            };
            let endianness = param.endianness.unwrap_or(block.endianness);
            match codec::encode(&ty, &param.value, endianness) {
                Ok(bytes) => {
                    place(&mut self.image, &param.name, placement.address, &bytes, &mut errors);
                    symbols.push(self.element_symbol(
                        container,
                        block,
                        placement,
                        endianness,
                    ));
                }
                Err(source) => errors.push(LayoutError::ValueRange {
                    element: param.name.clone(),
                    ty: ty.to_string(),
                    source,
                }),
            }
        }
        advance(block, &mut stage, Stage::ValuesPlaced);

        // 3. checksums, only over a block whose other bytes are all in place
        if errors.is_empty() {
            for job in &crc_jobs {
                let placement = &placements[job.slot];
                let Element::Crc(crc) = &block.elements[placement.index] else {
                    continue;
                };
                match self.compute_checksum(crc, job) {
                    Ok(value) => {
                        log::debug!(
                            "  checksum {} over 0x{:X}..=0x{:X} = 0x{:X}",
                            crc.name,
                            job.from,
                            job.to,
                            value
                        );
                        let bytes = codec::encode_bits(value, crc.ty, block.endianness);
                        place(&mut self.image, &crc.name, placement.address, &bytes, &mut errors);
                        symbols.push(self.element_symbol(
                            container,
                            block,
                            placement,
                            block.endianness,
                        ));
                    }
                    Err(error) => errors.push(error),
                }
            }
        }

        let mut seen: HashMap<&str, u32> = HashMap::new();
        for symbol in &symbols {
            let clash = self
                .symbols
                .get(&symbol.name)
                .map(|s| s.address)
                .or_else(|| seen.get(symbol.name.as_str()).copied());
            match clash {
                Some(first) => errors.push(LayoutError::DuplicateName {
                    name: symbol.name.clone(),
                    first,
                }),
                None => {
                    seen.insert(&symbol.name, symbol.address);
                }
            }
        }

        if !errors.is_empty() {
            if block.length > 0 {
                self.image.discard(address);
            }
            for error in errors {
                self.report(container, Some(block), error);
            }
            return;
        }

        advance(block, &mut stage, Stage::ChecksummedComplete);
        for symbol in symbols {
            // names were checked above
            let _ = self.symbols.insert(symbol);
        }
        self.blocks.push(BlockInfo {
            container: container.name.clone(),
            container_at: container.at,
            name: block.name.clone(),
            address,
            length: block.length,
            fill: block.fill,
            endianness: block.endianness,
            header: block.header,
            comment: block.comment.clone(),
        });
    }

    fn element_symbol(
        &self,
        container: &Container,
        block: &Block,
        placement: &Placement,
        endianness: Endianness,
    ) -> Symbol {
        let element = &block.elements[placement.index];
        Symbol {
            name: format!("{}_{}", block.name, element.name()),
            container: container.name.clone(),
            block: block.name.clone(),
            element: Some(element.name().to_string()),
            address: placement.address,
            size: placement.size,
            kind: placement.kind,
            endianness,
            comment: element.comment().map(str::to_string),
        }
    }

    /// Validate every checksum range against the resolved addresses.
    fn check_checksum_ranges(
        &self,
        block: &Block,
        base: u32,
        placements: &[Placement],
        errors: &mut Vec<LayoutError>,
    ) -> Vec<CrcJob> {
        let mut jobs = Vec::new();
        for (slot, placement) in placements.iter().enumerate() {
            let Element::Crc(crc) = &block.elements[placement.index] else {
                continue;
            };
            match checksum_range(block, base, crc, placement, &placements[slot + 1..]) {
                Ok((from, to)) => jobs.push(CrcJob { slot, from, to }),
                Err(error) => errors.push(error),
            }
        }
        jobs
    }

    fn compute_checksum(&self, crc: &CrcElement, job: &CrcJob) -> Result<u64, LayoutError> {
        let engine =
            Crc::new(crc.ty.bits(), crc.config).map_err(|reason| LayoutError::MalformedChecksum {
                element: crc.name.clone(),
                reason,
            })?;
        let data = self
            .image
            .read(job.from, job.to)
            .ok_or_else(|| LayoutError::MalformedChecksum {
                element: crc.name.clone(),
                reason: format!("range 0x{:X}..=0x{:X} is not in the image", job.from, job.to),
            })?;
        let input = prepare(data, crc.range.access, crc.range.swap);
        Ok(engine.checksum(input))
    }
}

/// Move a block to the next stage. Stages only move forward, one at a time.
fn advance(block: &Block, stage: &mut Stage, to: Stage) {
    debug_assert_eq!(stage.next(), Some(to), "block {}", block.name);
    log::trace!("  block {}: {:?} -> {:?}", block.name, stage, to);
    *stage = to;
}

/// Write resolved bytes into the block's segment; a span outside it becomes an error.
fn place(
    image: &mut MemoryImage,
    element: &str,
    address: u32,
    bytes: &[u8],
    errors: &mut Vec<LayoutError>,
) {
    if !image.write(address, bytes) {
        errors.push(LayoutError::ImageWrite {
            element: element.to_string(),
            address,
            len: bytes.len(),
        });
    }
}

/// Absolute `[from, to]` of a checksum, checked against its block, itself and the
/// checksums evaluated after it.
fn checksum_range(
    block: &Block,
    base: u32,
    crc: &CrcElement,
    placement: &Placement,
    later: &[Placement],
) -> Result<(u32, u32), LayoutError> {
    let start = u64::from(base);
    let end = start + u64::from(block.length);
    let range = &crc.range;

    let from = start + u64::from(range.from);
    let to = match range.to {
        RangeEnd::Explicit(to) => start + u64::from(to),
        RangeEnd::EndOfRange => {
            if placement.address == base {
                return Err(LayoutError::InvalidSelfReference {
                    element: crc.name.clone(),
                    address: placement.address,
                });
            }
            u64::from(placement.address) - 1
        }
    };
    let clamp = |v: u64| v.min(u64::from(u32::MAX)) as u32;

    if from > to {
        return Err(LayoutError::MalformedRange {
            element: crc.name.clone(),
            from: clamp(from),
            to: clamp(to),
        });
    }
    if to >= end {
        return Err(LayoutError::RangeOutsideBlock {
            element: crc.name.clone(),
            from: clamp(from),
            to: clamp(to),
            start: base,
            end: clamp(end),
        });
    }
    if from < placement.end() && u64::from(placement.address) <= to {
        return Err(LayoutError::SelfCoverage {
            element: crc.name.clone(),
            address: placement.address,
        });
    }
    if let Some(other) = later
        .iter()
        .filter(|p| matches!(p.kind, SymbolKind::Crc(_)))
        .find(|p| from < p.end() && u64::from(p.address) <= to)
    {
        return Err(LayoutError::LaterChecksum {
            element: crc.name.clone(),
            other: block.elements[other.index].name().to_string(),
            address: other.address,
        });
    }

    if !ACCESS_WIDTHS.contains(&range.access) {
        return Err(LayoutError::InvalidAccess {
            element: crc.name.clone(),
            access: range.access,
        });
    }
    let len = to - from + 1;
    if range.swap && range.access > 8 && len % u64::from(range.access / 8) != 0 {
        return Err(LayoutError::MisalignedAccess {
            element: crc.name.clone(),
            access: range.access,
            len: clamp(len),
        });
    }
    Crc::new(crc.ty.bits(), crc.config).map_err(|reason| LayoutError::MalformedChecksum {
        element: crc.name.clone(),
        reason,
    })?;

    Ok((from as u32, to as u32))
}
