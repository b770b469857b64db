//! Address resolution: turns `Explicit` / `NextFree` offsets into absolute addresses.
//!
//! Blocks are placed with a container-level cursor, elements with a block-local one.
//! Alignment applies to absolute addresses. Overlap and overflow are detected here; a
//! failing element is reported and skipped so the remaining elements are still checked.

use crate::codec;
use crate::error::LayoutError;
use crate::format::{is_valid_alignment, HEADER_LEN};
use crate::image::SymbolKind;
use crate::model::{Block, Container, Element, Offset};

/// Absolute placement of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockPlacement {
    /// Index of the block in its container.
    pub index: usize,
    pub address: u32,
    pub length: u32,
}

impl BlockPlacement {
    /// Exclusive end address.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.length)
    }
}

/// Absolute placement of one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    /// Index of the element in document order.
    pub index: usize,
    pub address: u32,
    pub size: u32,
    pub kind: SymbolKind,
}

impl Placement {
    /// Exclusive end address.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.size)
    }
}

/// Round `address` up to a multiple of `align` (a power of two).
#[must_use]
pub fn align_up(address: u64, align: u32) -> u64 {
    let align = u64::from(align);
    (address + align - 1) & !(align - 1)
}

/// Place the blocks of a container. Returns the placed blocks in document order and the
/// errors of blocks that could not be placed, tagged with the block index.
pub fn resolve_blocks(container: &Container) -> (Vec<BlockPlacement>, Vec<(usize, LayoutError)>) {
    let mut placed: Vec<BlockPlacement> = Vec::with_capacity(container.blocks.len());
    let mut errors = Vec::new();
    let mut cursor = u64::from(container.at);

    for (index, block) in container.blocks.iter().enumerate() {
        match place_block(container, block, index, cursor, &placed) {
            Ok(placement) => {
                cursor = placement.end();
                placed.push(placement);
            }
            Err(err) => errors.push((index, err)),
        }
    }
    (placed, errors)
}

fn place_block(
    container: &Container,
    block: &Block,
    index: usize,
    cursor: u64,
    placed: &[BlockPlacement],
) -> Result<BlockPlacement, LayoutError> {
    if !is_valid_alignment(block.align) {
        return Err(LayoutError::InvalidAlignment {
            element: block.name.clone(),
            align: block.align,
        });
    }

    let address = match block.offset {
        Offset::Explicit(off) => {
            let address = u64::from(container.at) + u64::from(off);
            if address % u64::from(block.align) != 0 {
                return Err(LayoutError::Misaligned {
                    element: block.name.clone(),
                    address: address as u32,
                    align: block.align,
                });
            }
            address
        }
        Offset::NextFree => align_up(cursor, block.align),
    };

    let end = address + u64::from(block.length);
    if end > u64::from(u32::MAX) + 1 {
        return Err(LayoutError::AddressOverflow {
            element: block.name.clone(),
        });
    }
    let address = address as u32;

    for other in placed {
        if u64::from(address) < other.end() && u64::from(other.address) < end {
            return Err(LayoutError::BlockOverlap {
                block: block.name.clone(),
                other: container.blocks[other.index].name.clone(),
                start: address,
                end: end.min(u64::from(u32::MAX)) as u32,
            });
        }
    }

    Ok(BlockPlacement {
        index,
        address,
        length: block.length,
    })
}

/// Place the header span and elements of a block at `base`.
///
/// Returns the placements of all elements that could be placed and one error per element
/// that could not.
pub fn resolve_elements(block: &Block, base: u32) -> (Vec<Placement>, Vec<LayoutError>) {
    let mut placements: Vec<Placement> = Vec::with_capacity(block.elements.len());
    let mut errors = Vec::new();
    let limit = u64::from(base) + u64::from(block.length);

    // spans taken so far: (start, end, name)
    let mut taken: Vec<(u64, u64, String)> = Vec::new();
    let mut cursor = u64::from(base);

    if block.header.is_some() {
        let end = u64::from(base) + u64::from(HEADER_LEN);
        if end > limit {
            errors.push(LayoutError::Overflow {
                element: format!("{} header", block.name),
                address: base,
                size: HEADER_LEN,
                limit: limit as u32,
            });
        }
        taken.push((u64::from(base), end, "header".to_string()));
        cursor = end;
    }

    for (index, element) in block.elements.iter().enumerate() {
        if let Some(first) = placements
            .iter()
            .find(|p| block.elements[p.index].name() == element.name())
        {
            errors.push(LayoutError::DuplicateName {
                name: element.name().to_string(),
                first: first.address,
            });
            continue;
        }

        match place_element(element, index, base, cursor, limit, &taken) {
            Ok(placement) => {
                log::debug!(
                    "  {} @ 0x{:X} ({} bytes)",
                    element.name(),
                    placement.address,
                    placement.size
                );
                cursor = placement.end();
                taken.push((
                    u64::from(placement.address),
                    placement.end(),
                    element.name().to_string(),
                ));
                placements.push(placement);
            }
            Err(err) => errors.push(err),
        }
    }
    (placements, errors)
}

fn place_element(
    element: &Element,
    index: usize,
    base: u32,
    cursor: u64,
    limit: u64,
    taken: &[(u64, u64, String)],
) -> Result<Placement, LayoutError> {
    let name = element.name();
    let align = element.align();
    if !is_valid_alignment(align) {
        return Err(LayoutError::InvalidAlignment {
            element: name.to_string(),
            align,
        });
    }

    let kind = match element {
        Element::Parameter(p) => {
            let ty = codec::value_type(&p.ty, &p.value).map_err(|source| LayoutError::ValueRange {
                element: name.to_string(),
                ty: p.ty.to_string(),
                source,
            })?;
            SymbolKind::Parameter(ty)
        }
        Element::Crc(c) => {
            if !c.ty.is_integer() {
                return Err(LayoutError::MalformedChecksum {
                    element: name.to_string(),
                    reason: format!("checksum type must be an integer, got {}", c.ty),
                });
            }
            SymbolKind::Crc(c.ty)
        }
    };
    let size = match kind {
        SymbolKind::Parameter(ty) => ty.size(),
        SymbolKind::Crc(ty) => ty.size(),
        SymbolKind::Header => HEADER_LEN as usize,
    };
    let size = u32::try_from(size).map_err(|_| LayoutError::AddressOverflow {
        element: name.to_string(),
    })?;

    let address = match element.offset() {
        Offset::Explicit(off) => {
            let address = u64::from(base) + u64::from(off);
            if address % u64::from(align) != 0 {
                return Err(LayoutError::Misaligned {
                    element: name.to_string(),
                    address: address.min(u64::from(u32::MAX)) as u32,
                    align,
                });
            }
            address
        }
        Offset::NextFree => align_up(cursor, align),
    };

    let end = address + u64::from(size);
    if address >= limit || end > limit {
        return Err(LayoutError::Overflow {
            element: name.to_string(),
            address: address.min(u64::from(u32::MAX)) as u32,
            size,
            limit: limit.min(u64::from(u32::MAX)) as u32,
        });
    }

    if let Some((_, _, other)) = taken
        .iter()
        .find(|(start, stop, _)| address < *stop && *start < end)
    {
        return Err(LayoutError::Overlap {
            element: name.to_string(),
            other: other.clone(),
            start: address as u32,
            end: end.min(u64::from(u32::MAX)) as u32,
        });
    }

    Ok(Placement {
        index,
        address: address as u32,
        size,
        kind,
    })
}
