//! Sparse memory image and symbol table produced by the layout engine.
//!
//! Both are filled by [`crate::layout`] and are read-only afterwards; every serializer in
//! [`crate::writers`] consumes them through shared references.

use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;

use crate::codec::ValueType;
use crate::model::{Endianness, ScalarType};

/// Sparse address → byte map, stored as contiguous segments keyed by start address.
///
/// Every segment ends at or below `0x1_0000_0000`; `fill` and `extend` refuse spans that
/// would leave the 32-bit address space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryImage {
    segments: BTreeMap<u32, Vec<u8>>,
}

impl MemoryImage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new segment of `len` bytes set to `byte`. The caller keeps segments disjoint.
    /// Returns `false` (and stores nothing) when the span leaves the address space.
    #[must_use]
    pub fn fill(&mut self, base: u32, len: u32, byte: u8) -> bool {
        if !in_address_space(base, len as usize) {
            return false;
        }
        if len > 0 {
            self.segments.insert(base, vec![byte; len as usize]);
        }
        true
    }

    /// Overwrite bytes inside an existing segment. Returns `false` (and writes nothing) when
    /// the span is not fully covered by one segment.
    #[must_use]
    pub fn write(&mut self, address: u32, bytes: &[u8]) -> bool {
        let Some((&base, segment)) = self.segments.range_mut(..=address).next_back() else {
            return false;
        };
        let start = (address - base) as usize;
        let end = start + bytes.len();
        if end > segment.len() {
            return false;
        }
        segment[start..end].copy_from_slice(bytes);
        true
    }

    /// Store bytes at `address`, growing or merging segments as needed.
    ///
    /// Used when rebuilding an image from records; later writes to an address win.
    /// Returns `false` (and stores nothing) when the span leaves the address space.
    #[must_use]
    pub fn extend(&mut self, address: u32, bytes: &[u8]) -> bool {
        if !in_address_space(address, bytes.len()) {
            return false;
        }
        if bytes.is_empty() {
            return true;
        }
        if let Some((&base, segment)) = self.segments.range_mut(..=address).next_back() {
            let start = (address - base) as usize;
            if start <= segment.len() {
                let overlap = (segment.len() - start).min(bytes.len());
                segment[start..start + overlap].copy_from_slice(&bytes[..overlap]);
                segment.extend_from_slice(&bytes[overlap..]);
                self.merge_following(base);
                return true;
            }
        }
        self.segments.insert(address, bytes.to_vec());
        self.merge_following(address);
        true
    }

    /// Fold segments that start inside or right after the segment at `base` into it.
    fn merge_following(&mut self, base: u32) {
        loop {
            let Some(segment) = self.segments.get(&base) else {
                return;
            };
            let end = u64::from(base) + segment.len() as u64;
            let next = self
                .segments
                .range((Bound::Excluded(base), Bound::Unbounded))
                .next()
                .map(|(&b, _)| b);
            let Some(next) = next.filter(|&n| u64::from(n) <= end) else {
                return;
            };
            let Some(data) = self.segments.remove(&next) else {
                return;
            };
            let skip = (end - u64::from(next)) as usize;
            if let Some(segment) = self.segments.get_mut(&base) {
                if skip < data.len() {
                    segment.extend_from_slice(&data[skip..]);
                }
            }
        }
    }

    /// Bytes of the inclusive range `[from, to]`, if one segment holds all of them.
    #[must_use]
    pub fn read(&self, from: u32, to: u32) -> Option<&[u8]> {
        if to < from {
            return None;
        }
        let (&base, segment) = self.segments.range(..=from).next_back()?;
        let start = (from - base) as usize;
        let end = (to - base) as usize + 1;
        segment.get(start..end)
    }

    #[must_use]
    pub fn byte_at(&self, address: u32) -> Option<u8> {
        self.read(address, address).map(|b| b[0])
    }

    /// Drop the segment starting at `base`.
    pub fn discard(&mut self, base: u32) {
        self.segments.remove(&base);
    }

    /// Segments in ascending address order.
    pub fn segments(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.segments.iter().map(|(&base, data)| (base, data.as_slice()))
    }

    /// Every `(address, byte)` pair in ascending address order.
    pub fn bytes(&self) -> impl Iterator<Item = (u32, u8)> + '_ {
        // segments end inside the address space, so `base..` yields one address per byte
        self.segments()
            .flat_map(|(base, data)| (base..=u32::MAX).zip(data.iter().copied()))
    }

    /// Total number of bytes held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.segments.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}

/// `true` if `len` bytes starting at `base` stay below `0x1_0000_0000`.
#[must_use]
pub fn in_address_space(base: u32, len: usize) -> bool {
    u64::from(base) + len as u64 <= 1 << 32
}

/// What a symbol describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolKind {
    /// The 16-byte block header.
    Header,
    Parameter(ValueType),
    Crc(ScalarType),
}

/// One symbol table entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Symbol {
    /// `<block>_<element>` or `<block>_blkhdr`.
    pub name: String,
    pub container: String,
    pub block: String,
    /// Element name as declared; `None` for headers.
    pub element: Option<String>,
    pub address: u32,
    pub size: u32,
    pub kind: SymbolKind,
    pub endianness: Endianness,
    pub comment: Option<String>,
}

impl Symbol {
    /// Exclusive end address.
    #[must_use]
    pub fn end(&self) -> u64 {
        u64::from(self.address) + u64::from(self.size)
    }
}

/// Ordered name → symbol index. Iteration follows insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    symbols: Vec<Symbol>,
    index: HashMap<String, usize>,
}

impl SymbolTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a symbol. On a name clash the existing entry is returned and nothing changes.
    pub fn insert(&mut self, symbol: Symbol) -> Result<(), &Symbol> {
        if let Some(&idx) = self.index.get(&symbol.name) {
            return Err(&self.symbols[idx]);
        }
        self.index.insert(symbol.name.clone(), self.symbols.len());
        self.symbols.push(symbol);
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Symbol> {
        self.index.get(name).map(|&idx| &self.symbols[idx])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.iter()
    }

    /// Symbols of one block sorted by address.
    #[must_use]
    pub fn in_block(&self, block: &str) -> Vec<&Symbol> {
        let mut list: Vec<&Symbol> = self.symbols.iter().filter(|s| s.block == block).collect();
        list.sort_by_key(|s| s.address);
        list
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}
