//! Intel-hex output: data records of up to 16 bytes, extended linear address records
//! when the upper 16 address bits change, and an EOF record.
//!
//! A `.crc` sidecar holds the CRC-32 of all image bytes in ascending address order.

use std::io::Write;
use std::path::PathBuf;

use super::{write_file, Writer, WriterContext, WriterError};
use crate::crc::Crc;
use crate::image::MemoryImage;
use crate::layout::Layout;

/// Data bytes per record.
pub const RECORD_LEN: usize = 16;

pub const RECORD_DATA: u8 = 0x00;
pub const RECORD_EOF: u8 = 0x01;
pub const RECORD_EXT_SEGMENT: u8 = 0x02;
pub const RECORD_START_SEGMENT: u8 = 0x03;
pub const RECORD_EXT_LINEAR: u8 = 0x04;
pub const RECORD_START_LINEAR: u8 = 0x05;

#[derive(Debug, Clone, Copy, Default)]
pub struct IntelHexWriter;

impl Writer for IntelHexWriter {
    fn name(&self) -> &'static str {
        "intelhex"
    }

    fn extension(&self) -> &str {
        "hex"
    }

    fn write(
        &self,
        layout: &Layout,
        _ctx: &WriterContext,
        out: &mut dyn Write,
    ) -> Result<(), WriterError> {
        write_image(&layout.image, out)
    }

    fn emit(&self, layout: &Layout, ctx: &WriterContext) -> Result<Vec<PathBuf>, WriterError> {
        let hex = ctx.path(self.extension());
        write_file(&hex, |out| self.write(layout, ctx, out))?;

        let crc = ctx.path("crc");
        write_file(&crc, |out| {
            writeln!(out, "0x{:X}", image_crc32(&layout.image))?;
            Ok(())
        })?;
        Ok(vec![hex, crc])
    }
}

/// Write all segments of `image` as Intel-hex records.
pub fn write_image(image: &MemoryImage, out: &mut dyn Write) -> Result<(), WriterError> {
    let mut upper: u32 = 0;
    for (base, data) in image.segments() {
        let mut pos = 0usize;
        while pos < data.len() {
            // segments end inside the address space
            let address = base + pos as u32;
            if address >> 16 != upper {
                upper = address >> 16;
                write_record(out, RECORD_EXT_LINEAR, 0, &(upper as u16).to_be_bytes())?;
            }
            // records never cross a 64 KiB boundary
            let room = 0x1_0000 - (address & 0xFFFF) as usize;
            let n = RECORD_LEN.min(data.len() - pos).min(room);
            write_record(out, RECORD_DATA, address as u16, &data[pos..pos + n])?;
            pos += n;
        }
    }
    write_record(out, RECORD_EOF, 0, &[])
}

fn write_record(
    out: &mut dyn Write,
    kind: u8,
    address: u16,
    data: &[u8],
) -> Result<(), WriterError> {
    let [hi, lo] = address.to_be_bytes();
    let mut line = format!(":{:02X}{:04X}{:02X}", data.len(), address, kind);
    let mut sum = (data.len() as u8).wrapping_add(hi).wrapping_add(lo).wrapping_add(kind);
    for &b in data {
        line.push_str(&format!("{:02X}", b));
        sum = sum.wrapping_add(b);
    }
    writeln!(out, "{}{:02X}", line, sum.wrapping_neg())?;
    Ok(())
}

/// CRC-32/IEEE over every image byte in ascending address order.
#[must_use]
pub fn image_crc32(image: &MemoryImage) -> u32 {
    Crc::crc32().checksum(image.bytes().map(|(_, b)| b)) as u32
}
