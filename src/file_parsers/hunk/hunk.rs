/*
    FluxFox
    https://github.com/dbalsom/fluxfox

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/file_parsers/hunk/hunk.rs

    The Amiga hunk executable container.

    A hunk file starts with a HUNK_HEADER block declaring how many hunks will be loaded and
    their sizes, followed by the hunks themselves. Each loadable hunk (code, data or bss) is
    followed by optional relocation blocks and a HUNK_END marker.
*/
use std::collections::BTreeMap;

use binrw::{binrw, BinRead, BinReaderExt};
use strum::{Display, EnumDiscriminants, EnumIter};

use crate::{io::Cursor, AmigaError};

pub const HUNK_HEADER: u32 = 0x3F3;
pub const HUNK_CODE: u32 = 0x3E9;
pub const HUNK_DATA: u32 = 0x3EA;
pub const HUNK_BSS: u32 = 0x3EB;
pub const HUNK_RELOC32: u32 = 0x3EC;
pub const HUNK_END: u32 = 0x3F2;

/// Hunk type tags may carry memory flags in their upper three bits.
pub const HUNK_TYPE_MASK: u32 = 0x1FFF_FFFF;
/// Hunk sizes carry memory flags in their upper two bits.
pub const HUNK_SIZE_MASK: u32 = 0x3FFF_FFFF;
/// Both memory flags set means an extra longword of memory attributes follows the size.
pub const HUNK_EXTENDED_MEMORY: u32 = 0xC000_0000;

/// A single typed segment of a hunk executable. Sizes are in bytes.
#[derive(Clone, Debug, PartialEq, Eq, EnumDiscriminants)]
#[strum_discriminants(name(SegmentKind), derive(Display, EnumIter, Hash))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Segment {
    Code(Vec<u8>),
    Data(Vec<u8>),
    /// Zero-initialized memory of the given size. No bytes are stored in the file.
    Bss(u32),
    /// Offsets to patch, keyed by the index of the hunk they point into.
    Reloc32(BTreeMap<u32, Vec<u32>>),
    End,
}

impl Segment {
    pub fn kind(&self) -> SegmentKind {
        SegmentKind::from(self)
    }

    /// The payload of a code or data segment.
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            Segment::Code(data) | Segment::Data(data) => Some(data),
            _ => None,
        }
    }

    /// The number of bytes the segment occupies once loaded. Zero for relocation tables and
    /// end markers.
    pub fn mem_size(&self) -> usize {
        match self {
            Segment::Code(data) | Segment::Data(data) => data.len(),
            Segment::Bss(size) => *size as usize,
            _ => 0,
        }
    }
}

#[derive(Debug)]
#[binrw]
#[brw(big, magic = 0x0000_03F3u32)]
pub struct HunkHeader {
    #[br(assert(library_names == 0, "resident library names are not supported ({} present)", library_names))]
    pub library_names: u32,
    pub table_size: u32,
    pub first_hunk: u32,
    pub last_hunk: u32,
}

/// The raw contents of a hunk file.
#[derive(Clone, Debug)]
pub struct ParsedHunks {
    /// Hunk sizes in bytes from the header, with memory flags removed.
    pub declared_sizes: Vec<u32>,
    pub segments: Vec<Segment>,
}

/// Parse a hunk executable into its segments, without interpreting any of them.
pub fn parse_hunks(data: &[u8]) -> Result<ParsedHunks, AmigaError> {
    let mut cursor = Cursor::new(data);
    let header = HunkHeader::read(&mut cursor)?;

    let declared = header.table_size as usize;
    if header.last_hunk < header.first_hunk || (header.last_hunk - header.first_hunk) as usize + 1 != declared {
        return Err(AmigaError::invalid(format!(
            "hunk table of {} entries does not match hunk range {}..={}",
            declared, header.first_hunk, header.last_hunk
        )));
    }

    let mut declared_sizes = Vec::with_capacity(declared.min(data.len() / 4));
    for _ in 0..declared {
        let size: u32 = cursor.read_be()?;
        if size & HUNK_EXTENDED_MEMORY == HUNK_EXTENDED_MEMORY {
            let _attributes: u32 = cursor.read_be()?;
        }
        declared_sizes.push((size & HUNK_SIZE_MASK) * 4);
    }

    // RELOC32 and END blocks are not counted in the header table. They are tracked as
    // extra hunk slots but never checked against the declared count.
    let mut hunk_slots = declared;
    let mut segments = Vec::new();

    loop {
        let offset = cursor.position() as usize;
        let remaining = data.len() - offset;
        if remaining == 0 {
            break;
        }
        if remaining < 4 {
            log::warn!("parse_hunks(): ignoring {} trailing bytes", remaining);
            break;
        }

        let tag = cursor.read_be::<u32>()? & HUNK_TYPE_MASK;
        let segment = match tag {
            HUNK_CODE => Segment::Code(read_payload(&mut cursor)?),
            HUNK_DATA => Segment::Data(read_payload(&mut cursor)?),
            HUNK_BSS => Segment::Bss((cursor.read_be::<u32>()? & HUNK_SIZE_MASK) * 4),
            HUNK_RELOC32 => {
                hunk_slots += 1;
                Segment::Reloc32(read_reloc32(&mut cursor)?)
            }
            HUNK_END => {
                hunk_slots += 1;
                Segment::End
            }
            _ => {
                return Err(AmigaError::invalid(format!(
                    "unsupported hunk type {:#X} at offset {:#X}",
                    tag, offset
                )))
            }
        };
        log::trace!("parse_hunks(): {} hunk at offset {:#X}", segment.kind(), offset);
        segments.push(segment);
    }

    let loadable = segments
        .iter()
        .filter(|s| matches!(s, Segment::Code(_) | Segment::Data(_) | Segment::Bss(_)))
        .count();
    if loadable != declared {
        log::warn!(
            "parse_hunks(): {} loadable hunks found, {} declared ({} hunk slots)",
            loadable,
            declared,
            hunk_slots
        );
    }

    Ok(ParsedHunks {
        declared_sizes,
        segments,
    })
}

/// Read a longword count followed by that many longwords of payload.
pub(crate) fn read_payload(cursor: &mut Cursor<&[u8]>) -> Result<Vec<u8>, AmigaError> {
    let words = cursor.read_be::<u32>()? & HUNK_SIZE_MASK;
    read_bytes(cursor, words as usize * 4)
}

pub(crate) fn read_bytes(cursor: &mut Cursor<&[u8]>, len: usize) -> Result<Vec<u8>, AmigaError> {
    let data: &[u8] = *cursor.get_ref();
    let start = cursor.position() as usize;
    let bytes = data.get(start..start + len).ok_or_else(|| {
        AmigaError::invalid(format!(
            "hunk payload of {} bytes at offset {:#X} runs past end of data",
            len, start
        ))
    })?;
    cursor.set_position((start + len) as u64);
    Ok(bytes.to_vec())
}

/// Read (count, target hunk, offsets...) groups until a zero count.
pub(crate) fn read_reloc32(cursor: &mut Cursor<&[u8]>) -> Result<BTreeMap<u32, Vec<u32>>, AmigaError> {
    let mut table: BTreeMap<u32, Vec<u32>> = BTreeMap::new();
    loop {
        let count: u32 = cursor.read_be()?;
        if count == 0 {
            break;
        }
        let target: u32 = cursor.read_be()?;
        let offsets = table.entry(target).or_default();
        for _ in 0..count {
            offsets.push(cursor.read_be()?);
        }
    }
    Ok(table)
}
