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

    src/file_parsers/hunk/mod.rs

    Loading of Amiga hunk executables, with transparent decompression of executables
    packed by the Imploder.

    An imploded executable is itself a valid hunk file. Its hunks are:

        code  - the decompression stub, starting with IMPLODER_MAGIC
        bss   - one placeholder per original hunk, sized like the depacked hunk
        code  - decompression metadata: explosion table, first literal run, bit buffer seed
        data  - the compressed stream
        bss   - the decompression work buffer

    When the stub is recognised, the compressed stream is exploded and the original hunk
    list is rebuilt from it.
*/
#[allow(clippy::module_inception)]
pub mod hunk;
mod segment;

pub use hunk::{parse_hunks, ParsedHunks, Segment, SegmentKind};

use crate::{
    file_parsers::compression::imploder::{explode, EXPLODE_TABLE_SIZE},
    util::{read_be_u16, read_be_u32},
    AmigaError,
};
use segment::segments_from_exploded;

/// The first ten bytes of the Imploder's decompression stub.
pub const IMPLODER_MAGIC: [u8; 10] = [0x48, 0xE7, 0xFF, 0xFF, 0x49, 0xFA, 0x00, 0x5E, 0x3C, 0x3C];

// Offsets into the Imploder metadata code hunk
pub const IMPLODER_TOTAL_SIZE_OFFSET: usize = 0x08;
pub const IMPLODER_TABLE_OFFSET: usize = 0x188;
pub const IMPLODER_FIRST_LITERAL_OFFSET: usize = 0x1E6;
pub const IMPLODER_SEED_OFFSET: usize = 0x1E8;

/// Options controlling how a [HunkFile] is loaded.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug)]
pub struct HunkOptions {
    /// Explode imploded executables. If `false`, the packed hunk list is returned as-is.
    pub explode: bool,
}

impl Default for HunkOptions {
    fn default() -> Self {
        Self { explode: true }
    }
}

/// A loaded hunk executable.
#[derive(Clone, Debug)]
pub struct HunkFile {
    segments: Vec<Segment>,
    declared_sizes: Vec<u32>,
    imploded: bool,
}

impl HunkFile {
    /// Parse a hunk executable from `data`, exploding it first if it was packed by the Imploder
    /// and `options.explode` is set.
    pub fn from_bytes(data: &[u8], options: HunkOptions) -> Result<Self, AmigaError> {
        let parsed = parse_hunks(data)?;
        let imploded = is_imploded(&parsed.segments);

        let segments = match imploded && options.explode {
            true => {
                log::debug!(
                    "HunkFile::from_bytes(): Imploder stub detected, exploding {} packed hunks",
                    parsed.segments.len()
                );
                explode_hunks(&parsed.segments)?
            }
            false => parsed.segments,
        };

        Ok(HunkFile {
            segments,
            declared_sizes: parsed.declared_sizes,
            imploded,
        })
    }

    /// Returns the segments of the executable, in file order.
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn into_segments(self) -> Vec<Segment> {
        self.segments
    }

    /// Returns `true` if the file started with the Imploder decompression stub.
    pub fn was_imploded(&self) -> bool {
        self.imploded
    }

    /// Hunk sizes in bytes as declared by the file's header. For an imploded file these are
    /// the sizes of the packed hunks.
    pub fn declared_sizes(&self) -> &[u32] {
        &self.declared_sizes
    }
}

/// Returns `true` if the first segment is a code hunk starting with the Imploder stub.
pub fn is_imploded(segments: &[Segment]) -> bool {
    matches!(segments.first(), Some(Segment::Code(payload)) if payload.starts_with(&IMPLODER_MAGIC))
}

/// Explode the packed hunk list of an imploded executable into the original hunk list.
fn explode_hunks(packed: &[Segment]) -> Result<Vec<Segment>, AmigaError> {
    let code_hunks: Vec<&[u8]> = packed
        .iter()
        .filter_map(|s| match s {
            Segment::Code(payload) => Some(payload.as_slice()),
            _ => None,
        })
        .collect();
    let metadata = match code_hunks.as_slice() {
        [_stub, .., metadata] => *metadata,
        _ => return Err(AmigaError::invalid("imploded executable has no metadata code hunk")),
    };

    let payload = packed
        .iter()
        .rev()
        .find_map(|s| match s {
            Segment::Data(payload) => Some(payload.as_slice()),
            _ => None,
        })
        .ok_or_else(|| AmigaError::invalid("imploded executable has no compressed data hunk"))?;

    let bss_sizes: Vec<u32> = packed
        .iter()
        .filter_map(|s| match s {
            Segment::Bss(size) => Some(*size),
            _ => None,
        })
        .collect();
    // The last bss hunk is the decompression buffer; the rest stand in for the original hunks.
    let (_buffer, hunk_sizes) = bss_sizes
        .split_last()
        .ok_or_else(|| AmigaError::invalid("imploded executable has no decompression buffer hunk"))?;

    let table: [u8; EXPLODE_TABLE_SIZE] = metadata
        .get(IMPLODER_TABLE_OFFSET..IMPLODER_TABLE_OFFSET + EXPLODE_TABLE_SIZE)
        .and_then(|t| t.try_into().ok())
        .ok_or_else(|| {
            AmigaError::invalid(format!(
                "metadata hunk of {} bytes is too short for an explosion table",
                metadata.len()
            ))
        })?;
    let first_literal_len = read_be_u16(metadata, IMPLODER_FIRST_LITERAL_OFFSET)? as usize;
    let seed = *metadata.get(IMPLODER_SEED_OFFSET).ok_or_else(|| {
        AmigaError::invalid(format!(
            "metadata hunk of {} bytes is too short for a bit buffer seed",
            metadata.len()
        ))
    })?;
    let total_len = read_be_u32(metadata, IMPLODER_TOTAL_SIZE_OFFSET)? as usize;

    log::debug!(
        "explode_hunks(): {} compressed bytes -> {} bytes, first literal run {}, {} original hunks",
        payload.len(),
        total_len,
        first_literal_len,
        hunk_sizes.len()
    );

    let stream = explode(payload, &table, first_literal_len, seed, total_len)?;
    segments_from_exploded(&stream, hunk_sizes)
}

/// Parse a hunk executable with default options and return its segments.
pub fn read_hunks(data: &[u8]) -> Result<Vec<Segment>, AmigaError> {
    HunkFile::from_bytes(data, HunkOptions::default()).map(HunkFile::into_segments)
}
