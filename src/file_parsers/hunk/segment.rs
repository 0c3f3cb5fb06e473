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

    src/file_parsers/hunk/segment.rs

    Rebuild the hunk list of an exploded executable.

    The Imploder does not keep the original hunk file. Its decompressed stream is a
    sequence of hunks, each introduced by a longword holding two flag bits and a 30-bit
    longword count:

        0  code hunk; the count must match the size of the matching placeholder hunk
        1  RELOC32 table, in the usual (count, target, offsets...) form
        2  data hunk of `count` longwords, or a bss hunk if the count is zero
        3  as 2, but no END marker follows

    Bss sizes are not stored in the stream; they come from the placeholder hunks of the
    packed executable.
*/
use binrw::BinReaderExt;

use crate::{
    file_parsers::hunk::hunk::{read_bytes, read_reloc32, Segment, HUNK_SIZE_MASK},
    io::Cursor,
    AmigaError,
};

const FLAG_CODE: u32 = 0;
const FLAG_RELOC32: u32 = 1;
const FLAG_DATA_NO_END: u32 = 3;

/// Split an exploded stream back into segments.
///
/// `hunk_sizes` holds the size in bytes of each loadable hunk, in order, as recorded by the
/// packer's placeholder hunks.
pub(crate) fn segments_from_exploded(stream: &[u8], hunk_sizes: &[u32]) -> Result<Vec<Segment>, AmigaError> {
    let mut cursor = Cursor::new(stream);
    let mut segments = Vec::new();
    let mut hunk_index = 0;

    while (cursor.position() as usize) < stream.len() {
        let header: u32 = cursor.read_be()?;
        let flags = header >> 30;
        let longwords = header & HUNK_SIZE_MASK;

        let segment = match flags {
            FLAG_CODE => {
                let expected = recorded_size(hunk_sizes, &mut hunk_index)?;
                if longwords.checked_mul(4) != Some(expected) {
                    return Err(AmigaError::invalid(format!(
                        "exploded code hunk of {} longwords does not match recorded size of {} bytes",
                        longwords, expected
                    )));
                }
                Segment::Code(read_bytes(&mut cursor, expected as usize)?)
            }
            FLAG_RELOC32 => Segment::Reloc32(read_reloc32(&mut cursor)?),
            // FLAG_DATA, FLAG_DATA_NO_END
            _ => {
                let size = recorded_size(hunk_sizes, &mut hunk_index)?;
                match longwords {
                    0 => Segment::Bss(size),
                    _ => Segment::Data(read_bytes(&mut cursor, longwords as usize * 4)?),
                }
            }
        };

        log::trace!("segments_from_exploded(): {} hunk (flags {})", segment.kind(), flags);
        segments.push(segment);

        if flags != FLAG_DATA_NO_END {
            segments.push(Segment::End);
        }
    }

    Ok(segments)
}

fn recorded_size(hunk_sizes: &[u32], index: &mut usize) -> Result<u32, AmigaError> {
    let size = hunk_sizes.get(*index).copied().ok_or_else(|| {
        AmigaError::invalid(format!(
            "exploded hunk {} has no recorded size ({} recorded)",
            *index,
            hunk_sizes.len()
        ))
    })?;
    *index += 1;
    Ok(size)
}
