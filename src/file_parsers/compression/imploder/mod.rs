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

    src/file_parsers/compression/imploder/mod.rs

    The Imploder decompressor ("explode").

    The Imploder is an LZ77 variant with static prefix codes. It decrunches in place: the
    packed stream is read from its last byte down, and the output is filled from its last
    byte down. A compressed stream starts with an uncompressed literal run, then repeats:

        match length code  -> selector (0-3) and number of bytes to copy
        literal length code -> length of the literal run after the match
        distance code       -> how far above the output position the match starts
        <copy match> <copy literal run>

    The selector picks which column of the literal and distance tables is used, so short
    matches can use short distance codes. The distance table (8 distance bases and 12
    extra-bit counts) is stored with each packed file.
*/
pub mod bit_reader;

use crate::AmigaError;
use bit_reader::{ImploderBitReader, BYTE_FIRST};

/// Size of the explosion table: 8 distance bases followed by 12 extra-bit counts.
pub const EXPLODE_TABLE_SIZE: usize = 20;

/// A 255 byte match costs at least 17 bits, so no stream expands beyond this ratio.
const MAX_EXPANSION: usize = 128;

const LITERAL_BASE: [u32; 4] = [6, 10, 10, 18];
// The 14-bit count is read as one stream byte plus 6 bits.
const LITERAL_EXTRA_BITS: [u8; 12] = [1, 1, 1, 1, 2, 3, 3, 4, 4, 5, 7, BYTE_FIRST | 6];

/// The per-file distance code table.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ExplodeTable {
    pub distance_base: [u32; 8],
    pub distance_bits: [u8; 12],
}

impl From<&[u8; EXPLODE_TABLE_SIZE]> for ExplodeTable {
    fn from(bytes: &[u8; EXPLODE_TABLE_SIZE]) -> Self {
        let mut distance_base = [0; 8];
        for (base, &byte) in distance_base.iter_mut().zip(&bytes[..8]) {
            *base = byte as u32;
        }
        let mut distance_bits = [0; 12];
        distance_bits.copy_from_slice(&bytes[8..EXPLODE_TABLE_SIZE]);
        Self {
            distance_base,
            distance_bits,
        }
    }
}

/// Decode a match length code. Returns the selector and the number of bytes to copy.
///
/// ```text
/// 0        -> selector 0, 2 bytes
/// 10       -> selector 1, 3 bytes
/// 110      -> selector 2, 4 bytes
/// 1110     -> selector 3, 5 bytes
/// 11110xxx -> selector 3, 6 + xxx bytes
/// 11111    -> selector 3, next stream byte (non-zero)
/// ```
fn decode_match(reader: &mut ImploderBitReader) -> Result<(usize, usize), AmigaError> {
    if reader.read_bit()? == 0 {
        return Ok((0, 2));
    }
    if reader.read_bit()? == 0 {
        return Ok((1, 3));
    }
    if reader.read_bit()? == 0 {
        return Ok((2, 4));
    }
    if reader.read_bit()? == 0 {
        return Ok((3, 5));
    }
    if reader.read_bit()? == 0 {
        return Ok((3, 6 + reader.read_bits(3)? as usize));
    }
    match reader.read_byte()? {
        0 => Err(AmigaError::invalid("zero length match")),
        len => Ok((3, len as usize)),
    }
}

/// Decode the length of the literal run following a match.
///
/// ```text
/// 0  -> base 0,                    bits {1,1,1,1}[selector]
/// 10 -> base 2,                    bits {2,3,3,4}[selector]
/// 11 -> base {6,10,10,18}[selector] bits {4,5,7,14}[selector]
/// ```
fn decode_literal_len(reader: &mut ImploderBitReader, selector: usize) -> Result<usize, AmigaError> {
    let (base, column) = match reader.read_bit()? {
        0 => (0, selector),
        _ => match reader.read_bit()? {
            0 => (2, selector + 4),
            _ => (LITERAL_BASE[selector], selector + 8),
        },
    };
    Ok(base as usize + reader.read_bits(LITERAL_EXTRA_BITS[column])? as usize)
}

/// Decode a match distance. A distance of 1 copies from the byte just above the one being
/// written.
///
/// ```text
/// 0  -> base 0,                        bits table[selector]
/// 10 -> base distance_base[selector],  bits table[selector + 4]
/// 11 -> base distance_base[selector+4], bits table[selector + 8]
/// ```
fn decode_distance(reader: &mut ImploderBitReader, table: &ExplodeTable, selector: usize) -> Result<usize, AmigaError> {
    let (base, column) = match reader.read_bit()? {
        0 => (0, selector),
        _ => match reader.read_bit()? {
            0 => (table.distance_base[selector], selector + 4),
            _ => (table.distance_base[selector + 4], selector + 8),
        },
    };
    let extra = reader.read_bits(table.distance_bits[column])?;
    Ok(1 + base as usize + extra as usize)
}

/// Explode an Imploder stream.
///
/// # Arguments
/// * `input` - The compressed bytes. Decoding starts from the last byte.
/// * `table` - The 20-byte explosion table stored with the packed file.
/// * `first_literal_len` - Length of the uncompressed literal run that starts the stream.
/// * `seed` - The initial bit buffer, including its marker bit.
/// * `total_len` - The exact length of the decompressed data.
///
/// Any code that would write below the start of the output, copy from above the bytes
/// already written, or read past the start of `input` is an error; the output is never
/// truncated or padded. Unread bytes left at the start of `input` are allowed.
pub fn explode(
    input: &[u8],
    table: &[u8; EXPLODE_TABLE_SIZE],
    first_literal_len: usize,
    seed: u8,
    total_len: usize,
) -> Result<Vec<u8>, AmigaError> {
    if total_len > input.len().saturating_mul(MAX_EXPANSION) {
        return Err(AmigaError::invalid(format!(
            "{} compressed bytes cannot explode to {} bytes",
            input.len(),
            total_len
        )));
    }

    let table = ExplodeTable::from(table);
    let mut reader = ImploderBitReader::new(input, seed);
    let mut output = vec![0u8; total_len];
    // Everything from `out_pos` up has been written.
    let mut out_pos = total_len;
    let mut literal_len = first_literal_len;

    loop {
        if literal_len > out_pos {
            return Err(AmigaError::invalid(format!(
                "literal run of {} bytes with {} of {} output bytes left",
                literal_len, out_pos, total_len
            )));
        }
        let literals = reader.read_bytes(literal_len)?;
        output[out_pos - literal_len..out_pos].copy_from_slice(literals);
        out_pos -= literal_len;

        if out_pos == 0 {
            break;
        }

        let (selector, match_len) = decode_match(&mut reader)?;
        literal_len = decode_literal_len(&mut reader, selector)?;
        let distance = decode_distance(&mut reader, &table, selector)?;

        if distance > total_len - out_pos {
            return Err(AmigaError::invalid(format!(
                "match distance {} reaches past the {} bytes written",
                distance,
                total_len - out_pos
            )));
        }
        if match_len > out_pos {
            return Err(AmigaError::invalid(format!(
                "match of {} bytes with {} of {} output bytes left",
                match_len, out_pos, total_len
            )));
        }
        // Matches may overlap the bytes they produce, so copy one byte at a time.
        for _ in 0..match_len {
            out_pos -= 1;
            output[out_pos] = output[out_pos + distance];
        }
    }

    if reader.remaining() > 0 {
        log::trace!(
            "explode(): {} unused bytes before {} byte stream",
            reader.remaining(),
            reader.consumed()
        );
    }
    Ok(output)
}
