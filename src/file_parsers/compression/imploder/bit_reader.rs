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

    src/file_parsers/compression/imploder/bit_reader.rs

    The input side of the Imploder bitstream.

    The Imploder decrunches in place, so its input is consumed from the last byte towards
    the first. Literal bytes and bit-buffer refills are taken from the same byte stream, in
    the order the decoder asks for them. The bit buffer is a single byte read MSB first; a
    marker bit sits just below the last unread bit, so the buffer is exhausted when shifting
    it leaves zero. A refilled byte contributes all eight of its bits.
*/
use crate::AmigaError;

/// Flag in a bit count requesting a whole byte from the stream before the remaining bits.
pub const BYTE_FIRST: u8 = 0x80;

pub struct ImploderBitReader<'a> {
    input: &'a [u8],
    // Index one past the next byte to be read.
    pos: usize,
    bit_buffer: u8,
}

impl<'a> ImploderBitReader<'a> {
    /// Create a reader over `input`, starting at its end. `seed` is the initial bit buffer,
    /// including its marker bit.
    pub fn new(input: &'a [u8], seed: u8) -> Self {
        Self {
            input,
            pos: input.len(),
            bit_buffer: seed,
        }
    }

    /// Number of input bytes consumed so far.
    pub fn consumed(&self) -> usize {
        self.input.len() - self.pos
    }

    /// Number of input bytes not yet consumed, at the start of the input.
    pub fn remaining(&self) -> usize {
        self.pos
    }

    pub fn read_byte(&mut self) -> Result<u8, AmigaError> {
        if self.pos == 0 {
            return Err(AmigaError::invalid(format!(
                "compressed stream exhausted after {} bytes",
                self.input.len()
            )));
        }
        self.pos -= 1;
        Ok(self.input[self.pos])
    }

    /// Take the `count` bytes below the read position. The bytes keep their order, so they
    /// can be copied directly below the output position.
    pub fn read_bytes(&mut self, count: usize) -> Result<&'a [u8], AmigaError> {
        let input = self.input;
        let start = self.pos.checked_sub(count).ok_or_else(|| {
            AmigaError::invalid(format!(
                "compressed stream exhausted reading {} literal bytes with {} left",
                count, self.pos
            ))
        })?;
        let bytes = &input[start..self.pos];
        self.pos = start;
        Ok(bytes)
    }

    pub fn read_bit(&mut self) -> Result<u32, AmigaError> {
        let mut bit = self.bit_buffer >> 7;
        self.bit_buffer <<= 1;
        if self.bit_buffer == 0 {
            // Only the marker was left. Its carry is replaced by the top bit of a fresh byte,
            // and the marker moves to the bottom.
            let byte = self.read_byte()?;
            bit = byte >> 7;
            self.bit_buffer = (byte << 1) | 1;
        }
        Ok(bit as u32)
    }

    /// Read a code of `count` bits, MSB first. If `count` has [BYTE_FIRST] set, the upper eight
    /// bits of the value come from a whole stream byte and only `count & 0x7F` bits come from
    /// the bit buffer.
    pub fn read_bits(&mut self, count: u8) -> Result<u32, AmigaError> {
        if count & BYTE_FIRST != 0 {
            let rest = count & !BYTE_FIRST;
            let high = self.read_byte()? as u32;
            Ok((high << rest) | self.read_bits_direct(rest)?)
        }
        else {
            self.read_bits_direct(count)
        }
    }

    fn read_bits_direct(&mut self, count: u8) -> Result<u32, AmigaError> {
        if count > 24 {
            return Err(AmigaError::invalid(format!("bit count {} out of range", count)));
        }
        let mut value = 0;
        for _ in 0..count {
            value = (value << 1) | self.read_bit()?;
        }
        Ok(value)
    }
}
