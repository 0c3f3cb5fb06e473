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

    tests/common/hunk_builder.rs

    Builds hunk executables, exploded hunk streams and Imploder-packed executables.
*/
#![allow(dead_code)]

use amigafox::file_parsers::hunk::{
    hunk::{HUNK_BSS, HUNK_CODE, HUNK_DATA, HUNK_END, HUNK_HEADER, HUNK_RELOC32},
    IMPLODER_FIRST_LITERAL_OFFSET,
    IMPLODER_MAGIC,
    IMPLODER_SEED_OFFSET,
    IMPLODER_TABLE_OFFSET,
    IMPLODER_TOTAL_SIZE_OFFSET,
};

/// Distance bases 2 and 10, with 1/3/9 extra bits for short, medium and long distances.
pub const TEST_TABLE: [u8; 20] = [
    2, 2, 2, 2, 10, 10, 10, 10, //
    1, 1, 1, 1, 3, 3, 3, 3, 0x81, 0x81, 0x81, 0x81,
];
pub const TEST_SEED: u8 = 0x80;

const MIN_MATCH: usize = 2;
const MAX_MATCH: usize = 255;
const MAX_DISTANCE: usize = 522;
const MAX_FIRST_LITERAL: usize = u16::MAX as usize;

const LITERAL_BASE: [usize; 4] = [6, 10, 10, 18];
const LITERAL_EXTRA_BITS: [u8; 12] = [1, 1, 1, 1, 2, 3, 3, 4, 4, 5, 7, 0x86];

fn pad_longwords(bytes: &[u8]) -> Vec<u8> {
    let mut padded = bytes.to_vec();
    padded.resize(bytes.len().div_ceil(4) * 4, 0);
    padded
}

/// Writes a hunk file one longword at a time.
pub struct HunkBuilder {
    out: Vec<u8>,
}

impl HunkBuilder {
    /// Start a hunk file declaring hunks of the given byte sizes.
    pub fn new(sizes: &[u32]) -> Self {
        let mut builder = HunkBuilder { out: Vec::new() };
        builder.words(&[HUNK_HEADER, 0, sizes.len() as u32, 0, sizes.len().saturating_sub(1) as u32]);
        for size in sizes {
            builder.word(size.div_ceil(4));
        }
        builder
    }

    pub fn word(&mut self, word: u32) -> &mut Self {
        self.out.extend_from_slice(&word.to_be_bytes());
        self
    }

    pub fn words(&mut self, words: &[u32]) -> &mut Self {
        for &word in words {
            self.word(word);
        }
        self
    }

    fn payload(&mut self, tag: u32, payload: &[u8]) -> &mut Self {
        let padded = pad_longwords(payload);
        self.word(tag).word((padded.len() / 4) as u32);
        self.out.extend_from_slice(&padded);
        self
    }

    pub fn code(&mut self, payload: &[u8]) -> &mut Self {
        self.payload(HUNK_CODE, payload)
    }

    pub fn data(&mut self, payload: &[u8]) -> &mut Self {
        self.payload(HUNK_DATA, payload)
    }

    pub fn bss(&mut self, size: u32) -> &mut Self {
        self.word(HUNK_BSS).word(size.div_ceil(4))
    }

    pub fn reloc32(&mut self, groups: &[(u32, &[u32])]) -> &mut Self {
        self.word(HUNK_RELOC32);
        for (target, offsets) in groups {
            self.word(offsets.len() as u32).word(*target).words(offsets);
        }
        self.word(0)
    }

    pub fn end(&mut self) -> &mut Self {
        self.word(HUNK_END)
    }

    pub fn build(&self) -> Vec<u8> {
        self.out.clone()
    }
}

/// Writes the decompressed stream of an imploded executable.
#[derive(Default)]
pub struct ExplodedStream {
    out: Vec<u8>,
}

impl ExplodedStream {
    fn header(&mut self, flags: u32, longwords: u32) -> &mut Self {
        self.out.extend_from_slice(&((flags << 30) | longwords).to_be_bytes());
        self
    }

    pub fn code(&mut self, payload: &[u8]) -> &mut Self {
        assert_eq!(payload.len() % 4, 0);
        self.header(0, (payload.len() / 4) as u32);
        self.out.extend_from_slice(payload);
        self
    }

    pub fn reloc32(&mut self, groups: &[(u32, &[u32])]) -> &mut Self {
        self.header(1, 0);
        for (target, offsets) in groups {
            self.out.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
            self.out.extend_from_slice(&target.to_be_bytes());
            for offset in offsets.iter() {
                self.out.extend_from_slice(&offset.to_be_bytes());
            }
        }
        self.out.extend_from_slice(&0u32.to_be_bytes());
        self
    }

    pub fn data(&mut self, payload: &[u8], end: bool) -> &mut Self {
        assert_eq!(payload.len() % 4, 0);
        self.header(if end { 2 } else { 3 }, (payload.len() / 4) as u32);
        self.out.extend_from_slice(payload);
        self
    }

    pub fn bss(&mut self, end: bool) -> &mut Self {
        self.header(if end { 2 } else { 3 }, 0)
    }

    pub fn build(&self) -> Vec<u8> {
        self.out.clone()
    }
}

/// The Imploder's bit output. Whole bytes are appended as they are written, while bits fill
/// a byte slot reserved in the output when the previous slot ran out.
struct BitWriter {
    out: Vec<u8>,
    slot: usize,
    used: u8,
}

impl BitWriter {
    fn new() -> Self {
        BitWriter {
            out: Vec::new(),
            slot: 0,
            used: 8,
        }
    }

    fn bit(&mut self, bit: u32) {
        if self.used == 8 {
            self.slot = self.out.len();
            self.out.push(0);
            self.used = 0;
        }
        if bit != 0 {
            self.out[self.slot] |= 0x80 >> self.used;
        }
        self.used += 1;
    }

    fn bits(&mut self, value: u32, count: u8) {
        for i in (0..count).rev() {
            self.bit((value >> i) & 1);
        }
    }

    fn byte(&mut self, byte: u8) {
        self.out.push(byte);
    }

    fn bytes(&mut self, bytes: &[u8]) {
        self.out.extend_from_slice(bytes);
    }
}

fn longest_match(data: &[u8], pos: usize) -> (usize, usize) {
    let limit = MAX_MATCH.min(data.len() - pos);
    let mut best = (0, 0);
    for distance in 1..=MAX_DISTANCE.min(pos) {
        let mut len = 0;
        while len < limit && data[pos + len] == data[pos + len - distance] {
            len += 1;
        }
        if len > best.0 {
            best = (len, distance);
            if len == limit {
                break;
            }
        }
    }
    best
}

fn selector(match_len: usize) -> usize {
    (match_len - 2).min(3)
}

/// The longest literal run that can follow a match with the given selector.
fn max_literal_run(selector: usize) -> usize {
    let bits = LITERAL_EXTRA_BITS[selector + 8];
    let bits = if bits & 0x80 != 0 { 8 + (bits & 0x7F) } else { bits };
    LITERAL_BASE[selector] + (1 << bits) - 1
}

#[derive(Copy, Clone)]
enum Token {
    Literal(u8),
    Match { len: usize, distance: usize },
}

/// (match length, distance, literal run that follows)
type Group = (usize, usize, Vec<u8>);

fn group_tokens(tokens: &[Token]) -> (Vec<u8>, Vec<Group>) {
    let mut first_literals = Vec::new();
    let mut groups: Vec<Group> = Vec::new();
    for token in tokens {
        match *token {
            Token::Match { len, distance } => groups.push((len, distance, Vec::new())),
            Token::Literal(byte) => match groups.last_mut() {
                Some((_, _, literals)) => literals.push(byte),
                None => first_literals.push(byte),
            },
        }
    }
    (first_literals, groups)
}

/// Write an extra-bit field, honoring the whole-byte flag.
fn write_extra(writer: &mut BitWriter, value: u32, count: u8) {
    if count & 0x80 != 0 {
        let rest = count & 0x7F;
        writer.byte((value >> rest) as u8);
        writer.bits(value & ((1 << rest) - 1), rest);
    }
    else {
        writer.bits(value, count);
    }
}

/// Compress `data` front to back, producing a stream that a forward decoder would read.
fn implode_forward(data: &[u8]) -> (Vec<u8>, usize) {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while pos < data.len() {
        let (len, distance) = longest_match(data, pos);
        if len >= MIN_MATCH {
            tokens.push(Token::Match { len, distance });
            pos += len;
        }
        else {
            tokens.push(Token::Literal(data[pos]));
            pos += 1;
        }
    }

    // Short matches only allow short literal runs after them. Turn offending matches back
    // into literals until every run fits.
    loop {
        let mut out_pos = 0;
        let mut fixed = Vec::with_capacity(tokens.len());
        let mut changed = false;
        for (i, token) in tokens.iter().enumerate() {
            if let Token::Match { len, .. } = *token {
                let run = tokens[i + 1..]
                    .iter()
                    .take_while(|t| matches!(t, Token::Literal(_)))
                    .count();
                if run > max_literal_run(selector(len)) {
                    fixed.extend(data[out_pos..out_pos + len].iter().map(|&b| Token::Literal(b)));
                    out_pos += len;
                    changed = true;
                    continue;
                }
                out_pos += len;
            }
            else {
                out_pos += 1;
            }
            fixed.push(*token);
        }
        tokens = fixed;
        if !changed {
            break;
        }
    }

    let (first_literals, groups) = group_tokens(&tokens);
    assert!(first_literals.len() <= MAX_FIRST_LITERAL);

    let mut writer = BitWriter::new();
    writer.bytes(&first_literals);

    for (len, distance, literals) in &groups {
        let selector = selector(*len);
        match len {
            2 => writer.bits(0b0, 1),
            3 => writer.bits(0b10, 2),
            4 => writer.bits(0b110, 3),
            5 => writer.bits(0b1110, 4),
            6..=13 => {
                writer.bits(0b11110, 5);
                writer.bits((len - 6) as u32, 3);
            }
            _ => {
                writer.bits(0b11111, 5);
                writer.byte(*len as u8);
            }
        }

        let run = literals.len();
        let medium_bits = LITERAL_EXTRA_BITS[selector + 4];
        if run < 2 {
            writer.bits(0b0, 1);
            write_extra(&mut writer, run as u32, LITERAL_EXTRA_BITS[selector]);
        }
        else if run < 2 + (1 << medium_bits) {
            writer.bits(0b10, 2);
            write_extra(&mut writer, (run - 2) as u32, medium_bits);
        }
        else {
            writer.bits(0b11, 2);
            write_extra(
                &mut writer,
                (run - LITERAL_BASE[selector]) as u32,
                LITERAL_EXTRA_BITS[selector + 8],
            );
        }

        let base = TEST_TABLE[selector] as usize;
        let long_base = TEST_TABLE[selector + 4] as usize;
        if *distance <= 1 + (1 << TEST_TABLE[8 + selector]) - 1 {
            writer.bits(0b0, 1);
            write_extra(&mut writer, (distance - 1) as u32, TEST_TABLE[8 + selector]);
        }
        else if *distance <= base + (1 << TEST_TABLE[8 + selector + 4]) {
            writer.bits(0b10, 2);
            write_extra(&mut writer, (distance - 1 - base) as u32, TEST_TABLE[8 + selector + 4]);
        }
        else {
            writer.bits(0b11, 2);
            write_extra(&mut writer, (distance - 1 - long_base) as u32, TEST_TABLE[8 + selector + 8]);
        }

        writer.bytes(literals);
    }

    (writer.out, first_literals.len())
}

/// Compress `data` for [TEST_TABLE] and [TEST_SEED]. Returns the packed stream and the length
/// of the leading literal run.
///
/// The stream is decrunched from its last byte down into an output filled from its last byte
/// down, so `data` is compressed back to front and the resulting bytes are reversed.
pub fn implode(data: &[u8]) -> (Vec<u8>, usize) {
    let reversed: Vec<u8> = data.iter().rev().copied().collect();
    let (mut packed, first_literal_len) = implode_forward(&reversed);
    packed.reverse();
    (packed, first_literal_len)
}

/// Pack an exploded hunk stream into an imploded executable.
///
/// `hunk_sizes` are the byte sizes of the loadable hunks in `stream`, in order.
pub fn imploded_exe(stream: &[u8], hunk_sizes: &[u32]) -> Vec<u8> {
    let (packed, first_literal_len) = implode(stream);

    let mut stub = IMPLODER_MAGIC.to_vec();
    stub.extend_from_slice(&[0x4E, 0x75]);

    let mut metadata = vec![0u8; 0x1EC];
    metadata[IMPLODER_TOTAL_SIZE_OFFSET..IMPLODER_TOTAL_SIZE_OFFSET + 4]
        .copy_from_slice(&(stream.len() as u32).to_be_bytes());
    metadata[IMPLODER_TABLE_OFFSET..IMPLODER_TABLE_OFFSET + 20].copy_from_slice(&TEST_TABLE);
    metadata[IMPLODER_FIRST_LITERAL_OFFSET..IMPLODER_FIRST_LITERAL_OFFSET + 2]
        .copy_from_slice(&(first_literal_len as u16).to_be_bytes());
    metadata[IMPLODER_SEED_OFFSET] = TEST_SEED;

    let buffer_size = 0x400;
    // Decrunching ends at the start of the payload, so pad in front of the stream.
    let mut padded = vec![0u8; packed.len().div_ceil(4) * 4 - packed.len()];
    padded.extend_from_slice(&packed);
    let packed = padded;

    let mut sizes = vec![stub.len() as u32];
    sizes.extend_from_slice(hunk_sizes);
    sizes.extend_from_slice(&[metadata.len() as u32, packed.len() as u32, buffer_size]);

    let mut builder = HunkBuilder::new(&sizes);
    builder.code(&stub).end();
    for &size in hunk_sizes {
        builder.bss(size).end();
    }
    builder.code(&metadata).end();
    builder.data(&packed).end();
    builder.bss(buffer_size).end();
    builder.build()
}
