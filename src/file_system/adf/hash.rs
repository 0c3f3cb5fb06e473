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

    src/file_system/adf/hash.rs

    AmigaDOS directory name hashing.

    A directory's hash table has 72 buckets. The bucket for a name is computed from the
    case-folded name, so lookups are case-insensitive. The international variant of the
    filesystem also folds the Latin-1 letters 0xE0-0xFE (except the division sign 0xF7).
*/
use super::blocks::HASH_TABLE_SIZE;

/// Fold a single name byte to upper case.
#[inline]
pub fn fold_char(c: u8, international: bool) -> u8 {
    match c {
        b'a'..=b'z' => c - 32,
        0xE0..=0xFE if international && c != 0xF7 => c - 32,
        _ => c,
    }
}

/// Compute the hash table bucket for `name`.
pub fn hash_name(name: &[u8], international: bool) -> usize {
    let mut hash = name.len() as u32;
    for &c in name {
        hash = (hash.wrapping_mul(13).wrapping_add(fold_char(c, international) as u32)) & 0x7FF;
    }
    (hash % HASH_TABLE_SIZE as u32) as usize
}

/// Compare two names the way AmigaDOS does, ignoring case.
pub fn names_equal(a: &[u8], b: &[u8], international: bool) -> bool {
    a.len() == b.len()
        && a
            .iter()
            .zip(b.iter())
            .all(|(&x, &y)| fold_char(x, international) == fold_char(y, international))
}
