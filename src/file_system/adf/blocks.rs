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

    src/file_system/adf/blocks.rs

    On-disk layouts of the AmigaDOS blocks needed to read files from an ADF image.

    Every block is 512 bytes and big-endian. The root block, directory headers, file headers
    and file extension blocks all share one layout; only the meaning of the 72-entry table at
    offset 0x18 differs (hash table for directories, reversed data block pointers for files).
*/
use binrw::binrw;

use crate::{util::latin1_to_string, SECTOR_SIZE};

/// Block number of the root block on a double-density floppy.
pub const ROOT_BLOCK: u32 = 880;
/// Byte offset of the root block within the image.
pub const ROOT_OFFSET: u64 = ROOT_BLOCK as u64 * SECTOR_SIZE as u64;
/// Number of entries in a directory hash table, and of data block pointers per header block.
pub const HASH_TABLE_SIZE: usize = 72;
/// Maximum length of a file or directory name.
pub const MAX_NAME_LEN: usize = 30;
/// Size of the header that precedes the payload of an OFS data block.
pub const OFS_DATA_HEADER_SIZE: usize = 24;
/// Maximum payload of an OFS data block.
pub const OFS_DATA_SIZE: usize = SECTOR_SIZE - OFS_DATA_HEADER_SIZE;
/// Offset of the checksum longword in every checksummed block.
pub const CHECKSUM_OFFSET: usize = 20;

// Primary block types
pub const T_HEADER: u32 = 2;
pub const T_DATA: u32 = 8;
pub const T_LIST: u32 = 16;

// Secondary block types
pub const ST_ROOT: i32 = 1;
pub const ST_DIR: i32 = 2;
pub const ST_FILE: i32 = -3;

/// The first four bytes of the boot block: `DOS` followed by the filesystem flags.
#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct BootBlockHeader {
    pub dos_id: [u8; 3],
    pub flags: u8,
}

impl BootBlockHeader {
    pub fn is_dos(&self) -> bool {
        &self.dos_id == b"DOS"
    }
}

/// The layout shared by root, directory header, file header and file extension blocks.
/// Fields that no reader needs (protection bits, dates, comment) are skipped as padding.
#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct HeaderBlock {
    pub block_type: u32,
    /// The block's own number. Always 0 in the root block.
    pub header_key: u32,
    /// Number of data block pointers used in `table` (file headers and extension blocks).
    pub high_seq: u32,
    /// Hash table size; only set in the root block.
    pub table_size: u32,
    pub first_data: u32,
    pub checksum: u32,
    /// Hash table of a directory, or data block pointers of a file stored last-to-first.
    pub table: [u32; HASH_TABLE_SIZE],
    // unused, uid, gid, protection bits
    #[brw(pad_before = 12)]
    pub byte_size: u32,
    // comment, reserved, modification date
    #[brw(pad_before = 0x68)]
    pub name_len: u8,
    pub name_bytes: [u8; MAX_NAME_LEN],
    // name pad, real_entry, next_link, reserved
    #[brw(pad_before = 0x21)]
    pub next_same_hash: u32,
    pub parent: u32,
    pub extension: u32,
    pub sec_type: i32,
}

impl HeaderBlock {
    /// The raw name bytes, clamped to the maximum name length.
    pub fn name(&self) -> &[u8] {
        let len = (self.name_len as usize).min(MAX_NAME_LEN);
        &self.name_bytes[..len]
    }

    pub fn name_string(&self) -> String {
        latin1_to_string(self.name())
    }

    pub fn is_dir(&self) -> bool {
        self.sec_type == ST_DIR
    }

    pub fn is_file(&self) -> bool {
        self.sec_type == ST_FILE
    }

    /// Data block pointers in file order. The table is stored last-to-first on disk.
    pub fn data_blocks(&self) -> impl Iterator<Item = u32> + '_ {
        self.table.iter().rev().copied()
    }
}

/// The header of an OFS data block. The payload follows immediately.
#[derive(Debug)]
#[binrw]
#[brw(big)]
pub struct OfsDataHeader {
    pub block_type: u32,
    pub header_key: u32,
    pub seq_num: u32,
    pub data_size: u32,
    pub next_data: u32,
    pub checksum: u32,
}

/// Calculate the AmigaDOS checksum for a block: the value that makes the sum of all 128
/// longwords (with the checksum longword included) wrap to zero.
pub fn block_checksum(block: &[u8; SECTOR_SIZE]) -> u32 {
    let sum = block
        .chunks_exact(4)
        .enumerate()
        .filter(|(i, _)| *i != CHECKSUM_OFFSET / 4)
        .fold(0u32, |sum, (_, word)| {
            sum.wrapping_add(u32::from_be_bytes([word[0], word[1], word[2], word[3]]))
        });
    0u32.wrapping_sub(sum)
}

/// Returns `true` if the checksum stored in the block matches its contents.
pub fn checksum_valid(block: &[u8; SECTOR_SIZE]) -> bool {
    let stored = u32::from_be_bytes([
        block[CHECKSUM_OFFSET],
        block[CHECKSUM_OFFSET + 1],
        block[CHECKSUM_OFFSET + 2],
        block[CHECKSUM_OFFSET + 3],
    ]);
    stored == block_checksum(block)
}
