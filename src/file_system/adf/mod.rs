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

    src/file_system/adf/mod.rs

    Read-only support for AmigaDOS (OFS/FFS) filesystems stored in ADF floppy images.
*/
pub mod adf_fs;
pub mod blocks;
pub mod hash;

pub use adf_fs::{read_adf_files, AdfFileSystem};

/// The default bound on the number of extension blocks followed for a single file. A full
/// 880K floppy needs at most 24 extension blocks, so this only trips on corrupted chains.
pub const DEFAULT_MAX_EXTENSION_DEPTH: usize = 64;

/// Options controlling how an [AdfFileSystem] validates the image.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug)]
pub struct AdfOptions {
    /// Require a valid AmigaDOS checksum on every header, extension and OFS data block read.
    pub verify_checksums: bool,
    /// Maximum number of extension blocks followed for a single file.
    pub max_extension_depth: usize,
}

impl Default for AdfOptions {
    fn default() -> Self {
        Self {
            verify_checksums: false,
            max_extension_depth: DEFAULT_MAX_EXTENSION_DEPTH,
        }
    }
}

impl AdfOptions {
    pub fn with_checksums(mut self, state: bool) -> Self {
        self.verify_checksums = state;
        self
    }

    pub fn with_max_extension_depth(mut self, depth: usize) -> Self {
        self.max_extension_depth = depth;
        self
    }
}
