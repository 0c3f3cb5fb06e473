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
*/

use std::fmt::{self, Display, Formatter};

use bitflags::bitflags;

pub mod adf;

bitflags! {
    /// The low bits of the fourth byte of the boot block `DOS` signature.
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub struct DosFlags: u8 {
        const FFS = 0b0000_0001;
        const INTERNATIONAL = 0b0000_0010;
    }
}

/// The on-disk flavor of an AmigaDOS filesystem: Old or Fast File System, with or without
/// international name hashing.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileSystemType {
    Ofs,
    Ffs,
    OfsInternational,
    FfsInternational,
}

impl From<DosFlags> for FileSystemType {
    fn from(flags: DosFlags) -> Self {
        match (flags.contains(DosFlags::FFS), flags.contains(DosFlags::INTERNATIONAL)) {
            (false, false) => FileSystemType::Ofs,
            (true, false) => FileSystemType::Ffs,
            (false, true) => FileSystemType::OfsInternational,
            (true, true) => FileSystemType::FfsInternational,
        }
    }
}

impl Display for FileSystemType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            FileSystemType::Ofs => write!(f, "OFS"),
            FileSystemType::Ffs => write!(f, "FFS"),
            FileSystemType::OfsInternational => write!(f, "OFS-INTL"),
            FileSystemType::FfsInternational => write!(f, "FFS-INTL"),
        }
    }
}

impl FileSystemType {
    /// Returns `true` if file data blocks are raw 512-byte sectors.
    pub fn is_ffs(&self) -> bool {
        matches!(self, FileSystemType::Ffs | FileSystemType::FfsInternational)
    }

    /// Returns `true` if name hashing and comparison fold Latin-1 letters as well as ASCII.
    pub fn is_international(&self) -> bool {
        matches!(
            self,
            FileSystemType::OfsInternational | FileSystemType::FfsInternational
        )
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum FileEntryType {
    File,
    Directory,
}

/// A single entry of a directory listing.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug)]
pub struct FileEntry {
    pub(crate) e_type: FileEntryType,
    pub(crate) name: String,
    pub(crate) path: String,
    pub(crate) size: u64,
    pub(crate) block: u32,
}

impl Display for FileEntry {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self.e_type {
            FileEntryType::Directory => write!(f, "{:>10} {}/", "<DIR>", self.name),
            FileEntryType::File => write!(f, "{:>10} {}", self.size, self.name),
        }
    }
}

impl FileEntry {
    /// Returns the name of the entry as stored on disk.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the full path of the entry, `/` separated, without a leading separator.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Returns the size of the file in bytes, or 0 if the entry is a directory.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Returns the block number of the entry's header block.
    pub fn block(&self) -> u32 {
        self.block
    }

    pub fn entry_type(&self) -> FileEntryType {
        self.e_type
    }

    pub fn is_file(&self) -> bool {
        matches!(self.e_type, FileEntryType::File)
    }

    pub fn is_dir(&self) -> bool {
        matches!(self.e_type, FileEntryType::Directory)
    }
}
