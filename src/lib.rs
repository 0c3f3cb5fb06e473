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

//! # amigafox
//!
//! amigafox recovers file content from two Amiga-era binary containers:
//!
//! * ADF floppy images formatted with the Old or Fast File System, read through [AdfFileSystem].
//! * Hunk executables, optionally packed with the Imploder, read through [HunkFile].
//!
//! Both readers are purely functional: every call builds its own working state from the
//! caller's bytes and discards it afterwards. Any structural inconsistency is reported as
//! [AmigaError::InvalidData]. A path that simply does not exist on a disk is not an error.

#[cfg(feature = "hunk")]
pub mod file_parsers;
#[cfg(feature = "adf")]
pub mod file_system;
pub mod io;
mod util;

use std::hash::RandomState;

use thiserror::Error;

/// The size of an Amiga floppy sector, and of every AmigaDOS block.
pub const SECTOR_SIZE: usize = 512;

#[allow(unused)]
type FoxHashMap<K, V, S = RandomState> = std::collections::HashMap<K, V, S>;
#[allow(unused)]
type FoxHashSet<T, S = RandomState> = std::collections::HashSet<T, S>;

/// [AmigaError] is the error type for all amigafox operations.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum AmigaError {
    #[error("An IO error occurred reading the source data: {0}")]
    IoError(String),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

impl AmigaError {
    pub(crate) fn invalid<S: Into<String>>(msg: S) -> Self {
        AmigaError::InvalidData(msg.into())
    }

    /// Returns `true` if this error describes a malformed structure rather than a failing source.
    pub fn is_invalid_data(&self) -> bool {
        matches!(self, AmigaError::InvalidData(_))
    }
}

impl From<io::Error> for AmigaError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            // A structure that runs past the end of the source is malformed, not an IO failure.
            io::ErrorKind::UnexpectedEof => AmigaError::InvalidData(format!("unexpected end of data: {}", e)),
            _ => AmigaError::IoError(e.to_string()),
        }
    }
}

impl From<binrw::Error> for AmigaError {
    fn from(e: binrw::Error) -> Self {
        if e.is_eof() {
            return AmigaError::InvalidData(format!("unexpected end of data: {}", e));
        }
        match e {
            binrw::Error::Io(io_err) => io_err.into(),
            other => AmigaError::InvalidData(other.to_string()),
        }
    }
}

#[cfg(feature = "hunk")]
pub use crate::file_parsers::{
    compression::imploder::explode,
    hunk::{HunkFile, HunkOptions, Segment, SegmentKind},
};
#[cfg(feature = "adf")]
pub use crate::file_system::{
    adf::{read_adf_files, AdfFileSystem, AdfOptions},
    FileEntry,
    FileEntryType,
    FileSystemType,
};

pub mod prelude {
    pub use crate::AmigaError;
    #[cfg(feature = "hunk")]
    pub use crate::{HunkFile, HunkOptions, Segment, SegmentKind};
    #[cfg(feature = "adf")]
    pub use crate::{AdfFileSystem, AdfOptions, FileEntry, FileEntryType, FileSystemType};
}
