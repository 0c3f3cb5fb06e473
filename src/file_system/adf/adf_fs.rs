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

    src/file_system/adf/adf_fs.rs

    A read-only AmigaDOS filesystem over an ADF image.

    Paths are resolved through per-directory hash tables, one component at a time. File
    data is reassembled from the reversed data block pointer table of the file header and
    of any extension blocks chained from it. Every block that is read is checked against
    its expected type and its own block number.
*/
use binrw::BinRead;

use crate::{
    file_system::{
        adf::{
            blocks::*,
            hash::{hash_name, names_equal},
            AdfOptions,
        },
        DosFlags,
        FileEntry,
        FileEntryType,
        FileSystemType,
    },
    io::{Cursor, ReadSeek, SeekFrom},
    util::{get_length, string_to_latin1},
    AmigaError,
    FoxHashMap,
    FoxHashSet,
    SECTOR_SIZE,
};

pub struct AdfFileSystem<RS: ReadSeek> {
    source: RS,
    length: u64,
    options: AdfOptions,
    fs_type: FileSystemType,
    root: HeaderBlock,
}

impl<RS: ReadSeek> AdfFileSystem<RS> {
    /// Mount an AmigaDOS filesystem from an ADF image.
    ///
    /// The boot block signature and the root block are validated here; a failure of either
    /// means the image is not a readable OFS/FFS disk.
    pub fn mount(mut source: RS, options: AdfOptions) -> Result<Self, AmigaError> {
        let length = get_length(&mut source)?;
        if length < ROOT_OFFSET + SECTOR_SIZE as u64 {
            return Err(AmigaError::invalid(format!(
                "image of {} bytes is too small to hold a root block",
                length
            )));
        }

        let boot = BootBlockHeader::read(&mut source)?;
        if !boot.is_dos() {
            return Err(AmigaError::invalid(format!(
                "missing DOS signature in boot block: {:02X?}",
                boot.dos_id
            )));
        }
        let flags = DosFlags::from_bits(boot.flags & 0x07)
            .ok_or_else(|| AmigaError::invalid(format!("unsupported filesystem flags: {:#04X}", boot.flags)))?;
        let fs_type = FileSystemType::from(flags);
        log::debug!("AdfFileSystem::mount(): detected {} filesystem", fs_type);

        let raw = read_raw_block(&mut source, length, ROOT_BLOCK)?;
        if options.verify_checksums && !checksum_valid(&raw) {
            return Err(AmigaError::invalid("root block checksum mismatch"));
        }
        let root = HeaderBlock::read(&mut Cursor::new(&raw[..]))?;

        if root.block_type != T_HEADER
            || root.header_key != 0
            || root.high_seq != 0
            || root.table_size != HASH_TABLE_SIZE as u32
            || root.first_data != 0
            || root.sec_type != ST_ROOT
        {
            return Err(AmigaError::invalid(format!(
                "invalid root block: type {} key {} high_seq {} table size {} first data {} secondary type {}",
                root.block_type, root.header_key, root.high_seq, root.table_size, root.first_data, root.sec_type
            )));
        }

        log::debug!("AdfFileSystem::mount(): mounted volume '{}'", root.name_string());

        Ok(Self {
            source,
            length,
            options,
            fs_type,
            root,
        })
    }

    pub fn fs_type(&self) -> FileSystemType {
        self.fs_type
    }

    pub fn options(&self) -> AdfOptions {
        self.options
    }

    /// Returns the volume name stored in the root block.
    pub fn volume_name(&self) -> String {
        self.root.name_string()
    }

    /// Release the underlying byte source.
    pub fn into_inner(self) -> RS {
        self.source
    }

    /// Read the file at `path`.
    /// # Returns
    /// * `Ok(Some(data))` - The file was found and reassembled.
    /// * `Ok(None)` - No file exists at `path`, or `path` names a directory.
    /// * `Err(AmigaError)` - A block on the way was malformed.
    pub fn read_file(&mut self, path: &str) -> Result<Option<Vec<u8>>, AmigaError> {
        let components = split_path(path);
        if components.is_empty() {
            return Ok(None);
        }

        match self.resolve(&components)? {
            Some(header) if header.is_file() => {
                let data = self.read_file_data(&header)?;
                Ok(Some(data))
            }
            _ => Ok(None),
        }
    }

    /// Read every file in `paths`. Paths that do not resolve to a file are absent from the
    /// returned map. Any malformed block aborts the whole operation.
    pub fn read_files<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<FoxHashMap<String, Vec<u8>>, AmigaError> {
        let mut files: FoxHashMap<String, Vec<u8>> = FoxHashMap::default();
        for path in paths {
            let path = path.as_ref();
            match self.read_file(path)? {
                Some(data) => {
                    files.insert(path.to_string(), data);
                }
                None => log::trace!("AdfFileSystem::read_files(): '{}' not found", path),
            }
        }
        Ok(files)
    }

    /// List the entries of the directory at `path`. An empty path lists the root directory.
    /// Returns `Ok(None)` if `path` does not name a directory.
    pub fn read_dir(&mut self, path: &str) -> Result<Option<Vec<FileEntry>>, AmigaError> {
        let components = split_path(path);
        let dir = match self.resolve(&components)? {
            Some(header) if header.is_dir() || header.sec_type == ST_ROOT => header,
            _ => return Ok(None),
        };

        let prefix = components.join("/");
        self.list_dir(&dir.table, &prefix).map(Some)
    }

    /// Return the full path of every file on the disk.
    pub fn list_all_files(&mut self) -> Result<Vec<String>, AmigaError> {
        let mut files = Vec::new();
        let mut visited: FoxHashSet<u32> = FoxHashSet::default();
        let root_table = self.root.table;

        self.list_files_recursive(&root_table, "", &mut visited, &mut files)?;
        Ok(files)
    }

    fn list_files_recursive(
        &mut self,
        table: &[u32; HASH_TABLE_SIZE],
        prefix: &str,
        visited: &mut FoxHashSet<u32>,
        files: &mut Vec<String>,
    ) -> Result<(), AmigaError> {
        for entry in self.list_dir(table, prefix)? {
            if entry.is_dir() {
                if !visited.insert(entry.block) {
                    return Err(AmigaError::invalid(format!(
                        "directory block {} is reachable twice",
                        entry.block
                    )));
                }
                log::debug!("descending into dir: {}", entry.path);
                let dir = self.read_header(entry.block, T_HEADER)?;
                self.list_files_recursive(&dir.table, &entry.path, visited, files)?;
            }
            else {
                files.push(entry.path);
            }
        }
        Ok(())
    }

    fn list_dir(&mut self, table: &[u32; HASH_TABLE_SIZE], prefix: &str) -> Result<Vec<FileEntry>, AmigaError> {
        let mut entries = Vec::new();
        let mut visited: FoxHashSet<u32> = FoxHashSet::default();

        for &head in table.iter() {
            let mut block = head;
            while block != 0 {
                if !visited.insert(block) {
                    return Err(AmigaError::invalid(format!(
                        "block {} appears twice in a directory's hash chains",
                        block
                    )));
                }
                let header = self.read_header(block, T_HEADER)?;
                let e_type = if header.is_dir() {
                    Some(FileEntryType::Directory)
                }
                else if header.is_file() {
                    Some(FileEntryType::File)
                }
                else {
                    // Links are not followed.
                    log::trace!("skipping block {} with secondary type {}", block, header.sec_type);
                    None
                };

                if let Some(e_type) = e_type {
                    let name = header.name_string();
                    let path = match prefix.is_empty() {
                        true => name.clone(),
                        false => format!("{}/{}", prefix, name),
                    };
                    entries.push(FileEntry {
                        e_type,
                        name,
                        path,
                        size: if header.is_file() { header.byte_size as u64 } else { 0 },
                        block,
                    });
                }
                block = header.next_same_hash;
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Walk `components` from the root. Every component but the last must be a directory.
    fn resolve(&mut self, components: &[&str]) -> Result<Option<HeaderBlock>, AmigaError> {
        let mut current = self.root.clone();

        for (i, component) in components.iter().enumerate() {
            if i > 0 && !current.is_dir() {
                // A file was used as a directory.
                return Ok(None);
            }
            current = match self.find_entry(&current.table, component)? {
                Some(header) => header,
                None => return Ok(None),
            };
        }
        Ok(Some(current))
    }

    /// Look `name` up in a directory hash table, following the bucket's chain.
    fn find_entry(&mut self, table: &[u32; HASH_TABLE_SIZE], name: &str) -> Result<Option<HeaderBlock>, AmigaError> {
        let name = match string_to_latin1(name) {
            Some(bytes) if !bytes.is_empty() && bytes.len() <= MAX_NAME_LEN => bytes,
            _ => return Ok(None),
        };
        let international = self.fs_type.is_international();
        let bucket = hash_name(&name, international);

        let mut visited: FoxHashSet<u32> = FoxHashSet::default();
        let mut block = table[bucket];
        while block != 0 {
            if !visited.insert(block) {
                return Err(AmigaError::invalid(format!("hash chain loops back to block {}", block)));
            }
            let header = self.read_header(block, T_HEADER)?;
            if names_equal(header.name(), &name, international) {
                log::trace!("find_entry(): found '{}' at block {}", header.name_string(), block);
                return Ok(Some(header));
            }
            block = header.next_same_hash;
        }
        Ok(None)
    }

    fn read_file_data(&mut self, header: &HeaderBlock) -> Result<Vec<u8>, AmigaError> {
        let size = header.byte_size as usize;
        let data = self.read_data_blocks(header, size, 0)?;

        if data.len() != size {
            return Err(AmigaError::invalid(format!(
                "file '{}' reassembled to {} bytes, header declares {}",
                header.name_string(),
                data.len(),
                size
            )));
        }
        Ok(data)
    }

    /// Collect up to `remaining` bytes from the data blocks listed in `block`, then from its
    /// extension chain. The result may be short; callers check the length.
    fn read_data_blocks(&mut self, block: &HeaderBlock, remaining: usize, depth: usize) -> Result<Vec<u8>, AmigaError> {
        let mut data = Vec::with_capacity(remaining.min(self.length as usize));

        for ptr in block.data_blocks() {
            if ptr == 0 || data.len() >= remaining {
                break;
            }
            let wanted = remaining - data.len();

            if self.fs_type.is_ffs() {
                let raw = self.read_block(ptr, false)?;
                data.extend_from_slice(&raw[..wanted.min(SECTOR_SIZE)]);
            }
            else {
                let raw = self.read_block(ptr, true)?;
                let data_header = OfsDataHeader::read(&mut Cursor::new(&raw[..OFS_DATA_HEADER_SIZE]))?;
                if data_header.block_type != T_DATA {
                    return Err(AmigaError::invalid(format!(
                        "data block {}: unexpected block type {} (expected {})",
                        ptr, data_header.block_type, T_DATA
                    )));
                }
                let size = data_header.data_size as usize;
                if size > OFS_DATA_SIZE || size > wanted {
                    return Err(AmigaError::invalid(format!(
                        "data block {}: invalid data size {} with {} bytes outstanding",
                        ptr, size, wanted
                    )));
                }
                data.extend_from_slice(&raw[OFS_DATA_HEADER_SIZE..OFS_DATA_HEADER_SIZE + size]);
            }
        }

        let outstanding = remaining - data.len();
        if outstanding > 0 && block.extension != 0 {
            if depth >= self.options.max_extension_depth {
                return Err(AmigaError::invalid(format!(
                    "extension chain is longer than {} blocks",
                    self.options.max_extension_depth
                )));
            }
            log::trace!(
                "read_data_blocks(): following extension block {} for {} bytes",
                block.extension,
                outstanding
            );
            let extension = self.read_header(block.extension, T_LIST)?;
            let ext_data = self.read_data_blocks(&extension, outstanding, depth + 1)?;
            if ext_data.len() != outstanding {
                return Err(AmigaError::invalid(format!(
                    "extension block {} supplied {} bytes, {} outstanding",
                    block.extension,
                    ext_data.len(),
                    outstanding
                )));
            }
            data.extend_from_slice(&ext_data);
        }

        Ok(data)
    }

    /// Read a header-shaped block and check its type and self-reference.
    fn read_header(&mut self, block: u32, expected_type: u32) -> Result<HeaderBlock, AmigaError> {
        let raw = self.read_block(block, true)?;
        let header = HeaderBlock::read(&mut Cursor::new(&raw[..]))?;

        if header.block_type != expected_type {
            return Err(AmigaError::invalid(format!(
                "block {}: unexpected block type {} (expected {})",
                block, header.block_type, expected_type
            )));
        }
        if header.header_key != block {
            return Err(AmigaError::invalid(format!(
                "block {}: self-reference mismatch, header key is {}",
                block, header.header_key
            )));
        }
        Ok(header)
    }

    fn read_block(&mut self, block: u32, checksummed: bool) -> Result<[u8; SECTOR_SIZE], AmigaError> {
        let raw = read_raw_block(&mut self.source, self.length, block)?;
        if checksummed && self.options.verify_checksums && !checksum_valid(&raw) {
            return Err(AmigaError::invalid(format!("block {}: checksum mismatch", block)));
        }
        Ok(raw)
    }
}

fn read_raw_block<RS: ReadSeek>(source: &mut RS, length: u64, block: u32) -> Result<[u8; SECTOR_SIZE], AmigaError> {
    let offset = block as u64 * SECTOR_SIZE as u64;
    if offset + SECTOR_SIZE as u64 > length {
        return Err(AmigaError::invalid(format!(
            "block {} lies outside the {} byte image",
            block, length
        )));
    }

    let mut raw = [0u8; SECTOR_SIZE];
    source.seek(SeekFrom::Start(offset))?;
    source.read_exact(&mut raw)?;
    Ok(raw)
}

fn split_path(path: &str) -> Vec<&str> {
    path.split('/').filter(|c| !c.is_empty()).collect()
}

/// Read `paths` from an in-memory ADF image with default options.
pub fn read_adf_files<S: AsRef<str>>(image: &[u8], paths: &[S]) -> Result<FoxHashMap<String, Vec<u8>>, AmigaError> {
    let mut fs = AdfFileSystem::mount(Cursor::new(image), AdfOptions::default())?;
    fs.read_files(paths)
}
