//! Shared builder for synthetic databases.
//!
//! Tests assemble a page image in memory (header page, reserved page 1, root
//! object at page 2, further objects behind it) and write it to a temp file
//! for the driver to open.

#![allow(dead_code)]

use std::io::Write;

use onecd::pages::{DB_SIGNATURE, VERSION_8_2_14, VERSION_8_3_8};
use tempfile::NamedTempFile;

pub const BLOCK_SIZE: usize = 256;
pub const BLOCK_DATA: usize = 250;

const HEADER_82_SIZE: usize = 20;
const HEADER_83_SIZE: usize = 24;

pub struct DbBuilder {
    version: u32,
    page_size: usize,
    pages: Vec<Vec<u8>>,
}

impl DbBuilder {
    /// Pages 0 (database header), 1 (reserved) and 2 (root object header,
    /// filled by [`set_root_object`](Self::set_root_object)) are allocated up
    /// front.
    pub fn new(version: u32, page_size: usize) -> Self {
        if version == VERSION_8_2_14 {
            assert_eq!(page_size, 4096, "revision 8.2.14 pages are fixed at 4096");
        }

        Self {
            version,
            page_size,
            pages: vec![vec![0u8; page_size]; 3],
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn alloc_page(&mut self) -> u32 {
        self.pages.push(vec![0u8; self.page_size]);
        (self.pages.len() - 1) as u32
    }

    pub fn page_mut(&mut self, index: u32) -> &mut Vec<u8> {
        &mut self.pages[index as usize]
    }

    /// Adds an object with a direct placement map; returns its header page.
    pub fn add_object(&mut self, data: &[u8]) -> u32 {
        let header = self.alloc_page();
        self.fill_object(header, data);
        header
    }

    /// Fills page 2 with an object holding `data` (the root catalog).
    pub fn set_root_object(&mut self, data: &[u8]) {
        self.fill_object(2, data);
    }

    fn fill_object(&mut self, header: u32, data: &[u8]) {
        let data_pages = self.alloc_data_pages(data);

        let fixed = match self.version {
            VERSION_8_2_14 => HEADER_82_SIZE,
            VERSION_8_3_8 => HEADER_83_SIZE,
            other => panic!("unknown version {other:#x}"),
        };
        assert!(
            fixed + data_pages.len() * 4 <= self.page_size,
            "object of {} pages does not fit a direct placement map",
            data_pages.len()
        );

        let page = &mut self.pages[header as usize];
        match self.version {
            VERSION_8_2_14 => {
                page[..4].copy_from_slice(&0xFD1Cu32.to_le_bytes());
                page[4..8].copy_from_slice(&(data.len() as u32).to_le_bytes());
            }
            _ => {
                page[..2].copy_from_slice(&0xFD1Cu16.to_le_bytes());
                page[2..4].copy_from_slice(&0u16.to_le_bytes());
                page[16..24].copy_from_slice(&(data.len() as u64).to_le_bytes());
            }
        }

        for (slot, index) in data_pages.iter().enumerate() {
            let at = fixed + slot * 4;
            self.pages[header as usize][at..at + 4].copy_from_slice(&index.to_le_bytes());
        }
    }

    /// Adds an 8.3.8 object with a two-level placement map.
    pub fn add_object_two_level(&mut self, data: &[u8]) -> u32 {
        assert_eq!(self.version, VERSION_8_3_8, "two-level maps are 8.3.8 only");

        let header = self.alloc_page();
        let data_pages = self.alloc_data_pages(data);

        let per_map = self.page_size / 4;
        let mut map_pages = Vec::new();

        for group in data_pages.chunks(per_map) {
            let map_page = self.alloc_page();
            for (slot, index) in group.iter().enumerate() {
                let page = &mut self.pages[map_page as usize];
                page[slot * 4..slot * 4 + 4].copy_from_slice(&index.to_le_bytes());
            }
            map_pages.push(map_page);
        }

        assert!(HEADER_83_SIZE + map_pages.len() * 4 <= self.page_size);

        let page = &mut self.pages[header as usize];
        page[..2].copy_from_slice(&0xFD1Cu16.to_le_bytes());
        page[2..4].copy_from_slice(&1u16.to_le_bytes());
        page[16..24].copy_from_slice(&(data.len() as u64).to_le_bytes());

        for (slot, index) in map_pages.iter().enumerate() {
            let at = HEADER_83_SIZE + slot * 4;
            self.pages[header as usize][at..at + 4].copy_from_slice(&index.to_le_bytes());
        }

        header
    }

    fn alloc_data_pages(&mut self, data: &[u8]) -> Vec<u32> {
        let mut indices = Vec::new();

        for chunk in data.chunks(self.page_size) {
            let index = self.alloc_page();
            self.pages[index as usize][..chunk.len()].copy_from_slice(chunk);
            indices.push(index);
        }

        indices
    }

    /// Serialises the image to a temp file, filling in the database header.
    pub fn write(&mut self) -> NamedTempFile {
        let page_count = self.pages.len() as u32;
        let page_size = self.page_size as u32;
        let version = self.version;
        let header = &mut self.pages[0];
        header[..8].copy_from_slice(DB_SIGNATURE);
        header[8..12].copy_from_slice(&version.to_le_bytes());
        header[12..16].copy_from_slice(&page_count.to_le_bytes());
        header[20..24].copy_from_slice(&page_size.to_le_bytes());

        let mut tmp = NamedTempFile::new().unwrap();
        for page in &self.pages {
            tmp.write_all(page).unwrap();
        }
        tmp.flush().unwrap();

        tmp
    }
}

/// Assembles the block array of a BLOB object. Block 0 is the zeroed
/// end-of-chain sentinel.
pub struct BlobBuilder {
    blocks: Vec<[u8; BLOCK_SIZE]>,
}

impl BlobBuilder {
    pub fn new() -> Self {
        Self {
            blocks: vec![[0u8; BLOCK_SIZE]],
        }
    }

    /// Appends a chain of consecutive blocks holding `data`; returns the
    /// index of its first block.
    pub fn add_chain(&mut self, data: &[u8]) -> u32 {
        let start = self.blocks.len() as u32;

        if data.is_empty() {
            self.blocks.push(block(0, &[]));
            return start;
        }

        let chunks: Vec<&[u8]> = data.chunks(BLOCK_DATA).collect();
        for (i, chunk) in chunks.iter().enumerate() {
            let next = if i + 1 == chunks.len() {
                0
            } else {
                self.blocks.len() as u32 + 1
            };
            self.blocks.push(block(next, chunk));
        }

        start
    }

    /// Appends one raw block with an explicit link; for corrupt-chain tests.
    pub fn add_block(&mut self, next: u32, data: &[u8]) -> u32 {
        let index = self.blocks.len() as u32;
        self.blocks.push(block(next, data));
        index
    }

    pub fn next_index(&self) -> u32 {
        self.blocks.len() as u32
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.blocks.concat()
    }
}

pub fn block(next: u32, data: &[u8]) -> [u8; BLOCK_SIZE] {
    assert!(data.len() <= BLOCK_DATA);

    let mut raw = [0u8; BLOCK_SIZE];
    raw[..4].copy_from_slice(&next.to_le_bytes());
    raw[4..6].copy_from_slice(&(data.len() as u16).to_le_bytes());
    raw[6..6 + data.len()].copy_from_slice(data);

    raw
}

/// Builds the byte image of a root BLOB object: the catalog chain at block 1
/// (language tag, table count, descriptor chain indices) followed by one
/// chain per descriptor.
pub fn root_blob_bytes(language: &str, descriptors: &[&str]) -> Vec<u8> {
    let catalog_len = 36 + 4 * descriptors.len();
    let catalog_blocks = blocks_needed(catalog_len);

    let mut starts = Vec::new();
    let mut next_start = 1 + catalog_blocks;
    for descriptor in descriptors {
        starts.push(next_start);
        next_start += blocks_needed(descriptor.len());
    }

    let mut catalog = vec![0u8; 32];
    assert!(language.len() <= 32);
    catalog[..language.len()].copy_from_slice(language.as_bytes());
    catalog.extend_from_slice(&(descriptors.len() as u32).to_le_bytes());
    for start in &starts {
        catalog.extend_from_slice(&start.to_le_bytes());
    }

    let mut blob = BlobBuilder::new();
    assert_eq!(blob.add_chain(&catalog), 1);
    for descriptor in descriptors {
        blob.add_chain(descriptor.as_bytes());
    }

    blob.bytes()
}

fn blocks_needed(len: usize) -> u32 {
    (len.max(1)).div_ceil(BLOCK_DATA) as u32
}
