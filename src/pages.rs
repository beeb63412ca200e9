//! # Paged Access to the Database File
//!
//! [`Pages`] is the block device every other layer pulls from. It owns the
//! opened file, the parsed database header, and a page cache governed by the
//! 2Q policy of [`crate::cache`].
//!
//! ## File Layout
//!
//! A database file is a flat array of equally sized pages:
//!
//! ```text
//! Offset 0:            Page 0  (24-byte database header, rest reserved)
//! Offset page_size:    Page 1
//! Offset page_size*2:  Page 2  (root catalog object, by convention)
//! ...
//! ```
//!
//! The header names the format revision, the page count and (in the newer
//! revision) the page size:
//!
//! ```text
//! Offset  Size  Description
//! 0       8     Signature "1CDBMSV8"
//! 8       4     Version: 0x000E0208 (8.2.14) or 0x00080308 (8.3.8)
//! 12      4     File length in pages
//! 16      4     Unused
//! 20      4     Page size in bytes (8.3.8 only; 8.2.14 is fixed at 4096)
//! ```
//!
//! ## Cache Pool
//!
//! Page buffers are pre-allocated at open time as one contiguous allocation of
//! `cache_pages + 1` slots. The cache queue maps page index → slot number and
//! the free list holds the slots the queue does not. The spare `+1` slot is
//! what makes [`view`](Pages::view) strongly exception safe: a miss reads the
//! page into the spare slot *before* touching the queue or the free list, so a
//! failed read leaves both exactly as they were.
//!
//! ## Borrow Discipline
//!
//! `view` returns a slice borrowed from the pool, valid until the next call
//! that takes `&mut self`; the borrow checker enforces the "pointer is valid
//! until the next `view` or `read`" rule of the on-disk driver contract at
//! compile time. Callers that need bytes across calls copy them out via
//! [`read`](Pages::read).

use std::path::Path;

use eyre::{ensure, eyre, Result, WrapErr};
use tracing::{debug, trace};
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::cache::TwoQ;
use crate::error::OpenError;
use crate::file::DbFile;

/// Signature at offset 0 of every database file.
pub const DB_SIGNATURE: &[u8; 8] = b"1CDBMSV8";

/// Format revision 8.2.14: fixed 4 KiB pages, 32-bit object sizes.
pub const VERSION_8_2_14: u32 = 0x000E_0208;

/// Format revision 8.3.8: configurable page size, 64-bit object sizes.
pub const VERSION_8_3_8: u32 = 0x0008_0308;

/// Size of the on-disk database header.
pub const DB_HEADER_SIZE: usize = 24;

const PAGE_SIZE_8_2_14: u32 = 4096;
const VALID_PAGE_SIZES: [u32; 5] = [4096, 8192, 16384, 32768, 65536];

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
struct DatabaseHeader {
    signature: [u8; 8],
    version: U32,
    length: U32,
    unused: U32,
    page_size: U32,
}

const _: () = assert!(std::mem::size_of::<DatabaseHeader>() == DB_HEADER_SIZE);

/// The paged block device over one database file.
///
/// Not safe for concurrent use: the cache, the free list and every cursor
/// built on top are single-writer. Independent `Pages` over distinct files
/// are independent.
#[derive(Debug)]
pub struct Pages {
    file: DbFile,
    version: u32,
    page_count: u32,
    page_size: usize,
    cache_pages: usize,
    pool: Vec<u8>,
    free: Vec<usize>,
    queue: TwoQ<u32, usize>,
}

impl Pages {
    /// Opens a database file and validates its header.
    ///
    /// `cache_pages` is the page-cache capacity in pages, the single tuning
    /// knob of the driver. It must be at least 1 (programmer error otherwise).
    pub fn open<P: AsRef<Path>>(path: P, cache_pages: usize) -> Result<Self, OpenError> {
        assert!(cache_pages >= 1, "cache capacity must be at least 1");

        let file = DbFile::open(path)?;

        let mut raw = [0u8; DB_HEADER_SIZE];
        file.read_exact_at(&mut raw, 0)?;

        let header = DatabaseHeader::read_from_bytes(&raw).map_err(|_| OpenError::BadFile)?;

        if &header.signature != DB_SIGNATURE {
            return Err(OpenError::BadFile);
        }

        let version = header.version.get();

        if version != VERSION_8_2_14 && version != VERSION_8_3_8 {
            return Err(OpenError::Version);
        }

        // Revision 8.2.14 predates the page-size header field.
        let page_size = if version == VERSION_8_2_14 {
            PAGE_SIZE_8_2_14
        } else if VALID_PAGE_SIZES.contains(&header.page_size.get()) {
            header.page_size.get()
        } else {
            return Err(OpenError::BadFile);
        };

        let length = header.length.get();

        if length == 0
            || file.size() % u64::from(page_size) != 0
            || file.size() / u64::from(page_size) != u64::from(length)
        {
            return Err(OpenError::BadFile);
        }

        let page_size = page_size as usize;

        let pages = Self {
            file,
            version,
            page_count: length,
            page_size,
            cache_pages,
            pool: vec![0u8; page_size * (cache_pages + 1)],
            free: (0..=cache_pages).collect(),
            queue: TwoQ::new(cache_pages),
        };

        debug!(version, pages = length, page_size, "opened database");

        Ok(pages)
    }

    /// Format revision tag from the header.
    pub fn version(&self) -> u32 {
        self.version
    }

    /// Page size in bytes.
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Total page count of the file (including the header page).
    pub fn size(&self) -> u32 {
        self.page_count
    }

    /// Returns `count` bytes of page `index` starting at byte `pos`, served
    /// from the cache. The slice is valid until the next `view` or `read`.
    ///
    /// Page 0 holds the database header and is not addressable here.
    pub fn view(&mut self, index: u32, count: usize, pos: usize) -> Result<&[u8]> {
        ensure!(
            index != 0 && index < self.page_count,
            "page {} out of range (pages={})",
            index,
            self.page_count
        );

        let end = pos
            .checked_add(count)
            .ok_or_else(|| eyre!("page interval {}+{} overflows", pos, count))?;
        ensure!(
            end <= self.page_size,
            "interval {}+{} exceeds page size {}",
            pos,
            count,
            self.page_size
        );

        if let Some(slot) = self.queue.find(index) {
            let base = slot * self.page_size;
            return Ok(&self.pool[base + pos..base + end]);
        }

        trace!(page = index, "page cache miss");

        // Read into the spare slot first; the queue and the free list are
        // only touched once the read has succeeded.
        let slot = *self.free.last().expect("cache pool exhausted");
        let base = slot * self.page_size;

        self.file
            .read_exact_at(
                &mut self.pool[base..base + self.page_size],
                self.page_size as u64 * u64::from(index),
            )
            .wrap_err_with(|| format!("failed to read page {index}"))?;

        let evicted = self.queue.push(index, slot);
        self.free.pop();

        if let Some((_, freed_slot)) = evicted {
            debug_assert!(self.free.len() <= self.cache_pages);
            self.free.push(freed_slot);
        }

        Ok(&self.pool[base + pos..base + end])
    }

    /// Copies `dst.len()` bytes of page `index` starting at byte `pos` into
    /// `dst`.
    pub fn read(&mut self, dst: &mut [u8], index: u32, pos: usize) -> Result<()> {
        let src = self.view(index, dst.len(), pos)?;
        dst.copy_from_slice(src);

        Ok(())
    }

    #[cfg(test)]
    fn pool_slots(&self) -> (usize, usize) {
        (self.free.len(), self.queue.len())
    }
}
