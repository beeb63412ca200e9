//! # Database Objects
//!
//! An *object* is a logically contiguous byte stream stitched together from
//! scattered pages. Its header page starts with a fixed part (magic, byte
//! length) followed by a placement table of 32-bit page indices filling the
//! rest of the page.
//!
//! ## Header Layouts
//!
//! Revision 8.2.14 (32-bit lengths, direct placement only):
//!
//! ```text
//! Offset  Size  Description
//! 0       4     Magic 0xFD1C
//! 4       4     Object length in bytes
//! 8       12    Reserved
//! 20      ...   Data-page indices, one u32 per object page
//! ```
//!
//! Revision 8.3.8 (64-bit lengths, optional two-level placement):
//!
//! ```text
//! Offset  Size  Description
//! 0       2     Magic 0xFD1C
//! 2       2     Placement kind: 0 = direct, 1 = two-level
//! 4       12    Reserved
//! 16      8     Object length in bytes
//! 24      ...   Page indices: data pages (direct) or placement-map pages
//! ```
//!
//! In two-level mode each header entry names a *placement map* page whose
//! entire contents are data-page indices (`page_size / 4` of them). Direct
//! mode addresses `(page_size - 24) / 4` pages; two-level mode multiplies
//! that by `page_size / 4`.
//!
//! The header is loaded once at construction and the placement entries are
//! kept for the object's life; placement-map pages are resolved through the
//! page cache on every read.

use eyre::{ensure, eyre, Result};
use tracing::debug;
use zerocopy::little_endian::{U16, U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::pages::{Pages, VERSION_8_2_14, VERSION_8_3_8};

/// Magic in the first bytes of every object header page.
pub const OBJECT_MAGIC: u16 = 0xFD1C;

/// Fixed header size before the placement entries, revision 8.2.14.
pub const OBJECT_HEADER_SIZE_8_2_14: usize = 20;

/// Fixed header size before the placement entries, revision 8.3.8.
pub const OBJECT_HEADER_SIZE_8_3_8: usize = 24;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct ObjectHeader82 {
    pub magic: U32,
    pub length: U32,
    pub reserved: [U32; 3],
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct ObjectHeader83 {
    pub magic: U16,
    pub pmt_type: U16,
    pub reserved: [U32; 3],
    pub length: U64,
}

const _: () = assert!(std::mem::size_of::<ObjectHeader82>() == OBJECT_HEADER_SIZE_8_2_14);
const _: () = assert!(std::mem::size_of::<ObjectHeader83>() == OBJECT_HEADER_SIZE_8_3_8);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Placement {
    /// Header entries are data-page indices.
    Direct,
    /// Header entries are placement-map pages full of data-page indices.
    TwoLevel,
}

/// A read-only byte stream reconstructed through an object's placement table.
#[derive(Debug)]
pub struct Object {
    index: u32,
    length: u64,
    placement: Placement,
    entries: Vec<u32>,
}

impl Object {
    /// Loads the object whose header page is `index`, dispatching on the
    /// database revision for the header layout.
    pub fn open(pages: &mut Pages, index: u32) -> Result<Self> {
        let page_size = pages.page_size();
        let mut header_page = vec![0u8; page_size];
        pages.read(&mut header_page, index, 0)?;

        let (length, placement, fixed_size) = match pages.version() {
            VERSION_8_2_14 => parse_header_82(index, &header_page)?,
            VERSION_8_3_8 => parse_header_83(index, &header_page)?,
            // Pages::open admits no other version.
            _ => unreachable!("unvalidated database version"),
        };

        let pages_used = length.div_ceil(page_size as u64);
        ensure!(
            pages_used <= u64::from(pages.size()),
            "object {} spans {} pages but the database has {}",
            index,
            pages_used,
            pages.size()
        );

        let entries = header_page[fixed_size..]
            .chunks_exact(4)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect();

        debug!(object = index, length, ?placement, "opened object");

        Ok(Self {
            index,
            length,
            placement,
            entries,
        })
    }

    /// Byte length of the stream.
    pub fn size(&self) -> u64 {
        self.length
    }

    /// Fills `dst` with the bytes at stream position `pos`, splitting the
    /// request into page-aligned slices resolved through the placement table.
    pub fn read(&self, pages: &mut Pages, dst: &mut [u8], pos: u64) -> Result<()> {
        let count = dst.len();
        let end = pos
            .checked_add(count as u64)
            .ok_or_else(|| eyre!("interval {}+{} overflows", pos, count))?;
        ensure!(
            end <= self.length,
            "interval {}+{} exceeds object {} size {}",
            pos,
            count,
            self.index,
            self.length
        );

        let page_size = pages.page_size();
        let mut page_num = (pos / page_size as u64) as u32;
        let mut pos_in_page = (pos % page_size as u64) as usize;
        let mut filled = 0;

        while filled < count {
            let to_read = (page_size - pos_in_page).min(count - filled);
            let page_index = self.data_page(pages, page_num)?;

            pages.read(&mut dst[filled..filled + to_read], page_index, pos_in_page)?;

            filled += to_read;
            pos_in_page = 0;
            page_num += 1;
        }

        Ok(())
    }

    /// Resolves object-relative page `page_num` to a database page index.
    fn data_page(&self, pages: &mut Pages, page_num: u32) -> Result<u32> {
        let page_num = page_num as usize;

        match self.placement {
            Placement::Direct => {
                ensure!(
                    page_num < self.entries.len(),
                    "page {} of object {} exceeds the placement table ({} entries)",
                    page_num,
                    self.index,
                    self.entries.len()
                );

                Ok(self.entries[page_num])
            }
            Placement::TwoLevel => {
                let per_map = pages.page_size() / 4;
                let map_num = page_num / per_map;

                ensure!(
                    map_num < self.entries.len(),
                    "page {} of object {} exceeds the placement table ({} map pages)",
                    page_num,
                    self.index,
                    self.entries.len()
                );

                let map_page = self.entries[map_num];
                let raw = pages.view(map_page, 4, (page_num % per_map) * 4)?;

                Ok(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            }
        }
    }
}

fn parse_header_82(index: u32, header_page: &[u8]) -> Result<(u64, Placement, usize)> {
    ensure!(
        header_page.len() >= OBJECT_HEADER_SIZE_8_2_14,
        "page size {} smaller than an object header",
        header_page.len()
    );

    let header = ObjectHeader82::ref_from_bytes(&header_page[..OBJECT_HEADER_SIZE_8_2_14])
        .map_err(|e| eyre!("failed to parse object header: {e:?}"))?;

    ensure!(
        header.magic.get() == u32::from(OBJECT_MAGIC),
        "object {} header corrupt (magic {:#x})",
        index,
        header.magic.get()
    );

    Ok((
        u64::from(header.length.get()),
        Placement::Direct,
        OBJECT_HEADER_SIZE_8_2_14,
    ))
}

fn parse_header_83(index: u32, header_page: &[u8]) -> Result<(u64, Placement, usize)> {
    ensure!(
        header_page.len() >= OBJECT_HEADER_SIZE_8_3_8,
        "page size {} smaller than an object header",
        header_page.len()
    );

    let header = ObjectHeader83::ref_from_bytes(&header_page[..OBJECT_HEADER_SIZE_8_3_8])
        .map_err(|e| eyre!("failed to parse object header: {e:?}"))?;

    ensure!(
        header.magic.get() == OBJECT_MAGIC,
        "object {} header corrupt (magic {:#x})",
        index,
        header.magic.get()
    );

    let placement = match header.pmt_type.get() {
        0 => Placement::Direct,
        1 => Placement::TwoLevel,
        other => eyre::bail!(
            "object {} header corrupt (placement kind {})",
            index,
            other
        ),
    };

    Ok((header.length.get(), placement, OBJECT_HEADER_SIZE_8_3_8))
}
