//! # BLOB Streams
//!
//! Long values (unbounded strings, binary attachments, table descriptors)
//! live outside table rows, in objects organised as arrays of 256-byte
//! blocks forming singly linked chains:
//!
//! ```text
//! Offset  Size  Description
//! 0       4     Index of the next block in the chain; 0 terminates
//! 4       2     Bytes used in this block, 0..=250
//! 6       250   Data
//! ```
//!
//! Block 0 of a BLOB object is never part of a chain: index 0 is the
//! end-of-chain sentinel. Chains are walked with an iteration cap of the
//! object's total block count, so a corrupt cyclic chain is detected instead
//! of spinning.
//!
//! Two helpers round out the layer: [`decompress`] inflates the raw DEFLATE
//! streams (no zlib wrapper) some BLOB values are stored in, and
//! [`utf8_text`] decodes the BOM-prefixed UTF-8 strings of text BLOBs.

use eyre::{bail, ensure, eyre, Result};
use flate2::{Decompress, FlushDecompress, Status};
use zerocopy::little_endian::{U16, U32};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::object::Object;
use crate::pages::Pages;

/// On-disk size of one BLOB block.
pub const BLOB_BLOCK_SIZE: usize = 256;

/// Data capacity of one BLOB block.
pub const BLOB_BLOCK_DATA: usize = 250;

const UTF8_BOM: [u8; 3] = [0xEF, 0xBB, 0xBF];

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct BlobBlock {
    pub nextblock: U32,
    pub length: U16,
    pub data: [u8; BLOB_BLOCK_DATA],
}

const _: () = assert!(std::mem::size_of::<BlobBlock>() == BLOB_BLOCK_SIZE);

/// Reader over the block chains of one BLOB object.
#[derive(Debug)]
pub struct Blob {
    object: Object,
    block_count: u32,
}

impl Blob {
    /// Opens the object at page `index` and validates that it is shaped like
    /// a BLOB: a non-zero byte size that is a whole number of blocks.
    pub fn open(pages: &mut Pages, index: u32) -> Result<Self> {
        let object = Object::open(pages, index)?;
        let size = object.size();

        ensure!(
            size != 0 && size % BLOB_BLOCK_SIZE as u64 == 0,
            "blob object {} has invalid size {}",
            index,
            size
        );

        let block_count = size / BLOB_BLOCK_SIZE as u64;
        ensure!(
            block_count <= u64::from(u32::MAX),
            "blob object {} has too many blocks ({})",
            index,
            block_count
        );

        Ok(Self {
            object,
            block_count: block_count as u32,
        })
    }

    /// Collects the chain starting at block `start` into one byte vector.
    ///
    /// When `expected_size` is given, the chain must assemble to exactly that
    /// many bytes; any block that would overshoot it fails early.
    pub fn get(
        &self,
        pages: &mut Pages,
        start: u32,
        expected_size: Option<usize>,
    ) -> Result<Vec<u8>> {
        ensure!(start != 0, "blob chain cannot start at block 0");

        let mut result = Vec::with_capacity(expected_size.unwrap_or(0));
        let mut index = start;
        let mut raw = [0u8; BLOB_BLOCK_SIZE];

        // A valid chain visits each block at most once; running past the
        // block count means the links are cyclic.
        for _ in 0..self.block_count {
            ensure!(
                index < self.block_count,
                "block {} exceeds blob size ({} blocks)",
                index,
                self.block_count
            );

            self.object
                .read(pages, &mut raw, BLOB_BLOCK_SIZE as u64 * u64::from(index))?;

            let block = BlobBlock::ref_from_bytes(&raw)
                .map_err(|e| eyre!("failed to parse blob block: {e:?}"))?;

            let data_len = usize::from(block.length.get());
            let next = block.nextblock.get();

            ensure!(
                data_len <= BLOB_BLOCK_DATA && (data_len != 0 || next == 0),
                "block {} has invalid length {}",
                index,
                data_len
            );

            if let Some(limit) = expected_size {
                ensure!(
                    result.len() + data_len <= limit,
                    "blob chain exceeds the expected {} bytes",
                    limit
                );
            }

            result.extend_from_slice(&block.data[..data_len]);

            if next == 0 {
                if let Some(limit) = expected_size {
                    ensure!(
                        result.len() == limit,
                        "blob chain holds {} bytes, expected {}",
                        result.len(),
                        limit
                    );
                }

                return Ok(result);
            }

            index = next;
        }

        bail!("loop detected in blob chain starting at block {}", start)
    }

    /// Block count of the underlying object.
    pub fn block_count(&self) -> u32 {
        self.block_count
    }
}

/// Inflates a raw DEFLATE stream (window bits -15: no zlib header, no
/// checksum).
///
/// The output buffer starts at the input size and doubles on exhaustion,
/// or grows by the remaining headroom once doubling would overshoot
/// `max_size`. Fails when the output would exceed `max_size` or the input
/// ends before the stream terminates.
pub fn decompress(src: &[u8], max_size: usize) -> Result<Vec<u8>> {
    if src.is_empty() {
        return Ok(Vec::new());
    }

    ensure!(
        src.len() <= max_size,
        "compressed input of {} bytes exceeds the {} byte limit",
        src.len(),
        max_size
    );

    let mut inflater = Decompress::new(false);
    let mut dst = vec![0u8; src.len()];

    loop {
        let consumed = inflater.total_in() as usize;
        let produced = inflater.total_out() as usize;

        let status = inflater
            .decompress(&src[consumed..], &mut dst[produced..], FlushDecompress::None)
            .map_err(|e| eyre!("inflate failed: {e}"))?;

        if status == Status::StreamEnd {
            dst.truncate(inflater.total_out() as usize);
            return Ok(dst);
        }

        ensure!(
            dst.len() < max_size,
            "decompressed data exceeds the {} byte limit",
            max_size
        );

        // Double the buffer, or take the remaining headroom when doubling
        // would overshoot the limit.
        let headroom = max_size - dst.len();
        if headroom < dst.len() {
            dst.resize(dst.len() + headroom, 0);
        } else {
            dst.resize(dst.len() * 2, 0);
        }

        ensure!(
            (inflater.total_in() as usize) < src.len(),
            "compressed stream ended prematurely"
        );
    }
}

/// Decodes a BOM-prefixed UTF-8 text BLOB into a string.
///
/// The three-byte BOM `EF BB BF` is mandatory; a BOM with an empty body is
/// the empty string.
pub fn utf8_text(src: &[u8]) -> Result<String> {
    ensure!(
        src.len() >= 3 && src[..3] == UTF8_BOM,
        "blob data does not start with a UTF-8 BOM"
    );

    let body = &src[3..];
    if body.is_empty() {
        return Ok(String::new());
    }

    let text =
        std::str::from_utf8(body).map_err(|e| eyre!("blob text is not valid UTF-8: {e}"))?;

    Ok(text.to_owned())
}
