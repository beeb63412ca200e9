//! # Root Catalog and Table Descriptors
//!
//! The object at page 2 is a BLOB whose first chain (block 1) is the table
//! catalog:
//!
//! ```text
//! Offset  Size  Description
//! 0       32    Language tag, NUL-padded (e.g. "ru_RU")
//! 32      4     Table count
//! 36      ...   One u32 per table: first block of its descriptor chain
//! ```
//!
//! Each descriptor chain holds a textual, brace-and-quote description of one
//! table:
//!
//! ```text
//! {"V8USERS",0,
//! {"Fields",
//! {"NAME","NVC",1,64,0,"CI"},
//! {"SHOW","L",0,0,0,"CS"}
//! },
//! {"Recordlock","0"},
//! {"Files",5,6,0}
//! }
//! ```
//!
//! The parser extracts the table name (anchored at the start, since the name
//! opens the descriptor), the field declarations, the record-lock flag and
//! the three object page indices of the `Files` section (records, BLOB,
//! indexes). Everything else in the descriptor is ignored.
//!
//! Descriptor text is decoded as UTF-8.

use std::sync::OnceLock;

use eyre::{bail, ensure, eyre, Result};
use regex::Regex;
use tracing::debug;
use zerocopy::little_endian::U32;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::blob::Blob;
use crate::fields::{FieldParams, FieldType};
use crate::pages::Pages;

/// Page index of the root catalog object.
pub const ROOT_OBJECT_PAGE: u32 = 2;

/// Size of the catalog prefix before the table list.
pub const ROOT_PREFIX_SIZE: usize = 36;

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub(crate) struct RootPrefix {
    pub language: [u8; 32],
    pub table_count: U32,
}

const _: () = assert!(std::mem::size_of::<RootPrefix>() == ROOT_PREFIX_SIZE);

/// Everything the driver needs to know about one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableParams {
    pub name: String,
    pub columns: Vec<FieldParams>,
    pub record_lock: bool,
    /// Page index of the object holding the table records.
    pub records_index: u32,
    /// Page index of the table's BLOB object.
    pub blob_index: u32,
    /// Page index of the table's index object (not consumed by this driver).
    pub indexes_index: u32,
}

/// The table catalog of an opened database.
#[derive(Debug)]
pub struct Root {
    blob: Blob,
    language: String,
    tables: Vec<u32>,
}

impl Root {
    /// Loads the catalog chain of the root object.
    pub fn open(pages: &mut Pages) -> Result<Self> {
        let blob = Blob::open(pages, ROOT_OBJECT_PAGE)?;
        let data = blob.get(pages, 1, None)?;

        ensure!(
            data.len() >= ROOT_PREFIX_SIZE,
            "root catalog of {} bytes is too small",
            data.len()
        );

        let prefix = RootPrefix::ref_from_bytes(&data[..ROOT_PREFIX_SIZE])
            .map_err(|e| eyre!("failed to parse root catalog: {e:?}"))?;

        let table_count = prefix.table_count.get() as usize;
        ensure!(
            (data.len() - ROOT_PREFIX_SIZE) / 4 == table_count,
            "root catalog of {} bytes disagrees with its table count {}",
            data.len(),
            table_count
        );

        let tables = data[ROOT_PREFIX_SIZE..ROOT_PREFIX_SIZE + table_count * 4]
            .chunks_exact(4)
            .map(|raw| u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
            .collect();

        let nul = prefix
            .language
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(prefix.language.len());
        let language = String::from_utf8_lossy(&prefix.language[..nul]).into_owned();

        debug!(tables = table_count, language = %language, "loaded root catalog");

        Ok(Self {
            blob,
            language,
            tables,
        })
    }

    /// Number of tables in the database.
    pub fn size(&self) -> u32 {
        self.tables.len() as u32
    }

    /// Language tag of the database (e.g. `ru_RU`).
    pub fn language(&self) -> &str {
        &self.language
    }

    /// Raw descriptor text of table `num`.
    pub fn read(&self, pages: &mut Pages, num: u32) -> Result<String> {
        ensure!(
            (num as usize) < self.tables.len(),
            "table {} out of range (tables={})",
            num,
            self.tables.len()
        );

        let data = self.blob.get(pages, self.tables[num as usize], None)?;

        String::from_utf8(data).map_err(|e| eyre!("table descriptor is not valid UTF-8: {e}"))
    }

    /// Descriptor of table `num`, parsed.
    pub fn get(&self, pages: &mut Pages, num: u32) -> Result<TableParams> {
        let descriptor = self.read(pages, num)?;

        TableParams::parse(&descriptor)
    }
}

impl TableParams {
    /// Parses a textual table descriptor.
    pub fn parse(descriptor: &str) -> Result<Self> {
        let name = parse_name(descriptor)?;
        let columns = parse_fields(descriptor)?;
        let record_lock = parse_lock(descriptor)?;
        let [records_index, blob_index, indexes_index] = parse_files(descriptor)?;

        Ok(Self {
            name,
            columns,
            record_lock,
            records_index,
            blob_index,
            indexes_index,
        })
    }
}

fn name_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"^\{"([^"]+)""#).expect("hard-coded pattern"))
}

fn field_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{"([^"]+)","([^"]+)",([0-9]+),([0-9]+),([0-9]+),"([^"]+)"\}"#)
            .expect("hard-coded pattern")
    })
}

fn lock_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"\{"Recordlock","([0-9])"\}"#).expect("hard-coded pattern"))
}

fn files_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"\{"Files",([0-9]+),([0-9]+),([0-9]+)\}"#).expect("hard-coded pattern")
    })
}

fn parse_name(descriptor: &str) -> Result<String> {
    let captures = name_pattern()
        .captures(descriptor)
        .ok_or_else(|| eyre!("table name not found in descriptor"))?;

    Ok(captures[1].to_owned())
}

fn parse_fields(descriptor: &str) -> Result<Vec<FieldParams>> {
    let mut columns = Vec::new();

    for captures in field_pattern().captures_iter(descriptor) {
        let name = captures[1].to_owned();

        let field_type = field_type_from_code(&captures[2])
            .ok_or_else(|| eyre!("field '{}' has unknown type code '{}'", name, &captures[2]))?;

        let null_exists = parse_number::<u32>(&captures[3])? != 0;
        let length = parse_number::<usize>(&captures[4])?;
        let precision = parse_number::<usize>(&captures[5])?;

        let case_sensitive = match &captures[6] {
            "CS" => true,
            "CI" => false,
            other => bail!("field '{}' has unknown case token '{}'", name, other),
        };

        columns.push(FieldParams {
            name,
            field_type,
            null_exists,
            length,
            precision,
            case_sensitive,
        });
    }

    Ok(columns)
}

fn parse_lock(descriptor: &str) -> Result<bool> {
    let captures = lock_pattern()
        .captures(descriptor)
        .ok_or_else(|| eyre!("'Recordlock' parameter not found in descriptor"))?;

    Ok(&captures[1] == "1")
}

fn parse_files(descriptor: &str) -> Result<[u32; 3]> {
    let captures = files_pattern()
        .captures(descriptor)
        .ok_or_else(|| eyre!("'Files' parameters not found in descriptor"))?;

    Ok([
        parse_number(&captures[1])?,
        parse_number(&captures[2])?,
        parse_number(&captures[3])?,
    ])
}

fn field_type_from_code(code: &str) -> Option<FieldType> {
    Some(match code {
        "B" => FieldType::Binary,
        "L" => FieldType::Boolean,
        "N" => FieldType::Digit,
        "NC" => FieldType::StrFix,
        "NVC" => FieldType::StrVar,
        "RV" => FieldType::Version,
        "NT" => FieldType::StrBlob,
        "I" => FieldType::BinBlob,
        "DT" => FieldType::DateTime,
        _ => return None,
    })
}

fn parse_number<T: std::str::FromStr>(digits: &str) -> Result<T> {
    digits
        .parse()
        .map_err(|_| eyre!("malformed number '{}' in descriptor", digits))
}
