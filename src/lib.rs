//! # onecd: Read-Only Driver for 1C:Enterprise 8 File Databases
//!
//! `onecd` reads the single-file databases (`.1CD`) of the 1C:Enterprise 8
//! application platform without any dependency on the platform itself. It
//! understands two on-disk format revisions side by side:
//!
//! - **8.2.14** (`0x000E0208`): fixed 4 KiB pages, 32-bit object sizes,
//!   direct placement maps only.
//! - **8.3.8** (`0x00080308`): page sizes of 4 to 64 KiB, 64-bit object sizes,
//!   optional two-level placement maps for large objects.
//!
//! ## Architecture
//!
//! Strictly pull-based, leaves at the bottom:
//!
//! ```text
//! ┌────────────────────────────────────────────┐
//! │  Root catalog + descriptor parser (root)   │
//! ├──────────────────────┬─────────────────────┤
//! │  Records cursor      │  BLOB chains (blob) │
//! │  + field decoders    │  + inflate + UTF-8  │
//! ├──────────────────────┴─────────────────────┤
//! │  Objects: placement-mapped byte streams    │
//! ├────────────────────────────────────────────┤
//! │  Pages: header, buffer pool, 2Q cache      │
//! ├────────────────────────────────────────────┤
//! │  Positioned file reads (file)              │
//! └────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```ignore
//! use onecd::{fields, Pages, Records, Root};
//!
//! let mut pages = Pages::open("base.1cd", 64)?;
//! let root = Root::open(&mut pages)?;
//!
//! for num in 0..root.size() {
//!     let table = root.get(&mut pages, num)?;
//!     println!("{} ({} columns)", table.name, table.columns.len());
//! }
//!
//! let users = root.get(&mut pages, 0)?;
//! let mut records = Records::open(&mut pages, users.records_index, &users.columns)?;
//! let name_column = records.field_index("NAME")?;
//!
//! for index in 0..records.size() {
//!     records.seek(&mut pages, index)?;
//!     if !records.is_deleted() {
//!         if let Some(name) = records.get::<fields::StrVar>(name_column)? {
//!             println!("{name}");
//!         }
//!     }
//! }
//! ```
//!
//! ## Concurrency
//!
//! The driver is single-threaded by design: one [`Pages`] owns the page
//! cache, and every cursor built on it takes `&mut Pages` per call, so the
//! borrow checker serialises all access. Independent `Pages` over distinct
//! files do not share anything.
//!
//! ## Scope
//!
//! Read-only. Index traversal, record locks and packed-decimal decoding are
//! out of scope; `Digit` fields come back as raw bytes.

pub mod blob;
pub mod cache;
pub mod error;
mod file;
pub mod fields;
pub mod object;
pub mod pages;
pub mod records;
pub mod root;

pub use blob::Blob;
pub use error::OpenError;
pub use fields::{FieldKind, FieldParams, FieldType};
pub use object::Object;
pub use pages::{Pages, VERSION_8_2_14, VERSION_8_3_8};
pub use records::Records;
pub use root::{Root, TableParams};
