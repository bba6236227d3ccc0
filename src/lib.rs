//! Navigate and decode the HDUs of a FITS file.
//!
//! A FITS file is a sequence of Header-Data Units whose byte boundaries
//! are implicit: each header must be interpreted to know where the next
//! HDU starts. This crate walks that sequence over any seekable byte
//! source, parses headers into typed keyword records, derives column or
//! image-element schemas and decodes the big-endian data segment into
//! tagged values.
//!
//! ```no_run
//! use fitshdu::{FileSource, HduCatalog};
//!
//! # fn main() -> Result<(), fitshdu::Error> {
//! let mut catalog = HduCatalog::new(FileSource::open("catalog.fits")?);
//! let mut table = catalog.open_bintable(1)?;
//! for row_index in 0..table.row_count() {
//!   let row = table.read_row(row_index)?;
//!   println!("{:?}", row);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Out of scope by design: writing FITS files, variable length arrays
//! (heap), ASCII tables, tile compression, WCS and BSCALE/BZERO scaling
//! (values are returned unscaled).

pub mod common;
pub mod error;
pub mod hdu;
pub mod read;
pub mod schema;
pub mod value;

pub use crate::{
  common::{
    card::{HeaderCard, ScalarValue},
    header::{Header, HeaderParser},
  },
  error::{Error, FitsHduError},
  hdu::{bintable::BinaryTableHdu, image::ImageHdu, HduView},
  read::{
    catalog::{CatalogWarning, HduBoundaries, HduCatalog, HduEntry, HduKind},
    source::{FileSource, MmapSource, SeekableByteSource, SliceSource},
  },
  schema::{
    tform::TForm, BinaryTableLayout, ColumnSpec, Field, FieldForm, ImageLayout, Schema,
  },
  value::TypedValue,
};
