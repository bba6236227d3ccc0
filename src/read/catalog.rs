//! Locate HDUs by walking the file from offset 0.
//!
//! FITS has no central directory: the byte boundaries of the `n`-th HDU are
//! only known once the headers of HDUs `0..n` have been interpreted. The
//! walk is cheap (a few header blocks per HDU) and deterministic, so
//! concurrent readers simply re-run it on independent source handles
//! instead of sharing state.

use std::fmt::{Display, Formatter};

use log::{debug, warn};

use crate::{
  common::{header::Header, header::HeaderParser, padded_len},
  error::{new_hdu_index_err, new_not_a_bintable_err, new_not_an_image_err, Error},
  hdu::{bintable::BinaryTableHdu, image::ImageHdu, HduView},
  read::source::SeekableByteSource,
  schema::Schema,
};

/// The four byte offsets delimiting one HDU.
///
/// Invariants: `header_start <= data_start <= data_stop <= hdu_stop`;
/// `data_start - header_start` and `hdu_stop - header_start` are multiples
/// of 2880. An HDU with no data satisfies `data_start = data_stop`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HduBoundaries {
  /// First byte of the header.
  pub header_start: u64,
  /// First byte of the data segment (the byte after the padded header).
  pub data_start: u64,
  /// Byte after the last data byte (padding excluded).
  pub data_stop: u64,
  /// Byte after the padded data segment; the next HDU starts here.
  pub hdu_stop: u64,
}

/// The flavor of an HDU, from its `SIMPLE`/`XTENSION` leading card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HduKind {
  /// The first HDU; always an image, possibly empty.
  Primary,
  /// `XTENSION = 'IMAGE   '`.
  Image,
  /// `XTENSION = 'BINTABLE'`.
  BinTable,
  /// `XTENSION = 'TABLE   '`; located and skipped, never decoded.
  AsciiTable,
  /// Any other `XTENSION` value (or a missing leading card).
  Unknown(String),
}

impl Display for HduKind {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Primary => f.write_str("PRIMARY"),
      Self::Image => f.write_str("IMAGE"),
      Self::BinTable => f.write_str("BINTABLE"),
      Self::AsciiTable => f.write_str("TABLE"),
      Self::Unknown(xtension) => f.write_str(xtension.as_str()),
    }
  }
}

/// Non-fatal oddity noticed while walking, attached to the entry it
/// concerns (the walk itself never prints anything).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogWarning {
  /// The `XTENSION` value is not one of `IMAGE`, `TABLE`, `BINTABLE`;
  /// the data size was computed from `NAXIS1 * NAXIS2` as a best effort.
  UnknownHduType { xtension: String },
}

impl Display for CatalogWarning {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::UnknownHduType { xtension } => write!(
        f,
        "unknown XTENSION '{}': data size taken from NAXIS1*NAXIS2",
        xtension
      ),
    }
  }
}

/// One walked HDU: its boundaries, flavor and parsed header.
#[derive(Debug, Clone)]
pub struct HduEntry {
  pub boundaries: HduBoundaries,
  pub kind: HduKind,
  pub header: Header,
  pub warnings: Vec<CatalogWarning>,
}

/// Walks a [SeekableByteSource] from offset 0 and caches the boundaries of
/// the HDUs found, in file order.
///
/// The catalog owns the source handle (and therefore its cursor): typed
/// views returned by [HduCatalog::open] borrow it mutably one at a time.
pub struct HduCatalog<S: SeekableByteSource> {
  source: S,
  entries: Vec<HduEntry>,
  /// Set once the walk hit the end of the source (or a broken header);
  /// `entries.len()` is then the total number of HDUs.
  exhausted: bool,
}

impl<S: SeekableByteSource> HduCatalog<S> {
  pub fn new(source: S) -> Self {
    Self {
      source,
      entries: Vec::new(),
      exhausted: false,
    }
  }

  /// Give the source handle back (e.g. to re-open it elsewhere).
  pub fn into_source(self) -> S {
    self.source
  }

  /// Boundaries and header of the `index`-th HDU (0 is the primary),
  /// walking and caching as needed.
  /// Fails with `HduIndexOutOfRange` when the file holds fewer HDUs.
  pub fn locate(&mut self, index: usize) -> Result<&HduEntry, Error> {
    while self.entries.len() <= index && !self.exhausted {
      self.walk_next();
    }
    let total = self.entries.len();
    self
      .entries
      .get(index)
      .ok_or_else(|| new_hdu_index_err(index, total))
  }

  /// Total number of HDUs: walks until the source is exhausted (or the
  /// first broken header) and returns the count of HDUs parsed before
  /// that point.
  pub fn count(&mut self) -> usize {
    while !self.exhausted {
      self.walk_next();
    }
    self.entries.len()
  }

  /// The entries walked so far.
  pub fn entries(&self) -> &[HduEntry] {
    self.entries.as_slice()
  }

  /// Open a typed view on the `index`-th HDU. The view borrows the
  /// catalog's source handle; boundaries and schema stay cached, so
  /// re-opening is cheap.
  pub fn open(&mut self, index: usize) -> Result<HduView<'_, S>, Error> {
    let (data_start, schema) = {
      let entry = self.locate(index)?;
      (entry.boundaries.data_start, Schema::build(&entry.header)?)
    };
    Ok(match schema {
      Schema::BinaryTable(layout) => {
        HduView::BinaryTable(BinaryTableHdu::new(&mut self.source, data_start, layout))
      }
      Schema::Image(layout) => HduView::Image(ImageHdu::new(&mut self.source, data_start, layout)),
    })
  }

  /// Open the `index`-th HDU, which must be a binary table.
  pub fn open_bintable(&mut self, index: usize) -> Result<BinaryTableHdu<'_, S>, Error> {
    let kind = self.locate(index)?.kind.clone();
    match self.open(index)? {
      HduView::BinaryTable(hdu) => Ok(hdu),
      HduView::Image(_) => Err(new_not_a_bintable_err(kind.to_string())),
    }
  }

  /// Open the `index`-th HDU, which must be an image (or the primary).
  pub fn open_image(&mut self, index: usize) -> Result<ImageHdu<'_, S>, Error> {
    let kind = self.locate(index)?.kind.clone();
    match self.open(index)? {
      HduView::Image(hdu) => Ok(hdu),
      HduView::BinaryTable(_) => Err(new_not_an_image_err(kind.to_string())),
    }
  }

  /// Parse one more HDU at the current end of the catalog. Any failure
  /// (end of source included) marks the catalog exhausted: the walk
  /// returns what was accumulated so far.
  fn walk_next(&mut self) {
    let header_start = self
      .entries
      .last()
      .map(|entry| entry.boundaries.hdu_stop)
      .unwrap_or(0);
    let header = match HeaderParser::read(&mut self.source, header_start) {
      Ok(header) => header,
      Err(err) => {
        debug!("HDU walk ends at offset {}: {}", header_start, err);
        self.exhausted = true;
        return;
      }
    };
    let (kind, warnings) = hdu_kind(&header, self.entries.is_empty());
    let data_len = match data_byte_size(&header, &kind) {
      Ok(len) => len,
      Err(err) => {
        debug!(
          "HDU walk ends at offset {}: broken {} header: {}",
          header_start, kind, err
        );
        self.exhausted = true;
        return;
      }
    };
    let data_start = header_start + header.byte_size() as u64;
    let boundaries = HduBoundaries {
      header_start,
      data_start,
      data_stop: data_start + data_len,
      hdu_stop: data_start + padded_len(data_len),
    };
    debug!(
      "HDU {} ({}): header [{}, {}), data [{}, {}), next at {}",
      self.entries.len(),
      kind,
      header_start,
      data_start,
      data_start,
      boundaries.data_stop,
      boundaries.hdu_stop
    );
    self.entries.push(HduEntry {
      boundaries,
      kind,
      header,
      warnings,
    });
  }
}

/// Flavor of the HDU owning the given header, from its leading card.
fn hdu_kind(header: &Header, is_first: bool) -> (HduKind, Vec<CatalogWarning>) {
  let leading = header.cards().first();
  match leading.map(|card| card.keyword()) {
    Some("SIMPLE") => (HduKind::Primary, Vec::new()),
    Some("XTENSION") => {
      // Unwrap ok: tested just above.
      let xtension = leading
        .unwrap()
        .name()
        .map(str::trim_ascii)
        .unwrap_or("")
        .to_string();
      match xtension.as_str() {
        "IMAGE" => (HduKind::Image, Vec::new()),
        "TABLE" => (HduKind::AsciiTable, Vec::new()),
        "BINTABLE" => (HduKind::BinTable, Vec::new()),
        _ => {
          warn!("XTENSION value '{}' not recognized.", xtension);
          let warning = CatalogWarning::UnknownHduType {
            xtension: xtension.clone(),
          };
          (HduKind::Unknown(xtension), vec![warning])
        }
      }
    }
    _ if is_first => (HduKind::Primary, Vec::new()),
    Some(keyword) => {
      warn!("Leading keyword '{}' is neither SIMPLE nor XTENSION.", keyword);
      let warning = CatalogWarning::UnknownHduType {
        xtension: keyword.to_string(),
      };
      (HduKind::Unknown(keyword.to_string()), vec![warning])
    }
    None => (HduKind::Unknown(String::new()), Vec::new()),
  }
}

/// Size, in bytes, of the data segment (padding excluded).
fn data_byte_size(header: &Header, kind: &HduKind) -> Result<u64, Error> {
  match kind {
    HduKind::Primary | HduKind::Image => {
      let bitpix = header.integer("BITPIX")?;
      let n_axis = header.integer("NAXIS")?.max(0);
      if n_axis == 0 {
        return Ok(0);
      }
      let mut count = 1_u64;
      for n in 1..=n_axis {
        count *= header.integer(format!("NAXIS{}", n).as_str())?.max(0) as u64;
      }
      Ok((bitpix.unsigned_abs() / 8) * count)
    }
    HduKind::BinTable => {
      let main =
        header.integer("NAXIS1")?.max(0) as u64 * header.integer("NAXIS2")?.max(0) as u64;
      // The heap (variable length arrays) is part of the HDU data segment:
      // skipping the HDU must account for its PCOUNT bytes even though
      // heap decoding is unsupported.
      let heap = header.opt_integer("PCOUNT")?.unwrap_or(0).max(0) as u64;
      Ok(main + heap)
    }
    HduKind::AsciiTable => {
      Ok(header.integer("NAXIS1")?.max(0) as u64 * header.integer("NAXIS2")?.max(0) as u64)
    }
    // Best effort on an unknown extension: NAXIS1 * NAXIS2, axes missing
    // or unreadable counted as 0.
    HduKind::Unknown(_) => {
      let naxis1 = header.opt_integer("NAXIS1").ok().flatten().unwrap_or(0).max(0);
      let naxis2 = header.opt_integer("NAXIS2").ok().flatten().unwrap_or(0).max(0);
      Ok(naxis1 as u64 * naxis2 as u64)
    }
  }
}
