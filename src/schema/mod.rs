//! Derive a typed schema (column or image-element types) from a parsed
//! header, and the byte layouts used to decode the data segment.

use std::fmt::{Display, Formatter};

use crate::{
  common::header::Header,
  error::{
    new_malformed_card_err, new_missing_card_err, new_row_size_mismatch_err,
    new_unknown_hdu_type_err, Error,
  },
};

pub mod tform;

use self::tform::TForm;

/// One column of a binary table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
  /// 0-based column index.
  pub index: u32,
  /// Column name from `TTYPE{index+1}`, defaulting to `col{index+1}`.
  pub name: String,
  /// Column data type from `TFORM{index+1}`.
  pub form: TForm,
}

/// Byte layout of a BINTABLE data segment.
#[derive(Debug, Clone)]
pub struct BinaryTableLayout {
  columns: Vec<ColumnSpec>,
  /// Bytes per row (`NAXIS1`).
  row_bytes: u32,
  /// Number of rows (`NAXIS2`).
  row_count: u64,
  /// Cumulative column byte offsets; `split_offsets[0] = 0` and
  /// `split_offsets[n_cols] = row_bytes`.
  split_offsets: Vec<u32>,
}

impl BinaryTableLayout {
  pub fn columns(&self) -> &[ColumnSpec] {
    self.columns.as_slice()
  }

  pub fn n_cols(&self) -> usize {
    self.columns.len()
  }

  pub fn row_bytes(&self) -> u32 {
    self.row_bytes
  }

  pub fn row_count(&self) -> u64 {
    self.row_count
  }

  pub fn split_offsets(&self) -> &[u32] {
    self.split_offsets.as_slice()
  }

  /// Byte range of column `col` inside a row buffer.
  pub fn col_byte_range(&self, col: usize) -> std::ops::Range<usize> {
    self.split_offsets[col] as usize..self.split_offsets[col + 1] as usize
  }
}

/// Byte layout of an image data segment.
#[derive(Debug, Clone)]
pub struct ImageLayout {
  /// Raw `BITPIX` value; negative means floating point.
  bitpix: i32,
  /// Bytes per element, i.e. `|bitpix| / 8`.
  element_bytes: u32,
  /// Axis lengths, `NAXIS1` first. `NAXIS1` varies fastest in the data
  /// segment (FITS ordering is column-major).
  axes: Vec<u64>,
  element_type: TForm,
}

impl ImageLayout {
  pub fn bitpix(&self) -> i32 {
    self.bitpix
  }

  pub fn element_bytes(&self) -> u32 {
    self.element_bytes
  }

  pub fn axes(&self) -> &[u64] {
    self.axes.as_slice()
  }

  pub fn element_type(&self) -> TForm {
    self.element_type
  }

  /// Total number of elements, i.e. the product of the axis lengths
  /// (`0` for an empty image, `1` for `NAXIS = 0` is **not** the FITS rule:
  /// a zero-axis image holds no data).
  pub fn element_count(&self) -> u64 {
    if self.axes.is_empty() {
      0
    } else {
      self.axes.iter().product()
    }
  }

  pub fn data_byte_size(&self) -> u64 {
    self.element_bytes as u64 * self.element_count()
  }
}

/// The form of an emitted schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldForm {
  /// One scalar element per row (binary table column).
  Scalar(TForm),
  /// A whole array of elements (image HDU).
  ArrayOf(TForm),
}

impl Display for FieldForm {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Scalar(form) => write!(f, "{}", form),
      Self::ArrayOf(form) => write!(f, "[{}]", form),
    }
  }
}

/// One entry of the emitted, language-neutral, schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
  pub name: String,
  pub form: FieldForm,
  /// Always `true`: FITS logicals carry an explicit null byte and the
  /// outer layers treat every column as nullable.
  pub nullable: bool,
}

/// The typed schema of one HDU, together with its data-segment layout.
#[derive(Debug, Clone)]
pub enum Schema {
  BinaryTable(BinaryTableLayout),
  Image(ImageLayout),
}

impl Schema {
  /// Build the schema of the HDU owning the given header.
  ///
  /// Dispatches on the `XTENSION` card: absent (primary) or `IMAGE` builds
  /// an image schema, `BINTABLE` a table schema; any other extension fails
  /// with `UnknownHduType` (no partial schema is returned on any failure).
  pub fn build(header: &Header) -> Result<Self, Error> {
    match header.xtension()? {
      None | Some("IMAGE") => Self::build_image(header).map(Self::Image),
      Some("BINTABLE") => Self::build_bintable(header).map(Self::BinaryTable),
      Some(other) => Err(new_unknown_hdu_type_err(other)),
    }
  }

  fn build_bintable(header: &Header) -> Result<BinaryTableLayout, Error> {
    let row_bytes = positive_integer(header, "NAXIS1")?;
    let row_count = positive_integer(header, "NAXIS2")?;
    let n_cols = positive_integer(header, "TFIELDS")?;
    let mut columns = Vec::with_capacity(n_cols as usize);
    let mut split_offsets = Vec::with_capacity(n_cols as usize + 1);
    split_offsets.push(0_u32);
    for n in 1..=n_cols {
      let name = header
        .opt_string(format!("TTYPE{}", n).as_str())?
        .map(String::from)
        .unwrap_or_else(|| format!("col{}", n));
      let tform_kw = format!("TFORM{}", n);
      let form = header
        .string(tform_kw.as_str())
        .and_then(|value| value.trim().parse::<TForm>())?;
      // Unwrap ok: split_offsets is never empty.
      let offset = *split_offsets.last().unwrap() + form.byte_size();
      split_offsets.push(offset);
      columns.push(ColumnSpec {
        index: n as u32 - 1,
        name,
        form,
      });
    }
    // Unwrap ok: split_offsets is never empty.
    let computed = *split_offsets.last().unwrap() as u64;
    if computed != row_bytes {
      return Err(new_row_size_mismatch_err(row_bytes, computed));
    }
    Ok(BinaryTableLayout {
      columns,
      row_bytes: row_bytes as u32,
      row_count,
      split_offsets,
    })
  }

  fn build_image(header: &Header) -> Result<ImageLayout, Error> {
    let bitpix_card = header
      .get("BITPIX")
      .ok_or_else(|| new_missing_card_err("BITPIX"))?;
    let bitpix = bitpix_card.integer()?;
    let element_type = match bitpix {
      8 => TForm::UInt8,
      16 => TForm::Int16,
      32 => TForm::Int32,
      64 => TForm::Int64,
      -32 => TForm::Float32,
      -64 => TForm::Float64,
      _ => return Err(new_malformed_card_err(bitpix_card.raw())),
    };
    let n_axis = positive_integer(header, "NAXIS")?;
    let axes = (1..=n_axis)
      .map(|n| positive_integer(header, format!("NAXIS{}", n).as_str()))
      .collect::<Result<Vec<u64>, Error>>()?;
    Ok(ImageLayout {
      bitpix: bitpix as i32,
      element_bytes: bitpix.unsigned_abs() as u32 / 8,
      axes,
      element_type,
    })
  }

  /// The emitted schema: one scalar field per table column, or the single
  /// array field `Image` for an image HDU.
  pub fn fields(&self) -> Vec<Field> {
    match self {
      Self::BinaryTable(layout) => layout
        .columns
        .iter()
        .map(|col| Field {
          name: col.name.clone(),
          form: FieldForm::Scalar(col.form),
          nullable: true,
        })
        .collect(),
      Self::Image(layout) => vec![Field {
        name: String::from("Image"),
        form: FieldForm::ArrayOf(layout.element_type),
        nullable: true,
      }],
    }
  }

  pub fn as_bintable(&self) -> Option<&BinaryTableLayout> {
    match self {
      Self::BinaryTable(layout) => Some(layout),
      _ => None,
    }
  }

  pub fn as_image(&self) -> Option<&ImageLayout> {
    match self {
      Self::Image(layout) => Some(layout),
      _ => None,
    }
  }
}

/// Integer value of the given keyword, refusing negative values
/// (keeps the raw card in the error for diagnostics).
fn positive_integer(header: &Header, keyword: &str) -> Result<u64, Error> {
  let card = header
    .get(keyword)
    .ok_or_else(|| new_missing_card_err(keyword))?;
  card
    .integer()
    .and_then(|value| u64::try_from(value).map_err(|_| new_malformed_card_err(card.raw())))
}
