use std::io;

use thiserror::Error;

/// An error that can be produced while navigating or decoding a FITS file.
pub type Error = Box<FitsHduError>;

fn bytes2string(bytes: &[u8]) -> String {
  String::from_utf8_lossy(bytes).into()
}

pub(crate) fn new_io_err(err: io::Error) -> Error {
  FitsHduError::Io(err).into()
}

pub(crate) fn new_unexpected_eof(expected: usize, actual: usize) -> Error {
  FitsHduError::UnexpectedEof { expected, actual }.into()
}

pub(crate) fn new_missing_card_err(keyword: &str) -> Error {
  FitsHduError::MissingRequiredCard {
    keyword: keyword.into(),
  }
  .into()
}

pub(crate) fn new_malformed_card_err(record: &[u8]) -> Error {
  FitsHduError::MalformedCard {
    record: bytes2string(record),
  }
  .into()
}

pub(crate) fn new_unsupported_tform_err<T: Into<String>>(token: T) -> Error {
  FitsHduError::UnsupportedTForm {
    token: token.into(),
  }
  .into()
}

pub(crate) fn new_unsupported_repeat_err<T: Into<String>>(token: T) -> Error {
  FitsHduError::UnsupportedRepeat {
    token: token.into(),
  }
  .into()
}

pub(crate) fn new_row_size_mismatch_err(declared: u64, computed: u64) -> Error {
  FitsHduError::RowSizeMismatch { declared, computed }.into()
}

pub(crate) fn new_hdu_index_err(requested: usize, total: usize) -> Error {
  FitsHduError::HduIndexOutOfRange { requested, total }.into()
}

pub(crate) fn new_unknown_hdu_type_err<T: Into<String>>(xtension: T) -> Error {
  FitsHduError::UnknownHduType {
    xtension: xtension.into(),
  }
  .into()
}

pub(crate) fn new_malformed_bool_err(byte: u8) -> Error {
  FitsHduError::MalformedBool { byte }.into()
}

pub(crate) fn new_row_index_err(requested: u64, total: u64) -> Error {
  FitsHduError::RowIndexOutOfRange { requested, total }.into()
}

pub(crate) fn new_col_index_err(requested: usize, total: usize) -> Error {
  FitsHduError::ColumnIndexOutOfRange { requested, total }.into()
}

pub(crate) fn new_coord_err(axis: usize, requested: u64, axis_len: u64) -> Error {
  FitsHduError::CoordOutOfRange {
    axis,
    requested,
    axis_len,
  }
  .into()
}

pub(crate) fn new_dim_mismatch_err(expected: usize, actual: usize) -> Error {
  FitsHduError::DimensionMismatch { expected, actual }.into()
}

pub(crate) fn new_not_a_bintable_err<T: Into<String>>(kind: T) -> Error {
  FitsHduError::NotABinaryTable { kind: kind.into() }.into()
}

pub(crate) fn new_not_an_image_err<T: Into<String>>(kind: T) -> Error {
  FitsHduError::NotAnImage { kind: kind.into() }.into()
}

#[derive(Error, Debug)]
pub enum FitsHduError {
  // IO related
  #[error("I/O error: {0}.")]
  Io(#[from] io::Error),
  #[error("Unexpected end of data. Expected: {expected} bytes. Actual: {actual} bytes.")]
  UnexpectedEof { expected: usize, actual: usize },

  // Header related
  #[error("Required keyword record '{keyword}' not found in header.")]
  MissingRequiredCard { keyword: String },
  #[error("Unable to parse the value area of keyword record '{record}'.")]
  MalformedCard { record: String },

  // Schema related
  #[error("Unsupported TFORM value '{token}'.")]
  UnsupportedTForm { token: String },
  #[error("Unsupported repeat count in TFORM value '{token}'. Expected: 1 or absent.")]
  UnsupportedRepeat { token: String },
  #[error("Row size mismatch. NAXIS1: {declared} bytes. Sum of column sizes: {computed} bytes.")]
  RowSizeMismatch { declared: u64, computed: u64 },

  // Catalog related
  #[error("HDU index out of range. Requested: {requested}. Total: {total}.")]
  HduIndexOutOfRange { requested: usize, total: usize },
  #[error("Unknown XTENSION value '{xtension}'. Data size computed from NAXIS1*NAXIS2.")]
  UnknownHduType { xtension: String },
  #[error("Expected a BINTABLE HDU. Actual kind: '{kind}'.")]
  NotABinaryTable { kind: String },
  #[error("Expected an image HDU. Actual kind: '{kind}'.")]
  NotAnImage { kind: String },

  // Decoding related
  #[error("Invalid logical value byte 0x{byte:02X}. Expected: 'T', 'F' or 0x00.")]
  MalformedBool { byte: u8 },
  #[error("Row index out of range. Requested: {requested}. Total: {total}.")]
  RowIndexOutOfRange { requested: u64, total: u64 },
  #[error("Column index out of range. Requested: {requested}. Total: {total}.")]
  ColumnIndexOutOfRange { requested: usize, total: usize },
  #[error(
    "Coordinate out of range on axis {axis}. Requested: {requested}. Axis length: {axis_len}."
  )]
  CoordOutOfRange {
    axis: usize,
    requested: u64,
    axis_len: u64,
  },
  #[error("Wrong number of coordinates. Expected: {expected}. Actual: {actual}.")]
  DimensionMismatch { expected: usize, actual: usize },
}
