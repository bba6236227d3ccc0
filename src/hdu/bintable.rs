//! Decode the rows of a BINTABLE HDU.

use crate::{
  error::{new_col_index_err, new_row_index_err, Error},
  read::source::SeekableByteSource,
  schema::BinaryTableLayout,
  value::{RawBytes, TypedValue},
};

/// A typed view on a binary table: fixed-width rows of big-endian columns.
///
/// Rows are decoded by a flat left-to-right pass over the layout's split
/// offsets. The view seeks the shared source cursor, so it must stay on a
/// single thread; bulk readers that fetch row bytes themselves can decode
/// through [BinaryTableHdu::read_row_from_buffer] without any I/O.
#[derive(Debug)]
pub struct BinaryTableHdu<'s, S: SeekableByteSource> {
  source: &'s mut S,
  /// Offset of the first row in the source.
  data_start: u64,
  layout: BinaryTableLayout,
}

impl<'s, S: SeekableByteSource> BinaryTableHdu<'s, S> {
  pub(crate) fn new(source: &'s mut S, data_start: u64, layout: BinaryTableLayout) -> Self {
    Self {
      source,
      data_start,
      layout,
    }
  }

  pub fn layout(&self) -> &BinaryTableLayout {
    &self.layout
  }

  /// Number of rows (`NAXIS2`).
  pub fn row_count(&self) -> u64 {
    self.layout.row_count()
  }

  /// Seek to and decode the `row_index`-th row (0-based).
  pub fn read_row(&mut self, row_index: u64) -> Result<Vec<TypedValue>, Error> {
    if row_index >= self.layout.row_count() {
      return Err(new_row_index_err(row_index, self.layout.row_count()));
    }
    let row_bytes = self.layout.row_bytes() as usize;
    let mut buf = vec![0_u8; row_bytes];
    let offset = self.data_start + row_index * row_bytes as u64;
    self.source.read_exact_at(offset, &mut buf)?;
    self.read_row_from_buffer(buf.as_slice())
  }

  /// Decode one row from bytes already in memory (no I/O). The buffer must
  /// hold at least `row_bytes` bytes, otherwise `UnexpectedEof`.
  pub fn read_row_from_buffer(&self, buf: &[u8]) -> Result<Vec<TypedValue>, Error> {
    let bytes = RawBytes::new(buf);
    let offsets = self.layout.split_offsets();
    self
      .layout
      .columns()
      .iter()
      .zip(offsets.iter())
      .map(|(col, from)| bytes.decode(&col.form, *from as usize))
      .collect()
  }

  /// Decode one column over the row range `[row_start, row_stop)`, reading
  /// one element per row with a stride of `row_bytes`.
  pub fn read_column_range(
    &mut self,
    col_index: usize,
    row_start: u64,
    row_stop: u64,
  ) -> Result<Vec<TypedValue>, Error> {
    if col_index >= self.layout.n_cols() {
      return Err(new_col_index_err(col_index, self.layout.n_cols()));
    }
    if row_stop > self.layout.row_count() {
      return Err(new_row_index_err(row_stop, self.layout.row_count()));
    }
    if row_start > row_stop {
      return Err(new_row_index_err(row_start, row_stop));
    }
    let form = self.layout.columns()[col_index].form;
    let col_offset = self.layout.split_offsets()[col_index] as u64;
    let row_bytes = self.layout.row_bytes() as u64;
    let mut buf = vec![0_u8; form.byte_size() as usize];
    let mut values = Vec::with_capacity((row_stop - row_start) as usize);
    for row in row_start..row_stop {
      let offset = self.data_start + row * row_bytes + col_offset;
      self.source.read_exact_at(offset, &mut buf)?;
      values.push(RawBytes::new(buf.as_slice()).decode(&form, 0)?);
    }
    Ok(values)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    error::FitsHduError,
    read::{
      catalog::tests::{push_cards, push_data},
      catalog::HduCatalog,
      source::SliceSource,
    },
    schema::tform::TForm,
  };

  /// Empty primary followed by the 5-column catalog of targets used by
  /// the end-to-end scenarios (one row of canonical bytes).
  fn targets_file(n_rows: usize) -> Vec<u8> {
    let mut bytes = Vec::new();
    push_cards(
      &mut bytes,
      &[
        "SIMPLE  =                    T",
        "BITPIX  =                    8",
        "NAXIS   =                    0",
        "END",
      ],
    );
    let naxis2 = format!("NAXIS2  = {:>20}", n_rows);
    push_cards(
      &mut bytes,
      &[
        "XTENSION= 'BINTABLE'",
        "BITPIX  =                    8",
        "NAXIS   =                    2",
        "NAXIS1  =                   34",
        naxis2.as_str(),
        "PCOUNT  =                    0",
        "GCOUNT  =                    1",
        "TFIELDS =                    5",
        "TTYPE1  = 'target  '",
        "TFORM1  = '10A     '",
        "TTYPE2  = 'RA      '",
        "TFORM2  = 'E       '",
        "TTYPE3  = 'Dec     '",
        "TFORM3  = 'D       '",
        "TTYPE4  = 'Index   '",
        "TFORM4  = 'K       '",
        "TTYPE5  = 'RunId   '",
        "TFORM5  = 'J       '",
        "END",
      ],
    );
    let mut data = Vec::with_capacity(34 * n_rows);
    for i in 0..n_rows {
      data.extend_from_slice(format!("NGC{:07}", i).as_bytes());
      data.extend_from_slice(&3.448297_f32.to_be_bytes());
      data.extend_from_slice(&(-0.3387486324784641_f64).to_be_bytes());
      data.extend_from_slice(&(i as i64).to_be_bytes());
      data.extend_from_slice(&1_i32.to_be_bytes());
    }
    push_data(&mut bytes, &data);
    bytes
  }

  #[test]
  fn test_read_first_row_end_to_end() {
    let bytes = targets_file(5);
    assert_eq!(bytes.len(), 5760 + 2880);
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    assert_eq!(catalog.count(), 2);
    let mut table = catalog.open_bintable(1).unwrap();
    assert_eq!(table.row_count(), 5);
    assert_eq!(table.layout().row_bytes(), 34);
    let row = table.read_row(0).unwrap();
    assert_eq!(
      row,
      vec![
        TypedValue::CharString(String::from("NGC0000000")),
        TypedValue::Float32(3.448297),
        TypedValue::Float64(-0.3387486324784641),
        TypedValue::Int64(0),
        TypedValue::Int32(1),
      ]
    );
    let row = table.read_row(4).unwrap();
    assert_eq!(row[0], TypedValue::CharString(String::from("NGC0000004")));
    assert_eq!(row[3], TypedValue::Int64(4));
  }

  #[test]
  fn test_row_index_out_of_range() {
    let bytes = targets_file(5);
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut table = catalog.open_bintable(1).unwrap();
    assert!(matches!(
      *table.read_row(5).unwrap_err(),
      FitsHduError::RowIndexOutOfRange {
        requested: 5,
        total: 5
      }
    ));
  }

  #[test]
  fn test_read_row_from_buffer_roundtrip() {
    // Encoding a row with big-endian primitives at the declared split
    // offsets then decoding it gives the original values back.
    let bytes = targets_file(1);
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let table = catalog.open_bintable(1).unwrap();

    let mut row = Vec::new();
    row.extend_from_slice(b"a\tb       ");
    row.extend_from_slice(&f32::NAN.to_be_bytes());
    row.extend_from_slice(&f64::MIN_POSITIVE.to_be_bytes());
    row.extend_from_slice(&i64::MIN.to_be_bytes());
    row.extend_from_slice(&(-42_i32).to_be_bytes());
    let values = table.read_row_from_buffer(&row).unwrap();
    assert_eq!(values[0], TypedValue::CharString(String::from("a\tb")));
    match values[1] {
      TypedValue::Float32(v) => assert_eq!(v.to_bits(), f32::NAN.to_bits()),
      ref other => panic!("expected a f32, got {:?}", other),
    }
    assert_eq!(values[2], TypedValue::Float64(f64::MIN_POSITIVE));
    assert_eq!(values[3], TypedValue::Int64(i64::MIN));
    assert_eq!(values[4], TypedValue::Int32(-42));
  }

  #[test]
  fn test_read_row_from_truncated_buffer() {
    let bytes = targets_file(1);
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let table = catalog.open_bintable(1).unwrap();
    assert!(matches!(
      *table.read_row_from_buffer(&[0_u8; 20]).unwrap_err(),
      FitsHduError::UnexpectedEof { .. }
    ));
  }

  #[test]
  fn test_column_range_matches_per_row_reads() {
    let bytes = targets_file(5);
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut table = catalog.open_bintable(1).unwrap();
    for col in 0..table.layout().n_cols() {
      let strided = table.read_column_range(col, 0, 5).unwrap();
      for (row_index, value) in strided.iter().enumerate() {
        let row = table.read_row(row_index as u64).unwrap();
        assert_eq!(&row[col], value, "col {} row {}", col, row_index);
      }
    }
  }

  #[test]
  fn test_column_range_bounds() {
    let bytes = targets_file(5);
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut table = catalog.open_bintable(1).unwrap();
    assert_eq!(table.read_column_range(3, 2, 4).unwrap().len(), 2);
    assert_eq!(table.read_column_range(3, 2, 2).unwrap().len(), 0);
    assert!(matches!(
      *table.read_column_range(9, 0, 5).unwrap_err(),
      FitsHduError::ColumnIndexOutOfRange {
        requested: 9,
        total: 5
      }
    ));
    assert!(matches!(
      *table.read_column_range(0, 0, 6).unwrap_err(),
      FitsHduError::RowIndexOutOfRange { .. }
    ));
    assert!(matches!(
      *table.read_column_range(0, 4, 2).unwrap_err(),
      FitsHduError::RowIndexOutOfRange { .. }
    ));
  }

  #[test]
  fn test_logical_column() {
    // Second extension of the reference fixture: 20A, J and L columns.
    let mut bytes = Vec::new();
    push_cards(
      &mut bytes,
      &[
        "SIMPLE  =                    T",
        "BITPIX  =                    8",
        "NAXIS   =                    0",
        "END",
      ],
    );
    push_cards(
      &mut bytes,
      &[
        "XTENSION= 'BINTABLE'",
        "BITPIX  =                    8",
        "NAXIS   =                    2",
        "NAXIS1  =                   25",
        "NAXIS2  =                    5",
        "PCOUNT  =                    0",
        "GCOUNT  =                    1",
        "TFIELDS =                    3",
        "TTYPE1  = 'target  '",
        "TFORM1  = '20A     '",
        "TTYPE2  = 'Index   '",
        "TFORM2  = '1J      '",
        "TTYPE3  = 'Discovery'",
        "TFORM3  = 'L       '",
        "END",
      ],
    );
    let flags = [b'T', b'F', b'T', b'T', b'F'];
    let mut data = Vec::new();
    for (i, flag) in flags.iter().enumerate() {
      data.extend_from_slice(format!("NGC{:07}          ", i).as_bytes());
      data.extend_from_slice(&(i as i32).to_be_bytes());
      data.push(*flag);
    }
    push_data(&mut bytes, &data);

    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut table = catalog.open_bintable(1).unwrap();
    assert_eq!(
      table.layout().columns()[2].form,
      TForm::Logical,
    );
    let decoded = table.read_column_range(2, 0, 5).unwrap();
    assert_eq!(
      decoded,
      vec![
        TypedValue::Logical(true),
        TypedValue::Logical(false),
        TypedValue::Logical(true),
        TypedValue::Logical(true),
        TypedValue::Logical(false),
      ]
    );
  }
}
