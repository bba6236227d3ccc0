//! Decode the pixels of an image HDU (primary included).
//!
//! # Element ordering
//! FITS stores image arrays in column-major order: `NAXIS1` varies
//! fastest. A coordinate `[c1, c2, ..., cn]` (0-based, `c1` on `NAXIS1`)
//! maps to the linear element index
//! `c1 + c2*NAXIS1 + c3*NAXIS1*NAXIS2 + ...`, and [ImageHdu::read_slab]
//! returns its elements in that same order within the slab.

use crate::{
  error::{new_coord_err, new_dim_mismatch_err, Error},
  read::source::SeekableByteSource,
  schema::ImageLayout,
  value::{RawBytes, TypedValue},
};

/// A typed view on an image HDU: an n-dimensional array of one big-endian
/// element type, decoded unscaled (no BSCALE/BZERO).
#[derive(Debug)]
pub struct ImageHdu<'s, S: SeekableByteSource> {
  source: &'s mut S,
  /// Offset of the first element in the source.
  data_start: u64,
  layout: ImageLayout,
}

impl<'s, S: SeekableByteSource> ImageHdu<'s, S> {
  pub(crate) fn new(source: &'s mut S, data_start: u64, layout: ImageLayout) -> Self {
    Self {
      source,
      data_start,
      layout,
    }
  }

  pub fn layout(&self) -> &ImageLayout {
    &self.layout
  }

  /// Axis lengths, `NAXIS1` first; empty for a data-less HDU (`NAXIS=0`).
  pub fn dimensions(&self) -> &[u64] {
    self.layout.axes()
  }

  /// Total number of elements (the product of the axis lengths).
  pub fn element_count(&self) -> u64 {
    self.layout.element_count()
  }

  /// Decode the element at `coord` (0-based, one entry per axis, first
  /// entry on `NAXIS1`).
  pub fn read_element(&mut self, coord: &[u64]) -> Result<TypedValue, Error> {
    let linear = self.linear_index(coord)?;
    self.read_run(linear, 1).map(|mut values| {
      // Unwrap ok: read_run(_, 1) decoded exactly one element.
      values.pop().unwrap()
    })
  }

  /// Decode the rectangular region starting at `origin` and spanning
  /// `extent[k]` elements on axis `k`. Elements come back in FITS
  /// column-major order within the slab (first axis varies fastest).
  pub fn read_slab(&mut self, origin: &[u64], extent: &[u64]) -> Result<Vec<TypedValue>, Error> {
    let axes = self.layout.axes();
    if origin.len() != axes.len() {
      return Err(new_dim_mismatch_err(axes.len(), origin.len()));
    }
    if extent.len() != axes.len() {
      return Err(new_dim_mismatch_err(axes.len(), extent.len()));
    }
    for (axis, (range_stop, len)) in origin
      .iter()
      .zip(extent)
      .map(|(from, count)| from + count)
      .zip(axes)
      .enumerate()
    {
      if range_stop > *len {
        return Err(new_coord_err(axis, range_stop, *len));
      }
    }
    if extent.iter().any(|&count| count == 0) || axes.is_empty() {
      return Ok(Vec::new());
    }

    let total: u64 = extent.iter().product();
    let mut values = Vec::with_capacity(total as usize);
    // Runs are contiguous along the first axis; the remaining axes are
    // enumerated with an odometer, first axis after NAXIS1 spinning fastest.
    let mut coord = origin.to_vec();
    loop {
      let linear = self.linear_index(coord.as_slice())?;
      values.extend(self.read_run(linear, extent[0] as usize)?);
      let mut axis = 1;
      loop {
        if axis == coord.len() {
          return Ok(values);
        }
        coord[axis] += 1;
        if coord[axis] < origin[axis] + extent[axis] {
          break;
        }
        coord[axis] = origin[axis];
        axis += 1;
      }
    }
  }

  /// Linear element index of `coord`, column-major (`NAXIS1` fastest).
  fn linear_index(&self, coord: &[u64]) -> Result<u64, Error> {
    let axes = self.layout.axes();
    if coord.len() != axes.len() {
      return Err(new_dim_mismatch_err(axes.len(), coord.len()));
    }
    if axes.is_empty() {
      // A NAXIS=0 HDU holds no element at all.
      return Err(new_coord_err(0, 0, 0));
    }
    let mut linear = 0_u64;
    let mut stride = 1_u64;
    for (axis, (c, len)) in coord.iter().zip(axes).enumerate() {
      if c >= len {
        return Err(new_coord_err(axis, *c, *len));
      }
      linear += c * stride;
      stride *= len;
    }
    Ok(linear)
  }

  /// Read and decode `count` consecutive elements starting at the given
  /// linear element index.
  fn read_run(&mut self, linear: u64, count: usize) -> Result<Vec<TypedValue>, Error> {
    let element_bytes = self.layout.element_bytes() as usize;
    let form = self.layout.element_type();
    let mut buf = vec![0_u8; element_bytes * count];
    let offset = self.data_start + linear * element_bytes as u64;
    self.source.read_exact_at(offset, &mut buf)?;
    let bytes = RawBytes::new(buf.as_slice());
    (0..count)
      .map(|i| bytes.decode(&form, i * element_bytes))
      .collect()
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
  };

  /// Primary image with BITPIX=-32, NAXIS1=3, NAXIS2=2 and the six
  /// elements 0.5, 1.5, ... 5.5 stored in FITS column-major order.
  fn float_image() -> Vec<u8> {
    let mut bytes = Vec::new();
    push_cards(
      &mut bytes,
      &[
        "SIMPLE  =                    T",
        "BITPIX  =                  -32",
        "NAXIS   =                    2",
        "NAXIS1  =                    3",
        "NAXIS2  =                    2",
        "END",
      ],
    );
    let mut data = Vec::new();
    for i in 0..6 {
      data.extend_from_slice(&(i as f32 + 0.5).to_be_bytes());
    }
    push_data(&mut bytes, &data);
    bytes
  }

  #[test]
  fn test_read_whole_image_in_fits_order() {
    let bytes = float_image();
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut image = catalog.open_image(0).unwrap();
    assert_eq!(image.dimensions(), &[3, 2]);
    assert_eq!(image.element_count(), 6);
    let slab = image.read_slab(&[0, 0], &[3, 2]).unwrap();
    assert_eq!(
      slab,
      vec![
        TypedValue::Float32(0.5),
        TypedValue::Float32(1.5),
        TypedValue::Float32(2.5),
        TypedValue::Float32(3.5),
        TypedValue::Float32(4.5),
        TypedValue::Float32(5.5),
      ]
    );
  }

  #[test]
  fn test_read_element_is_column_major() {
    let bytes = float_image();
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut image = catalog.open_image(0).unwrap();
    // (NAXIS1 coordinate, NAXIS2 coordinate): NAXIS1 varies fastest.
    assert_eq!(
      image.read_element(&[1, 0]).unwrap(),
      TypedValue::Float32(1.5)
    );
    assert_eq!(
      image.read_element(&[0, 1]).unwrap(),
      TypedValue::Float32(3.5)
    );
    assert_eq!(
      image.read_element(&[2, 1]).unwrap(),
      TypedValue::Float32(5.5)
    );
  }

  #[test]
  fn test_read_sub_slab() {
    let bytes = float_image();
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut image = catalog.open_image(0).unwrap();
    // Last two columns of both rows.
    let slab = image.read_slab(&[1, 0], &[2, 2]).unwrap();
    assert_eq!(
      slab,
      vec![
        TypedValue::Float32(1.5),
        TypedValue::Float32(2.5),
        TypedValue::Float32(4.5),
        TypedValue::Float32(5.5),
      ]
    );
    // Empty extent, empty slab.
    assert!(image.read_slab(&[0, 0], &[0, 2]).unwrap().is_empty());
  }

  #[test]
  fn test_bounds_checks() {
    let bytes = float_image();
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut image = catalog.open_image(0).unwrap();
    assert!(matches!(
      *image.read_element(&[3, 0]).unwrap_err(),
      FitsHduError::CoordOutOfRange {
        axis: 0,
        requested: 3,
        axis_len: 3
      }
    ));
    assert!(matches!(
      *image.read_element(&[0]).unwrap_err(),
      FitsHduError::DimensionMismatch {
        expected: 2,
        actual: 1
      }
    ));
    assert!(matches!(
      *image.read_slab(&[2, 0], &[2, 1]).unwrap_err(),
      FitsHduError::CoordOutOfRange {
        axis: 0,
        requested: 4,
        axis_len: 3
      }
    ));
  }

  #[test]
  fn test_int16_image_elements() {
    let mut bytes = Vec::new();
    push_cards(
      &mut bytes,
      &[
        "SIMPLE  =                    T",
        "BITPIX  =                   16",
        "NAXIS   =                    1",
        "NAXIS1  =                    4",
        "END",
      ],
    );
    let mut data = Vec::new();
    for v in [-2_i16, -1, 0, 1] {
      data.extend_from_slice(&v.to_be_bytes());
    }
    push_data(&mut bytes, &data);
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut image = catalog.open_image(0).unwrap();
    assert_eq!(
      image.read_slab(&[0], &[4]).unwrap(),
      vec![
        TypedValue::Int16(-2),
        TypedValue::Int16(-1),
        TypedValue::Int16(0),
        TypedValue::Int16(1),
      ]
    );
  }

  #[test]
  fn test_byte_image_elements_are_unsigned() {
    let mut bytes = Vec::new();
    push_cards(
      &mut bytes,
      &[
        "SIMPLE  =                    T",
        "BITPIX  =                    8",
        "NAXIS   =                    1",
        "NAXIS1  =                    3",
        "END",
      ],
    );
    push_data(&mut bytes, &[0x00, 0x7F, 0xFF]);
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut image = catalog.open_image(0).unwrap();
    assert_eq!(
      image.read_slab(&[0], &[3]).unwrap(),
      vec![
        TypedValue::UInt8(0),
        TypedValue::UInt8(127),
        TypedValue::UInt8(255),
      ]
    );
  }

  #[test]
  fn test_empty_primary_has_no_elements() {
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
    let mut catalog = HduCatalog::new(SliceSource::from_slice(&bytes));
    let mut image = catalog.open_image(0).unwrap();
    assert_eq!(image.element_count(), 0);
    assert!(image.read_slab(&[], &[]).unwrap().is_empty());
    assert!(image.read_element(&[]).is_err());
  }
}
