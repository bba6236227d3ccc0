//! Typed views decoding the data segment of one HDU.

pub mod bintable;
pub mod image;

use crate::{
  error::{new_not_a_bintable_err, new_not_an_image_err, Error},
  read::source::SeekableByteSource,
};

use self::{bintable::BinaryTableHdu, image::ImageHdu};

/// A typed view on one HDU, borrowing the catalog's source handle.
///
/// The view mutates the source cursor: one view at a time per handle
/// (the borrow checker enforces it), and a handle must not cross threads.
pub enum HduView<'s, S: SeekableByteSource> {
  BinaryTable(BinaryTableHdu<'s, S>),
  Image(ImageHdu<'s, S>),
}

impl<'s, S: SeekableByteSource> HduView<'s, S> {
  pub fn into_bintable(self) -> Result<BinaryTableHdu<'s, S>, Error> {
    match self {
      Self::BinaryTable(hdu) => Ok(hdu),
      Self::Image(_) => Err(new_not_a_bintable_err("IMAGE")),
    }
  }

  pub fn into_image(self) -> Result<ImageHdu<'s, S>, Error> {
    match self {
      Self::Image(hdu) => Ok(hdu),
      Self::BinaryTable(_) => Err(new_not_an_image_err("BINTABLE")),
    }
  }
}
