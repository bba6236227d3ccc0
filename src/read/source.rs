//! Positional byte sources the HDU navigator pulls from.
//!
//! One source handle owns one cursor: header parsing and HDU decoding move
//! the cursor, so a handle must not be shared across threads. Parallel
//! readers open independent handles on the same underlying file and re-run
//! the (cheap) catalog walk on each.

use std::{
  fs::File,
  io::{Read, Seek, SeekFrom},
  path::Path,
};

use memmap2::{Advice, Mmap, MmapOptions};

use crate::error::{new_io_err, new_unexpected_eof, Error};

/// A seekable source of bytes with short-read semantics.
pub trait SeekableByteSource {
  /// Move the cursor to `offset` bytes from the start of the source.
  fn seek(&mut self, offset: u64) -> Result<(), Error>;

  /// Current cursor offset, in bytes from the start of the source.
  fn position(&self) -> u64;

  /// Read up to `buf.len()` bytes at the cursor, advancing it. Returns the
  /// number of bytes read; `0` means end of data.
  fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

  /// Fill `buf` entirely, failing with `UnexpectedEof` when the source is
  /// exhausted first.
  fn read_exact(&mut self, buf: &mut [u8]) -> Result<(), Error> {
    let mut filled = 0;
    while filled < buf.len() {
      let n = self.read(&mut buf[filled..])?;
      if n == 0 {
        return Err(new_unexpected_eof(buf.len(), filled));
      }
      filled += n;
    }
    Ok(())
  }

  /// Seek to `offset` then fill `buf` entirely.
  fn read_exact_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<(), Error> {
    self.seek(offset).and_then(|()| self.read_exact(buf))
  }
}

/// A [SeekableByteSource] over a regular file.
pub struct FileSource {
  file: File,
  position: u64,
}

impl FileSource {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
    File::open(path)
      .map(|file| Self { file, position: 0 })
      .map_err(new_io_err)
  }

  pub fn from_file(file: File) -> Self {
    Self { file, position: 0 }
  }
}

impl SeekableByteSource for FileSource {
  fn seek(&mut self, offset: u64) -> Result<(), Error> {
    self
      .file
      .seek(SeekFrom::Start(offset))
      .map(|pos| self.position = pos)
      .map_err(new_io_err)
  }

  fn position(&self) -> u64 {
    self.position
  }

  fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
    self
      .file
      .read(buf)
      .map(|n| {
        self.position += n as u64;
        n
      })
      .map_err(new_io_err)
  }
}

/// A [SeekableByteSource] over an in-memory byte slice.
#[derive(Debug)]
pub struct SliceSource<'b> {
  bytes: &'b [u8],
  position: u64,
}

impl<'b> SliceSource<'b> {
  /// # Params
  /// * `bytes`: the full content, all bytes, of a FITS file.
  pub fn from_slice(bytes: &'b [u8]) -> Self {
    Self { bytes, position: 0 }
  }

  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }
}

impl SeekableByteSource for SliceSource<'_> {
  fn seek(&mut self, offset: u64) -> Result<(), Error> {
    // Seeking past the end is allowed, subsequent reads return 0 byte.
    self.position = offset;
    Ok(())
  }

  fn position(&self) -> u64 {
    self.position
  }

  fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
    let from = (self.position as usize).min(self.bytes.len());
    let n = buf.len().min(self.bytes.len() - from);
    buf[..n].copy_from_slice(&self.bytes[from..from + n]);
    self.position += n as u64;
    Ok(n)
  }
}

/// A [SeekableByteSource] over a memory-mapped file.
///
/// Mapping avoids read syscalls on the (possibly numerous) strided column
/// reads; the kernel is advised of sequential access for the catalog walk.
pub struct MmapSource {
  mmap: Mmap,
  position: u64,
}

impl MmapSource {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
    let file = File::open(path).map_err(new_io_err)?;
    let mmap = unsafe { MmapOptions::new().map(&file) }.map_err(new_io_err)?;
    mmap.advise(Advice::Sequential).map_err(new_io_err)?;
    Ok(Self { mmap, position: 0 })
  }

  pub fn as_slice(&self) -> &[u8] {
    self.mmap.as_ref()
  }
}

impl SeekableByteSource for MmapSource {
  fn seek(&mut self, offset: u64) -> Result<(), Error> {
    self.position = offset;
    Ok(())
  }

  fn position(&self) -> u64 {
    self.position
  }

  fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
    let bytes = self.mmap.as_ref();
    let from = (self.position as usize).min(bytes.len());
    let n = buf.len().min(bytes.len() - from);
    buf[..n].copy_from_slice(&bytes[from..from + n]);
    self.position += n as u64;
    Ok(n)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_slice_source_read_and_seek() {
    let mut src = SliceSource::from_slice(b"abcdefgh");
    let mut buf = [0_u8; 3];
    src.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"abc");
    assert_eq!(src.position(), 3);
    src.seek(6).unwrap();
    let n = src.read(&mut buf).unwrap();
    assert_eq!(n, 2);
    assert_eq!(&buf[..n], b"gh");
  }

  #[test]
  fn test_slice_source_short_read_fails_read_exact() {
    let mut src = SliceSource::from_slice(b"abc");
    let mut buf = [0_u8; 8];
    let err = src.read_exact(&mut buf).unwrap_err();
    assert!(matches!(
      *err,
      crate::error::FitsHduError::UnexpectedEof {
        expected: 8,
        actual: 3
      }
    ));
  }

  #[test]
  fn test_read_exact_at() {
    let mut src = SliceSource::from_slice(b"abcdefgh");
    let mut buf = [0_u8; 2];
    src.read_exact_at(4, &mut buf).unwrap();
    assert_eq!(&buf, b"ef");
  }

  #[test]
  fn test_file_and_mmap_sources() {
    let path = std::env::temp_dir().join(format!("fitshdu-source-{}.bin", std::process::id()));
    std::fs::write(&path, b"0123456789").unwrap();

    let mut file = FileSource::open(&path).unwrap();
    let mut buf = [0_u8; 4];
    file.read_exact_at(3, &mut buf).unwrap();
    assert_eq!(&buf, b"3456");
    assert_eq!(file.position(), 7);

    let mut mmap = MmapSource::open(&path).unwrap();
    assert_eq!(mmap.as_slice(), b"0123456789");
    mmap.read_exact_at(6, &mut buf).unwrap();
    assert_eq!(&buf, b"6789");

    std::fs::remove_file(&path).unwrap();
  }
}
