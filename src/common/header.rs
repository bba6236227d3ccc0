//! Read and query a full FITS header: the ordered sequence of keyword
//! records located between the start of an HDU and its `END` card.

use log::debug;

use crate::{
  common::{card::HeaderCard, BLOCK_SIZE, CARD_SIZE, END},
  error::{new_missing_card_err, Error},
  read::source::SeekableByteSource,
};

/// A parsed FITS header: the non-blank cards of an HDU, in file order,
/// up through the `END` sentinel.
///
/// Immutable once parsed; freely shareable across threads.
#[derive(Debug, Clone)]
pub struct Header {
  cards: Vec<HeaderCard>,
  /// Number of bytes the header occupies on disk, padding included.
  /// Always a multiple of 2880.
  byte_size: usize,
}

impl Header {
  /// All retained cards, `END` included.
  pub fn cards(&self) -> &[HeaderCard] {
    self.cards.as_slice()
  }

  /// Size, in bytes, of the header on disk (a multiple of 2880).
  pub fn byte_size(&self) -> usize {
    self.byte_size
  }

  /// First card carrying the given (trimmed) keyword.
  pub fn get(&self, keyword: &str) -> Option<&HeaderCard> {
    self.cards.iter().find(|card| card.keyword() == keyword)
  }

  pub fn contains(&self, keyword: &str) -> bool {
    self.get(keyword).is_some()
  }

  /// Integer value of the given keyword; `None` when the card is absent,
  /// `MalformedCard` when present but not an integer.
  pub fn opt_integer(&self, keyword: &str) -> Result<Option<i64>, Error> {
    self.get(keyword).map(HeaderCard::integer).transpose()
  }

  /// Integer value of the given keyword; `MissingRequiredCard` when absent.
  pub fn integer(&self, keyword: &str) -> Result<i64, Error> {
    self
      .get(keyword)
      .ok_or_else(|| new_missing_card_err(keyword))
      .and_then(HeaderCard::integer)
  }

  pub fn opt_string(&self, keyword: &str) -> Result<Option<&str>, Error> {
    self.get(keyword).map(HeaderCard::string).transpose()
  }

  pub fn string(&self, keyword: &str) -> Result<&str, Error> {
    self
      .get(keyword)
      .ok_or_else(|| new_missing_card_err(keyword))
      .and_then(HeaderCard::string)
  }

  pub fn opt_logical(&self, keyword: &str) -> Result<Option<bool>, Error> {
    self.get(keyword).map(HeaderCard::logical).transpose()
  }

  /// Value of the `XTENSION` card, absent on the primary HDU.
  pub fn xtension(&self) -> Result<Option<&str>, Error> {
    self.opt_string("XTENSION")
  }
}

/// Reads 2880-byte header blocks from a [SeekableByteSource] into a [Header].
pub enum HeaderParser {}

impl HeaderParser {
  /// Read a header starting at `offset` (which must be the first byte of a
  /// keyword record on a 2880-byte boundary).
  ///
  /// Blocks of 36 cards are consumed until the card whose keyword is `END`;
  /// blank cards are dropped. A source exhausted before `END` fails with
  /// `UnexpectedEof`.
  pub fn read<S: SeekableByteSource>(source: &mut S, offset: u64) -> Result<Header, Error> {
    source.seek(offset)?;
    let mut cards = Vec::with_capacity(36);
    let mut byte_size = 0_usize;
    loop {
      let mut block = [0_u8; BLOCK_SIZE];
      source.read_exact(&mut block)?;
      byte_size += BLOCK_SIZE;
      for record in block.chunks(CARD_SIZE) {
        // Unwrap ok: BLOCK_SIZE is a multiple of CARD_SIZE.
        let record: &[u8; CARD_SIZE] = record.try_into().unwrap();
        if record.starts_with(END) {
          cards.push(HeaderCard::parse(record));
          debug!(
            "Header read at offset {}: {} cards in {} bytes",
            offset,
            cards.len(),
            byte_size
          );
          return Ok(Header { cards, byte_size });
        }
        let card = HeaderCard::parse(record);
        if !card.is_blank() {
          cards.push(card);
        }
      }
    }
  }
}
