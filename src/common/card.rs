//! A keyword record ("card") of a FITS header, parsed into a typed value.

use std::fmt::{Display, Formatter};

use crate::{
  common::{CARD_SIZE, VALUE_INDICATOR},
  error::{new_malformed_card_err, Error},
};

/// The typed value carried by a value card.
///
/// FITS header values are integers, reals, logicals or single-quoted
/// character strings; a card whose value area fits none of these keeps
/// `None` as its value (the raw line is preserved for re-parsing).
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
  Integer(i64),
  Real(f64),
  Logical(bool),
  CharString(String),
}

impl ScalarValue {
  pub fn as_integer(&self) -> Option<i64> {
    match self {
      Self::Integer(v) => Some(*v),
      _ => None,
    }
  }
  pub fn as_real(&self) -> Option<f64> {
    match self {
      Self::Real(v) => Some(*v),
      // An integer valued card is a valid real (e.g. `BSCALE = 2`).
      Self::Integer(v) => Some(*v as f64),
      _ => None,
    }
  }
  pub fn as_logical(&self) -> Option<bool> {
    match self {
      Self::Logical(v) => Some(*v),
      _ => None,
    }
  }
  pub fn as_string(&self) -> Option<&str> {
    match self {
      Self::CharString(v) => Some(v.as_str()),
      _ => None,
    }
  }
}

impl Display for ScalarValue {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Integer(v) => write!(f, "{}", v),
      Self::Real(v) => write!(f, "{}", v),
      Self::Logical(v) => write!(f, "{}", if *v { 'T' } else { 'F' }),
      Self::CharString(v) => write!(f, "'{}'", v),
    }
  }
}

/// One 80-byte keyword record of a FITS header.
///
/// Parsing is tolerant: a value area that fits no [ScalarValue] leaves
/// `value` empty rather than failing, and the raw 80 bytes are kept so a
/// caller can re-parse a quirky card. The typed accessors ([HeaderCard::integer]
/// and friends) are strict and fail with `MalformedCard` when the card does
/// not hold the requested type.
#[derive(Debug, Clone)]
pub struct HeaderCard {
  /// Keyword: bytes 1 to 8, right-trimmed.
  keyword: String,
  /// The raw, unparsed, 80-byte line.
  raw: [u8; CARD_SIZE],
  /// The parsed value, for value cards whose value area parsed cleanly.
  value: Option<ScalarValue>,
  /// Content of the single-quoted string in the value area, if any.
  name: Option<String>,
  /// Everything after the first `/` outside quotes, trimmed.
  comment: Option<String>,
}

impl HeaderCard {
  /// Parse one keyword record. Never fails: see the struct documentation.
  pub fn parse(record: &[u8; CARD_SIZE]) -> Self {
    let keyword = String::from_utf8_lossy(record[0..8].trim_ascii_end()).into_owned();
    if &record[8..10] == VALUE_INDICATOR {
      let (value_bytes, comment_bytes) = split_on_unquoted_slash(&record[10..]);
      let comment = comment_bytes.and_then(|bytes| {
        let trimmed = bytes.trim_ascii();
        if trimmed.is_empty() {
          None
        } else {
          Some(String::from_utf8_lossy(trimmed).into_owned())
        }
      });
      let value = parse_value(value_bytes);
      let name = value.as_ref().and_then(|v| v.as_string().map(String::from));
      Self {
        keyword,
        raw: *record,
        value,
        name,
        comment,
      }
    } else {
      // Commentary card (COMMENT, HISTORY, blank keyword, ...).
      let comment = record[8..].trim_ascii();
      Self {
        keyword,
        raw: *record,
        value: None,
        name: None,
        comment: if comment.is_empty() {
          None
        } else {
          Some(String::from_utf8_lossy(comment).into_owned())
        },
      }
    }
  }

  pub fn keyword(&self) -> &str {
    self.keyword.as_str()
  }

  pub fn raw(&self) -> &[u8; CARD_SIZE] {
    &self.raw
  }

  pub fn value(&self) -> Option<&ScalarValue> {
    self.value.as_ref()
  }

  pub fn name(&self) -> Option<&str> {
    self.name.as_deref()
  }

  pub fn comment(&self) -> Option<&str> {
    self.comment.as_deref()
  }

  pub fn is_end(&self) -> bool {
    self.keyword == "END"
  }

  /// A card made of 80 spaces; such cards pad the block after `END` and
  /// are not retained in a parsed header.
  pub fn is_blank(&self) -> bool {
    self.raw.iter().all(|&b| b == b' ')
  }

  pub fn integer(&self) -> Result<i64, Error> {
    self
      .value
      .as_ref()
      .and_then(ScalarValue::as_integer)
      .ok_or_else(|| new_malformed_card_err(&self.raw))
  }

  pub fn real(&self) -> Result<f64, Error> {
    self
      .value
      .as_ref()
      .and_then(ScalarValue::as_real)
      .ok_or_else(|| new_malformed_card_err(&self.raw))
  }

  pub fn logical(&self) -> Result<bool, Error> {
    self
      .value
      .as_ref()
      .and_then(ScalarValue::as_logical)
      .ok_or_else(|| new_malformed_card_err(&self.raw))
  }

  pub fn string(&self) -> Result<&str, Error> {
    self
      .value
      .as_ref()
      .and_then(ScalarValue::as_string)
      .ok_or_else(|| new_malformed_card_err(&self.raw))
  }
}

/// Split the value area once, on the first `/` located outside a quoted
/// string, into (value bytes, comment bytes).
fn split_on_unquoted_slash(value_area: &[u8]) -> (&[u8], Option<&[u8]>) {
  let mut in_quote = false;
  let mut i = 0;
  while i < value_area.len() {
    match value_area[i] {
      b'\'' if !in_quote => in_quote = true,
      b'\'' => {
        // A doubled quote is an escaped quote, not a closing one.
        if value_area.get(i + 1) == Some(&b'\'') {
          i += 1;
        } else {
          in_quote = false;
        }
      }
      b'/' if !in_quote => return (&value_area[..i], Some(&value_area[i + 1..])),
      _ => {}
    }
    i += 1;
  }
  (value_area, None)
}

/// Tolerant parse of the value bytes (comment already removed).
fn parse_value(value_bytes: &[u8]) -> Option<ScalarValue> {
  let trimmed = value_bytes.trim_ascii();
  match trimmed {
    [] => None,
    [b'T'] => Some(ScalarValue::Logical(true)),
    [b'F'] => Some(ScalarValue::Logical(false)),
    [b'\'', ..] => parse_quoted_string(trimmed).map(ScalarValue::CharString),
    _ => parse_number(trimmed),
  }
}

/// Parse a string enclosed in single quotes, `''` being an escaped quote.
/// Leading spaces inside the quotes are significant, trailing ones are not.
/// Returns `None` when the closing quote is missing.
fn parse_quoted_string(bytes: &[u8]) -> Option<String> {
  debug_assert_eq!(bytes[0], b'\'');
  let mut content = String::new();
  let mut i = 1;
  while i < bytes.len() {
    match bytes[i] {
      b'\'' if bytes.get(i + 1) == Some(&b'\'') => {
        content.push('\'');
        i += 2;
      }
      b'\'' => {
        while content.ends_with(' ') {
          content.pop();
        }
        return Some(content);
      }
      b => {
        content.push(b as char);
        i += 1;
      }
    }
  }
  None
}

fn parse_number(trimmed: &[u8]) -> Option<ScalarValue> {
  let token = String::from_utf8_lossy(trimmed);
  if let Ok(int) = token.parse::<i64>() {
    return Some(ScalarValue::Integer(int));
  }
  // FITS reals may carry a Fortran style 'D' exponent.
  let token = token.replace(['D', 'd'], "E");
  token.parse::<f64>().ok().map(ScalarValue::Real)
}
