// Little-endian packer/unpacker with exact-consumption checking.
use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DecodeError {
    Short { needed: usize, remaining: usize },
    Trailing { remaining: usize },
    Invalid(&'static str),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::Short { needed, remaining } => {
                write!(f, "short buffer: needed {needed} bytes, {remaining} remaining")
            }
            DecodeError::Trailing { remaining } => {
                write!(f, "{remaining} trailing bytes after value")
            }
            DecodeError::Invalid(what) => write!(f, "invalid {what}"),
        }
    }
}

impl StdError for DecodeError {}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum EncodeError {
    /// A length or count does not fit its `u32` prefix.
    TooLong { len: usize, max: usize },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EncodeError::TooLong { len, max } => {
                write!(f, "length {len} exceeds encodable maximum {max}")
            }
        }
    }
}

impl StdError for EncodeError {}

/// Little-endian writer. Lengths past `u32::MAX` are recorded and reported by `finish`.
#[derive(Debug, Default)]
pub struct Packer {
    buf: Vec<u8>,
    too_long: Option<usize>,
}

impl Packer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn u16(&mut self, value: u16) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u32(&mut self, value: u32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    pub fn u64(&mut self, value: u64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_le_bytes());
        self
    }

    /// `u32` element count for a sequence that follows.
    pub fn count(&mut self, len: usize) -> &mut Self {
        match u32::try_from(len) {
            Ok(len) => self.u32(len),
            Err(_) => {
                self.too_long.get_or_insert(len);
                self.u32(u32::MAX)
            }
        }
    }

    /// `u32` length prefix followed by raw bytes.
    pub fn bytes(&mut self, value: &[u8]) -> &mut Self {
        self.count(value.len());
        self.buf.extend_from_slice(value);
        self
    }

    pub fn str(&mut self, value: &str) -> &mut Self {
        self.bytes(value.as_bytes())
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn finish(self) -> Result<Vec<u8>, EncodeError> {
        match self.too_long {
            Some(len) => Err(EncodeError::TooLong {
                len,
                max: u32::MAX as usize,
            }),
            None => Ok(self.buf),
        }
    }
}

#[derive(Debug)]
pub struct Unpacker<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Unpacker<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < len {
            return Err(DecodeError::Short {
                needed: len,
                remaining: self.remaining(),
            });
        }
        let out = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(out)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    pub fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    pub fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.array()?))
    }

    pub fn u64(&mut self) -> Result<u64, DecodeError> {
        Ok(u64::from_le_bytes(self.array()?))
    }

    pub fn bytes(&mut self) -> Result<&'a [u8], DecodeError> {
        let len = self.u32()? as usize;
        self.take(len)
    }

    pub fn str(&mut self) -> Result<&'a str, DecodeError> {
        std::str::from_utf8(self.bytes()?).map_err(|_| DecodeError::Invalid("utf-8 string"))
    }

    /// Sequence length, bounded by the bytes left so a corrupt count cannot
    /// drive a huge allocation.
    pub fn seq_len(&mut self, min_item_len: usize) -> Result<usize, DecodeError> {
        let len = self.u32()? as usize;
        if len.saturating_mul(min_item_len.max(1)) > self.remaining() {
            return Err(DecodeError::Short {
                needed: len.saturating_mul(min_item_len.max(1)),
                remaining: self.remaining(),
            });
        }
        Ok(len)
    }

    pub fn finish(self) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(DecodeError::Trailing { remaining }),
        }
    }
}
