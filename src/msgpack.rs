//! Cursor over MessagePack-encoded schema data.
//!
//! The decoders only need a handful of primitives: look at the type of the
//! next value, read a container header or a scalar, or skip a whole value.

use rmp::Marker;
use rmp::decode::{self, NumValueReadError};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("unexpected end of MsgPack data")]
    UnexpectedEof,
    #[error("invalid MsgPack marker 0x{0:02x}")]
    InvalidMarker(u8),
    #[error("expected MsgPack {expected}, found {found}")]
    TypeMismatch {
        expected: &'static str,
        found: &'static str,
    },
    #[error("MsgPack string is not valid UTF-8")]
    InvalidUtf8,
    #[error("MsgPack integer is out of range")]
    OutOfRange,
}

/// Type family of a MessagePack value, as seen from its leading marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueType {
    Nil,
    Bool,
    Uint,
    Int,
    Float,
    Str,
    Bin,
    Array,
    Map,
    Ext,
}

impl ValueType {
    fn of(marker: Marker) -> Option<Self> {
        let ty = match marker {
            Marker::Null => Self::Nil,
            Marker::True | Marker::False => Self::Bool,
            Marker::FixPos(_) | Marker::U8 | Marker::U16 | Marker::U32 | Marker::U64 => Self::Uint,
            Marker::FixNeg(_) | Marker::I8 | Marker::I16 | Marker::I32 | Marker::I64 => Self::Int,
            Marker::F32 | Marker::F64 => Self::Float,
            Marker::FixStr(_) | Marker::Str8 | Marker::Str16 | Marker::Str32 => Self::Str,
            Marker::Bin8 | Marker::Bin16 | Marker::Bin32 => Self::Bin,
            Marker::FixArray(_) | Marker::Array16 | Marker::Array32 => Self::Array,
            Marker::FixMap(_) | Marker::Map16 | Marker::Map32 => Self::Map,
            Marker::FixExt1
            | Marker::FixExt2
            | Marker::FixExt4
            | Marker::FixExt8
            | Marker::FixExt16
            | Marker::Ext8
            | Marker::Ext16
            | Marker::Ext32 => Self::Ext,
            Marker::Reserved => return None,
        };
        Some(ty)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool => "boolean",
            Self::Uint => "unsigned",
            Self::Int => "integer",
            Self::Float => "float",
            Self::Str => "string",
            Self::Bin => "binary",
            Self::Array => "array",
            Self::Map => "map",
            Self::Ext => "extension",
        }
    }
}

/// Forward-only reader over a borrowed MessagePack buffer.
#[derive(Debug, Clone)]
pub struct Reader<'a> {
    buf: &'a [u8],
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not consumed yet.
    pub fn remaining(&self) -> &'a [u8] {
        self.buf
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn peek_type(&self) -> Result<ValueType, WireError> {
        let &byte = self.buf.first().ok_or(WireError::UnexpectedEof)?;
        ValueType::of(Marker::from_u8(byte)).ok_or(WireError::InvalidMarker(byte))
    }

    fn expect_type(&self, expected: ValueType) -> Result<(), WireError> {
        let found = self.peek_type()?;
        if found == expected {
            Ok(())
        } else {
            Err(WireError::TypeMismatch {
                expected: expected.name(),
                found: found.name(),
            })
        }
    }

    pub fn read_map_len(&mut self) -> Result<u32, WireError> {
        self.expect_type(ValueType::Map)?;
        decode::read_map_len(&mut self.buf).map_err(|_| WireError::UnexpectedEof)
    }

    pub fn read_array_len(&mut self) -> Result<u32, WireError> {
        self.expect_type(ValueType::Array)?;
        decode::read_array_len(&mut self.buf).map_err(|_| WireError::UnexpectedEof)
    }

    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        self.expect_type(ValueType::Bool)?;
        decode::read_bool(&mut self.buf).map_err(|_| WireError::UnexpectedEof)
    }

    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        self.expect_type(ValueType::Uint)?;
        decode::read_int::<u64, _>(&mut self.buf).map_err(|e| match e {
            NumValueReadError::OutOfRange => WireError::OutOfRange,
            _ => WireError::UnexpectedEof,
        })
    }

    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let value = self.read_u64()?;
        u32::try_from(value).map_err(|_| WireError::OutOfRange)
    }

    pub fn read_str(&mut self) -> Result<&'a str, WireError> {
        self.expect_type(ValueType::Str)?;
        let len = decode::read_str_len(&mut self.buf).map_err(|_| WireError::UnexpectedEof)?;
        let bytes = self.take(len as usize)?;
        std::str::from_utf8(bytes).map_err(|_| WireError::InvalidUtf8)
    }

    /// Skip one complete value, including nested containers.
    pub fn skip(&mut self) -> Result<(), WireError> {
        let mut pending: u64 = 1;
        while pending > 0 {
            pending -= 1;
            let &byte = self.buf.first().ok_or(WireError::UnexpectedEof)?;
            self.take(1)?;
            match Marker::from_u8(byte) {
                Marker::FixPos(_) | Marker::FixNeg(_) | Marker::Null | Marker::True | Marker::False => {}
                Marker::U8 | Marker::I8 => {
                    self.take(1)?;
                }
                Marker::U16 | Marker::I16 => {
                    self.take(2)?;
                }
                Marker::U32 | Marker::I32 | Marker::F32 => {
                    self.take(4)?;
                }
                Marker::U64 | Marker::I64 | Marker::F64 => {
                    self.take(8)?;
                }
                Marker::FixStr(n) => {
                    self.take(usize::from(n))?;
                }
                Marker::Str8 | Marker::Bin8 => {
                    let n = self.read_be(1)?;
                    self.take(n)?;
                }
                Marker::Str16 | Marker::Bin16 => {
                    let n = self.read_be(2)?;
                    self.take(n)?;
                }
                Marker::Str32 | Marker::Bin32 => {
                    let n = self.read_be(4)?;
                    self.take(n)?;
                }
                Marker::FixArray(n) => pending += u64::from(n),
                Marker::Array16 => pending += self.read_be(2)? as u64,
                Marker::Array32 => pending += self.read_be(4)? as u64,
                Marker::FixMap(n) => pending += 2 * u64::from(n),
                Marker::Map16 => pending += 2 * self.read_be(2)? as u64,
                Marker::Map32 => pending += 2 * self.read_be(4)? as u64,
                // ext: one type byte followed by the payload
                Marker::FixExt1 => {
                    self.take(2)?;
                }
                Marker::FixExt2 => {
                    self.take(3)?;
                }
                Marker::FixExt4 => {
                    self.take(5)?;
                }
                Marker::FixExt8 => {
                    self.take(9)?;
                }
                Marker::FixExt16 => {
                    self.take(17)?;
                }
                Marker::Ext8 => {
                    let n = self.read_be(1)?;
                    self.take(n + 1)?;
                }
                Marker::Ext16 => {
                    let n = self.read_be(2)?;
                    self.take(n + 1)?;
                }
                Marker::Ext32 => {
                    let n = self.read_be(4)?;
                    self.take(n + 1)?;
                }
                Marker::Reserved => return Err(WireError::InvalidMarker(byte)),
            }
        }
        Ok(())
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.buf.len() < n {
            return Err(WireError::UnexpectedEof);
        }
        let buf = self.buf;
        let (head, tail) = buf.split_at(n);
        self.buf = tail;
        Ok(head)
    }

    fn read_be(&mut self, width: usize) -> Result<usize, WireError> {
        let bytes = self.take(width)?;
        Ok(bytes.iter().fold(0usize, |acc, &b| (acc << 8) | usize::from(b)))
    }
}
