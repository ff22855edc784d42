//! Compiled expression trees and their relocatable byte form.
//!
//! A space definition keeps default-value expressions serialized inside its
//! own buffer. The serialized form is position independent: it holds no
//! offsets, so a tree can be copied between buffers and re-read as is. The
//! size reported by [`Expr::encoded_len`] is exactly the number of bytes
//! [`Expr::write_into`] consumes.

use std::io::{self, Write};

use super::ExprError;
use super::parser::{self, MAX_EXPR_DEPTH};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Or,
    And,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
    Concat,
}

const UNARY_OPS: [UnaryOp; 3] = [UnaryOp::Neg, UnaryOp::Plus, UnaryOp::Not];

const BINARY_OPS: [BinaryOp; 14] = [
    BinaryOp::Or,
    BinaryOp::And,
    BinaryOp::Eq,
    BinaryOp::Ne,
    BinaryOp::Lt,
    BinaryOp::Le,
    BinaryOp::Gt,
    BinaryOp::Ge,
    BinaryOp::Add,
    BinaryOp::Sub,
    BinaryOp::Mul,
    BinaryOp::Div,
    BinaryOp::Rem,
    BinaryOp::Concat,
];

impl UnaryOp {
    fn code(self) -> u8 {
        self as u8
    }
}

impl BinaryOp {
    fn code(self) -> u8 {
        self as u8
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    Str(String),
    Column(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    IsNull {
        operand: Box<Expr>,
        negated: bool,
    },
    Call {
        name: String,
        args: Vec<Expr>,
    },
}

// Node tags of the serialized form.
const TAG_NULL: u8 = 0;
const TAG_BOOL: u8 = 1;
const TAG_INTEGER: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_COLUMN: u8 = 5;
const TAG_UNARY: u8 = 6;
const TAG_BINARY: u8 = 7;
const TAG_IS_NULL: u8 = 8;
const TAG_CALL: u8 = 9;

impl Expr {
    /// Compile SQL expression text.
    pub fn compile(text: &str) -> Result<Expr, ExprError> {
        parser::parse_expr(text)
    }

    /// Height of the tree; a leaf has height 1.
    pub fn height(&self) -> usize {
        1 + match self {
            Expr::Unary { operand, .. } | Expr::IsNull { operand, .. } => operand.height(),
            Expr::Binary { lhs, rhs, .. } => lhs.height().max(rhs.height()),
            Expr::Call { args, .. } => args.iter().map(Expr::height).max().unwrap_or(0),
            _ => 0,
        }
    }

    /// Serialized size in bytes.
    pub fn encoded_len(&self) -> usize {
        1 + match self {
            Expr::Null => 0,
            Expr::Bool(_) => 1,
            Expr::Integer(_) | Expr::Float(_) => 8,
            Expr::Str(s) | Expr::Column(s) => 4 + s.len(),
            Expr::Unary { operand, .. } => 1 + operand.encoded_len(),
            Expr::Binary { lhs, rhs, .. } => 1 + lhs.encoded_len() + rhs.encoded_len(),
            Expr::IsNull { operand, .. } => 1 + operand.encoded_len(),
            Expr::Call { name, args } => 4 + name.len() + 4 + args.iter().map(Expr::encoded_len).sum::<usize>(),
        }
    }

    pub fn encode_to<W: Write>(&self, w: &mut W) -> io::Result<()> {
        match self {
            Expr::Null => w.write_all(&[TAG_NULL]),
            Expr::Bool(b) => w.write_all(&[TAG_BOOL, u8::from(*b)]),
            Expr::Integer(n) => {
                w.write_all(&[TAG_INTEGER])?;
                w.write_all(&n.to_le_bytes())
            }
            Expr::Float(f) => {
                w.write_all(&[TAG_FLOAT])?;
                w.write_all(&f.to_bits().to_le_bytes())
            }
            Expr::Str(s) => {
                w.write_all(&[TAG_STR])?;
                write_str(w, s)
            }
            Expr::Column(s) => {
                w.write_all(&[TAG_COLUMN])?;
                write_str(w, s)
            }
            Expr::Unary { op, operand } => {
                w.write_all(&[TAG_UNARY, op.code()])?;
                operand.encode_to(w)
            }
            Expr::Binary { op, lhs, rhs } => {
                w.write_all(&[TAG_BINARY, op.code()])?;
                lhs.encode_to(w)?;
                rhs.encode_to(w)
            }
            Expr::IsNull { operand, negated } => {
                w.write_all(&[TAG_IS_NULL, u8::from(*negated)])?;
                operand.encode_to(w)
            }
            Expr::Call { name, args } => {
                w.write_all(&[TAG_CALL])?;
                write_str(w, name)?;
                w.write_all(&(args.len() as u32).to_le_bytes())?;
                for arg in args {
                    arg.encode_to(w)?;
                }
                Ok(())
            }
        }
    }

    /// Serialize into a pre-sized slot and return the number of bytes used.
    pub fn write_into(&self, slot: &mut [u8]) -> Result<usize, ExprError> {
        let available = slot.len();
        let mut cursor = io::Cursor::new(slot);
        self.encode_to(&mut cursor).map_err(|_| ExprError::BufferTooSmall {
            needed: self.encoded_len(),
            available,
        })?;
        Ok(cursor.position() as usize)
    }

    /// Serialize into a freshly allocated buffer.
    pub fn encode(&self) -> Result<Vec<u8>, ExprError> {
        let size = self.encoded_len();
        let mut buf = Vec::new();
        buf.try_reserve_exact(size).map_err(|_| ExprError::OutOfMemory {
            size,
            op: "sql_expr_dup",
        })?;
        self.encode_to(&mut buf).map_err(|_| ExprError::OutOfMemory {
            size,
            op: "sql_expr_dup",
        })?;
        Ok(buf)
    }

    /// Read one tree from the front of `bytes`, returning it and the number
    /// of bytes consumed.
    pub fn decode(bytes: &[u8]) -> Result<(Expr, usize), ExprError> {
        let mut decoder = Decoder { bytes, pos: 0 };
        let expr = decoder.node(0)?;
        Ok((expr, decoder.pos))
    }
}

fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    w.write_all(&(s.len() as u32).to_le_bytes())?;
    w.write_all(s.as_bytes())
}

struct Decoder<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Decoder<'a> {
    fn corrupted(&self) -> ExprError {
        ExprError::Corrupted(self.pos)
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], ExprError> {
        let end = self.pos.checked_add(n).ok_or_else(|| self.corrupted())?;
        let bytes = self.bytes.get(self.pos..end).ok_or_else(|| self.corrupted())?;
        self.pos = end;
        Ok(bytes)
    }

    fn u8(&mut self) -> Result<u8, ExprError> {
        Ok(self.take(1)?[0])
    }

    fn u32(&mut self) -> Result<u32, ExprError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(4)?);
        Ok(u32::from_le_bytes(raw))
    }

    fn u64(&mut self) -> Result<u64, ExprError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(raw))
    }

    fn string(&mut self) -> Result<String, ExprError> {
        let len = self.u32()? as usize;
        let at = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|_| ExprError::Corrupted(at))
    }

    fn flag(&mut self) -> Result<bool, ExprError> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(ExprError::Corrupted(self.pos - 1)),
        }
    }

    fn node(&mut self, depth: usize) -> Result<Expr, ExprError> {
        if depth >= MAX_EXPR_DEPTH {
            return Err(ExprError::TooDeep);
        }
        let at = self.pos;
        let expr = match self.u8()? {
            TAG_NULL => Expr::Null,
            TAG_BOOL => Expr::Bool(self.flag()?),
            TAG_INTEGER => Expr::Integer(self.u64()? as i64),
            TAG_FLOAT => Expr::Float(f64::from_bits(self.u64()?)),
            TAG_STR => Expr::Str(self.string()?),
            TAG_COLUMN => Expr::Column(self.string()?),
            TAG_UNARY => {
                let code = self.u8()?;
                let op = *UNARY_OPS.get(usize::from(code)).ok_or(ExprError::Corrupted(at + 1))?;
                Expr::Unary {
                    op,
                    operand: Box::new(self.node(depth + 1)?),
                }
            }
            TAG_BINARY => {
                let code = self.u8()?;
                let op = *BINARY_OPS.get(usize::from(code)).ok_or(ExprError::Corrupted(at + 1))?;
                let lhs = self.node(depth + 1)?;
                let rhs = self.node(depth + 1)?;
                Expr::Binary {
                    op,
                    lhs: Box::new(lhs),
                    rhs: Box::new(rhs),
                }
            }
            TAG_IS_NULL => {
                let negated = self.flag()?;
                Expr::IsNull {
                    operand: Box::new(self.node(depth + 1)?),
                    negated,
                }
            }
            TAG_CALL => {
                let name = self.string()?;
                let argc = self.u32()? as usize;
                // every argument takes at least one byte
                if argc > self.bytes.len() - self.pos {
                    return Err(self.corrupted());
                }
                let mut args = Vec::with_capacity(argc);
                for _ in 0..argc {
                    args.push(self.node(depth + 1)?);
                }
                Expr::Call { name, args }
            }
            _ => return Err(ExprError::Corrupted(at)),
        };
        Ok(expr)
    }
}

/// Borrowed view of a serialized expression stored inside a larger buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExprRef<'a> {
    bytes: &'a [u8],
}

impl<'a> ExprRef<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    pub fn as_bytes(&self) -> &'a [u8] {
        self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Rebuild the owned tree.
    pub fn to_expr(&self) -> Result<Expr, ExprError> {
        let (expr, used) = Expr::decode(self.bytes)?;
        if used != self.bytes.len() {
            return Err(ExprError::Corrupted(used));
        }
        Ok(expr)
    }

    /// Duplicate the tree into `slot`, returning the number of bytes used.
    pub fn dup_into(&self, slot: &mut [u8]) -> Result<usize, ExprError> {
        self.to_expr()?.write_into(slot)
    }
}
