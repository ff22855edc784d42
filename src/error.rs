//! Error type shared by the decoders and the space definition lifecycle.

use crate::msgpack::WireError;
use crate::sql::ExprError;

pub type Result<T, E = SpaceDefError> = std::result::Result<T, E>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SpaceDefError {
    #[error("Failed to allocate {size} bytes in {op} for {what}")]
    OutOfMemory {
        size: usize,
        op: &'static str,
        what: &'static str,
    },
    #[error("{location}: {reason}")]
    InvalidFormat { location: String, reason: String },
    #[error("Space field '{name}' is duplicate")]
    DuplicateField { name: String },
    #[error("Malformed MsgPack: {0}")]
    Wire(#[from] WireError),
    #[error(transparent)]
    Expr(ExprError),
    #[error("{what}: expected {expected} bytes, got {actual}")]
    LayoutMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },
}

/// Broad classification of [`SpaceDefError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    OutOfMemory,
    InvalidFormat,
    Expression,
    /// Broken size contract between the layout and the expression compiler.
    Internal,
}

impl SpaceDefError {
    pub fn invalid_format(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFormat {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::OutOfMemory { .. } => ErrorKind::OutOfMemory,
            Self::InvalidFormat { .. } | Self::DuplicateField { .. } | Self::Wire(_) => ErrorKind::InvalidFormat,
            Self::Expr(_) => ErrorKind::Expression,
            Self::LayoutMismatch { .. } => ErrorKind::Internal,
        }
    }
}

impl From<ExprError> for SpaceDefError {
    fn from(err: ExprError) -> Self {
        match err {
            ExprError::OutOfMemory { size, op } => Self::OutOfMemory {
                size,
                op,
                what: "expression",
            },
            other => Self::Expr(other),
        }
    }
}

/// Reserve exactly `size` bytes, reporting failure as `OutOfMemory`.
pub(crate) fn try_alloc(size: usize, op: &'static str, what: &'static str) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(size)
        .map_err(|_| SpaceDefError::OutOfMemory { size, op, what })?;
    Ok(buf)
}

/// Fallible `String` copy.
pub(crate) fn try_clone_str(src: &str, op: &'static str, what: &'static str) -> Result<String> {
    let mut out = String::new();
    out.try_reserve_exact(src.len())
        .map_err(|_| SpaceDefError::OutOfMemory {
            size: src.len() + 1,
            op,
            what,
        })?;
    out.push_str(src);
    Ok(out)
}
