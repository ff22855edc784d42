//! Byte layout of a space definition buffer.
//!
//! ```text
//! +-----------------+-----------+----------------+-------------+-------------+
//! | engine name\0   | name\0    | field records  | string pool | expressions |
//! | FIXED_HEADER    |           | N * RECORD     | name\0 dflt\0 ...          |
//! +-----------------+-----------+----------------+-------------+-------------+
//! ```
//!
//! Sizing and population walk the fields in the same order, so the
//! offsets computed here are exactly where the writer puts things.

use crate::field::FieldDef;
use crate::limits::ENGINE_NAME_MAX;

/// Engine-name slot at the start of the buffer.
pub const FIXED_HEADER_SIZE: usize = ENGINE_NAME_MAX + 1;

/// Size of one packed field record.
pub const FIELD_RECORD_SIZE: usize = 32;

/// String and expression sizes of one field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldExtent {
    pub name_len: usize,
    pub default_len: Option<usize>,
    pub expr_len: Option<usize>,
}

impl FieldExtent {
    pub fn of(field: &FieldDef) -> Self {
        Self {
            name_len: field.name.len(),
            default_len: field.default_value.as_ref().map(String::len),
            expr_len: field.default_value_expr.as_ref().map(|expr| expr.encoded_len()),
        }
    }

    fn strs_len(&self) -> usize {
        self.name_len + 1 + self.default_len.map_or(0, |len| len + 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpaceLayout {
    pub size: usize,
    pub fields_offset: usize,
    pub strs_offset: usize,
    pub expr_offset: usize,
}

impl SpaceLayout {
    pub fn compute<I>(name_len: usize, extents: I) -> Self
    where
        I: IntoIterator<Item = FieldExtent>,
    {
        let fields_offset = FIXED_HEADER_SIZE + name_len + 1;
        let mut field_count = 0;
        let mut strs_len = 0;
        let mut expr_len = 0;
        for extent in extents {
            field_count += 1;
            strs_len += extent.strs_len();
            expr_len += extent.expr_len.unwrap_or(0);
        }
        let strs_offset = fields_offset + field_count * FIELD_RECORD_SIZE;
        let expr_offset = strs_offset + strs_len;
        Self {
            size: expr_offset + expr_len,
            fields_offset,
            strs_offset,
            expr_offset,
        }
    }

    pub fn field_count(&self) -> usize {
        (self.strs_offset - self.fields_offset) / FIELD_RECORD_SIZE
    }
}
