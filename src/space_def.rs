//! Space definition: one owned buffer holding names, field records, the
//! string pool and serialized default expressions.

use std::fmt;
use std::mem;
use std::sync::Arc;

use tracing::{debug, error, trace};

use crate::checks::SpaceRef;
use crate::dict::TupleDictionary;
use crate::error::{try_alloc, Result, SpaceDefError};
use crate::field::{FieldDef, FieldType, OnConflictAction};
use crate::layout::{FieldExtent, SpaceLayout, FIELD_RECORD_SIZE, FIXED_HEADER_SIZE};
use crate::limits::{BOX_NAME_MAX, ENGINE_NAME_MAX};
use crate::space_opts::SpaceOpts;
use crate::sql::{ExprError, ExprRef};

const ABSENT: u32 = u32::MAX;

#[cfg(debug_assertions)]
const TRASH_BYTE: u8 = 0xa5;

/// Packed form of one field inside the buffer. Offsets are relative to
/// the start of the buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct FieldRecord {
    name_off: u32,
    name_len: u32,
    default_off: u32,
    default_len: u32,
    expr_off: u32,
    expr_len: u32,
    coll_id: u32,
    field_type: u8,
    is_nullable: bool,
    nullable_action: u8,
}

impl FieldRecord {
    fn write(&self, out: &mut [u8]) {
        let words = [
            self.name_off,
            self.name_len,
            self.default_off,
            self.default_len,
            self.expr_off,
            self.expr_len,
            self.coll_id,
        ];
        for (i, word) in words.iter().enumerate() {
            out[i * 4..i * 4 + 4].copy_from_slice(&word.to_le_bytes());
        }
        out[28] = self.field_type;
        out[29] = u8::from(self.is_nullable);
        out[30] = self.nullable_action;
        out[31] = 0;
    }

    fn read(bytes: &[u8]) -> Self {
        let word = |i: usize| u32::from_le_bytes([bytes[i * 4], bytes[i * 4 + 1], bytes[i * 4 + 2], bytes[i * 4 + 3]]);
        Self {
            name_off: word(0),
            name_len: word(1),
            default_off: word(2),
            default_len: word(3),
            expr_off: word(4),
            expr_len: word(5),
            coll_id: word(6),
            field_type: bytes[28],
            is_nullable: bytes[29] != 0,
            nullable_action: bytes[30],
        }
    }
}

/// Write one expression into its pre-sized slot and check that it filled
/// the slot exactly.
fn place_expr<F>(slot: &mut [u8], fieldno: usize, write: F) -> Result<()>
where
    F: FnOnce(&mut [u8]) -> Result<usize, ExprError>,
{
    let expected = slot.len();
    let actual = match write(slot) {
        Ok(used) => used,
        Err(ExprError::BufferTooSmall { needed, .. }) => needed,
        Err(err) => return Err(err.into()),
    };
    if actual != expected {
        error!(field = fieldno + 1, expected, actual, "default expression does not fit its slot");
        return Err(SpaceDefError::LayoutMismatch {
            what: "default value expression",
            expected,
            actual,
        });
    }
    Ok(())
}

/// Immutable schema of one space.
pub struct SpaceDef {
    id: u32,
    uid: u32,
    exact_field_count: u32,
    view_ref_count: u32,
    layout: SpaceLayout,
    opts: SpaceOpts,
    dict: Arc<TupleDictionary>,
    data: Vec<u8>,
}

impl SpaceDef {
    /// Build a definition in a single allocation.
    ///
    /// `opts` is duplicated and its CHECK constraints are bound to the new
    /// definition.
    ///
    /// # Panics
    ///
    /// Panics if `name` is longer than [`BOX_NAME_MAX`] or `engine_name`
    /// is longer than [`ENGINE_NAME_MAX`] bytes; callers validate both.
    pub fn new(
        id: u32,
        uid: u32,
        exact_field_count: u32,
        name: &str,
        engine_name: &str,
        opts: &SpaceOpts,
        fields: &[FieldDef],
    ) -> Result<SpaceDef> {
        assert!(name.len() <= BOX_NAME_MAX, "space name is too long");
        assert!(engine_name.len() <= ENGINE_NAME_MAX, "engine name is too long");

        let dict = TupleDictionary::new(fields)?;
        let layout = SpaceLayout::compute(name.len(), fields.iter().map(FieldExtent::of));
        let mut data = alloc_def(layout.size)?;
        data.resize(layout.size, 0);

        data[..engine_name.len()].copy_from_slice(engine_name.as_bytes());
        data[FIXED_HEADER_SIZE..FIXED_HEADER_SIZE + name.len()].copy_from_slice(name.as_bytes());

        let mut strs_pos = layout.strs_offset;
        let mut expr_pos = layout.expr_offset;
        for (fieldno, field) in fields.iter().enumerate() {
            let name_off = strs_pos;
            strs_pos = put_cstr(&mut data, strs_pos, &field.name);

            let (default_off, default_len) = match &field.default_value {
                Some(text) => {
                    let off = strs_pos;
                    strs_pos = put_cstr(&mut data, strs_pos, text);
                    (off as u32, text.len() as u32)
                }
                None => (0, ABSENT),
            };

            let (expr_off, expr_len) = match &field.default_value_expr {
                Some(expr) => {
                    let off = expr_pos;
                    let len = expr.encoded_len();
                    place_expr(&mut data[off..off + len], fieldno, |slot| expr.write_into(slot))?;
                    expr_pos += len;
                    (off as u32, len as u32)
                }
                None => (0, ABSENT),
            };

            let record = FieldRecord {
                name_off: name_off as u32,
                name_len: field.name.len() as u32,
                default_off,
                default_len,
                expr_off,
                expr_len,
                coll_id: field.coll_id,
                field_type: field.field_type.code(),
                is_nullable: field.is_nullable,
                nullable_action: field.nullable_action.code(),
            };
            let off = layout.fields_offset + fieldno * FIELD_RECORD_SIZE;
            record.write(&mut data[off..off + FIELD_RECORD_SIZE]);
        }
        if expr_pos != layout.size {
            error!(space = name, expected = layout.size, actual = expr_pos, "space definition layout mismatch");
            return Err(SpaceDefError::LayoutMismatch {
                what: "space definition",
                expected: layout.size,
                actual: expr_pos,
            });
        }

        let opts = opts.dup(&SpaceRef {
            space_id: id,
            space_name: name.to_string(),
        })?;
        debug!(id, space = name, engine = engine_name, fields = fields.len(), size = layout.size, "space definition created");
        Ok(SpaceDef {
            id,
            uid,
            exact_field_count,
            view_ref_count: 0,
            layout,
            opts,
            dict,
            data,
        })
    }

    /// Deep copy. The copy has its own buffer and options but shares the
    /// dictionary with `self`.
    pub fn dup(&self) -> Result<SpaceDef> {
        let extents = self.fields().map(|field| field.extent()).collect::<Result<Vec<_>>>()?;
        let layout = SpaceLayout::compute(self.name().len(), extents);
        if layout != self.layout {
            error!(id = self.id, expected = self.layout.size, actual = layout.size, "space definition layout mismatch on dup");
            return Err(SpaceDefError::LayoutMismatch {
                what: "space definition",
                expected: self.layout.size,
                actual: layout.size,
            });
        }

        let mut data = alloc_def(layout.size)?;
        data.extend_from_slice(&self.data);
        for (fieldno, field) in self.fields().enumerate() {
            if let Some(expr) = field.default_value_expr() {
                let off = field.record.expr_off as usize;
                place_expr(&mut data[off..off + expr.len()], fieldno, |slot| expr.dup_into(slot))?;
            }
        }

        let dict = Arc::clone(&self.dict);
        let opts = self.opts.dup(&self.space_ref())?;
        debug!(id = self.id, space = self.name(), size = layout.size, "space definition duplicated");
        Ok(SpaceDef {
            id: self.id,
            uid: self.uid,
            exact_field_count: self.exact_field_count,
            view_ref_count: self.view_ref_count,
            layout,
            opts,
            dict,
            data,
        })
    }

    /// Release the definition. Equivalent to dropping it.
    pub fn destroy(self) {
        drop(self);
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Owner user id.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Required tuple length; 0 when any length is allowed.
    pub fn exact_field_count(&self) -> u32 {
        self.exact_field_count
    }

    pub fn name(&self) -> &str {
        let len = self.layout.fields_offset - FIXED_HEADER_SIZE - 1;
        buf_str(&self.data, FIXED_HEADER_SIZE, len)
    }

    pub fn engine_name(&self) -> &str {
        let slot = &self.data[..FIXED_HEADER_SIZE];
        let len = slot.iter().position(|&b| b == 0).unwrap_or(ENGINE_NAME_MAX);
        buf_str(slot, 0, len)
    }

    pub fn field_count(&self) -> usize {
        self.layout.field_count()
    }

    pub fn field(&self, fieldno: usize) -> Option<FieldView<'_>> {
        (fieldno < self.field_count()).then(|| self.view(fieldno))
    }

    pub fn fields(&self) -> impl ExactSizeIterator<Item = FieldView<'_>> {
        (0..self.field_count()).map(move |fieldno| self.view(fieldno))
    }

    fn view(&self, fieldno: usize) -> FieldView<'_> {
        let off = self.layout.fields_offset + fieldno * FIELD_RECORD_SIZE;
        FieldView {
            data: &self.data,
            record: FieldRecord::read(&self.data[off..off + FIELD_RECORD_SIZE]),
        }
    }

    pub fn field_by_name(&self, name: &str) -> Option<FieldView<'_>> {
        self.dict.field_no(name).and_then(|fieldno| self.field(fieldno as usize))
    }

    /// Owned copies of every field, e.g. to rebuild the space with an
    /// altered format.
    pub fn to_field_defs(&self) -> Result<Vec<FieldDef>> {
        self.fields().map(|field| field.to_field_def()).collect()
    }

    pub fn opts(&self) -> &SpaceOpts {
        &self.opts
    }

    pub fn dict(&self) -> &Arc<TupleDictionary> {
        &self.dict
    }

    /// Number of views that select from this space.
    pub fn view_ref_count(&self) -> u32 {
        self.view_ref_count
    }

    pub fn acquire_view_ref(&mut self) {
        self.view_ref_count += 1;
    }

    pub fn release_view_ref(&mut self) {
        debug_assert!(self.view_ref_count > 0, "view reference count underflow");
        self.view_ref_count = self.view_ref_count.saturating_sub(1);
    }

    /// Total size of the definition buffer in bytes.
    pub fn size(&self) -> usize {
        self.layout.size
    }

    fn space_ref(&self) -> SpaceRef {
        SpaceRef {
            space_id: self.id,
            space_name: self.name().to_string(),
        }
    }
}

impl Drop for SpaceDef {
    fn drop(&mut self) {
        drop(mem::take(&mut self.opts));
        #[cfg(debug_assertions)]
        self.data.fill(TRASH_BYTE);
        trace!(id = self.id, "space definition destroyed");
    }
}

impl fmt::Debug for SpaceDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpaceDef")
            .field("id", &self.id)
            .field("uid", &self.uid)
            .field("name", &self.name())
            .field("engine", &self.engine_name())
            .field("exact_field_count", &self.exact_field_count)
            .field("fields", &self.fields().collect::<Vec<_>>())
            .field("opts", &self.opts)
            .finish()
    }
}

/// Borrowed view of one field stored in a [`SpaceDef`] buffer.
#[derive(Clone, Copy)]
pub struct FieldView<'a> {
    data: &'a [u8],
    record: FieldRecord,
}

impl<'a> FieldView<'a> {
    pub fn name(&self) -> &'a str {
        buf_str(self.data, self.record.name_off as usize, self.record.name_len as usize)
    }

    pub fn field_type(&self) -> FieldType {
        FieldType::from_code(self.record.field_type).expect("field type code written by SpaceDef::new")
    }

    pub fn is_nullable(&self) -> bool {
        self.record.is_nullable
    }

    pub fn nullable_action(&self) -> OnConflictAction {
        OnConflictAction::from_code(self.record.nullable_action).expect("action code written by SpaceDef::new")
    }

    pub fn coll_id(&self) -> u32 {
        self.record.coll_id
    }

    pub fn default_value(&self) -> Option<&'a str> {
        (self.record.default_len != ABSENT)
            .then(|| buf_str(self.data, self.record.default_off as usize, self.record.default_len as usize))
    }

    pub fn default_value_expr(&self) -> Option<ExprRef<'a>> {
        (self.record.expr_len != ABSENT).then(|| {
            let off = self.record.expr_off as usize;
            ExprRef::new(&self.data[off..off + self.record.expr_len as usize])
        })
    }

    /// Sizes for a fresh layout pass; the expression size comes from the
    /// compiler rather than the stored length.
    fn extent(&self) -> Result<FieldExtent> {
        let expr_len = match self.default_value_expr() {
            Some(expr) => Some(expr.to_expr()?.encoded_len()),
            None => None,
        };
        Ok(FieldExtent {
            name_len: self.name().len(),
            default_len: self.default_value().map(str::len),
            expr_len,
        })
    }

    pub fn to_field_def(&self) -> Result<FieldDef> {
        let default_value_expr = match self.default_value_expr() {
            Some(expr) => Some(expr.to_expr()?),
            None => None,
        };
        Ok(FieldDef {
            name: self.name().to_string(),
            field_type: self.field_type(),
            is_nullable: self.is_nullable(),
            nullable_action: self.nullable_action(),
            coll_id: self.coll_id(),
            default_value: self.default_value().map(str::to_string),
            default_value_expr,
        })
    }
}

impl fmt::Debug for FieldView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldView")
            .field("name", &self.name())
            .field("type", &self.field_type())
            .field("is_nullable", &self.is_nullable())
            .field("nullable_action", &self.nullable_action())
            .field("coll_id", &self.coll_id())
            .field("default", &self.default_value())
            .finish()
    }
}

fn alloc_def(size: usize) -> Result<Vec<u8>> {
    // record offsets are u32
    if u32::try_from(size).is_err() {
        return Err(SpaceDefError::OutOfMemory {
            size,
            op: "malloc",
            what: "def",
        });
    }
    try_alloc(size, "malloc", "def")
}

/// Copy `s` and a NUL terminator to `pos`, returning the next free offset.
fn put_cstr(data: &mut [u8], pos: usize, s: &str) -> usize {
    data[pos..pos + s.len()].copy_from_slice(s.as_bytes());
    data[pos + s.len()] = 0;
    pos + s.len() + 1
}

fn buf_str(data: &[u8], off: usize, len: usize) -> &str {
    std::str::from_utf8(&data[off..off + len]).expect("strings in a space definition are copied from &str")
}
