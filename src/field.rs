//! Field (column) definitions and the space format decoder.

use std::fmt;

use tracing::debug;

use crate::error::{Result, SpaceDefError};
use crate::identifier;
use crate::limits::{BOX_NAME_MAX, COLL_NONE, TUPLE_INDEX_BASE};
use crate::msgpack::{Reader, ValueType};
use crate::opts::{opt_slot, parse_key, OptDef, OptKind, UnknownKeys};
use crate::sql::{Expr, ExprError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    Any,
    Unsigned,
    String,
    Number,
    Double,
    Integer,
    Boolean,
    Varbinary,
    Scalar,
    Array,
    Map,
}

impl FieldType {
    pub const ALL: [FieldType; 11] = [
        FieldType::Any,
        FieldType::Unsigned,
        FieldType::String,
        FieldType::Number,
        FieldType::Double,
        FieldType::Integer,
        FieldType::Boolean,
        FieldType::Varbinary,
        FieldType::Scalar,
        FieldType::Array,
        FieldType::Map,
    ];

    /// Case-insensitive lookup; also accepts the legacy `num`, `str` and
    /// `*` spellings.
    pub fn from_name(name: &str) -> Option<Self> {
        if let Some(ty) = Self::ALL.iter().find(|ty| ty.name().eq_ignore_ascii_case(name)) {
            return Some(*ty);
        }
        match name.to_ascii_lowercase().as_str() {
            "num" => Some(Self::Unsigned),
            "str" => Some(Self::String),
            "*" => Some(Self::Any),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Any => "any",
            Self::Unsigned => "unsigned",
            Self::String => "string",
            Self::Number => "number",
            Self::Double => "double",
            Self::Integer => "integer",
            Self::Boolean => "boolean",
            Self::Varbinary => "varbinary",
            Self::Scalar => "scalar",
            Self::Array => "array",
            Self::Map => "map",
        }
    }

    /// Only string-like fields may carry a collation.
    pub fn supports_collation(self) -> bool {
        matches!(self, Self::String | Self::Scalar | Self::Any)
    }

    pub(crate) fn code(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Conflict resolution applied when NULL lands in a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OnConflictAction {
    None,
    Rollback,
    Abort,
    Fail,
    Ignore,
    Replace,
    Default,
}

impl OnConflictAction {
    pub const ALL: [OnConflictAction; 7] = [
        OnConflictAction::None,
        OnConflictAction::Rollback,
        OnConflictAction::Abort,
        OnConflictAction::Fail,
        OnConflictAction::Ignore,
        OnConflictAction::Replace,
        OnConflictAction::Default,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|action| action.name().eq_ignore_ascii_case(name))
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Rollback => "rollback",
            Self::Abort => "abort",
            Self::Fail => "fail",
            Self::Ignore => "ignore",
            Self::Replace => "replace",
            Self::Default => "default",
        }
    }

    pub(crate) fn code(self) -> u8 {
        self as u8
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }
}

impl fmt::Display for OnConflictAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Built-in collations addressable by name.
const COLLATIONS: [(&str, u32); 4] = [("none", COLL_NONE), ("unicode", 1), ("unicode_ci", 2), ("binary", 3)];

pub fn collation_id(name: &str) -> Option<u32> {
    COLLATIONS
        .iter()
        .find(|(coll, _)| coll.eq_ignore_ascii_case(name))
        .map(|&(_, id)| id)
}

pub fn collation_name(id: u32) -> Option<&'static str> {
    COLLATIONS.iter().find(|&&(_, coll)| coll == id).map(|&(name, _)| name)
}

/// Schema of one field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub field_type: FieldType,
    pub is_nullable: bool,
    pub nullable_action: OnConflictAction,
    /// [`COLL_NONE`] when the field has no collation.
    pub coll_id: u32,
    /// Default value as SQL text.
    pub default_value: Option<String>,
    /// Compiled `default_value`.
    pub default_value_expr: Option<Expr>,
}

impl FieldDef {
    /// A non-nullable field without collation or default.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
            is_nullable: false,
            nullable_action: OnConflictAction::Default,
            coll_id: COLL_NONE,
            default_value: None,
            default_value_expr: None,
        }
    }

    pub fn nullable(mut self) -> Self {
        self.is_nullable = true;
        self.nullable_action = OnConflictAction::None;
        self
    }

    pub fn with_collation(mut self, coll_id: u32) -> Self {
        self.coll_id = coll_id;
        self
    }

    pub fn with_default(mut self, text: &str) -> Result<Self, ExprError> {
        self.default_value_expr = Some(Expr::compile(text)?);
        self.default_value = Some(text.to_string());
        Ok(self)
    }
}

/// Decode target for one field descriptor. `None` in `field_type` or
/// `nullable_action` records a name that did not resolve.
struct RawField {
    name: Option<String>,
    field_type: Option<FieldType>,
    is_nullable: bool,
    nullable_action: Option<OnConflictAction>,
    coll_id: u32,
    default_value: Option<String>,
}

impl Default for RawField {
    fn default() -> Self {
        Self {
            name: None,
            field_type: Some(FieldType::Any),
            is_nullable: false,
            nullable_action: Some(OnConflictAction::Default),
            coll_id: COLL_NONE,
            default_value: None,
        }
    }
}

fn set_type(raw: &mut RawField, name: &str) {
    raw.field_type = FieldType::from_name(name);
}

fn set_nullable_action(raw: &mut RawField, name: &str) {
    raw.nullable_action = OnConflictAction::from_name(name);
}

fn collation_decode(raw: &mut RawField, rd: &mut Reader<'_>, location: &str) -> Result<()> {
    let expected = || SpaceDefError::invalid_format(location, "'collation' must be a collation name or id");
    match rd.peek_type()? {
        ValueType::Uint => raw.coll_id = rd.read_u32().map_err(|_| expected())?,
        ValueType::Str => {
            let name = rd.read_str()?;
            raw.coll_id = collation_id(name)
                .ok_or_else(|| SpaceDefError::invalid_format(location, format!("unknown collation '{name}'")))?;
        }
        _ => return Err(expected()),
    }
    Ok(())
}

static FIELD_DEF_REG: [OptDef<RawField>; 6] = [
    OptDef {
        name: "name",
        kind: OptKind::Str(opt_slot!(RawField, name: Option<String>)),
    },
    OptDef {
        name: "type",
        kind: OptKind::Enum(set_type),
    },
    OptDef {
        name: "is_nullable",
        kind: OptKind::Bool(opt_slot!(RawField, is_nullable: bool)),
    },
    OptDef {
        name: "nullable_action",
        kind: OptKind::Enum(set_nullable_action),
    },
    OptDef {
        name: "collation",
        kind: OptKind::Any(collation_decode),
    },
    OptDef {
        name: "default",
        kind: OptKind::Str(opt_slot!(RawField, default_value: Option<String>)),
    },
];

const NULLABLE_ACTION_KEY: &str = "nullable_action";

impl RawField {
    fn validate(self, location: &str) -> Result<FieldDef> {
        let invalid = |reason: &str| SpaceDefError::invalid_format(location, reason);

        let Some(name) = self.name else {
            return Err(invalid("name is not specified"));
        };
        if name.is_empty() {
            return Err(invalid("name is empty"));
        }
        if name.len() > BOX_NAME_MAX {
            return Err(invalid("name is too long"));
        }
        if !identifier::is_valid(&name) {
            return Err(invalid(&identifier::invalid_reason(&name)));
        }
        let Some(field_type) = self.field_type else {
            return Err(invalid("has unknown field type"));
        };
        let Some(nullable_action) = self.nullable_action else {
            return Err(invalid("has unknown field on conflict nullable action"));
        };
        if self.is_nullable != (nullable_action == OnConflictAction::None) {
            return Err(invalid("has conflicting nullability and nullable action properties"));
        }
        if self.coll_id != COLL_NONE && !field_type.supports_collation() {
            return Err(invalid("collation is reasonable only for string, scalar and any fields"));
        }
        let default_value_expr = match &self.default_value {
            Some(text) => Some(Expr::compile(text)?),
            None => None,
        };
        Ok(FieldDef {
            name,
            field_type,
            is_nullable: self.is_nullable,
            nullable_action,
            coll_id: self.coll_id,
            default_value: self.default_value,
            default_value_expr,
        })
    }
}

/// Decode and validate the descriptor of field `fieldno` (0-based).
pub fn decode_field(rd: &mut Reader<'_>, fieldno: u32, space_name: &str) -> Result<FieldDef> {
    let location = format!("space '{space_name}' field {}", fieldno + TUPLE_INDEX_BASE);
    if rd.peek_type()? != ValueType::Map {
        return Err(SpaceDefError::invalid_format(location, "is not map"));
    }
    let count = rd.read_map_len()?;
    let mut raw = RawField::default();
    let mut is_action_missing = true;
    for _ in 0..count {
        if rd.peek_type()? != ValueType::Str {
            return Err(SpaceDefError::invalid_format(location, "format is not map with string keys"));
        }
        let key = rd.read_str()?;
        parse_key(&mut raw, &FIELD_DEF_REG, key, rd, UnknownKeys::Skip, &location)?;
        if key == NULLABLE_ACTION_KEY {
            is_action_missing = false;
        }
    }
    if is_action_missing {
        raw.nullable_action = Some(if raw.is_nullable {
            OnConflictAction::None
        } else {
            OnConflictAction::Default
        });
    }
    raw.validate(&location)
}

/// Decode a space format: an array of field descriptor maps.
///
/// Room for every field is reserved before decoding starts. If a field
/// fails, the fields decoded before it are dropped along with their
/// compiled defaults.
pub fn decode_format(rd: &mut Reader<'_>, space_name: &str) -> Result<Vec<FieldDef>> {
    if rd.peek_type()? != ValueType::Array {
        return Err(SpaceDefError::invalid_format(
            format!("space '{space_name}'"),
            "format must be an array",
        ));
    }
    let count = rd.read_array_len()? as usize;
    // each descriptor takes at least one byte
    if count > rd.remaining().len() {
        return Err(crate::msgpack::WireError::UnexpectedEof.into());
    }
    let mut fields = Vec::new();
    fields
        .try_reserve_exact(count)
        .map_err(|_| SpaceDefError::OutOfMemory {
            size: count * std::mem::size_of::<FieldDef>(),
            op: "region",
            what: "new slab",
        })?;
    for fieldno in 0..count {
        match decode_field(rd, fieldno as u32, space_name) {
            Ok(field) => fields.push(field),
            Err(err) => {
                debug!(space = space_name, field = fieldno + 1, %err, "space format decode failed");
                return Err(err);
            }
        }
    }
    Ok(fields)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutil::{arr, map, s, Mp};

    fn field(entries: &[(&str, Mp)]) -> Result<FieldDef> {
        let data = map(entries).encode();
        decode_field(&mut Reader::new(&data), 0, "T")
    }

    fn reason(err: SpaceDefError) -> String {
        match err {
            SpaceDefError::InvalidFormat { reason, .. } => reason,
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_two_field_format() {
        let data = arr(vec![
            map(&[("name", s("id")), ("type", s("unsigned"))]),
            map(&[("name", s("data")), ("type", s("string")), ("collation", s("unicode"))]),
        ])
        .encode();
        let fields = decode_format(&mut Reader::new(&data), "T").unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0], FieldDef::new("id", FieldType::Unsigned));
        assert_eq!(fields[1], FieldDef::new("data", FieldType::String).with_collation(1));
        for f in &fields {
            assert!(!f.is_nullable);
            assert_eq!(f.nullable_action, OnConflictAction::Default);
        }
    }

    #[test]
    fn test_missing_name() {
        let err = field(&[("type", s("unsigned"))]).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("space 'T' field 1", "name is not specified"));
    }

    #[test]
    fn test_nullable_defaults_action_none() {
        let f = field(&[("name", s("x")), ("is_nullable", Mp::Bool(true))]).unwrap();
        assert!(f.is_nullable);
        assert_eq!(f.nullable_action, OnConflictAction::None);
    }

    #[test]
    fn test_not_nullable_defaults_action_default() {
        let f = field(&[("name", s("x")), ("is_nullable", Mp::Bool(false))]).unwrap();
        assert_eq!(f.nullable_action, OnConflictAction::Default);
    }

    #[test]
    fn test_action_default_after_nullable_key() {
        // defaulting happens after the whole map is read
        let f = field(&[("is_nullable", Mp::Bool(true)), ("name", s("x"))]).unwrap();
        assert_eq!(f.nullable_action, OnConflictAction::None);
    }

    #[test]
    fn test_conflicting_nullability() {
        let err = field(&[
            ("name", s("x")),
            ("is_nullable", Mp::Bool(true)),
            ("nullable_action", s("default")),
        ])
        .unwrap_err();
        assert_eq!(reason(err), "has conflicting nullability and nullable action properties");

        let err = field(&[("name", s("x")), ("nullable_action", s("none"))]).unwrap_err();
        assert_eq!(reason(err), "has conflicting nullability and nullable action properties");
    }

    #[test]
    fn test_explicit_action() {
        let f = field(&[("name", s("x")), ("nullable_action", s("ABORT"))]).unwrap();
        assert_eq!(f.nullable_action, OnConflictAction::Abort);
    }

    #[test]
    fn test_unknown_type_and_action() {
        let err = field(&[("name", s("x")), ("type", s("blob"))]).unwrap_err();
        assert_eq!(reason(err), "has unknown field type");

        let err = field(&[("name", s("x")), ("nullable_action", s("explode"))]).unwrap_err();
        assert_eq!(reason(err), "has unknown field on conflict nullable action");
    }

    #[test]
    fn test_type_aliases() {
        let f = field(&[("name", s("x")), ("type", s("NUM"))]).unwrap();
        assert_eq!(f.field_type, FieldType::Unsigned);
        let f = field(&[("name", s("x")), ("type", s("str"))]).unwrap();
        assert_eq!(f.field_type, FieldType::String);
        let f = field(&[("name", s("x"))]).unwrap();
        assert_eq!(f.field_type, FieldType::Any);
    }

    #[test]
    fn test_collation_rules() {
        let err = field(&[("name", s("x")), ("type", s("unsigned")), ("collation", s("unicode"))]).unwrap_err();
        assert_eq!(reason(err), "collation is reasonable only for string, scalar and any fields");

        let f = field(&[("name", s("x")), ("type", s("scalar")), ("collation", Mp::Uint(2))]).unwrap();
        assert_eq!(f.coll_id, 2);

        let f = field(&[("name", s("x")), ("type", s("unsigned")), ("collation", s("none"))]).unwrap();
        assert_eq!(f.coll_id, COLL_NONE);

        let err = field(&[("name", s("x")), ("type", s("string")), ("collation", s("klingon"))]).unwrap_err();
        assert_eq!(reason(err), "unknown collation 'klingon'");

        let err = field(&[("name", s("x")), ("collation", Mp::Bool(true))]).unwrap_err();
        assert_eq!(reason(err), "'collation' must be a collation name or id");
    }

    #[test]
    fn test_bad_names() {
        let err = field(&[("name", s(""))]).unwrap_err();
        assert_eq!(reason(err), "name is empty");

        let long = "a".repeat(BOX_NAME_MAX + 1);
        let err = field(&[("name", s(&long))]).unwrap_err();
        assert_eq!(reason(err), "name is too long");

        let err = field(&[("name", s("bad\nname"))]).unwrap_err();
        assert!(reason(err).starts_with("Invalid identifier"));

        let err = field(&[("name", Mp::Uint(5))]).unwrap_err();
        assert_eq!(reason(err), "'name' must be string");
    }

    #[test]
    fn test_default_value_compiled() {
        let f = field(&[("name", s("x")), ("type", s("integer")), ("default", s("1 + 2"))]).unwrap();
        assert_eq!(f.default_value.as_deref(), Some("1 + 2"));
        assert_eq!(f.default_value_expr, Some(Expr::compile("1 + 2").unwrap()));
    }

    #[test]
    fn test_default_value_compile_error_propagates() {
        let err = field(&[("name", s("x")), ("default", s("1 +"))]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Expression);
    }

    #[test]
    fn test_long_default_chains_rejected() {
        let sum = vec!["1"; 100_000].join("+");
        let err = field(&[("name", s("x")), ("default", s(&sum))]).unwrap_err();
        assert_eq!(err, SpaceDefError::Expr(ExprError::TooDeep));

        let is_null = format!("x{}", " IS NULL".repeat(100_000));
        let err = field(&[("name", s("x")), ("default", s(&is_null))]).unwrap_err();
        assert_eq!(err, SpaceDefError::Expr(ExprError::TooDeep));

        let data = arr(vec![map(&[("name", s("x")), ("default", s(&sum))])]).encode();
        let err = decode_format(&mut Reader::new(&data), "T").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Expression);
    }

    #[test]
    fn test_unknown_keys_skipped() {
        let f = field(&[
            ("name", s("x")),
            ("comment", map(&[("a", Mp::Nil)])),
            ("weight", Mp::Int(-5)),
            ("type", s("map")),
        ])
        .unwrap();
        assert_eq!(f.field_type, FieldType::Map);
    }

    #[test]
    fn test_non_map_descriptors() {
        let data = arr(vec![map(&[("name", s("a"))]), s("b")]).encode();
        let err = decode_format(&mut Reader::new(&data), "T").unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("space 'T' field 2", "is not map"));

        let data = arr(vec![Mp::Map(vec![(Mp::Uint(1), s("x"))])]).encode();
        let err = decode_format(&mut Reader::new(&data), "T").unwrap_err();
        assert_eq!(reason(err), "format is not map with string keys");

        let data = map(&[]).encode();
        let err = decode_format(&mut Reader::new(&data), "T").unwrap_err();
        assert_eq!(reason(err), "format must be an array");
    }

    #[test]
    fn test_empty_format() {
        let data = arr(vec![]).encode();
        assert!(decode_format(&mut Reader::new(&data), "T").unwrap().is_empty());
    }

    #[test]
    fn test_lying_array_count() {
        let mut data = Vec::new();
        rmp::encode::write_array_len(&mut data, 1_000_000).unwrap();
        let err = decode_format(&mut Reader::new(&data), "T").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn test_builders() {
        let f = FieldDef::new("n", FieldType::Number).nullable().with_default("0").unwrap();
        assert!(f.is_nullable);
        assert_eq!(f.nullable_action, OnConflictAction::None);
        assert_eq!(f.default_value_expr, Some(Expr::Integer(0)));
        assert_eq!(collation_name(1), Some("unicode"));
        assert_eq!(collation_name(COLL_NONE), Some("none"));
        assert_eq!(collation_name(77), None);
    }
}
