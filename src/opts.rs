//! Declarative option registry.
//!
//! A registry is a table of [`OptDef`] entries, each binding a wire key to
//! a decoder and the struct slot it fills. Space options and field
//! descriptors are both decoded through [`parse_key`], so the map loop is
//! the same for every option-bearing object.

use tracing::trace;

use crate::error::{try_clone_str, Result, SpaceDefError};
use crate::msgpack::{Reader, ValueType};

/// Decodes a custom-typed value straight from the reader.
pub type AnyDecodeFn<T> = fn(&mut T, &mut Reader<'_>, &str) -> Result<()>;

/// Decodes the elements of an array value; receives the element count.
pub type ArrayDecodeFn<T> = fn(&mut T, &mut Reader<'_>, u32, &str) -> Result<()>;

pub enum OptKind<T> {
    Bool(fn(&mut T) -> &mut bool),
    Str(fn(&mut T) -> &mut Option<String>),
    /// String value handed to a parser that stores the result (or records
    /// an unrecognised name) in the target.
    Enum(fn(&mut T, &str)),
    Any(AnyDecodeFn<T>),
    Array(ArrayDecodeFn<T>),
}

impl<T> OptKind<T> {
    fn expected(&self) -> &'static str {
        match self {
            OptKind::Bool(_) => "boolean",
            OptKind::Str(_) => "string",
            OptKind::Enum(_) => "enum",
            OptKind::Any(_) => "valid",
            OptKind::Array(_) => "array",
        }
    }
}

pub struct OptDef<T> {
    pub name: &'static str,
    pub kind: OptKind<T>,
}

/// What to do with a key that has no registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnknownKeys {
    Skip,
    Reject,
}

/// Accessor for a struct field, usable as an [`OptKind`] slot.
macro_rules! opt_slot {
    ($ty:ty, $field:ident: $out:ty) => {{
        fn slot(target: &mut $ty) -> &mut $out {
            &mut target.$field
        }
        slot
    }};
}
pub(crate) use opt_slot;

/// Decode the value of `key` into `target`.
///
/// Returns `false` when the key is not registered and was skipped.
pub fn parse_key<T>(
    target: &mut T,
    reg: &[OptDef<T>],
    key: &str,
    rd: &mut Reader<'_>,
    unknown: UnknownKeys,
    location: &str,
) -> Result<bool> {
    let Some(def) = reg.iter().find(|def| def.name == key) else {
        return match unknown {
            UnknownKeys::Skip => {
                trace!(key, location, "skipping unknown option");
                rd.skip()?;
                Ok(false)
            }
            UnknownKeys::Reject => Err(SpaceDefError::invalid_format(
                location,
                format!("unexpected option '{key}'"),
            )),
        };
    };

    let mismatch = || SpaceDefError::invalid_format(location, format!("'{key}' must be {}", def.kind.expected()));
    let value_type = rd.peek_type()?;

    match &def.kind {
        OptKind::Bool(slot) => {
            if value_type != ValueType::Bool {
                return Err(mismatch());
            }
            *slot(target) = rd.read_bool()?;
        }
        OptKind::Str(slot) => {
            if value_type != ValueType::Str {
                return Err(mismatch());
            }
            let value = rd.read_str()?;
            *slot(target) = Some(try_clone_str(value, "opt_set", key_what(key))?);
        }
        OptKind::Enum(set) => {
            if value_type != ValueType::Str {
                return Err(mismatch());
            }
            set(target, rd.read_str()?);
        }
        OptKind::Any(decode) => decode(target, rd, location)?,
        OptKind::Array(decode) => {
            if value_type != ValueType::Array {
                return Err(mismatch());
            }
            let len = rd.read_array_len()?;
            decode(target, rd, len, location)?;
        }
    }
    Ok(true)
}

fn key_what(key: &str) -> &'static str {
    match key {
        "sql" => "opts.sql",
        "expr" => "check expression",
        "name" => "field name",
        "default" => "field default",
        _ => "option value",
    }
}

/// Decode a whole option map into `target`.
pub fn decode_opts<T>(
    target: &mut T,
    reg: &[OptDef<T>],
    rd: &mut Reader<'_>,
    unknown: UnknownKeys,
    location: &str,
) -> Result<()> {
    if rd.peek_type()? != ValueType::Map {
        return Err(SpaceDefError::invalid_format(location, "expected a map"));
    }
    let count = rd.read_map_len()?;
    for _ in 0..count {
        if rd.peek_type()? != ValueType::Str {
            return Err(SpaceDefError::invalid_format(location, "key must be a string"));
        }
        let key = rd.read_str()?;
        parse_key(target, reg, key, rd, unknown, location)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutil::{arr, map, s, Mp};

    #[derive(Debug, Default)]
    struct Target {
        flag: bool,
        label: Option<String>,
        mode: Option<String>,
        items: Vec<u32>,
    }

    fn set_mode(p: &mut Target, value: &str) {
        p.mode = Some(value.to_uppercase());
    }

    fn decode_items(p: &mut Target, rd: &mut Reader<'_>, len: u32, _location: &str) -> Result<()> {
        for _ in 0..len {
            p.items.push(rd.read_u32()?);
        }
        Ok(())
    }

    static TARGET_REG: [OptDef<Target>; 4] = [
        OptDef {
            name: "flag",
            kind: OptKind::Bool(opt_slot!(Target, flag: bool)),
        },
        OptDef {
            name: "label",
            kind: OptKind::Str(opt_slot!(Target, label: Option<String>)),
        },
        OptDef {
            name: "mode",
            kind: OptKind::Enum(set_mode),
        },
        OptDef {
            name: "items",
            kind: OptKind::Array(decode_items),
        },
    ];

    fn decode(value: Mp, unknown: UnknownKeys) -> Result<Target> {
        let data = value.encode();
        let mut target = Target::default();
        decode_opts(&mut target, &TARGET_REG, &mut Reader::new(&data), unknown, "target")?;
        Ok(target)
    }

    #[test]
    fn test_all_kinds() {
        let target = decode(
            map(&[
                ("flag", Mp::Bool(true)),
                ("label", s("hello")),
                ("mode", s("fast")),
                ("items", arr(vec![Mp::Uint(4), Mp::Uint(5)])),
            ]),
            UnknownKeys::Reject,
        )
        .unwrap();
        assert!(target.flag);
        assert_eq!(target.label.as_deref(), Some("hello"));
        assert_eq!(target.mode.as_deref(), Some("FAST"));
        assert_eq!(target.items, vec![4, 5]);
    }

    #[test]
    fn test_unknown_key_policy() {
        let value = map(&[("other", map(&[("x", Mp::Uint(1))])), ("flag", Mp::Bool(true))]);
        let target = decode(value.clone(), UnknownKeys::Skip).unwrap();
        assert!(target.flag);

        let err = decode(value, UnknownKeys::Reject).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("target", "unexpected option 'other'"));
    }

    #[test]
    fn test_type_mismatch() {
        let err = decode(map(&[("flag", s("yes"))]), UnknownKeys::Skip).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("target", "'flag' must be boolean"));

        let err = decode(map(&[("label", Mp::Uint(7))]), UnknownKeys::Skip).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("target", "'label' must be string"));

        let err = decode(map(&[("items", map(&[]))]), UnknownKeys::Skip).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("target", "'items' must be array"));
    }

    #[test]
    fn test_not_a_map() {
        let err = decode(arr(vec![]), UnknownKeys::Skip).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidFormat);

        let bad_key = Mp::Map(vec![(Mp::Uint(1), Mp::Bool(true))]);
        let err = decode(bad_key, UnknownKeys::Skip).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("target", "key must be a string"));
    }
}
