//! Decoder for `_space` system tuples.
//!
//! A tuple is `[id, owner, name, engine, field_count, opts, format]`;
//! fields past the seventh are ignored.

use tracing::debug;

use crate::error::{Result, SpaceDefError};
use crate::field::decode_format;
use crate::identifier;
use crate::limits::{BOX_NAME_MAX, BOX_SPACE_MAX, ENGINE_NAME_MAX};
use crate::msgpack::{Reader, ValueType};
use crate::space_def::SpaceDef;
use crate::space_opts::SpaceOpts;

/// Minimum number of fields in a `_space` tuple.
pub const SPACE_TUPLE_FIELDS: u32 = 7;

const TUPLE_LOCATION: &str = "_space tuple";

fn read_uint(rd: &mut Reader<'_>, location: &str, what: &str) -> Result<u64> {
    if rd.peek_type()? != ValueType::Uint {
        return Err(SpaceDefError::invalid_format(location, format!("'{what}' must be unsigned")));
    }
    Ok(rd.read_u64()?)
}

fn read_u32(rd: &mut Reader<'_>, location: &str, what: &str) -> Result<u32> {
    let value = read_uint(rd, location, what)?;
    u32::try_from(value)
        .map_err(|_| SpaceDefError::invalid_format(location, format!("'{what}' is out of range")))
}

fn read_str<'a>(rd: &mut Reader<'a>, location: &str, what: &str) -> Result<&'a str> {
    if rd.peek_type()? != ValueType::Str {
        return Err(SpaceDefError::invalid_format(location, format!("'{what}' must be string")));
    }
    Ok(rd.read_str()?)
}

fn check_identifier(name: &str, location: &str) -> Result<()> {
    if identifier::is_valid(name) {
        Ok(())
    } else {
        Err(SpaceDefError::invalid_format(location, identifier::invalid_reason(name)))
    }
}

/// Decode a `_space` tuple and build its definition.
pub fn decode_space(bytes: &[u8]) -> Result<SpaceDef> {
    let mut rd = Reader::new(bytes);
    if rd.peek_type()? != ValueType::Array {
        return Err(SpaceDefError::invalid_format(TUPLE_LOCATION, "expected an array"));
    }
    let len = rd.read_array_len()?;
    if len < SPACE_TUPLE_FIELDS {
        return Err(SpaceDefError::invalid_format(
            TUPLE_LOCATION,
            format!("expected at least {SPACE_TUPLE_FIELDS} fields, got {len}"),
        ));
    }

    let id = read_uint(&mut rd, TUPLE_LOCATION, "id")?;
    if id > u64::from(BOX_SPACE_MAX) {
        return Err(SpaceDefError::invalid_format(TUPLE_LOCATION, "space id is too big"));
    }
    let id = id as u32;
    let location = format!("space {id}");
    let uid = read_u32(&mut rd, &location, "owner")?;

    let name = read_str(&mut rd, &location, "name")?;
    if name.len() > BOX_NAME_MAX {
        return Err(SpaceDefError::invalid_format(location, "space name is too long"));
    }
    check_identifier(name, &location)?;
    let location = format!("space '{name}'");

    let engine = read_str(&mut rd, &location, "engine")?;
    if engine.len() > ENGINE_NAME_MAX {
        return Err(SpaceDefError::invalid_format(location, "space engine name is too long"));
    }
    check_identifier(engine, &location)?;

    let exact_field_count = read_u32(&mut rd, &location, "field_count")?;
    let opts = SpaceOpts::decode(&mut rd, &location)?;
    let fields = decode_format(&mut rd, name)?;

    if exact_field_count != 0 && (exact_field_count as usize) < fields.len() {
        return Err(SpaceDefError::invalid_format(
            location,
            "exact_field_count must be either 0 or >= formatted field count",
        ));
    }
    if opts.is_view && opts.sql.is_none() {
        return Err(SpaceDefError::invalid_format(location, "view does not have SQL statement"));
    }
    if len > SPACE_TUPLE_FIELDS {
        debug!(id, space = name, extra = len - SPACE_TUPLE_FIELDS, "ignoring trailing _space fields");
    }

    SpaceDef::new(id, uid, exact_field_count, name, engine, &opts, &fields)
}
