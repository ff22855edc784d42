//! Fixed schema limits shared by the decoders and the layout.

/// Maximum length in bytes of a space, field or other object name.
pub const BOX_NAME_MAX: usize = 65000;

/// Maximum length in bytes of a storage engine name.
pub const ENGINE_NAME_MAX: usize = 16;

/// Largest valid space id.
pub const BOX_SPACE_MAX: u32 = i32::MAX as u32;

/// Collation id meaning "no collation".
pub const COLL_NONE: u32 = u32::MAX;

/// Field numbers in diagnostics are 1-based.
pub const TUPLE_INDEX_BASE: u32 = 1;
