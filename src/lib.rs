pub mod checks;
pub mod decode;
pub mod dict;
pub mod error;
pub mod field;
pub mod identifier;
pub mod layout;
pub mod limits;
pub mod msgpack;
pub mod opts;
pub mod render;
pub mod space_def;
pub mod space_opts;
pub mod sql;

#[cfg(test)]
mod testutil;

use wasm_bindgen::prelude::*;

pub use checks::{CheckConstraint, CheckList, SpaceRef};
pub use decode::decode_space;
pub use dict::TupleDictionary;
pub use error::{ErrorKind, Result, SpaceDefError};
pub use field::{decode_field, decode_format, FieldDef, FieldType, OnConflictAction};
pub use space_def::{FieldView, SpaceDef};
pub use space_opts::SpaceOpts;

/// Initialize panic hook for better error messages in WASM
#[wasm_bindgen(start)]
pub fn init() {
    #[cfg(target_arch = "wasm32")]
    console_error_panic_hook::set_once();
}

/// Describe a MessagePack-encoded `_space` tuple as text
#[wasm_bindgen(js_name = "describeSpace")]
pub fn describe_space(tuple: &js_sys::Uint8Array) -> Result<String, String> {
    let bytes = tuple.to_vec();
    let def = decode_space(&bytes).map_err(|e| e.to_string())?;
    Ok(render::render_space(&def))
}
