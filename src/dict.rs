//! Shared field-name dictionary.
//!
//! Maps field names to their ordinal positions. A dictionary is shared by
//! every definition built from the same format, so it lives behind an
//! [`Arc`]: cloning the `Arc` acquires a reference and dropping it releases
//! one.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Result, SpaceDefError};
use crate::field::FieldDef;

#[derive(Debug)]
pub struct TupleDictionary {
    names: Vec<String>,
    index: HashMap<String, u32>,
}

impl TupleDictionary {
    /// Build a dictionary over `fields` in declaration order.
    pub fn new(fields: &[FieldDef]) -> Result<Arc<Self>> {
        let oom = |size: usize| SpaceDefError::OutOfMemory {
            size,
            op: "malloc",
            what: "tuple dictionary",
        };
        let mut names = Vec::new();
        names
            .try_reserve_exact(fields.len())
            .map_err(|_| oom(fields.len() * std::mem::size_of::<String>()))?;
        let mut index = HashMap::new();
        index
            .try_reserve(fields.len())
            .map_err(|_| oom(fields.len() * std::mem::size_of::<(String, u32)>()))?;

        for (fieldno, field) in fields.iter().enumerate() {
            if index.insert(field.name.clone(), fieldno as u32).is_some() {
                return Err(SpaceDefError::DuplicateField {
                    name: field.name.clone(),
                });
            }
            names.push(field.name.clone());
        }
        Ok(Arc::new(Self { names, index }))
    }

    pub fn field_no(&self, name: &str) -> Option<u32> {
        self.index.get(name).copied()
    }

    pub fn name(&self, fieldno: u32) -> Option<&str> {
        self.names.get(fieldno as usize).map(String::as_str)
    }

    pub fn names(&self) -> impl ExactSizeIterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
