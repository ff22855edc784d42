//! CHECK constraints attached to a space.

use std::fmt;

use crate::error::{Result, SpaceDefError};
use crate::msgpack::{Reader, ValueType};
use crate::opts::{decode_opts, opt_slot, OptDef, OptKind, UnknownKeys};
use crate::sql::{Expr, ExprError};

/// Identity of the space definition that owns a constraint list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceRef {
    pub space_id: u32,
    pub space_name: String,
}

impl fmt::Display for SpaceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "space '{}' ({})", self.space_name, self.space_id)
    }
}

/// One named CHECK expression.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckConstraint {
    pub name: Option<String>,
    pub expr_text: String,
    pub expr: Expr,
    owner: Option<SpaceRef>,
}

impl CheckConstraint {
    pub fn compile(name: Option<&str>, expr_text: &str) -> Result<Self, ExprError> {
        Ok(Self {
            name: name.map(str::to_string),
            expr_text: expr_text.to_string(),
            expr: Expr::compile(expr_text)?,
            owner: None,
        })
    }

    /// Space definition this constraint belongs to, once attached.
    pub fn owner(&self) -> Option<&SpaceRef> {
        self.owner.as_ref()
    }

    /// Diagnostic for a tuple that fails this constraint.
    pub fn violation_message(&self) -> String {
        let name = self.name.as_deref().unwrap_or("<unnamed>");
        match &self.owner {
            Some(owner) => format!("Check constraint failed '{name}': {} in {owner}", self.expr_text),
            None => format!("Check constraint failed '{name}': {}", self.expr_text),
        }
    }
}

/// Ordered list of CHECK constraints.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckList {
    items: Vec<CheckConstraint>,
}

impl CheckList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, i: usize) -> Option<&CheckConstraint> {
        self.items.get(i)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &CheckConstraint> {
        self.items.iter()
    }

    pub fn push(&mut self, check: CheckConstraint) -> Result<(), ExprError> {
        self.items.try_reserve(1).map_err(|_| ExprError::OutOfMemory {
            size: std::mem::size_of::<CheckConstraint>(),
            op: "sql_expr_list_append",
        })?;
        self.items.push(check);
        Ok(())
    }

    /// Deep copy of the whole list; owners are carried over unchanged.
    pub fn try_dup(&self) -> Result<CheckList, ExprError> {
        let mut items = Vec::new();
        items.try_reserve_exact(self.items.len()).map_err(|_| ExprError::OutOfMemory {
            size: self.items.len() * std::mem::size_of::<CheckConstraint>(),
            op: "sql_expr_list_dup",
        })?;
        items.extend(self.items.iter().cloned());
        Ok(CheckList { items })
    }

    /// Point every constraint at a new owning definition.
    pub fn rebind_owner(&mut self, owner: &SpaceRef) {
        for item in &mut self.items {
            item.owner = Some(owner.clone());
        }
    }
}

/// Decode target for one CHECK map.
#[derive(Default)]
struct RawCheck {
    name: Option<String>,
    expr: Option<String>,
}

static CHECK_REG: [OptDef<RawCheck>; 2] = [
    OptDef {
        name: "expr",
        kind: OptKind::Str(opt_slot!(RawCheck, expr: Option<String>)),
    },
    OptDef {
        name: "name",
        kind: OptKind::Str(opt_slot!(RawCheck, name: Option<String>)),
    },
];

/// Decode `len` CHECK maps, e.g. `[{"expr": "x < y", "name": "ONE"}, ..]`.
///
/// Keys other than `expr` and `name` are rejected. On error nothing
/// decoded so far survives.
pub fn decode_checks(rd: &mut Reader<'_>, len: u32, location: &str) -> Result<CheckList> {
    let mut checks = CheckList::new();
    for i in 0..len {
        if rd.peek_type()? != ValueType::Map {
            return Err(SpaceDefError::invalid_format(
                location,
                format!("CHECK constraint {} is not a map", i + 1),
            ));
        }
        let mut raw = RawCheck::default();
        decode_opts(&mut raw, &CHECK_REG, rd, UnknownKeys::Reject, location)?;
        let Some(expr_text) = raw.expr else {
            return Err(SpaceDefError::invalid_format(
                location,
                format!("CHECK constraint {} has no 'expr'", i + 1),
            ));
        };
        let check = CheckConstraint::compile(raw.name.as_deref(), &expr_text).map_err(|err| match err {
            ExprError::OutOfMemory { .. } => SpaceDefError::from(err),
            _ => SpaceDefError::invalid_format(location, "invalid expression specified"),
        })?;
        checks.push(check)?;
    }
    Ok(checks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{arr, map, s, Mp};

    fn decode(value: Mp) -> Result<CheckList> {
        let data = value.encode();
        let mut rd = Reader::new(&data);
        let len = rd.read_array_len()?;
        decode_checks(&mut rd, len, "space options")
    }

    #[test]
    fn test_single_check() {
        let checks = decode(arr(vec![map(&[("expr", s("x > 0")), ("name", s("POS"))])])).unwrap();
        assert_eq!(checks.len(), 1);
        let check = checks.get(0).unwrap();
        assert_eq!(check.name.as_deref(), Some("POS"));
        assert_eq!(check.expr_text, "x > 0");
        assert_eq!(check.expr, Expr::compile("x > 0").unwrap());
        assert!(check.owner().is_none());
    }

    #[test]
    fn test_order_preserved() {
        let checks = decode(arr(vec![
            map(&[("name", s("A")), ("expr", s("a > 1"))]),
            map(&[("expr", s("b < 2"))]),
        ]))
        .unwrap();
        let names: Vec<_> = checks.iter().map(|c| c.name.as_deref()).collect();
        assert_eq!(names, vec![Some("A"), None]);
    }

    #[test]
    fn test_unknown_key() {
        let err = decode(arr(vec![map(&[("expr", s("x>0")), ("bogus", s("y"))])])).unwrap_err();
        assert_eq!(
            err,
            SpaceDefError::invalid_format("space options", "unexpected option 'bogus'")
        );
    }

    #[test]
    fn test_bad_value_type() {
        let err = decode(arr(vec![map(&[("expr", Mp::Uint(1))])])).unwrap_err();
        assert_eq!(
            err,
            SpaceDefError::invalid_format("space options", "'expr' must be string")
        );
    }

    #[test]
    fn test_non_string_key() {
        let err = decode(arr(vec![Mp::Map(vec![(Mp::Uint(0), s("x"))])])).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("space options", "key must be a string"));
    }

    #[test]
    fn test_element_not_a_map() {
        let err = decode(arr(vec![map(&[("expr", s("x > 0"))]), s("x")])).unwrap_err();
        assert_eq!(
            err,
            SpaceDefError::invalid_format("space options", "CHECK constraint 2 is not a map")
        );
    }

    #[test]
    fn test_bad_expression() {
        let err = decode(arr(vec![
            map(&[("expr", s("a > 0"))]),
            map(&[("expr", s("a >"))]),
        ]))
        .unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("space options", "invalid expression specified"));
    }

    #[test]
    fn test_missing_expr() {
        let err = decode(arr(vec![map(&[("name", s("N"))])])).unwrap_err();
        assert_eq!(
            err,
            SpaceDefError::invalid_format("space options", "CHECK constraint 1 has no 'expr'")
        );
    }

    #[test]
    fn test_decode_twice_is_independent() {
        let value = arr(vec![
            map(&[("expr", s("x > 0")), ("name", s("POS"))]),
            map(&[("expr", s("length(s) < 10")), ("name", s("SHORT"))]),
        ]);
        let first = decode(value.clone()).unwrap();
        let mut second = decode(value).unwrap();
        assert_eq!(first, second);

        second.rebind_owner(&SpaceRef {
            space_id: 1,
            space_name: "T".into(),
        });
        assert_ne!(first, second);
        assert!(first.get(0).unwrap().owner().is_none());
    }

    #[test]
    fn test_dup_and_rebind() {
        let mut checks = decode(arr(vec![map(&[("expr", s("x > 0")), ("name", s("POS"))])])).unwrap();
        let old = SpaceRef {
            space_id: 512,
            space_name: "T".into(),
        };
        checks.rebind_owner(&old);

        let mut copy = checks.try_dup().unwrap();
        assert_eq!(copy, checks);
        let new = SpaceRef {
            space_id: 513,
            space_name: "T2".into(),
        };
        copy.rebind_owner(&new);
        assert_eq!(copy.get(0).unwrap().owner(), Some(&new));
        assert_eq!(checks.get(0).unwrap().owner(), Some(&old));
        assert_eq!(
            copy.get(0).unwrap().violation_message(),
            "Check constraint failed 'POS': x > 0 in space 'T2' (513)"
        );
    }
}
