//! Space-level options: temporary and view flags, view SQL, CHECKs.

use crate::checks::{decode_checks, CheckList, SpaceRef};
use crate::error::{try_clone_str, Result, SpaceDefError};
use crate::msgpack::Reader;
use crate::opts::{decode_opts, opt_slot, OptDef, OptKind, UnknownKeys};
use crate::sql::ExprError;

#[derive(Debug, Default, PartialEq)]
pub struct SpaceOpts {
    /// Space data is not persisted.
    pub temporary: bool,
    pub is_view: bool,
    /// SQL text of the view, if any.
    pub sql: Option<String>,
    pub checks: Option<CheckList>,
}

fn checks_array_decode(opts: &mut SpaceOpts, rd: &mut Reader<'_>, len: u32, location: &str) -> Result<()> {
    let checks = decode_checks(rd, len, location)?;
    opts.checks = if checks.is_empty() { None } else { Some(checks) };
    Ok(())
}

pub static SPACE_OPTS_REG: [OptDef<SpaceOpts>; 4] = [
    OptDef {
        name: "temporary",
        kind: OptKind::Bool(opt_slot!(SpaceOpts, temporary: bool)),
    },
    OptDef {
        name: "view",
        kind: OptKind::Bool(opt_slot!(SpaceOpts, is_view: bool)),
    },
    OptDef {
        name: "sql",
        kind: OptKind::Str(opt_slot!(SpaceOpts, sql: Option<String>)),
    },
    OptDef {
        name: "checks",
        kind: OptKind::Array(checks_array_decode),
    },
];

impl SpaceOpts {
    /// Decode an option map. Unrecognised keys are skipped.
    pub fn decode(rd: &mut Reader<'_>, location: &str) -> Result<SpaceOpts> {
        let mut opts = SpaceOpts::default();
        decode_opts(&mut opts, &SPACE_OPTS_REG, rd, UnknownKeys::Skip, location)?;
        Ok(opts)
    }

    /// Copy for a new owning definition; CHECKs are rebound to `owner`.
    pub fn dup(&self, owner: &SpaceRef) -> Result<SpaceOpts> {
        let sql = match &self.sql {
            Some(sql) => Some(try_clone_str(sql, "strdup", "opts.sql")?),
            None => None,
        };
        let checks = match &self.checks {
            Some(checks) => {
                let mut copy = checks.try_dup().map_err(|err| match err {
                    ExprError::OutOfMemory { size, .. } => SpaceDefError::OutOfMemory {
                        size,
                        op: "sql_expr_list_dup",
                        what: "opts.checks",
                    },
                    other => SpaceDefError::from(other),
                })?;
                copy.rebind_owner(owner);
                Some(copy)
            }
            None => None,
        };
        Ok(SpaceOpts {
            temporary: self.temporary,
            is_view: self.is_view,
            sql,
            checks,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::testutil::{arr, map, s, Mp};

    fn decode(value: Mp) -> Result<SpaceOpts> {
        let data = value.encode();
        SpaceOpts::decode(&mut Reader::new(&data), "space options")
    }

    #[test]
    fn test_defaults() {
        let opts = decode(map(&[])).unwrap();
        assert_eq!(opts, SpaceOpts::default());
    }

    #[test]
    fn test_view() {
        let opts = decode(map(&[
            ("view", Mp::Bool(true)),
            ("sql", s("SELECT * FROM t")),
            ("checks", arr(vec![map(&[("expr", s("a = 1")), ("name", s("ONE"))])])),
        ]))
        .unwrap();
        assert!(opts.is_view);
        assert!(!opts.temporary);
        assert_eq!(opts.sql.as_deref(), Some("SELECT * FROM t"));
        assert_eq!(opts.checks.as_ref().map(CheckList::len), Some(1));
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let opts = decode(map(&[("group_id", Mp::Uint(1)), ("temporary", Mp::Bool(true))])).unwrap();
        assert!(opts.temporary);
    }

    #[test]
    fn test_empty_checks() {
        let opts = decode(map(&[("checks", arr(vec![]))])).unwrap();
        assert!(opts.checks.is_none());
    }

    #[test]
    fn test_wrong_types() {
        let err = decode(map(&[("view", s("yes"))])).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("space options", "'view' must be boolean"));
        let err = decode(map(&[("checks", map(&[]))])).unwrap_err();
        assert_eq!(err, SpaceDefError::invalid_format("space options", "'checks' must be array"));
        assert_eq!(decode(arr(vec![])).unwrap_err().kind(), ErrorKind::InvalidFormat);
    }

    #[test]
    fn test_dup_rebinds_checks() {
        let opts = decode(map(&[
            ("sql", s("SELECT 1")),
            ("checks", arr(vec![map(&[("expr", s("x > 0")), ("name", s("POS"))])])),
        ]))
        .unwrap();
        let owner = SpaceRef {
            space_id: 600,
            space_name: "V".into(),
        };
        let copy = opts.dup(&owner).unwrap();
        assert_eq!(copy.sql, opts.sql);
        let check = copy.checks.as_ref().unwrap().get(0).unwrap();
        assert_eq!(check.owner(), Some(&owner));
        assert!(opts.checks.as_ref().unwrap().get(0).unwrap().owner().is_none());
    }
}
