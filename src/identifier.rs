//! Identifier syntax check for space and field names.

/// Returns true if `name` is usable as an object identifier: non-empty and
/// free of control characters, line/paragraph separators and Unicode
/// noncharacters.
///
/// This is a structural check only. Unassigned and private-use code points
/// are accepted since no Unicode category table is consulted.
pub fn is_valid(name: &str) -> bool {
    !name.is_empty() && name.chars().all(is_printable)
}

fn is_printable(c: char) -> bool {
    if c.is_control() || c == '\u{2028}' || c == '\u{2029}' {
        return false;
    }
    let cp = c as u32;
    // U+FDD0..U+FDEF and the last two code points of every plane
    !((0xFDD0..=0xFDEF).contains(&cp) || cp & 0xFFFE == 0xFFFE)
}

/// Diagnostic text for a rejected identifier.
pub fn invalid_reason(name: &str) -> String {
    format!(
        "Invalid identifier '{}' (expected printable symbols only or it is too long)",
        name.escape_debug()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_valid() {
        assert!(is_valid("id"));
        assert!(is_valid("first name"));
        assert!(is_valid("名前"));
        assert!(is_valid("ユーザー_1"));
    }

    #[test]
    fn test_invalid() {
        assert!(!is_valid(""));
        assert!(!is_valid("a\u{0}b"));
        assert!(!is_valid("tab\there"));
        assert!(!is_valid("line\u{2028}sep"));
        assert!(!is_valid("non\u{FFFF}char"));
        assert!(!is_valid("\u{FDD0}"));
    }

    #[test]
    fn test_private_use_accepted() {
        assert!(is_valid("\u{E000}"));
        assert!(is_valid("a\u{F0000}"));
    }

    #[test]
    fn test_reason_escapes() {
        assert_eq!(
            invalid_reason("a\nb"),
            "Invalid identifier 'a\\nb' (expected printable symbols only or it is too long)"
        );
    }

    proptest! {
        #[test]
        fn alphanumeric_names_are_valid(name in "[A-Za-z_][A-Za-z0-9_]{0,30}") {
            prop_assert!(is_valid(&name));
        }

        #[test]
        fn any_control_char_invalidates(prefix in "[a-z]{0,8}", c in proptest::char::range('\u{0}', '\u{1f}'), suffix in "[a-z]{0,8}") {
            let name = format!("{prefix}{c}{suffix}");
            prop_assert!(!is_valid(&name));
        }
    }
}
