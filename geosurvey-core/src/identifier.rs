//! Identifier sanitation for storage table and column names.
//!
//! Any user-supplied name that ends up in DDL or DML passes through
//! [`sanitize_identifier`] first. The output always matches
//! `^[a-zA-Z][a-zA-Z0-9_]*$`, is at most [`MAX_IDENTIFIER_LEN`] bytes long,
//! and never equals a reserved SQL keyword or one of the system columns the
//! response tables carry.

/// Maximum identifier length accepted by PostgreSQL without truncation.
pub const MAX_IDENTIFIER_LEN: usize = 63;

/// Prefix applied to identifiers that start with a non-letter or collide
/// with a reserved word.
const GUARD_PREFIX: &str = "f_";

/// Fallback used when nothing usable survives sanitation.
const EMPTY_FALLBACK: &str = "field";

/// SQL keywords and system column names that may not be used verbatim.
const RESERVED: &[&str] = &[
    "accuracy",
    "all",
    "alter",
    "and",
    "as",
    "asc",
    "between",
    "by",
    "case",
    "check",
    "column",
    "constraint",
    "create",
    "created_at",
    "data",
    "date",
    "default",
    "delete",
    "desc",
    "distinct",
    "drop",
    "else",
    "end",
    "false",
    "fid",
    "foreign",
    "form_id",
    "from",
    "geom",
    "grant",
    "group",
    "having",
    "id",
    "in",
    "index",
    "insert",
    "into",
    "ip_address",
    "is",
    "join",
    "key",
    "latitude",
    "like",
    "limit",
    "longitude",
    "not",
    "null",
    "offset",
    "on",
    "or",
    "order",
    "primary",
    "references",
    "select",
    "set",
    "table",
    "then",
    "true",
    "union",
    "unique",
    "unique_display_id",
    "update",
    "user",
    "values",
    "when",
    "where",
];

/// Rewrite `raw` into a safe storage identifier.
///
/// Characters outside `[a-z0-9_]` become underscores (letters are
/// lower-cased first), runs of underscores collapse, and trailing
/// underscores are dropped.
///
/// # Examples
///
/// ```
/// use geosurvey_core::sanitize_identifier;
///
/// assert_eq!(sanitize_identifier("Tree Species"), "tree_species");
/// assert_eq!(sanitize_identifier("2nd visit"), "f_2nd_visit");
/// assert_eq!(sanitize_identifier("select"), "f_select");
/// ```
#[must_use]
pub fn sanitize_identifier(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    for ch in raw.trim().chars() {
        let mapped = if ch.is_ascii_alphanumeric() {
            ch.to_ascii_lowercase()
        } else {
            '_'
        };
        if mapped == '_' && cleaned.ends_with('_') {
            continue;
        }
        cleaned.push(mapped);
    }
    let trimmed = cleaned.trim_end_matches('_');

    let mut identifier = if trimmed.is_empty() {
        EMPTY_FALLBACK.to_owned()
    } else if trimmed.starts_with(|c: char| c.is_ascii_alphabetic()) {
        trimmed.to_owned()
    } else {
        format!("{GUARD_PREFIX}{}", trimmed.trim_start_matches('_'))
    };

    // Identifiers are pure ASCII here, so byte truncation is char-safe.
    identifier.truncate(MAX_IDENTIFIER_LEN);
    let truncated_len = identifier.trim_end_matches('_').len();
    identifier.truncate(truncated_len);

    if RESERVED.contains(&identifier.as_str()) {
        identifier.insert_str(0, GUARD_PREFIX);
    }
    identifier
}

/// Report whether `candidate` already satisfies the identifier contract.
#[must_use]
pub fn is_valid_identifier(candidate: &str) -> bool {
    let mut chars = candidate.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    first.is_ascii_alphabetic()
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        && candidate.len() <= MAX_IDENTIFIER_LEN + GUARD_PREFIX.len()
}

/// Append `_2`, `_3`, ... to `base` until `taken` reports it free.
pub(crate) fn disambiguate(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_owned();
    }
    let mut suffix = 2_u32;
    loop {
        let tail = format!("_{suffix}");
        let mut stem = base.to_owned();
        stem.truncate(MAX_IDENTIFIER_LEN.saturating_sub(tail.len()));
        let candidate = format!("{stem}{tail}");
        if !taken(&candidate) {
            return candidate;
        }
        suffix += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case("species", "species")]
    #[case("Tree Species", "tree_species")]
    #[case("  count (n)  ", "count_n")]
    #[case("__hidden", "f_hidden")]
    #[case("9lives", "f_9lives")]
    #[case("", "field")]
    #[case("!!!", "field")]
    #[case("Ärger", "f_rger")]
    #[case("order", "f_order")]
    #[case("latitude", "f_latitude")]
    #[case("created_at", "f_created_at")]
    fn sanitizes_names(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(sanitize_identifier(raw), expected);
    }

    #[rstest]
    fn caps_length() {
        let raw = "a".repeat(200);
        let sanitized = sanitize_identifier(&raw);
        assert_eq!(sanitized.len(), MAX_IDENTIFIER_LEN);
    }

    #[rstest]
    fn truncation_does_not_leave_trailing_underscore() {
        let raw = format!("{}_b", "a".repeat(MAX_IDENTIFIER_LEN - 1));
        let sanitized = sanitize_identifier(&raw);
        assert!(!sanitized.ends_with('_'));
        assert!(is_valid_identifier(&sanitized));
    }

    #[rstest]
    fn disambiguate_appends_counter() {
        let taken = ["name", "name_2"];
        let result = disambiguate("name", |c| taken.contains(&c));
        assert_eq!(result, "name_3");
    }

    #[rstest]
    #[case("", false)]
    #[case("_x", false)]
    #[case("1x", false)]
    #[case("x-y", false)]
    #[case("x_1", true)]
    fn validates_identifiers(#[case] candidate: &str, #[case] expected: bool) {
        assert_eq!(is_valid_identifier(candidate), expected);
    }

    proptest! {
        #[test]
        fn sanitized_output_always_valid(raw in ".{0,120}") {
            let sanitized = sanitize_identifier(&raw);
            prop_assert!(is_valid_identifier(&sanitized), "{sanitized:?} from {raw:?}");
            prop_assert!(!RESERVED.contains(&sanitized.as_str()));
        }

        #[test]
        fn sanitation_is_idempotent(raw in "[a-zA-Z][a-zA-Z0-9 _-]{0,80}") {
            let once = sanitize_identifier(&raw);
            let twice = sanitize_identifier(&once);
            prop_assert_eq!(once, twice);
        }
    }
}
