//! Value coercions applied while mapping intake keys to entity fields.
//!
//! Intake values arrive already validated upstream but loosely typed: a
//! dollar amount may be a number or a numeric string, a flag may be `"Y"` or
//! `true`. These helpers never fail; an unusable value maps to the empty
//! form of the target type.

use serde_json::Value;

/// Walk nested object keys.
pub fn at<'a>(value: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(value, |v, key| v.get(*key))
}

/// Render a scalar as text. Null, absent and containers map to `""`.
pub fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

/// Like [`text`], but `None` when the result would be empty.
pub fn opt_text(value: Option<&Value>) -> Option<String> {
    Some(text(value)).filter(|s| !s.is_empty())
}

/// Y/N flag to boolean. `"Y"`, `"y"` and `true` are true; everything else,
/// including absence, is false.
pub fn yes_no(value: Option<&Value>) -> bool {
    match value {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("y"),
        _ => false,
    }
}

/// Flatten a list of strings into one comma-joined string.
///
/// A bare string passes through; non-string list items are rendered with
/// [`text`].
pub fn join(value: Option<&Value>) -> String {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| text(Some(item)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(","),
        other => text(other),
    }
}

/// Integer amount from a number or a numeric string.
pub fn amount(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

/// Normalize an award reference to `PREFIX-NNNNN`.
///
/// The numeric part is zero padded to five digits and the prefix upper
/// cased: `award-1` becomes `AWARD-00001`. References that do not end in a
/// number are returned trimmed and upper cased.
pub fn award_reference(raw: &str) -> String {
    let raw = raw.trim();
    match raw.rsplit_once('-') {
        Some((prefix, digits)) if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) => {
            match digits.parse::<u64>() {
                Ok(n) => format!("{}-{n:05}", prefix.to_ascii_uppercase()),
                Err(_) => raw.to_ascii_uppercase(),
            }
        }
        _ => raw.to_ascii_uppercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    #[test]
    fn test_yes_no() {
        assert!(yes_no(Some(&json!("Y"))));
        assert!(yes_no(Some(&json!("y"))));
        assert!(yes_no(Some(&json!(true))));
        assert!(!yes_no(Some(&json!("N"))));
        assert!(!yes_no(Some(&json!("yes"))));
        assert!(!yes_no(Some(&json!(1))));
        assert!(!yes_no(None));
    }

    #[test]
    fn test_join() {
        assert_eq!(join(Some(&json!(["unmodified_opinion", "adverse_opinion"]))), "unmodified_opinion,adverse_opinion");
        assert_eq!(join(Some(&json!([]))), "");
        assert_eq!(join(Some(&json!("cash_basis"))), "cash_basis");
        assert_eq!(join(None), "");
    }

    #[test]
    fn test_amount() {
        assert_eq!(amount(Some(&json!(125000))), Some(125000));
        assert_eq!(amount(Some(&json!("1,250"))), Some(1250));
        assert_eq!(amount(Some(&json!(12.0))), Some(12));
        assert_eq!(amount(Some(&json!(12.5))), None);
        assert_eq!(amount(Some(&json!("N/A"))), None);
        assert_eq!(amount(None), None);
    }

    #[test]
    fn test_award_reference() {
        assert_eq!(award_reference("AWARD-0001"), "AWARD-00001");
        assert_eq!(award_reference("award-1"), "AWARD-00001");
        assert_eq!(award_reference(" AWARD-00012 "), "AWARD-00012");
        assert_eq!(award_reference("AWARD-123456"), "AWARD-123456");
        assert_eq!(award_reference("N/A"), "N/A");
        assert_eq!(award_reference("AWARD-"), "AWARD-");
    }

    #[test]
    fn test_at_walks_objects() {
        let doc = json!({"program": {"award_reference": "AWARD-0001"}});
        assert_eq!(at(&doc, &["program", "award_reference"]), Some(&json!("AWARD-0001")));
        assert_eq!(at(&doc, &["program", "missing"]), None);
        assert_eq!(at(&doc, &[]), Some(&doc));
    }

    proptest! {
        #[test]
        fn prop_award_reference_is_idempotent(n in 0u32..100_000) {
            let once = award_reference(&format!("award-{n}"));
            prop_assert_eq!(award_reference(&once), once.clone());
            prop_assert_eq!(once.len(), 11);
        }
    }
}
