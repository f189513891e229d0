//! Expansion of flat, possibly dot-delimited field keys into a nested
//! context tree.

use serde_json::{Map, Value};

/// Expand a flat field collection into a nested context tree.
///
/// Pure and total: no I/O, no error path. Keys without dots come through as
/// an identity mapping; malformed shapes degrade by overwrite, never by
/// failure.
pub fn normalize<I>(fields: I) -> Map<String, Value>
where
    I: IntoIterator<Item = (String, Value)>,
{
    let mut dest = Map::new();
    for (key, value) in fields {
        expand_nested(&key, value, &mut dest);
    }
    dest
}

/// Insert `value` into `dest` under `key`, expanding dot-delimited keys into
/// nested objects.
///
/// `"a.b"` lands at `dest["a"]["b"]`. When `dest["a"]` already holds an
/// object the new entry is merged into it, so `"a.b"` followed by `"a.c"`
/// yields both sub-keys; when it holds anything else the previous value is
/// overwritten with a fresh object. Dot-free keys are stored unchanged.
pub fn expand_nested(key: &str, value: Value, dest: &mut Map<String, Value>) {
    if let Some((head, rest)) = key.split_once('.') {
        // This nested value might already exist; anything that is not a map
        // gets overwritten with a fresh one.
        if !matches!(dest.get(head), Some(Value::Object(_))) {
            dest.insert(head.to_string(), Value::Object(Map::new()));
        }
        if let Some(Value::Object(nested)) = dest.get_mut(head) {
            expand_nested(rest, value, nested);
        }
        return;
    }
    dest.insert(key.to_string(), value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn expand_all(pairs: Vec<(&str, Value)>) -> Map<String, Value> {
        normalize(pairs.into_iter().map(|(key, value)| (key.to_string(), value)))
    }

    #[test]
    fn flat_keys_pass_through_unchanged() {
        let dest = expand_all(vec![
            ("foo", json!("bar")),
            ("bar", json!(1)),
            ("bean", json!(true)),
        ]);
        assert_eq!(dest.get("foo"), Some(&json!("bar")));
        assert_eq!(dest.get("bar"), Some(&json!(1)));
        assert_eq!(dest.get("bean"), Some(&json!(true)));
        assert_eq!(dest.len(), 3);
    }

    #[test]
    fn dotted_keys_nest() {
        let dest = expand_all(vec![
            ("http.url", json!("http://example.com")),
            ("http.response.code", json!(200)),
        ]);
        assert_eq!(
            Value::Object(dest),
            json!({"http": {"url": "http://example.com", "response": {"code": 200}}})
        );
    }

    #[test]
    fn siblings_are_preserved() {
        let dest = expand_all(vec![("a.b", json!("x")), ("a.c", json!("y"))]);
        assert_eq!(Value::Object(dest), json!({"a": {"b": "x", "c": "y"}}));
    }

    #[test]
    fn bare_key_overwrites_nested_map() {
        let dest = expand_all(vec![("a.b", json!("x")), ("a", json!("z"))]);
        assert_eq!(Value::Object(dest), json!({"a": "z"}));
    }

    #[test]
    fn dotted_key_overwrites_scalar() {
        let dest = expand_all(vec![("a", json!("z")), ("a.b", json!("x"))]);
        assert_eq!(Value::Object(dest), json!({"a": {"b": "x"}}));
    }

    #[test]
    fn the_dotted_key_itself_is_not_kept_flat() {
        let dest = expand_all(vec![("a.b", json!("x"))]);
        assert!(!dest.contains_key("a.b"));
    }
}
