/// Build the KV prefix owning everything stored for a collection.
/// Format: `col:{name}:`
pub fn collection_prefix(name: &str) -> String {
    format!("col:{name}:")
}

/// Return the KV key holding a collection's schema.
/// Format: `col:{name}:schema`
pub fn schema_key(name: &str) -> String {
    format!("col:{name}:schema")
}

/// Return the KV key holding a collection's index declaration.
/// Format: `col:{name}:index`
pub fn index_key(name: &str) -> String {
    format!("col:{name}:index")
}

/// Return the KV prefix for listing a collection's records.
/// Format: `col:{name}:rec:`
pub fn record_prefix(name: &str) -> String {
    format!("col:{name}:rec:")
}

/// Build the KV key for a record.
/// Format: `col:{name}:rec:{sortable_id}`
///
/// The id is offset into u64 space and zero-padded to 20 digits so that
/// lexicographic key order equals numeric id order, negatives included.
pub fn record_key(name: &str, id: i64) -> String {
    format!("col:{name}:rec:{:020}", sortable_id(id))
}

fn sortable_id(id: i64) -> u64 {
    (id as u64) ^ (1 << 63)
}

/// Extract the collection name from a schema key, if `key` is one.
pub fn parse_schema_key(key: &str) -> Option<&str> {
    key.strip_prefix("col:")?.strip_suffix(":schema")
}

/// Validate a collection name. Names are restricted to ASCII letters,
/// digits, `_` and `-` so they never collide with the key separators.
pub fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 255
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_keys_sort_numerically() {
        let ids = [-5i64, -1, 0, 1, 9, 10, 1_000_000, i64::MIN, i64::MAX];
        let mut keys: Vec<String> = ids.iter().map(|&id| record_key("c", id)).collect();
        keys.sort();
        let mut sorted = ids.to_vec();
        sorted.sort();
        let expected: Vec<String> = sorted.iter().map(|&id| record_key("c", id)).collect();
        assert_eq!(keys, expected);
    }

    #[test]
    fn record_keys_live_under_record_prefix() {
        assert!(record_key("wav_collection", 3).starts_with(&record_prefix("wav_collection")));
        assert!(record_prefix("a").starts_with(&collection_prefix("a")));
    }

    #[test]
    fn schema_key_roundtrip() {
        assert_eq!(parse_schema_key(&schema_key("long_term")), Some("long_term"));
        assert_eq!(parse_schema_key("col:x:index"), None);
        assert_eq!(parse_schema_key(&record_key("x", 1)), None);
    }

    #[test]
    fn names() {
        assert!(valid_name("long_term_collection"));
        assert!(valid_name("q-1"));
        assert!(!valid_name(""));
        assert!(!valid_name("a:b"));
        assert!(!valid_name("a b"));
    }
}
