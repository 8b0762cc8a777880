/// Keeps at most `max_chars` characters. Counts chars, never splits a code point.
pub fn truncate_chars(value: &str, max_chars: usize) -> (&str, bool) {
    match value.char_indices().nth(max_chars) {
        Some((end, _)) => (&value[..end], true),
        None => (value, false),
    }
}

/// Appends `note` when `value` had to be cut to `max_chars`.
pub fn cap_with_note(value: String, max_chars: usize, note: &str) -> String {
    match truncate_chars(&value, max_chars) {
        (head, true) => format!("{}{}", head, note),
        (_, false) => value,
    }
}
