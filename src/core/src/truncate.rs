/// Returns at most the first `max_chars` characters of `text`, cutting on a
/// char boundary. `max_chars == 0` means no limit.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    if max_chars == 0 {
        return text;
    }
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => text.get(..idx).unwrap_or(text),
        None => text,
    }
}
