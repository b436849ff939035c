/// Marker appended to a clipped excerpt.
pub const TRUNCATION_MARKER: &str = "\n\n[TRUNCATED]\n";

/// Per-document truncation.
///
/// If `content` exceeds `max_chars` characters, truncate to the first
/// `max_chars` characters and append [`TRUNCATION_MARKER`]. The cap counts
/// characters, not bytes, so multi-byte text gets the same excerpt length
/// as ASCII.
pub fn truncate_excerpt(content: &str, max_chars: usize) -> (String, bool) {
    match content.char_indices().nth(max_chars) {
        None => (content.to_string(), false),
        Some((boundary, _)) => {
            let mut result = content[..boundary].to_string();
            result.push_str(TRUNCATION_MARKER);
            (result, true)
        }
    }
}
