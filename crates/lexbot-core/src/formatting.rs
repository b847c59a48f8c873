/// Split `text` into chunks of at most `limit` characters.
///
/// Prefers breaking after a newline in the second half of a window so paragraphs stay
/// intact; falls back to a hard cut. Counts chars, not bytes.
pub fn split_message(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let chars: Vec<char> = text.chars().collect();
    if chars.len() <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut start = 0usize;
    while start < chars.len() {
        let end = (start + limit).min(chars.len());
        if end == chars.len() {
            chunks.push(chars[start..end].iter().collect());
            break;
        }

        let window = &chars[start..end];
        let cut = window
            .iter()
            .rposition(|c| *c == '\n')
            .filter(|pos| *pos >= limit / 2)
            .map(|pos| start + pos + 1)
            .unwrap_or(end);

        chunks.push(chars[start..cut].iter().collect());
        start = cut;
    }
    chunks
}
