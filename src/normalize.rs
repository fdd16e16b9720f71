const ALLOWED_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '(', ')', '-'];

/// Unicode whitespace plus the ASCII file, group, record and unit
/// separators (U+001C..=U+001F).
fn is_break(c: char) -> bool {
    c.is_whitespace() || ('\u{1c}'..='\u{1f}').contains(&c)
}

fn is_allowed(c: char) -> bool {
    c.is_ascii_alphanumeric() || ALLOWED_PUNCTUATION.contains(&c)
}

/// Cleans raw OCR output so it can be embedded in a report.
///
/// Whitespace runs (newlines included) become a single space, leading and
/// trailing whitespace is dropped, and anything that is not an ASCII letter,
/// digit, space or one of `. , ! ? ; : ( ) -` is removed. Removed characters
/// never leave doubled or dangling spaces behind, so the function is
/// idempotent.
pub fn normalize(raw: &str) -> String {
    let mut cleaned = String::with_capacity(raw.len());
    let mut pending_space = false;

    for c in raw.chars() {
        if is_break(c) {
            pending_space = true;
        } else if is_allowed(c) {
            if pending_space && !cleaned.is_empty() {
                cleaned.push(' ');
            }
            pending_space = false;
            cleaned.push(c);
        }
    }

    cleaned
}
