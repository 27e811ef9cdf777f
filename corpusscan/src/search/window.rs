/// Opening bracket placed before the matched text
pub const MATCH_OPEN: char = '【';
/// Closing bracket placed after the matched text
pub const MATCH_CLOSE: char = '】';

/// Cuts a context window around one match.
///
/// `match_start`/`match_end` and `line_start`/`line_end` are byte offsets into
/// `content`; `window` is a number of characters. The window extends at most
/// `window` characters on each side of the match and never past the enclosing
/// line, so context cannot bleed in from neighbouring lines:
///
/// ```text
/// left  = max(0, match_start - window, line_start)
/// right = min(len(content), match_end + window, line_end)
/// ```
///
/// Out-of-range line bounds are clamped to the content and the match.
pub fn extract(
    content: &str,
    match_start: usize,
    match_end: usize,
    window: usize,
    line_start: usize,
    line_end: usize,
) -> String {
    let line_start = line_start.min(match_start);
    let line_end = line_end.clamp(match_end, content.len());

    let before = &content[line_start..match_start];
    let left = before
        .char_indices()
        .rev()
        .take(window)
        .last()
        .map_or(match_start, |(i, _)| line_start + i);

    let after = &content[match_end..line_end];
    let right = after
        .char_indices()
        .nth(window)
        .map_or(line_end, |(i, _)| match_end + i);

    let mut snippet = String::with_capacity(right - left + 2 * MATCH_OPEN.len_utf8());
    snippet.push_str(&content[left..match_start]);
    snippet.push(MATCH_OPEN);
    snippet.push_str(&content[match_start..match_end]);
    snippet.push(MATCH_CLOSE);
    snippet.push_str(&content[match_end..right]);
    snippet
}

/// Byte bounds of the line containing `pos`, excluding the terminator
pub fn line_bounds(content: &str, pos: usize) -> (usize, usize) {
    let start = content[..pos].rfind('\n').map_or(0, |i| i + 1);
    let end = content[pos..]
        .find('\n')
        .map_or(content.len(), |i| pos + i);
    let end = if end > start && content.as_bytes()[end - 1] == b'\r' {
        end - 1
    } else {
        end
    };
    (start, end.max(pos))
}

/// Convenience for multi-line text: clamps the window to the match's own line
pub fn extract_in_line(content: &str, match_start: usize, match_end: usize, window: usize) -> String {
    let (line_start, line_end) = line_bounds(content, match_start);
    extract(content, match_start, match_end, window, line_start, line_end)
}
