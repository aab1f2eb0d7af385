//! Thinking/response splitting for streamed model output
//!
//! Models emit private reasoning wrapped in `<think>` tags, interleaved with
//! the user-visible response. The splitter always operates on the entire
//! accumulated buffer for the turn, never a delta: tag boundaries can span
//! chunk boundaries, and re-running over a longer buffer must never move
//! either output backward.

/// Opening tag of a thinking segment
const THINK_OPEN: &str = "<think>";
/// Closing tag of a thinking segment
const THINK_CLOSE: &str = "</think>";

/// Result of splitting accumulated output into thinking and response
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThinkingSplit {
    /// Inner text of all thinking segments, blank-line separated
    pub thinking: String,
    /// User-visible response text, trimmed
    pub response: String,
    /// Whether an unterminated thinking segment is still streaming
    pub thinking_open: bool,
}

/// Split raw accumulated model output into thinking and response parts.
///
/// Well-formed `<think>...</think>` segments are removed from the response
/// and their inner text concatenated into `thinking`. A trailing unterminated
/// `<think>` marks the rest of the buffer as still-streaming thinking.
/// Pure and idempotent for a given buffer.
pub fn split_thinking(raw: &str) -> ThinkingSplit {
    if raw.is_empty() {
        return ThinkingSplit::default();
    }

    let mut thinking_parts: Vec<&str> = Vec::new();
    let mut response = String::new();
    let mut thinking_open = false;
    let mut rest = raw;

    while let Some(start) = rest.find(THINK_OPEN) {
        response.push_str(&rest[..start]);
        let inner = &rest[start + THINK_OPEN.len()..];
        match inner.find(THINK_CLOSE) {
            Some(end) => {
                let segment = inner[..end].trim();
                if !segment.is_empty() {
                    thinking_parts.push(segment);
                }
                rest = &inner[end + THINK_CLOSE.len()..];
            }
            None => {
                // Unterminated tag: the rest is still-streaming thinking. A
                // trailing fragment of the close tag is withheld until the
                // next chunk resolves it, so re-splitting a longer buffer
                // never shrinks the output.
                let segment = withhold_partial_tag(inner, THINK_CLOSE).trim();
                if !segment.is_empty() {
                    thinking_parts.push(segment);
                }
                thinking_open = true;
                rest = "";
            }
        }
    }
    response.push_str(withhold_partial_tag(rest, THINK_OPEN));

    ThinkingSplit {
        thinking: thinking_parts.join("\n\n"),
        response: response.trim().to_string(),
        thinking_open,
    }
}

/// Strip the longest suffix of `s` that is an incomplete prefix of `tag`.
///
/// A tag split across a chunk boundary must not leak into the output of the
/// shorter buffer.
fn withhold_partial_tag<'a>(s: &'a str, tag: &str) -> &'a str {
    let max = tag.len().saturating_sub(1).min(s.len());
    for len in (1..=max).rev() {
        if s.ends_with(&tag[..len]) {
            return &s[..s.len() - len];
        }
    }
    s
}
