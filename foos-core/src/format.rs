// ABOUTME: Builds the text block posted to the forwarding webhook
// ABOUTME: Header per message kind, thread name, jump link, and the fenced original text

use crate::classifier::{utf16_len, MessageKind};

/// Maximum UTF-16 code units of original text carried in a forward
pub const MAX_BLOCK_CHARS: usize = 1600;

/// Header label for a classified message
pub fn header(kind: MessageKind) -> &'static str {
    match kind {
        MessageKind::PitcherWriteup => "🎯 **PITCH** (ump writeup)",
        MessageKind::SwingWriteup => "⚾ **SWING**",
        MessageKind::UmpResult => "🧾 **RESULT**",
    }
}

/// Trim whitespace and cap the text at `max` UTF-16 units, marking the cut with an ellipsis.
///
/// A surrogate pair that would straddle the limit is dropped whole.
pub fn trim_block(text: &str, max: usize) -> String {
    let trimmed = text.trim();
    if utf16_len(trimmed) <= max {
        return trimmed.to_string();
    }
    let mut used = 0;
    let mut cut: String = trimmed
        .chars()
        .take_while(|c| {
            used += c.len_utf16();
            used <= max
        })
        .collect();
    cut.push('…');
    cut
}

/// Full forwarded message body
pub fn format_forward(kind: MessageKind, thread_name: &str, jump_url: &str, content: &str) -> String {
    format!(
        "{} • **{}** • [Jump]({})\n```text\n{}\n```",
        header(kind),
        thread_name,
        jump_url,
        trim_block(content, MAX_BLOCK_CHARS)
    )
}
