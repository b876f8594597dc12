// src/quick_responses.rs
//
// "/shortcut" completion for canned support replies.

use std::ops::Range;

use crate::models::QuickResponse;

pub const MAX_SHORTCUT_LEN: usize = 32;

fn is_shortcut_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-'
}

pub fn is_valid_shortcut(shortcut: &str) -> bool {
    !shortcut.is_empty() && shortcut.len() <= MAX_SHORTCUT_LEN && shortcut.chars().all(is_shortcut_char)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger<'a> {
    /// Text typed after the slash, up to the cursor.
    pub query: &'a str,
    /// Byte range of `/query` inside the text.
    pub range: Range<usize>,
}

/// Finds the `/query` token that ends at `cursor` (a byte offset).
/// The slash must open the text or follow whitespace.
pub fn active_trigger(text: &str, cursor: usize) -> Option<Trigger<'_>> {
    if cursor > text.len() || !text.is_char_boundary(cursor) {
        return None;
    }
    let before = &text[..cursor];

    let (slash_at, slash) = before
        .char_indices()
        .rev()
        .find(|(_, c)| !is_shortcut_char(c.to_ascii_lowercase()))?;
    if slash != '/' {
        return None;
    }

    let opens_word = before[..slash_at]
        .chars()
        .next_back()
        .map_or(true, char::is_whitespace);
    if !opens_word {
        return None;
    }

    let query = &before[slash_at + 1..];
    if query.len() > MAX_SHORTCUT_LEN {
        return None;
    }

    Some(Trigger {
        query,
        range: slash_at..cursor,
    })
}

/// Exact shortcut, then shortcut prefix, then shortcut or title substring.
pub fn suggest<'r>(responses: &'r [QuickResponse], query: &str, limit: usize) -> Vec<&'r QuickResponse> {
    let query = query.to_lowercase();

    let mut ranked: Vec<(u8, &QuickResponse)> = responses
        .iter()
        .filter_map(|r| {
            let shortcut = r.shortcut.to_lowercase();
            let rank = if query.is_empty() || shortcut == query {
                0
            } else if shortcut.starts_with(&query) {
                1
            } else if shortcut.contains(&query) {
                2
            } else if r.title.to_lowercase().contains(&query) {
                3
            } else {
                return None;
            };
            Some((rank, r))
        })
        .collect();

    ranked.sort_by(|(ra, a), (rb, b)| ra.cmp(rb).then_with(|| a.shortcut.cmp(&b.shortcut)));
    ranked.into_iter().take(limit).map(|(_, r)| r).collect()
}

/// Replaces the trigger range with the response content.
pub fn expand(text: &str, range: Range<usize>, content: &str) -> String {
    let mut out = String::with_capacity(text.len() + content.len());
    out.push_str(&text[..range.start]);
    out.push_str(content);
    out.push_str(&text[range.end..]);
    out
}
