//! Cleanup of raw message text before segmentation.

use std::borrow::Cow;

use crate::error::DecodeError;

/// Decodes backslash escapes left in exported message text.
///
/// Handles `\uXXXX` (UTF-16 surrogate pairs joined), `\UXXXXXXXX`, `\xHH`
/// and the usual single-character escapes. Unknown escapes are kept as they
/// are. Text without a backslash is returned borrowed.
pub fn unescape(text: &str) -> Result<Cow<'_, str>, DecodeError> {
    if !text.contains('\\') {
        return Ok(Cow::Borrowed(text));
    }

    let mut out = String::with_capacity(text.len());
    let mut chars = text.char_indices().peekable();
    while let Some((offset, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((_, kind)) = chars.next() else {
            // trailing backslash
            out.push('\\');
            break;
        };
        match kind {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            '\\' => out.push('\\'),
            '\'' => out.push('\''),
            '"' => out.push('"'),
            'x' | 'u' | 'U' => {
                let digits = match kind {
                    'x' => 2,
                    'u' => 4,
                    _ => 8,
                };
                let mut value = read_hex(&mut chars, digits, kind, offset)?;
                if (0xD800..0xDC00).contains(&value) {
                    value = join_surrogate(&mut chars, value, offset)?;
                }
                let ch = char::from_u32(value).ok_or(DecodeError::InvalidCodePoint { offset })?;
                out.push(ch);
            }
            other => {
                out.push('\\');
                out.push(other);
            }
        }
    }
    Ok(Cow::Owned(out))
}

fn read_hex<I>(
    chars: &mut std::iter::Peekable<I>,
    digits: usize,
    kind: char,
    offset: usize,
) -> Result<u32, DecodeError>
where
    I: Iterator<Item = (usize, char)>,
{
    let mut value = 0u32;
    for _ in 0..digits {
        let digit = chars
            .next_if(|(_, c)| c.is_ascii_hexdigit())
            .and_then(|(_, c)| c.to_digit(16))
            .ok_or(DecodeError::Truncated { kind, offset })?;
        value = value * 16 + digit;
    }
    Ok(value)
}

/// Combines a high surrogate with the `\uDC00`-`\uDFFF` escape that must follow it.
fn join_surrogate<I>(
    chars: &mut std::iter::Peekable<I>,
    high: u32,
    offset: usize,
) -> Result<u32, DecodeError>
where
    I: Iterator<Item = (usize, char)> + Clone,
{
    let mut lookahead = chars.clone();
    let is_low_escape = matches!(lookahead.next(), Some((_, '\\')))
        && matches!(lookahead.next(), Some((_, 'u')));
    if !is_low_escape {
        return Err(DecodeError::InvalidCodePoint { offset });
    }
    let low = read_hex(&mut lookahead, 4, 'u', offset)?;
    if !(0xDC00..0xE000).contains(&low) {
        return Err(DecodeError::InvalidCodePoint { offset });
    }
    *chars = lookahead;
    Ok(0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00))
}

/// Message body of a stored message.
///
/// Some exports store rich messages as a JSON object; its `content` field is
/// the text (empty when missing). Anything that is not a JSON object is
/// returned unchanged.
pub fn extract_message_text(content: &str) -> Cow<'_, str> {
    if !content.trim_start().starts_with('{') {
        return Cow::Borrowed(content);
    }
    match serde_json::from_str::<serde_json::Value>(content) {
        Ok(serde_json::Value::Object(map)) => Cow::Owned(
            map.get("content")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string(),
        ),
        _ => Cow::Borrowed(content),
    }
}
