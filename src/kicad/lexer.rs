//! Line and token scanning for legacy KiCad text formats.
//!
//! Both `.sch` pages and `.lib` caches are line oriented with
//! whitespace-separated fields. Every line and token keeps its byte offset
//! into the original text so edits can be made without re-serialising.

/// One line of a text file, without its terminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawLine<'a> {
    /// 1-based line number.
    pub number: usize,
    /// Byte offset of the first character of the line.
    pub offset: usize,
    /// Line content with `\n` and any trailing `\r` removed.
    pub text: &'a str,
}

impl<'a> RawLine<'a> {
    /// Whitespace-separated tokens of the line.
    #[must_use]
    pub fn tokens(&self) -> Vec<Token<'a>> {
        tokens(self.text)
    }

    /// Returns true if the first token of the line is exactly `tag`.
    #[must_use]
    pub fn is_tagged(&self, tag: &str) -> bool {
        self.text.split_ascii_whitespace().next() == Some(tag)
    }
}

/// A whitespace-delimited token within a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Token<'a> {
    /// Byte offset of the token within its line.
    pub offset: usize,
    /// Token text.
    pub text: &'a str,
}

/// Iterates the lines of `text` with their byte offsets.
///
/// CRLF terminators are tolerated; the offsets always index the raw text.
pub fn lines(text: &str) -> impl Iterator<Item = RawLine<'_>> {
    let mut offset = 0;
    text.split_inclusive('\n')
        .enumerate()
        .map(move |(index, chunk)| {
            let start = offset;
            offset += chunk.len();
            let body = chunk.strip_suffix('\n').unwrap_or(chunk);
            let body = body.strip_suffix('\r').unwrap_or(body);
            RawLine {
                number: index + 1,
                offset: start,
                text: body,
            }
        })
}

/// Splits a line into whitespace-separated tokens, keeping offsets.
#[must_use]
pub fn tokens(line: &str) -> Vec<Token<'_>> {
    let mut out = Vec::new();
    let mut start: Option<usize> = None;

    for (i, c) in line.char_indices() {
        if c.is_ascii_whitespace() {
            if let Some(s) = start.take() {
                out.push(Token {
                    offset: s,
                    text: &line[s..i],
                });
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        out.push(Token {
            offset: s,
            text: &line[s..],
        });
    }

    out
}

/// Reads the value that follows the leading tag of a field line.
///
/// Handles the quoted form `F1 "my sheet.sch" 60` (with `\"` and `\\`
/// escapes) as well as a bare token. Returns `None` when nothing follows the tag.
#[must_use]
pub fn field_value(line: &str) -> Option<String> {
    let rest = line.trim_start();
    let tag_end = rest.find(|c: char| c.is_ascii_whitespace())?;
    let rest = rest[tag_end..].trim_start();

    if let Some(quoted) = rest.strip_prefix('"') {
        let mut value = String::new();
        let mut chars = quoted.chars().peekable();
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.peek() {
                    Some(&(next @ ('"' | '\\'))) => {
                        value.push(next);
                        chars.next();
                    }
                    // Windows separators stay as written.
                    _ => value.push(c),
                },
                '"' => return Some(value),
                _ => value.push(c),
            }
        }
        // Unterminated quote: take what we have.
        Some(value)
    } else {
        rest.split_ascii_whitespace().next().map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_track_offsets() {
        let text = "$Comp\nL 74HC00 U1\r\nU 1 1 5A1B\n";
        let all: Vec<_> = lines(text).collect();
        assert_eq!(all.len(), 3);
        assert_eq!(all[1].number, 2);
        assert_eq!(all[1].offset, 6);
        assert_eq!(all[1].text, "L 74HC00 U1");
        assert_eq!(all[2].offset, 19);
        assert_eq!(&text[all[2].offset..all[2].offset + 1], "U");
    }

    #[test]
    fn last_line_without_newline() {
        let all: Vec<_> = lines("a\nb").collect();
        assert_eq!(all[1].text, "b");
        assert_eq!(all[1].offset, 2);
    }

    #[test]
    fn tokens_keep_positions() {
        let toks = tokens("U  12 1   5A1B");
        let texts: Vec<_> = toks.iter().map(|t| t.text).collect();
        assert_eq!(texts, ["U", "12", "1", "5A1B"]);
        assert_eq!(toks[1].offset, 3);
        assert_eq!(toks[3].offset, 10);
    }

    #[test]
    fn tagged_line_requires_whole_token() {
        let line = lines("X1 not a pin").next().unwrap();
        assert!(!line.is_tagged("X"));
        assert!(line.is_tagged("X1"));
    }

    #[test]
    fn quoted_field_value() {
        assert_eq!(field_value(r#"F1 "my sheet.sch" 60"#).as_deref(), Some("my sheet.sch"));
        assert_eq!(field_value(r#"F1 "a\"b.sch" 60"#).as_deref(), Some("a\"b.sch"));
        assert_eq!(field_value(r#"F1 "blocks\io.sch" 60"#).as_deref(), Some(r"blocks\io.sch"));
        assert_eq!(field_value("F1 sub.sch 60").as_deref(), Some("sub.sch"));
        assert_eq!(field_value("F1"), None);
    }
}
