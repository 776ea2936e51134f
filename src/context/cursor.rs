//! What the user is typing at the cursor: partial word, trigger and qualifier

/// Text-level facts about the cursor, read from its line alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CursorText {
    /// Line text before the cursor
    pub before: String,
    /// Partial word ending at the cursor (may be empty)
    pub prefix: String,
    /// `.`, `@` or `#` right before the prefix
    pub trigger: Option<char>,
    /// Dotted parts before a `.` trigger: `db.dbo.` -> `["db", "dbo"]`
    pub qualifier: Vec<String>,
}

impl CursorText {
    /// Analyze `line` with the cursor at 1-based column `col`.
    pub fn analyze(line: &str, col: usize) -> Self {
        let chars: Vec<char> = line.chars().take(col.saturating_sub(1)).collect();
        let before: String = chars.iter().collect();

        let mut start = chars.len();
        while start > 0 && is_word_char(chars[start - 1]) {
            start -= 1;
        }
        let prefix: String = chars[start..].iter().collect();
        // `[Us` while the bracket is still open
        if start > 0 && chars[start - 1] == '[' {
            start -= 1;
        }

        let mut trigger = match start.checked_sub(1).map(|i| chars[i]) {
            Some(c @ ('.' | '@' | '#')) => Some(c),
            _ => None,
        };
        let mut qualifier = Vec::new();
        if trigger == Some('.') {
            qualifier = read_qualifier(&chars[..start - 1]);
            let numeric = qualifier
                .first()
                .and_then(|q| q.chars().next())
                .is_some_and(|c| c.is_ascii_digit());
            if qualifier.is_empty() || numeric {
                trigger = None;
                qualifier.clear();
            }
        }

        Self {
            before,
            prefix,
            trigger,
            qualifier,
        }
    }

    /// Line text before the partial word.
    pub fn before_prefix(&self) -> &str {
        let cut = self.before.len() - self.prefix.len();
        let head = &self.before[..cut];
        head.strip_suffix('[').unwrap_or(head)
    }

    /// Last qualifier part (`a` in `a.`).
    pub fn last_qualifier(&self) -> Option<&str> {
        self.qualifier.last().map(String::as_str)
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Read `a.b.c` backwards from the end of `chars`.
fn read_qualifier(chars: &[char]) -> Vec<String> {
    let mut parts = Vec::new();
    let mut end = chars.len();
    loop {
        let (part, start) = read_part(chars, end);
        if part.is_empty() {
            break;
        }
        parts.push(part);
        if start > 0 && chars[start - 1] == '.' {
            end = start - 1;
        } else {
            break;
        }
    }
    parts.reverse();
    parts
}

/// One name part ending at `end`, with the index where it starts.
fn read_part(chars: &[char], end: usize) -> (String, usize) {
    let closing = match end.checked_sub(1).map(|i| chars[i]) {
        Some(']') => Some('['),
        Some('"') => Some('"'),
        _ => None,
    };
    if let Some(open) = closing {
        return match chars[..end - 1].iter().rposition(|&c| c == open) {
            Some(start) => (chars[start + 1..end - 1].iter().collect(), start),
            None => (String::new(), end),
        };
    }

    let mut start = end;
    while start > 0 && is_word_char(chars[start - 1]) {
        start -= 1;
    }
    if start == end {
        return (String::new(), end);
    }
    while start > 0 && matches!(chars[start - 1], '#' | '@') {
        start -= 1;
    }
    (chars[start..end].iter().collect(), start)
}
