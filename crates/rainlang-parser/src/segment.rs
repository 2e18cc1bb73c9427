//! Segmentation of raw text into sources, statements and LHS names
//!
//! All functions work on the document as a slice of `char`s so that every
//! offset is a character offset.

use crate::ast::{Comment, LhsName};
use crate::problem::{ErrorCode, Position, Problem};

/// A half-open `[start, end)` character range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment {
    /// First character
    pub start: usize,
    /// One past the last character
    pub end: usize,
}

impl Segment {
    /// Create a segment
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether the segment is empty
    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    /// Inclusive position of the segment (a single offset when empty)
    pub fn position(&self) -> Position {
        Position::new(self.start, self.end.saturating_sub(1).max(self.start))
    }

    /// Segment without leading and trailing whitespace
    pub fn trim(self, chars: &[char]) -> Segment {
        let mut start = self.start;
        let mut end = self.end;
        while start < end && chars[start].is_whitespace() {
            start += 1;
        }
        while end > start && chars[end - 1].is_whitespace() {
            end -= 1;
        }
        Segment { start, end }
    }
}

/// Blank out every `/* ... */` comment, keeping all offsets intact.
pub fn strip_comments(chars: &mut [char]) -> (Vec<Comment>, Vec<Problem>) {
    let mut comments = Vec::new();
    let mut problems = Vec::new();
    let len = chars.len();
    let mut i = 0;

    while i < len {
        if chars[i] == '*' && i + 1 < len && chars[i + 1] == '/' {
            problems.push(Problem::new(
                ErrorCode::UnexpectedToken,
                "unexpected end of comment '*/'",
                Position::new(i, i + 1),
            ));
            i += 2;
            continue;
        }
        if !(chars[i] == '/' && i + 1 < len && chars[i + 1] == '*') {
            i += 1;
            continue;
        }

        let close = (i + 2..len.saturating_sub(1)).find(|&j| chars[j] == '*' && chars[j + 1] == '/');
        let end = match close {
            Some(j) => j + 2,
            None => {
                problems.push(Problem::new(
                    ErrorCode::UnexpectedEndOfComment,
                    "unterminated comment",
                    Position::new(i, len - 1),
                ));
                len
            }
        };
        comments.push(Comment {
            text: chars[i..end].iter().collect(),
            position: Position::new(i, end - 1),
        });
        chars[i..end].iter_mut().for_each(|c| *c = ' ');
        i = end;
    }

    (comments, problems)
}

/// Split on `;`. A trailing remainder with content becomes one more source.
pub fn split_sources(chars: &[char]) -> Vec<Segment> {
    let mut sources = Vec::new();
    let mut start = 0;
    for (i, c) in chars.iter().enumerate() {
        if *c == ';' {
            sources.push(Segment::new(start, i));
            start = i + 1;
        }
    }
    let rest = Segment::new(start, chars.len());
    if !rest.trim(chars).is_empty() {
        sources.push(rest);
    }
    sources
}

/// Split a source on `,` outside of parentheses.
pub fn split_statements(chars: &[char], source: Segment) -> Vec<Segment> {
    let mut statements = Vec::new();
    let mut depth = 0usize;
    let mut start = source.start;
    for i in source.start..source.end {
        match chars[i] {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                statements.push(Segment::new(start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    statements.push(Segment::new(start, source.end));
    statements
}

/// Split a trimmed statement into its LHS and RHS around its single `:`.
pub fn split_statement(chars: &[char], statement: Segment) -> Result<(Segment, Segment), Problem> {
    let mut depth = 0usize;
    let mut colons = Vec::new();
    for i in statement.start..statement.end {
        match chars[i] {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ':' if depth == 0 => colons.push(i),
            _ => {}
        }
    }
    match colons.as_slice() {
        [colon] => Ok((
            Segment::new(statement.start, *colon),
            Segment::new(colon + 1, statement.end),
        )),
        [] => Err(Problem::new(
            ErrorCode::InvalidStatement,
            "invalid statement, expected a ':'",
            statement.position(),
        )),
        _ => Err(Problem::new(
            ErrorCode::InvalidStatement,
            "invalid statement, found more than one ':'",
            statement.position(),
        )),
    }
}

/// Read the whitespace separated names of an LHS.
///
/// Invalid names are still returned so they keep their slot.
pub fn parse_lhs(chars: &[char], lhs: Segment) -> (Vec<LhsName>, Vec<Problem>) {
    let mut names = Vec::new();
    let mut problems = Vec::new();
    let mut i = lhs.start;

    while i < lhs.end {
        if chars[i].is_whitespace() {
            i += 1;
            continue;
        }
        let start = i;
        while i < lhs.end && !chars[i].is_whitespace() {
            i += 1;
        }
        let name: String = chars[start..i].iter().collect();
        let position = Position::new(start, i - 1);
        if name != "_" && !rainlang_bytecode::is_word(&name) {
            problems.push(Problem::invalid_word(&name, position));
        }
        names.push(LhsName { name, position });
    }

    (names, problems)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(text: &str) -> Vec<char> {
        text.chars().collect()
    }

    fn texts(chars: &[char], segments: &[Segment]) -> Vec<String> {
        segments
            .iter()
            .map(|s| chars[s.start..s.end].iter().collect())
            .collect()
    }

    #[test]
    fn test_strip_comments_keeps_offsets() {
        let mut text = chars("_: /* one */ 1;");
        let (comments, problems) = strip_comments(&mut text);
        assert!(problems.is_empty());
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text, "/* one */");
        assert_eq!(comments[0].position, Position::new(3, 11));
        assert_eq!(text.iter().collect::<String>(), "_:           1;");
    }

    #[test]
    fn test_unterminated_comment() {
        let mut text = chars("_: 1; /* open");
        let (comments, problems) = strip_comments(&mut text);
        assert_eq!(comments.len(), 1);
        assert_eq!(problems[0].code, ErrorCode::UnexpectedEndOfComment);
        assert_eq!(problems[0].position, Position::new(6, 12));
        assert!(text[6..].iter().all(|c| *c == ' '));
    }

    #[test]
    fn test_split_sources_keeps_trailing_remainder() {
        let text = chars("_: 1; _: 2;\n_: 3");
        let sources = split_sources(&text);
        assert_eq!(texts(&text, &sources), vec!["_: 1", " _: 2", "\n_: 3"]);

        let text = chars("_: 1;  \n");
        assert_eq!(split_sources(&text).len(), 1);

        let text = chars("_: 1;;_: 2;");
        assert_eq!(split_sources(&text).len(), 3);
    }

    #[test]
    fn test_split_statements_ignores_nested_commas() {
        let text = chars("a: 1, b: add(1, 2), c: 3");
        let statements = split_statements(&text, Segment::new(0, text.len()));
        assert_eq!(
            texts(&text, &statements),
            vec!["a: 1", " b: add(1, 2)", " c: 3"]
        );
    }

    #[test]
    fn test_split_statement_requires_one_colon() {
        let text = chars("a b: add(1 2)");
        let (lhs, rhs) = split_statement(&text, Segment::new(0, text.len())).unwrap();
        assert_eq!(texts(&text, &[lhs, rhs]), vec!["a b", " add(1 2)"]);

        let text = chars("add(1 2)");
        let err = split_statement(&text, Segment::new(0, text.len())).unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidStatement);

        let text = chars("a: b: 1");
        assert!(split_statement(&text, Segment::new(0, text.len())).is_err());
    }

    #[test]
    fn test_parse_lhs() {
        let text = chars(" a _ my-name Bad ");
        let (names, problems) = parse_lhs(&text, Segment::new(0, text.len()));
        let names: Vec<&str> = names.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "_", "my-name", "Bad"]);
        assert_eq!(problems.len(), 1);
        assert_eq!(problems[0].code, ErrorCode::InvalidWordPattern);
        assert_eq!(problems[0].position, Position::new(13, 15));
    }
}
