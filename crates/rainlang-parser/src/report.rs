//! Diagnostic rendering for parse problems
//!
//! Problems carry character offsets; codespan works on byte offsets, so
//! positions are converted against the original text before rendering.

use crate::problem::{ErrorCategory, Position, Problem};
use codespan_reporting::diagnostic::{Diagnostic, Label};
use codespan_reporting::files::SimpleFiles;
use codespan_reporting::term;
use termcolor::Buffer;

/// Byte range of a character position in `text`, clamped to the text
pub fn byte_range(text: &str, position: Position) -> std::ops::Range<usize> {
    let offset = |index: usize| {
        text.char_indices()
            .nth(index)
            .map_or(text.len(), |(byte, _)| byte)
    };
    let chars = position.range();
    let start = offset(chars.start);
    let end = offset(chars.end).max(start);
    start..end
}

fn label(category: ErrorCategory) -> &'static str {
    match category {
        ErrorCategory::Runtime => "cannot process this",
        ErrorCategory::Undefined => "not defined",
        ErrorCategory::InvalidSyntax => "invalid",
        ErrorCategory::UnexpectedToken => "unexpected",
        ErrorCategory::ExpectedToken => "expected here",
        ErrorCategory::Mismatch => "count mismatch",
        ErrorCategory::OutOfRange => "out of range",
        ErrorCategory::Duplicate => "duplicate",
    }
}

/// Codespan diagnostic for one problem
pub fn to_diagnostic(problem: &Problem, file_id: usize, text: &str) -> Diagnostic<usize> {
    Diagnostic::error()
        .with_message(&problem.message)
        .with_code(format!("{}", problem.code as u16))
        .with_labels(vec![Label::primary(
            file_id,
            byte_range(text, problem.position),
        )
        .with_message(label(problem.code.category()))])
}

/// Render problems as plain text annotated with source snippets.
///
/// Falls back to one line per problem if the snippets cannot be rendered.
pub fn render_problems(name: &str, text: &str, problems: &[Problem]) -> String {
    let mut files = SimpleFiles::new();
    let file_id = files.add(name.to_string(), text.to_string());
    let config = term::Config::default();
    let mut buffer = Buffer::no_color();

    for problem in problems {
        let diagnostic = to_diagnostic(problem, file_id, text);
        if let Err(err) = term::emit(&mut buffer, &config, &files, &diagnostic) {
            tracing::warn!(error = %err, "falling back to plain problem list");
            return problems
                .iter()
                .map(|problem| format!("{}\n", problem))
                .collect();
        }
    }

    String::from_utf8_lossy(buffer.as_slice()).into_owned()
}
