//! Lexical pretty-printing of Rainlang text
//!
//! Re-indents by paren depth without parsing. Text before the first `:` of
//! each `;` terminated piece is copied unchanged.

/// Re-indent `text`, `indent` spaces per nesting level.
pub fn pretty(text: &str, indent: usize) -> String {
    let mut output = String::with_capacity(text.len() * 2);

    for piece in text.split_inclusive(';') {
        let Some(colon) = piece.find(':') else {
            output.push_str(piece);
            continue;
        };
        let (head, body) = piece.split_at(colon + 1);
        output.push_str(head);
        indent_body(&mut output, body, indent);
    }

    output
}

fn indent_body(output: &mut String, body: &str, indent: usize) {
    let mut depth = 0usize;
    let mut in_args = false;
    let mut chars = body.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '<' => {
                in_args = true;
                output.push(c);
            }
            '>' => {
                in_args = false;
                output.push(c);
            }
            '(' if chars.peek() == Some(&')') => {
                chars.next();
                output.push_str("()");
            }
            '(' => {
                depth += 1;
                output.push('(');
                newline(output, depth * indent);
            }
            ')' => {
                depth = depth.saturating_sub(1);
                newline(output, depth * indent);
                output.push(')');
            }
            ' ' if depth > 0 && !in_args => newline(output, depth * indent),
            _ => output.push(c),
        }
    }
}

fn newline(output: &mut String, width: usize) {
    output.push('\n');
    output.extend(std::iter::repeat(' ').take(width));
}
