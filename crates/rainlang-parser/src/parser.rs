//! Recursive parser for Rainlang documents
//!
//! The parser walks each statement's RHS one character at a time, keeping a
//! stack of open opcode calls. A call is resolved against its opcode
//! metadata when its closing paren is reached.

use crate::ast::{
    AliasNode, Document, LhsName, Node, OpcodeNode, OperandArg, Source, Statement, ValueNode,
};
use crate::binder;
use crate::problem::{ErrorCode, Position, Problem};
use crate::segment::{self, Segment};
use num_traits::ToPrimitive;
use rainlang_bytecode::{
    is_numeric_word, is_sentinel, is_word, parse_literal, LiteralError, OpMeta, OpMetaTable,
};
use rustc_hash::FxHashMap;

/// Parse a document against an opcode table
pub fn parse(text: &str, table: &OpMetaTable) -> Document {
    ParserSession::new(text, table).parse()
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')
}

/// An opcode call whose closing paren has not been seen yet
struct Frame {
    node: OpcodeNode,
    open: usize,
    operand_error: bool,
}

/// Nodes of one RHS
struct Rhs {
    nodes: Vec<Node>,
    /// A word or group was skipped, so output counting would be misleading
    dropped: bool,
}

fn push_node(frames: &mut [Frame], nodes: &mut Vec<Node>, node: Node) {
    match frames.last_mut() {
        Some(parent) => parent.node.parameters.push(node),
        None => nodes.push(node),
    }
}

/// All mutable state of one parse.
///
/// A session is consumed by [`ParserSession::parse`]; parse again with a new
/// session.
pub struct ParserSession<'a> {
    table: &'a OpMetaTable,
    text: String,
    chars: Vec<char>,
    problems: Vec<Problem>,
    /// Names bound so far in the current source, with their stack slot
    scope: FxHashMap<String, usize>,
    /// LHS names seen so far in the current source
    slots: usize,
}

impl<'a> ParserSession<'a> {
    /// Create a session for `text`
    pub fn new(text: &str, table: &'a OpMetaTable) -> Self {
        Self {
            table,
            text: text.to_string(),
            chars: text.chars().collect(),
            problems: Vec::new(),
            scope: FxHashMap::default(),
            slots: 0,
        }
    }

    /// Parse the whole document
    pub fn parse(mut self) -> Document {
        let (comments, problems) = segment::strip_comments(&mut self.chars);
        self.problems.extend(problems);

        let sources: Vec<Source> = segment::split_sources(&self.chars)
            .into_iter()
            .map(|segment| self.parse_source(segment))
            .collect();

        tracing::debug!(
            sources = sources.len(),
            comments = comments.len(),
            problems = self.problems.len(),
            "parsed rainlang document"
        );

        Document {
            text: self.text,
            sources,
            comments,
            problems: self.problems,
        }
    }

    fn parse_source(&mut self, segment: Segment) -> Source {
        self.scope.clear();
        self.slots = 0;

        let statements = segment::split_statements(&self.chars, segment)
            .into_iter()
            .filter_map(|statement| self.parse_statement(statement))
            .collect();

        Source {
            position: segment.trim(&self.chars).position(),
            statements,
        }
    }

    fn parse_statement(&mut self, segment: Segment) -> Option<Statement> {
        let segment = segment.trim(&self.chars);
        if segment.is_empty() {
            return None;
        }

        let (lhs_segment, rhs_segment) = match segment::split_statement(&self.chars, segment) {
            Ok(parts) => parts,
            Err(problem) => {
                self.problems.push(problem);
                return None;
            }
        };

        let (lhs, problems) = segment::parse_lhs(&self.chars, lhs_segment);
        self.problems.extend(problems);

        let mut rhs = self.parse_rhs(rhs_segment, &lhs);
        if !rhs.dropped {
            binder::bind(&lhs, &mut rhs.nodes, &mut self.problems);
        }
        self.declare(&lhs);

        Some(Statement {
            position: segment.position(),
            lhs,
            rhs: rhs.nodes,
        })
    }

    /// Bring a statement's names into scope
    fn declare(&mut self, lhs: &[LhsName]) {
        for (i, name) in lhs.iter().enumerate() {
            if !name.is_bindable() {
                continue;
            }
            if self.scope.contains_key(&name.name) {
                self.problems.push(Problem::new(
                    ErrorCode::DuplicateAlias,
                    format!("duplicate alias: {}", name.name),
                    name.position,
                ));
            } else {
                self.scope.insert(name.name.clone(), self.slots + i);
            }
        }
        self.slots += lhs.len();
    }

    // ===== RHS =====

    fn parse_rhs(&mut self, segment: Segment, pending: &[LhsName]) -> Rhs {
        let mut frames: Vec<Frame> = Vec::new();
        let mut rhs = Rhs {
            nodes: Vec::new(),
            dropped: false,
        };
        let limit = segment.end;
        let mut i = segment.start;

        while i < limit {
            match self.chars[i] {
                c if c.is_whitespace() => i += 1,
                '(' => {
                    self.problems.push(Problem::new(
                        ErrorCode::ExpectedOpcode,
                        "expected an opcode before '('",
                        Position::at(i),
                    ));
                    rhs.dropped = true;
                    i = self.skip_group(i, limit);
                }
                ')' => {
                    match frames.pop() {
                        Some(frame) => {
                            let nested = !frames.is_empty();
                            let node = self.close_frame(frame, i, nested);
                            push_node(&mut frames, &mut rhs.nodes, Node::Opcode(node));
                        }
                        None => self.problems.push(Problem::new(
                            ErrorCode::UnexpectedClosingParen,
                            "unexpected ')'",
                            Position::at(i),
                        )),
                    }
                    i += 1;
                }
                '<' => {
                    let end = (i..limit).find(|&k| self.chars[k] == '>').unwrap_or(limit - 1);
                    self.problems.push(Problem::new(
                        ErrorCode::UnexpectedOperandArgs,
                        "operand arguments must directly follow an opcode",
                        Position::new(i, end),
                    ));
                    i = end + 1;
                }
                '>' => {
                    self.problems.push(Problem::new(
                        ErrorCode::UnexpectedClosingAngleParen,
                        "unexpected '>'",
                        Position::at(i),
                    ));
                    i += 1;
                }
                ',' => {
                    self.problems.push(Problem::new(
                        ErrorCode::UnexpectedComma,
                        "unexpected ',', parameters are separated by whitespace",
                        Position::at(i),
                    ));
                    i += 1;
                }
                c if is_word_char(c) => {
                    i = self.parse_word(i, limit, pending, &mut frames, &mut rhs);
                }
                c => {
                    self.problems.push(Problem::new(
                        ErrorCode::IllegalChar,
                        format!("illegal character: {}", c),
                        Position::at(i),
                    ));
                    i += 1;
                }
            }
        }

        while let Some(frame) = frames.pop() {
            self.problems.push(Problem::new(
                ErrorCode::ExpectedClosingParen,
                "expected ')'",
                Position::at(frame.open),
            ));
            let mut node = frame.node;
            node.position = Position::new(node.position.start, limit.saturating_sub(1));
            push_node(&mut frames, &mut rhs.nodes, Node::Opcode(node));
        }

        rhs
    }

    /// Index just past the paren matching the one at `open`
    fn skip_group(&self, open: usize, limit: usize) -> usize {
        let mut depth = 0usize;
        for k in open..limit {
            match self.chars[k] {
                '(' => depth += 1,
                ')' => {
                    depth -= 1;
                    if depth == 0 {
                        return k + 1;
                    }
                }
                _ => {}
            }
        }
        limit
    }

    fn parse_word(
        &mut self,
        start: usize,
        limit: usize,
        pending: &[LhsName],
        frames: &mut Vec<Frame>,
        rhs: &mut Rhs,
    ) -> usize {
        let mut end = start;
        while end < limit && is_word_char(self.chars[end]) {
            end += 1;
        }
        let word: String = self.chars[start..end].iter().collect();
        let position = Position::new(start, end - 1);
        let call = end < limit && matches!(self.chars[end], '(' | '<');

        if !call {
            if self.scope.contains_key(&word) {
                push_node(frames, &mut rhs.nodes, alias(word, position));
                return end;
            }
            if pending.iter().any(|name| name.is_bindable() && name.name == word) {
                self.problems.push(Problem::new(
                    ErrorCode::InvalidSelfReference,
                    format!("invalid self reference: {}", word),
                    position,
                ));
                push_node(frames, &mut rhs.nodes, alias(word, position));
                return end;
            }
            if is_numeric_word(&word) || is_sentinel(&word) {
                let value = self.read_value(&word, position);
                push_node(
                    frames,
                    &mut rhs.nodes,
                    Node::Value(ValueNode {
                        raw: word,
                        value,
                        position,
                        tag: None,
                    }),
                );
                return end;
            }
        }

        let table = self.table;
        match table.lookup(&word) {
            Some((opcode, meta)) => {
                self.open_opcode(word, Some((opcode, meta)), position, limit, frames, rhs)
            }
            None if call => {
                self.problems.push(Problem::new(
                    ErrorCode::UndefinedOpcode,
                    format!("undefined opcode: {}", word),
                    position,
                ));
                self.open_opcode(word, None, position, limit, frames, rhs)
            }
            None => {
                rhs.dropped = true;
                let problem = if is_word(&word) {
                    Problem::undefined_word(&word, position)
                } else {
                    Problem::invalid_word(&word, position)
                };
                self.problems.push(problem);
                end
            }
        }
    }

    fn read_value(&mut self, word: &str, position: Position) -> Option<num_bigint::BigUint> {
        match parse_literal(word) {
            Ok(value) => Some(value),
            Err(LiteralError::OutOfRange(_)) => {
                self.problems.push(Problem::new(
                    ErrorCode::OutOfRangeValue,
                    format!("out-of-range value: {} exceeds max-uint256", word),
                    position,
                ));
                None
            }
            Err(err) => {
                self.problems.push(Problem::new(
                    ErrorCode::InvalidWordPattern,
                    err.to_string(),
                    position,
                ));
                None
            }
        }
    }

    /// Handle an opcode word: optional `<...>` then `(`.
    ///
    /// `resolved` is `None` for unknown opcodes, whose parameters are still
    /// parsed but which never resolve.
    fn open_opcode(
        &mut self,
        name: String,
        resolved: Option<(u16, &OpMeta)>,
        position: Position,
        limit: usize,
        frames: &mut Vec<Frame>,
        rhs: &mut Rhs,
    ) -> usize {
        let mut j = position.end + 1;
        let mut operand_args = Vec::new();
        let mut operand_error = resolved.is_none();
        let has_args = j < limit && self.chars[j] == '<';

        if has_args {
            let (args, next, ok) = self.parse_operand_args(j, limit);
            if let Some((_, meta)) = resolved {
                if ok && args.len() != meta.user_arg_count() {
                    self.problems.push(Problem::new(
                        ErrorCode::MismatchOperandArgs,
                        format!(
                            "{} expects {} operand arguments, found {}",
                            meta.name,
                            meta.user_arg_count(),
                            args.len()
                        ),
                        Position::new(j, next - 1),
                    ));
                }
                operand_error |= !ok || args.len() != meta.user_arg_count();
            }
            operand_args = args;
            j = next;
        }

        let wants_args = resolved.is_some_and(|(_, meta)| meta.takes_operand_args()) && !has_args;
        let node = OpcodeNode {
            name,
            opcode: resolved.map(|(opcode, _)| opcode),
            position: Position::new(position.start, j - 1),
            paren: None,
            operand: None,
            outputs: None,
            operand_args,
            parameters: Vec::new(),
            tags: Vec::new(),
        };

        if j < limit && self.chars[j] == '(' {
            if wants_args {
                self.problems.push(expected_operand_args(&node));
                operand_error = true;
            }
            frames.push(Frame {
                node,
                open: j,
                operand_error,
            });
            return j + 1;
        }

        if resolved.is_some() {
            let problem = if wants_args {
                expected_operand_args(&node)
            } else {
                Problem::new(
                    ErrorCode::ExpectedOpeningParen,
                    format!("expected '(' after {}", node.name),
                    node.position,
                )
            };
            self.problems.push(problem);
        }
        push_node(frames, &mut rhs.nodes, Node::Opcode(node));
        j
    }

    /// Read `<a b ...>` starting at `open`.
    ///
    /// Returns the arguments, the index after `>` and whether all of them
    /// were valid.
    fn parse_operand_args(&mut self, open: usize, limit: usize) -> (Vec<OperandArg>, usize, bool) {
        let mut args = Vec::new();
        let mut ok = true;
        let mut k = open + 1;

        loop {
            while k < limit && self.chars[k].is_whitespace() {
                k += 1;
            }
            if k >= limit || matches!(self.chars[k], '(' | ')' | '<') {
                self.problems.push(Problem::new(
                    ErrorCode::ExpectedClosingAngleBracket,
                    "expected '>'",
                    Position::new(open, k.saturating_sub(1).max(open)),
                ));
                return (args, k, false);
            }
            if self.chars[k] == '>' {
                return (args, k + 1, ok);
            }

            let start = k;
            while k < limit
                && !self.chars[k].is_whitespace()
                && !matches!(self.chars[k], '>' | '(' | ')' | '<')
            {
                k += 1;
            }
            let token: String = self.chars[start..k].iter().collect();
            let position = Position::new(start, k - 1);

            if !is_numeric_word(&token) {
                self.problems.push(Problem::invalid_word(&token, position));
                ok = false;
                continue;
            }
            let value = parse_literal(&token)
                .ok()
                .and_then(|value| value.to_u32())
                .filter(|value| *value <= u32::from(u16::MAX));
            match value {
                Some(value) => args.push(OperandArg { value, position }),
                None => {
                    self.problems.push(Problem::new(
                        ErrorCode::OutOfRangeOperandArgs,
                        format!("out-of-range operand argument: {}", token),
                        position,
                    ));
                    ok = false;
                }
            }
        }
    }

    // ===== Opcode resolution =====

    fn close_frame(&mut self, frame: Frame, close: usize, nested: bool) -> OpcodeNode {
        let Frame {
            mut node,
            open,
            operand_error,
        } = frame;
        node.position = Position::new(node.position.start, close);
        node.paren = Some(Position::new(open, close));

        let table = self.table;
        let meta = match node.opcode.and_then(|opcode| table.get(opcode)) {
            Some(meta) if !operand_error => meta,
            _ => return node,
        };

        let params = node.parameters.len();
        let args: Vec<u32> = node.operand_args.iter().map(|arg| arg.value).collect();
        let operand = match meta.pack_operand(&args, params) {
            Ok(operand) => operand,
            Err(offending) => {
                self.report_offending(&node, meta, &offending);
                return node;
            }
        };

        if meta.input_count(operand) != Some(params) {
            self.problems.push(out_of_range_inputs(&node, params));
            return node;
        }

        let Some(outputs) = meta.output_count(operand) else {
            self.problems.push(Problem::new(
                ErrorCode::OutOfRangeOperandArgs,
                format!("cannot compute the outputs of {} from its operand", node.name),
                node.position,
            ));
            return node;
        };

        if nested && outputs != 1 {
            self.problems.push(Problem::new(
                ErrorCode::InvalidNestedNode,
                format!(
                    "invalid nested node: {} has {} outputs, only single output opcodes can be nested",
                    node.name, outputs
                ),
                node.position,
            ));
            return node;
        }

        node.operand = Some(operand);
        node.outputs = Some(outputs);
        node
    }

    fn report_offending(&mut self, node: &OpcodeNode, meta: &OpMeta, offending: &[usize]) {
        let items = meta.operand_args();
        for &index in offending {
            let item = &items[index];
            if item.is_inputs() {
                self.problems.push(out_of_range_inputs(node, node.parameters.len()));
                continue;
            }
            let user_index = items[..index].iter().filter(|arg| !arg.is_inputs()).count();
            let position = node
                .operand_args
                .get(user_index)
                .map_or(node.position, |arg| arg.position);
            self.problems.push(Problem::new(
                ErrorCode::OutOfRangeOperandArgs,
                format!("out-of-range operand argument: {}", item.name),
                position,
            ));
        }
    }
}

fn alias(name: String, position: Position) -> Node {
    Node::Alias(AliasNode {
        name,
        position,
        tag: None,
    })
}

fn out_of_range_inputs(node: &OpcodeNode, params: usize) -> Problem {
    Problem::new(
        ErrorCode::OutOfRangeInputs,
        format!("out-of-range inputs: {} does not accept {} inputs", node.name, params),
        node.position,
    )
}

fn expected_operand_args(node: &OpcodeNode) -> Problem {
    Problem::new(
        ErrorCode::ExpectedOperandArgs,
        format!("expected operand arguments for {}", node.name),
        node.position,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_builtin(text: &str) -> Document {
        parse(text, OpMetaTable::builtin())
    }

    fn codes(document: &Document) -> Vec<ErrorCode> {
        document.problems.iter().map(|p| p.code).collect()
    }

    fn opcode(node: &Node) -> &OpcodeNode {
        match node {
            Node::Opcode(node) => node,
            other => panic!("expected opcode node, found {:?}", other),
        }
    }

    #[test]
    fn test_parse_simple_call() {
        let document = parse_builtin("_: add(1 2);");
        assert!(document.is_valid(), "{:?}", document.problems);
        assert_eq!(document.sources.len(), 1);

        let statement = &document.sources[0].statements[0];
        let add = opcode(&statement.rhs[0]);
        assert_eq!(add.name, "add");
        assert_eq!(add.operand, Some(2));
        assert_eq!(add.outputs, Some(1));
        assert_eq!(add.position, Position::new(3, 10));
        assert_eq!(add.paren, Some(Position::new(6, 10)));
        assert_eq!(add.parameters.len(), 2);
        assert_eq!(add.tags[0].name, "_");
    }

    #[test]
    fn test_nested_calls_and_aliases() {
        let document = parse_builtin("a: 1, b: mul(add(a 2) a);");
        assert!(document.is_valid(), "{:?}", document.problems);

        let statements = &document.sources[0].statements;
        let mul = opcode(&statements[1].rhs[0]);
        let add = opcode(&mul.parameters[0]);
        assert!(matches!(&add.parameters[0], Node::Alias(a) if a.name == "a"));
        assert!(matches!(&mul.parameters[1], Node::Alias(a) if a.name == "a"));
    }

    #[test]
    fn test_opcode_names_are_normalized() {
        let document = parse_builtin("_: EQUAL_TO(1 2), _: sum(1 2 3);");
        assert!(document.is_valid(), "{:?}", document.problems);
    }

    #[test]
    fn test_operand_args() {
        let document = parse_builtin("_: scale-18<6 1>(1);");
        assert!(document.is_valid(), "{:?}", document.problems);
        let scale = opcode(&document.sources[0].statements[0].rhs[0]);
        assert_eq!(scale.operand, Some((6 << 1) | 1));
        assert_eq!(scale.operand_args.len(), 2);
    }

    #[test]
    fn test_operand_arg_problems() {
        assert_eq!(
            codes(&parse_builtin("_: scale-18<6>(1);")),
            vec![ErrorCode::MismatchOperandArgs]
        );
        assert_eq!(
            codes(&parse_builtin("_: scale-18(1);")),
            vec![ErrorCode::ExpectedOperandArgs]
        );
        assert_eq!(
            codes(&parse_builtin("_: scale-18<300 1>(1);")),
            vec![ErrorCode::OutOfRangeOperandArgs]
        );
        assert_eq!(
            codes(&parse_builtin("_: scale-18<6 x>(1);")),
            vec![ErrorCode::InvalidWordPattern]
        );
        assert_eq!(
            codes(&parse_builtin("_: scale-18<6 1 (1);")),
            vec![ErrorCode::ExpectedClosingAngleBracket]
        );
        assert_eq!(
            codes(&parse_builtin("_: add<1>(1 2);")),
            vec![ErrorCode::MismatchOperandArgs]
        );
    }

    #[test]
    fn test_arity_problems() {
        assert_eq!(codes(&parse_builtin("_: add();")), vec![ErrorCode::OutOfRangeInputs]);
        assert_eq!(codes(&parse_builtin("_: add(1);")), vec![ErrorCode::OutOfRangeInputs]);
        assert_eq!(
            codes(&parse_builtin("_: is-zero(1 2);")),
            vec![ErrorCode::OutOfRangeInputs]
        );
        assert_eq!(
            codes(&parse_builtin("_: if(1 2);")),
            vec![ErrorCode::OutOfRangeInputs]
        );
        let document = parse_builtin("_: add();");
        assert!(document.find_unresolved().is_some());
    }

    #[test]
    fn test_invalid_nested_node() {
        let document = parse_builtin("_: add(1 explode-32(2));");
        assert_eq!(codes(&document), vec![ErrorCode::InvalidNestedNode]);

        let document = parse_builtin("_: add(ensure(1) 2);");
        assert_eq!(codes(&document), vec![ErrorCode::InvalidNestedNode]);
    }

    #[test]
    fn test_paren_problems() {
        assert_eq!(codes(&parse_builtin("_: (1 2);")), vec![ErrorCode::ExpectedOpcode]);
        assert_eq!(
            codes(&parse_builtin("_: add(1 2));")),
            vec![ErrorCode::UnexpectedClosingParen]
        );
        let document = parse_builtin("_: add(1 2;");
        assert_eq!(codes(&document), vec![ErrorCode::ExpectedClosingParen]);
        assert_eq!(document.problems[0].position, Position::at(6));
        assert_eq!(
            codes(&parse_builtin("_: add;")),
            vec![ErrorCode::ExpectedOpeningParen]
        );
    }

    #[test]
    fn test_word_problems() {
        assert_eq!(codes(&parse_builtin("_: foo;")), vec![ErrorCode::UndefinedWord]);
        assert_eq!(codes(&parse_builtin("_: 12ab;")), vec![ErrorCode::InvalidWordPattern]);
        assert_eq!(
            codes(&parse_builtin("_: foo(1 2);")),
            vec![ErrorCode::UndefinedOpcode]
        );
        assert_eq!(codes(&parse_builtin("_: 1 $;")), vec![ErrorCode::IllegalChar]);
        assert_eq!(
            codes(&parse_builtin("_: add(1, 2);")),
            vec![ErrorCode::UnexpectedComma]
        );
    }

    #[test]
    fn test_values() {
        let document = parse_builtin("_ _ _: 0x10 1e3 max-uint256;");
        assert!(document.is_valid(), "{:?}", document.problems);

        let too_big = format!("_: 1{};", "0".repeat(80));
        assert_eq!(codes(&parse_builtin(&too_big)), vec![ErrorCode::OutOfRangeValue]);
    }

    #[test]
    fn test_self_reference_and_duplicates() {
        assert_eq!(
            codes(&parse_builtin("a: add(a 1);")),
            vec![ErrorCode::InvalidSelfReference]
        );
        assert_eq!(
            codes(&parse_builtin("a: 1, a: 2;")),
            vec![ErrorCode::DuplicateAlias]
        );
    }

    #[test]
    fn test_scope_is_per_source() {
        assert_eq!(codes(&parse_builtin("a: 1; _: a;")), vec![ErrorCode::UndefinedWord]);
    }

    #[test]
    fn test_balance() {
        let document = parse_builtin("a b: add(1 2);");
        assert_eq!(codes(&document), vec![ErrorCode::MismatchRHS]);

        let document = parse_builtin("_: 1 2;");
        assert_eq!(codes(&document), vec![ErrorCode::MismatchLHS]);

        let document = parse_builtin(": ensure(1);");
        assert!(document.is_valid(), "{:?}", document.problems);

        let document = parse_builtin("a b c d e f g h: explode-32(1);");
        assert!(document.is_valid(), "{:?}", document.problems);
    }

    #[test]
    fn test_invalid_statement() {
        let document = parse_builtin("add(1 2); _: 1;");
        assert_eq!(codes(&document), vec![ErrorCode::InvalidStatement]);
        assert!(document.sources[0].statements.is_empty());
        assert_eq!(document.sources[1].statements.len(), 1);
    }
}
