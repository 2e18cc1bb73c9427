//! Alias binding
//!
//! Matches a statement's LHS names against the values its RHS produces and
//! attaches each name to the node producing the value. Binding never changes
//! the nodes themselves.

use crate::ast::{LhsName, Node, Tag};
use crate::problem::{ErrorCode, Problem};

/// Bind `lhs` to the outputs of `rhs` in positional order.
///
/// A node with an unknown output count aborts binding for the statement
/// without reporting anything; its own problem has already been reported.
pub(crate) fn bind(lhs: &[LhsName], rhs: &mut [Node], problems: &mut Vec<Problem>) {
    let Some(counts) = rhs.iter().map(Node::output_count).collect::<Option<Vec<_>>>() else {
        return;
    };

    let mut names = lhs.iter();
    for (node, count) in rhs.iter_mut().zip(counts) {
        for _ in 0..count {
            match names.next() {
                Some(name) => node.attach(Tag {
                    name: name.name.clone(),
                    position: name.position,
                }),
                None => problems.push(Problem::new(
                    ErrorCode::MismatchLHS,
                    "no LHS name for this value",
                    node.position(),
                )),
            }
        }
    }

    for name in names {
        problems.push(Problem::new(
            ErrorCode::MismatchRHS,
            format!("no RHS value for '{}'", name.name),
            name.position,
        ));
    }
}
