use super::lexer::{Token, TokenKind, tokenize};
use super::{ConfError, ConfNode};

/// Parses `input` and appends the resulting top-level nodes to `root`.
///
/// Grammar, per token:
/// - `KEY STRING` adds a key node holding one leaf,
/// - `KEY (` opens a named list,
/// - `(` opens an anonymous list,
/// - `STRING` adds a leaf,
/// - `)` closes the innermost open list.
pub fn parse_into(root: &mut ConfNode, input: &str) -> Result<(), ConfError> {
    let tokens = tokenize(input)?;
    let mut stack: Vec<ConfNode> = vec![std::mem::take(root)];
    let mut iter = tokens.into_iter().peekable();

    while let Some(Token { kind, line, column }) = iter.next() {
        match kind {
            TokenKind::Key(name) => match iter.next() {
                Some(Token {
                    kind: TokenKind::Str(value),
                    ..
                }) => {
                    let mut child = ConfNode::new(name);
                    child.add(value);
                    top(&mut stack).add_child(child);
                }
                Some(Token {
                    kind: TokenKind::Open,
                    ..
                }) => stack.push(ConfNode::new(name)),
                Some(next) => {
                    return Err(ConfError::Syntax {
                        line: next.line,
                        column: next.column,
                        text: format!("{:?} after key '{name}'", next.kind),
                    });
                }
                None => {
                    return Err(ConfError::Syntax {
                        line,
                        column,
                        text: format!("input ends after key '{name}'"),
                    });
                }
            },
            TokenKind::Str(value) => {
                top(&mut stack).add(value);
            }
            TokenKind::Open => stack.push(ConfNode::new("")),
            TokenKind::Close => {
                if stack.len() <= 1 {
                    return Err(ConfError::UnbalancedClose { line, column });
                }
                if let Some(done) = stack.pop() {
                    top(&mut stack).add_child(done);
                }
            }
            TokenKind::Include => return Err(ConfError::IncludeUnsupported { line }),
        }
    }

    if stack.len() > 1 {
        return Err(ConfError::MissingClose(stack.len() - 1));
    }
    if let Some(done) = stack.pop() {
        *root = done;
    }
    Ok(())
}

fn top(stack: &mut [ConfNode]) -> &mut ConfNode {
    // The root is never popped, so the stack is never empty here.
    let last = stack.len() - 1;
    &mut stack[last]
}
