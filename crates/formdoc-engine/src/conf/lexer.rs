use super::ConfError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenKind {
    Key(String),
    Str(String),
    Open,
    Close,
    Include,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    /// 1-based line number.
    pub line: usize,
    /// 1-based character column.
    pub column: usize,
}

/// Character cursor over a single input line.
struct LineCursor<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> LineCursor<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    fn eof(&self) -> bool {
        self.i >= self.s.len()
    }

    fn rest(&self) -> &'a str {
        &self.s[self.i..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.i += c.len_utf8();
        Some(c)
    }

    fn column(&self) -> usize {
        self.s[..self.i].chars().count() + 1
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || matches!(c, '\u{a0}' | ',' | ';' | '\u{feff}')
}

fn is_key_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_key_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Splits conf text into tokens. Comments (`#` or `%` to end of line) are
/// dropped.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ConfError> {
    let mut tokens = Vec::new();
    for (n, line) in input.lines().enumerate() {
        let line_no = n + 1;
        let mut cur = LineCursor::new(line);
        loop {
            while cur.peek().is_some_and(is_separator) {
                cur.bump();
            }
            if cur.eof() {
                break;
            }
            let column = cur.column();
            let token = |kind| Token {
                kind,
                line: line_no,
                column,
            };
            match cur.peek() {
                Some(c) if is_key_start(c) => {
                    let start = cur.i;
                    while cur.peek().is_some_and(is_key_char) {
                        cur.bump();
                    }
                    tokens.push(token(TokenKind::Key(line[start..cur.i].to_string())));
                }
                Some(q @ ('\'' | '"')) => {
                    let content = lex_string(&mut cur, q).ok_or_else(|| ConfError::Syntax {
                        line: line_no,
                        column,
                        text: line[cur.i..].to_string(),
                    })?;
                    tokens.push(token(TokenKind::Str(unescape(&content, line_no, column)?)));
                }
                Some('(') => {
                    cur.bump();
                    tokens.push(token(TokenKind::Open));
                }
                Some(')') => {
                    cur.bump();
                    tokens.push(token(TokenKind::Close));
                }
                Some('#') => break,
                Some('%') if cur.rest().starts_with("%include") => {
                    cur.i += "%include".len();
                    tokens.push(token(TokenKind::Include));
                }
                Some('%') => break,
                _ => {
                    return Err(ConfError::Syntax {
                        line: line_no,
                        column,
                        text: cur.rest().to_string(),
                    });
                }
            }
        }
    }
    Ok(tokens)
}

/// Reads a quoted string; a doubled quote stands for one quote character.
/// Returns the raw content with `%` escapes still in place.
fn lex_string(cur: &mut LineCursor<'_>, quote: char) -> Option<String> {
    let start = cur.i;
    cur.bump();
    let mut out = String::new();
    loop {
        match cur.bump() {
            None => {
                cur.i = start;
                return None;
            }
            Some(c) if c == quote => {
                if cur.peek() == Some(quote) {
                    cur.bump();
                    out.push(quote);
                } else {
                    return Some(out);
                }
            }
            Some(c) => out.push(c),
        }
    }
}

/// Resolves `%n`, `%%` and `%uXXXX`. Any other `%` stays literal.
fn unescape(raw: &str, line: usize, column: usize) -> Result<String, ConfError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '%' {
            out.push(c);
            continue;
        }
        match chars.peek() {
            Some('n') => {
                chars.next();
                out.push('\n');
            }
            Some('%') => {
                chars.next();
                out.push('%');
            }
            Some('u') => {
                chars.next();
                let code: String = chars.by_ref().take(4).collect();
                let ch = u32::from_str_radix(&code, 16)
                    .ok()
                    .filter(|_| code.len() == 4)
                    .and_then(char::from_u32)
                    .ok_or_else(|| ConfError::BadEscape {
                        line,
                        column,
                        escape: format!("%u{code}"),
                    })?;
                out.push(ch);
            }
            _ => out.push('%'),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input).unwrap().into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn key_value_pair() {
        assert_eq!(
            kinds("CMD 'insertFormValue'"),
            vec![
                TokenKind::Key("CMD".into()),
                TokenKind::Str("insertFormValue".into())
            ]
        );
    }

    #[test]
    fn separators_and_comments() {
        assert_eq!(
            kinds("A('x', 'y'); # trailing\n# whole line\n)"),
            vec![
                TokenKind::Key("A".into()),
                TokenKind::Open,
                TokenKind::Str("x".into()),
                TokenKind::Str("y".into()),
                TokenKind::Close,
                TokenKind::Close,
            ]
        );
    }

    #[test]
    fn percent_comment() {
        assert_eq!(
            kinds("% Kopf\nX 'y' % rest"),
            vec![TokenKind::Key("X".into()), TokenKind::Str("y".into())]
        );
    }

    #[test]
    fn doubled_quotes_and_escapes() {
        assert_eq!(kinds("'it''s'"), vec![TokenKind::Str("it's".into())]);
        assert_eq!(kinds(r#""say ""hi""""#), vec![TokenKind::Str("say \"hi\"".into())]);
        assert_eq!(kinds("'a%nb%%c%u0041'"), vec![TokenKind::Str("a\nb%cA".into())]);
        assert_eq!(kinds("'50%'"), vec![TokenKind::Str("50%".into())]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = tokenize("X 'open").unwrap_err();
        assert!(matches!(err, ConfError::Syntax { line: 1, column: 3, .. }));
    }

    #[test]
    fn bad_unicode_escape() {
        assert!(matches!(
            tokenize("'%uZZ'"),
            Err(ConfError::BadEscape { .. })
        ));
    }

    #[test]
    fn positions_are_tracked() {
        let tokens = tokenize("A\n  ('x')").unwrap();
        assert_eq!((tokens[1].line, tokens[1].column), (2, 3));
        assert_eq!((tokens[2].line, tokens[2].column), (2, 4));
    }
}
