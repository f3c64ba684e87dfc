use super::{Expr, Form, Program, Result, ScriptError};

/// Deepest list nesting the parser accepts.
pub const MAX_NESTING: usize = 128;

/// Parse script source text into a [`Program`].
pub fn parse_program(source: &str) -> Result<Program> {
    let mut parser = Parser::new(source);
    let mut forms = Vec::new();
    loop {
        parser.skip_ws();
        if parser.eof() {
            break;
        }
        forms.push(parser.parse_form()?);
    }
    Ok(Program::new(source, forms))
}

struct Parser<'a> {
    src: &'a str,
    bytes: &'a [u8],
    index: usize,
    line: u32,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(src: &'a str) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            index: 0,
            line: 1,
            depth: 0,
        }
    }

    fn eof(&self) -> bool {
        self.index >= self.bytes.len()
    }

    fn current(&self) -> Option<u8> {
        self.bytes.get(self.index).copied()
    }

    fn peek_char(&self) -> Option<u8> {
        self.bytes.get(self.index + 1).copied()
    }

    fn advance(&mut self) {
        if let Some(ch) = self.current() {
            if ch == b'\n' {
                self.line += 1;
            }
            self.index += 1;
        }
    }

    fn skip_ws(&mut self) {
        loop {
            while let Some(ch) = self.current() {
                if ch.is_ascii_whitespace() {
                    self.advance();
                } else {
                    break;
                }
            }
            if self.current() == Some(b';') {
                while let Some(ch) = self.current() {
                    self.advance();
                    if ch == b'\n' {
                        break;
                    }
                }
                continue;
            }
            break;
        }
    }

    fn parse_form(&mut self) -> Result<Form> {
        self.skip_ws();
        let line = self.line;
        let expr = match self.current() {
            None => return Err(self.error("unexpected end of input")),
            Some(b'(') => self.parse_list()?,
            Some(b'"') => self.parse_string()?,
            Some(b'-' | b'+' | b'0'..=b'9') => self.parse_number_or_symbol()?,
            Some(_) => self.parse_symbol()?,
        };
        Ok(Form { expr, line })
    }

    fn parse_list(&mut self) -> Result<Expr> {
        let open_line = self.line;
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(self.error(&format!("nesting deeper than {} levels", MAX_NESTING)));
        }
        self.advance();
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            match self.current() {
                None => {
                    return Err(ScriptError::Syntax {
                        message: "unterminated list".into(),
                        line: open_line,
                    });
                }
                Some(b')') => {
                    self.advance();
                    break;
                }
                Some(_) => items.push(self.parse_form()?),
            }
        }
        self.depth -= 1;
        Ok(Expr::List(items))
    }

    fn parse_string(&mut self) -> Result<Expr> {
        let open_line = self.line;
        self.advance();
        let mut buf: Vec<u8> = Vec::new();
        while let Some(ch) = self.current() {
            self.advance();
            match ch {
                b'"' => {
                    let text = String::from_utf8(buf)
                        .map_err(|_| self.error("string literal is not valid UTF-8"))?;
                    return Ok(Expr::String(text));
                }
                b'\\' => {
                    let escaped = self
                        .current()
                        .ok_or_else(|| self.error("incomplete escape"))?;
                    self.advance();
                    let value = match escaped {
                        b'"' => b'"',
                        b'\\' => b'\\',
                        b'n' => b'\n',
                        b'r' => b'\r',
                        b't' => b'\t',
                        other => {
                            return Err(self.error(&format!("unknown escape: \\{}", other as char)));
                        }
                    };
                    buf.push(value);
                }
                _ => buf.push(ch),
            }
        }
        Err(ScriptError::Syntax {
            message: "unterminated string literal".into(),
            line: open_line,
        })
    }

    fn parse_number_or_symbol(&mut self) -> Result<Expr> {
        let start = self.index;
        if matches!(self.current(), Some(b'-' | b'+')) {
            self.advance();
        }
        let mut has_digit = false;
        while let Some(ch) = self.current() {
            if ch.is_ascii_digit() {
                has_digit = true;
                self.advance();
            } else {
                break;
            }
        }

        let mut is_float = false;
        if has_digit
            && self.current() == Some(b'.')
            && self.peek_char().is_some_and(|next| next.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while let Some(ch) = self.current() {
                if ch.is_ascii_digit() {
                    self.advance();
                } else {
                    break;
                }
            }
        }

        if !has_digit {
            self.index = start;
            return self.parse_symbol();
        }
        if self.current().is_some_and(is_symbol_char) {
            return Err(self.error("invalid number literal"));
        }

        let text = &self.src[start..self.index];
        if is_float {
            text.parse::<f64>()
                .map(Expr::Float)
                .map_err(|_| self.error("invalid float literal"))
        } else {
            text.parse::<i64>()
                .map(Expr::Integer)
                .map_err(|_| self.error("integer literal out of range"))
        }
    }

    fn parse_symbol(&mut self) -> Result<Expr> {
        let start = self.index;
        while let Some(ch) = self.current() {
            if is_symbol_char(ch) {
                self.advance();
            } else {
                break;
            }
        }
        if start == self.index {
            return Err(self.error("unexpected character"));
        }
        let text = &self.src[start..self.index];
        Ok(match text {
            "true" => Expr::Boolean(true),
            "false" => Expr::Boolean(false),
            "nil" => Expr::Nil,
            _ => Expr::Symbol(text.to_string()),
        })
    }

    fn error(&self, message: &str) -> ScriptError {
        ScriptError::Syntax {
            message: message.to_string(),
            line: self.line,
        }
    }
}

fn is_symbol_char(ch: u8) -> bool {
    match ch {
        b'(' | b')' | b'"' | b';' => false,
        c if c.is_ascii_whitespace() => false,
        _ => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracks_lines_of_top_level_forms() {
        let program = parse_program("(define a 1)\n; note\n(define b \"x\")").unwrap();
        assert_eq!(program.forms.len(), 2);
        assert_eq!(program.forms[0].line, 1);
        assert_eq!(program.forms[1].line, 3);
        assert_eq!(program.forms[1].head(), Some("define"));
    }

    #[test]
    fn parses_literals() {
        let program = parse_program("-4 2.5 true nil \"a\\nb\" - foo?").unwrap();
        let exprs: Vec<Expr> = program.forms.into_iter().map(|form| form.expr).collect();
        assert_eq!(
            exprs,
            vec![
                Expr::Integer(-4),
                Expr::Float(2.5),
                Expr::Boolean(true),
                Expr::Nil,
                Expr::String("a\nb".into()),
                Expr::Symbol("-".into()),
                Expr::Symbol("foo?".into()),
            ]
        );
    }

    #[test]
    fn reports_unterminated_list_at_its_opening_line() {
        let err = parse_program("(define a 1)\n(while true\n  (define b 2)").unwrap_err();
        assert!(matches!(err, ScriptError::Syntax { line: 2, .. }));
    }

    #[test]
    fn rejects_excessive_nesting() {
        let source = format!("{}1{}", "(".repeat(MAX_NESTING + 1), ")".repeat(MAX_NESTING + 1));
        assert!(parse_program(&source).is_err());
    }

    #[test]
    fn rejects_stray_closing_paren_and_bad_numbers() {
        assert!(parse_program(")").is_err());
        assert!(parse_program("12abc").is_err());
    }
}
