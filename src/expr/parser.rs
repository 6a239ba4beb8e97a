use crate::expr::ast::{BinaryOp, Expr, ParseError, Token, UnaryOp};

// Tokenizer + recursive-descent parser
pub fn tokenize(s: &str) -> Result<Vec<Token>, ParseError> {
    let mut toks = Vec::new();
    let mut chars = s.chars().peekable();
    while let Some(&c) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }
        if c.is_ascii_digit() || c == '.' {
            let mut num = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_digit()
                    || d == '.'
                    || d == 'e'
                    || d == 'E'
                    || ((d == '+' || d == '-') && (num.ends_with('e') || num.ends_with('E')))
                {
                    num.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            match num.parse::<f64>() {
                Ok(v) => toks.push(Token::Num(v)),
                Err(_) => {
                    return Err(ParseError {
                        pos: toks.len(),
                        found: None,
                        expected: vec![format!("number, got '{}'", num)],
                    })
                }
            }
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            let mut id = String::new();
            while let Some(&d) = chars.peek() {
                if d.is_ascii_alphanumeric() || d == '_' {
                    id.push(d);
                    chars.next();
                } else {
                    break;
                }
            }
            toks.push(Token::Ident(id));
            continue;
        }
        chars.next();
        let tok = match c {
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '?' => Token::Question,
            ':' => Token::Colon,
            '+' | '-' | '*' | '/' | '^' => Token::Op(c),
            '<' | '>' | '=' | '!' => {
                let eq = chars.peek() == Some(&'=');
                if eq {
                    chars.next();
                }
                match (c, eq) {
                    ('<', true) => Token::Le,
                    ('<', false) => Token::Lt,
                    ('>', true) => Token::Ge,
                    ('>', false) => Token::Gt,
                    ('=', true) => Token::EqEq,
                    ('!', true) => Token::Ne,
                    ('!', false) => Token::Bang,
                    // a lone '=' has no meaning inside an expression
                    _ => return Err(unexpected_char(toks.len(), c)),
                }
            }
            '&' | '|' => {
                if chars.peek() == Some(&c) {
                    chars.next();
                    if c == '&' {
                        Token::And
                    } else {
                        Token::Or
                    }
                } else {
                    return Err(unexpected_char(toks.len(), c));
                }
            }
            _ => return Err(unexpected_char(toks.len(), c)),
        };
        toks.push(tok);
    }
    Ok(toks)
}

fn unexpected_char(pos: usize, c: char) -> ParseError {
    ParseError {
        pos,
        found: None,
        expected: vec![format!("valid character, got '{}'", c)],
    }
}

pub struct Parser {
    tokens: Vec<Token>,
    pos: usize,
    expected: Vec<String>,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens,
            pos: 0,
            expected: Vec::new(),
        }
    }

    fn expected_push(&mut self, s: &str) {
        if !self.expected.iter().any(|e| e == s) {
            self.expected.push(s.to_string());
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let r = self.tokens.get(self.pos).cloned();
        if r.is_some() {
            self.pos += 1;
        }
        r
    }

    fn error(&self) -> ParseError {
        ParseError {
            pos: self.pos,
            found: self.peek().cloned(),
            expected: self.expected.clone(),
        }
    }

    /// Parse a full expression and require that every token is consumed.
    pub fn parse_complete(&mut self) -> Result<Expr, ParseError> {
        let expr = self.parse_expr().ok_or_else(|| self.error())?;
        if self.peek().is_some() {
            self.expected_push("end of expression");
            return Err(self.error());
        }
        Ok(expr)
    }

    pub fn parse_expr(&mut self) -> Option<Expr> {
        self.parse_ternary()
    }

    fn parse_ternary(&mut self) -> Option<Expr> {
        let cond = self.parse_or()?;
        if let Some(Token::Question) = self.peek() {
            self.next();
            let then_branch = self.parse_expr()?;
            if let Some(Token::Colon) = self.peek() {
                self.next();
                let else_branch = self.parse_expr()?;
                return Some(Expr::Ternary {
                    cond: Box::new(cond),
                    then_branch: Box::new(then_branch),
                    else_branch: Box::new(else_branch),
                });
            }
            self.expected_push(":");
            return None;
        }
        Some(cond)
    }

    fn binary(lhs: Expr, op: BinaryOp, rhs: Expr) -> Expr {
        Expr::Binary {
            lhs: Box::new(lhs),
            op,
            rhs: Box::new(rhs),
        }
    }

    fn parse_or(&mut self) -> Option<Expr> {
        let mut node = self.parse_and()?;
        while let Some(Token::Or) = self.peek() {
            self.next();
            let rhs = self.parse_and()?;
            node = Self::binary(node, BinaryOp::Or, rhs);
        }
        Some(node)
    }

    fn parse_and(&mut self) -> Option<Expr> {
        let mut node = self.parse_eq()?;
        while let Some(Token::And) = self.peek() {
            self.next();
            let rhs = self.parse_eq()?;
            node = Self::binary(node, BinaryOp::And, rhs);
        }
        Some(node)
    }

    fn parse_eq(&mut self) -> Option<Expr> {
        let mut node = self.parse_cmp()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqEq) => BinaryOp::Eq,
                Some(Token::Ne) => BinaryOp::Ne,
                _ => break,
            };
            self.next();
            let rhs = self.parse_cmp()?;
            node = Self::binary(node, op, rhs);
        }
        Some(node)
    }

    fn parse_cmp(&mut self) -> Option<Expr> {
        let mut node = self.parse_add_sub()?;
        loop {
            let op = match self.peek() {
                Some(Token::Lt) => BinaryOp::Lt,
                Some(Token::Gt) => BinaryOp::Gt,
                Some(Token::Le) => BinaryOp::Le,
                Some(Token::Ge) => BinaryOp::Ge,
                _ => break,
            };
            self.next();
            let rhs = self.parse_add_sub()?;
            node = Self::binary(node, op, rhs);
        }
        Some(node)
    }

    fn parse_add_sub(&mut self) -> Option<Expr> {
        let mut node = self.parse_mul_div()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op('+')) => BinaryOp::Add,
                Some(Token::Op('-')) => BinaryOp::Sub,
                _ => break,
            };
            self.next();
            let rhs = self.parse_mul_div()?;
            node = Self::binary(node, op, rhs);
        }
        Some(node)
    }

    fn parse_mul_div(&mut self) -> Option<Expr> {
        let mut node = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op('*')) => BinaryOp::Mul,
                Some(Token::Op('/')) => BinaryOp::Div,
                _ => break,
            };
            self.next();
            let rhs = self.parse_unary()?;
            node = Self::binary(node, op, rhs);
        }
        Some(node)
    }

    // unary binds looser than '^' so that -x^2 == -(x^2)
    fn parse_unary(&mut self) -> Option<Expr> {
        let op = match self.peek() {
            Some(Token::Op('-')) => Some(UnaryOp::Neg),
            Some(Token::Op('+')) => None,
            Some(Token::Bang) => Some(UnaryOp::Not),
            _ => return self.parse_power(),
        };
        self.next();
        let rhs = self.parse_unary()?;
        Some(match op {
            Some(op) => Expr::Unary {
                op,
                rhs: Box::new(rhs),
            },
            None => rhs,
        })
    }

    fn parse_power(&mut self) -> Option<Expr> {
        let node = self.parse_primary()?;
        if let Some(Token::Op('^')) = self.peek() {
            self.next();
            // right associative; the exponent may carry its own sign
            let rhs = self.parse_unary()?;
            return Some(Self::binary(node, BinaryOp::Pow, rhs));
        }
        Some(node)
    }

    fn parse_primary(&mut self) -> Option<Expr> {
        let Some(tok) = self.next() else {
            self.expected_push("number|identifier|'('");
            return None;
        };
        match tok {
            Token::Num(v) => Some(Expr::Number(v)),
            Token::Ident(id) => {
                if let Some(Token::LParen) = self.peek() {
                    self.next();
                    let args = self.parse_args()?;
                    Some(Expr::Call { name: id, args })
                } else {
                    Some(Expr::Ident(id))
                }
            }
            Token::LParen => {
                let expr = self.parse_expr()?;
                if let Some(Token::RParen) = self.peek() {
                    self.next();
                    Some(expr)
                } else {
                    self.expected_push(")");
                    None
                }
            }
            _ => {
                self.pos -= 1;
                self.expected_push("number|identifier|'('");
                None
            }
        }
    }

    fn parse_args(&mut self) -> Option<Vec<Expr>> {
        let mut args = Vec::new();
        if let Some(Token::RParen) = self.peek() {
            self.next();
            return Some(args);
        }
        loop {
            args.push(self.parse_expr()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.next();
                }
                Some(Token::RParen) => {
                    self.next();
                    return Some(args);
                }
                _ => {
                    self.expected_push(",|)");
                    return None;
                }
            }
        }
    }
}
