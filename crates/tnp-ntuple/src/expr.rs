//! Expression engine for selections and weights over event-tree columns.
//!
//! The grammar is the subset of the TTree formula language that analysis
//! configurations use in practice: arithmetic (`+ - * /`), comparisons
//! (`== != < <= > >=`), boolean operators (`&& || !`) and the functions
//! `abs`/`fabs`, `sqrt`, `log`, `exp`, `pow`, `min`, `max`.
//!
//! Booleans are represented as `1.0`/`0.0`; any value `> 0` is true.
//! Evaluation is column-wise: every AST node produces one `Vec<f64>` for
//! the whole batch.

use tnp_core::{Error, Result};

// ── AST ────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
enum Node {
    Number(f64),
    Column(usize),
    Neg(Box<Node>),
    Not(Box<Node>),
    Binary(BinOp, Box<Node>, Box<Node>),
    Call(Func, Vec<Node>),
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

impl BinOp {
    fn apply(self, a: f64, b: f64) -> f64 {
        let truth = |c: bool| if c { 1.0 } else { 0.0 };
        match self {
            BinOp::Add => a + b,
            BinOp::Sub => a - b,
            BinOp::Mul => a * b,
            BinOp::Div => a / b,
            BinOp::Eq => truth((a - b).abs() < f64::EPSILON),
            BinOp::Ne => truth((a - b).abs() >= f64::EPSILON),
            BinOp::Lt => truth(a < b),
            BinOp::Le => truth(a <= b),
            BinOp::Gt => truth(a > b),
            BinOp::Ge => truth(a >= b),
            BinOp::And => truth(a > 0.0 && b > 0.0),
            BinOp::Or => truth(a > 0.0 || b > 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Func {
    Abs,
    Sqrt,
    Log,
    Exp,
    Pow,
    Min,
    Max,
}

impl Func {
    fn lookup(name: &str) -> Option<(Func, usize)> {
        Some(match name {
            "abs" | "fabs" => (Func::Abs, 1),
            "sqrt" => (Func::Sqrt, 1),
            "log" => (Func::Log, 1),
            "exp" => (Func::Exp, 1),
            "pow" => (Func::Pow, 2),
            "min" => (Func::Min, 2),
            "max" => (Func::Max, 2),
            _ => return None,
        })
    }

    fn apply(self, args: &[f64]) -> f64 {
        match self {
            Func::Abs => args[0].abs(),
            Func::Sqrt => args[0].sqrt(),
            Func::Log => args[0].ln(),
            Func::Exp => args[0].exp(),
            Func::Pow => args[0].powf(args[1]),
            Func::Min => args[0].min(args[1]),
            Func::Max => args[0].max(args[1]),
        }
    }
}

// ── Compiled expression ────────────────────────────────────────

/// A parsed expression bound to the columns it reads.
#[derive(Debug, Clone)]
pub struct CompiledExpr {
    source: String,
    root: Node,
    /// Column (branch) names referenced by the expression, in order of first use.
    pub required_branches: Vec<String>,
}

impl CompiledExpr {
    /// Parse an expression string.
    pub fn compile(input: &str) -> Result<Self> {
        let tokens = tokenize(input)?;
        if tokens.is_empty() {
            return Err(Error::Expression("empty expression".into()));
        }
        let mut parser = Parser { tokens: &tokens, pos: 0, branches: Vec::new() };
        let root = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(Error::Expression(format!(
                "unexpected token {tok:?} after expression in '{input}'"
            )));
        }
        Ok(Self { source: input.to_string(), root, required_branches: parser.branches })
    }

    /// The expression text this was compiled from.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// `true` if the expression reads no columns.
    pub fn is_constant(&self) -> bool {
        self.required_branches.is_empty()
    }

    /// Evaluate for a single row; `values` follows `required_branches` order.
    pub fn eval_row(&self, values: &[f64]) -> f64 {
        let cols: Vec<&[f64]> = values.iter().map(std::slice::from_ref).collect();
        eval_node(&self.root, &cols, 1)[0]
    }

    /// Evaluate over `n_entries` rows.
    ///
    /// `columns` follows `required_branches` order and every column must hold
    /// `n_entries` values.
    pub fn eval_columns(&self, columns: &[&[f64]], n_entries: usize) -> Result<Vec<f64>> {
        if columns.len() != self.required_branches.len() {
            return Err(Error::Expression(format!(
                "'{}' needs {} columns, got {}",
                self.source,
                self.required_branches.len(),
                columns.len()
            )));
        }
        for (name, col) in self.required_branches.iter().zip(columns) {
            if col.len() != n_entries {
                return Err(Error::Expression(format!(
                    "column '{name}' has {} entries, expected {n_entries}",
                    col.len()
                )));
            }
        }
        Ok(eval_node(&self.root, columns, n_entries))
    }
}

fn eval_node(node: &Node, cols: &[&[f64]], n: usize) -> Vec<f64> {
    match node {
        Node::Number(v) => vec![*v; n],
        Node::Column(i) => cols[*i].to_vec(),
        Node::Neg(a) => eval_node(a, cols, n).into_iter().map(|v| -v).collect(),
        Node::Not(a) => eval_node(a, cols, n)
            .into_iter()
            .map(|v| if v > 0.0 { 0.0 } else { 1.0 })
            .collect(),
        Node::Binary(op, a, b) => {
            let mut lhs = eval_node(a, cols, n);
            let rhs = eval_node(b, cols, n);
            for (l, r) in lhs.iter_mut().zip(rhs) {
                *l = op.apply(*l, r);
            }
            lhs
        }
        Node::Call(f, args) => {
            let evaluated: Vec<Vec<f64>> = args.iter().map(|a| eval_node(a, cols, n)).collect();
            let mut scratch = vec![0.0; evaluated.len()];
            (0..n)
                .map(|row| {
                    for (slot, col) in scratch.iter_mut().zip(&evaluated) {
                        *slot = col[row];
                    }
                    f.apply(&scratch)
                })
                .collect()
        }
    }
}

// ── Tokenizer ──────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Num(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    Not,
}

fn tokenize(input: &str) -> Result<Vec<Token>> {
    let chars: Vec<char> = input.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let next = chars.get(i + 1).copied();
        let two = match (c, next) {
            ('&', Some('&')) => Some(Token::And),
            ('|', Some('|')) => Some(Token::Or),
            ('=', Some('=')) => Some(Token::Eq),
            ('!', Some('=')) => Some(Token::Ne),
            ('<', Some('=')) => Some(Token::Le),
            ('>', Some('=')) => Some(Token::Ge),
            _ => None,
        };
        if let Some(tok) = two {
            tokens.push(tok);
            i += 2;
            continue;
        }

        let single = match c {
            '+' => Some(Token::Plus),
            '-' => Some(Token::Minus),
            '*' => Some(Token::Star),
            '/' => Some(Token::Slash),
            '(' => Some(Token::LParen),
            ')' => Some(Token::RParen),
            ',' => Some(Token::Comma),
            '<' => Some(Token::Lt),
            '>' => Some(Token::Gt),
            '!' => Some(Token::Not),
            _ => None,
        };
        if let Some(tok) = single {
            tokens.push(tok);
            i += 1;
            continue;
        }

        if c.is_ascii_digit() || c == '.' {
            let start = i;
            while i < chars.len() {
                let d = chars[i];
                let exponent_sign =
                    (d == '+' || d == '-') && i > start && matches!(chars[i - 1], 'e' | 'E');
                if d.is_ascii_digit() || d == '.' || d == 'e' || d == 'E' || exponent_sign {
                    i += 1;
                } else {
                    break;
                }
            }
            let text: String = chars[start..i].iter().collect();
            let value = text
                .parse::<f64>()
                .map_err(|_| Error::Expression(format!("invalid number '{text}' in '{input}'")))?;
            tokens.push(Token::Num(value));
            continue;
        }

        if c.is_ascii_alphabetic() || c == '_' {
            let start = i;
            while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                i += 1;
            }
            tokens.push(Token::Ident(chars[start..i].iter().collect()));
            continue;
        }

        return Err(Error::Expression(format!("unexpected character '{c}' in '{input}'")));
    }

    Ok(tokens)
}

// ── Parser (recursive descent) ─────────────────────────────────

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    branches: Vec<String>,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn bump(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn column(&mut self, name: String) -> Node {
        let idx = match self.branches.iter().position(|b| *b == name) {
            Some(i) => i,
            None => {
                self.branches.push(name);
                self.branches.len() - 1
            }
        };
        Node::Column(idx)
    }

    fn parse_or(&mut self) -> Result<Node> {
        let mut lhs = self.parse_and()?;
        while self.eat(&Token::Or) {
            let rhs = self.parse_and()?;
            lhs = Node::Binary(BinOp::Or, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node> {
        let mut lhs = self.parse_cmp()?;
        while self.eat(&Token::And) {
            let rhs = self.parse_cmp()?;
            lhs = Node::Binary(BinOp::And, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_cmp(&mut self) -> Result<Node> {
        let lhs = self.parse_add()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinOp::Eq,
            Some(Token::Ne) => BinOp::Ne,
            Some(Token::Lt) => BinOp::Lt,
            Some(Token::Le) => BinOp::Le,
            Some(Token::Gt) => BinOp::Gt,
            Some(Token::Ge) => BinOp::Ge,
            _ => return Ok(lhs),
        };
        self.pos += 1;
        let rhs = self.parse_add()?;
        Ok(Node::Binary(op, Box::new(lhs), Box::new(rhs)))
    }

    fn parse_add(&mut self) -> Result<Node> {
        let mut lhs = self.parse_mul()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_mul()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_mul(&mut self) -> Result<Node> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(lhs),
            };
            self.pos += 1;
            let rhs = self.parse_unary()?;
            lhs = Node::Binary(op, Box::new(lhs), Box::new(rhs));
        }
    }

    fn parse_unary(&mut self) -> Result<Node> {
        if self.eat(&Token::Minus) {
            return Ok(Node::Neg(Box::new(self.parse_unary()?)));
        }
        if self.eat(&Token::Plus) {
            return self.parse_unary();
        }
        if self.eat(&Token::Not) {
            return Ok(Node::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_atom()
    }

    fn parse_atom(&mut self) -> Result<Node> {
        match self.bump() {
            Some(Token::Num(v)) => Ok(Node::Number(v)),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(Error::Expression(format!(
                        "expected ')', got {:?}",
                        self.peek()
                    )));
                }
                Ok(inner)
            }
            Some(Token::Ident(name)) if self.peek() == Some(&Token::LParen) => {
                self.pos += 1;
                let (func, arity) = Func::lookup(&name)
                    .ok_or_else(|| Error::Expression(format!("unknown function '{name}'")))?;
                let mut args = vec![self.parse_or()?];
                while self.eat(&Token::Comma) {
                    args.push(self.parse_or()?);
                }
                if !self.eat(&Token::RParen) {
                    return Err(Error::Expression(format!("unterminated call to '{name}'")));
                }
                if args.len() != arity {
                    return Err(Error::Expression(format!(
                        "'{name}' takes {arity} argument(s), got {}",
                        args.len()
                    )));
                }
                Ok(Node::Call(func, args))
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Node::Number(1.0)),
                "false" => Ok(Node::Number(0.0)),
                _ => Ok(self.column(name)),
            },
            other => Err(Error::Expression(format!(
                "expected number, identifier or '(', got {other:?}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn constant_arithmetic() {
        let e = CompiledExpr::compile("2 + 3 * 4").unwrap();
        assert!(e.is_constant());
        assert_relative_eq!(e.eval_row(&[]), 14.0);
    }

    #[test]
    fn trailing_dot_literal() {
        let e = CompiledExpr::compile("1.").unwrap();
        assert_relative_eq!(e.eval_row(&[]), 1.0);
    }

    #[test]
    fn branches_in_first_use_order() {
        let e = CompiledExpr::compile("genWeight * puWeight * genWeight").unwrap();
        assert_eq!(e.required_branches, vec!["genWeight", "puWeight"]);
        assert_relative_eq!(e.eval_row(&[2.0, 3.0]), 12.0);
    }

    #[test]
    fn range_and_threshold() {
        let e = CompiledExpr::compile("(pt >= 200) && (pt < 300) && (score >= 0.5)").unwrap();
        assert_relative_eq!(e.eval_row(&[250.0, 0.7]), 1.0);
        assert_relative_eq!(e.eval_row(&[300.0, 0.7]), 0.0);
        assert_relative_eq!(e.eval_row(&[250.0, 0.5]), 1.0);
        assert_relative_eq!(e.eval_row(&[250.0, 0.49]), 0.0);
    }

    #[test]
    fn or_not_and_functions() {
        let e = CompiledExpr::compile("!(abs(eta) > 2.4) || max(a, b) == 3").unwrap();
        assert_eq!(e.required_branches, vec!["eta", "a", "b"]);
        assert_relative_eq!(e.eval_row(&[-1.0, 0.0, 0.0]), 1.0);
        assert_relative_eq!(e.eval_row(&[3.0, 1.0, 3.0]), 1.0);
        assert_relative_eq!(e.eval_row(&[3.0, 1.0, 2.0]), 0.0);
    }

    #[test]
    fn column_wise_matches_row_wise() {
        let e = CompiledExpr::compile("pow(x, 2) - sqrt(y) / 2").unwrap();
        let x = [1.0, 2.0, 3.0];
        let y = [4.0, 16.0, 36.0];
        let bulk = e.eval_columns(&[&x, &y], 3).unwrap();
        for i in 0..3 {
            assert_relative_eq!(bulk[i], e.eval_row(&[x[i], y[i]]));
        }
    }

    #[test]
    fn eval_columns_checks_lengths() {
        let e = CompiledExpr::compile("x + y").unwrap();
        let x = [1.0, 2.0];
        let y = [1.0];
        assert!(e.eval_columns(&[&x, &y], 2).is_err());
        assert!(e.eval_columns(&[&x], 2).is_err());
    }

    #[test]
    fn scientific_notation() {
        let e = CompiledExpr::compile("1.5e2 + 3.0E-1").unwrap();
        assert_relative_eq!(e.eval_row(&[]), 150.3, epsilon = 1e-12);
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(CompiledExpr::compile("").is_err());
        assert!(CompiledExpr::compile("(x > 1").is_err());
        assert!(CompiledExpr::compile("x $ y").is_err());
        assert!(CompiledExpr::compile("frobnicate(x)").is_err());
        assert!(CompiledExpr::compile("pow(x)").is_err());
        assert!(CompiledExpr::compile("x y").is_err());
    }
}
