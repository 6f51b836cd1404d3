//! Recursive-descent parser for `$filter`.
//!
//! ```text
//! expr     := and_expr ('or' and_expr)*
//! and_expr := unary ('and' unary)*
//! unary    := 'not' unary | primary
//! primary  := '(' expr ')' | ident '(' args ')' | ident op literal
//! ```
//!
//! `and` binds tighter than `or`; both fold left. Keywords, operators and
//! function names are case-insensitive.

use super::FilterError;
use super::lexer::{Token, TokenKind, tokenize};
use super::{Argument, ComparisonOp, FilterNode, Literal, LogicalOperator};

/// Parse `src`, bounding parenthesis / `not` nesting by `max_depth`.
pub(crate) fn parse(src: &str, max_depth: usize) -> Result<FilterNode, FilterError> {
    let tokens = tokenize(src)?;
    let mut parser = Parser {
        tokens,
        next: 0,
        end: src.len(),
        max_depth,
    };

    let node = parser.or_expr(0)?;
    if let Some(token) = parser.peek() {
        return Err(FilterError::syntax(token.pos, "unexpected token"));
    }
    Ok(node)
}

struct Parser {
    tokens: Vec<Token>,
    next: usize,
    end: usize,
    max_depth: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.next)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.next + offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.next).cloned();
        if token.is_some() {
            self.next += 1;
        }
        token
    }

    /// Position of the next token, or end of input.
    fn pos(&self) -> usize {
        self.peek().map_or(self.end, |t| t.pos)
    }

    fn at_keyword(&self, keyword: &str) -> bool {
        matches!(
            self.peek(),
            Some(Token { kind: TokenKind::Ident(s), .. }) if s.eq_ignore_ascii_case(keyword)
        )
    }

    fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<(), FilterError> {
        if self.peek().is_some_and(|t| t.kind == *kind) {
            self.next += 1;
            Ok(())
        } else {
            Err(FilterError::syntax(self.pos(), format!("expected {what}")))
        }
    }

    fn enter(&self, depth: usize) -> Result<usize, FilterError> {
        let depth = depth + 1;
        if depth > self.max_depth {
            return Err(FilterError::TooDeep {
                max: self.max_depth,
                actual: depth,
            });
        }
        Ok(depth)
    }

    fn or_expr(&mut self, depth: usize) -> Result<FilterNode, FilterError> {
        let mut left = self.and_expr(depth)?;
        while self.at_keyword("or") {
            self.next += 1;
            let right = self.and_expr(depth)?;
            left = FilterNode::Logical {
                operator: LogicalOperator::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn and_expr(&mut self, depth: usize) -> Result<FilterNode, FilterError> {
        let mut left = self.unary(depth)?;
        while self.at_keyword("and") {
            self.next += 1;
            let right = self.unary(depth)?;
            left = FilterNode::Logical {
                operator: LogicalOperator::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self, depth: usize) -> Result<FilterNode, FilterError> {
        // `not` followed by an operator is a column named "not"
        let is_not = self.at_keyword("not")
            && !matches!(
                self.peek_at(1),
                Some(Token { kind: TokenKind::Ident(s), .. }) if ComparisonOp::parse(s).is_some()
            );
        if is_not {
            self.next += 1;
            let depth = self.enter(depth)?;
            return Ok(FilterNode::Not(Box::new(self.unary(depth)?)));
        }
        self.primary(depth)
    }

    fn primary(&mut self, depth: usize) -> Result<FilterNode, FilterError> {
        let pos = self.pos();
        match self.bump() {
            Some(Token {
                kind: TokenKind::LParen,
                ..
            }) => {
                let depth = self.enter(depth)?;
                let node = self.or_expr(depth)?;
                self.expect(&TokenKind::RParen, "')'")?;
                Ok(node)
            },
            Some(Token {
                kind: TokenKind::Ident(name),
                ..
            }) => {
                if self.peek().is_some_and(|t| t.kind == TokenKind::LParen) {
                    self.next += 1;
                    let args = self.arguments()?;
                    return Ok(FilterNode::FunctionCall { name, args });
                }
                self.comparison(name)
            },
            Some(_) => Err(FilterError::syntax(pos, "expected a column or '('")),
            None => Err(FilterError::syntax(pos, "unexpected end of expression")),
        }
    }

    fn comparison(&mut self, column: String) -> Result<FilterNode, FilterError> {
        let pos = self.pos();
        let operator = match self.bump() {
            Some(Token {
                kind: TokenKind::Ident(op),
                ..
            }) => ComparisonOp::parse(&op).ok_or(FilterError::UnsupportedOperator(op))?,
            _ => return Err(FilterError::syntax(pos, "expected an operator")),
        };
        let literal = self.literal()?;
        Ok(FilterNode::Comparison {
            column,
            operator,
            literal,
        })
    }

    fn literal(&mut self) -> Result<Literal, FilterError> {
        let pos = self.pos();
        let literal = match self.bump().map(|t| t.kind) {
            Some(TokenKind::Str(s)) => Literal::String(s),
            Some(TokenKind::Int(n)) => Literal::Int(n),
            Some(TokenKind::Decimal(d)) => Literal::Decimal(d),
            Some(TokenKind::Ident(word)) if word.eq_ignore_ascii_case("true") => {
                Literal::Bool(true)
            },
            Some(TokenKind::Ident(word)) if word.eq_ignore_ascii_case("false") => {
                Literal::Bool(false)
            },
            Some(TokenKind::Ident(word)) if word.eq_ignore_ascii_case("null") => Literal::Null,
            _ => return Err(FilterError::syntax(pos, "expected a literal")),
        };
        Ok(literal)
    }

    /// Arguments after the opening parenthesis, through the closing one.
    fn arguments(&mut self) -> Result<Vec<Argument>, FilterError> {
        let mut args = Vec::new();
        if self.peek().is_some_and(|t| t.kind == TokenKind::RParen) {
            self.next += 1;
            return Ok(args);
        }
        loop {
            let column = match self.peek().map(|t| &t.kind) {
                Some(TokenKind::Ident(word))
                    if !["true", "false", "null"]
                        .iter()
                        .any(|kw| word.eq_ignore_ascii_case(kw)) =>
                {
                    Some(word.clone())
                },
                _ => None,
            };
            let arg = match column {
                Some(column) => {
                    self.next += 1;
                    Argument::Column(column)
                },
                None => Argument::Literal(self.literal()?),
            };
            args.push(arg);

            let pos = self.pos();
            match self.bump().map(|t| t.kind) {
                Some(TokenKind::Comma) => {},
                Some(TokenKind::RParen) => return Ok(args),
                _ => return Err(FilterError::syntax(pos, "expected ',' or ')'")),
            }
        }
    }
}
