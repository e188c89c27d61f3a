//! Condition expression parser
//!
//! Parses expressions like:
//! - `age >= 18`
//! - `country in ['BR', 'AR'] && not has_default`
//! - `current_debt / annual_revenue < 0.5 or owner_credit_score > 700`
//!
//! Precedence, loosest first: `or`, `and`, comparisons, `+ -`, `* / %`,
//! unary `not`/`-`.

use super::ast::{ArithOp, CompareOp, Expression, Literal};
use super::lexer::{tokenize, Spanned, Token};
use crate::error::ConditionError;

/// Deepest expression tree the parser will build. Parentheses count as a
/// level even though they add no node.
const MAX_DEPTH: usize = 128;

/// Parse a condition expression string into an AST
pub fn parse(input: &str) -> Result<Expression, ConditionError> {
    let tokens = tokenize(input)?;
    let mut parser = Parser {
        tokens,
        pos: 0,
        nesting: 0,
    };

    if parser.peek() == &Token::Eof {
        return Err(ConditionError::syntax(0, "empty condition"));
    }

    let (expr, _) = parser.parse_or()?;
    match parser.peek() {
        Token::Eof => Ok(expr),
        other => Err(ConditionError::syntax(
            parser.offset(),
            format!("unexpected {:?} after expression", other),
        )),
    }
}

/// An expression and the height of its tree
type Parsed = (Expression, usize);

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    /// Open parentheses, lists and unary operators around the current token
    nesting: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        &self.tokens[self.pos].token
    }

    fn peek_next(&self) -> &Token {
        let idx = (self.pos + 1).min(self.tokens.len() - 1);
        &self.tokens[idx].token
    }

    fn offset(&self) -> usize {
        self.tokens[self.pos].offset
    }

    fn advance(&mut self) -> Token {
        let token = self.tokens[self.pos].token.clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ConditionError> {
        if self.peek() == &expected {
            self.advance();
            Ok(())
        } else {
            Err(ConditionError::syntax(
                self.offset(),
                format!("expected {:?}, found {:?}", expected, self.peek()),
            ))
        }
    }

    fn too_deep(&self) -> ConditionError {
        ConditionError::syntax(self.offset(), "expression nested too deeply")
    }

    /// Height of a node built over children of the given heights
    fn height(&self, children: usize) -> Result<usize, ConditionError> {
        if children >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        Ok(children + 1)
    }

    /// Parse a nested sub-expression, refusing to recurse past `MAX_DEPTH`
    fn nested<F>(&mut self, parse: F) -> Result<Parsed, ConditionError>
    where
        F: FnOnce(&mut Self) -> Result<Parsed, ConditionError>,
    {
        if self.nesting >= MAX_DEPTH {
            return Err(self.too_deep());
        }
        self.nesting += 1;
        let parsed = parse(self);
        self.nesting -= 1;
        parsed
    }

    fn parse_or(&mut self) -> Result<Parsed, ConditionError> {
        let (mut left, mut height) = self.parse_and()?;
        while self.peek() == &Token::Or {
            self.advance();
            let (right, right_height) = self.parse_and()?;
            height = self.height(height.max(right_height))?;
            left = Expression::Or(Box::new(left), Box::new(right));
        }
        Ok((left, height))
    }

    fn parse_and(&mut self) -> Result<Parsed, ConditionError> {
        let (mut left, mut height) = self.parse_comparison()?;
        while self.peek() == &Token::And {
            self.advance();
            let (right, right_height) = self.parse_comparison()?;
            height = self.height(height.max(right_height))?;
            left = Expression::And(Box::new(left), Box::new(right));
        }
        Ok((left, height))
    }

    fn parse_comparison(&mut self) -> Result<Parsed, ConditionError> {
        let (mut left, mut height) = self.parse_additive()?;

        while let Some(op) = self.compare_op() {
            let (right, right_height) = self.parse_additive()?;
            height = self.height(height.max(right_height))?;
            left = Expression::compare(left, op, right);
        }

        Ok((left, height))
    }

    /// Consume a comparison operator if one is next
    fn compare_op(&mut self) -> Option<CompareOp> {
        let op = match self.peek() {
            Token::EqEq => CompareOp::Eq,
            Token::NotEq => CompareOp::NotEq,
            Token::Lt => CompareOp::Lt,
            Token::Lte => CompareOp::Lte,
            Token::Gt => CompareOp::Gt,
            Token::Gte => CompareOp::Gte,
            Token::In => CompareOp::In,
            Token::Contains => CompareOp::Contains,
            Token::Not if self.peek_next() == &Token::In => {
                self.advance();
                CompareOp::NotIn
            }
            _ => return None,
        };
        self.advance();
        Some(op)
    }

    fn parse_additive(&mut self) -> Result<Parsed, ConditionError> {
        let (mut left, mut height) = self.parse_multiplicative()?;
        loop {
            let op = match self.peek() {
                Token::Plus => ArithOp::Add,
                Token::Minus => ArithOp::Sub,
                _ => break,
            };
            self.advance();
            let (right, right_height) = self.parse_multiplicative()?;
            height = self.height(height.max(right_height))?;
            left = Expression::arithmetic(left, op, right);
        }
        Ok((left, height))
    }

    fn parse_multiplicative(&mut self) -> Result<Parsed, ConditionError> {
        let (mut left, mut height) = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Token::Star => ArithOp::Mul,
                Token::Slash => ArithOp::Div,
                Token::Percent => ArithOp::Rem,
                _ => break,
            };
            self.advance();
            let (right, right_height) = self.parse_unary()?;
            height = self.height(height.max(right_height))?;
            left = Expression::arithmetic(left, op, right);
        }
        Ok((left, height))
    }

    fn parse_unary(&mut self) -> Result<Parsed, ConditionError> {
        match self.peek() {
            Token::Not => {
                self.advance();
                let (inner, height) = self.nested(Self::parse_unary)?;
                Ok((Expression::Not(Box::new(inner)), self.height(height)?))
            }
            Token::Minus => {
                self.advance();
                let (inner, height) = self.nested(Self::parse_unary)?;
                Ok((Expression::Negate(Box::new(inner)), self.height(height)?))
            }
            _ => self.parse_primary(),
        }
    }

    fn parse_primary(&mut self) -> Result<Parsed, ConditionError> {
        let offset = self.offset();
        let literal = match self.advance() {
            Token::Number(n) => Expression::Literal(Literal::Number(n)),
            Token::Str(s) => Expression::Literal(Literal::String(s)),
            Token::True => Expression::Literal(Literal::Boolean(true)),
            Token::False => Expression::Literal(Literal::Boolean(false)),
            Token::Null => Expression::Literal(Literal::Null),
            Token::Ident(name) => Expression::Field(name),
            Token::LParen => {
                let (inner, height) = self.nested(Self::parse_or)?;
                self.expect(Token::RParen)?;
                return Ok((inner, self.height(height)?));
            }
            Token::LBracket => return self.nested(Self::parse_list),
            Token::Eof => {
                return Err(ConditionError::syntax(offset, "unexpected end of condition"))
            }
            other => {
                return Err(ConditionError::syntax(
                    offset,
                    format!("unexpected {:?}", other),
                ))
            }
        };
        Ok((literal, 1))
    }

    fn parse_list(&mut self) -> Result<Parsed, ConditionError> {
        let mut items = Vec::new();
        let mut height = 0;
        if self.peek() == &Token::RBracket {
            self.advance();
            return Ok((Expression::List(items), 1));
        }

        loop {
            let (item, item_height) = self.parse_or()?;
            height = height.max(item_height);
            items.push(item);
            match self.advance() {
                Token::Comma => continue,
                Token::RBracket => break,
                other => {
                    return Err(ConditionError::syntax(
                        self.offset(),
                        format!("expected ',' or ']' in list, found {:?}", other),
                    ))
                }
            }
        }

        Ok((Expression::List(items), self.height(height)?))
    }
}
