//! Parser for access expressions.
//!
//! Converts a token stream (from [`super::tokenizer`]) into an AST ([`super::ast`]).
//!
//! ```text
//! expression = or
//! or         = and (('||' | 'or') and)*
//! and        = comparison (('&&' | 'and') comparison)*
//! comparison = unary (('==' | '!=' | '<' | '<=' | '>' | '>=' | 'in') unary)?
//! unary      = ('!' | 'not') unary | postfix
//! postfix    = primary ('.' ident ('(' args ')')? | '[' expression ']')*
//! primary    = literal | '#'? ident ('(' args ')')? | '(' expression ')'
//!            | '[' args ']' | '{' args '}'
//! args       = (expression (',' expression)*)?
//! ```

use super::ast::{BinaryOp, Expr, Literal};
use super::tokenizer::{tokenize, Spanned, Token};
use super::{ExpressionError, MAX_NESTING_DEPTH};

/// A token-stream parser.
struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
    depth: usize,
    source_len: usize,
}

impl Parser {
    fn new(tokens: Vec<Spanned>, source_len: usize) -> Self {
        Self {
            tokens,
            pos: 0,
            depth: 0,
            source_len,
        }
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|spanned| &spanned.token)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|spanned| spanned.token.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|spanned| spanned.offset)
            .unwrap_or(self.source_len)
    }

    fn error(&self, expected: &str) -> ExpressionError {
        let found = self
            .peek()
            .map(|token| token.to_string())
            .unwrap_or_else(|| "end of expression".to_string());
        ExpressionError::Parse {
            offset: self.offset(),
            message: format!("expected {expected}, found {found}"),
        }
    }

    fn expect(&mut self, token: Token) -> Result<(), ExpressionError> {
        if self.peek() == Some(&token) {
            self.pos += 1;
            Ok(())
        } else {
            Err(self.error(&token.to_string()))
        }
    }

    fn enter(&mut self) -> Result<(), ExpressionError> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            Err(ExpressionError::TooDeep(MAX_NESTING_DEPTH))
        } else {
            Ok(())
        }
    }

    fn leave(&mut self) {
        self.depth -= 1;
    }

    // --- Boolean operators ---

    fn parse_expression(&mut self) -> Result<Expr, ExpressionError> {
        self.enter()?;
        let expr = self.parse_or();
        self.leave();
        expr
    }

    fn parse_or(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_and()?;
            left = Expr::Binary(BinaryOp::Or, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_and(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.parse_comparison()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_comparison()?;
            left = Expr::Binary(BinaryOp::And, Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> Result<Expr, ExpressionError> {
        let left = self.parse_unary()?;
        let op = match self.peek() {
            Some(Token::Eq) => BinaryOp::Eq,
            Some(Token::Ne) => BinaryOp::Ne,
            Some(Token::Lt) => BinaryOp::Lt,
            Some(Token::Le) => BinaryOp::Le,
            Some(Token::Gt) => BinaryOp::Gt,
            Some(Token::Ge) => BinaryOp::Ge,
            Some(Token::In) => BinaryOp::In,
            _ => return Ok(left),
        };
        self.advance();
        let right = self.parse_unary()?;
        Ok(Expr::Binary(op, Box::new(left), Box::new(right)))
    }

    fn parse_unary(&mut self) -> Result<Expr, ExpressionError> {
        if self.peek() == Some(&Token::Not) {
            self.advance();
            self.enter()?;
            let operand = self.parse_unary();
            self.leave();
            return Ok(Expr::Not(Box::new(operand?)));
        }
        self.parse_postfix()
    }

    // --- Member access, indexing and method calls ---

    fn parse_postfix(&mut self) -> Result<Expr, ExpressionError> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::Dot) => {
                    self.advance();
                    let name = match self.advance() {
                        Some(Token::Ident(name)) => name,
                        _ => {
                            self.pos = self.pos.saturating_sub(1);
                            return Err(self.error("member name"));
                        }
                    };
                    if self.peek() == Some(&Token::LParen) {
                        let args = self.parse_arguments(Token::LParen, Token::RParen)?;
                        expr = Expr::MethodCall {
                            target: Box::new(expr),
                            method: name,
                            args,
                        };
                    } else {
                        expr = Expr::Member(Box::new(expr), name);
                    }
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let key = self.parse_expression()?;
                    self.expect(Token::RBracket)?;
                    expr = Expr::Index(Box::new(expr), Box::new(key));
                }
                _ => return Ok(expr),
            }
        }
    }

    // --- Primary terms ---

    fn parse_primary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek() {
            Some(Token::Str(_) | Token::Int(_) | Token::True | Token::False | Token::Null) => {
                let literal = match self.advance() {
                    Some(Token::Str(s)) => Literal::Str(s),
                    Some(Token::Int(n)) => Literal::Int(n),
                    Some(Token::True) => Literal::Bool(true),
                    Some(Token::False) => Literal::Bool(false),
                    _ => Literal::Null,
                };
                Ok(Expr::Literal(literal))
            }
            Some(Token::Hash) => {
                self.advance();
                match self.advance() {
                    Some(Token::Ident(function)) => self.parse_call(function),
                    _ => {
                        self.pos = self.pos.saturating_sub(1);
                        Err(self.error("function name after '#'"))
                    }
                }
            }
            Some(Token::Ident(_)) => match self.advance() {
                Some(Token::Ident(name)) if self.peek() == Some(&Token::LParen) => {
                    self.parse_call(name)
                }
                Some(Token::Ident(name)) => Ok(Expr::Variable(name)),
                _ => Err(self.error("identifier")),
            },
            Some(Token::LParen) => {
                self.advance();
                let inner = self.parse_expression()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::LBracket) => {
                let items = self.parse_arguments(Token::LBracket, Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Some(Token::LBrace) => {
                let items = self.parse_arguments(Token::LBrace, Token::RBrace)?;
                Ok(Expr::List(items))
            }
            _ => Err(self.error("a value")),
        }
    }

    fn parse_call(&mut self, function: String) -> Result<Expr, ExpressionError> {
        let args = self.parse_arguments(Token::LParen, Token::RParen)?;
        Ok(Expr::Call { function, args })
    }

    /// Parse `open (expression (',' expression)*)? close`.
    fn parse_arguments(&mut self, open: Token, close: Token) -> Result<Vec<Expr>, ExpressionError> {
        self.expect(open)?;
        let mut args = Vec::new();
        if self.peek() == Some(&close) {
            self.advance();
            return Ok(args);
        }
        loop {
            args.push(self.parse_expression()?);
            match self.peek() {
                Some(Token::Comma) => {
                    self.advance();
                }
                Some(token) if *token == close => {
                    self.advance();
                    return Ok(args);
                }
                _ => return Err(self.error(&format!("',' or {close}"))),
            }
        }
    }
}

/// Parse an expression source into an AST.
pub fn parse(source: &str) -> Result<Expr, ExpressionError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionError::Parse {
            offset: 0,
            message: "empty expression".to_string(),
        });
    }

    let mut parser = Parser::new(tokens, source.len());
    let expr = parser.parse_expression()?;
    if parser.peek().is_some() {
        return Err(parser.error("end of expression"));
    }
    Ok(expr)
}
