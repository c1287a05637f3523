//! Tokenizer for access expressions.
//!
//! Token types:
//! - **Ident**: context names, helper and method names (`claims`, `toList`)
//! - **Str** / **Int**: quoted string (single or double quotes) and integer literals
//! - keyword operators `and`, `or`, `not`, `in` and the literals `true`, `false`, `null`
//! - punctuation: `# . , ( ) [ ] { }` and the operators `! && || == != < <= > >=`

use std::fmt;

use super::ExpressionError;

/// A classified token with its byte offset in the source.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    True,
    False,
    Null,
    Hash,
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Not,
    And,
    Or,
    In,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(name) => write!(f, "identifier '{name}'"),
            Token::Str(s) => write!(f, "string '{s}'"),
            Token::Int(n) => write!(f, "integer {n}"),
            Token::True => write!(f, "true"),
            Token::False => write!(f, "false"),
            Token::Null => write!(f, "null"),
            Token::Hash => write!(f, "'#'"),
            Token::Dot => write!(f, "'.'"),
            Token::Comma => write!(f, "','"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::LBrace => write!(f, "'{{'"),
            Token::RBrace => write!(f, "'}}'"),
            Token::Not => write!(f, "'!'"),
            Token::And => write!(f, "'&&'"),
            Token::Or => write!(f, "'||'"),
            Token::In => write!(f, "'in'"),
            Token::Eq => write!(f, "'=='"),
            Token::Ne => write!(f, "'!='"),
            Token::Lt => write!(f, "'<'"),
            Token::Le => write!(f, "'<='"),
            Token::Gt => write!(f, "'>'"),
            Token::Ge => write!(f, "'>='"),
        }
    }
}

fn keyword(word: &str) -> Option<Token> {
    match word {
        "and" => Some(Token::And),
        "or" => Some(Token::Or),
        "not" => Some(Token::Not),
        "in" => Some(Token::In),
        "true" => Some(Token::True),
        "false" => Some(Token::False),
        "null" => Some(Token::Null),
        _ => None,
    }
}

/// Split an expression source into tokens.
pub fn tokenize(source: &str) -> Result<Vec<Spanned>, ExpressionError> {
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        let next = chars.get(i + 1).map(|&(_, c)| c);

        if ch.is_whitespace() {
            i += 1;
            continue;
        }

        let (token, width) = match (ch, next) {
            ('&', Some('&')) => (Token::And, 2),
            ('|', Some('|')) => (Token::Or, 2),
            ('=', Some('=')) => (Token::Eq, 2),
            ('!', Some('=')) => (Token::Ne, 2),
            ('<', Some('=')) => (Token::Le, 2),
            ('>', Some('=')) => (Token::Ge, 2),
            ('!', _) => (Token::Not, 1),
            ('<', _) => (Token::Lt, 1),
            ('>', _) => (Token::Gt, 1),
            ('#', _) => (Token::Hash, 1),
            ('.', _) => (Token::Dot, 1),
            (',', _) => (Token::Comma, 1),
            ('(', _) => (Token::LParen, 1),
            (')', _) => (Token::RParen, 1),
            ('[', _) => (Token::LBracket, 1),
            (']', _) => (Token::RBracket, 1),
            ('{', _) => (Token::LBrace, 1),
            ('}', _) => (Token::RBrace, 1),
            ('\'' | '"', _) => {
                let (literal, consumed) = read_string(&chars, i)?;
                tokens.push(Spanned {
                    token: Token::Str(literal),
                    offset,
                });
                i += consumed;
                continue;
            }
            (c, _) if c.is_ascii_digit() => {
                let end = scan(&chars, i, |c| c.is_ascii_digit());
                let digits: String = chars[i..end].iter().map(|&(_, c)| c).collect();
                let value = digits.parse().map_err(|_| ExpressionError::Parse {
                    offset,
                    message: format!("integer literal {digits} is out of range"),
                })?;
                tokens.push(Spanned {
                    token: Token::Int(value),
                    offset,
                });
                i = end;
                continue;
            }
            (c, _) if c.is_alphabetic() || c == '_' || c == '$' => {
                let end = scan(&chars, i, |c| c.is_alphanumeric() || c == '_' || c == '$');
                let word: String = chars[i..end].iter().map(|&(_, c)| c).collect();
                let token = keyword(&word).unwrap_or(Token::Ident(word));
                tokens.push(Spanned { token, offset });
                i = end;
                continue;
            }
            (c, _) => {
                return Err(ExpressionError::Parse {
                    offset,
                    message: format!("unexpected character '{c}'"),
                })
            }
        };

        tokens.push(Spanned { token, offset });
        i += width;
    }

    Ok(tokens)
}

/// Index one past the last char satisfying `accept`, starting at `start`.
fn scan(chars: &[(usize, char)], start: usize, accept: impl Fn(char) -> bool) -> usize {
    let mut end = start;
    while end < chars.len() && accept(chars[end].1) {
        end += 1;
    }
    end
}

/// Read a quoted literal starting at `start`. A doubled quote character
/// inside the literal stands for the quote itself, a backslash escapes the
/// following character.
fn read_string(chars: &[(usize, char)], start: usize) -> Result<(String, usize), ExpressionError> {
    let (offset, quote) = chars[start];
    let mut literal = String::new();
    let mut i = start + 1;

    while i < chars.len() {
        let ch = chars[i].1;
        if ch == '\\' {
            if let Some(&(_, escaped)) = chars.get(i + 1) {
                literal.push(escaped);
                i += 2;
                continue;
            }
        } else if ch == quote {
            if chars.get(i + 1).map(|&(_, c)| c) == Some(quote) {
                literal.push(quote);
                i += 2;
                continue;
            }
            return Ok((literal, i + 1 - start));
        } else {
            literal.push(ch);
        }
        i += 1;
    }

    Err(ExpressionError::Parse {
        offset,
        message: "unterminated string literal".to_string(),
    })
}
