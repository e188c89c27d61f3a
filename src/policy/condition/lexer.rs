//! Tokenizer for condition expressions

use crate::error::ConditionError;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(f64),
    Str(String),
    Ident(String),
    True,
    False,
    Null,
    And,
    Or,
    Not,
    In,
    Contains,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    Eof,
}

/// A token and the byte offset it starts at
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub offset: usize,
}

/// Split a condition into tokens, always ending with `Token::Eof`
pub fn tokenize(input: &str) -> Result<Vec<Spanned>, ConditionError> {
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some(&(offset, c)) = chars.peek() {
        if c.is_whitespace() {
            chars.next();
            continue;
        }

        let token = match c {
            '(' => single(&mut chars, Token::LParen),
            ')' => single(&mut chars, Token::RParen),
            '[' => single(&mut chars, Token::LBracket),
            ']' => single(&mut chars, Token::RBracket),
            ',' => single(&mut chars, Token::Comma),
            '+' => single(&mut chars, Token::Plus),
            '-' => single(&mut chars, Token::Minus),
            '*' => single(&mut chars, Token::Star),
            '/' => single(&mut chars, Token::Slash),
            '%' => single(&mut chars, Token::Percent),
            '=' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '=') {
                    Some(_) => Token::EqEq,
                    None => {
                        return Err(ConditionError::syntax(
                            offset,
                            "unexpected '=', use '==' for equality",
                        ))
                    }
                }
            }
            '!' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '=') {
                    Some(_) => Token::NotEq,
                    None => Token::Not,
                }
            }
            '<' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '=') {
                    Some(_) => Token::Lte,
                    None => Token::Lt,
                }
            }
            '>' => {
                chars.next();
                match chars.next_if(|&(_, c)| c == '=') {
                    Some(_) => Token::Gte,
                    None => Token::Gt,
                }
            }
            '&' | '|' => {
                chars.next();
                match chars.next_if(|&(_, next)| next == c) {
                    Some(_) if c == '&' => Token::And,
                    Some(_) => Token::Or,
                    None => {
                        return Err(ConditionError::syntax(
                            offset,
                            format!("unexpected '{}', use '{}{}'", c, c, c),
                        ))
                    }
                }
            }
            '\'' | '"' => lex_string(&mut chars, offset, c)?,
            c if c.is_ascii_digit() => lex_number(input, &mut chars, offset)?,
            c if c.is_alphabetic() || c == '_' => lex_word(input, &mut chars, offset),
            other => {
                return Err(ConditionError::syntax(
                    offset,
                    format!("unexpected character '{}'", other),
                ))
            }
        };

        tokens.push(Spanned { token, offset });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        offset: input.len(),
    });
    Ok(tokens)
}

type Chars<'a> = std::iter::Peekable<std::str::CharIndices<'a>>;

fn single(chars: &mut Chars<'_>, token: Token) -> Token {
    chars.next();
    token
}

fn lex_string(chars: &mut Chars<'_>, start: usize, quote: char) -> Result<Token, ConditionError> {
    chars.next();
    let mut value = String::new();

    loop {
        match chars.next() {
            Some((_, '\\')) => match chars.next() {
                Some((_, 'n')) => value.push('\n'),
                Some((_, 't')) => value.push('\t'),
                Some((_, c)) => value.push(c),
                None => break,
            },
            Some((_, c)) if c == quote => return Ok(Token::Str(value)),
            Some((_, c)) => value.push(c),
            None => break,
        }
    }

    Err(ConditionError::syntax(start, "unterminated string literal"))
}

fn lex_number(input: &str, chars: &mut Chars<'_>, start: usize) -> Result<Token, ConditionError> {
    let mut end = start;
    let mut prev = '\0';

    while let Some(&(i, c)) = chars.peek() {
        let exponent_sign = (c == '+' || c == '-') && (prev == 'e' || prev == 'E');
        if c.is_ascii_digit() || c == '.' || c == '_' || c == 'e' || c == 'E' || exponent_sign {
            end = i + c.len_utf8();
            prev = c;
            chars.next();
        } else {
            break;
        }
    }

    let text: String = input[start..end].chars().filter(|&c| c != '_').collect();
    match text.parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(Token::Number(n)),
        Ok(_) => Err(ConditionError::syntax(
            start,
            format!("number '{}' is out of range", text),
        )),
        Err(_) => Err(ConditionError::syntax(
            start,
            format!("invalid number '{}'", text),
        )),
    }
}

fn lex_word(input: &str, chars: &mut Chars<'_>, start: usize) -> Token {
    let mut end = start;

    while let Some(&(i, c)) = chars.peek() {
        if c.is_alphanumeric() || c == '_' || c == '.' {
            end = i + c.len_utf8();
            chars.next();
        } else {
            break;
        }
    }

    let word = &input[start..end];
    match word {
        "true" => Token::True,
        "false" => Token::False,
        "nil" | "null" => Token::Null,
        "and" | "AND" => Token::And,
        "or" | "OR" => Token::Or,
        "not" | "NOT" => Token::Not,
        "in" | "IN" => Token::In,
        "contains" | "CONTAINS" => Token::Contains,
        _ => Token::Ident(word.to_string()),
    }
}
