//! Expression lexer

use super::error::{ExprError, ExprErrorKind, ExprResult};
use super::token::{Token, TokenKind};

/// Tokenize an expression string.
///
/// # Arguments
/// * `input` - Raw expression text (a directive argument or echo body)
///
/// # Returns
/// Token list in source order, or the first lexical error.
pub fn tokenize(input: &str) -> ExprResult<Vec<Token>> {
    let bytes = input.as_bytes();
    let mut tokens = Vec::new();
    let mut chars = input.char_indices().peekable();

    while let Some((offset, c)) = chars.next() {
        if c.is_whitespace() {
            continue;
        }

        let kind = match c {
            '(' => TokenKind::LParen,
            ')' => TokenKind::RParen,
            '[' => TokenKind::LBracket,
            ']' => TokenKind::RBracket,
            '{' => TokenKind::LBrace,
            '}' => TokenKind::RBrace,
            ',' => TokenKind::Comma,
            ':' => TokenKind::Colon,
            '?' => TokenKind::Question,
            '+' => TokenKind::Plus,
            '-' => TokenKind::Minus,
            '*' => TokenKind::Star,
            '/' => TokenKind::Slash,
            '%' => TokenKind::Percent,
            '.' => {
                if matches!(chars.peek(), Some((_, '.'))) {
                    chars.next();
                    TokenKind::DotDot
                } else {
                    TokenKind::Dot
                }
            }
            '|' => {
                if matches!(chars.peek(), Some((_, '|'))) {
                    chars.next();
                    TokenKind::OrOr
                } else {
                    TokenKind::Pipe
                }
            }
            '&' => {
                if matches!(chars.peek(), Some((_, '&'))) {
                    chars.next();
                    TokenKind::AndAnd
                } else {
                    return Err(ExprError::new(ExprErrorKind::UnexpectedChar('&'), offset));
                }
            }
            '=' => match chars.peek() {
                Some((_, '=')) => {
                    chars.next();
                    TokenKind::EqEq
                }
                Some((_, '>')) => {
                    chars.next();
                    TokenKind::FatArrow
                }
                _ => return Err(ExprError::new(ExprErrorKind::UnexpectedChar('='), offset)),
            },
            '!' => {
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    TokenKind::BangEq
                } else {
                    TokenKind::Bang
                }
            }
            '<' => {
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    TokenKind::Le
                } else {
                    TokenKind::Lt
                }
            }
            '>' => {
                if matches!(chars.peek(), Some((_, '='))) {
                    chars.next();
                    TokenKind::Ge
                } else {
                    TokenKind::Gt
                }
            }
            '\'' | '"' => {
                let quote = c;
                let mut text = String::new();
                let mut closed = false;
                while let Some((_, ch)) = chars.next() {
                    if ch == quote {
                        closed = true;
                        break;
                    }
                    if ch == '\\' {
                        match chars.next() {
                            Some((_, 'n')) => text.push('\n'),
                            Some((_, 't')) => text.push('\t'),
                            Some((_, escaped)) => text.push(escaped),
                            None => break,
                        }
                    } else {
                        text.push(ch);
                    }
                }
                if !closed {
                    return Err(ExprError::new(ExprErrorKind::UnterminatedString, offset));
                }
                TokenKind::Str(text)
            }
            '0'..='9' => {
                let mut end = offset + 1;
                while let Some((i, d)) = chars.peek().copied() {
                    if d.is_ascii_digit() {
                        chars.next();
                        end = i + 1;
                    } else {
                        break;
                    }
                }
                // A '.' continues into a float only when followed by a digit,
                // so range syntax `0..10` keeps its DotDot token.
                let mut is_float = false;
                if matches!(chars.peek(), Some((_, '.')))
                    && end + 1 < bytes.len()
                    && bytes[end + 1].is_ascii_digit()
                {
                    is_float = true;
                    chars.next();
                    end += 1;
                    while let Some((i, d)) = chars.peek().copied() {
                        if d.is_ascii_digit() {
                            chars.next();
                            end = i + 1;
                        } else {
                            break;
                        }
                    }
                }
                let text = &input[offset..end];
                if is_float {
                    match text.parse::<f64>() {
                        Ok(f) => TokenKind::Float(f),
                        Err(_) => {
                            return Err(ExprError::new(
                                ExprErrorKind::InvalidNumber(text.to_string()),
                                offset,
                            ))
                        }
                    }
                } else {
                    match text.parse::<i64>() {
                        Ok(i) => TokenKind::Int(i),
                        Err(_) => {
                            return Err(ExprError::new(
                                ExprErrorKind::InvalidNumber(text.to_string()),
                                offset,
                            ))
                        }
                    }
                }
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = offset + c.len_utf8();
                while let Some((i, ch)) = chars.peek().copied() {
                    if ch.is_alphanumeric() || ch == '_' {
                        chars.next();
                        end = i + ch.len_utf8();
                    } else {
                        break;
                    }
                }
                match &input[offset..end] {
                    "true" => TokenKind::True,
                    "false" => TokenKind::False,
                    "null" => TokenKind::Null,
                    "as" => TokenKind::As,
                    "in" => TokenKind::In,
                    name => TokenKind::Ident(name.to_string()),
                }
            }
            other => {
                return Err(ExprError::new(ExprErrorKind::UnexpectedChar(other), offset));
            }
        };

        tokens.push(Token::new(kind, offset));
    }

    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(input: &str) -> Vec<TokenKind> {
        tokenize(input)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    #[test]
    fn test_tokenize_literals() {
        assert_eq!(
            kinds("1 2.5 'a' \"b\" true false null"),
            vec![
                TokenKind::Int(1),
                TokenKind::Float(2.5),
                TokenKind::Str("a".to_string()),
                TokenKind::Str("b".to_string()),
                TokenKind::True,
                TokenKind::False,
                TokenKind::Null,
            ]
        );
    }

    #[test]
    fn test_tokenize_operators() {
        assert_eq!(
            kinds("+ - * / % == != <= >= < > && || ! ? :"),
            vec![
                TokenKind::Plus,
                TokenKind::Minus,
                TokenKind::Star,
                TokenKind::Slash,
                TokenKind::Percent,
                TokenKind::EqEq,
                TokenKind::BangEq,
                TokenKind::Le,
                TokenKind::Ge,
                TokenKind::Lt,
                TokenKind::Gt,
                TokenKind::AndAnd,
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Question,
                TokenKind::Colon,
            ]
        );
    }

    #[test]
    fn test_tokenize_range_vs_float() {
        assert_eq!(
            kinds("0..10"),
            vec![TokenKind::Int(0), TokenKind::DotDot, TokenKind::Int(10)]
        );
        assert_eq!(kinds("0.5"), vec![TokenKind::Float(0.5)]);
    }

    #[test]
    fn test_tokenize_member_access() {
        assert_eq!(
            kinds("user.name"),
            vec![
                TokenKind::Ident("user".to_string()),
                TokenKind::Dot,
                TokenKind::Ident("name".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_pipe_vs_or() {
        assert_eq!(
            kinds("a | b || c"),
            vec![
                TokenKind::Ident("a".to_string()),
                TokenKind::Pipe,
                TokenKind::Ident("b".to_string()),
                TokenKind::OrOr,
                TokenKind::Ident("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_fat_arrow_and_keywords() {
        assert_eq!(
            kinds("items as k => v"),
            vec![
                TokenKind::Ident("items".to_string()),
                TokenKind::As,
                TokenKind::Ident("k".to_string()),
                TokenKind::FatArrow,
                TokenKind::Ident("v".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "a\nb""#),
            vec![
                TokenKind::Str("it's".to_string()),
                TokenKind::Str("a\nb".to_string()),
            ]
        );
    }

    #[test]
    fn test_tokenize_unterminated_string() {
        let err = tokenize("'oops").unwrap_err();
        assert!(matches!(err.kind, ExprErrorKind::UnterminatedString));
        assert_eq!(err.offset, 0);
    }

    #[test]
    fn test_tokenize_unexpected_char() {
        let err = tokenize("a # b").unwrap_err();
        assert!(matches!(err.kind, ExprErrorKind::UnexpectedChar('#')));
    }

    #[test]
    fn test_single_equals_rejected() {
        let err = tokenize("a = b").unwrap_err();
        assert!(matches!(err.kind, ExprErrorKind::UnexpectedChar('=')));
    }

    #[test]
    fn test_offsets_are_byte_positions() {
        let tokens = tokenize("ab + cd").unwrap();
        assert_eq!(tokens[0].offset, 0);
        assert_eq!(tokens[1].offset, 3);
        assert_eq!(tokens[2].offset, 5);
    }
}
