use crate::expression::EvalError;
use serde_json::Number;

#[derive(Debug, Clone, PartialEq)]
pub enum Token {
    Number(Number),
    Str(String),
    Ident(String),
    Punct(&'static str),
    Eof,
}

/// A token plus the byte offset where it starts.
#[derive(Debug, Clone, PartialEq)]
pub struct Spanned {
    pub token: Token,
    pub pos: usize,
}

// Longest first so `??` wins over `?` and `==` over `=`.
const PUNCTUATION: &[&str] = &[
    "?.", "??", "==", "!=", "<=", ">=", "&&", "||", "(", ")", "[", "]", "{", "}", ",", ":", ".",
    "?", "+", "-", "*", "/", "%", "!", "<", ">",
];

pub fn tokenize(source: &str) -> Result<Vec<Spanned>, EvalError> {
    let mut tokens = Vec::new();
    let bytes = source.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() {
        let c = bytes[pos];
        if c.is_ascii_whitespace() {
            pos += 1;
            continue;
        }

        let start = pos;
        let token = if c.is_ascii_digit() {
            let (number, end) = lex_number(source, pos)?;
            pos = end;
            Token::Number(number)
        } else if c == b'"' || c == b'\'' {
            let (text, end) = lex_string(source, pos)?;
            pos = end;
            Token::Str(text)
        } else if c.is_ascii_alphabetic() || c == b'_' || c == b'$' {
            let end = source[pos..]
                .find(|ch: char| !(ch.is_ascii_alphanumeric() || ch == '_' || ch == '$'))
                .map_or(source.len(), |offset| pos + offset);
            let ident = source[pos..end].to_string();
            pos = end;
            Token::Ident(ident)
        } else {
            let punct = PUNCTUATION
                .iter()
                .find(|p| source[pos..].starts_with(**p))
                .ok_or_else(|| EvalError::Syntax {
                    pos,
                    message: format!(
                        "unexpected character {:?}",
                        source[pos..].chars().next().unwrap_or_default()
                    ),
                })?;
            // `?.5` is a ternary followed by a number, not optional chaining.
            if *punct == "?." && bytes.get(pos + 2).is_some_and(u8::is_ascii_digit) {
                pos += 1;
                Token::Punct("?")
            } else {
                pos += punct.len();
                Token::Punct(punct)
            }
        };
        tokens.push(Spanned { token, pos: start });
    }

    tokens.push(Spanned {
        token: Token::Eof,
        pos: source.len(),
    });
    Ok(tokens)
}

fn lex_number(source: &str, start: usize) -> Result<(Number, usize), EvalError> {
    let bytes = source.as_bytes();
    let mut end = start;
    let mut is_float = false;

    while end < bytes.len() && (bytes[end].is_ascii_digit() || bytes[end] == b'_') {
        end += 1;
    }
    if end + 1 < bytes.len() && bytes[end] == b'.' && bytes[end + 1].is_ascii_digit() {
        is_float = true;
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
        }
    }
    if end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut exp_end = end + 1;
        if exp_end < bytes.len() && (bytes[exp_end] == b'+' || bytes[exp_end] == b'-') {
            exp_end += 1;
        }
        if exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
            is_float = true;
            end = exp_end;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
    }

    let text: String = source[start..end].chars().filter(|c| *c != '_').collect();
    let invalid = |_| EvalError::Syntax {
        pos: start,
        message: format!("invalid number literal {:?}", &source[start..end]),
    };

    let number = if is_float {
        let value: f64 = text.parse().map_err(|e: std::num::ParseFloatError| invalid(e.to_string()))?;
        Number::from_f64(value).ok_or_else(|| invalid("not finite".to_string()))?
    } else {
        match text.parse::<i64>() {
            Ok(value) => Number::from(value),
            Err(_) => {
                let value: f64 = text
                    .parse()
                    .map_err(|e: std::num::ParseFloatError| invalid(e.to_string()))?;
                Number::from_f64(value).ok_or_else(|| invalid("not finite".to_string()))?
            }
        }
    };
    Ok((number, end))
}

fn lex_string(source: &str, start: usize) -> Result<(String, usize), EvalError> {
    let mut chars = source[start..].char_indices();
    let (_, quote) = chars.next().unwrap_or((0, '"'));
    let mut text = String::new();

    while let Some((offset, ch)) = chars.next() {
        match ch {
            c if c == quote => return Ok((text, start + offset + 1)),
            '\\' => {
                let (escape_offset, escaped) = chars.next().ok_or_else(|| EvalError::Syntax {
                    pos: start + offset,
                    message: "unterminated escape sequence".to_string(),
                })?;
                match escaped {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    'r' => text.push('\r'),
                    '0' => text.push('\0'),
                    '\\' | '"' | '\'' | '/' => text.push(escaped),
                    'u' => {
                        let hex: String = chars.by_ref().take(4).map(|(_, c)| c).collect();
                        let decoded = u32::from_str_radix(&hex, 16)
                            .ok()
                            .filter(|_| hex.len() == 4)
                            .and_then(char::from_u32)
                            .ok_or_else(|| EvalError::Syntax {
                                pos: start + escape_offset,
                                message: format!("invalid unicode escape \\u{hex}"),
                            })?;
                        text.push(decoded);
                    }
                    other => {
                        return Err(EvalError::Syntax {
                            pos: start + escape_offset,
                            message: format!("unknown escape sequence \\{other}"),
                        });
                    }
                }
            }
            c => text.push(c),
        }
    }

    Err(EvalError::Syntax {
        pos: start,
        message: "unterminated string literal".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(source: &str) -> Vec<Token> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|spanned| spanned.token)
            .collect()
    }

    #[test]
    fn tokenizes_concatenation() {
        assert_eq!(
            kinds(r#""http://h/p?queue=" + input.queue"#),
            vec![
                Token::Str("http://h/p?queue=".to_string()),
                Token::Punct("+"),
                Token::Ident("input".to_string()),
                Token::Punct("."),
                Token::Ident("queue".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn numbers_keep_integer_and_float_shapes() {
        assert_eq!(
            kinds("1_000 2.5 3e2"),
            vec![
                Token::Number(Number::from(1000)),
                Token::Number(Number::from_f64(2.5).unwrap()),
                Token::Number(Number::from_f64(300.0).unwrap()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn member_access_after_number_is_not_a_decimal() {
        assert_eq!(
            kinds("a[0].b"),
            vec![
                Token::Ident("a".to_string()),
                Token::Punct("["),
                Token::Number(Number::from(0)),
                Token::Punct("]"),
                Token::Punct("."),
                Token::Ident("b".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            kinds(r#"'it\'s' "tab\there" "é""#),
            vec![
                Token::Str("it's".to_string()),
                Token::Str("tab\there".to_string()),
                Token::Str("é".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn longest_punctuation_wins() {
        assert_eq!(
            kinds("a ?? b ?. c ? d"),
            vec![
                Token::Ident("a".to_string()),
                Token::Punct("??"),
                Token::Ident("b".to_string()),
                Token::Punct("?."),
                Token::Ident("c".to_string()),
                Token::Punct("?"),
                Token::Ident("d".to_string()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_string_is_a_syntax_error() {
        assert!(matches!(
            tokenize(r#""open"#),
            Err(EvalError::Syntax { pos: 0, .. })
        ));
    }

    #[test]
    fn stray_character_reports_position() {
        assert!(matches!(
            tokenize("input # 1"),
            Err(EvalError::Syntax { pos: 6, .. })
        ));
    }
}
