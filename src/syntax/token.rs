use logos::{Lexer, Logos};

pub use logos::Span;

#[derive(thiserror::Error, Debug, PartialEq, Eq, Clone, Default)]
pub enum LexerError {
    #[default]
    #[error("invalid token encountered")]
    Invalid,
    #[error("integer literal out of range: {0}")]
    IntegerTooBig(Box<str>),
}

fn read_integer(lexer: &mut Lexer<Token>) -> Result<i64, LexerError> {
    lexer
        .slice()
        .parse()
        .map_err(|_| LexerError::IntegerTooBig(Box::from(lexer.slice())))
}

#[derive(Logos, Debug, Clone, PartialEq, Eq)]
#[logos(error = LexerError)]
#[logos(skip r"[ \t\r\n\f]+")]
#[logos(skip r";[^\n]*")]
pub enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("'")]
    Quote,
    #[regex(r"-?[0-9]+", read_integer, priority = 10)]
    Integer(i64),
    // Anything up to a delimiter; `.` is split out by the reader.
    #[regex(r#"[^\s()';"]+"#, |l| Box::from(l.slice()))]
    Symbol(Box<str>),
}

/// Returns `true` when every `(` in `source` has a matching `)`, so the text
/// can be handed to the reader without cutting a form in half.
///
/// Unbalanced closing parens count as complete: the reader reports them.
pub fn is_complete(source: &str) -> bool {
    let mut depth = 0usize;
    for token in Token::lexer(source) {
        match token {
            Ok(Token::LParen) => depth += 1,
            Ok(Token::RParen) => depth = depth.saturating_sub(1),
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use assert2::{check, let_assert};
    use logos::Logos;

    use super::{LexerError, Token, is_complete};

    #[test]
    fn integers_and_symbols() {
        let tokens: Vec<_> = Token::lexer("(+ 12 -3 - x1 12ab)").collect();
        check!(
            tokens
                == vec![
                    Ok(Token::LParen),
                    Ok(Token::Symbol("+".into())),
                    Ok(Token::Integer(12)),
                    Ok(Token::Integer(-3)),
                    Ok(Token::Symbol("-".into())),
                    Ok(Token::Symbol("x1".into())),
                    Ok(Token::Symbol("12ab".into())),
                    Ok(Token::RParen),
                ]
        );
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let tokens: Vec<_> = Token::lexer("; leading\n 'a ; trailing\n\t").collect();
        check!(tokens == vec![Ok(Token::Quote), Ok(Token::Symbol("a".into()))]);
    }

    #[test]
    fn oversized_integer_is_an_error() {
        let mut lexer = Token::lexer("99999999999999999999");
        let_assert!(Some(Err(LexerError::IntegerTooBig(_))) = lexer.next());
    }

    #[test]
    fn completeness_tracks_paren_depth() {
        check!(is_complete("(a (b c))"));
        check!(is_complete("x"));
        check!(is_complete(""));
        check!(!is_complete("(defun f (x)"));
        check!(!is_complete("(a ; )\n"));
        check!(is_complete("(a))"));
    }
}
