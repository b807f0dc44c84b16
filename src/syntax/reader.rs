use logos::{Lexer, Logos};

use crate::{
    runtime::{
        gc::{CellRef, GcHeap, HeapError},
        symbol_table::SymbolTable,
    },
    syntax::token::{LexerError, Span, Token},
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ReadError {
    #[error("{error} at {}..{}", .span.start, .span.end)]
    Lex { error: LexerError, span: Span },
    #[error("unexpected `)` at offset {0}")]
    UnbalancedClose(usize),
    #[error("unexpected end of input inside a list")]
    UnexpectedEof,
    #[error("misplaced `.` at offset {0}")]
    MisplacedDot(usize),
    #[error(transparent)]
    Heap(#[from] HeapError),
}

/// Streaming s-expression reader.
///
/// Each call to [`Reader::read`] consumes one complete form from the source
/// and materialises it as heap cells. `Ok(None)` means the input is exhausted,
/// which is distinct from reading `()` (the null reference).
pub struct Reader<'s> {
    lexer: Lexer<'s, Token>,
}

impl<'s> Reader<'s> {
    pub fn new(source: &'s str) -> Self {
        Self {
            lexer: Token::lexer(source),
        }
    }

    pub fn read(
        &mut self,
        heap: &mut GcHeap,
        symbols: &mut SymbolTable,
    ) -> Result<Option<CellRef>, ReadError> {
        match self.next_token()? {
            None => Ok(None),
            Some((token, span)) => self.read_form(token, span, heap, symbols).map(Some),
        }
    }

    /// Byte offset just past the last token consumed.
    pub fn offset(&self) -> usize {
        self.lexer.span().end
    }

    fn next_token(&mut self) -> Result<Option<(Token, Span)>, ReadError> {
        match self.lexer.next() {
            None => Ok(None),
            Some(Ok(token)) => Ok(Some((token, self.lexer.span()))),
            Some(Err(error)) => Err(ReadError::Lex {
                error,
                span: self.lexer.span(),
            }),
        }
    }

    fn expect_token(&mut self) -> Result<(Token, Span), ReadError> {
        self.next_token()?.ok_or(ReadError::UnexpectedEof)
    }

    fn read_form(
        &mut self,
        token: Token,
        span: Span,
        heap: &mut GcHeap,
        symbols: &mut SymbolTable,
    ) -> Result<CellRef, ReadError> {
        match token {
            Token::LParen => self.read_list(heap, symbols),
            Token::RParen => Err(ReadError::UnbalancedClose(span.start)),
            Token::Quote => {
                let (token, span) = self.expect_token()?;
                let quoted = self.read_form(token, span, heap, symbols)?;
                let quote = symbols.keywords().quote;
                let quote = symbols.intern_spur(heap, quote)?;
                Ok(heap.list(&[quote, quoted])?)
            }
            Token::Integer(value) => Ok(heap.integer(value)?),
            Token::Symbol(name) if &*name == "." => Err(ReadError::MisplacedDot(span.start)),
            Token::Symbol(name) => Ok(symbols.intern(heap, &name)?),
        }
    }

    fn read_list(
        &mut self,
        heap: &mut GcHeap,
        symbols: &mut SymbolTable,
    ) -> Result<CellRef, ReadError> {
        let mut items = Vec::new();
        let mut tail = CellRef::NULL;

        loop {
            let (token, span) = self.expect_token()?;
            match token {
                Token::RParen => break,
                Token::Symbol(name) if &*name == "." => {
                    if items.is_empty() {
                        return Err(ReadError::MisplacedDot(span.start));
                    }
                    let (token, tail_span) = self.expect_token()?;
                    tail = self.read_form(token, tail_span, heap, symbols)?;
                    match self.expect_token()? {
                        (Token::RParen, _) => break,
                        _ => return Err(ReadError::MisplacedDot(span.start)),
                    }
                }
                token => items.push(self.read_form(token, span, heap, symbols)?),
            }
        }

        Ok(heap.list_with_tail(&items, tail)?)
    }
}

/// Reads every form in `source`.
pub fn read_all(
    source: &str,
    heap: &mut GcHeap,
    symbols: &mut SymbolTable,
) -> Result<Vec<CellRef>, ReadError> {
    let mut reader = Reader::new(source);
    let mut forms = Vec::new();
    while let Some(form) = reader.read(heap, symbols)? {
        forms.push(form);
    }
    Ok(forms)
}
