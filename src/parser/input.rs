//! Character source for the lexer
//!
//! [`CharStream`] buffers one physical line at a time and hands out classified
//! characters ([`Symbol`]). Lines longer than [`MAX_LINE_LEN`] are split into
//! chunks, but the line counter still advances once per physical line so that
//! diagnostics point at the line the user sees.

use std::io::BufRead;

use super::ast::SourceLocation;
use super::lexer::LexError;

/// Longest chunk of a physical line kept in the buffer at once
pub const MAX_LINE_LEN: usize = 256;

/// Character classes the lexer's state machine dispatches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolClass {
    /// `A-Z`, `a-z` and `_`
    Letter,
    Digit,
    Whitespace,
    /// End of input; once reached every further read returns it again
    End,
    Other,
}

/// One classified input character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Symbol {
    pub class: SymbolClass,
    pub ch: char,
    pub location: SourceLocation,
}

impl Symbol {
    fn classify(ch: char) -> SymbolClass {
        match ch {
            'A'..='Z' | 'a'..='z' | '_' => SymbolClass::Letter,
            '0'..='9' => SymbolClass::Digit,
            c if c <= ' ' => SymbolClass::Whitespace,
            _ => SymbolClass::Other,
        }
    }
}

pub struct CharStream<R> {
    reader: R,
    /// Characters of the current chunk
    line: Vec<char>,
    position: usize,
    /// Rest of a physical line that did not fit into the current chunk
    overflow: Vec<char>,
    line_number: usize,
    column: usize,
    at_end: bool,
}

impl<R: BufRead> CharStream<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line: Vec::new(),
            position: 0,
            overflow: Vec::new(),
            line_number: 0,
            column: 0,
            at_end: false,
        }
    }

    /// 1-based number of the physical line currently being read
    pub fn line_number(&self) -> usize {
        self.line_number
    }

    /// Read and classify the next character.
    pub fn read_symbol(&mut self) -> Result<Symbol, LexError> {
        if self.position >= self.line.len() && !self.at_end {
            self.fill()?;
        }

        let location = SourceLocation::new(self.line_number.max(1), self.column + 1);
        match self.line.get(self.position).copied() {
            Some(ch) => {
                self.position += 1;
                self.column += 1;
                Ok(Symbol {
                    class: Symbol::classify(ch),
                    ch,
                    location,
                })
            }
            _ => Ok(Symbol {
                class: SymbolClass::End,
                ch: '\0',
                location,
            }),
        }
    }

    /// Load the next chunk, either the remainder of an over-long line or a
    /// fresh physical line.
    fn fill(&mut self) -> Result<(), LexError> {
        self.position = 0;

        if !self.overflow.is_empty() {
            let take = self.overflow.len().min(MAX_LINE_LEN);
            self.line = self.overflow.drain(..take).collect();
            return Ok(());
        }

        let mut raw = String::new();
        let read = self.reader.read_line(&mut raw).map_err(|err| LexError::Unreadable {
            message: err.to_string(),
            location: SourceLocation::new(self.line_number.max(1), self.column + 1),
        })?;

        if read == 0 {
            self.line.clear();
            self.at_end = true;
            return Ok(());
        }

        self.line_number += 1;
        self.column = 0;

        let mut chars: Vec<char> = raw.chars().collect();
        if chars.len() > MAX_LINE_LEN {
            self.overflow = chars.split_off(MAX_LINE_LEN);
        }
        self.line = chars;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(source: &str) -> Vec<Symbol> {
        let mut stream = CharStream::new(source.as_bytes());
        let mut out = Vec::new();
        loop {
            let sym = stream.read_symbol().unwrap();
            out.push(sym);
            if sym.class == SymbolClass::End {
                break;
            }
        }
        out
    }

    #[test]
    fn test_classification() {
        let symbols = drain("a_Z 9+");
        let classes: Vec<_> = symbols.iter().map(|s| s.class).collect();
        assert_eq!(
            classes,
            vec![
                SymbolClass::Letter,
                SymbolClass::Letter,
                SymbolClass::Letter,
                SymbolClass::Whitespace,
                SymbolClass::Digit,
                SymbolClass::Other,
                SymbolClass::End,
            ]
        );
    }

    #[test]
    fn test_end_is_permanent() {
        let mut stream = CharStream::new("x".as_bytes());
        assert_eq!(stream.read_symbol().unwrap().ch, 'x');
        for _ in 0..3 {
            assert_eq!(stream.read_symbol().unwrap().class, SymbolClass::End);
        }
    }

    #[test]
    fn test_line_numbers() {
        let symbols = drain("a\nb\n\nc");
        let c = symbols.iter().find(|s| s.ch == 'c').unwrap();
        assert_eq!(c.location.line, 4);
        assert_eq!(c.location.column, 1);
    }

    #[test]
    fn test_long_line_counts_once() {
        let long = "x".repeat(MAX_LINE_LEN * 2 + 10);
        let source = format!("{}\ny", long);
        let mut stream = CharStream::new(source.as_bytes());
        let mut last = None;
        loop {
            let sym = stream.read_symbol().unwrap();
            if sym.class == SymbolClass::End {
                break;
            }
            last = Some(sym);
        }
        let y = last.unwrap();
        assert_eq!(y.ch, 'y');
        assert_eq!(y.location.line, 2);
        assert_eq!(stream.line_number(), 2);
    }
}
