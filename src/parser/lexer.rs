//! Lexer (tokenizer) for Mila source code
//!
//! A hand-written state machine over the classified characters of a
//! [`CharStream`]. Tokens are produced on demand; the parser may hand tokens
//! back with [`Lexer::return_token`] to re-read them later, which is how the
//! grammar's few two-token ambiguities are resolved.
//!
//! Integer literals come in four forms: decimal (`42`), octal (`&17` or a
//! leading zero, `017`), hexadecimal (`$1F` or `0x1F`), and the lone `0`.

use std::fmt;
use std::io::BufRead;

use log::trace;
use thiserror::Error;

use super::ast::SourceLocation;
use super::input::{CharStream, Symbol, SymbolClass};

/// Identifiers longer than this are rejected
pub const MAX_IDENT_LEN: usize = 32;

/// Token kinds produced by the lexer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    Ident,
    Numb,

    // Operators
    Plus,
    Minus,
    Times,
    Div,
    Mod,
    Eq,
    Neq,
    Lt,
    Gt,
    Lte,
    Gte,

    // Punctuation
    LPar,
    RPar,
    Assign,
    Comma,
    Semicolon,
    Dot,
    Colon,
    LBr,
    RBr,
    Apostrophe,

    // Reserved words
    Var,
    Const,
    Begin,
    End,
    If,
    Then,
    Else,
    And,
    Or,
    Not,
    Break,
    While,
    Do,
    For,
    To,
    Downto,
    Of,
    Program,
    Function,
    Procedure,
    Forward,

    /// End of input
    Eoi,
}

const KEYWORDS: &[(&str, TokenKind)] = &[
    ("var", TokenKind::Var),
    ("const", TokenKind::Const),
    ("begin", TokenKind::Begin),
    ("end", TokenKind::End),
    ("div", TokenKind::Div),
    ("mod", TokenKind::Mod),
    ("if", TokenKind::If),
    ("then", TokenKind::Then),
    ("else", TokenKind::Else),
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("not", TokenKind::Not),
    ("break", TokenKind::Break),
    ("while", TokenKind::While),
    ("do", TokenKind::Do),
    ("for", TokenKind::For),
    ("to", TokenKind::To),
    ("downto", TokenKind::Downto),
    ("of", TokenKind::Of),
    ("program", TokenKind::Program),
    ("function", TokenKind::Function),
    ("procedure", TokenKind::Procedure),
    ("forward", TokenKind::Forward),
];

impl TokenKind {
    /// Reserved word lookup; anything else is an identifier.
    pub fn keyword(ident: &str) -> TokenKind {
        KEYWORDS
            .iter()
            .find(|(word, _)| *word == ident)
            .map(|(_, kind)| *kind)
            .unwrap_or(TokenKind::Ident)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TokenKind::Ident => "identifier",
            TokenKind::Numb => "number",
            TokenKind::Plus => "'+'",
            TokenKind::Minus => "'-'",
            TokenKind::Times => "'*'",
            TokenKind::Div => "'div'",
            TokenKind::Mod => "'mod'",
            TokenKind::Eq => "'='",
            TokenKind::Neq => "'<>'",
            TokenKind::Lt => "'<'",
            TokenKind::Gt => "'>'",
            TokenKind::Lte => "'<='",
            TokenKind::Gte => "'>='",
            TokenKind::LPar => "'('",
            TokenKind::RPar => "')'",
            TokenKind::Assign => "':='",
            TokenKind::Comma => "','",
            TokenKind::Semicolon => "';'",
            TokenKind::Dot => "'.'",
            TokenKind::Colon => "':'",
            TokenKind::LBr => "'['",
            TokenKind::RBr => "']'",
            TokenKind::Apostrophe => "'''",
            TokenKind::Var => "'var'",
            TokenKind::Const => "'const'",
            TokenKind::Begin => "'begin'",
            TokenKind::End => "'end'",
            TokenKind::If => "'if'",
            TokenKind::Then => "'then'",
            TokenKind::Else => "'else'",
            TokenKind::And => "'and'",
            TokenKind::Or => "'or'",
            TokenKind::Not => "'not'",
            TokenKind::Break => "'break'",
            TokenKind::While => "'while'",
            TokenKind::Do => "'do'",
            TokenKind::For => "'for'",
            TokenKind::To => "'to'",
            TokenKind::Downto => "'downto'",
            TokenKind::Of => "'of'",
            TokenKind::Program => "'program'",
            TokenKind::Function => "'function'",
            TokenKind::Procedure => "'procedure'",
            TokenKind::Forward => "'forward'",
            TokenKind::Eoi => "end of input",
        };
        f.write_str(text)
    }
}

/// A lexical unit. `text` is set for identifiers, `value` for numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub value: i32,
    pub location: SourceLocation,
}

impl Token {
    pub fn new(kind: TokenKind, location: SourceLocation) -> Self {
        Token {
            kind,
            text: String::new(),
            value: 0,
            location,
        }
    }

    pub fn ident(text: impl Into<String>, location: SourceLocation) -> Self {
        Token {
            kind: TokenKind::Ident,
            text: text.into(),
            value: 0,
            location,
        }
    }

    pub fn number(value: i32, location: SourceLocation) -> Self {
        Token {
            kind: TokenKind::Numb,
            text: String::new(),
            value,
            location,
        }
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Ident => write!(f, "identifier '{}'", self.text),
            TokenKind::Numb => write!(f, "number {}", self.value),
            kind => write!(f, "{}", kind),
        }
    }
}

/// Lexer error type
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LexError {
    #[error("Invalid octal number")]
    InvalidOctal { location: SourceLocation },
    #[error("Invalid hexadecimal number")]
    InvalidHex { location: SourceLocation },
    #[error("Unterminated comment")]
    UnterminatedComment { location: SourceLocation },
    #[error("String not terminated")]
    UnterminatedString { location: SourceLocation },
    #[error("Invalid symbol '{ch}'")]
    InvalidSymbol { ch: char, location: SourceLocation },
    #[error("Identifier longer than {MAX_IDENT_LEN} characters")]
    IdentifierTooLong { location: SourceLocation },
    #[error("Cannot read from input: {message}")]
    Unreadable {
        message: String,
        location: SourceLocation,
    },
}

impl LexError {
    pub fn location(&self) -> SourceLocation {
        match self {
            LexError::InvalidOctal { location }
            | LexError::InvalidHex { location }
            | LexError::UnterminatedComment { location }
            | LexError::UnterminatedString { location }
            | LexError::InvalidSymbol { location, .. }
            | LexError::IdentifierTooLong { location }
            | LexError::Unreadable { location, .. } => *location,
        }
    }
}

/// DFA states of [`Lexer::next_token`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    Comment,
    Ident,
    Decimal,
    /// Seen a leading `0`: zero, octal or `0x` hex follows
    Zero,
    Octal,
    Hex,
    Less,
    Greater,
    Colon,
}

pub struct Lexer<R> {
    input: CharStream<R>,
    /// Symbol read ahead while deciding where the previous token ended
    carry: Option<Symbol>,
    /// Tokens handed back by the parser, returned before scanning resumes
    pushback: Vec<Token>,
}

impl<'a> Lexer<&'a [u8]> {
    /// Create a lexer over an in-memory source string.
    pub fn from_source(source: &'a str) -> Self {
        Lexer::new(source.as_bytes())
    }
}

impl<R: BufRead> Lexer<R> {
    pub fn new(reader: R) -> Self {
        Self {
            input: CharStream::new(reader),
            carry: None,
            pushback: Vec::new(),
        }
    }

    /// Hand a token back; the next [`Lexer::next_token`] returns it.
    pub fn return_token(&mut self, token: Token) {
        self.pushback.push(token);
    }

    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(token) = self.pushback.pop() {
            return Ok(token);
        }
        let token = self.scan()?;
        trace!(
            "{}:{}: {}",
            token.location.line,
            token.location.column,
            token
        );
        Ok(token)
    }

    /// Collect raw characters up to (not including) the next `'`. The
    /// closing quote is left to be lexed as an apostrophe token.
    pub fn read_string(&mut self) -> Result<String, LexError> {
        let mut text = String::new();
        let mut sym = self.advance()?;
        let start = sym.location;
        loop {
            if sym.class == SymbolClass::End {
                return Err(LexError::UnterminatedString { location: start });
            }
            if sym.ch == '\'' {
                break;
            }
            text.push(sym.ch);
            sym = self.input.read_symbol()?;
        }
        self.carry = Some(sym);
        Ok(text)
    }

    fn advance(&mut self) -> Result<Symbol, LexError> {
        match self.carry.take() {
            Some(sym) => Ok(sym),
            None => self.input.read_symbol(),
        }
    }

    fn scan(&mut self) -> Result<Token, LexError> {
        let mut state = State::Start;
        let mut start = SourceLocation::default();
        let mut comment_start = SourceLocation::default();
        let mut text = String::new();
        let mut value: i32 = 0;
        let mut digits = 0usize;

        loop {
            let sym = match state {
                State::Start => self.advance()?,
                _ => self.input.read_symbol()?,
            };

            match state {
                State::Start => {
                    start = sym.location;
                    let single = match sym.ch {
                        '+' => Some(TokenKind::Plus),
                        '-' => Some(TokenKind::Minus),
                        '*' => Some(TokenKind::Times),
                        '(' => Some(TokenKind::LPar),
                        ')' => Some(TokenKind::RPar),
                        '=' => Some(TokenKind::Eq),
                        ',' => Some(TokenKind::Comma),
                        ';' => Some(TokenKind::Semicolon),
                        '.' => Some(TokenKind::Dot),
                        '[' => Some(TokenKind::LBr),
                        ']' => Some(TokenKind::RBr),
                        '\'' => Some(TokenKind::Apostrophe),
                        _ => None,
                    };
                    if let Some(kind) = single {
                        return Ok(Token::new(kind, start));
                    }

                    match (sym.ch, sym.class) {
                        (_, SymbolClass::End) => return Ok(Token::new(TokenKind::Eoi, start)),
                        ('{', _) => {
                            comment_start = start;
                            state = State::Comment;
                        }
                        ('<', _) => state = State::Less,
                        ('>', _) => state = State::Greater,
                        (':', _) => state = State::Colon,
                        ('$', _) => {
                            value = 0;
                            digits = 0;
                            state = State::Hex;
                        }
                        ('&', _) => {
                            value = 0;
                            digits = 0;
                            state = State::Octal;
                        }
                        (_, SymbolClass::Whitespace) => {}
                        (ch, SymbolClass::Letter) => {
                            text.push(ch);
                            state = State::Ident;
                        }
                        ('0', SymbolClass::Digit) => {
                            value = 0;
                            state = State::Zero;
                        }
                        (ch, SymbolClass::Digit) => {
                            value = digit_value(ch);
                            state = State::Decimal;
                        }
                        (ch, _) => {
                            return Err(LexError::InvalidSymbol { ch, location: start });
                        }
                    }
                }

                State::Comment => match sym.class {
                    SymbolClass::End => {
                        return Err(LexError::UnterminatedComment {
                            location: comment_start,
                        })
                    }
                    _ if sym.ch == '}' => state = State::Start,
                    _ => {}
                },

                State::Ident => match sym.class {
                    SymbolClass::Letter | SymbolClass::Digit => {
                        if text.len() >= MAX_IDENT_LEN {
                            return Err(LexError::IdentifierTooLong { location: start });
                        }
                        text.push(sym.ch);
                    }
                    _ => {
                        self.carry = Some(sym);
                        return Ok(match TokenKind::keyword(&text) {
                            TokenKind::Ident => Token::ident(text, start),
                            kind => Token::new(kind, start),
                        });
                    }
                },

                State::Decimal => match sym.class {
                    SymbolClass::Digit => {
                        value = value.wrapping_mul(10).wrapping_add(digit_value(sym.ch));
                    }
                    _ => {
                        self.carry = Some(sym);
                        return Ok(Token::number(value, start));
                    }
                },

                State::Zero => match sym.class {
                    SymbolClass::Digit => {
                        if !is_octal_digit(sym.ch) {
                            return Err(LexError::InvalidOctal { location: start });
                        }
                        value = digit_value(sym.ch);
                        digits = 1;
                        state = State::Octal;
                    }
                    SymbolClass::Letter => {
                        if sym.ch != 'x' && sym.ch != 'X' {
                            return Err(LexError::InvalidHex { location: start });
                        }
                        digits = 0;
                        state = State::Hex;
                    }
                    _ => {
                        self.carry = Some(sym);
                        return Ok(Token::number(0, start));
                    }
                },

                State::Octal => match sym.class {
                    SymbolClass::Digit if is_octal_digit(sym.ch) => {
                        value = value.wrapping_mul(8).wrapping_add(digit_value(sym.ch));
                        digits += 1;
                    }
                    SymbolClass::Digit | SymbolClass::Letter => {
                        return Err(LexError::InvalidOctal { location: start });
                    }
                    _ => {
                        if digits == 0 {
                            return Err(LexError::InvalidOctal { location: start });
                        }
                        self.carry = Some(sym);
                        return Ok(Token::number(value, start));
                    }
                },

                State::Hex => match sym.ch.to_digit(16) {
                    Some(d) if matches!(sym.class, SymbolClass::Digit | SymbolClass::Letter) => {
                        value = value.wrapping_mul(16).wrapping_add(d as i32);
                        digits += 1;
                    }
                    _ if sym.class == SymbolClass::Letter => {
                        return Err(LexError::InvalidHex { location: start });
                    }
                    _ => {
                        if digits == 0 {
                            return Err(LexError::InvalidHex { location: start });
                        }
                        self.carry = Some(sym);
                        return Ok(Token::number(value, start));
                    }
                },

                State::Less => match sym.ch {
                    '=' => return Ok(Token::new(TokenKind::Lte, start)),
                    '>' => return Ok(Token::new(TokenKind::Neq, start)),
                    _ => {
                        self.carry = Some(sym);
                        return Ok(Token::new(TokenKind::Lt, start));
                    }
                },

                State::Greater => match sym.ch {
                    '=' => return Ok(Token::new(TokenKind::Gte, start)),
                    _ => {
                        self.carry = Some(sym);
                        return Ok(Token::new(TokenKind::Gt, start));
                    }
                },

                State::Colon => match sym.ch {
                    '=' => return Ok(Token::new(TokenKind::Assign, start)),
                    _ => {
                        self.carry = Some(sym);
                        return Ok(Token::new(TokenKind::Colon, start));
                    }
                },
            }
        }
    }
}

fn digit_value(ch: char) -> i32 {
    ch.to_digit(10).map(|d| d as i32).unwrap_or(0)
}

fn is_octal_digit(ch: char) -> bool {
    ('0'..='7').contains(&ch)
}
