//! Functionality for reading tokens from the source character stream.
use crate::span::Span;

use super::{error::*, tokens::*};

/// Lex a source string, producing either a complete token stream or
/// the collection of lexical errors that were encountered.
pub fn lex(source: &str) -> Result<Vec<Token>, Vec<LexError>> {
    Lexer::new(source).run()
}

struct Lexer<'s> {
    source: &'s str,
    pos: usize,
    tokens: Vec<Token>,
    errors: Vec<LexError>,
}

impl<'s> Lexer<'s> {
    fn new(source: &'s str) -> Self {
        Self {
            source,
            pos: 0,
            tokens: vec![],
            errors: vec![],
        }
    }

    /// Finishes the lexer and consumes it, producing the tokens it read.
    fn run(mut self) -> Result<Vec<Token>, Vec<LexError>> {
        while !self.finished() {
            self.skip_whitespace();
            if self.finished() {
                break;
            }
            if self.try_skip_comment() {
                continue;
            }
            self.next_token();
        }

        if !self.errors.is_empty() {
            Err(self.errors)
        } else {
            Ok(self.tokens)
        }
    }

    fn next_token(&mut self) {
        let start = self.pos;
        let current = match self.peek() {
            Some(ch) => ch,
            None => return,
        };

        if current.is_ascii_alphabetic() || current == '_' {
            let word = self.consume_while(|ch| ch.is_ascii_alphanumeric() || ch == '_');
            let kind = match Keyword::parse(word) {
                Some(keyword) => TokenKind::Keyword(keyword),
                None => TokenKind::Identifier(word.to_string()),
            };
            self.push_token(start, kind);
        } else if current.is_ascii_digit() {
            self.number(start);
        } else if "+-*/=<>!".contains(current) {
            self.operator(start);
        } else if let Some(symbol) = punctuation(current) {
            self.bump();
            self.push_token(start, TokenKind::Symbol(symbol));
        } else {
            self.bump();
            self.errors.push(LexError::new(
                Span::new(start, self.pos),
                ErrorType::UnknownToken,
            ));
        }
    }

    /// Read a numeric literal. The literal's text is preserved verbatim;
    /// more than one decimal point makes it invalid.
    fn number(&mut self, start: usize) {
        let text = self
            .consume_while(|ch| ch.is_ascii_digit() || ch == '.')
            .to_string();

        if text.matches('.').count() > 1 {
            self.errors.push(LexError::new(
                Span::new(start, self.pos),
                ErrorType::NumberLiteral(text),
            ));
        } else {
            self.push_token(start, TokenKind::Number(text));
        }
    }

    /// Read a one or two character operator. A lone `!` is not an operator.
    fn operator(&mut self, start: usize) {
        let first = self.bump().unwrap_or_default();

        let two_char = if self.peek() == Some('=') {
            match first {
                '=' => Some(Symbol::Eq),
                '!' => Some(Symbol::Neq),
                '<' => Some(Symbol::Lte),
                '>' => Some(Symbol::Gte),
                '+' => Some(Symbol::PlusAssign),
                '-' => Some(Symbol::MinusAssign),
                '*' => Some(Symbol::AsteriskAssign),
                '/' => Some(Symbol::SlashAssign),
                _ => None,
            }
        } else {
            None
        };
        if two_char.is_some() {
            self.bump();
        }

        let symbol = two_char.or(match first {
            '=' => Some(Symbol::Assign),
            '<' => Some(Symbol::Lt),
            '>' => Some(Symbol::Gt),
            '+' => Some(Symbol::Plus),
            '-' => Some(Symbol::Minus),
            '*' => Some(Symbol::Asterisk),
            '/' => Some(Symbol::Slash),
            _ => None,
        });

        match symbol {
            Some(symbol) => self.push_token(start, TokenKind::Symbol(symbol)),
            None => self.errors.push(LexError::new(
                Span::new(start, self.pos),
                ErrorType::UnknownToken,
            )),
        }
    }

    /// Skip a `//` or `/* */` comment if one starts here.
    fn try_skip_comment(&mut self) -> bool {
        if self.peek() != Some('/') {
            return false;
        }
        match self.peek_second() {
            Some('/') => {
                self.consume_while(|ch| ch != '\n');
                true
            }
            Some('*') => {
                let start = self.pos;
                self.bump();
                self.bump();
                loop {
                    match self.peek() {
                        Some('*') if self.peek_second() == Some('/') => {
                            self.bump();
                            self.bump();
                            break;
                        }
                        Some(_) => {
                            self.bump();
                        }
                        None => {
                            self.errors.push(LexError::new(
                                Span::new(start, self.pos),
                                ErrorType::UnterminatedComment,
                            ));
                            break;
                        }
                    }
                }
                true
            }
            _ => false,
        }
    }

    fn skip_whitespace(&mut self) {
        self.consume_while(|ch| ch.is_whitespace());
    }

    fn consume_while(&mut self, predicate: impl Fn(char) -> bool) -> &'s str {
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if !predicate(ch) {
                break;
            }
            self.pos += ch.len_utf8();
        }
        let source = self.source;
        &source[start..self.pos]
    }

    fn push_token(&mut self, start: usize, kind: TokenKind) {
        self.tokens.push(Token {
            source: Span::new(start, self.pos),
            kind,
        });
    }

    fn peek(&self) -> Option<char> {
        self.source[self.pos..].chars().next()
    }

    fn peek_second(&self) -> Option<char> {
        let mut chars = self.source[self.pos..].chars();
        chars.next();
        chars.next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn finished(&self) -> bool {
        self.pos >= self.source.len()
    }
}

fn punctuation(ch: char) -> Option<Symbol> {
    Some(match ch {
        ';' => Symbol::Semicolon,
        ',' => Symbol::Comma,
        '{' => Symbol::OpenBrace,
        '}' => Symbol::CloseBrace,
        '(' => Symbol::OpenParen,
        ')' => Symbol::CloseParen,
        _ => return None,
    })
}
