//! The query lexer.
//!
//! Operators are multi-word phrases (`is less than`, `fixed in current build`),
//! so keywords are matched against a phrase table, longest phrase first. Words
//! inside a phrase may be separated by any amount of whitespace. Field names and
//! values are always double-quoted; a backslash escapes the next character.
//!
//! Lexing stops on the first character sequence that is neither a phrase,
//! a quoted literal nor a parenthesis.

use crate::error::QueryError;
use crate::token::{Operator, RevisionKind, Span, Token, TokenKind};

/// Keyword phrases, ordered so that a longer phrase is tried before any of its prefixes.
const KEYWORDS: &[(&str, TokenKind<'static>)] = &[
    ("fixed in current build", TokenKind::Operator(Operator::FixedInCurrentBuild)),
    ("is greater than", TokenKind::Operator(Operator::IsGreaterThan)),
    ("is less than", TokenKind::Operator(Operator::IsLessThan)),
    ("submitted by me", TokenKind::Operator(Operator::SubmittedByMe)),
    ("fixed in build", TokenKind::Operator(Operator::FixedInBuild)),
    ("owned by me", TokenKind::Operator(Operator::OwnedByMe)),
    ("is before", TokenKind::Operator(Operator::IsBefore)),
    ("is after", TokenKind::Operator(Operator::IsAfter)),
    ("is empty", TokenKind::Operator(Operator::IsEmpty)),
    ("is not", TokenKind::Operator(Operator::IsNot)),
    ("is me", TokenKind::Operator(Operator::IsMe)),
    ("is current", TokenKind::Operator(Operator::IsCurrent)),
    ("is previous", TokenKind::Operator(Operator::IsPrevious)),
    ("submitted by", TokenKind::Operator(Operator::SubmittedBy)),
    ("fixed between", TokenKind::Operator(Operator::FixedBetween)),
    ("includes commit", TokenKind::Operator(Operator::IncludesCommit)),
    ("owned by", TokenKind::Operator(Operator::OwnedBy)),
    ("order by", TokenKind::OrderBy),
    ("is", TokenKind::Operator(Operator::Is)),
    ("contains", TokenKind::Operator(Operator::Contains)),
    ("open", TokenKind::Operator(Operator::Open)),
    ("merged", TokenKind::Operator(Operator::Merged)),
    ("discarded", TokenKind::Operator(Operator::Discarded)),
    ("and", TokenKind::And),
    ("or", TokenKind::Or),
    ("not", TokenKind::Not),
    ("asc", TokenKind::Asc),
    ("desc", TokenKind::Desc),
    ("branch", TokenKind::Revision(RevisionKind::Branch)),
    ("tag", TokenKind::Revision(RevisionKind::Tag)),
    ("commit", TokenKind::Revision(RevisionKind::Commit)),
    ("build", TokenKind::Revision(RevisionKind::Build)),
];

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

pub struct Lexer<'a> {
    input: &'a str,
    /// Current byte offset into the input
    position: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(input: &'a str) -> Self {
        Lexer { input, position: 0 }
    }

    /// Tokenize the whole input, failing on the first bad token.
    pub fn tokenize(input: &'a str) -> Result<Vec<Token<'a>>, QueryError> {
        Lexer::new(input).collect()
    }

    fn peek(&self) -> Option<char> {
        self.input[self.position..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek();
        if let Some(c) = c {
            self.position += c.len_utf8();
        }
        c
    }

    fn skip_whitespace(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_whitespace() {
                self.bump();
            } else {
                break;
            }
        }
    }

    /// Stops the iterator after an error has been yielded.
    fn fail(&mut self, error: QueryError) -> Option<Result<Token<'a>, QueryError>> {
        self.position = self.input.len();
        Some(Err(error))
    }

    /// Reads a quoted literal. The opening quote has already been consumed.
    fn read_quoted(&mut self, start: usize) -> Result<Token<'a>, QueryError> {
        let content_start = self.position;
        loop {
            match self.bump() {
                Some('\\') => {
                    if self.bump().is_none() {
                        break;
                    }
                }
                Some('"') => {
                    let content = &self.input[content_start..self.position - 1];
                    return Ok(Token {
                        kind: TokenKind::Quoted(content),
                        span: Span::new(start, self.position),
                    });
                }
                Some(_) => {}
                None => break,
            }
        }
        Err(QueryError::syntax(
            format!("Unterminated quoted literal starting at position {}", start),
            Some(Span::new(start, self.position)),
        ))
    }

    /// Returns the end offset if `phrase` matches at the current position.
    fn match_phrase(&self, phrase: &str) -> Option<usize> {
        let mut pos = self.position;
        for (i, word) in phrase.split(' ').enumerate() {
            if i > 0 {
                let rest = &self.input[pos..];
                let trimmed = rest.trim_start();
                if trimmed.len() == rest.len() {
                    return None;
                }
                pos += rest.len() - trimmed.len();
            }
            if !self.input[pos..].starts_with(word) {
                return None;
            }
            pos += word.len();
            if self.input[pos..].chars().next().is_some_and(is_word_char) {
                return None;
            }
        }
        Some(pos)
    }

    fn read_keyword(&mut self, start: usize) -> Result<Token<'a>, QueryError> {
        for (phrase, kind) in KEYWORDS {
            if let Some(end) = self.match_phrase(phrase) {
                self.position = end;
                return Ok(Token {
                    kind: kind.clone(),
                    span: Span::new(start, end),
                });
            }
        }
        let end = self.input[start..]
            .find(|c: char| !is_word_char(c))
            .map_or(self.input.len(), |offset| start + offset);
        Err(QueryError::syntax(
            format!(
                "Unrecognized word '{}' at position {}",
                &self.input[start..end],
                start
            ),
            Some(Span::new(start, end)),
        ))
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Result<Token<'a>, QueryError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.skip_whitespace();
        let start = self.position;

        let c = self.peek()?;
        let token = match c {
            '(' => {
                self.bump();
                Ok(Token { kind: TokenKind::LParen, span: Span::new(start, self.position) })
            }
            ')' => {
                self.bump();
                Ok(Token { kind: TokenKind::RParen, span: Span::new(start, self.position) })
            }
            '"' => {
                self.bump();
                self.read_quoted(start)
            }
            c if c.is_alphabetic() => self.read_keyword(start),
            c => Err(QueryError::syntax(
                format!("Unexpected character '{}' at position {}", c, start),
                Some(Span::new(start, start + c.len_utf8())),
            )),
        };
        match token {
            Ok(token) => Some(Ok(token)),
            Err(error) => self.fail(error),
        }
    }
}
