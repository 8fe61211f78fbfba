//! Plain-text readers and writers for the init and model formats.

pub mod init;
pub mod model;

use crate::error::ParseError;

/// Whitespace tokenizer with line tracking, shared by the init and model
/// parsers so every failure carries its source line.
pub(crate) struct TokenStream<'a> {
    tokens: std::vec::IntoIter<(usize, &'a str)>,
    line: usize,
}

impl<'a> TokenStream<'a> {
    pub(crate) fn new(text: &'a str) -> Self {
        let tokens: Vec<(usize, &'a str)> = text
            .lines()
            .enumerate()
            .flat_map(|(index, line)| {
                line.split_whitespace().map(move |token| (index + 1, token))
            })
            .collect();
        Self {
            tokens: tokens.into_iter(),
            line: 1,
        }
    }

    /// Line of the most recently consumed token.
    pub(crate) fn line(&self) -> usize {
        self.line
    }

    pub(crate) fn next_token(&mut self, _expected: &'static str) -> Result<&'a str, ParseError> {
        match self.tokens.next() {
            Some((line, token)) => {
                self.line = line;
                Ok(token)
            }
            None => Err(ParseError::UnexpectedEof { line: self.line }),
        }
    }

    pub(crate) fn next_usize(&mut self, expected: &'static str) -> Result<usize, ParseError> {
        let token = self.next_token(expected)?;
        token.parse().map_err(|_| ParseError::Token {
            line: self.line,
            expected,
            got: token.to_string(),
        })
    }

    pub(crate) fn next_i64(&mut self, expected: &'static str) -> Result<i64, ParseError> {
        let token = self.next_token(expected)?;
        token.parse().map_err(|_| ParseError::Token {
            line: self.line,
            expected,
            got: token.to_string(),
        })
    }

    pub(crate) fn next_f64(&mut self, expected: &'static str) -> Result<f64, ParseError> {
        let token = self.next_token(expected)?;
        token.parse().map_err(|_| ParseError::Token {
            line: self.line,
            expected,
            got: token.to_string(),
        })
    }

    /// True when no token remains.
    pub(crate) fn exhausted(&mut self) -> bool {
        self.tokens.as_slice().is_empty()
    }
}
