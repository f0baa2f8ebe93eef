//! Witnesses: textual versions of a work chunk

use crate::token::Token;
use crate::tokenizer::tokenize;
use serde::{Deserialize, Serialize};

/// Anything that can produce the token sequence of one work chunk.
///
/// The collation table only consumes this interface; it never looks at the
/// concrete witness type.
pub trait Witness {
    fn work(&self) -> &str;
    fn chunk(&self) -> &str;
    /// Ordered token sequence, whitespace included.
    fn tokens(&self) -> &[Token];
}

/// A witness built from a plain string.
#[derive(Debug, Clone)]
pub struct StringWitness {
    work: String,
    chunk: String,
    text: String,
    tokens: Vec<Token>,
}

impl StringWitness {
    pub fn new(work: impl Into<String>, chunk: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let tokens = tokenize(&text);
        Self {
            work: work.into(),
            chunk: chunk.into(),
            text,
            tokens,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

impl Witness for StringWitness {
    fn work(&self) -> &str {
        &self.work
    }

    fn chunk(&self) -> &str {
        &self.chunk
    }

    fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}

/// A witness whose tokens were produced upstream, typically by the
/// transcription tokenizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranscriptionWitness {
    pub work: String,
    pub chunk: String,
    pub tokens: Vec<Token>,
}

impl TranscriptionWitness {
    pub fn new(work: impl Into<String>, chunk: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            work: work.into(),
            chunk: chunk.into(),
            tokens,
        }
    }
}

impl Witness for TranscriptionWitness {
    fn work(&self) -> &str {
        &self.work
    }

    fn chunk(&self) -> &str {
        &self.chunk
    }

    fn tokens(&self) -> &[Token] {
        &self.tokens
    }
}
