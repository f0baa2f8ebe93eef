//! Minimal splitter for plain-string witnesses
//!
//! Text is cut into maximal runs of whitespace, punctuation and
//! everything else (words). No linguistic rules are applied.

use crate::token::{Token, TokenType};

const PUNCTUATION: &[char] = &['.', ',', ';', ':', '(', ')', '[', ']', '¶', '⊙', '!', '?'];

fn classify(c: char) -> TokenType {
    if c.is_whitespace() {
        TokenType::Whitespace
    } else if PUNCTUATION.contains(&c) {
        TokenType::Punctuation
    } else {
        TokenType::Word
    }
}

/// Split `text` into whitespace, punctuation and word tokens.
pub fn tokenize(text: &str) -> Vec<Token> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut current_type = TokenType::Empty;

    for c in text.chars() {
        let c_type = classify(c);
        if c_type != current_type && !current.is_empty() {
            push_run(&mut tokens, current_type, std::mem::take(&mut current));
        }
        current_type = c_type;
        current.push(c);
    }
    if !current.is_empty() {
        push_run(&mut tokens, current_type, current);
    }
    tokens
}

fn push_run(tokens: &mut Vec<Token>, token_type: TokenType, run: String) {
    // Runs are never empty here, so construction cannot fail.
    if let Ok(token) = Token::new(token_type, run) {
        tokens.push(token);
    }
}
