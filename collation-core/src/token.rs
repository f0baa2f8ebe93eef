//! Token model for witness text

use crate::CollationError;
use serde::{Deserialize, Serialize};

/// Kind of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenType {
    Word,
    Whitespace,
    Punctuation,
    /// "No reading here". Not the same as a reading with empty text.
    Empty,
}

impl TokenType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Word => "word",
            Self::Whitespace => "whitespace",
            Self::Punctuation => "punctuation",
            Self::Empty => "empty",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "word" => Some(Self::Word),
            "whitespace" => Some(Self::Whitespace),
            "punctuation" => Some(Self::Punctuation),
            "empty" => Some(Self::Empty),
            _ => None,
        }
    }
}

impl Serialize for TokenType {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TokenType {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        TokenType::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("Unknown token type: {}", s)))
    }
}

/// Shared empty token, handed out by reference for padded cells.
pub static EMPTY_TOKEN: Token = Token {
    token_type: TokenType::Empty,
    text: String::new(),
    normalization: String::new(),
};

/// An immutable unit of witness text.
///
/// Collation always compares `normalization`, never `text`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    #[serde(rename = "type")]
    token_type: TokenType,
    text: String,
    #[serde(rename = "norm")]
    normalization: String,
}

impl Token {
    /// Create a token whose normalization equals its text.
    ///
    /// Only `Empty` tokens may have empty text.
    pub fn new(token_type: TokenType, text: impl Into<String>) -> crate::Result<Self> {
        let text = text.into();
        match token_type {
            TokenType::Empty => Ok(Self::empty()),
            _ if text.is_empty() => Err(CollationError::InvalidToken(format!(
                "{} token with empty text",
                token_type.as_str()
            ))),
            _ => Ok(Self {
                token_type,
                normalization: text.clone(),
                text,
            }),
        }
    }

    pub fn word(text: impl Into<String>) -> crate::Result<Self> {
        Self::new(TokenType::Word, text)
    }

    pub fn empty() -> Self {
        EMPTY_TOKEN.clone()
    }

    /// Return a copy of this token with a different normalization.
    /// Empty tokens stay empty.
    pub fn with_normalization(&self, normalization: impl Into<String>) -> Self {
        if self.is_empty() {
            return Self::empty();
        }
        Self {
            token_type: self.token_type,
            text: self.text.clone(),
            normalization: normalization.into(),
        }
    }

    pub fn token_type(&self) -> TokenType {
        self.token_type
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn normalization(&self) -> &str {
        &self.normalization
    }

    pub fn is_empty(&self) -> bool {
        self.token_type == TokenType::Empty
    }

    /// True when the normalization differs from the text.
    pub fn has_explicit_normalization(&self) -> bool {
        self.normalization != self.text
    }
}

#[derive(Deserialize)]
struct RawToken {
    #[serde(rename = "type")]
    token_type: TokenType,
    #[serde(default)]
    text: String,
    #[serde(default, rename = "norm")]
    normalization: Option<String>,
}

impl<'de> Deserialize<'de> for Token {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = RawToken::deserialize(deserializer)?;
        let token = Token::new(raw.token_type, raw.text).map_err(serde::de::Error::custom)?;
        Ok(match raw.normalization {
            Some(norm) => token.with_normalization(norm),
            None => token,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_only_for_empty_tokens() {
        assert!(Token::new(TokenType::Word, "").is_err());
        assert!(Token::new(TokenType::Punctuation, "").is_err());
        let empty = Token::new(TokenType::Empty, "ignored").unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.text(), "");
    }

    #[test]
    fn test_with_normalization_keeps_text() {
        let token = Token::word("Deus").unwrap().with_normalization("deus");
        assert_eq!(token.text(), "Deus");
        assert_eq!(token.normalization(), "deus");
        assert!(token.has_explicit_normalization());
        assert!(Token::empty().with_normalization("x").is_empty());
    }

    #[test]
    fn test_token_json_shape() {
        let token = Token::word("est").unwrap();
        let json = serde_json::to_value(&token).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "type": "word", "text": "est", "norm": "est" })
        );

        let parsed: Token =
            serde_json::from_str(r#"{"type":"word","text":"Est"}"#).unwrap();
        assert_eq!(parsed.normalization(), "Est");

        let bad = serde_json::from_str::<Token>(r#"{"type":"word","text":""}"#);
        assert!(bad.is_err());
        let unknown = serde_json::from_str::<Token>(r#"{"type":"glyph","text":"x"}"#);
        assert!(unknown.is_err());
    }
}
