//! Critical apparatus entries

use crate::collation_table::Column;

/// Render the apparatus entry for one column.
///
/// Witnesses reading `lemma` are left out. The others are listed in
/// registration order, as `"<siglum> om. "` when they have no reading and
/// `"<siglum>:<reading> "` otherwise, after `"<lemma>] "`. `lemma_text`
/// replaces the lemma in the output when it is not empty. A column where
/// every witness agrees with the lemma yields an empty string.
pub fn entry_for_column(column: &Column<'_>, lemma: &str, lemma_text: &str) -> String {
    let mut variants = String::new();
    for (siglum, token) in column {
        if token.normalization() == lemma {
            continue;
        }
        if token.is_empty() {
            variants.push_str(&format!("{} om. ", siglum));
        } else {
            variants.push_str(&format!("{}:{} ", siglum, token.normalization()));
        }
    }
    if variants.is_empty() {
        return variants;
    }
    let shown = if lemma_text.is_empty() { lemma } else { lemma_text };
    format!("{}] {}", shown, variants)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::Token;

    #[test]
    fn test_unanimous_column_has_no_entry() {
        let t = Token::word("is").unwrap();
        let column: Column<'_> = vec![("A", &t), ("B", &t)];
        assert_eq!(entry_for_column(&column, "is", ""), "");
    }

    #[test]
    fn test_omission_and_variant() {
        let is = Token::word("is").unwrap();
        let was = Token::word("was").unwrap();
        let empty = Token::empty();
        let column: Column<'_> = vec![("A", &is), ("B", &was), ("C", &empty)];
        assert_eq!(entry_for_column(&column, "is", ""), "is] B:was C om. ");
        assert_eq!(entry_for_column(&column, "is", "IS"), "IS] B:was C om. ");
    }

    #[test]
    fn test_empty_lemma_skips_omissions() {
        let x = Token::word("x").unwrap();
        let empty = Token::empty();
        let column: Column<'_> = vec![("A", &empty), ("B", &x)];
        assert_eq!(entry_for_column(&column, "", "om."), "om.] B:x ");
    }
}
