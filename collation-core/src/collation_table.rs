//! The collation table: a matrix of witness tokens aligned in columns
//!
//! Each row belongs to one witness and holds, per column, either a
//! reference into that witness's own token list or nothing. Only word
//! tokens (and punctuation, unless ignored) take part in the table.
//!
//! All rows have the same length at every observable point. Mutating
//! operations build the new rows first and swap them in at the end, so a
//! failed call leaves the table as it was.

use crate::apparatus;
use crate::engine::{Cell, EngineInput, EngineOutput, EngineToken, EngineWitness};
use crate::normalizer::{apply_all, Normalizer};
use crate::token::{Token, TokenType, EMPTY_TOKEN};
use crate::variant::{self, VariantTable};
use crate::witness::Witness;
use crate::CollationError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

pub const DEFAULT_LANGUAGE: &str = "la";
pub const DEFAULT_TITLE: &str = "Collation Table";

/// Back-reference into a witness's token list; `None` is an empty cell.
pub type TokenRef = Option<usize>;

/// One column: every witness's token, in siglum registration order.
pub type Column<'a> = Vec<(&'a str, &'a Token)>;

#[derive(Debug)]
struct WitnessEntry {
    title: String,
    work: String,
    chunk: String,
    /// Full token sequence after automatic normalization
    tokens: Vec<Token>,
    /// Ascending indices of the tokens that take part in the table
    collatable: Vec<usize>,
}

impl WitnessEntry {
    fn is_collatable_ref(&self, reference: usize) -> bool {
        self.collatable.binary_search(&reference).is_ok()
    }
}

pub struct CollationTable {
    title: String,
    language: String,
    ignore_punctuation: bool,
    normalizers: Vec<Box<dyn Normalizer>>,
    sigla: Vec<String>,
    witnesses: HashMap<String, WitnessEntry>,
    rows: HashMap<String, Vec<TokenRef>>,
    width: usize,
    edition_siglum: Option<String>,
}

impl std::fmt::Debug for CollationTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CollationTable")
            .field("title", &self.title)
            .field("language", &self.language)
            .field("ignore_punctuation", &self.ignore_punctuation)
            .field("sigla", &self.sigla)
            .field("width", &self.width)
            .finish()
    }
}

impl CollationTable {
    pub fn new(ignore_punctuation: bool) -> Self {
        Self {
            title: DEFAULT_TITLE.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
            ignore_punctuation,
            normalizers: Vec::new(),
            sigla: Vec::new(),
            witnesses: HashMap::new(),
            rows: HashMap::new(),
            width: 0,
            edition_siglum: None,
        }
    }

    pub fn with_language(mut self, lang: &str) -> crate::Result<Self> {
        self.set_language(lang)?;
        Ok(self)
    }

    /// Normalizers applied to word tokens of witnesses added afterwards.
    pub fn with_normalizers(mut self, normalizers: Vec<Box<dyn Normalizer>>) -> Self {
        self.normalizers = normalizers;
        self
    }

    pub fn set_language(&mut self, lang: &str) -> crate::Result<()> {
        if lang.trim().is_empty() {
            return Err(CollationError::InvalidLanguage);
        }
        self.language = lang.to_string();
        Ok(())
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn ignores_punctuation(&self) -> bool {
        self.ignore_punctuation
    }

    pub fn normalizer_names(&self) -> Vec<&'static str> {
        self.normalizers.iter().map(|n| n.name()).collect()
    }

    /// Sigla in registration order.
    pub fn sigla(&self) -> &[String] {
        &self.sigla
    }

    pub fn witness_count(&self) -> usize {
        self.sigla.len()
    }

    /// Number of columns in the table.
    ///
    /// Before alignment this is the longest witness's token count.
    pub fn token_count(&self) -> usize {
        self.width
    }

    pub fn is_siglum_in_table(&self, siglum: &str) -> bool {
        self.witnesses.contains_key(siglum)
    }

    pub fn witness_title(&self, siglum: &str) -> Option<&str> {
        self.witnesses.get(siglum).map(|w| w.title.as_str())
    }

    pub fn is_edition(&self) -> bool {
        self.edition_siglum.is_some()
    }

    pub fn edition_witness_siglum(&self) -> Option<&str> {
        self.edition_siglum.as_deref()
    }

    fn is_collatable(&self, token_type: TokenType) -> bool {
        match token_type {
            TokenType::Word => true,
            TokenType::Punctuation => !self.ignore_punctuation,
            TokenType::Whitespace | TokenType::Empty => false,
        }
    }

    fn normalize(&self, token: &Token) -> Token {
        match token.token_type() {
            TokenType::Word if !self.normalizers.is_empty() && !token.has_explicit_normalization() => {
                token.with_normalization(apply_all(&self.normalizers, token.text()))
            }
            _ => token.clone(),
        }
    }

    /// Register a witness under `siglum`, titled by its siglum.
    pub fn add_witness(&mut self, siglum: &str, witness: &dyn Witness) -> crate::Result<()> {
        self.add_witness_with_title(siglum, witness, "", false)
    }

    /// Register a witness. Its collatable tokens become its row, unaligned;
    /// shorter rows are padded with empty cells so all rows stay equal.
    pub fn add_witness_with_title(
        &mut self,
        siglum: &str,
        witness: &dyn Witness,
        title: &str,
        is_edition: bool,
    ) -> crate::Result<()> {
        if self.is_siglum_in_table(siglum) {
            return Err(CollationError::DuplicateSiglum(siglum.to_string()));
        }

        let tokens: Vec<Token> = witness.tokens().iter().map(|t| self.normalize(t)).collect();
        let collatable: Vec<usize> = tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| self.is_collatable(t.token_type()))
            .map(|(i, _)| i)
            .collect();

        if collatable.is_empty() {
            return Err(CollationError::EmptyWitness(siglum.to_string()));
        }

        let mut row: Vec<TokenRef> = collatable.iter().copied().map(Some).collect();
        let new_width = self.width.max(row.len());
        row.resize(new_width, None);
        self.pad_rows_to(new_width);

        debug!(
            siglum,
            work = witness.work(),
            chunk = witness.chunk(),
            tokens = collatable.len(),
            width = new_width,
            "Added witness"
        );

        self.rows.insert(siglum.to_string(), row);
        self.witnesses.insert(
            siglum.to_string(),
            WitnessEntry {
                title: if title.is_empty() {
                    siglum.to_string()
                } else {
                    title.to_string()
                },
                work: witness.work().to_string(),
                chunk: witness.chunk().to_string(),
                tokens,
                collatable,
            },
        );
        self.sigla.push(siglum.to_string());
        if is_edition {
            self.edition_siglum = Some(siglum.to_string());
        }
        self.debug_check_width();
        Ok(())
    }

    /// The witness's own token sequence (normalized, whitespace included).
    /// Empty for unknown sigla.
    pub fn original_tokens(&self, siglum: &str) -> &[Token] {
        self.witnesses
            .get(siglum)
            .map(|w| w.tokens.as_slice())
            .unwrap_or(&[])
    }

    pub fn references_for_row(&self, siglum: &str) -> Option<&[TokenRef]> {
        self.rows.get(siglum).map(Vec::as_slice)
    }

    /// Replace a whole row of references.
    ///
    /// The row must span the current width and every reference must point
    /// to a collatable token of the witness.
    pub fn set_references_for_row(&mut self, siglum: &str, references: Vec<TokenRef>) -> crate::Result<()> {
        let entry = self
            .witnesses
            .get(siglum)
            .ok_or_else(|| CollationError::UnknownSiglum(siglum.to_string()))?;
        if references.len() != self.width {
            return Err(CollationError::RowLengthMismatch {
                siglum: siglum.to_string(),
                expected: self.width,
                found: references.len(),
            });
        }
        if let Some(bad) = references
            .iter()
            .flatten()
            .find(|&&r| !entry.is_collatable_ref(r))
        {
            return Err(CollationError::InvalidReference {
                siglum: siglum.to_string(),
                reference: *bad,
            });
        }
        self.rows.insert(siglum.to_string(), references);
        Ok(())
    }

    fn resolve(&self, siglum: &str, reference: TokenRef) -> &Token {
        match (reference, self.witnesses.get(siglum)) {
            (Some(i), Some(entry)) => entry.tokens.get(i).unwrap_or(&EMPTY_TOKEN),
            _ => &EMPTY_TOKEN,
        }
    }

    /// The full row for `siglum`. Unknown sigla give an empty row.
    pub fn witness_tokens(&self, siglum: &str) -> Vec<&Token> {
        match self.rows.get(siglum) {
            Some(row) => row.iter().map(|&r| self.resolve(siglum, r)).collect(),
            None => Vec::new(),
        }
    }

    /// Every row, in siglum registration order.
    pub fn rows(&self) -> Vec<(&str, Vec<&Token>)> {
        self.sigla
            .iter()
            .map(|s| (s.as_str(), self.witness_tokens(s)))
            .collect()
    }

    pub fn column(&self, index: usize) -> crate::Result<Column<'_>> {
        if index >= self.width {
            return Err(CollationError::ColumnIndexOutOfRange {
                index,
                width: self.width,
            });
        }
        Ok(self
            .sigla
            .iter()
            .map(|s| {
                let reference = self.rows.get(s).and_then(|row| row[index]);
                (s.as_str(), self.resolve(s, reference))
            })
            .collect())
    }

    /// Token lists to feed an alignment engine.
    ///
    /// Built from each witness's own unaligned token list; `witnessRef` is
    /// the token's position in that list.
    pub fn engine_input(&self) -> EngineInput {
        let witnesses = self
            .sigla
            .iter()
            .filter_map(|s| self.witnesses.get(s).map(|entry| (s, entry)))
            .map(|(siglum, entry)| EngineWitness {
                id: siglum.clone(),
                tokens: entry
                    .collatable
                    .iter()
                    .map(|&i| EngineToken {
                        t: entry.tokens[i].normalization().to_string(),
                        witness_ref: i,
                    })
                    .collect(),
            })
            .collect();
        EngineInput { witnesses }
    }

    /// Rebuild the table from an alignment engine's output.
    ///
    /// Segments are stitched in order. Within a segment every witness
    /// contributes as many columns as the longest one, shorter cell lists
    /// being padded at the end with empty cells.
    pub fn set_from_engine_output(&mut self, output: &EngineOutput) -> crate::Result<()> {
        let witness_count = self.sigla.len();
        if output.witnesses.len() < 2 {
            return Err(CollationError::MalformedEngineOutput(format!(
                "expected at least 2 witnesses, got {}",
                output.witnesses.len()
            )));
        }
        if output.witnesses.len() != witness_count {
            return Err(CollationError::MalformedEngineOutput(format!(
                "engine output has {} witnesses, table has {}",
                output.witnesses.len(),
                witness_count
            )));
        }
        let mut seen = HashSet::new();
        for siglum in &output.witnesses {
            if !self.is_siglum_in_table(siglum) {
                return Err(CollationError::MalformedEngineOutput(format!(
                    "unknown witness {} in engine output",
                    siglum
                )));
            }
            if !seen.insert(siglum.as_str()) {
                return Err(CollationError::MalformedEngineOutput(format!(
                    "witness {} repeated in engine output",
                    siglum
                )));
            }
        }

        let total_width = output.width();
        let mut new_rows: Vec<Vec<TokenRef>> = vec![Vec::with_capacity(total_width); witness_count];

        for (segment_index, segment) in output.segments.iter().enumerate() {
            if segment.cells.len() != witness_count {
                return Err(CollationError::MalformedEngineOutput(format!(
                    "segment {} has {} witness entries, expected {}",
                    segment_index,
                    segment.cells.len(),
                    witness_count
                )));
            }
            let segment_width = segment.width();
            for (witness_index, cells) in segment.cells.iter().enumerate() {
                let siglum = &output.witnesses[witness_index];
                let entry = &self.witnesses[siglum];
                let row = &mut new_rows[witness_index];
                for cell in cells {
                    match *cell {
                        Cell::Empty => row.push(None),
                        Cell::Token(r) if entry.is_collatable_ref(r) => row.push(Some(r)),
                        Cell::Token(r) => {
                            return Err(CollationError::MalformedEngineOutput(format!(
                                "witnessRef {} does not point to a collated token of {}",
                                r, siglum
                            )))
                        }
                    }
                }
                row.resize(row.len() + segment_width - cells.len(), None);
            }
        }

        self.rows = output
            .witnesses
            .iter()
            .cloned()
            .zip(new_rows)
            .collect();
        self.width = total_width;
        debug!(
            segments = output.segments.len(),
            width = total_width,
            "Collation table set from engine output"
        );
        self.debug_check_width();
        Ok(())
    }

    /// Move the token at `(siglum, column)` forward by `distance` columns,
    /// leaving empty cells behind it. Trailing empty cells of the row absorb
    /// the shift first; past that the whole table grows.
    pub fn shift_token(&mut self, siglum: &str, column: usize, distance: usize) -> crate::Result<()> {
        if column >= self.width {
            return Err(CollationError::ColumnIndexOutOfRange {
                index: column,
                width: self.width,
            });
        }
        let row = self
            .rows
            .get_mut(siglum)
            .ok_or_else(|| CollationError::UnknownSiglum(siglum.to_string()))?;
        if distance == 0 {
            return Ok(());
        }

        row.splice(column..column, std::iter::repeat(None).take(distance));
        for _ in 0..distance {
            if row.last() == Some(&None) {
                row.pop();
            } else {
                break;
            }
        }

        let new_width = row.len();
        if new_width > self.width {
            self.pad_rows_to(new_width);
        }
        debug!(siglum, column, distance, width = self.width, "Shifted token");
        self.debug_check_width();
        Ok(())
    }

    /// Delete every column in which all witnesses are empty.
    pub fn remove_empty_columns(&mut self) {
        let keep: Vec<bool> = (0..self.width)
            .map(|i| self.rows.values().any(|row| row[i].is_some()))
            .collect();
        let kept = keep.iter().filter(|&&k| k).count();
        if kept == self.width {
            return;
        }
        for row in self.rows.values_mut() {
            let mut column = 0;
            row.retain(|_| {
                let k = keep[column];
                column += 1;
                k
            });
        }
        debug!(removed = self.width - kept, width = kept, "Removed empty columns");
        self.width = kept;
        self.debug_check_width();
    }

    /// Apparatus entry for one column against `lemma`; `lemma_text`, when
    /// not empty, is shown instead of the lemma.
    pub fn apparatus_entry_for_column(
        &self,
        column: usize,
        lemma: &str,
        lemma_text: &str,
    ) -> crate::Result<String> {
        let column = self.column(column)?;
        Ok(apparatus::entry_for_column(&column, lemma, lemma_text))
    }

    /// One apparatus entry per column, taking `base`'s reading as lemma.
    /// Where `base` has no reading the lemma is shown as "om.".
    pub fn apparatus_for_base(&self, base: &str) -> crate::Result<Vec<String>> {
        if !self.is_siglum_in_table(base) {
            return Err(CollationError::UnknownSiglum(base.to_string()));
        }
        self.witness_tokens(base)
            .iter()
            .enumerate()
            .map(|(column, token)| {
                let lemma_text = if token.is_empty() { "om." } else { "" };
                self.apparatus_entry_for_column(column, token.normalization(), lemma_text)
            })
            .collect()
    }

    pub fn variant_table(&self) -> VariantTable {
        let columns = (0..self.width).filter_map(|i| self.column(i).ok());
        variant::variant_table(&self.sigla, columns)
    }

    /// Serializable snapshot of the table.
    pub fn to_data(&self) -> CollationTableData {
        let witnesses = self
            .sigla
            .iter()
            .filter_map(|s| self.witnesses.get(s).map(|w| (s, w)))
            .map(|(siglum, w)| WitnessData {
                siglum: siglum.clone(),
                title: w.title.clone(),
                work: w.work.clone(),
                chunk: w.chunk.clone(),
                tokens: w.tokens.clone(),
            })
            .collect();
        let collation_matrix = self
            .sigla
            .iter()
            .map(|s| {
                self.rows
                    .get(s)
                    .map(|row| {
                        row.iter()
                            .map(|r| r.map_or(-1, |i| i as i64))
                            .collect()
                    })
                    .unwrap_or_default()
            })
            .collect();
        CollationTableData {
            title: self.title.clone(),
            lang: self.language.clone(),
            sigla: self.sigla.clone(),
            edition_witness: self.edition_siglum.clone(),
            witnesses,
            collation_matrix,
        }
    }

    fn pad_rows_to(&mut self, width: usize) {
        for row in self.rows.values_mut() {
            if row.len() < width {
                row.resize(width, None);
            }
        }
        self.width = width;
    }

    fn debug_check_width(&self) {
        debug_assert!(
            self.rows.values().all(|row| row.len() == self.width),
            "collation table rows out of sync with width {}",
            self.width
        );
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitnessData {
    pub siglum: String,
    pub title: String,
    pub work: String,
    pub chunk: String,
    pub tokens: Vec<Token>,
}

/// Snapshot of a collation table; `collation_matrix[i]` is the row of
/// `sigla[i]`, with `-1` for empty cells.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollationTableData {
    pub title: String,
    pub lang: String,
    pub sigla: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub edition_witness: Option<String>,
    pub witnesses: Vec<WitnessData>,
    pub collation_matrix: Vec<Vec<i64>>,
}
