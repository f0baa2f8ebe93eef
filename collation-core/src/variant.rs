//! Variant ranks: per-column clustering of witnesses by reading

use crate::collation_table::Column;
use serde::ser::SerializeMap;
use serde::Serialize;

/// Rank given to a witness with no reading in a column.
pub const EMPTY_RANK: i32 = -1;

/// Rank every witness's reading in one column.
///
/// The first witness (in registration order) with a reading gets rank 0;
/// each further distinct normalized reading gets the next rank, in the
/// order its first witness appears. Empty cells get [`EMPTY_RANK`].
pub fn rank_column(column: &Column<'_>) -> Vec<i32> {
    let mut readings: Vec<&str> = Vec::new();
    column
        .iter()
        .map(|(_, token)| {
            if token.is_empty() {
                return EMPTY_RANK;
            }
            let reading = token.normalization();
            let rank = match readings.iter().position(|r| *r == reading) {
                Some(rank) => rank,
                None => {
                    readings.push(reading);
                    readings.len() - 1
                }
            };
            rank as i32
        })
        .collect()
}

/// Ranks for every column, one row per siglum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariantTable {
    sigla: Vec<String>,
    ranks: Vec<Vec<i32>>,
}

impl VariantTable {
    pub fn sigla(&self) -> &[String] {
        &self.sigla
    }

    /// Number of witnesses.
    pub fn len(&self) -> usize {
        self.sigla.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sigla.is_empty()
    }

    pub fn get(&self, siglum: &str) -> Option<&[i32]> {
        self.sigla
            .iter()
            .position(|s| s == siglum)
            .map(|i| self.ranks[i].as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[i32])> {
        self.sigla
            .iter()
            .map(String::as_str)
            .zip(self.ranks.iter().map(Vec::as_slice))
    }
}

// Serialized as a map siglum -> ranks, keeping registration order.
impl Serialize for VariantTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.sigla.len()))?;
        for (siglum, ranks) in self.iter() {
            map.serialize_entry(siglum, ranks)?;
        }
        map.end()
    }
}

pub(crate) fn variant_table<'a>(
    sigla: &[String],
    columns: impl Iterator<Item = Column<'a>>,
) -> VariantTable {
    let mut ranks: Vec<Vec<i32>> = vec![Vec::new(); sigla.len()];
    for column in columns {
        for (row, rank) in ranks.iter_mut().zip(rank_column(&column)) {
            row.push(rank);
        }
    }
    VariantTable {
        sigla: sigla.to_vec(),
        ranks,
    }
}
