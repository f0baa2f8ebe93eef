//! Data contract with external alignment engines
//!
//! The engine receives one token list per witness, each token carrying a
//! back-reference (`witnessRef`) to its position in the witness's own token
//! sequence. It answers with a table of segments; every segment holds one
//! cell list per witness, in the order of the `witnesses` array. Output is
//! parsed and validated here once, before anything touches the table.

use crate::error::EngineError;
use crate::CollationError;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// One token sent to the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineToken {
    /// Normalized reading
    pub t: String,
    #[serde(rename = "witnessRef")]
    pub witness_ref: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineWitness {
    pub id: String,
    pub tokens: Vec<EngineToken>,
}

/// Engine input: one entry per witness, in siglum registration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInput {
    pub witnesses: Vec<EngineWitness>,
}

impl EngineInput {
    pub fn witness_count(&self) -> usize {
        self.witnesses.len()
    }
}

/// One aligned cell: either no token, or a back-reference into the
/// witness's original token list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cell {
    Empty,
    Token(usize),
}

/// A run of aligned columns; `cells[w]` lists the cells of the w-th
/// witness of the output. Rows may be ragged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub cells: Vec<Vec<Cell>>,
}

impl Segment {
    /// Number of columns the segment occupies once padded.
    pub fn width(&self) -> usize {
        self.cells.iter().map(Vec::len).max().unwrap_or(0)
    }
}

/// Structurally parsed engine output.
///
/// Parsing checks only shape; whether the sigla and references match a
/// given table is checked when the output is applied to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOutput {
    pub witnesses: Vec<String>,
    pub segments: Vec<Segment>,
}

#[derive(Deserialize)]
struct RawOutput {
    witnesses: Option<Vec<String>>,
    table: Option<Vec<Vec<Vec<serde_json::Value>>>>,
}

fn malformed(msg: impl Into<String>) -> CollationError {
    CollationError::MalformedEngineOutput(msg.into())
}

fn parse_cell(value: &serde_json::Value) -> crate::Result<Cell> {
    match value {
        serde_json::Value::Null => Ok(Cell::Empty),
        serde_json::Value::Object(map) if map.is_empty() => Ok(Cell::Empty),
        serde_json::Value::Object(map) => {
            let reference = map
                .get("witnessRef")
                .ok_or_else(|| malformed("cell without witnessRef"))?;
            let reference = reference
                .as_i64()
                .ok_or_else(|| malformed(format!("non-integer witnessRef: {}", reference)))?;
            match reference {
                -1 => Ok(Cell::Empty),
                r if r >= 0 => Ok(Cell::Token(r as usize)),
                r => Err(malformed(format!("negative witnessRef: {}", r))),
            }
        }
        other => Err(malformed(format!("unexpected cell: {}", other))),
    }
}

impl EngineOutput {
    /// Parse and validate the shape of an engine reply.
    pub fn from_value(value: serde_json::Value) -> crate::Result<Self> {
        let raw: RawOutput =
            serde_json::from_value(value).map_err(|e| malformed(e.to_string()))?;
        let witnesses = raw
            .witnesses
            .ok_or_else(|| malformed("missing witnesses list"))?;
        let table = raw.table.ok_or_else(|| malformed("missing table"))?;

        if witnesses.len() < 2 {
            return Err(malformed(format!(
                "expected at least 2 witnesses, got {}",
                witnesses.len()
            )));
        }

        let mut segments = Vec::with_capacity(table.len());
        for (i, raw_segment) in table.iter().enumerate() {
            if raw_segment.len() != witnesses.len() {
                return Err(malformed(format!(
                    "segment {} has {} witness entries, expected {}",
                    i,
                    raw_segment.len(),
                    witnesses.len()
                )));
            }
            let cells = raw_segment
                .iter()
                .map(|cells| cells.iter().map(parse_cell).collect::<crate::Result<Vec<_>>>())
                .collect::<crate::Result<Vec<_>>>()?;
            segments.push(Segment { cells });
        }

        Ok(Self {
            witnesses,
            segments,
        })
    }

    pub fn from_json(json: &str) -> crate::Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| malformed(e.to_string()))?;
        Self::from_value(value)
    }

    /// Total number of columns after per-segment padding.
    pub fn width(&self) -> usize {
        self.segments.iter().map(Segment::width).sum()
    }
}

/// Timing and identity of one engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDetails {
    pub engine: String,
    pub started_at: String,
    pub duration_ms: u64,
}

/// Raw engine reply plus run details.
#[derive(Debug, Clone)]
pub struct EngineRun {
    pub output: serde_json::Value,
    pub details: RunDetails,
}

/// Cancellation signal for an in-flight alignment.
///
/// Clones share one flag; once cancelled it stays cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A black-box aligner.
///
/// Implementations block until the engine answers, their timeout expires
/// or `cancel` is raised, and must not leave external processes behind.
pub trait AlignmentEngine: Send + Sync {
    fn name(&self) -> &str;

    /// Verify the engine can run here without collating anything.
    fn check_environment(&self) -> Result<(), EngineError>;

    fn align(&self, input: &EngineInput, cancel: &CancelFlag) -> Result<EngineRun, EngineError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_json_shape() {
        let input = EngineInput {
            witnesses: vec![EngineWitness {
                id: "A".into(),
                tokens: vec![EngineToken {
                    t: "this".into(),
                    witness_ref: 0,
                }],
            }],
        };
        assert_eq!(
            serde_json::to_value(&input).unwrap(),
            json!({ "witnesses": [ { "id": "A", "tokens": [ { "t": "this", "witnessRef": 0 } ] } ] })
        );
    }

    #[test]
    fn test_parse_ragged_segments() {
        let output = EngineOutput::from_value(json!({
            "witnesses": ["A", "B"],
            "table": [
                [ [ {"t": "a", "witnessRef": 0} ], [ {"t": "a", "witnessRef": 0} ] ],
                [ [ {"t": "b", "witnessRef": 2}, {"t": "c", "witnessRef": 4} ], [] ],
                [ [ null ], [ {"t": "d", "witnessRef": 2} ] ]
            ]
        }))
        .unwrap();
        assert_eq!(output.segments.len(), 3);
        assert_eq!(output.segments[1].width(), 2);
        assert_eq!(output.segments[1].cells[1], Vec::<Cell>::new());
        assert_eq!(output.segments[2].cells[0], vec![Cell::Empty]);
        assert_eq!(output.width(), 4);
    }

    #[test]
    fn test_reject_missing_parts() {
        assert!(matches!(
            EngineOutput::from_value(json!({ "table": [] })),
            Err(CollationError::MalformedEngineOutput(_))
        ));
        assert!(matches!(
            EngineOutput::from_value(json!({ "witnesses": ["A", "B"] })),
            Err(CollationError::MalformedEngineOutput(_))
        ));
        assert!(matches!(
            EngineOutput::from_value(json!({ "witnesses": ["A"], "table": [] })),
            Err(CollationError::MalformedEngineOutput(_))
        ));
    }

    #[test]
    fn test_reject_bad_segments_and_cells() {
        let short_segment = json!({
            "witnesses": ["A", "B"],
            "table": [ [ [ {"t": "a", "witnessRef": 0} ] ] ]
        });
        assert!(EngineOutput::from_value(short_segment).is_err());

        let no_ref = json!({
            "witnesses": ["A", "B"],
            "table": [ [ [ {"t": "a"} ], [] ] ]
        });
        let err = EngineOutput::from_value(no_ref).unwrap_err();
        assert!(err.to_string().contains("witnessRef"));

        let string_cell = json!({
            "witnesses": ["A", "B"],
            "table": [ [ [ "a" ], [] ] ]
        });
        assert!(EngineOutput::from_value(string_cell).is_err());
    }

    #[test]
    fn test_cancel_flag_is_shared_by_clones() {
        let flag = CancelFlag::new();
        let seen_by_engine = flag.clone();
        assert!(!seen_by_engine.is_cancelled());
        flag.cancel();
        assert!(seen_by_engine.is_cancelled());
    }

    #[test]
    fn test_from_json_rejects_garbage() {
        assert!(matches!(
            EngineOutput::from_json("not json"),
            Err(CollationError::MalformedEngineOutput(_))
        ));
    }
}
