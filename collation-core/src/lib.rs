//! Collation Core - Aligned collation tables from textual witnesses
//!
//! This library registers witnesses of a text, translates them to and from
//! an external alignment engine, and keeps the resulting column-aligned
//! table from which variant ranks and apparatus entries are derived.

pub mod apparatus;
pub mod collation_table;
pub mod config;
pub mod engine;
pub mod error;
pub mod normalizer;
pub mod siglum;
pub mod token;
pub mod tokenizer;
pub mod variant;
pub mod witness;

pub use collation_table::{CollationTable, CollationTableData, Column, TokenRef, WitnessData};
pub use config::{Config, EngineKind};
pub use engine::{AlignmentEngine, CancelFlag, Cell, EngineInput, EngineOutput, EngineRun, RunDetails, Segment};
pub use error::{CollationError, EngineError, ErrorEnvelope};
pub use normalizer::{resolve_normalizers, Normalizer};
pub use siglum::siglum_for_index;
pub use token::{Token, TokenType};
pub use variant::{VariantTable, EMPTY_RANK};
pub use witness::{StringWitness, TranscriptionWitness, Witness};

/// Result type alias for collation operations
pub type Result<T> = std::result::Result<T, CollationError>;
