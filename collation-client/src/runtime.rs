//! Shared collation runtime for the CLI and the service
//!
//! `Collator` owns the configured engine and the collation settings, builds
//! tables, and runs the engine over them.

use crate::{CollatexHttp, CollatexProcess};
use collation_core::config::{CollationConfig, EngineConfig};
use collation_core::{
    resolve_normalizers, AlignmentEngine, CancelFlag, CollationError, CollationTable, Config, EngineKind,
    EngineOutput, RunDetails, Witness,
};
use tracing::{debug, info};

/// Build the engine adapter named by the configuration.
pub fn engine_from_config(config: &EngineConfig) -> collation_core::Result<Box<dyn AlignmentEngine>> {
    let timeout = config.timeout_duration()?;
    match config.kind {
        EngineKind::Http => Ok(Box::new(CollatexHttp::new(&config.url, timeout)?)),
        EngineKind::Process => Ok(Box::new(CollatexProcess::new(
            &config.java,
            &config.jar,
            &config.temp_dir,
            timeout,
        ))),
    }
}

/// An aligned table with the details of the run that produced it.
#[derive(Debug)]
pub struct Collation {
    pub table: CollationTable,
    pub details: RunDetails,
}

pub struct Collator {
    engine: Box<dyn AlignmentEngine>,
    settings: CollationConfig,
}

impl Collator {
    pub fn new(engine: Box<dyn AlignmentEngine>, settings: CollationConfig) -> Self {
        Self { engine, settings }
    }

    pub fn from_config(config: &Config) -> collation_core::Result<Self> {
        // Catch unknown normalizer names at startup rather than per run.
        resolve_normalizers(&config.collation.lang, &config.collation.normalizers)?;
        let engine = engine_from_config(&config.engine)?;
        Ok(Self::new(engine, config.collation.clone()))
    }

    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    pub fn settings(&self) -> &CollationConfig {
        &self.settings
    }

    pub fn check_environment(&self) -> collation_core::Result<()> {
        self.engine.check_environment()?;
        Ok(())
    }

    /// Empty table set up with the configured language, normalizers and
    /// punctuation handling.
    pub fn new_table(&self) -> collation_core::Result<CollationTable> {
        self.table_for(&self.settings)
    }

    /// Like `new_table`, with per-run overrides.
    pub fn table_for(&self, settings: &CollationConfig) -> collation_core::Result<CollationTable> {
        let normalizers = resolve_normalizers(&settings.lang, &settings.normalizers)?;
        Ok(CollationTable::new(settings.ignore_punctuation)
            .with_language(&settings.lang)?
            .with_normalizers(normalizers))
    }

    /// Align every registered witness of `table` and apply the result.
    ///
    /// Fewer than two witnesses is rejected before the engine is called.
    /// On any failure the table is left as it was.
    pub fn align(&self, table: &mut CollationTable) -> collation_core::Result<RunDetails> {
        self.align_with(table, self.settings.remove_empty_columns)
    }

    pub fn align_with(
        &self,
        table: &mut CollationTable,
        remove_empty_columns: bool,
    ) -> collation_core::Result<RunDetails> {
        self.align_cancellable(table, remove_empty_columns, &CancelFlag::new())
    }

    /// Like `align_with`; raising `cancel` stops the engine call and leaves
    /// the table unaligned.
    pub fn align_cancellable(
        &self,
        table: &mut CollationTable,
        remove_empty_columns: bool,
        cancel: &CancelFlag,
    ) -> collation_core::Result<RunDetails> {
        let found = table.witness_count();
        if found < 2 {
            return Err(CollationError::NotEnoughWitnesses { found });
        }

        let input = table.engine_input();
        debug!(
            engine = self.engine.name(),
            witnesses = found,
            ignore_punctuation = table.ignores_punctuation(),
            "Sending witnesses to engine"
        );
        let run = self.engine.align(&input, cancel)?;
        let output = EngineOutput::from_value(run.output)?;
        table.set_from_engine_output(&output)?;
        if remove_empty_columns {
            table.remove_empty_columns();
        }

        info!(
            engine = %run.details.engine,
            witnesses = found,
            columns = table.token_count(),
            duration_ms = run.details.duration_ms,
            "Collation table aligned"
        );
        Ok(run.details)
    }

    /// Build a table from `(siglum, witness)` pairs and align it.
    pub fn collate<'a, I>(&self, witnesses: I) -> collation_core::Result<Collation>
    where
        I: IntoIterator<Item = (String, &'a dyn Witness)>,
    {
        let mut table = self.new_table()?;
        for (siglum, witness) in witnesses {
            table.add_witness(&siglum, witness)?;
        }
        let details = self.align(&mut table)?;
        Ok(Collation { table, details })
    }
}
