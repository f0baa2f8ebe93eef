use crate::error::AppError;
use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use collation_core::config::CollationConfig;
use collation_core::{
    siglum_for_index, CancelFlag, CollationError, CollationTable, CollationTableData, RunDetails,
    StringWitness, Token, TranscriptionWitness, VariantTable, Witness,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use uuid::Uuid;

// POST /collate
#[derive(Deserialize)]
pub struct WitnessInput {
    /// Generated from the witness position when absent.
    pub siglum: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub work: String,
    #[serde(default)]
    pub chunk: String,
    pub text: Option<String>,
    pub tokens: Option<Vec<Token>>,
    #[serde(default)]
    pub edition: bool,
}

#[derive(Deserialize)]
pub struct CollateRequest {
    pub witnesses: Vec<WitnessInput>,
    pub title: Option<String>,
    pub lang: Option<String>,
    pub ignore_punctuation: Option<bool>,
    pub remove_empty_columns: Option<bool>,
    pub normalizers: Option<Vec<String>>,
    /// Witness whose readings serve as lemmata in the apparatus.
    pub base: Option<String>,
}

#[derive(Serialize)]
pub struct RowOut {
    pub siglum: String,
    pub readings: Vec<String>,
}

#[derive(Serialize)]
pub struct CollateResponse {
    pub request_id: String,
    pub sigla: Vec<String>,
    pub rows: Vec<RowOut>,
    pub variants: VariantTable,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub apparatus: Option<Vec<String>>,
    pub data: CollationTableData,
    pub engine: RunDetails,
}

enum WitnessSource {
    Text(StringWitness),
    Tokens(TranscriptionWitness),
}

impl WitnessSource {
    fn as_witness(&self) -> &dyn Witness {
        match self {
            Self::Text(w) => w,
            Self::Tokens(w) => w,
        }
    }
}

struct PreparedWitness {
    siglum: String,
    title: String,
    edition: bool,
    source: WitnessSource,
}

struct PreparedCollation {
    settings: CollationConfig,
    title: Option<String>,
    base: Option<String>,
    witnesses: Vec<PreparedWitness>,
}

fn prepare(req: CollateRequest, defaults: &CollationConfig) -> Result<PreparedCollation, AppError> {
    let mut settings = defaults.clone();
    if let Some(lang) = req.lang {
        settings.lang = lang;
    }
    if let Some(ignore) = req.ignore_punctuation {
        settings.ignore_punctuation = ignore;
    }
    if let Some(remove) = req.remove_empty_columns {
        settings.remove_empty_columns = remove;
    }
    if let Some(normalizers) = req.normalizers {
        settings.normalizers = normalizers;
    }

    let mut witnesses = Vec::with_capacity(req.witnesses.len());
    for (i, input) in req.witnesses.into_iter().enumerate() {
        let siglum = input.siglum.unwrap_or_else(|| siglum_for_index(i));
        let source = match (input.text, input.tokens) {
            (Some(text), None) => {
                WitnessSource::Text(StringWitness::new(input.work, input.chunk, text))
            }
            (None, Some(tokens)) => WitnessSource::Tokens(TranscriptionWitness::new(
                input.work,
                input.chunk,
                tokens,
            )),
            _ => {
                return Err(AppError::bad_request(
                    "invalid_witness",
                    format!("Witness {} must have exactly one of text or tokens", siglum),
                    "Send either a plain text or a token list per witness",
                ))
            }
        };
        witnesses.push(PreparedWitness {
            siglum,
            title: input.title,
            edition: input.edition,
            source,
        });
    }

    Ok(PreparedCollation {
        settings,
        title: req.title,
        base: req.base,
        witnesses,
    })
}

/// Raises the flag when the request future is dropped, e.g. because the
/// client disconnected, so the engine call stops with it.
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

fn run_collation(
    state: &crate::state::AppState,
    prepared: PreparedCollation,
    cancel: &CancelFlag,
) -> collation_core::Result<(CollationTable, RunDetails, Option<Vec<String>>)> {
    let collator = &state.collator;
    let mut table = collator.table_for(&prepared.settings)?;
    if let Some(title) = prepared.title {
        table.set_title(title);
    }
    for w in &prepared.witnesses {
        table.add_witness_with_title(&w.siglum, w.source.as_witness(), &w.title, w.edition)?;
    }
    if let Some(base) = &prepared.base {
        if !table.is_siglum_in_table(base) {
            return Err(CollationError::UnknownSiglum(base.clone()));
        }
    }

    let details =
        collator.align_cancellable(&mut table, prepared.settings.remove_empty_columns, cancel)?;
    let apparatus = match &prepared.base {
        Some(base) => Some(table.apparatus_for_base(base)?),
        None => None,
    };
    Ok((table, details, apparatus))
}

pub async fn collate(
    State(state): State<SharedState>,
    Json(req): Json<CollateRequest>,
) -> Result<Json<CollateResponse>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::new_v4().to_string();
    let witness_count = req.witnesses.len();

    let prepared = prepare(req, state.collator.settings()).inspect_err(|_| {
        state.metrics.record_failure(true);
    })?;

    let cancel = CancelOnDrop(CancelFlag::new());
    let task_cancel = cancel.0.clone();
    let task_state = Arc::clone(&state);
    let result =
        tokio::task::spawn_blocking(move || run_collation(&task_state, prepared, &task_cancel))
            .await
            .map_err(AppError::internal)?;

    let duration_ms = start.elapsed().as_millis() as u64;
    let (table, details, apparatus) = match result {
        Ok(out) => out,
        Err(err) => {
            state.metrics.record_failure(err.is_data_error());
            warn!(
                request_id = %request_id,
                witnesses = witness_count,
                code = err.code(),
                error = %err,
                "POST /collate failed"
            );
            return Err(err.into());
        }
    };

    state.metrics.record_success(duration_ms);
    info!(
        request_id = %request_id,
        witnesses = witness_count,
        columns = table.token_count(),
        duration_ms,
        "POST /collate"
    );

    let rows = table
        .rows()
        .into_iter()
        .map(|(siglum, tokens)| RowOut {
            siglum: siglum.to_string(),
            readings: tokens.iter().map(|t| t.text().to_string()).collect(),
        })
        .collect();

    Ok(Json(CollateResponse {
        request_id,
        sigla: table.sigla().to_vec(),
        rows,
        variants: table.variant_table(),
        apparatus,
        data: table.to_data(),
        engine: details,
    }))
}

// GET /status
#[derive(Serialize)]
pub struct ServiceStatus {
    pub service: String,
    pub version: String,
    pub engine: String,
    pub engine_ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_error: Option<String>,
    pub lang: String,
}

pub async fn status(State(state): State<SharedState>) -> Json<ServiceStatus> {
    let task_state = Arc::clone(&state);
    let check = tokio::task::spawn_blocking(move || task_state.collator.check_environment()).await;
    let engine_error = match check {
        Ok(Ok(())) => None,
        Ok(Err(err)) => Some(err.to_string()),
        Err(err) => Some(err.to_string()),
    };

    Json(ServiceStatus {
        service: "collation-service".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        engine: state.collator.engine_name().to_string(),
        engine_ready: engine_error.is_none(),
        engine_error,
        lang: state.collator.settings().lang.clone(),
    })
}
