//! Collation Client - Alignment engine adapters and the shared runtime
//!
//! Provides the `Collator` that owns the configured alignment engine, so the
//! CLI and the service drive collation runs the same way.

pub mod collatex_http;
pub mod collatex_process;
pub mod runtime;

pub use collatex_http::CollatexHttp;
pub use collatex_process::CollatexProcess;
pub use runtime::{engine_from_config, Collation, Collator};

use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

/// Current UTC time as RFC 3339, for run details.
pub(crate) fn started_at() -> String {
    OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default()
}
