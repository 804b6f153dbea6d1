//! Exploratory data analysis for uploaded CSV files.
//!
//! An upload is parsed into typed columns ([`dataset`]), summarised into a compact JSON
//! report ([`stats`]), turned into a chart plan by the insight model, and rendered as SVG
//! charts ([`charts`]) that the HTTP layer serves from the plot directory ([`service`]).

use std::path::Path;

use thiserror::Error;

use banklens_agent::LlmError;

pub mod charts;
pub mod dataset;
pub mod service;
pub mod stats;

pub use charts::{wrap_text, ChartRenderer, RenderedChart};
pub use dataset::{Column, ColumnKind, Dataset};
pub use service::{EdaReport, EdaService};
pub use stats::{generate_summary, summary_json};

#[derive(Debug, Error)]
pub enum EdaError {
    #[error("CSV Error: {0}")]
    Csv(String),
    #[error("Schema Error: {0}")]
    Schema(String),
    #[error("summary could not be serialised: {0}")]
    Summary(String),
    #[error("chart template failed: {0}")]
    Template(String),
    #[error("failed to read insight prompt `{path}`: {source}")]
    Prompt {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("plot directory I/O failed at `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Llm(#[from] LlmError),
}

impl EdaError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io { path: path.display().to_string(), source }
    }

    /// Upload problems the caller can fix, as opposed to server faults.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::Csv(_) | Self::Schema(_))
    }
}
