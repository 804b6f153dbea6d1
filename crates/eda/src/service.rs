use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use banklens_agent::{ChatCompletionsClient, InsightGenerator, PlanSource};
use banklens_core::config::AppConfig;

use crate::charts::ChartRenderer;
use crate::dataset::Dataset;
use crate::stats::summary_json;
use crate::EdaError;

pub const PLOT_URL_PREFIX: &str = "static/plots";

/// Upload response body. Key spellings are part of the public contract.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EdaReport {
    #[serde(rename = "EDA report")]
    pub eda_report: String,
    pub schema: String,
    pub summary: String,
    pub plot_urls: Vec<String>,
}

pub struct EdaService {
    insights: InsightGenerator,
    renderer: ChartRenderer,
    plot_dir: PathBuf,
    public_host_url: String,
    // one upload at a time owns the plot directory
    render_lock: Mutex<()>,
}

impl EdaService {
    pub fn new(
        insights: InsightGenerator,
        renderer: ChartRenderer,
        plot_dir: impl Into<PathBuf>,
        public_host_url: impl Into<String>,
    ) -> Self {
        Self {
            insights,
            renderer,
            plot_dir: plot_dir.into(),
            public_host_url: public_host_url.into().trim_end_matches('/').to_string(),
            render_lock: Mutex::new(()),
        }
    }

    pub async fn from_config(config: &AppConfig) -> Result<Self, EdaError> {
        let settings = &config.insights;
        let client = ChatCompletionsClient::from_config(&settings.llm)?;
        let mut insights =
            InsightGenerator::new(Arc::new(client), settings.llm.clone(), settings.max_attempts);
        if let Some(path) = &settings.prompt_path {
            let prompt = tokio::fs::read_to_string(path).await.map_err(|source| {
                EdaError::Prompt { path: path.display().to_string(), source }
            })?;
            insights = insights.with_prompt(prompt);
        }

        Ok(Self::new(
            insights,
            ChartRenderer::new()?,
            config.eda.plot_dir.clone(),
            config.eda.public_host_url.clone(),
        ))
    }

    pub fn plot_dir(&self) -> &Path {
        &self.plot_dir
    }

    pub fn plot_url(&self, file_name: &str) -> String {
        format!("{}/{PLOT_URL_PREFIX}/{file_name}", self.public_host_url)
    }

    /// Summarises the upload, asks for a chart plan and renders it into the plot directory.
    pub async fn analyze(&self, csv: &[u8], schema: &[u8]) -> Result<EdaReport, EdaError> {
        let dataset = Dataset::from_csv_bytes(csv)?;
        let schema = std::str::from_utf8(schema)
            .map_err(|error| EdaError::Schema(format!("file is not valid UTF-8: {error}")))?
            .to_string();

        let summary = summary_json(&dataset)?;
        info!(
            event_name = "eda.upload.parsed",
            rows = dataset.row_count(),
            columns = dataset.columns().len(),
            "dataset summarised"
        );

        let (plan, source) = self.insights.generate_with_source(&summary, &schema).await;
        if let PlanSource::Fallback { reason } = &source {
            warn!(event_name = "eda.insights.fallback", reason = ?reason, "using fallback chart plan");
        }

        let charts = self.renderer.render_plan(&plan, &dataset)?;

        let _guard = self.render_lock.lock().await;
        clear_plot_dir(&self.plot_dir).await?;
        let mut plot_urls = Vec::with_capacity(charts.len());
        for chart in &charts {
            let path = self.plot_dir.join(&chart.file_name);
            tokio::fs::write(&path, &chart.svg)
                .await
                .map_err(|source| EdaError::io(&path, source))?;
            plot_urls.push(self.plot_url(&chart.file_name));
        }
        info!(event_name = "eda.charts.written", count = plot_urls.len(), "charts rendered");

        Ok(EdaReport {
            eda_report: summary,
            schema,
            summary: plan.summary_text().to_string(),
            plot_urls,
        })
    }
}

/// Creates the directory if needed and removes the files left by the previous upload.
pub async fn clear_plot_dir(dir: &Path) -> Result<(), EdaError> {
    tokio::fs::create_dir_all(dir).await.map_err(|source| EdaError::io(dir, source))?;
    let mut entries = tokio::fs::read_dir(dir).await.map_err(|source| EdaError::io(dir, source))?;
    while let Some(entry) = entries.next_entry().await.map_err(|source| EdaError::io(dir, source))? {
        let path = entry.path();
        let file_type = entry.file_type().await.map_err(|source| EdaError::io(&path, source))?;
        if file_type.is_file() {
            tokio::fs::remove_file(&path).await.map_err(|source| EdaError::io(&path, source))?;
        }
    }
    Ok(())
}
