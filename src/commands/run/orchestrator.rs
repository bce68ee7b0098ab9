use std::fs;
use std::io::{BufRead, Write};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::cli::RunMode;
use crate::client::ChatModel;
use crate::controller::{
    CommandRunner, FailureMode, ModelServer, clear_directory, is_directory_empty,
    validate_cache_path,
};
use crate::document::text_file_to_pdf;
use crate::extract::{DocumentExtractor, LineExtractor};
use crate::metrics::{MetricsResult, results_path, score_documents, write_table};
use crate::util::{ensure_directory, file_stem_for_model, read_trimmed_text, utc_compact_string};

use super::conversation::{Exchange, converse, transcript_text};
use super::stages::Stage;

/// Everything a run needs, resolved from configuration and arguments up front.
#[derive(Debug, Clone)]
pub struct RunPlan {
    pub mode: RunMode,
    pub model: String,
    pub prompt: String,
    pub system_message_path: PathBuf,
    pub output_dir: PathBuf,
    /// Embedded in the generated PDF; `None` uses the built-in Helvetica.
    pub font: Option<PathBuf>,
    /// `None` skips scoring.
    pub reference: Option<PathBuf>,
    pub results_dir: PathBuf,
    pub timestamp_results: bool,
    /// `None` skips cache cleanup.
    pub model_cache_dir: Option<PathBuf>,
    pub cleanup_failure: FailureMode,
    pub fail_on_model_error: bool,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_ts: DateTime<Utc>,
    pub completed: Vec<Stage>,
    pub current: Stage,
    pub failure_reason: Option<String>,
    pub exchanges: Vec<Exchange>,
    pub text_output: Option<PathBuf>,
    pub pdf_output: Option<PathBuf>,
    pub results_path: Option<PathBuf>,
    pub metrics: Option<MetricsResult>,
    pub cache_cleared: Option<bool>,
    pub warnings: Vec<String>,
}

impl RunReport {
    fn new(started_ts: DateTime<Utc>) -> Self {
        Self {
            started_ts,
            completed: Vec::new(),
            current: Stage::Idle,
            failure_reason: None,
            exchanges: Vec::new(),
            text_output: None,
            pdf_output: None,
            results_path: None,
            metrics: None,
            cache_cleared: None,
            warnings: Vec::new(),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.current == Stage::Done && self.failure_reason.is_none()
    }
}

pub struct Orchestrator<'a, R, C> {
    server: &'a ModelServer<R>,
    chat: &'a C,
    plan: &'a RunPlan,
    extractor: &'a dyn LineExtractor,
    report: RunReport,
}

impl<'a, R: CommandRunner, C: ChatModel> Orchestrator<'a, R, C> {
    pub fn new(
        server: &'a ModelServer<R>,
        chat: &'a C,
        plan: &'a RunPlan,
        started_ts: DateTime<Utc>,
    ) -> Self {
        Self {
            server,
            chat,
            plan,
            extractor: &DocumentExtractor,
            report: RunReport::new(started_ts),
        }
    }

    /// Replaces how the hypothesis and reference are read back for scoring.
    #[cfg(test)]
    pub fn with_extractor(mut self, extractor: &'a dyn LineExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Drives every stage in order. The first fatal error stops the run; the report
    /// keeps the stage it happened in.
    pub fn execute(mut self, input: &mut dyn BufRead, output: &mut dyn Write) -> RunReport {
        if let Err(error) = self.drive(input, output) {
            let reason = format!("{error:#}");
            warn!(stage = %self.report.current, error = %reason, "run aborted");
            self.report.failure_reason = Some(reason);
        }
        self.report
    }

    fn drive(&mut self, input: &mut dyn BufRead, output: &mut dyn Write) -> Result<()> {
        let system_message = self.check_preconditions()?;

        self.advance(Stage::ServerStarting)?;
        self.server.start_server()?;
        self.server.status()?;

        self.advance(Stage::ModelLoading)?;
        self.server.fetch_model(&self.plan.model)?;
        self.server.load_model(&self.plan.model)?;

        self.advance(Stage::Conversing)?;
        self.report.exchanges = converse(
            self.chat,
            &system_message,
            self.plan.mode,
            &self.plan.prompt,
            self.plan.fail_on_model_error,
            input,
            output,
        )?;

        self.advance(Stage::Persisting)?;
        self.persist()?;

        self.advance(Stage::ModelUnloading)?;
        self.server.unload_model(&self.plan.model)?;

        self.advance(Stage::ServerStopping)?;
        self.server.stop_server()?;

        self.advance(Stage::CacheCleanup)?;
        self.clean_cache()?;

        self.advance(Stage::Scoring)?;
        self.score(output)?;

        self.advance(Stage::Done)?;
        info!(run_stages = self.report.completed.len(), "run completed");
        Ok(())
    }

    fn advance(&mut self, stage: Stage) -> Result<()> {
        if self.report.current.next() != Some(stage) {
            bail!(
                "invalid stage transition {} -> {}",
                self.report.current,
                stage
            );
        }
        self.report.completed.push(self.report.current);
        self.report.current = stage;
        info!(stage = %stage, "entering stage");
        Ok(())
    }

    /// Input files and paths are checked before any external command runs.
    fn check_preconditions(&mut self) -> Result<String> {
        let system_message = read_trimmed_text(&self.plan.system_message_path).with_context(|| {
            format!(
                "system message file is missing or unreadable: {}",
                self.plan.system_message_path.display()
            )
        })?;

        let plan = self.plan;
        if let Some(reference) = &plan.reference {
            if !reference.is_file() {
                bail!("reference document not found: {}", reference.display());
            }
        }
        if let Some(font) = &plan.font {
            if !font.is_file() {
                bail!("font file not found: {}", font.display());
            }
        }

        if let Some(cache_dir) = &plan.model_cache_dir {
            validate_cache_path(cache_dir)?;
            if !cache_dir.exists() {
                let message = format!(
                    "model cache directory does not exist yet: {}",
                    cache_dir.display()
                );
                warn!("{message}");
                self.report.warnings.push(message);
            }
        }

        ensure_directory(&plan.output_dir)?;
        Ok(system_message)
    }

    fn persist(&mut self) -> Result<()> {
        if self.report.exchanges.is_empty() {
            let message = "conversation produced no replies".to_string();
            warn!("{message}");
            self.report.warnings.push(message);
        }

        let file_name = format!(
            "{}_{}",
            file_stem_for_model(&self.plan.model),
            utc_compact_string(self.report.started_ts)
        );
        let text_path = self.plan.output_dir.join(format!("{file_name}.txt"));
        let pdf_path = self.plan.output_dir.join(format!("{file_name}.pdf"));

        fs::write(&text_path, transcript_text(&self.report.exchanges))
            .with_context(|| format!("failed to write model output: {}", text_path.display()))?;
        info!(path = %text_path.display(), "saved model output");
        self.report.text_output = Some(text_path.clone());

        text_file_to_pdf(&text_path, &pdf_path, self.plan.font.as_deref())?;
        self.report.pdf_output = Some(pdf_path);
        Ok(())
    }

    fn clean_cache(&mut self) -> Result<()> {
        let plan = self.plan;
        let Some(cache_dir) = &plan.model_cache_dir else {
            info!("model cache cleanup skipped");
            return Ok(());
        };

        let cleared = clear_directory(cache_dir, plan.cleanup_failure)?;
        let empty = is_directory_empty(cache_dir);
        if empty {
            info!(path = %cache_dir.display(), "model directory is cleared");
        } else {
            let message = format!("model directory is not empty: {}", cache_dir.display());
            warn!("{message}");
            self.report.warnings.push(message);
        }

        self.report.cache_cleared = Some(cleared && empty);
        Ok(())
    }

    fn score(&mut self, output: &mut dyn Write) -> Result<()> {
        let plan = self.plan;
        let Some(reference) = &plan.reference else {
            info!("scoring skipped");
            return Ok(());
        };
        let Some(hypothesis) = self.report.pdf_output.clone() else {
            bail!("no generated document to score");
        };

        let metrics = score_documents(self.extractor, &hypothesis, reference)?;
        let timestamp = plan.timestamp_results.then_some(self.report.started_ts);
        let path = results_path(&plan.results_dir, timestamp);
        write_table(&metrics, &path)?;

        write_summary(output, &metrics)?;
        self.report.results_path = Some(path);
        self.report.metrics = Some(metrics);
        Ok(())
    }
}

pub fn write_summary(output: &mut dyn Write, metrics: &MetricsResult) -> Result<()> {
    for (metric, score) in metrics.rows() {
        writeln!(output, "{metric}: {score}").context("failed to write metrics summary")?;
    }
    Ok(())
}
