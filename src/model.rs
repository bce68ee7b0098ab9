use serde::{Deserialize, Serialize};

use crate::metrics::MetricsResult;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ToolVersions {
    pub server_cli: Option<String>,
    pub pdftotext: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunPaths {
    pub output_dir: String,
    pub system_message_path: String,
    pub reference_path: Option<String>,
    pub model_cache_dir: Option<String>,
    pub text_output_path: Option<String>,
    pub pdf_output_path: Option<String>,
    pub results_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SourceHash {
    pub role: String,
    pub path: String,
    pub sha256: String,
}

/// Record of one orchestrated run, written whether the run succeeds or fails.
#[derive(Debug, Clone, Serialize)]
pub struct RunManifest {
    pub manifest_version: u32,
    pub run_id: String,
    pub status: String,
    pub mode: String,
    pub started_at: String,
    pub updated_at: String,
    pub model: String,
    pub base_url: String,
    pub completed_stages: Vec<String>,
    pub current_stage: String,
    pub failed_stage: Option<String>,
    pub failure_reason: Option<String>,
    pub exchanges: usize,
    pub cache_cleared: Option<bool>,
    pub tool_versions: ToolVersions,
    pub paths: RunPaths,
    pub source_hashes: Vec<SourceHash>,
    pub metrics: Option<MetricsResult>,
    pub warnings: Vec<String>,
}

/// Subset of [`RunManifest`] read back by `status`.
#[derive(Debug, Clone, Deserialize)]
pub struct RunManifestSummary {
    pub run_id: Option<String>,
    pub status: Option<String>,
    pub mode: Option<String>,
    pub model: Option<String>,
    pub started_at: Option<String>,
    pub updated_at: Option<String>,
    pub current_stage: Option<String>,
    pub failed_stage: Option<String>,
    pub failure_reason: Option<String>,
    pub exchanges: Option<usize>,
    pub cache_cleared: Option<bool>,
    pub paths: Option<RunPaths>,
    pub metrics: Option<serde_json::Value>,
    #[serde(default)]
    pub warnings: Vec<String>,
}
