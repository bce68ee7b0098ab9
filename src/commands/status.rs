use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::StatusArgs;
use crate::commands::run::{MANIFEST_DIR, MANIFEST_PREFIX};
use crate::model::RunManifestSummary;

pub fn run(args: StatusArgs) -> Result<()> {
    let manifest_dir = args.output_dir.join(MANIFEST_DIR);
    info!(output_dir = %args.output_dir.display(), "status requested");

    let Some(manifest_path) = latest_manifest(&manifest_dir)? else {
        warn!(path = %manifest_dir.display(), "no run manifests found");
        return Ok(());
    };

    let raw = fs::read(&manifest_path)
        .with_context(|| format!("failed to read {}", manifest_path.display()))?;
    let manifest: RunManifestSummary = serde_json::from_slice(&raw)
        .with_context(|| format!("failed to parse {}", manifest_path.display()))?;

    let paths = manifest.paths.as_ref();
    info!(
        path = %manifest_path.display(),
        run_id = %manifest.run_id.unwrap_or_default(),
        status = %manifest.status.unwrap_or_default(),
        mode = %manifest.mode.unwrap_or_default(),
        model = %manifest.model.unwrap_or_default(),
        started_at = %manifest.started_at.unwrap_or_default(),
        updated_at = %manifest.updated_at.unwrap_or_default(),
        current_stage = %manifest.current_stage.unwrap_or_default(),
        failed_stage = %manifest.failed_stage.unwrap_or_default(),
        failure_reason = %manifest.failure_reason.unwrap_or_default(),
        exchanges = manifest.exchanges.unwrap_or(0),
        cache_cleared = ?manifest.cache_cleared,
        pdf_output = %paths.and_then(|value| value.pdf_output_path.clone()).unwrap_or_default(),
        results = %paths.and_then(|value| value.results_path.clone()).unwrap_or_default(),
        "loaded run manifest"
    );

    if let Some(metrics) = &manifest.metrics {
        let bleu = metrics.pointer("/bleu/bleu").and_then(|value| value.as_f64());
        let rouge_l = metrics
            .pointer("/rouge/rougeL")
            .and_then(|value| value.as_f64());
        info!(bleu = ?bleu, rouge_l = ?rouge_l, "run metrics");
    }

    for warning in &manifest.warnings {
        warn!(warning = %warning, "run warning");
    }

    Ok(())
}

/// Manifest names carry a sortable UTC stamp, so the lexically greatest is the newest.
fn latest_manifest(manifest_dir: &Path) -> Result<Option<PathBuf>> {
    if !manifest_dir.is_dir() {
        return Ok(None);
    }

    let mut candidates = Vec::new();
    for entry in fs::read_dir(manifest_dir)
        .with_context(|| format!("failed to list {}", manifest_dir.display()))?
    {
        let path = entry?.path();
        let is_manifest = path
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.starts_with(MANIFEST_PREFIX) && name.ends_with(".json"));
        if is_manifest {
            candidates.push(path);
        }
    }

    candidates.sort();
    Ok(candidates.pop())
}
