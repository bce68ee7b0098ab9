use std::io;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use chrono::Utc;
use tracing::info;

use crate::cli::RunArgs;
use crate::client::ChatClient;
use crate::controller::{FailurePolicy, ModelServer, SystemRunner};
use crate::extract::pdftotext_version;
use crate::model::{RunManifest, RunPaths, SourceHash, ToolVersions};
use crate::settings::{Endpoint, Settings, load_optional};
use crate::util::{now_utc_string, sha256_file, utc_compact_string, write_json_pretty};

pub mod conversation;
mod orchestrator;
mod stages;

pub use orchestrator::{Orchestrator, RunPlan, RunReport, write_summary};

pub const MANIFEST_DIR: &str = "manifests";
pub const MANIFEST_PREFIX: &str = "run_";

pub fn run(args: RunArgs) -> Result<()> {
    let started_ts = Utc::now();
    let started_at = now_utc_string();
    let run_id = format!("run-{}", utc_compact_string(started_ts));

    let settings = load_optional(&args.config)?;
    let endpoint = Endpoint::resolve(&settings, &args.endpoint)?;
    let plan = build_plan(&args, &settings);

    info!(
        run_id = %run_id,
        mode = args.mode.as_str(),
        model = %plan.model,
        base_url = %endpoint.base_url,
        "starting run"
    );

    let policy = FailurePolicy {
        lifecycle: args.lifecycle_failure,
        cleanup: args.cleanup_failure,
    };
    let server = ModelServer::new(args.cli_program.clone(), SystemRunner, policy);
    let chat = ChatClient::new(&endpoint)?;

    let tool_versions = ToolVersions {
        server_cli: server.version(),
        pdftotext: pdftotext_version(),
    };

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let report = Orchestrator::new(&server, &chat, &plan, started_ts).execute(&mut input, &mut output);

    let manifest = build_manifest(
        &run_id,
        started_at,
        &plan,
        &endpoint,
        tool_versions,
        &report,
    );
    let manifest_path = manifest_path(&plan.output_dir, &report);
    write_json_pretty(&manifest_path, &manifest)?;
    info!(path = %manifest_path.display(), "wrote run manifest");

    if let Some(reason) = &report.failure_reason {
        bail!("run failed during {}: {}", report.current, reason);
    }
    Ok(())
}

pub fn build_plan(args: &RunArgs, settings: &Settings) -> RunPlan {
    let model_cache_dir = if args.skip_cache_cleanup {
        None
    } else {
        Some(
            args.model_cache_dir
                .clone()
                .unwrap_or_else(|| PathBuf::from(settings.model_path())),
        )
    };

    RunPlan {
        mode: args.mode,
        model: settings.model(),
        prompt: settings.prompt(),
        system_message_path: args.system_message.clone(),
        output_dir: args.output_dir.clone(),
        font: args.font.clone(),
        reference: (!args.skip_scoring).then(|| args.reference.clone()),
        results_dir: args.results_dir.clone(),
        timestamp_results: args.timestamp_results,
        model_cache_dir,
        cleanup_failure: args.cleanup_failure,
        fail_on_model_error: args.fail_on_model_error,
    }
}

pub fn manifest_path(output_dir: &Path, report: &RunReport) -> PathBuf {
    output_dir.join(MANIFEST_DIR).join(format!(
        "{MANIFEST_PREFIX}{}.json",
        utc_compact_string(report.started_ts)
    ))
}

pub fn build_manifest(
    run_id: &str,
    started_at: String,
    plan: &RunPlan,
    endpoint: &Endpoint,
    tool_versions: ToolVersions,
    report: &RunReport,
) -> RunManifest {
    let mut warnings = report.warnings.clone();
    let mut source_hashes = Vec::new();
    let documents = [
        ("hypothesis", report.pdf_output.as_deref()),
        ("reference", plan.reference.as_deref()),
    ];
    for (role, path) in documents {
        let Some(path) = path.filter(|path| path.is_file()) else {
            continue;
        };
        match sha256_file(path).with_context(|| format!("failed to hash {role} document")) {
            Ok(sha256) => source_hashes.push(SourceHash {
                role: role.to_string(),
                path: path.display().to_string(),
                sha256,
            }),
            Err(error) => warnings.push(format!("{error:#}")),
        }
    }

    let succeeded = report.succeeded();
    RunManifest {
        manifest_version: 1,
        run_id: run_id.to_string(),
        status: if succeeded { "completed" } else { "failed" }.to_string(),
        mode: plan.mode.as_str().to_string(),
        started_at,
        updated_at: now_utc_string(),
        model: plan.model.clone(),
        base_url: endpoint.base_url.clone(),
        completed_stages: report
            .completed
            .iter()
            .map(|stage| stage.as_str().to_string())
            .collect(),
        current_stage: report.current.as_str().to_string(),
        failed_stage: (!succeeded).then(|| report.current.as_str().to_string()),
        failure_reason: report.failure_reason.clone(),
        exchanges: report.exchanges.len(),
        cache_cleared: report.cache_cleared,
        tool_versions,
        paths: RunPaths {
            output_dir: plan.output_dir.display().to_string(),
            system_message_path: plan.system_message_path.display().to_string(),
            reference_path: plan.reference.as_ref().map(|path| path.display().to_string()),
            model_cache_dir: plan
                .model_cache_dir
                .as_ref()
                .map(|path| path.display().to_string()),
            text_output_path: report
                .text_output
                .as_ref()
                .map(|path| path.display().to_string()),
            pdf_output_path: report
                .pdf_output
                .as_ref()
                .map(|path| path.display().to_string()),
            results_path: report
                .results_path
                .as_ref()
                .map(|path| path.display().to_string()),
        },
        source_hashes,
        metrics: report.metrics.clone(),
        warnings,
    }
}
