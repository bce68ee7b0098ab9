use std::io::{self, Write};

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::info;

use crate::cli::ScoreArgs;
use crate::commands::run::write_summary;
use crate::extract::DocumentExtractor;
use crate::metrics::{results_path, score_documents, write_table};

pub fn run(args: ScoreArgs) -> Result<()> {
    let metrics = score_documents(&DocumentExtractor, &args.hypothesis, &args.reference)?;
    let path = results_path(&args.results_dir, args.timestamp_results.then(Utc::now));
    write_table(&metrics, &path)?;
    info!(
        path = %path.display(),
        pairs = metrics.pairs_scored,
        bleu = metrics.bleu.bleu,
        "scored documents"
    );

    let mut stdout = io::stdout();
    if args.json {
        let rendered =
            serde_json::to_string_pretty(&metrics).context("failed to serialize metrics")?;
        writeln!(stdout, "{rendered}").context("failed to write metrics")?;
    } else {
        write_summary(&mut stdout, &metrics)?;
    }
    Ok(())
}
