use std::path::{Path, PathBuf};

use anyhow::Result;
use tracing::info;

use crate::cli::ConvertArgs;
use crate::document::text_file_to_pdf;

pub fn run(args: ConvertArgs) -> Result<()> {
    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));
    text_file_to_pdf(&args.input, &output, args.font.as_deref())?;
    info!(input = %args.input.display(), output = %output.display(), "converted");
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    input.with_extension("pdf")
}
