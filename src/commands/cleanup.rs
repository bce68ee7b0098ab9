use anyhow::{Result, bail};
use tracing::{info, warn};

use crate::cli::CleanCacheArgs;
use crate::controller::{FailureMode, clear_directory, is_directory_empty};

pub fn run(args: CleanCacheArgs) -> Result<()> {
    let cleared = clear_directory(&args.path, args.failure)?;
    if cleared && is_directory_empty(&args.path) {
        info!(path = %args.path.display(), "model directory is cleared");
        return Ok(());
    }

    warn!(path = %args.path.display(), "model directory is not empty");
    if args.failure == FailureMode::Fatal {
        bail!("failed to clear {}", args.path.display());
    }
    Ok(())
}
