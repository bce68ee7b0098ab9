use std::io;

use anyhow::Result;
use tracing::info;

use crate::cli::ChatArgs;
use crate::client::ChatClient;
use crate::commands::run::conversation::converse;
use crate::settings::{Endpoint, load_optional};
use crate::util::read_trimmed_text;

pub fn run(args: ChatArgs) -> Result<()> {
    let settings = load_optional(&args.config)?;
    let endpoint = Endpoint::resolve(&settings, &args.endpoint)?;
    let system_message = read_trimmed_text(&args.system_message)?;
    let prompt = args.prompt.clone().unwrap_or_else(|| settings.prompt());

    let chat = ChatClient::new(&endpoint)?;
    info!(url = %chat.url(), mode = args.mode.as_str(), "chat session started");

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    let exchanges = converse(
        &chat,
        &system_message,
        args.mode,
        &prompt,
        false,
        &mut input,
        &mut output,
    )?;

    info!(exchanges = exchanges.len(), "chat session ended");
    Ok(())
}
