use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use tracing::info;

use crate::cli::RunMode;
use crate::client::{ChatModel, ConversationTurn};

pub const EXIT_WORDS: [&str; 3] = ["exit", "bye", "end"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    pub prompt: String,
    pub reply: String,
}

pub fn is_exit_word(input: &str) -> bool {
    let input = input.trim();
    EXIT_WORDS.iter().any(|word| input.eq_ignore_ascii_case(word))
}

/// Runs the conversation for `mode` and echoes replies to `output`.
///
/// In single mode `prompt` is sent once. In interactive mode lines are read from `input`
/// until an exit word or end of input. With `fail_on_error` a failed exchange aborts;
/// otherwise the fallback reply stands in for it.
pub fn converse<C: ChatModel>(
    chat: &C,
    system_message: &str,
    mode: RunMode,
    prompt: &str,
    fail_on_error: bool,
    input: &mut dyn BufRead,
    output: &mut dyn Write,
) -> Result<Vec<Exchange>> {
    let mut exchanges = Vec::new();

    match mode {
        RunMode::Single => {
            let exchange = exchange(chat, system_message, prompt, fail_on_error)?;
            writeln!(output, "Model: {}", exchange.reply).context("failed to write reply")?;
            exchanges.push(exchange);
        }
        RunMode::Interactive => loop {
            write!(output, "User: ").context("failed to write prompt")?;
            output.flush().context("failed to flush prompt")?;

            let mut line = String::new();
            let read = input.read_line(&mut line).context("failed to read user input")?;
            if read == 0 {
                writeln!(output).context("failed to write newline")?;
                break;
            }

            let user_input = line.trim();
            if is_exit_word(user_input) {
                writeln!(output, "Exiting the conversation.").context("failed to write")?;
                break;
            }
            if user_input.is_empty() {
                continue;
            }

            let exchange = exchange(chat, system_message, user_input, fail_on_error)?;
            writeln!(output, "Model Response: {}", exchange.reply)
                .context("failed to write reply")?;
            exchanges.push(exchange);
        },
    }

    info!(mode = mode.as_str(), exchanges = exchanges.len(), "conversation finished");
    Ok(exchanges)
}

fn exchange<C: ChatModel>(
    chat: &C,
    system_message: &str,
    prompt: &str,
    fail_on_error: bool,
) -> Result<Exchange> {
    let turn = ConversationTurn::new(system_message, prompt);
    let reply = if fail_on_error {
        chat.send(&turn).context("chat completion failed")?
    } else {
        chat.send_or_fallback(&turn)
    };

    Ok(Exchange {
        prompt: prompt.to_string(),
        reply,
    })
}

/// Model replies joined one per line, the layout persisted as the hypothesis text.
pub fn transcript_text(exchanges: &[Exchange]) -> String {
    exchanges
        .iter()
        .map(|exchange| exchange.reply.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}
