use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::controller::FailureMode;

#[derive(Parser, Debug)]
#[command(
    name = "lms-eval",
    version,
    about = "Drive a local model server, capture its output and score it with BLEU/ROUGE"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Run(RunArgs),
    Chat(ChatArgs),
    Server(ServerArgs),
    Model(ModelArgs),
    CleanCache(CleanCacheArgs),
    Convert(ConvertArgs),
    Score(ScoreArgs),
    Status(StatusArgs),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum RunMode {
    Single,
    Interactive,
}

impl RunMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Interactive => "interactive",
        }
    }
}

#[derive(Args, Debug, Clone)]
pub struct EndpointArgs {
    /// Overrides BASE_URL from the configuration file.
    #[arg(long)]
    pub base_url: Option<String>,

    /// Overrides TEMPERATURE from the configuration file.
    #[arg(long)]
    pub temperature: Option<f64>,

    /// Model name sent in the request body; overrides REQUEST_MODEL.
    #[arg(long)]
    pub request_model: Option<String>,

    /// No timeout unless set; an unresponsive server blocks the run.
    #[arg(long)]
    pub timeout_secs: Option<u64>,
}

#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    #[arg(long, default_value = "config.ini")]
    pub config: PathBuf,

    #[arg(long, default_value = "DEFAULT")]
    pub environment: String,
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub endpoint: EndpointArgs,

    #[arg(long, value_enum, default_value_t = RunMode::Single)]
    pub mode: RunMode,

    #[arg(long, default_value = "system_message.txt")]
    pub system_message: PathBuf,

    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,

    /// TrueType font embedded in the generated PDF; needed for text outside Latin-1.
    #[arg(long)]
    pub font: Option<PathBuf>,

    #[arg(long, default_value = "reference.pdf")]
    pub reference: PathBuf,

    #[arg(long, default_value = ".")]
    pub results_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub timestamp_results: bool,

    #[arg(long, default_value_t = false)]
    pub skip_scoring: bool,

    #[arg(long, default_value_t = false)]
    pub skip_cache_cleanup: bool,

    /// Overrides MODEL_PATH from the configuration file.
    #[arg(long)]
    pub model_cache_dir: Option<PathBuf>,

    #[arg(long, default_value = "lms")]
    pub cli_program: String,

    #[arg(long, value_enum, default_value_t = FailureMode::Fatal)]
    pub lifecycle_failure: FailureMode,

    #[arg(long, value_enum, default_value_t = FailureMode::Recoverable)]
    pub cleanup_failure: FailureMode,

    #[arg(long, default_value_t = false)]
    pub fail_on_model_error: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ChatArgs {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(flatten)]
    pub endpoint: EndpointArgs,

    #[arg(long, default_value = "system_message.txt")]
    pub system_message: PathBuf,

    /// Sends this prompt once instead of the configured PROMPT.
    #[arg(long)]
    pub prompt: Option<String>,

    #[arg(long, value_enum, default_value_t = RunMode::Interactive)]
    pub mode: RunMode,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ServerAction {
    Start,
    Stop,
    Status,
}

#[derive(Args, Debug, Clone)]
pub struct ServerArgs {
    #[arg(value_enum)]
    pub action: ServerAction,

    #[arg(long, default_value = "lms")]
    pub cli_program: String,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
pub enum ModelAction {
    Get,
    Load,
    Unload,
}

#[derive(Args, Debug, Clone)]
pub struct ModelArgs {
    #[arg(value_enum)]
    pub action: ModelAction,

    pub name: String,

    #[arg(long, default_value = "lms")]
    pub cli_program: String,
}

#[derive(Args, Debug, Clone)]
pub struct CleanCacheArgs {
    #[arg(long)]
    pub path: PathBuf,

    #[arg(long, value_enum, default_value_t = FailureMode::Recoverable)]
    pub failure: FailureMode,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    #[arg(long)]
    pub input: PathBuf,

    /// Defaults to the input path with a `.pdf` extension.
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[arg(long)]
    pub font: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
pub struct ScoreArgs {
    #[arg(long, default_value = "predictions.pdf")]
    pub hypothesis: PathBuf,

    #[arg(long, default_value = "reference.pdf")]
    pub reference: PathBuf,

    #[arg(long, default_value = ".")]
    pub results_dir: PathBuf,

    #[arg(long, default_value_t = false)]
    pub timestamp_results: bool,

    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = "output")]
    pub output_dir: PathBuf,
}
