use std::fs;
use std::path::{Component, Path};
use std::process::{Command, Stdio};

use anyhow::{Context, Result, bail};
use clap::ValueEnum;
use serde::Serialize;
use tracing::{info, warn};

/// How a failed operation affects the caller.
#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureMode {
    /// The failure is returned as an error and aborts the run.
    Fatal,
    /// The failure is logged and the caller continues.
    Recoverable,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Operation {
    StartServer,
    StopServer,
    Status,
    FetchModel,
    LoadModel,
    UnloadModel,
    ClearDirectory,
}

impl Operation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::StartServer => "start_server",
            Self::StopServer => "stop_server",
            Self::Status => "status",
            Self::FetchModel => "fetch_model",
            Self::LoadModel => "load_model",
            Self::UnloadModel => "unload_model",
            Self::ClearDirectory => "clear_directory",
        }
    }

    pub fn default_failure_mode(self) -> FailureMode {
        match self {
            Self::ClearDirectory => FailureMode::Recoverable,
            _ => FailureMode::Fatal,
        }
    }
}

/// Per-operation failure modes, overridable from the command line.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct FailurePolicy {
    pub lifecycle: FailureMode,
    pub cleanup: FailureMode,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            lifecycle: Operation::StartServer.default_failure_mode(),
            cleanup: Operation::ClearDirectory.default_failure_mode(),
        }
    }
}

impl FailurePolicy {
    pub fn mode_for(&self, operation: Operation) -> FailureMode {
        match operation {
            Operation::ClearDirectory => self.cleanup,
            _ => self.lifecycle,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// Exit code as reported to callers; signal termination maps to -1.
    pub fn exit_code(&self) -> i32 {
        self.code.unwrap_or(-1)
    }
}

pub trait CommandRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutcome>;
}

/// Runs commands as child processes, without a shell. The child shares the terminal's
/// stdin so confirmation prompts can be answered; its output is captured.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str]) -> Result<CommandOutcome> {
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::inherit())
            .output()
            .with_context(|| format!("failed to execute {} {}", program, args.join(" ")))?;

        Ok(CommandOutcome {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Lifecycle commands against the external model-serving CLI.
#[derive(Debug, Clone)]
pub struct ModelServer<R> {
    program: String,
    runner: R,
    policy: FailurePolicy,
}

impl<R: CommandRunner> ModelServer<R> {
    pub fn new(program: impl Into<String>, runner: R, policy: FailurePolicy) -> Self {
        Self {
            program: program.into(),
            runner,
            policy,
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    pub fn start_server(&self) -> Result<i32> {
        self.execute(Operation::StartServer, &["server", "start"])
    }

    pub fn stop_server(&self) -> Result<i32> {
        self.execute(Operation::StopServer, &["server", "stop"])
    }

    pub fn status(&self) -> Result<i32> {
        self.execute(Operation::Status, &["server", "status"])
    }

    pub fn fetch_model(&self, name: &str) -> Result<i32> {
        self.execute(Operation::FetchModel, &["get", name])
    }

    pub fn load_model(&self, name: &str) -> Result<i32> {
        self.execute(Operation::LoadModel, &["load", name])
    }

    pub fn unload_model(&self, name: &str) -> Result<i32> {
        self.execute(Operation::UnloadModel, &["unload", name])
    }

    /// First line of `<program> version`, if the tool answers.
    pub fn version(&self) -> Option<String> {
        let outcome = self.runner.run(&self.program, &["version"]).ok()?;
        let source = if outcome.stdout.is_empty() {
            outcome.stderr
        } else {
            outcome.stdout
        };
        source
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(ToOwned::to_owned)
    }

    fn execute(&self, operation: Operation, args: &[&str]) -> Result<i32> {
        let mode = self.policy.mode_for(operation);
        let rendered = format!("{} {}", self.program, args.join(" "));
        info!(operation = operation.as_str(), command = %rendered, "running lifecycle command");

        let outcome = match self.runner.run(&self.program, args) {
            Ok(outcome) => outcome,
            Err(error) => {
                if mode == FailureMode::Fatal {
                    return Err(error)
                        .with_context(|| format!("{} failed to launch", operation.as_str()));
                }
                warn!(
                    operation = operation.as_str(),
                    error = %error,
                    "lifecycle command failed to launch, continuing"
                );
                return Ok(-1);
            }
        };

        for line in outcome.stdout.lines().filter(|line| !line.trim().is_empty()) {
            info!(operation = operation.as_str(), "{}", line.trim());
        }

        let code = outcome.exit_code();
        if outcome.success() {
            return Ok(code);
        }

        if mode == FailureMode::Fatal {
            bail!(
                "command '{}' failed with exit code {}: {}",
                rendered,
                code,
                outcome.stderr
            );
        }

        warn!(
            operation = operation.as_str(),
            exit_code = code,
            stderr = %outcome.stderr,
            "lifecycle command failed, continuing"
        );
        Ok(code)
    }
}

/// Rejects paths that must never be wiped.
pub fn validate_cache_path(path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        bail!("model cache path is empty");
    }
    if path.parent().is_none() {
        bail!("refusing to clear filesystem root: {}", path.display());
    }
    if path
        .components()
        .all(|component| matches!(component, Component::CurDir))
    {
        bail!("refusing to clear the working directory: {}", path.display());
    }
    if path
        .components()
        .any(|component| matches!(component, Component::ParentDir))
    {
        bail!("refusing to clear a path that climbs out with '..': {}", path.display());
    }
    Ok(())
}

/// Removes a directory tree and recreates it empty.
///
/// A missing directory is not an error; it is simply created. Under
/// [`FailureMode::Recoverable`] other errors are logged and `Ok(false)` is returned.
pub fn clear_directory(path: &Path, mode: FailureMode) -> Result<bool> {
    match recreate_directory(path) {
        Ok(()) => {
            info!(path = %path.display(), "cleared directory contents");
            Ok(true)
        }
        Err(error) if mode == FailureMode::Recoverable => {
            warn!(path = %path.display(), error = %error, "failed to clear directory");
            Ok(false)
        }
        Err(error) => Err(error),
    }
}

fn recreate_directory(path: &Path) -> Result<()> {
    validate_cache_path(path)?;

    if path.exists() {
        fs::remove_dir_all(path)
            .with_context(|| format!("failed to remove directory: {}", path.display()))?;
    }
    fs::create_dir_all(path)
        .with_context(|| format!("failed to recreate directory: {}", path.display()))
}

pub fn is_directory_empty(path: &Path) -> bool {
    match fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(error) => {
            warn!(path = %path.display(), error = %error, "failed to inspect directory");
            false
        }
    }
}


#[cfg(test)]
mod tests {
    use super::testing::FakeRunner;
    use super::*;

    #[test]
    fn lifecycle_commands_map_to_cli_arguments() {
        let server = ModelServer::new("lms", FakeRunner::default(), FailurePolicy::default());

        server.start_server().expect("start");
        server.status().expect("status");
        server.fetch_model("qwen2-0.5b-instruct").expect("get");
        server.load_model("qwen2-0.5b-instruct").expect("load");
        server.unload_model("qwen2-0.5b-instruct").expect("unload");
        server.stop_server().expect("stop");

        assert_eq!(
            server.runner().calls(),
            vec![
                "server start",
                "server status",
                "get qwen2-0.5b-instruct",
                "load qwen2-0.5b-instruct",
                "unload qwen2-0.5b-instruct",
                "server stop",
            ]
        );
    }

    #[test]
    fn non_zero_exit_is_fatal_by_default() {
        let server = ModelServer::new(
            "lms",
            FakeRunner::failing("server start", 1),
            FailurePolicy::default(),
        );

        let error = server.start_server().expect_err("start should fail");
        assert!(error.to_string().contains("exit code 1"));
    }

    #[test]
    fn recoverable_policy_returns_exit_code() {
        let policy = FailurePolicy {
            lifecycle: FailureMode::Recoverable,
            cleanup: FailureMode::Recoverable,
        };
        let server = ModelServer::new("lms", FakeRunner::failing("unload m", 3), policy);

        assert_eq!(server.unload_model("m").expect("recoverable"), 3);
    }

    #[test]
    fn default_modes_split_lifecycle_and_cleanup() {
        assert_eq!(
            Operation::LoadModel.default_failure_mode(),
            FailureMode::Fatal
        );
        assert_eq!(
            Operation::ClearDirectory.default_failure_mode(),
            FailureMode::Recoverable
        );
    }

    #[test]
    fn clear_directory_removes_contents() {
        let root = tempfile::tempdir().expect("tempdir");
        let cache = root.path().join("models");
        fs::create_dir_all(cache.join("publisher/model")).expect("create tree");
        fs::write(cache.join("publisher/model/weights.gguf"), b"weights").expect("write");

        assert!(!is_directory_empty(&cache));
        assert!(clear_directory(&cache, FailureMode::Fatal).expect("clear"));
        assert!(is_directory_empty(&cache));
    }

    #[test]
    fn clear_directory_creates_missing_path() {
        let root = tempfile::tempdir().expect("tempdir");
        let cache = root.path().join("does").join("not").join("exist");

        assert!(clear_directory(&cache, FailureMode::Recoverable).expect("clear"));
        assert!(cache.is_dir());
        assert!(is_directory_empty(&cache));
    }

    #[test]
    fn is_directory_empty_is_false_for_missing_path() {
        let root = tempfile::tempdir().expect("tempdir");
        assert!(!is_directory_empty(&root.path().join("missing")));
    }

    #[test]
    fn validate_cache_path_rejects_root_and_empty() {
        assert!(validate_cache_path(Path::new("")).is_err());
        assert!(validate_cache_path(Path::new("/")).is_err());
        assert!(validate_cache_path(Path::new(".")).is_err());
        assert!(validate_cache_path(Path::new("/tmp/models")).is_ok());
    }

    #[test]
    fn validate_cache_path_rejects_parent_components() {
        assert!(validate_cache_path(Path::new("..")).is_err());
        assert!(validate_cache_path(Path::new("./..")).is_err());
        assert!(validate_cache_path(Path::new("cache/../..")).is_err());
        assert!(validate_cache_path(Path::new("cache/models")).is_ok());
    }

    #[test]
    fn clear_directory_leaves_parent_paths_untouched() {
        let root = tempfile::tempdir().expect("tempdir");
        let keep = root.path().join("keep.txt");
        fs::write(&keep, b"keep").expect("write");
        fs::create_dir_all(root.path().join("cache")).expect("create cache");
        let escaping = root.path().join("cache").join("..");

        assert!(!clear_directory(&escaping, FailureMode::Recoverable).expect("recoverable"));
        assert!(keep.is_file());
    }

    #[cfg(unix)]
    #[test]
    fn system_runner_reports_exit_code_and_output() {
        let outcome = SystemRunner
            .run("sh", &["-c", "echo ready; echo oops >&2; exit 3"])
            .expect("run sh");

        assert_eq!(outcome.code, Some(3));
        assert!(!outcome.success());
        assert_eq!(outcome.stdout, "ready");
        assert_eq!(outcome.stderr, "oops");
    }

    #[test]
    fn system_runner_reports_missing_program() {
        assert!(SystemRunner.run("lms-eval-no-such-program", &[]).is_err());
    }

    #[test]
    fn recoverable_clear_reports_invalid_path_without_error() {
        assert!(!clear_directory(Path::new(""), FailureMode::Recoverable).expect("recoverable"));
        assert!(clear_directory(Path::new(""), FailureMode::Fatal).is_err());
    }
}
