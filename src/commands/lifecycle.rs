use anyhow::Result;
use tracing::info;

use crate::cli::{ModelAction, ModelArgs, ServerAction, ServerArgs};
use crate::controller::{CommandRunner, FailurePolicy, ModelServer, SystemRunner};

pub fn run_server(args: ServerArgs) -> Result<()> {
    let server = ModelServer::new(args.cli_program, SystemRunner, FailurePolicy::default());
    let code = server_action(&server, args.action)?;
    info!(program = server.program(), exit_code = code, "server command finished");
    Ok(())
}

pub fn run_model(args: ModelArgs) -> Result<()> {
    let server = ModelServer::new(args.cli_program, SystemRunner, FailurePolicy::default());
    let code = model_action(&server, args.action, &args.name)?;
    info!(model = %args.name, exit_code = code, "model command finished");
    Ok(())
}

fn server_action<R: CommandRunner>(server: &ModelServer<R>, action: ServerAction) -> Result<i32> {
    match action {
        ServerAction::Start => server.start_server(),
        ServerAction::Stop => server.stop_server(),
        ServerAction::Status => server.status(),
    }
}

fn model_action<R: CommandRunner>(
    server: &ModelServer<R>,
    action: ModelAction,
    name: &str,
) -> Result<i32> {
    match action {
        ModelAction::Get => server.fetch_model(name),
        ModelAction::Load => server.load_model(name),
        ModelAction::Unload => server.unload_model(name),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::testing::FakeRunner;

    #[test]
    fn actions_map_to_cli_commands() {
        let server = ModelServer::new("lms", FakeRunner::default(), FailurePolicy::default());

        server_action(&server, ServerAction::Status).expect("status");
        model_action(&server, ModelAction::Get, "qwen").expect("get");
        model_action(&server, ModelAction::Unload, "qwen").expect("unload");

        assert_eq!(
            server.runner().calls(),
            vec!["server status", "get qwen", "unload qwen"]
        );
    }

    #[test]
    fn failed_action_is_an_error() {
        let server = ModelServer::new(
            "lms",
            FakeRunner::failing("server stop", 3),
            FailurePolicy::default(),
        );
        assert!(server_action(&server, ServerAction::Stop).is_err());
    }
}
