//! Command dispatch for subcommands that talk to a log server.

pub mod channels;
pub mod config_cmd;
pub mod tail;

use logtail_core::ClientConfig;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Dispatch a server-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    client_config: ClientConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Tail(args) => tail::handle(client_config, args, global).await,
        Command::Channels(args) => channels::handle(client_config, &args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to the server dispatcher".into(),
        )),
    }
}
