//! `logtail channels`: connect, wait for the channel list, print it.

use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::debug;

use logtail_core::{
    ChannelOptions, ClientConfig, ConnectionState, CoreError, EventFields, EventSink, LogClient,
    ProtocolNotification,
};

use crate::cli::{ChannelsArgs, GlobalOpts};
use crate::error::CliError;
use crate::output;

/// Forwards the first channel lists out of the client task.
struct ChannelListSink {
    options: mpsc::UnboundedSender<ChannelOptions>,
    quiet: bool,
}

impl EventSink for ChannelListSink {
    fn render_event(&mut self, _fields: &EventFields) {}

    fn refresh_channel_options(&mut self, options: &ChannelOptions) {
        if self.options.send(options.clone()).is_err() {
            debug!("channel list receiver gone, dropping update");
        }
    }

    fn notify_connection_status(&mut self, state: &ConnectionState) {
        debug!(%state, "connection state changed");
    }

    fn on_notification(&mut self, notification: &ProtocolNotification) {
        if !self.quiet {
            eprintln!("! {notification}");
        }
    }

    fn report_error(&mut self, error: &CoreError) {
        debug!(%error, "log client reported an error");
    }
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet || !std::io::stderr().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message("waiting for channel list…");
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub async fn handle(
    client_config: ClientConfig,
    args: &ChannelsArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    // The profile's channels stay subscribed so the listing can mark them;
    // their events are dropped by the sink.
    let url = client_config.url.to_string();
    let attempts = client_config.retry.max_retries;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let client = LogClient::spawn(
        client_config,
        ChannelListSink {
            options: tx,
            quiet: global.quiet,
        },
    );
    let mut state = client.connection_state();
    let pb = spinner(global.quiet);

    let received = tokio::select! {
        options = rx.recv() => options.ok_or(CliError::ClientStopped),
        res = state.wait_for(ConnectionState::is_terminal) => {
            if res.is_ok() {
                Err(CliError::RetryExhausted { url, attempts })
            } else {
                Err(CliError::ClientStopped)
            }
        }
        () = tokio::time::sleep(Duration::from_secs(args.timeout)) => {
            Err(CliError::Timeout { seconds: args.timeout })
        }
    };

    pb.finish_and_clear();
    client.shutdown().await?;

    let rendered = output::render_channels(global.output, &received?)?;
    output::print_output(&rendered);
    Ok(())
}
