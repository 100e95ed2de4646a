//! `logtail tail`: stream events until Ctrl-C or until reconnects run out.

use chrono::Local;
use owo_colors::OwoColorize;
use tracing::{debug, warn};

use logtail_core::{
    ChannelOptions, ClientConfig, ConnectionState, CoreError, DecodeError, EventFields,
    EventSink, LogClient, ProtocolNotification, RetryPolicy,
};

use crate::cli::{GlobalOpts, TailArgs};
use crate::error::CliError;
use crate::output::{self, EventFormat};

/// Events to stdout, everything else to stderr.
struct StreamSink {
    format: EventFormat,
    retry: RetryPolicy,
    quiet: bool,
    color: bool,
}

impl StreamSink {
    fn status(&self, text: &str) {
        if self.quiet {
            return;
        }
        if self.color {
            eprintln!("{}", text.dimmed());
        } else {
            eprintln!("{text}");
        }
    }
}

impl EventSink for StreamSink {
    fn render_event(&mut self, fields: &EventFields) {
        match self.format.render(fields, Local::now()) {
            Ok(line) => output::print_output(&line),
            Err(e) => warn!(error = %e, "failed to render event"),
        }
    }

    fn refresh_channel_options(&mut self, options: &ChannelOptions) {
        debug!(
            available = options.available.len(),
            selected = options.selected.len(),
            "channel list refreshed"
        );
        if options.selected.is_empty() {
            self.status(&format!(
                "· not following any advertised channel; available: {}",
                options.available.join(", ")
            ));
        }
    }

    fn notify_connection_status(&mut self, state: &ConnectionState) {
        match state {
            ConnectionState::Open => self.status("● connected"),
            ConnectionState::Retrying { attempt } => {
                let delay = self.retry.delay_for(*attempt);
                self.status(&format!(
                    "○ connection lost, retrying in {}s (attempt {attempt}/{})",
                    delay.as_secs(),
                    self.retry.max_retries
                ));
            }
            other => debug!(state = %other, "connection state changed"),
        }
    }

    fn on_notification(&mut self, notification: &ProtocolNotification) {
        if self.quiet {
            return;
        }
        if self.color {
            eprintln!("{} {notification}", "!".yellow().bold());
        } else {
            eprintln!("! {notification}");
        }
    }

    fn report_error(&mut self, error: &CoreError) {
        // Surfaced through the terminal state instead.
        debug!(%error, "log client reported an error");
    }

    fn on_unhandled(&mut self, type_tag: Option<&str>) {
        debug!(type_tag, "ignored unhandled frame");
    }

    fn on_decode_error(&mut self, error: &DecodeError) {
        warn!(%error, "dropped unreadable frame");
    }
}

pub async fn handle(
    mut client_config: ClientConfig,
    args: TailArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !args.channels.is_empty() {
        client_config.channels = args.channels.into_iter().collect();
    }
    if client_config.channels.is_empty() && !global.quiet {
        eprintln!("No channels selected. Pass channel names or set `channels` on the profile.");
    }

    let url = client_config.url.to_string();
    let retry = client_config.retry;
    let color = output::should_color(global.color);
    let sink = StreamSink {
        format: EventFormat {
            output: global.output,
            color,
            timestamps: args.timestamps,
            fields: args.fields,
        },
        retry,
        quiet: global.quiet,
        color,
    };

    let client = LogClient::spawn(client_config, sink);
    let mut state = client.connection_state();

    let outcome = tokio::select! {
        res = tokio::signal::ctrl_c() => res.map_err(CliError::from),
        res = state.wait_for(ConnectionState::is_terminal) => {
            if res.is_ok() {
                Err(CliError::RetryExhausted {
                    url,
                    attempts: retry.max_retries,
                })
            } else {
                Err(CliError::ClientStopped)
            }
        }
    };

    client.shutdown().await?;
    outcome
}
