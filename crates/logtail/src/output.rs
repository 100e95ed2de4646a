//! Output formatting: streamed event lines and channel listings.
//!
//! Streamed events go through [`EventFormat`]; one-shot listings go through
//! [`render_channels`]. Status chatter never touches stdout.

use std::io::{self, IsTerminal, Write};

use chrono::{DateTime, Local, SecondsFormat};
use owo_colors::OwoColorize;
use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use logtail_core::{ChannelOptions, EventFields};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

/// Keys the server puts on every event, in display order.
const STANDARD_FIELDS: [&str; 4] = ["time", "channel", "prefix", "message"];

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

// ── Event lines ──────────────────────────────────────────────────────

/// How `tail` prints each event.
#[derive(Debug, Clone)]
pub struct EventFormat {
    pub output: OutputFormat,
    pub color: bool,
    pub timestamps: bool,
    /// Print only these keys, in this order. Empty means everything.
    pub fields: Vec<String>,
}

#[derive(Serialize)]
struct JsonEvent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    received_at: Option<String>,
    #[serde(flatten)]
    fields: &'a EventFields,
}

impl EventFormat {
    /// Render one event as a single output record (no trailing newline).
    pub fn render(
        &self,
        fields: &EventFields,
        received: DateTime<Local>,
    ) -> Result<String, CliError> {
        let filtered;
        let fields = if self.fields.is_empty() {
            fields
        } else {
            filtered = self.select(fields);
            &filtered
        };

        match self.output {
            OutputFormat::Json | OutputFormat::JsonCompact => {
                let event = JsonEvent {
                    received_at: self
                        .timestamps
                        .then(|| received.to_rfc3339_opts(SecondsFormat::Millis, false)),
                    fields,
                };
                render_json(&event, self.output == OutputFormat::JsonCompact)
            }
            OutputFormat::Table => Ok(self.render_text(fields, received, self.color)),
            OutputFormat::Plain => Ok(self.render_text(fields, received, false)),
        }
    }

    fn select(&self, fields: &EventFields) -> EventFields {
        self.fields
            .iter()
            .filter_map(|key| fields.get(key).map(|value| (key.clone(), value.clone())))
            .collect()
    }

    fn render_text(&self, fields: &EventFields, received: DateTime<Local>, color: bool) -> String {
        let mut parts = Vec::with_capacity(fields.len() + 1);
        if self.timestamps {
            let stamp = received.format("%H:%M:%S%.3f").to_string();
            parts.push(if color { stamp.dimmed().to_string() } else { stamp });
        }

        // An explicit field list is printed as given; otherwise the standard
        // keys lead and anything else trails as key=value.
        if !self.fields.is_empty() {
            parts.extend(fields.iter().map(|(key, value)| paint(key, value, color)));
            return parts.join(" ");
        }

        for key in STANDARD_FIELDS {
            if let Some(value) = fields.get(key) {
                parts.push(paint(key, value, color));
            }
        }
        for (key, value) in fields {
            if !STANDARD_FIELDS.contains(&key.as_str()) {
                let pair = format!("{key}={value}");
                parts.push(if color { pair.dimmed().to_string() } else { pair });
            }
        }
        parts.join(" ")
    }
}

fn paint(key: &str, value: &str, color: bool) -> String {
    if !color {
        return value.to_owned();
    }
    match key {
        "time" => value.dimmed().to_string(),
        "channel" => value.cyan().bold().to_string(),
        "prefix" => value.yellow().to_string(),
        _ => value.to_owned(),
    }
}

// ── Channel listing ──────────────────────────────────────────────────

#[derive(Serialize)]
struct ChannelEntry<'a> {
    name: &'a str,
    selected: bool,
}

#[derive(Tabled)]
struct ChannelRow<'a> {
    #[tabled(rename = "Channel")]
    name: &'a str,
    #[tabled(rename = "Subscribed")]
    mark: &'static str,
}

/// Render the advertised channel list in the chosen format.
pub fn render_channels(format: OutputFormat, options: &ChannelOptions) -> Result<String, CliError> {
    let entries: Vec<ChannelEntry<'_>> = options
        .available
        .iter()
        .map(|name| ChannelEntry {
            name,
            selected: options.is_selected(name),
        })
        .collect();

    match format {
        OutputFormat::Table => {
            let rows = entries.iter().map(|entry| ChannelRow {
                name: entry.name,
                mark: if entry.selected { "✓" } else { "" },
            });
            Ok(Table::new(rows).with(Style::rounded()).to_string())
        }
        OutputFormat::Json => render_json(&entries, false),
        OutputFormat::JsonCompact => render_json(&entries, true),
        OutputFormat::Plain => Ok(options.available.join("\n")),
    }
}

/// Print the rendered output to stdout.
pub fn print_output(output: &str) {
    if output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

pub(crate) fn render_json<T: Serialize + ?Sized>(data: &T, compact: bool) -> Result<String, CliError> {
    let rendered = if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    };
    Ok(rendered)
}
