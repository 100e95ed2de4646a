//! Config subcommand handlers.

use dialoguer::{Input, Select};

use logtail_config::{Config, DEFAULT_PORT, Profile};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::available_profiles;
use crate::error::CliError;
use crate::output;

// ── Helpers ─────────────────────────────────────────────────────────

/// Map a dialoguer / interactive I/O failure into CliError.
fn prompt_err(e: impl std::fmt::Display) -> CliError {
    CliError::Validation {
        field: "interactive".into(),
        reason: format!("prompt failed: {e}"),
    }
}

fn parse_channels(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_owned)
        .collect()
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("'{value}' is not a valid number"),
    })
}

/// Apply `key = value` to a profile.
fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "host" => profile.host = value,
        "port" => profile.port = parse_number("port", &value)?,
        "scheme" => {
            if value != "wss" && value != "ws" {
                return Err(CliError::Validation {
                    field: "scheme".into(),
                    reason: "must be 'wss' or 'ws'".into(),
                });
            }
            profile.scheme = value;
        }
        "path" => profile.path = value,
        "channels" => profile.channels = parse_channels(&value),
        "max_retries" | "max-retries" => {
            profile.max_retries = Some(parse_number("max_retries", &value)?);
        }
        "retry_step_ms" | "retry-step-ms" => {
            profile.retry_step_ms = Some(parse_number("retry_step_ms", &value)?);
        }
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: host, port, scheme, path, \
                     channels, max_retries, retry_step_ms"
                ),
            });
        }
    }
    Ok(())
}

fn save(cfg: &Config) -> Result<(), CliError> {
    Ok(logtail_config::save_config(cfg)?)
}

// ── Handler ─────────────────────────────────────────────────────────

pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Init => init(global),

        ConfigCommand::Show => {
            let cfg = logtail_config::load_config()?;
            let out = match global.output {
                OutputFormat::Json => output::render_json(&cfg, false)?,
                OutputFormat::JsonCompact => output::render_json(&cfg, true)?,
                OutputFormat::Table | OutputFormat::Plain => {
                    toml::to_string_pretty(&cfg).map_err(|e| CliError::Validation {
                        field: "config".into(),
                        reason: format!("failed to serialize config: {e}"),
                    })?
                }
            };
            output::print_output(out.trim_end());
            Ok(())
        }

        ConfigCommand::Path => {
            println!("{}", logtail_config::config_path().display());
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = logtail_config::load_config()?;
            let profile_name = cfg.active_profile_name(global.profile.as_deref());

            let profile = cfg
                .profiles
                .entry(profile_name.clone())
                .or_insert_with(|| Profile::for_host(""));
            set_profile_key(profile, &key, value)?;

            save(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        ConfigCommand::Profiles => {
            let cfg = logtail_config::load_config()?;
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: logtail config init");
            } else {
                for name in cfg.profiles.keys() {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        ConfigCommand::Use { name } => {
            let mut cfg = logtail_config::load_config()?;

            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            save(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }
    }
}

/// Interactive wizard: add (or replace) one profile and make it the default.
fn init(global: &GlobalOpts) -> Result<(), CliError> {
    let config_path = logtail_config::config_path();
    let mut cfg = logtail_config::load_config()?;
    eprintln!("logtail configuration wizard");
    eprintln!("   Config path: {}\n", config_path.display());

    let profile_name: String = Input::new()
        .with_prompt("Profile name")
        .default(global.profile.clone().unwrap_or_else(|| "default".into()))
        .interact_text()
        .map_err(prompt_err)?;

    let host: String = Input::new()
        .with_prompt("Server host")
        .default(global.host.clone().unwrap_or_else(|| "localhost".into()))
        .interact_text()
        .map_err(prompt_err)?;

    let port: u16 = Input::new()
        .with_prompt("Port")
        .default(global.port.unwrap_or(DEFAULT_PORT))
        .interact_text()
        .map_err(prompt_err)?;

    let schemes = &["wss (TLS)", "ws (plaintext)"];
    let scheme = Select::new()
        .with_prompt("Transport")
        .items(schemes)
        .default(0)
        .interact()
        .map_err(prompt_err)?;

    let channels: String = Input::new()
        .with_prompt("Channels to follow (comma-separated, may be empty)")
        .allow_empty(true)
        .interact_text()
        .map_err(prompt_err)?;

    let mut profile = Profile::for_host(host);
    profile.port = port;
    profile.scheme = if scheme == 0 { "wss" } else { "ws" }.into();
    profile.channels = parse_channels(&channels);

    // Validate before writing anything.
    logtail_config::profile_to_client_config(&profile, cfg.retry_policy(&profile))?;

    cfg.profiles.insert(profile_name.clone(), profile);
    cfg.default_profile = Some(profile_name.clone());
    save(&cfg)?;

    eprintln!("\n✓ Configuration written to {}", config_path.display());
    eprintln!("  Active profile: {profile_name}");
    eprintln!("\n  Test it: logtail channels");
    Ok(())
}
