//! Resolve the client configuration for server-bound commands.
//!
//! Profile from the config file (or a bare `--host`), then flag overrides,
//! then validation in `logtail_config::profile_to_client_config`.

use logtail_config::{Config, Profile};
use logtail_core::ClientConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Comma-separated profile names for error help text.
pub fn available_profiles(cfg: &Config) -> String {
    if cfg.profiles.is_empty() {
        "(none)".into()
    } else {
        cfg.profiles.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

/// Pick the profile a server-bound command should use.
fn resolve_profile(cfg: &Config, global: &GlobalOpts) -> Result<Profile, CliError> {
    let name = cfg.active_profile_name(global.profile.as_deref());
    if let Some(profile) = cfg.profiles.get(&name) {
        return Ok(profile.clone());
    }

    // No matching profile: `--host` alone is enough to connect.
    if let Some(host) = global.host.as_deref() {
        return Ok(Profile::for_host(host));
    }
    if global.profile.is_some() {
        return Err(CliError::ProfileNotFound {
            name,
            available: available_profiles(cfg),
        });
    }
    Err(CliError::NoConfig {
        path: logtail_config::config_path().display().to_string(),
    })
}

fn apply_overrides(profile: &mut Profile, global: &GlobalOpts) {
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(ref scheme) = global.scheme {
        profile.scheme.clone_from(scheme);
    }
    if let Some(ref path) = global.path {
        profile.path.clone_from(path);
    }
}

/// Build a `ClientConfig` from the config file, profile, and CLI overrides.
pub fn build_client_config(global: &GlobalOpts) -> Result<ClientConfig, CliError> {
    let cfg = logtail_config::load_config()?;
    let mut profile = resolve_profile(&cfg, global)?;
    apply_overrides(&mut profile, global);

    let retry = cfg.retry_policy(&profile);
    tracing::debug!(
        host = %profile.host,
        port = profile.port,
        max_retries = retry.max_retries,
        "resolved server profile"
    );
    Ok(logtail_config::profile_to_client_config(&profile, retry)?)
}
