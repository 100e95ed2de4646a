//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use logtail_config::ConfigError;
use logtail_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to log server at {url}")]
    #[diagnostic(
        code(logtail::connection_failed),
        help(
            "Check that the server is running and reachable.\n\
             URL: {url}\n\
             Try: logtail channels --scheme ws"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Lost the connection to {url}; {attempts} reconnect attempts failed")]
    #[diagnostic(
        code(logtail::retry_exhausted),
        help(
            "The server stopped answering. Check it is up, then run the command again.\n\
             Raise `defaults.max_retries` in the config to keep trying longer."
        )
    )]
    RetryExhausted { url: String, attempts: u32 },

    #[error("The log client stopped unexpectedly")]
    #[diagnostic(code(logtail::client_stopped), help("Re-run with -vv for details."))]
    ClientStopped,

    #[error("Server sent an unreadable frame: {message}")]
    #[diagnostic(code(logtail::protocol))]
    Protocol { message: String },

    // ── Timeout ──────────────────────────────────────────────────────
    #[error("No channel list received within {seconds}s")]
    #[diagnostic(
        code(logtail::timeout),
        help("Increase the wait with --timeout or check the server logs.")
    )]
    Timeout { seconds: u64 },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(logtail::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(logtail::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: logtail config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No log server configured")]
    #[diagnostic(
        code(logtail::no_config),
        help(
            "Create a profile with: logtail config init\n\
             Or pass --host directly.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(logtail::config))]
    Config(Box<figment::Error>),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(logtail::json))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(logtail::internal))]
    Internal(String),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::RetryExhausted { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            Self::ProfileNotFound { .. } | Self::NoConfig { .. } => exit_code::NOT_FOUND,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },
            CoreError::RetryExhausted { attempts } => CliError::RetryExhausted {
                url: "(server)".into(),
                attempts,
            },
            CoreError::ClientStopped => CliError::ClientStopped,
            CoreError::Decode(e) => CliError::Protocol {
                message: e.to_string(),
            },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::UnknownProfile { name } => CliError::ProfileNotFound {
                name,
                available: "(see: logtail config profiles)".into(),
            },
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: format!("failed to serialize config: {e}"),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_exhaustion_is_a_connection_failure() {
        let err = CliError::from(CoreError::RetryExhausted { attempts: 3 });
        assert_eq!(err.exit_code(), exit_code::CONNECTION);
    }

    #[test]
    fn config_validation_is_a_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "endpoint".into(),
            reason: "bad scheme".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
        assert_eq!(err.to_string(), "Invalid value for endpoint: bad scheme");
    }

    #[test]
    fn missing_profile_is_not_found() {
        let err = CliError::from(ConfigError::UnknownProfile {
            name: "prod".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
    }
}
