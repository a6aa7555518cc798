//! # Sync Configuration
//!
//! Configuration for the observation service and its telemetry.

use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::algorithms::{ASSOCIATED_TOKEN_PROGRAM_ID, TOKEN_PROGRAM_ID};
use crate::domain::Subject;

/// Live account sync configuration.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Token program that owns observed accounts.
    pub token_program_id: Subject,

    /// Program under which associated token accounts are derived.
    pub associated_token_program_id: Subject,

    /// Default off-curve policy for derived observations.
    pub allow_owner_off_curve: bool,

    /// Deadline for every baseline read, in milliseconds. `None` waits forever.
    pub read_timeout_ms: Option<u64>,

    /// Log level filter (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON formatted logs.
    pub json_logs: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            token_program_id: TOKEN_PROGRAM_ID,
            associated_token_program_id: ASSOCIATED_TOKEN_PROGRAM_ID,
            allow_owner_off_curve: false,
            read_timeout_ms: None,
            log_level: "info".to_string(),
            json_logs: false,
        }
    }
}

impl SyncConfig {
    /// Create a config for testing (short deadlines, verbose logs).
    pub fn for_testing() -> Self {
        Self {
            read_timeout_ms: Some(500),
            log_level: "debug".to_string(),
            ..Self::default()
        }
    }

    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `LAS_TOKEN_PROGRAM_ID`: Token program, base58 (default: legacy SPL token)
    /// - `LAS_ASSOCIATED_TOKEN_PROGRAM_ID`: Associated token program, base58
    /// - `LAS_ALLOW_OWNER_OFF_CURVE`: Off-curve policy default (default: false)
    /// - `LAS_READ_TIMEOUT_MS`: Baseline read deadline (default: none)
    /// - `LAS_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `LAS_JSON_LOGS`: Enable JSON logs (default: false)
    ///
    /// Unparseable values fall back to the default.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            token_program_id: env::var("LAS_TOKEN_PROGRAM_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.token_program_id),

            associated_token_program_id: env::var("LAS_ASSOCIATED_TOKEN_PROGRAM_ID")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.associated_token_program_id),

            allow_owner_off_curve: env::var("LAS_ALLOW_OWNER_OFF_CURVE")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.allow_owner_off_curve),

            read_timeout_ms: env::var("LAS_READ_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok()),

            log_level: env::var("LAS_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or(defaults.log_level),

            json_logs: env::var("LAS_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(defaults.json_logs),
        }
    }

    /// Parse a JSON document; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Read deadline, if configured.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout_ms.map(Duration::from_millis)
    }
}
