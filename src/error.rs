//! Error types for the verifier.
//!
//! One enum per subsystem.  None of these are fatal during normal
//! operation: the control core logs them and carries on.  Only `main`
//! collapses errors into `anyhow` for startup plumbing.

use std::path::PathBuf;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Settings file failures.  Load failures are recovered by falling back to
/// defaults; save failures are logged.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// No settings file at the given path (first start).
    #[error("settings file not found at {0}")]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("cannot read settings file {path}: {source}")]
    Load {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not a JSON object.
    #[error("settings file {path} is not a JSON object: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Writing the file failed.
    #[error("cannot save settings to {path}: {source}")]
    Save {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Encoding the settings failed (should not happen for a plain struct).
    #[error("cannot encode settings: {0}")]
    Encode(#[from] serde_json::Error),
}

// ---------------------------------------------------------------------------
// Messaging link
// ---------------------------------------------------------------------------

/// MQTT link failures.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LinkError {
    /// Publish attempted while the link is not `Connected`.
    #[error("not connected")]
    NotConnected,

    /// The connection attempt could not be started.
    #[error("connect failed: {0}")]
    Connect(String),

    /// The client rejected a request (request queue closed or full).
    #[error("client request failed: {0}")]
    Client(String),
}

// ---------------------------------------------------------------------------
// Actuator
// ---------------------------------------------------------------------------

/// Reject output hardware fault.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ActuatorError {
    /// Driving the output pin failed.
    #[error("output write failed: {0}")]
    WriteFailed(String),

    /// The output was asked to do something after it was released.
    #[error("output released")]
    Released,
}

// ---------------------------------------------------------------------------
// Timers
// ---------------------------------------------------------------------------

/// A deferred callback could not be scheduled.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum TimerError {
    #[error("timer request queue full")]
    QueueFull,

    #[error("timer thread stopped")]
    Stopped,
}

// ---------------------------------------------------------------------------
// Remote commands
// ---------------------------------------------------------------------------

/// Unrecognised payload on the remote-command topic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("invalid remote command {0:?}")]
    InvalidRemoteCommand(String),
}
