use std::{io, path::PathBuf};

use thiserror::Error;

/// Fatal conditions of a processing run.
///
/// Non-fatal conditions (unmatched port symbols, clipping, a missing preset)
/// are logged and reported through the summaries instead.
#[derive(Error, Debug)]
pub enum Error {
    #[error("malformed connection '{rule}': {reason}")]
    MalformedRoutingRule { rule: String, reason: &'static str },

    #[error("malformed parameter '{pair}': {reason}")]
    MalformedControlValue { pair: String, reason: &'static str },

    #[error("input sound file does not have channel {channel}, it has {channels} channels")]
    ChannelOutOfRange { channel: usize, channels: usize },

    #[error(
        "not enough input channels ({channels}) to connect all {ports} plugin ports, specify connections manually"
    )]
    InsufficientChannels { channels: usize, ports: usize },

    #[error("cannot route {channels} channels into {instances} instances of {ports} ports")]
    RoutingTooLarge {
        instances: usize,
        ports: usize,
        channels: usize,
    },

    #[error("{what} do not match: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("{stream} has {actual} channels, expected {expected}")]
    ChannelCountMismatch {
        stream: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("failed to instantiate '{plugin}': {reason}")]
    InstanceCreationFailed { plugin: String, reason: String },

    #[error("no such plugin {0}")]
    PluginNotFound(String),

    #[error("unable to handle port '{port}': {reason}")]
    UnsupportedPort { port: String, reason: &'static str },

    #[error("block size must be at least one frame")]
    InvalidBlockSize,

    #[error("failed to {action} '{}': {source}", path.display())]
    FileIo {
        action: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn file_io(
        action: &'static str,
        path: impl Into<PathBuf>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Error::FileIo {
            action,
            path: path.into(),
            source: io::Error::other(source),
        }
    }
}
