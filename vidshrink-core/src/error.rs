use std::time::Duration;

use thiserror::Error;

/// Failures raised by a single transcode tier.
///
/// Everything except [`TranscodeError::SourceLoad`] is recoverable: the
/// orchestrator moves on to the next tier.
#[derive(Debug, Error)]
pub enum TranscodeError {
    /// The source could not be opened or its metadata could not be read.
    #[error("failed to load input video: {0:#}")]
    SourceLoad(#[source] anyhow::Error),

    /// No encoder configuration was accepted by the host.
    #[error("no supported H.264 encoder configuration on this host")]
    UnsupportedCapability,

    /// Playback position did not advance for too long.
    #[error("playback stalled for {stalled:?} without progress")]
    PlaybackStalled { stalled: Duration },

    /// The tier finished but produced zero bytes.
    #[error("no encoded data produced")]
    EmptyOutput,

    /// The host has no generic stream recorder.
    #[error("stream recorder not supported on this host")]
    RecorderUnavailable,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Any other host collaborator failure.
    #[error("{context}: {source:#}")]
    Host {
        context: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl TranscodeError {
    /// Fatal errors abort the whole fallback chain.
    pub fn is_fatal(&self) -> bool {
        matches!(self, TranscodeError::SourceLoad(_))
    }

    pub(crate) fn host(context: &'static str) -> impl FnOnce(anyhow::Error) -> Self {
        move |source| TranscodeError::Host { context, source }
    }
}
