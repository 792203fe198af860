//! Host collaborators the pipelines are written against.
//!
//! A host bundles a decoder/player, a drawing surface, an audio graph, a
//! codec encode/mux session and a generic stream recorder. The pipelines
//! never reach for ambient globals; everything comes through [`MediaHost`].

use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::frame::VideoFrame;
use crate::negotiate::{EncoderQuery, NegotiatedConfig};
use crate::pacing::FrameTiming;
use crate::source::SourceMedia;

/// What the running host can do, detected once and passed by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HostCapabilities {
    pub video_encoder: bool,
    pub audio_encoder: bool,
    pub stream_recorder: bool,
}

impl HostCapabilities {
    pub fn supports_encode(&self) -> bool {
        self.video_encoder && self.audio_encoder
    }
}

/// Answers "is this encoder configuration supported".
pub trait EncoderProbe {
    async fn is_config_supported(&self, query: &EncoderQuery) -> anyhow::Result<bool>;
}

/// A decode/playback session opened against a [`SourceMedia`].
pub trait Playback {
    fn natural_size(&self) -> (u32, u32);
    fn position(&self) -> Duration;
    fn is_ended(&self) -> bool;

    async fn play(&mut self) -> anyhow::Result<()>;
    async fn pause(&mut self) -> anyhow::Result<()>;

    /// Resolves when the next decoded frame has been presented.
    async fn frame_presented(&mut self);

    async fn close(&mut self);
}

/// Offscreen surface the current source frame is drawn to.
pub trait Surface {
    type Source;

    fn draw(&mut self, source: &Self::Source) -> anyhow::Result<VideoFrame>;
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackSettings {
    pub sample_rate: Option<u32>,
    pub channel_count: Option<u16>,
}

/// A live audio capture track produced by an audio graph.
pub trait CaptureTrack: Clone {
    fn settings(&self) -> TrackSettings;
    fn stop(&self);
}

/// Audio graph wired to a playback session's output.
pub trait AudioGraph {
    type Capture: CaptureTrack;

    fn sample_rate(&self) -> Option<u32>;
    async fn resume(&mut self) -> anyhow::Result<()>;
    fn connect_keep_alive(&mut self, gain: f32) -> anyhow::Result<()>;
    /// Returns None when the graph produced no audio track.
    fn connect_capture(&mut self, gain: f32) -> anyhow::Result<Option<Self::Capture>>;
    async fn close(&mut self);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioTrackSpec {
    pub codec: &'static str,
    pub codec_string: &'static str,
    pub bitrate_bps: u64,
    pub sample_rate: u32,
    pub channels: u16,
}

/// Video plus optional audio encoder bound to one output container.
pub trait EncodeSession {
    type Capture: CaptureTrack;

    fn add_audio_track(&mut self, capture: Self::Capture, spec: &AudioTrackSpec)
    -> anyhow::Result<()>;
    async fn start(&mut self) -> anyhow::Result<()>;
    async fn add_frame(&mut self, frame: VideoFrame, timing: FrameTiming) -> anyhow::Result<()>;
    async fn close_video(&mut self) -> anyhow::Result<()>;
    async fn close_audio(&mut self) -> anyhow::Result<()>;
    /// Flushes encoders and returns the container bytes.
    async fn finalize(self) -> anyhow::Result<Bytes>;
    async fn abort(self);
}

#[derive(Debug)]
pub enum RecorderEvent {
    Data(Bytes),
    Error(anyhow::Error),
    Stopped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecorderOptions {
    pub mime_type: &'static str,
    pub video_bitrate_bps: u64,
    pub audio_bitrate_bps: Option<u64>,
    pub fps: u32,
    pub width: u32,
    pub height: u32,
}

/// Generic "record this live stream" capability.
pub trait StreamRecorder {
    fn start(&mut self) -> anyhow::Result<mpsc::UnboundedReceiver<RecorderEvent>>;
    fn push_frame(&mut self, frame: VideoFrame) -> anyhow::Result<()>;
    fn request_data(&mut self) -> anyhow::Result<()>;
    fn stop(&mut self) -> anyhow::Result<()>;
    async fn close(&mut self);
}

pub trait MediaHost: EncoderProbe {
    type Playback: Playback;
    type Surface: Surface<Source = Self::Playback>;
    type Capture: CaptureTrack;
    type Audio: AudioGraph<Capture = Self::Capture>;
    type Session: EncodeSession<Capture = Self::Capture>;
    type Recorder: StreamRecorder;

    fn capabilities(&self) -> HostCapabilities;

    async fn open_source(&self, source: &SourceMedia) -> anyhow::Result<Self::Playback>;
    fn create_surface(&self, width: u32, height: u32) -> anyhow::Result<Self::Surface>;
    async fn open_audio(
        &self,
        playback: &mut Self::Playback,
        sample_rate: Option<u32>,
    ) -> anyhow::Result<Self::Audio>;
    async fn open_session(&self, config: &NegotiatedConfig) -> anyhow::Result<Self::Session>;

    fn recorder_supports(&self, mime_type: &str) -> bool;
    async fn open_recorder(
        &self,
        options: &RecorderOptions,
        audio: Option<Self::Capture>,
    ) -> anyhow::Result<Self::Recorder>;
}
