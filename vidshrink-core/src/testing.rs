//! In-memory host used by the pipeline tests. Every resource it hands out is
//! counted on open and on close.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::time::{self, Instant};

use crate::frame::VideoFrame;
use crate::host::{
    AudioGraph, AudioTrackSpec, CaptureTrack, EncodeSession, EncoderProbe, HostCapabilities,
    MediaHost, Playback, RecorderEvent, RecorderOptions, StreamRecorder, Surface, TrackSettings,
};
use crate::negotiate::{EncoderQuery, NegotiatedConfig};
use crate::pacing::FrameTiming;
use crate::source::SourceMedia;

#[derive(Debug, Default)]
pub struct ResourceCounter {
    opened: AtomicUsize,
    closed: AtomicUsize,
}

impl ResourceCounter {
    fn open(&self) {
        self.opened.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> isize {
        self.opened() as isize - self.closed.load(Ordering::SeqCst) as isize
    }
}

#[derive(Debug, Default)]
pub struct Counters {
    pub playback: ResourceCounter,
    pub surface: ResourceCounter,
    pub audio: ResourceCounter,
    pub track: ResourceCounter,
    pub session: ResourceCounter,
    pub recorder: ResourceCounter,
}

impl Counters {
    pub fn live(&self) -> isize {
        self.playback.live()
            + self.surface.live()
            + self.audio.live()
            + self.track.live()
            + self.session.live()
            + self.recorder.live()
    }
}

/// Probe driven by a closure; records every query it sees.
pub struct FnProbe<F> {
    accept: F,
    pub queries: Mutex<Vec<EncoderQuery>>,
}

impl<F> FnProbe<F>
where
    F: Fn(&EncoderQuery) -> anyhow::Result<bool>,
{
    pub fn new(accept: F) -> Self {
        Self {
            accept,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<EncoderQuery> {
        self.queries.lock().unwrap().clone()
    }
}

impl<F> EncoderProbe for FnProbe<F>
where
    F: Fn(&EncoderQuery) -> anyhow::Result<bool>,
{
    async fn is_config_supported(&self, query: &EncoderQuery) -> anyhow::Result<bool> {
        self.queries.lock().unwrap().push(query.clone());
        (self.accept)(query)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderMode {
    /// Emits a chunk every `chunk_every` frames and on flush.
    Normal,
    /// Reports an error on the first frame.
    Error,
    /// Never emits data.
    Silent,
}

pub type ProbeFn = Arc<dyn Fn(&EncoderQuery) -> anyhow::Result<bool> + Send + Sync>;

pub fn probe_fn<F>(f: F) -> ProbeFn
where
    F: Fn(&EncoderQuery) -> anyhow::Result<bool> + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Clone)]
pub struct FakeHostConfig {
    pub capabilities: HostCapabilities,
    pub size: (u32, u32),
    pub duration: Duration,
    pub source_fps: u32,
    /// Playback position freezes here.
    pub stall_at: Option<Duration>,
    pub fail_open_source: bool,
    pub fail_play: bool,
    pub fail_audio: bool,
    pub audio_track: bool,
    pub encoded: Bytes,
    pub probe: ProbeFn,
    pub recorder_types: Vec<&'static str>,
    pub recorder_mode: RecorderMode,
    pub chunk_every: u64,
}

impl Default for FakeHostConfig {
    fn default() -> Self {
        Self {
            capabilities: HostCapabilities {
                video_encoder: true,
                audio_encoder: true,
                stream_recorder: true,
            },
            size: (1920, 1080),
            duration: Duration::from_millis(500),
            source_fps: 30,
            stall_at: None,
            fail_open_source: false,
            fail_play: false,
            fail_audio: false,
            audio_track: true,
            encoded: Bytes::from_static(b"encoded-mp4"),
            probe: probe_fn(|_| Ok(true)),
            recorder_types: vec!["video/mp4;codecs=h264", "video/webm;codecs=vp8", "video/webm"],
            recorder_mode: RecorderMode::Normal,
            chunk_every: 5,
        }
    }
}

/// Everything the fake observed, shared with the resources it created.
#[derive(Default)]
pub struct Journal {
    pub counters: Counters,
    /// Live resource count seen each time a source is opened.
    pub live_at_source_open: Mutex<Vec<isize>>,
    pub frames: Mutex<Vec<FrameTiming>>,
    pub sessions: Mutex<Vec<NegotiatedConfig>>,
    pub audio_specs: Mutex<Vec<AudioTrackSpec>>,
    pub audio_hints: Mutex<Vec<Option<u32>>>,
    pub keep_alive_gains: Mutex<Vec<f32>>,
    pub capture_gains: Mutex<Vec<f32>>,
    pub recorders: Mutex<Vec<RecorderOptions>>,
    pub recorder_with_audio: Mutex<Vec<bool>>,
    pub recorded_frames: AtomicUsize,
    pub probes: AtomicUsize,
}

pub struct FakeHost {
    pub config: FakeHostConfig,
    pub journal: Arc<Journal>,
}

impl FakeHost {
    pub fn new(config: FakeHostConfig) -> Self {
        Self {
            config,
            journal: Arc::new(Journal::default()),
        }
    }

    pub fn live(&self) -> isize {
        self.journal.counters.live()
    }

    pub fn frames(&self) -> Vec<FrameTiming> {
        self.journal.frames.lock().unwrap().clone()
    }

    pub fn sessions_opened(&self) -> usize {
        self.journal.counters.session.opened()
    }

    pub fn recorders_opened(&self) -> usize {
        self.journal.counters.recorder.opened()
    }
}

impl EncoderProbe for FakeHost {
    async fn is_config_supported(&self, query: &EncoderQuery) -> anyhow::Result<bool> {
        self.journal.probes.fetch_add(1, Ordering::SeqCst);
        (self.config.probe)(query)
    }
}

pub struct FakePlayback {
    journal: Arc<Journal>,
    size: (u32, u32),
    duration: Duration,
    frame_interval: Duration,
    stall_at: Option<Duration>,
    fail_play: bool,
    started: Option<Instant>,
    paused_at: Option<Duration>,
    closed: bool,
}

impl FakePlayback {
    fn clock(&self) -> Duration {
        match (self.paused_at, self.started) {
            (Some(at), _) => at,
            (None, Some(started)) => started.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    fn limit(&self) -> Duration {
        match self.stall_at {
            Some(at) => at.min(self.duration),
            None => self.duration,
        }
    }
}

impl Playback for FakePlayback {
    fn natural_size(&self) -> (u32, u32) {
        self.size
    }

    fn position(&self) -> Duration {
        self.clock().min(self.limit())
    }

    fn is_ended(&self) -> bool {
        self.position() >= self.duration
    }

    async fn play(&mut self) -> anyhow::Result<()> {
        if self.fail_play {
            anyhow::bail!("playback blocked");
        }
        self.started.get_or_insert_with(Instant::now);
        self.paused_at = None;
        Ok(())
    }

    async fn pause(&mut self) -> anyhow::Result<()> {
        self.paused_at = Some(self.clock());
        Ok(())
    }

    async fn frame_presented(&mut self) {
        let Some(started) = self.started else {
            return std::future::pending().await;
        };
        if self.paused_at.is_some() || self.position() >= self.limit() {
            return std::future::pending().await;
        }
        let interval = self.frame_interval.as_nanos().max(1);
        let next = (started.elapsed().as_nanos() / interval + 1) * interval;
        let next = Duration::from_nanos(next as u64).min(self.limit());
        time::sleep_until(started + next).await;
    }

    async fn close(&mut self) {
        if !std::mem::replace(&mut self.closed, true) {
            self.journal.counters.playback.close();
        }
    }
}

pub struct FakeSurface {
    journal: Arc<Journal>,
    width: u32,
    height: u32,
    closed: bool,
}

impl Surface for FakeSurface {
    type Source = FakePlayback;

    fn draw(&mut self, source: &FakePlayback) -> anyhow::Result<VideoFrame> {
        Ok(VideoFrame {
            data: Bytes::from_static(b"frame"),
            width: self.width,
            height: self.height,
            position: source.position(),
        })
    }

    fn close(&mut self) {
        if !std::mem::replace(&mut self.closed, true) {
            self.journal.counters.surface.close();
        }
    }
}

#[derive(Clone)]
pub struct FakeTrack {
    journal: Arc<Journal>,
    stopped: Arc<AtomicBool>,
}

impl CaptureTrack for FakeTrack {
    fn settings(&self) -> TrackSettings {
        TrackSettings {
            sample_rate: Some(44_100),
            channel_count: None,
        }
    }

    fn stop(&self) {
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.journal.counters.track.close();
        }
    }
}

pub struct FakeAudio {
    journal: Arc<Journal>,
    sample_rate: Option<u32>,
    audio_track: bool,
    closed: bool,
}

impl AudioGraph for FakeAudio {
    type Capture = FakeTrack;

    fn sample_rate(&self) -> Option<u32> {
        self.sample_rate
    }

    async fn resume(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    fn connect_keep_alive(&mut self, gain: f32) -> anyhow::Result<()> {
        self.journal.keep_alive_gains.lock().unwrap().push(gain);
        Ok(())
    }

    fn connect_capture(&mut self, gain: f32) -> anyhow::Result<Option<FakeTrack>> {
        self.journal.capture_gains.lock().unwrap().push(gain);
        if !self.audio_track {
            return Ok(None);
        }
        self.journal.counters.track.open();
        Ok(Some(FakeTrack {
            journal: self.journal.clone(),
            stopped: Arc::new(AtomicBool::new(false)),
        }))
    }

    async fn close(&mut self) {
        if !std::mem::replace(&mut self.closed, true) {
            self.journal.counters.audio.close();
        }
    }
}

pub struct FakeSession {
    journal: Arc<Journal>,
    encoded: Bytes,
    audio: Option<FakeTrack>,
}

impl FakeSession {
    fn release(&mut self) {
        if let Some(track) = self.audio.take() {
            track.stop();
        }
        self.journal.counters.session.close();
    }
}

impl EncodeSession for FakeSession {
    type Capture = FakeTrack;

    fn add_audio_track(&mut self, capture: FakeTrack, spec: &AudioTrackSpec) -> anyhow::Result<()> {
        self.journal.audio_specs.lock().unwrap().push(spec.clone());
        self.audio = Some(capture);
        Ok(())
    }

    async fn start(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn add_frame(&mut self, _frame: VideoFrame, timing: FrameTiming) -> anyhow::Result<()> {
        self.journal.frames.lock().unwrap().push(timing);
        Ok(())
    }

    async fn close_video(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn close_audio(&mut self) -> anyhow::Result<()> {
        Ok(())
    }

    async fn finalize(mut self) -> anyhow::Result<Bytes> {
        self.release();
        Ok(self.encoded.clone())
    }

    async fn abort(mut self) {
        self.release();
    }
}

pub struct FakeRecorder {
    journal: Arc<Journal>,
    mode: RecorderMode,
    chunk_every: u64,
    frames: u64,
    events: Option<mpsc::UnboundedSender<RecorderEvent>>,
    closed: bool,
}

impl FakeRecorder {
    fn emit(&self, event: RecorderEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }
}

impl StreamRecorder for FakeRecorder {
    fn start(&mut self) -> anyhow::Result<mpsc::UnboundedReceiver<RecorderEvent>> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.events = Some(tx);
        Ok(rx)
    }

    fn push_frame(&mut self, _frame: VideoFrame) -> anyhow::Result<()> {
        self.frames += 1;
        self.journal.recorded_frames.fetch_add(1, Ordering::SeqCst);
        match self.mode {
            RecorderMode::Normal if self.frames % self.chunk_every.max(1) == 0 => {
                self.emit(RecorderEvent::Data(Bytes::from(format!("chunk{};", self.frames))));
            }
            RecorderMode::Error if self.frames == 1 => {
                self.emit(RecorderEvent::Error(anyhow::anyhow!("encoder crashed")));
            }
            _ => {}
        }
        Ok(())
    }

    fn request_data(&mut self) -> anyhow::Result<()> {
        if self.mode == RecorderMode::Normal {
            self.emit(RecorderEvent::Data(Bytes::from_static(b"tail;")));
        }
        Ok(())
    }

    fn stop(&mut self) -> anyhow::Result<()> {
        self.emit(RecorderEvent::Stopped);
        Ok(())
    }

    async fn close(&mut self) {
        self.events = None;
        if !std::mem::replace(&mut self.closed, true) {
            self.journal.counters.recorder.close();
        }
    }
}

impl MediaHost for FakeHost {
    type Playback = FakePlayback;
    type Surface = FakeSurface;
    type Capture = FakeTrack;
    type Audio = FakeAudio;
    type Session = FakeSession;
    type Recorder = FakeRecorder;

    fn capabilities(&self) -> HostCapabilities {
        self.config.capabilities
    }

    async fn open_source(&self, _source: &SourceMedia) -> anyhow::Result<FakePlayback> {
        self.journal
            .live_at_source_open
            .lock()
            .unwrap()
            .push(self.journal.counters.live());
        if self.config.fail_open_source {
            anyhow::bail!("moov atom not found");
        }
        self.journal.counters.playback.open();
        Ok(FakePlayback {
            journal: self.journal.clone(),
            size: self.config.size,
            duration: self.config.duration,
            frame_interval: Duration::from_secs(1) / self.config.source_fps.max(1),
            stall_at: self.config.stall_at,
            fail_play: self.config.fail_play,
            started: None,
            paused_at: None,
            closed: false,
        })
    }

    fn create_surface(&self, width: u32, height: u32) -> anyhow::Result<FakeSurface> {
        self.journal.counters.surface.open();
        Ok(FakeSurface {
            journal: self.journal.clone(),
            width,
            height,
            closed: false,
        })
    }

    async fn open_audio(
        &self,
        _playback: &mut FakePlayback,
        sample_rate: Option<u32>,
    ) -> anyhow::Result<FakeAudio> {
        self.journal.audio_hints.lock().unwrap().push(sample_rate);
        if self.config.fail_audio {
            anyhow::bail!("audio graph unavailable");
        }
        self.journal.counters.audio.open();
        Ok(FakeAudio {
            journal: self.journal.clone(),
            sample_rate,
            audio_track: self.config.audio_track,
            closed: false,
        })
    }

    async fn open_session(&self, config: &NegotiatedConfig) -> anyhow::Result<FakeSession> {
        self.journal.sessions.lock().unwrap().push(config.clone());
        self.journal.counters.session.open();
        Ok(FakeSession {
            journal: self.journal.clone(),
            encoded: self.config.encoded.clone(),
            audio: None,
        })
    }

    fn recorder_supports(&self, mime_type: &str) -> bool {
        self.config.recorder_types.contains(&mime_type)
    }

    async fn open_recorder(
        &self,
        options: &RecorderOptions,
        audio: Option<FakeTrack>,
    ) -> anyhow::Result<FakeRecorder> {
        self.journal.recorders.lock().unwrap().push(options.clone());
        self.journal
            .recorder_with_audio
            .lock()
            .unwrap()
            .push(audio.is_some());
        self.journal.counters.recorder.open();
        Ok(FakeRecorder {
            journal: self.journal.clone(),
            mode: self.config.recorder_mode,
            chunk_every: self.config.chunk_every,
            frames: 0,
            events: None,
            closed: false,
        })
    }
}

pub fn sample_source() -> SourceMedia {
    SourceMedia::new("holiday.mov", "video/quicktime", Bytes::from_static(b"original-bytes"))
}
