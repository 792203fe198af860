//! Fallback pipeline: hands a live composited stream to the host's generic
//! stream recorder and concatenates whatever chunks it emits.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};

use crate::artifact::{OutputArtifact, pick_output_name};
use crate::audio::{AudioTap, TapWiring, open_tap};
use crate::error::TranscodeError;
use crate::fit::fit;
use crate::host::{MediaHost, Playback, RecorderEvent, RecorderOptions, StreamRecorder, Surface};
use crate::pacing::{STALL_LIMIT, StallDetector};
use crate::preset::CompressionPreset;
use crate::source::SourceMedia;

/// Recorder container types in priority order, with the output extension.
pub const RECORDER_TYPES: [(&str, &str); 3] = [
    ("video/mp4;codecs=h264", "mp4"),
    ("video/webm;codecs=vp8", "webm"),
    ("video/webm", "webm"),
];

const FIRST_CHUNK_TIMEOUT: Duration = Duration::from_secs(1);
const STOP_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_FPS: u32 = 30;
// draw ticks never run faster than this
const MIN_TICK: Duration = Duration::from_millis(1);

pub fn select_recorder_type<H: MediaHost>(host: &H) -> Option<(&'static str, &'static str)> {
    RECORDER_TYPES
        .into_iter()
        .find(|(mime, _)| host.recorder_supports(mime))
}

/// Runs the fallback recorder once, releasing every resource before
/// returning.
pub async fn record<H: MediaHost>(
    host: &H,
    source: &SourceMedia,
    preset: &CompressionPreset,
) -> Result<OutputArtifact, TranscodeError> {
    if !host.capabilities().stream_recorder {
        return Err(TranscodeError::RecorderUnavailable);
    }
    let (mime_type, extension) =
        select_recorder_type(host).ok_or(TranscodeError::RecorderUnavailable)?;

    let mut playback = host
        .open_source(source)
        .await
        .map_err(TranscodeError::SourceLoad)?;

    let mut attempt = RecordAttempt::<H> {
        surface: None,
        tap: None,
        recorder: None,
    };
    let result = attempt.run(host, &mut playback, preset, mime_type).await;
    attempt.release().await;
    playback.close().await;

    let bytes = result?;
    let name = pick_output_name(&source.name, extension, preset.output_name.as_deref());
    log::info!("recorded {} -> {} ({} bytes, {})", source.name, name, bytes.len(), mime_type);
    Ok(OutputArtifact::new(name, mime_type, bytes))
}

struct RecordAttempt<H: MediaHost> {
    surface: Option<H::Surface>,
    tap: Option<AudioTap<H::Audio>>,
    recorder: Option<H::Recorder>,
}

impl<H: MediaHost> RecordAttempt<H> {
    async fn run(
        &mut self,
        host: &H,
        playback: &mut H::Playback,
        preset: &CompressionPreset,
        mime_type: &'static str,
    ) -> Result<Bytes, TranscodeError> {
        let (src_w, src_h) = playback.natural_size();
        if src_w == 0 || src_h == 0 {
            return Err(TranscodeError::SourceLoad(anyhow::anyhow!(
                "source reports no video dimensions"
            )));
        }
        let fitted = fit(src_w, src_h, preset.max_width, preset.max_height)?;
        let (width, height) = (fitted.width.max(1), fitted.height.max(1));
        let fps = if preset.fps == 0 { DEFAULT_FPS } else { preset.fps };

        let surface = self.surface.insert(
            host.create_surface(width, height)
                .map_err(TranscodeError::host("create capture surface"))?,
        );

        let audio = match open_tap(host, playback, TapWiring::RECORD).await {
            Ok(tap) => self.tap.insert(tap).capture().cloned(),
            Err(e) => {
                log::warn!("audio tap unavailable: {:#}", e);
                None
            }
        };
        if audio.is_none() {
            log::warn!("recording without audio");
        }

        let options = RecorderOptions {
            mime_type,
            video_bitrate_bps: preset.video_bitrate_bps,
            audio_bitrate_bps: audio.as_ref().map(|_| preset.audio_bitrate_bps),
            fps,
            width,
            height,
        };
        let recorder = self.recorder.insert(
            host.open_recorder(&options, audio)
                .await
                .map_err(TranscodeError::host("open stream recorder"))?,
        );

        playback
            .play()
            .await
            .map_err(TranscodeError::host("start playback"))?;
        let mut events = recorder
            .start()
            .map_err(TranscodeError::host("start stream recorder"))?;

        let mut ticker = time::interval((Duration::from_secs(1) / fps).max(MIN_TICK));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut chunks = ChunkCollector::default();

        // wait for the first chunk, but not for long
        let first_chunk = time::sleep(FIRST_CHUNK_TIMEOUT);
        tokio::pin!(first_chunk);
        while !chunks.has_data() && !chunks.stopped {
            tokio::select! {
                event = events.recv() => chunks.accept(event)?,
                _ = &mut first_chunk => {
                    log::debug!("no recorder data within {:?}, continuing", FIRST_CHUNK_TIMEOUT);
                    break;
                }
                _ = ticker.tick() => push_frame(surface, &*playback, recorder)?,
            }
        }

        let mut stall = StallDetector::new(ticker.period(), STALL_LIMIT);
        while !playback.is_ended() && !chunks.stopped {
            let before = playback.position();
            tokio::select! {
                event = events.recv() => chunks.accept(event)?,
                _ = ticker.tick() => {
                    push_frame(surface, &*playback, recorder)?;
                    if stall.observe(before, playback.position()) {
                        return Err(TranscodeError::PlaybackStalled {
                            stalled: stall.accumulated(),
                        });
                    }
                }
            }
        }

        if let Err(e) = recorder.request_data() {
            log::debug!("recorder flush request failed: {:#}", e);
        }
        tokio::task::yield_now().await;
        recorder
            .stop()
            .map_err(TranscodeError::host("stop stream recorder"))?;

        if time::timeout(STOP_TIMEOUT, chunks.drain(&mut events)).await.is_err() {
            log::warn!("recorder did not stop within {:?}", STOP_TIMEOUT);
        }
        if let Some(err) = chunks.error.take() {
            return Err(err);
        }

        let bytes = chunks.into_bytes();
        if bytes.is_empty() {
            return Err(TranscodeError::EmptyOutput);
        }
        Ok(bytes)
    }

    async fn release(&mut self) {
        if let Some(mut recorder) = self.recorder.take() {
            recorder.close().await;
        }
        if let Some(mut tap) = self.tap.take() {
            tap.close().await;
        }
        if let Some(mut surface) = self.surface.take() {
            surface.close();
        }
    }
}

fn push_frame<S, R>(surface: &mut S, source: &S::Source, recorder: &mut R) -> Result<(), TranscodeError>
where
    S: Surface,
    R: StreamRecorder,
{
    let frame = surface
        .draw(source)
        .map_err(TranscodeError::host("draw frame"))?;
    recorder
        .push_frame(frame)
        .map_err(TranscodeError::host("push frame"))
}

/// Non-empty recorder chunks in arrival order.
#[derive(Default)]
struct ChunkCollector {
    chunks: Vec<Bytes>,
    stopped: bool,
    error: Option<TranscodeError>,
}

impl ChunkCollector {
    fn accept(&mut self, event: Option<RecorderEvent>) -> Result<(), TranscodeError> {
        match event {
            Some(RecorderEvent::Data(chunk)) => {
                if !chunk.is_empty() {
                    self.chunks.push(chunk);
                }
            }
            Some(RecorderEvent::Error(e)) => {
                return Err(TranscodeError::host("stream recorder error")(e));
            }
            Some(RecorderEvent::Stopped) | None => self.stopped = true,
        }
        Ok(())
    }

    async fn drain(&mut self, events: &mut mpsc::UnboundedReceiver<RecorderEvent>) {
        while !self.stopped {
            let event = events.recv().await;
            if let Err(e) = self.accept(event) {
                self.error = Some(e);
                return;
            }
        }
    }

    fn has_data(&self) -> bool {
        !self.chunks.is_empty()
    }

    fn into_bytes(self) -> Bytes {
        let len = self.chunks.iter().map(Bytes::len).sum();
        let mut out = BytesMut::with_capacity(len);
        for chunk in self.chunks {
            out.extend_from_slice(&chunk);
        }
        out.freeze()
    }
}

#[cfg(test)]
#[path = "recorder_test.rs"]
mod recorder_test;
