//! Primary pipeline: frame-paced capture fed to a negotiated H.264 encoder.

use bytes::Bytes;
use tokio::time;

use crate::artifact::{OutputArtifact, pick_output_name};
use crate::audio::{AudioTap, TapWiring, open_tap};
use crate::error::TranscodeError;
use crate::fit::fit;
use crate::host::{AudioGraph, AudioTrackSpec, CaptureTrack, EncodeSession, MediaHost, Playback, Surface};
use crate::negotiate::{NegotiatedConfig, negotiate};
use crate::pacing::{FramePacer, STALL_LIMIT, StallDetector, frame_wait};
use crate::preset::CompressionPreset;
use crate::source::SourceMedia;

pub const OUTPUT_EXTENSION: &str = "mp4";
pub const OUTPUT_MIME: &str = "video/mp4";

const DEFAULT_SAMPLE_RATE: u32 = 48_000;
const DEFAULT_CHANNELS: u16 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeStage {
    LoadingSource,
    Negotiating,
    Encoding,
    Finalizing,
    Done,
}

fn enter(stage: EncodeStage) {
    log::debug!("encode stage: {:?}", stage);
}

/// Runs the primary pipeline once. Every resource acquired here is released
/// before returning, on success and on failure.
pub async fn encode<H: MediaHost>(
    host: &H,
    source: &SourceMedia,
    preset: &CompressionPreset,
) -> Result<OutputArtifact, TranscodeError> {
    enter(EncodeStage::LoadingSource);
    let mut playback = host
        .open_source(source)
        .await
        .map_err(TranscodeError::SourceLoad)?;

    let mut attempt = EncodeAttempt::<H> {
        surface: None,
        tap: None,
    };
    let result = attempt.run(host, &mut playback, preset).await;
    attempt.release().await;
    playback.close().await;

    let bytes = result?;
    enter(EncodeStage::Done);
    let name = pick_output_name(&source.name, OUTPUT_EXTENSION, preset.output_name.as_deref());
    log::info!("encoded {} -> {} ({} bytes)", source.name, name, bytes.len());
    Ok(OutputArtifact::new(name, OUTPUT_MIME, bytes))
}

struct EncodeAttempt<H: MediaHost> {
    surface: Option<H::Surface>,
    tap: Option<AudioTap<H::Audio>>,
}

impl<H: MediaHost> EncodeAttempt<H> {
    async fn run(
        &mut self,
        host: &H,
        playback: &mut H::Playback,
        preset: &CompressionPreset,
    ) -> Result<Bytes, TranscodeError> {
        let (src_w, src_h) = playback.natural_size();
        if src_w == 0 || src_h == 0 {
            return Err(TranscodeError::SourceLoad(anyhow::anyhow!(
                "source reports no video dimensions"
            )));
        }

        enter(EncodeStage::Negotiating);
        let (width, height) = fit(src_w, src_h, preset.max_width, preset.max_height)?.even();
        let config = negotiate(host, width, height, preset.fps, preset.video_bitrate_bps)
            .await
            .ok_or(TranscodeError::UnsupportedCapability)?;

        enter(EncodeStage::Encoding);
        let surface = self.surface.insert(
            host.create_surface(config.width, config.height)
                .map_err(TranscodeError::host("create encode surface"))?,
        );
        let mut session = host
            .open_session(&config)
            .await
            .map_err(TranscodeError::host("open encode session"))?;

        let pumped = Self::pump(
            &mut self.tap,
            host,
            playback,
            surface,
            &mut session,
            &config,
            preset,
        )
        .await;
        match pumped {
            Ok(()) => {
                let bytes = session
                    .finalize()
                    .await
                    .map_err(TranscodeError::host("finalize container"))?;
                if bytes.is_empty() {
                    return Err(TranscodeError::EmptyOutput);
                }
                Ok(bytes)
            }
            Err(e) => {
                session.abort().await;
                Err(e)
            }
        }
    }

    async fn pump(
        tap_slot: &mut Option<AudioTap<H::Audio>>,
        host: &H,
        playback: &mut H::Playback,
        surface: &mut H::Surface,
        session: &mut H::Session,
        config: &NegotiatedConfig,
        preset: &CompressionPreset,
    ) -> Result<(), TranscodeError> {
        let has_audio = match open_tap(host, playback, TapWiring::ENCODE).await {
            Ok(tap) => {
                let tap = tap_slot.insert(tap);
                match tap.capture().cloned() {
                    Some(capture) => {
                        let spec = audio_spec(tap, &capture, preset);
                        match session.add_audio_track(capture, &spec) {
                            Ok(()) => true,
                            Err(e) => {
                                log::warn!("failed to add audio track, encoding video only: {:#}", e);
                                false
                            }
                        }
                    }
                    None => {
                        log::warn!("source has no audio track, encoding video only");
                        false
                    }
                }
            }
            Err(e) => {
                log::warn!("audio tap unavailable, encoding video only: {:#}", e);
                false
            }
        };

        session
            .start()
            .await
            .map_err(TranscodeError::host("start encode session"))?;
        playback
            .play()
            .await
            .map_err(TranscodeError::host("start playback"))?;

        let mut pacer = FramePacer::new(config.fps);
        let wait = frame_wait(config.fps);
        let mut stall = StallDetector::new(wait, STALL_LIMIT);

        while !playback.is_ended() {
            let frame = surface
                .draw(playback)
                .map_err(TranscodeError::host("draw frame"))?;
            session
                .add_frame(frame, pacer.next_frame())
                .await
                .map_err(TranscodeError::host("encode frame"))?;

            let before = playback.position();
            let _ = time::timeout(wait, playback.frame_presented()).await;
            if stall.observe(before, playback.position()) {
                log::warn!(
                    "playback stuck at {:?} after {} frames",
                    playback.position(),
                    pacer.frames_submitted()
                );
                return Err(TranscodeError::PlaybackStalled {
                    stalled: stall.accumulated(),
                });
            }
        }

        enter(EncodeStage::Finalizing);
        log::debug!("encoded {} frames", pacer.frames_submitted());
        if let Err(e) = playback.pause().await {
            log::debug!("pause after encode failed: {:#}", e);
        }
        session
            .close_video()
            .await
            .map_err(TranscodeError::host("close video track"))?;
        if has_audio {
            if let Some(tap) = tap_slot.as_mut() {
                tap.close().await;
            }
            session
                .close_audio()
                .await
                .map_err(TranscodeError::host("close audio track"))?;
        }
        Ok(())
    }

    async fn release(&mut self) {
        if let Some(mut tap) = self.tap.take() {
            tap.close().await;
        }
        if let Some(mut surface) = self.surface.take() {
            surface.close();
        }
    }
}

fn audio_spec<G: AudioGraph>(
    tap: &AudioTap<G>,
    capture: &G::Capture,
    preset: &CompressionPreset,
) -> AudioTrackSpec {
    let settings = capture.settings();
    AudioTrackSpec {
        codec: "aac",
        codec_string: "mp4a.40.2",
        bitrate_bps: preset.audio_bitrate_bps,
        sample_rate: tap
            .sample_rate()
            .or(settings.sample_rate)
            .unwrap_or(DEFAULT_SAMPLE_RATE),
        channels: settings.channel_count.unwrap_or(DEFAULT_CHANNELS),
    }
}

#[cfg(test)]
#[path = "encode_test.rs"]
mod encode_test;
