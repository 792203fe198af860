//! Scoped audio tap over a playback session.

use crate::host::{AudioGraph, CaptureTrack, MediaHost};

/// How a tap is wired into the audio graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TapWiring {
    pub sample_rate: Option<u32>,
    pub keep_alive_gain: f32,
    pub capture_gain: f32,
}

impl TapWiring {
    /// Wiring for the codec encode path.
    pub const ENCODE: TapWiring = TapWiring {
        sample_rate: None,
        keep_alive_gain: 0.0,
        capture_gain: 1.0,
    };

    /// Wiring for the stream recorder path. Some graphs suspend a branch
    /// whose gain is exactly zero.
    pub const RECORD: TapWiring = TapWiring {
        sample_rate: Some(48_000),
        keep_alive_gain: 0.0001,
        capture_gain: 1.0,
    };
}

/// Duplicates the source audio into an inaudible keep-alive sink and a
/// capture sink. Must be closed with [`AudioTap::close`].
pub struct AudioTap<G: AudioGraph> {
    graph: Option<G>,
    capture: Option<G::Capture>,
}

pub async fn open_tap<H: MediaHost>(
    host: &H,
    playback: &mut H::Playback,
    wiring: TapWiring,
) -> anyhow::Result<AudioTap<H::Audio>> {
    let mut graph = host.open_audio(playback, wiring.sample_rate).await?;

    let capture = match wire(&mut graph, wiring) {
        Ok(capture) => capture,
        Err(e) => {
            graph.close().await;
            return Err(e);
        }
    };

    if let Err(e) = graph.resume().await {
        log::debug!("audio graph resume failed: {:#}", e);
    }

    Ok(AudioTap {
        graph: Some(graph),
        capture,
    })
}

fn wire<G: AudioGraph>(graph: &mut G, wiring: TapWiring) -> anyhow::Result<Option<G::Capture>> {
    graph.connect_keep_alive(wiring.keep_alive_gain)?;
    graph.connect_capture(wiring.capture_gain)
}

impl<G: AudioGraph> AudioTap<G> {
    pub fn capture(&self) -> Option<&G::Capture> {
        self.capture.as_ref()
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.graph.as_ref().and_then(|g| g.sample_rate())
    }

    /// Stops the capture track and closes the graph. Safe to call twice.
    pub async fn close(&mut self) {
        if let Some(capture) = self.capture.take() {
            capture.stop();
        }
        if let Some(mut graph) = self.graph.take() {
            graph.close().await;
        }
    }
}

impl<G: AudioGraph> Drop for AudioTap<G> {
    fn drop(&mut self) {
        if self.graph.is_some() {
            log::warn!("audio tap dropped without close");
        }
    }
}
