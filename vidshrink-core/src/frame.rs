use std::time::Duration;

use bytes::Bytes;

/// A composited frame taken from a drawing surface.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub data: Bytes,
    pub width: u32,
    pub height: u32,
    /// Source playback position when the frame was drawn.
    pub position: Duration,
}
