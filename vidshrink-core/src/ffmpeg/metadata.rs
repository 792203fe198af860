use std::path::Path;
use std::time::Duration;

use crate::source::SourceInfo;

/// Reads the natural size and duration of the best video stream in `path`.
pub fn probe_source(path: &Path) -> anyhow::Result<SourceInfo> {
    let input = ffmpeg_next::format::input(path)?;
    let stream = input
        .streams()
        .best(ffmpeg_next::media::Type::Video)
        .ok_or_else(|| anyhow::anyhow!("no video stream in {}", path.display()))?;

    let decoder = ffmpeg_next::codec::Context::from_parameters(stream.parameters())?
        .decoder()
        .video()?;

    // AV_TIME_BASE units
    let duration = match input.duration() {
        d if d == ffmpeg_next::ffi::AV_NOPTS_VALUE as i64 || d <= 0 => None,
        d => Some(Duration::from_micros(d as u64)),
    };

    Ok(SourceInfo {
        width: decoder.width(),
        height: decoder.height(),
        duration,
    })
}
