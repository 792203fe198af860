//! ffmpeg-backed host pieces: encoder capability probing and source
//! metadata.

mod hw;
mod metadata;
mod probe;

pub use hw::h264_encoder_candidates;
pub use metadata::probe_source;
pub use probe::FfmpegProbe;

pub fn init() -> anyhow::Result<()> {
    ffmpeg_next::init().map_err(|e| anyhow::anyhow!("ffmpeg_next init: {}", e))?;
    ffmpeg_next::util::log::set_level(ffmpeg_next::util::log::Level::Error);
    Ok(())
}
