//! H.264 encoder discovery, hardware first.

const HW_H264_ENCODERS: [&str; 4] = ["h264_nvenc", "h264_vaapi", "h264_qsv", "h264_v4l2m2m"];
const SW_H264_ENCODER: &str = "libx264";

/// H.264 encoders available in this ffmpeg build, hardware before software.
pub fn h264_encoder_candidates() -> Vec<ffmpeg_next::Codec> {
    HW_H264_ENCODERS
        .iter()
        .chain(std::iter::once(&SW_H264_ENCODER))
        .filter_map(|name| {
            let codec = ffmpeg_next::encoder::find_by_name(name);
            if codec.is_some() {
                log::debug!("found h264 encoder: {}", name);
            }
            codec
        })
        .collect()
}

pub fn is_hardware(name: &str) -> bool {
    HW_H264_ENCODERS.contains(&name)
}
