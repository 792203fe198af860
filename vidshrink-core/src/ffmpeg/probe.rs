use ffmpeg_next::{Dictionary, Rational};

use crate::host::EncoderProbe;
use crate::negotiate::{AvcCodec, AvcFormat, EncoderQuery, HardwareAcceleration, LatencyMode};

use super::hw::{h264_encoder_candidates, is_hardware};

/// Answers capability queries by actually opening an H.264 encoder with the
/// queried settings.
pub struct FfmpegProbe {
    encoders: Vec<ffmpeg_next::Codec>,
}

impl FfmpegProbe {
    pub fn new() -> Self {
        Self {
            encoders: h264_encoder_candidates(),
        }
    }

    pub fn encoder_names(&self) -> Vec<&str> {
        self.encoders.iter().map(|c| c.name()).collect()
    }

    fn try_open(
        &self,
        codec: ffmpeg_next::Codec,
        query: &EncoderQuery,
        avc: &AvcCodec,
    ) -> anyhow::Result<()> {
        let ctx = ffmpeg_next::codec::Context::new_with_codec(codec);
        let mut encoder = ctx.encoder().video()?;
        encoder.set_width(query.width);
        encoder.set_height(query.height);
        encoder.set_format(ffmpeg_next::format::Pixel::YUV420P);
        encoder.set_frame_rate(Some(Rational::new(query.framerate as i32, 1)));
        encoder.set_time_base(Rational::new(1, query.framerate as i32));
        encoder.set_bit_rate(query.bitrate_bps as usize);
        encoder.set_gop(query.framerate.saturating_mul(2).max(1));

        let mut opts = Dictionary::new();
        if let Some(profile) = avc.profile_name() {
            opts.set("profile", profile);
        }
        opts.set("level", &avc.level());
        if codec.name() == "libx264" {
            match query.latency_mode {
                LatencyMode::Realtime => {
                    opts.set("preset", "ultrafast");
                    opts.set("tune", "zerolatency");
                }
                LatencyMode::Quality => opts.set("preset", "medium"),
            }
            if query.avc_format == AvcFormat::AnnexB {
                opts.set("x264-params", "annexb=1");
            }
        }
        encoder.open_with(opts)?;
        Ok(())
    }
}

impl Default for FfmpegProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl EncoderProbe for FfmpegProbe {
    async fn is_config_supported(&self, query: &EncoderQuery) -> anyhow::Result<bool> {
        let avc = AvcCodec::parse(query.codec)
            .ok_or_else(|| anyhow::anyhow!("not an avc1 codec string: {}", query.codec))?;

        let mut ordered: Vec<ffmpeg_next::Codec> = self.encoders.clone();
        // stable sort keeps the discovery order within each group
        match query.hardware_acceleration {
            HardwareAcceleration::PreferSoftware => ordered.sort_by_key(|c| is_hardware(c.name())),
            HardwareAcceleration::PreferHardware => ordered.sort_by_key(|c| !is_hardware(c.name())),
        }

        for codec in ordered {
            match self.try_open(codec, query, &avc) {
                Ok(()) => {
                    log::debug!(
                        "{} accepts {} {}x{}@{}",
                        codec.name(),
                        query.codec,
                        query.width,
                        query.height,
                        query.framerate
                    );
                    return Ok(true);
                }
                Err(e) => log::debug!("{} rejects {}: {}", codec.name(), query.codec, e),
            }
        }
        Ok(false)
    }
}
