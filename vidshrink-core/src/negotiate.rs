//! H.264 encoder capability negotiation.

use std::fmt::{Display, Formatter};

use crate::fit::even_at_least_two;
use crate::host::EncoderProbe;

/// Profiles tried in order: High, Main, Baseline at level 3.1, then at 3.0.
pub const AVC_PROFILES: [&str; 6] = [
    "avc1.64001F",
    "avc1.4D401F",
    "avc1.42E01F",
    "avc1.64001E",
    "avc1.4D401E",
    "avc1.42E01E",
];

pub const BITRATE_FLOOR_BPS: u64 = 300_000;
const BITRATE_STEPS: usize = 4;
const BITRATE_STEP_FACTOR: f64 = 0.7;
const FALLBACK_FPS: [u32; 2] = [30, 24];

/// How SPS/PPS parameter sets are carried in the bitstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvcFormat {
    AnnexB,
    Avc,
}

impl AvcFormat {
    pub const ALL: [AvcFormat; 2] = [AvcFormat::AnnexB, AvcFormat::Avc];

    pub fn as_str(&self) -> &'static str {
        match self {
            AvcFormat::AnnexB => "annexb",
            AvcFormat::Avc => "avc",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HardwareAcceleration {
    PreferHardware,
    PreferSoftware,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LatencyMode {
    Realtime,
    Quality,
}

/// Encoder preferences sent with every query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbePreference {
    pub hardware_acceleration: HardwareAcceleration,
    pub latency_mode: LatencyMode,
}

impl Default for ProbePreference {
    fn default() -> Self {
        Self {
            hardware_acceleration: HardwareAcceleration::PreferHardware,
            latency_mode: LatencyMode::Realtime,
        }
    }
}

/// One configuration offered to an [`EncoderProbe`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncoderQuery {
    pub codec: &'static str,
    pub width: u32,
    pub height: u32,
    pub framerate: u32,
    pub bitrate_bps: u64,
    pub avc_format: AvcFormat,
    pub hardware_acceleration: HardwareAcceleration,
    pub latency_mode: LatencyMode,
}

/// The configuration the primary pipeline commits to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NegotiatedConfig {
    pub codec: &'static str,
    pub avc_format: AvcFormat,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub bitrate_bps: u64,
}

impl Display for NegotiatedConfig {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "{} ({}) {}x{}@{} {}bps",
            self.codec,
            self.avc_format.as_str(),
            self.width,
            self.height,
            self.fps,
            self.bitrate_bps
        )
    }
}

/// Profile and level decoded from an `avc1.PPCCLL` codec string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AvcCodec {
    pub profile_idc: u8,
    pub constraints: u8,
    pub level_idc: u8,
}

impl AvcCodec {
    pub fn parse(codec: &str) -> Option<Self> {
        let hex = codec.strip_prefix("avc1.")?;
        if hex.len() != 6 {
            return None;
        }
        let byte = |i: usize| u8::from_str_radix(hex.get(i..i + 2)?, 16).ok();
        Some(Self {
            profile_idc: byte(0)?,
            constraints: byte(2)?,
            level_idc: byte(4)?,
        })
    }

    pub fn profile_name(&self) -> Option<&'static str> {
        match self.profile_idc {
            0x42 => Some("baseline"),
            0x4D => Some("main"),
            0x58 => Some("extended"),
            0x64 => Some("high"),
            _ => None,
        }
    }

    /// Level as written in encoder options, e.g. `3.1`.
    pub fn level(&self) -> String {
        format!("{}.{}", self.level_idc / 10, self.level_idc % 10)
    }
}

/// Desired rate first, then the common fallbacks; zeros and repeats dropped.
pub fn fps_candidates(desired: u32) -> Vec<u32> {
    let mut out = Vec::with_capacity(3);
    for fps in std::iter::once(desired).chain(FALLBACK_FPS) {
        if fps > 0 && !out.contains(&fps) {
            out.push(fps);
        }
    }
    out
}

pub fn bitrate_ladder(desired: u64) -> Vec<u64> {
    let mut out = Vec::with_capacity(BITRATE_STEPS);
    let mut bitrate = desired.max(BITRATE_FLOOR_BPS);
    for _ in 0..BITRATE_STEPS {
        out.push(bitrate);
        bitrate = ((bitrate as f64 * BITRATE_STEP_FACTOR).floor() as u64).max(BITRATE_FLOOR_BPS);
    }
    out
}

/// Returns the first configuration the probe accepts, walking profiles,
/// parameter-set formats, frame rates and bitrate steps in priority order.
/// A probe error is a rejection. None when everything was rejected.
pub async fn negotiate<P: EncoderProbe>(
    probe: &P,
    width: u32,
    height: u32,
    desired_fps: u32,
    desired_bitrate_bps: u64,
) -> Option<NegotiatedConfig> {
    negotiate_with(
        probe,
        width,
        height,
        desired_fps,
        desired_bitrate_bps,
        ProbePreference::default(),
    )
    .await
}

/// [`negotiate`] with explicit encoder preferences.
pub async fn negotiate_with<P: EncoderProbe>(
    probe: &P,
    width: u32,
    height: u32,
    desired_fps: u32,
    desired_bitrate_bps: u64,
    preference: ProbePreference,
) -> Option<NegotiatedConfig> {
    let width = even_at_least_two(width);
    let height = even_at_least_two(height);
    let fps_list = fps_candidates(desired_fps);
    let ladder = bitrate_ladder(desired_bitrate_bps);

    let mut probes = 0usize;
    for codec in AVC_PROFILES {
        for avc_format in AvcFormat::ALL {
            for &fps in &fps_list {
                for &bitrate_bps in &ladder {
                    let query = EncoderQuery {
                        codec,
                        width,
                        height,
                        framerate: fps,
                        bitrate_bps,
                        avc_format,
                        hardware_acceleration: preference.hardware_acceleration,
                        latency_mode: preference.latency_mode,
                    };
                    probes += 1;
                    match probe.is_config_supported(&query).await {
                        Ok(true) => {
                            let config = NegotiatedConfig {
                                codec,
                                avc_format,
                                width,
                                height,
                                fps,
                                bitrate_bps,
                            };
                            log::info!("negotiated encoder config after {} probes: {}", probes, config);
                            return Some(config);
                        }
                        Ok(false) => {}
                        Err(e) => {
                            log::debug!("encoder probe {} {}x{}@{} failed: {:#}", codec, width, height, fps, e);
                        }
                    }
                }
            }
        }
    }

    log::info!("no encoder config accepted after {} probes", probes);
    None
}

#[cfg(test)]
#[path = "negotiate_test.rs"]
mod negotiate_test;
