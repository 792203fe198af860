use serde::{Deserialize, Serialize};

/// Compression targets supplied once per invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CompressionPreset {
    pub max_width: u32,
    pub max_height: u32,
    pub fps: u32,
    #[serde(rename = "videoBitrate")]
    pub video_bitrate_bps: u64,
    #[serde(rename = "audioBitrate")]
    pub audio_bitrate_bps: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_name: Option<String>,
}

impl Default for CompressionPreset {
    fn default() -> Self {
        Self {
            max_width: 1280,
            max_height: 720,
            fps: 30,
            video_bitrate_bps: 2_500_000,
            audio_bitrate_bps: 128_000,
            output_name: None,
        }
    }
}

impl CompressionPreset {
    pub fn with_output_name(mut self, name: impl Into<String>) -> Self {
        self.output_name = Some(name.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_preset() {
        let preset = CompressionPreset::default();
        assert_eq!((preset.max_width, preset.max_height), (1280, 720));
        assert_eq!(preset.fps, 30);
        assert_eq!(preset.video_bitrate_bps, 2_500_000);
        assert_eq!(preset.audio_bitrate_bps, 128_000);
        assert!(preset.output_name.is_none());
    }

    #[test]
    fn test_preset_json_fills_missing_fields() {
        let preset: CompressionPreset =
            serde_json::from_str(r#"{"maxWidth": 854, "maxHeight": 480, "videoBitrate": 1000000}"#)
                .unwrap();
        assert_eq!((preset.max_width, preset.max_height), (854, 480));
        assert_eq!(preset.video_bitrate_bps, 1_000_000);
        assert_eq!(preset.fps, 30);
        assert_eq!(preset.audio_bitrate_bps, 128_000);
    }

    #[test]
    fn test_preset_json_output_name() {
        let preset = CompressionPreset::default().with_output_name("upload.mp4");
        let json = serde_json::to_string(&preset).unwrap();
        assert!(json.contains(r#""outputName":"upload.mp4""#));
        assert!(json.contains(r#""audioBitrate":128000"#));
    }
}
