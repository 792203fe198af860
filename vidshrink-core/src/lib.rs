// Host traits are used through generics only; their futures never need Send.
#![allow(async_fn_in_trait)]

pub mod artifact;
pub mod audio;
pub mod compress;
pub mod encode;
pub mod error;
#[cfg(feature = "ffmpeg")]
pub mod ffmpeg;
pub mod fit;
pub mod frame;
pub mod host;
pub mod negotiate;
pub mod pacing;
pub mod preset;
pub mod recorder;
pub mod source;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use artifact::{OutputArtifact, pick_output_name};
pub use compress::{CompressOutcome, Compressor, Tier, TierFailure, compress};
pub use error::TranscodeError;
pub use fit::{Fitted, fit};
pub use host::{EncoderProbe, HostCapabilities, MediaHost};
pub use negotiate::{NegotiatedConfig, negotiate};
pub use preset::CompressionPreset;
pub use source::{SourceInfo, SourceMedia};
