//! Decides what happens to a picked file before it is uploaded.

use thiserror::Error;
use vidshrink_core::{
    CompressionPreset, Compressor, MediaHost, OutputArtifact, SourceMedia, Tier, TranscodeError,
};

use crate::size::{format_size, mebibytes};

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("File size exceeds {limit_mb}MB limit.")]
    TooLarge { limit_mb: u64 },

    #[error("An error occurred during file processing.")]
    Processing(#[source] TranscodeError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadDecision {
    /// Small and already MP4.
    PassAsIs,
    Compress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadGate {
    pub max_upload_mb: u64,
    pub compress_above_mb: u64,
}

impl Default for UploadGate {
    fn default() -> Self {
        Self {
            max_upload_mb: 500,
            compress_above_mb: 25,
        }
    }
}

/// What the gate handed on for upload.
#[derive(Debug)]
pub struct Prepared {
    pub artifact: OutputArtifact,
    /// None when the file skipped compression.
    pub tier: Option<Tier>,
}

impl UploadGate {
    pub fn decide(&self, name: &str, size_bytes: u64) -> Result<UploadDecision, UploadError> {
        let size_mb = mebibytes(size_bytes);
        if size_mb > self.max_upload_mb as f64 {
            return Err(UploadError::TooLarge {
                limit_mb: self.max_upload_mb,
            });
        }
        let is_mp4 = name.to_ascii_lowercase().ends_with(".mp4");
        if size_mb > self.compress_above_mb as f64 || !is_mp4 {
            Ok(UploadDecision::Compress)
        } else {
            Ok(UploadDecision::PassAsIs)
        }
    }

    /// Runs the gate and, when needed, the compressor. The compressor's busy
    /// flag is raised only while compression runs.
    pub async fn prepare<H: MediaHost>(
        &self,
        compressor: &Compressor<H>,
        source: SourceMedia,
        preset: &CompressionPreset,
    ) -> Result<Prepared, UploadError> {
        log::info!("picked {} ({})", source.name, format_size(source.size()));
        match self.decide(&source.name, source.size())? {
            UploadDecision::PassAsIs => Ok(Prepared {
                artifact: OutputArtifact::pass_through(&source),
                tier: None,
            }),
            UploadDecision::Compress => {
                let outcome = compressor
                    .compress(&source, preset)
                    .await
                    .map_err(UploadError::Processing)?;
                log::info!(
                    "{} -> {} ({}) via {}",
                    source.name,
                    outcome.artifact.name,
                    format_size(outcome.artifact.size()),
                    outcome.tier
                );
                Ok(Prepared {
                    artifact: outcome.artifact,
                    tier: Some(outcome.tier),
                })
            }
        }
    }
}
