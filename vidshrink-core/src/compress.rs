//! Tiered compression: codec encode, then stream recorder, then the input
//! unchanged.

use std::fmt::{Display, Formatter};

use tokio::sync::watch;

use crate::artifact::OutputArtifact;
use crate::encode::encode;
use crate::error::TranscodeError;
use crate::host::{HostCapabilities, MediaHost};
use crate::preset::CompressionPreset;
use crate::recorder::record;
use crate::source::SourceMedia;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Encode,
    Record,
    PassThrough,
}

impl Display for Tier {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        let name = match self {
            Tier::Encode => "encode",
            Tier::Record => "record",
            Tier::PassThrough => "pass-through",
        };
        f.write_str(name)
    }
}

/// Tiers to try, in order. Pass-through is always last.
pub fn plan(capabilities: HostCapabilities) -> Vec<Tier> {
    let mut tiers = Vec::with_capacity(3);
    if capabilities.supports_encode() {
        tiers.push(Tier::Encode);
    }
    tiers.push(Tier::Record);
    tiers.push(Tier::PassThrough);
    tiers
}

#[derive(Debug)]
pub struct TierFailure {
    pub tier: Tier,
    pub error: TranscodeError,
}

#[derive(Debug)]
pub struct CompressOutcome {
    pub artifact: OutputArtifact,
    /// Tier that produced the artifact.
    pub tier: Tier,
    /// Recoverable failures of the tiers tried before it.
    pub failures: Vec<TierFailure>,
}

impl CompressOutcome {
    pub fn is_pass_through(&self) -> bool {
        self.tier == Tier::PassThrough
    }
}

/// Compresses `source`, falling back tier by tier. Only a source that
/// cannot be loaded is reported as an error; every other failure ends in
/// a successful outcome, in the worst case the unmodified input.
pub async fn compress<H: MediaHost>(
    host: &H,
    source: &SourceMedia,
    preset: &CompressionPreset,
) -> Result<CompressOutcome, TranscodeError> {
    let mut failures = Vec::new();

    for tier in plan(host.capabilities()) {
        let result = match tier {
            Tier::Encode => encode(host, source, preset).await,
            Tier::Record => record(host, source, preset).await,
            Tier::PassThrough => Ok(OutputArtifact::pass_through(source)),
        };

        match result {
            Ok(artifact) => {
                if tier == Tier::PassThrough {
                    log::warn!("returning {} uncompressed", source.name);
                }
                return Ok(CompressOutcome {
                    artifact,
                    tier,
                    failures,
                });
            }
            Err(error) if error.is_fatal() => {
                log::error!("{} tier failed: {}", tier, error);
                return Err(error);
            }
            Err(error) => {
                log::warn!("{} tier failed, falling back: {}", tier, error);
                failures.push(TierFailure { tier, error });
            }
        }
    }

    Ok(CompressOutcome {
        artifact: OutputArtifact::pass_through(source),
        tier: Tier::PassThrough,
        failures,
    })
}

/// Owns a host and exposes a busy flag that is true while a compression is
/// in flight.
pub struct Compressor<H> {
    host: H,
    busy: watch::Sender<bool>,
}

impl<H: MediaHost> Compressor<H> {
    pub fn new(host: H) -> Self {
        let (busy, _) = watch::channel(false);
        Self { host, busy }
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.busy.subscribe()
    }

    pub fn is_busy(&self) -> bool {
        *self.busy.borrow()
    }

    pub async fn compress(
        &self,
        source: &SourceMedia,
        preset: &CompressionPreset,
    ) -> Result<CompressOutcome, TranscodeError> {
        let _busy = BusyGuard::enter(&self.busy);
        compress(&self.host, source, preset).await
    }
}

struct BusyGuard<'a>(&'a watch::Sender<bool>);

impl<'a> BusyGuard<'a> {
    fn enter(flag: &'a watch::Sender<bool>) -> Self {
        flag.send_replace(true);
        Self(flag)
    }
}

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.send_replace(false);
    }
}

#[cfg(test)]
#[path = "compress_test.rs"]
mod compress_test;
